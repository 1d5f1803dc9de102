//! URL-safe category slugs: spaces become underscores and back again.

pub fn encode(name: &str) -> String {
    name.replace(' ', "_")
}

pub fn decode(slug: &str) -> String {
    slug.replace('_', " ")
}
