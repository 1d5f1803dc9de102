use serde::{Deserialize, Serialize};

use crate::slug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub views: i64,
    pub likes: i64,
}

impl Category {
    /// URL-safe form of the name, computed on read and never persisted.
    pub fn slug(&self) -> String {
        slug::encode(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub url: String,
    pub views: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub website: Option<String>,
    pub picture_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_slug_is_derived_from_name() {
        let cat = Category {
            id: 1,
            name: "Other Frameworks".into(),
            views: 0,
            likes: 0,
        };
        assert_eq!(cat.slug(), "Other_Frameworks");
    }
}
