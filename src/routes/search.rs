use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Form;

use crate::error::AppResult;
use crate::forms::SearchForm;
use crate::routes::home::Html;
use crate::search::SearchResult;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/search.html")]
pub struct SearchTemplate {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// GET /search
pub async fn page() -> AppResult<Response> {
    Ok(Html(SearchTemplate {
        query: String::new(),
        results: Vec::new(),
    })
    .into_response())
}

/// POST /search
pub async fn run(
    State(state): State<AppState>,
    Form(form): Form<SearchForm>,
) -> AppResult<Response> {
    let query = form.query.unwrap_or_default().trim().to_string();
    let results = if query.is_empty() {
        Vec::new()
    } else {
        state.search.search(&query).await
    };

    Ok(Html(SearchTemplate { query, results }).into_response())
}
