use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::models::{Category, Page};
use crate::db::repository::{
    CategoryRepository, PageRepository, SqliteCategoryRepository, SqlitePageRepository,
};
use crate::error::{AppError, AppResult};
use crate::extractors::MaybeUser;
use crate::state::AppState;
use crate::tracking::{VisitCookies, VisitTracker};

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub username: String,
    pub categories: Vec<Category>,
    pub pages: Vec<Page>,
    pub cat_list: Vec<Category>,
    pub visits: u32,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub visits: u32,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Attach visit-tracker cookies to an already-built response.
pub fn with_cookies(mut response: Response, cookies: VisitCookies) -> AppResult<Response> {
    for (name, value) in cookies {
        let value = HeaderValue::from_str(&value)
            .map_err(|e| AppError::Internal(format!("invalid cookie value: {}", e)))?;
        response.headers_mut().append(name, value);
    }
    Ok(response)
}

/// The listing page: top categories by likes, top pages by views, the full
/// category index, and the visit counter.
pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    headers: HeaderMap,
) -> AppResult<Response> {
    let categories = SqliteCategoryRepository::new(state.db.clone());
    let pages = SqlitePageRepository::new(state.db.clone());
    let top_n = state.config.directory.top_n;

    let top_categories = categories.top_by_likes(top_n).await?;
    let top_pages = pages.top_by_views(top_n).await?;
    let cat_list = categories.all_by_name().await?;

    let tracker = VisitTracker::from_config(&state.config.tracking);
    let (visits, cookies) = tracker.observe(&state.db, &headers)?;

    let response = Html(IndexTemplate {
        username: user.map(|u| u.username).unwrap_or_default(),
        categories: top_categories,
        pages: top_pages,
        cat_list,
        visits,
    })
    .into_response();

    with_cookies(response, cookies)
}

/// About page shows the current count without advancing it.
pub async fn about(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let tracker = VisitTracker::from_config(&state.config.tracking);
    let visits = tracker.peek(&state.db, &headers)?;
    Ok(Html(AboutTemplate { visits }).into_response())
}
