use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::Page;
use crate::db::repository::{
    CategoryRepository, PageRepository, SqliteCategoryRepository, SqlitePageRepository,
};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forms::{normalize_url, PageForm};
use crate::routes::home::Html;
use crate::slug;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/add_page.html")]
pub struct AddPageTemplate {
    pub category_name: String,
    pub category_slug: String,
    pub title: String,
    pub url: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "components/page_list.html")]
pub struct PageListTemplate {
    pub pages: Vec<Page>,
}

/// GET /category/{slug}/add_page
pub async fn add_form(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(category_slug): Path<String>,
) -> AppResult<Response> {
    let categories = SqliteCategoryRepository::new(state.db.clone());
    let category_name = slug::decode(&category_slug);

    // Unknown category: steer the user to creating it first.
    if categories.by_name(&category_name).await?.is_none() {
        return Ok(Redirect::to("/category/add").into_response());
    }

    Ok(Html(AddPageTemplate {
        category_name,
        category_slug,
        title: String::new(),
        url: String::new(),
        errors: Vec::new(),
    })
    .into_response())
}

/// POST /category/{slug}/add_page
pub async fn add_submit(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(category_slug): Path<String>,
    Form(form): Form<PageForm>,
) -> AppResult<Response> {
    let categories = SqliteCategoryRepository::new(state.db.clone());
    let pages = SqlitePageRepository::new(state.db.clone());

    let category_name = slug::decode(&category_slug);
    let Some(category) = categories.by_name(&category_name).await? else {
        return Ok(Redirect::to("/category/add").into_response());
    };

    let page = match form.validate() {
        Ok(page) => page,
        Err(errors) => {
            return Ok(Html(AddPageTemplate {
                category_name,
                category_slug,
                title: form.title,
                url: form.url,
                errors: errors.iter().map(|e| e.display()).collect(),
            })
            .into_response());
        }
    };

    pages.insert(category.id, &page.title, &page.url).await?;
    Ok(Redirect::to(&format!("/category/{}", category_slug)).into_response())
}

#[derive(Deserialize)]
pub struct TrackQuery {
    pub page_id: Option<i64>,
}

/// GET /track_url?page_id= — count the click, then send the client on to
/// the page's stored URL. Always a redirect, never an error page.
pub async fn track_url(
    State(state): State<AppState>,
    Query(query): Query<TrackQuery>,
) -> AppResult<Response> {
    let pages = SqlitePageRepository::new(state.db.clone());

    let target = match query.page_id {
        Some(id) => pages.increment_views(id).await?,
        None => None,
    };

    match target {
        Some(url) => Ok(Redirect::to(&url).into_response()),
        None => Ok(Redirect::to("/").into_response()),
    }
}

#[derive(Deserialize)]
pub struct AutoAddQuery {
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// GET /auto_add_page?category_id=&title=&url= — idempotent page creation
/// for non-interactive flows; responds with the category's page-list
/// fragment ordered by views.
pub async fn auto_add(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<AutoAddQuery>,
) -> AppResult<Response> {
    let categories = SqliteCategoryRepository::new(state.db.clone());
    let pages = SqlitePageRepository::new(state.db.clone());

    let category_id = query.category_id.ok_or(AppError::NotFound)?;
    let title = query
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("title is required".into()))?;
    let url = query
        .url
        .ok_or_else(|| AppError::BadRequest("url is required".into()))?;
    let url = normalize_url(&url).map_err(AppError::BadRequest)?;

    let category = categories
        .by_id(category_id)
        .await?
        .ok_or(AppError::NotFound)?;

    pages
        .get_or_create(category.id, title.trim(), &url)
        .await?;
    let listed = pages.by_category_top_by_views(category.id).await?;

    Ok(Html(PageListTemplate { pages: listed }).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/category/{slug}/add_page", get(add_form).post(add_submit))
        .route("/track_url", get(track_url))
        .route("/auto_add_page", get(auto_add))
}
