use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::{Category, Page};
use crate::db::repository::{
    CategoryRepository, PageRepository, RepositoryError, SqliteCategoryRepository,
    SqlitePageRepository,
};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forms::{CategoryForm, SearchForm};
use crate::routes::home::Html;
use crate::search::SearchResult;
use crate::slug;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/category.html")]
pub struct CategoryTemplate {
    pub category_name: String,
    pub category_slug: String,
    pub found: bool,
    pub likes: i64,
    pub pages: Vec<Page>,
    pub cat_list: Vec<Category>,
    pub query: String,
    pub results: Vec<SearchResult>,
}

#[derive(Template)]
#[template(path = "pages/add_category.html")]
pub struct AddCategoryTemplate {
    pub name: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "components/category_list.html")]
pub struct CategoryListTemplate {
    pub cat_list: Vec<Category>,
}

async fn category_context(
    state: &AppState,
    category_slug: &str,
) -> Result<CategoryTemplate, RepositoryError> {
    let categories = SqliteCategoryRepository::new(state.db.clone());
    let pages = SqlitePageRepository::new(state.db.clone());

    let category_name = slug::decode(category_slug);
    let cat_list = categories.all_by_name().await?;

    // An unknown category is not an error; the template shows the
    // "no such category" message.
    let (found, likes, category_pages) = match categories.by_name(&category_name).await? {
        Some(category) => {
            let listed = pages.by_category(category.id).await?;
            (true, category.likes, listed)
        }
        None => (false, 0, Vec::new()),
    };

    Ok(CategoryTemplate {
        category_name,
        category_slug: category_slug.to_string(),
        found,
        likes,
        pages: category_pages,
        cat_list,
        query: String::new(),
        results: Vec::new(),
    })
}

/// GET /category/{slug}
pub async fn show(
    State(state): State<AppState>,
    Path(category_slug): Path<String>,
) -> AppResult<Response> {
    let context = category_context(&state, &category_slug).await?;
    Ok(Html(context).into_response())
}

/// POST /category/{slug} — same page with embedded search results.
pub async fn show_with_search(
    State(state): State<AppState>,
    Path(category_slug): Path<String>,
    Form(form): Form<SearchForm>,
) -> AppResult<Response> {
    let mut context = category_context(&state, &category_slug).await?;

    if let Some(query) = form.query {
        let query = query.trim().to_string();
        if !query.is_empty() {
            context.results = state.search.search(&query).await;
            context.query = query;
        }
    }

    Ok(Html(context).into_response())
}

/// GET /category/add
pub async fn add_form(_user: CurrentUser) -> AppResult<Response> {
    Ok(Html(AddCategoryTemplate {
        name: String::new(),
        errors: Vec::new(),
    })
    .into_response())
}

/// POST /category/add
pub async fn add_submit(
    State(state): State<AppState>,
    _user: CurrentUser,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    let name = match form.validate() {
        Ok(name) => name,
        Err(errors) => {
            return Ok(Html(AddCategoryTemplate {
                name: form.name,
                errors: errors.iter().map(|e| e.display()).collect(),
            })
            .into_response());
        }
    };

    let categories = SqliteCategoryRepository::new(state.db.clone());
    match categories.insert(&name).await {
        Ok(_) => Ok(Redirect::to("/").into_response()),
        Err(RepositoryError::Conflict(_)) => Ok(Html(AddCategoryTemplate {
            name,
            errors: vec!["name: that category already exists".to_string()],
        })
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

#[derive(Deserialize)]
pub struct LikeQuery {
    pub category_id: Option<i64>,
}

/// GET /like_category?category_id= — responds with the new count.
pub async fn like(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<LikeQuery>,
) -> AppResult<Response> {
    let id = query.category_id.ok_or(AppError::NotFound)?;
    let categories = SqliteCategoryRepository::new(state.db.clone());

    match categories.increment_likes(id).await? {
        Some(likes) => Ok(likes.to_string().into_response()),
        None => Err(AppError::NotFound),
    }
}

#[derive(Deserialize)]
pub struct SuggestQuery {
    pub suggestion: Option<String>,
}

/// GET /suggest_category?suggestion= — category-list fragment for
/// search-as-you-type.
pub async fn suggest(
    State(state): State<AppState>,
    Query(query): Query<SuggestQuery>,
) -> AppResult<Response> {
    let categories = SqliteCategoryRepository::new(state.db.clone());
    let max = state.config.directory.max_suggestions;

    let prefix = query.suggestion.unwrap_or_default();
    let cat_list = categories.name_starts_with(&prefix, max).await?;

    Ok(Html(CategoryListTemplate { cat_list }).into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/category/add", get(add_form).post(add_submit))
        .route("/category/{slug}", get(show).post(show_with_search))
        .route("/like_category", get(like))
        .route("/suggest_category", get(suggest))
}
