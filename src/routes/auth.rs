use askama::Template;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};

use crate::auth::{authenticate, hash_password, session, LoginOutcome};
use crate::db::repository::{RepositoryError, SqliteUserRepository, UserRepository};
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, CurrentUser};
use crate::forms::{LoginForm, RegisterForm};
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub registered: bool,
    pub username: String,
    pub email: String,
    pub website: String,
    pub errors: Vec<String>,
}

impl RegisterTemplate {
    fn blank() -> Self {
        Self {
            registered: false,
            username: String::new(),
            email: String::new(),
            website: String::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub message: String,
}

#[derive(Template)]
#[template(path = "pages/restricted.html")]
pub struct RestrictedTemplate {
    pub username: String,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub username: String,
    pub email: String,
    pub website: String,
    pub picture: String,
}

/// GET /register
pub async fn register_form() -> AppResult<Response> {
    Ok(Html(RegisterTemplate::blank()).into_response())
}

/// POST /register (multipart: form fields plus an optional picture upload)
pub async fn register_submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut form = RegisterForm::default();
    let mut picture: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => form.username = field_text(field).await?,
            "email" => form.email = field_text(field).await?,
            "password" => form.password = field_text(field).await?,
            "website" => form.website = field_text(field).await?,
            "picture" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if !file_name.is_empty() && !data.is_empty() {
                    picture = Some((file_name, data.to_vec()));
                }
            }
            _ => {}
        }
    }

    let valid = match form.validate() {
        Ok(valid) => valid,
        Err(errors) => {
            return Ok(Html(RegisterTemplate {
                registered: false,
                username: form.username,
                email: form.email,
                website: form.website,
                errors: errors.iter().map(|e| e.display()).collect(),
            })
            .into_response());
        }
    };

    let picture_path = picture
        .as_ref()
        .map(|(original_name, _)| picture_file_name(original_name));

    let password_hash = hash_password(&valid.password)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;

    let users = SqliteUserRepository::new(state.db.clone());
    match users
        .create_with_profile(
            &valid.username,
            &valid.email,
            &password_hash,
            valid.website.as_deref(),
            picture_path.as_deref(),
        )
        .await
    {
        Ok(user) => {
            // Written only after the user row exists; a rejected
            // registration must leave nothing in the uploads dir.
            if let (Some(file_name), Some((_, data))) = (&picture_path, &picture) {
                save_picture(&state, file_name, data)?;
            }
            tracing::info!("registered new user {}", user.username);
            Ok(Html(RegisterTemplate {
                registered: true,
                username: user.username,
                email: user.email,
                website: valid.website.unwrap_or_default(),
                errors: Vec::new(),
            })
            .into_response())
        }
        Err(RepositoryError::Conflict(_)) => Ok(Html(RegisterTemplate {
            registered: false,
            username: valid.username,
            email: valid.email,
            website: valid.website.unwrap_or_default(),
            errors: vec!["username: that username is taken".to_string()],
        })
        .into_response()),
        Err(e) => Err(e.into()),
    }
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> AppResult<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// File name an upload is stored under: fresh uuid, extension kept only
/// when it maps to a known mime type.
fn picture_file_name(original_name: &str) -> String {
    let extension = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| mime_guess::from_ext(e).first().is_some())
        .unwrap_or("bin");
    format!("{}.{}", uuid::Uuid::now_v7(), extension)
}

fn save_picture(state: &AppState, file_name: &str, data: &[u8]) -> AppResult<()> {
    let path = state.config.uploads_path().join(file_name);
    std::fs::create_dir_all(state.config.uploads_path())
        .and_then(|_| std::fs::write(&path, data))
        .map_err(|e| AppError::Internal(format!("failed to store upload: {}", e)))
}

/// GET /login
pub async fn login_form() -> AppResult<Response> {
    Ok(Html(LoginTemplate {
        message: String::new(),
    })
    .into_response())
}

/// POST /login
pub async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let users = SqliteUserRepository::new(state.db.clone());

    match authenticate(&users, &form.username, &form.password).await? {
        LoginOutcome::Success(user) => {
            let token = session::create_session(&state.db, &user.id, state.config.auth.session_hours)?;
            let cookie = format!(
                "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
                state.config.auth.cookie_name,
                token,
                state.config.auth.session_hours * 3600
            );

            let mut response = Redirect::to("/").into_response();
            response.headers_mut().append(
                header::SET_COOKIE,
                HeaderValue::from_str(&cookie)
                    .map_err(|e| AppError::Internal(format!("invalid cookie value: {}", e)))?,
            );
            Ok(response)
        }
        LoginOutcome::BadCredentials => Ok(Html(LoginTemplate {
            message: "Invalid login details supplied.".to_string(),
        })
        .into_response()),
        LoginOutcome::Disabled => Ok(Html(LoginTemplate {
            message: "Your account has been disabled.".to_string(),
        })
        .into_response()),
    }
}

/// GET /logout
pub async fn logout(
    State(state): State<AppState>,
    _user: CurrentUser,
    headers: HeaderMap,
) -> AppResult<Response> {
    if let Some(token) = cookie_value(&headers, &state.config.auth.cookie_name) {
        session::delete_session(&state.db, &token)?;
    }

    let expired = format!(
        "{}=; HttpOnly; Path=/; Max-Age=0",
        state.config.auth.cookie_name
    );
    let mut response = Redirect::to("/").into_response();
    response.headers_mut().append(
        header::SET_COOKIE,
        HeaderValue::from_str(&expired)
            .map_err(|e| AppError::Internal(format!("invalid cookie value: {}", e)))?,
    );
    Ok(response)
}

/// GET /restricted
pub async fn restricted(user: CurrentUser) -> AppResult<Response> {
    Ok(Html(RestrictedTemplate {
        username: user.username,
    })
    .into_response())
}

/// GET /profile
pub async fn profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let users = SqliteUserRepository::new(state.db.clone());

    let record = users
        .by_username(&user.username)
        .await?
        .ok_or(AppError::NotFound)?;
    let profile = users.profile_for(&record.id).await?;

    let (website, picture) = profile
        .map(|p| {
            (
                p.website.unwrap_or_default(),
                p.picture_path.unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    Ok(Html(ProfileTemplate {
        username: record.username,
        email: record.email,
        website,
        picture,
    })
    .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_form).post(register_submit))
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
        .route("/restricted", get(restricted))
        .route("/profile", get(profile))
}
