//! Submitted form payloads and their validation.
//!
//! Validation failures are not errors in the HTTP sense: handlers re-render
//! the submitting form with the field messages and a 200.

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn display(&self) -> String {
        format!("{}: {}", self.field, self.message)
    }
}

/// Ensure a submitted URL carries a scheme and actually parses.
/// `example.com/x` becomes `http://example.com/x`. The stored value is
/// the parser's serialization, not the raw input: the parser strips tabs
/// and newlines, and those must never reach a Location header later.
pub fn normalize_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("must not be empty".into());
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    match url::Url::parse(&candidate) {
        Ok(parsed) => Ok(parsed.to_string()),
        Err(_) => Err(format!("'{}' is not a valid URL", trimmed)),
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
}

impl CategoryForm {
    pub fn validate(&self) -> Result<String, Vec<FieldError>> {
        let name = self.name.trim();
        let mut errors = Vec::new();
        if name.is_empty() {
            errors.push(FieldError::new("name", "must not be empty"));
        }
        if name.len() > 128 {
            errors.push(FieldError::new("name", "must be at most 128 characters"));
        }
        if errors.is_empty() {
            Ok(name.to_string())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageForm {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ValidPage {
    pub title: String,
    pub url: String,
}

impl PageForm {
    pub fn validate(&self) -> Result<ValidPage, Vec<FieldError>> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(FieldError::new("title", "must not be empty"));
        }
        if title.len() > 128 {
            errors.push(FieldError::new("title", "must be at most 128 characters"));
        }

        let url = match normalize_url(&self.url) {
            Ok(url) => url,
            Err(msg) => {
                errors.push(FieldError::new("url", msg));
                String::new()
            }
        };

        if errors.is_empty() {
            Ok(ValidPage {
                title: title.to_string(),
                url,
            })
        } else {
            Err(errors)
        }
    }
}

/// Register form fields, collected from the multipart body.
#[derive(Debug, Default)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub website: String,
}

#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub website: Option<String>,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<ValidRegistration, Vec<FieldError>> {
        let mut errors = Vec::new();

        let username = self.username.trim();
        if username.is_empty() {
            errors.push(FieldError::new("username", "must not be empty"));
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push(FieldError::new("email", "must not be empty"));
        } else if !email.contains('@') {
            errors.push(FieldError::new("email", "must be an email address"));
        }

        if self.password.len() < 8 {
            errors.push(FieldError::new("password", "must be at least 8 characters"));
        }

        let website = if self.website.trim().is_empty() {
            None
        } else {
            match normalize_url(&self.website) {
                Ok(url) => Some(url),
                Err(msg) => {
                    errors.push(FieldError::new("website", msg));
                    None
                }
            }
        };

        if errors.is_empty() {
            Ok(ValidRegistration {
                username: username.to_string(),
                email: email.to_string(),
                password: self.password.clone(),
                website,
            })
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Optional search box on the category page and the search page.
#[derive(Debug, Deserialize)]
pub struct SearchForm {
    pub query: Option<String>,
}
