pub mod session;

use crate::db::models::User;
use crate::db::repository::{RepositoryError, UserRepository};

/// Outcome of a credential check. A disabled account is deliberately
/// distinct from bad credentials; the login page words them differently.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(User),
    BadCredentials,
    Disabled,
}

pub fn hash_password(plaintext: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST)
}

pub async fn authenticate(
    users: &dyn UserRepository,
    username: &str,
    password: &str,
) -> Result<LoginOutcome, RepositoryError> {
    let Some(user) = users.by_username(username).await? else {
        return Ok(LoginOutcome::BadCredentials);
    };

    if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
        return Ok(LoginOutcome::BadCredentials);
    }

    if !user.is_active {
        return Ok(LoginOutcome::Disabled);
    }

    Ok(LoginOutcome::Success(user))
}
