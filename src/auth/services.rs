use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RegisterRequest},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::{CreateUserError, UserStore},
        repo_types::NewUser,
    },
    error::AppError,
};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    // Verified against when the email is unknown so both failure paths cost the same.
    static ref DUMMY_HASH: String = hash_password("agroguard-unknown-user").unwrap_or_default();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn require(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub async fn register(
    users: &dyn UserStore,
    keys: &JwtKeys,
    payload: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let email = payload.email.trim().to_string();
    require(&payload.name, "name")?;
    require(&email, "email")?;
    require(&payload.password, "password")?;
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    if users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::EmailExists);
    }

    let password_hash = hash_password(&payload.password)?;
    let location = payload
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());

    let user = users
        .create(NewUser {
            name: payload.name.trim().to_string(),
            email,
            password_hash,
            location,
        })
        .await
        .map_err(|e| match e {
            CreateUserError::EmailTaken => {
                warn!("email registered concurrently");
                AppError::EmailExists
            }
            CreateUserError::Other(e) => AppError::Internal(e),
        })?;

    let token = keys.sign(&user.email)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(AuthResponse::new(user, token))
}

pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    payload: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let email = payload.email.trim().to_string();
    require(&email, "email")?;
    require(&payload.password, "password")?;

    let Some(user) = users.find_by_email(&email).await? else {
        verify_password(&payload.password, &DUMMY_HASH);
        warn!(%email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&payload.password, &user.password_hash) {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let token = keys.sign(&user.email)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(AuthResponse::new(user, token))
}
