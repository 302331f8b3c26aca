use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::repo_types::User;

/// Request body for user registration. Missing fields deserialize as blank
/// so they are reported as validation failures rather than body rejections.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub location: Option<String>,
    pub token: String,
}

impl AuthResponse {
    pub fn new(user: User, token: String) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            location: user.location,
            token,
        }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub location: Option<String>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            location: user.location,
        }
    }
}
