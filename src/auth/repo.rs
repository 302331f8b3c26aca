use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    EmailTaken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistent user records, unique by email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;

    /// Must fail with `EmailTaken` rather than insert a second row for an
    /// email, even when racing another insert.
    async fn create(&self, user: NewUser) -> Result<User, CreateUserError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, location, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, CreateUserError> {
        let res = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, location)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, location, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.location)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(u) => Ok(u),
            // users_email_key is the source of truth for uniqueness
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(CreateUserError::EmailTaken)
            }
            Err(e) => Err(CreateUserError::Other(
                anyhow::Error::new(e).context("insert user"),
            )),
        }
    }
}

/// Keyed by email; check and insert happen under one write lock.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn count_email(&self, email: &str) -> usize {
        self.users
            .read()
            .values()
            .filter(|u| u.email == email)
            .count()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().get(email).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, CreateUserError> {
        let mut users = self.users.write();
        if users.contains_key(&user.email) {
            return Err(CreateUserError::EmailTaken);
        }
        let stored = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            location: user.location,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(stored.email.clone(), stored.clone());
        Ok(stored)
    }
}
