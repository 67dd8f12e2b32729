use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::utils::{hash_password, verify_password};

#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct User {
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub access_token: String,
    pub token_type: String,
}

/// Errors from creating a user.
#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("username or email already registered")]
    Duplicate,
    #[error(transparent)]
    Hash(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for CreateUserError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => CreateUserError::Duplicate,
            _ => CreateUserError::Database(e),
        }
    }
}

impl User {
    pub async fn exists(pool: &PgPool, username: &str, email: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(pool)
        .await
    }

    pub async fn create(pool: &PgPool, req: &RegisterRequest) -> Result<Self, CreateUserError> {
        if Self::exists(pool, &req.username, &req.email).await? {
            return Err(CreateUserError::Duplicate);
        }

        let hashed_password = hash_password(&req.password)?;

        // The unique constraints still catch a concurrent registration.
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, hashed_password)
            VALUES ($1, $2, $3)
            RETURNING username, email, hashed_password
            "#,
        )
        .bind(&req.username)
        .bind(&req.email)
        .bind(&hashed_password)
        .fetch_one(pool)
        .await?;

        tracing::info!("Registered user: {}", user.username);
        Ok(user)
    }

    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT username, email, hashed_password
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    /// Returns the user only when it exists and `password` matches.
    pub async fn authenticate(
        pool: &PgPool,
        username: &str,
        password: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let Some(user) = Self::find_by_username(pool, username).await? else {
            return Ok(None);
        };

        match verify_password(password, &user.hashed_password) {
            Ok(true) => Ok(Some(user)),
            Ok(false) => Ok(None),
            Err(e) => {
                // A malformed stored hash reads as a failed login.
                tracing::warn!("Stored password hash for {} is unusable: {}", username, e);
                Ok(None)
            }
        }
    }
}
