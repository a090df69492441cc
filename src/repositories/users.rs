use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{PgStore, StoreError};
use crate::models::users::{Credentials, User};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Identity backend behind the session. Signing out is purely local, so only
/// the calls that reach the backend live here.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, credentials: &Credentials) -> Result<User, AuthError>;
    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError>;
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub(crate) fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(sqlx::FromRow)]
struct UserRecord {
    id: String,
    email: String,
    password_hash: String,
    salt: String,
    created_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            email: record.email,
            created_at: record.created_at,
        }
    }
}

/// A concurrent sign-up can claim the email between the lookup and the insert.
fn insert_error(e: sqlx::Error) -> AuthError {
    let duplicate = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation());
    if duplicate {
        AuthError::EmailTaken
    } else {
        AuthError::Store(StoreError::from(e))
    }
}

impl PgStore {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let user = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, salt, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.conn)
        .await?;

        Ok(user)
    }
}

#[async_trait]
impl AuthProvider for PgStore {
    async fn sign_up(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let email = normalize_email(&credentials.email);
        if self.get_user_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let user_id = Uuid::new_v4().hyphenated().to_string();
        let salt = new_salt();
        let password_hash = hash_password(&salt, &credentials.password);

        let user = sqlx::query_as::<_, UserRecord>(
            r#"
                INSERT INTO users (id, email, password_hash, salt)
                VALUES ($1, $2, $3, $4)
                RETURNING id, email, password_hash, salt, created_at
            "#,
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .bind(salt)
        .fetch_one(&self.conn)
        .await
        .map_err(insert_error)?;

        Ok(user.into())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let email = normalize_email(&credentials.email);
        let user = self
            .get_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if hash_password(&user.salt, &credentials.password) != user.password_hash {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_depend_on_salt() {
        let first = hash_password("salt-a", "hunter22");
        let second = hash_password("salt-b", "hunter22");

        assert_eq!(first.len(), 64);
        assert_ne!(first, second);
        assert_eq!(first, hash_password("salt-a", "hunter22"));
    }

    #[test]
    fn emails_are_compared_case_insensitively() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("duplicate key value violates unique constraint \"users_email_key\"")]
    struct DuplicateEmail;

    impl sqlx::error::DatabaseError for DuplicateEmail {
        fn message(&self) -> &str {
            "duplicate key value violates unique constraint \"users_email_key\""
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn losing_a_sign_up_race_reports_email_taken() {
        let raced = insert_error(sqlx::Error::Database(Box::new(DuplicateEmail)));
        assert!(matches!(raced, AuthError::EmailTaken));

        let broken = insert_error(sqlx::Error::RowNotFound);
        assert!(matches!(broken, AuthError::Store(StoreError::Database(_))));
    }
}
