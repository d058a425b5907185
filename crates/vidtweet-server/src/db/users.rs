use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use vidtweet_shared::User;

use super::DbPool;
use crate::auth::Password;
use crate::error::AppError;

/// Message for a username/email collision. Deliberately does not say which field collided.
pub const DUPLICATE_USER: &str = "User with email or username already exists";

/// Stored shape of an account, including the fields never sent to clients.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: String,
    pub watch_history: Vec<Uuid>,
    pub password: Password,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Plaintext; hashed by the repository on insert.
    pub password: String,
    pub avatar: String,
    pub cover_image: String,
}

impl UserRecord {
    /// Applies field normalization: lowercase username/email, trimmed names.
    pub fn from_new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: new_user.username.trim().to_lowercase(),
            email: new_user.email.trim().to_lowercase(),
            full_name: new_user.full_name.trim().to_string(),
            avatar: new_user.avatar,
            cover_image: new_user.cover_image,
            watch_history: Vec::new(),
            password: Password::Changed(new_user.password),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_public(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            watch_history: self.watch_history.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// First user whose username OR email matches.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError>;

    /// Same as `find_by_id`, with password and refresh token excluded.
    async fn find_public_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Inserts a new user, hashing its password first.
    async fn create(&self, new_user: NewUser) -> Result<UserRecord, AppError>;

    /// Writes back every mutable field; a changed password is hashed first.
    async fn save(&self, user: &mut UserRecord) -> Result<(), AppError>;
}

pub(crate) fn map_unique_violation(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(DUPLICATE_USER.to_string())
        }
        _ => AppError::Database(e),
    }
}

type UserRow = (
    Uuid,                // id
    String,              // username
    String,              // email
    String,              // full_name
    String,              // avatar
    String,              // cover_image
    Vec<Uuid>,           // watch_history
    String,              // password_hash
    Option<String>,      // refresh_token
    DateTime<Utc>,       // created_at
    DateTime<Utc>,       // updated_at
);

type PublicUserRow = (
    Uuid,                // id
    String,              // username
    String,              // email
    String,              // full_name
    String,              // avatar
    String,              // cover_image
    Vec<Uuid>,           // watch_history
    DateTime<Utc>,       // created_at
    DateTime<Utc>,       // updated_at
);

fn row_to_record(row: UserRow) -> UserRecord {
    UserRecord {
        id: row.0,
        username: row.1,
        email: row.2,
        full_name: row.3,
        avatar: row.4,
        cover_image: row.5,
        watch_history: row.6,
        password: Password::Hashed(row.7),
        refresh_token: row.8,
        created_at: row.9,
        updated_at: row.10,
    }
}

fn row_to_user(row: PublicUserRow) -> User {
    User {
        id: row.0,
        username: row.1,
        email: row.2,
        full_name: row.3,
        avatar: row.4,
        cover_image: row.5,
        watch_history: row.6,
        created_at: row.7,
        updated_at: row.8,
    }
}

const USER_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, watch_history, \
     password_hash, refresh_token, created_at, updated_at";

const PUBLIC_USER_COLUMNS: &str =
    "id, username, email, full_name, avatar, cover_image, watch_history, created_at, updated_at";

pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<UserRecord>, AppError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $2 LIMIT 1"
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_record))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, AppError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(row_to_record))
    }

    async fn find_public_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let row: Option<PublicUserRow> = sqlx::query_as(&format!(
            "SELECT {PUBLIC_USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(row_to_user))
    }

    async fn create(&self, new_user: NewUser) -> Result<UserRecord, AppError> {
        let mut user = UserRecord::from_new(new_user);
        let password_hash = user.password.hash_for_storage().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, full_name, avatar, cover_image,
                               watch_history, password_hash, refresh_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.watch_history)
        .bind(&password_hash)
        .bind(&user.refresh_token)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(user)
    }

    async fn save(&self, user: &mut UserRecord) -> Result<(), AppError> {
        let password_hash = user.password.hash_for_storage().await?;
        user.updated_at = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, email = $3, full_name = $4, avatar = $5, cover_image = $6,
                watch_history = $7, password_hash = $8, refresh_token = $9, updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .bind(&user.cover_image)
        .bind(&user.watch_history)
        .bind(&password_hash)
        .bind(&user.refresh_token)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}
