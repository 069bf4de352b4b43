//! User repository for accounts and credentials.

use sqlx::PgPool;
use uuid::Uuid;

use super::{like_pattern, Page, Paginated, RepositoryError};
use crate::domain::aggregates::{User, UserRole};

const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(user)
    }

    /// Returns the user with their password hash, for login.
    pub async fn get_with_password(&self, email: &str) -> Result<Option<(User, String)>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            user: User,
            password_hash: String,
        }

        let row = sqlx::query_as::<_, Row>(&format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(|r| (r.user, r.password_hash)))
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(&self, email: &str, name: &str, password_hash: &str, role: UserRole) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(self.pool)
        .await
        .map_err(|e| match RepositoryError::from(e) {
            RepositoryError::Conflict(_) => RepositoryError::Conflict("email already registered".to_string()),
            other => other,
        })?;
        Ok(user)
    }

    pub async fn list(&self, role: Option<UserRole>, search: Option<&str>, page: Page) -> Result<Paginated<User>, RepositoryError> {
        let role = role.map(|r| r.as_str());
        let pattern = search.map(like_pattern);
        let filter = "($1::text IS NULL OR role = $1) AND ($2::text IS NULL OR email ILIKE $2 OR name ILIKE $2)";

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(role)
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(role)
            .bind(&pattern)
            .fetch_one(self.pool)
            .await?;

        Ok(Paginated::new(users, total, page))
    }
}
