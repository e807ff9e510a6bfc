//! `UserStore` implementation for `PostgreSQL`.

use crate::{is_unique_violation, map_sqlx_error, serialization, PostgresStore};
use async_trait::async_trait;
use ordercore::access::Role;
use ordercore::errors::{StoreError, StoreResult};
use ordercore::store::UserStore;
use ordercore::types::{Login, UserId, Username};
use ordercore::users::{NewUser, User};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::instrument;

#[derive(Debug)]
struct UserRow {
    id: i64,
    login: String,
    username: String,
    password_hash: String,
    role: String,
}

impl TryFrom<&PgRow> for UserRow {
    type Error = sqlx::Error;

    fn try_from(row: &PgRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            login: row.try_get("login")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role")?,
        })
    }
}

impl UserRow {
    fn into_user(self) -> StoreResult<User> {
        Ok(User {
            id: UserId::try_new(self.id).map_err(serialization)?,
            login: Login::try_new(self.login).map_err(serialization)?,
            username: Username::try_new(self.username).map_err(serialization)?,
            password_hash: self.password_hash,
            role: self.role.parse::<Role>().map_err(serialization)?,
        })
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[instrument(name = "postgres.insert_user", skip(self, user), fields(login = %user.login))]
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (login, username, password_hash, role) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user.login.as_ref())
        .bind(user.username.as_ref())
        .bind(&user.password_hash)
        .bind(user.role.to_string())
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateLogin(user.login.clone())
            } else {
                map_sqlx_error(&e)
            }
        })?;

        Ok(User {
            id: UserId::try_new(id).map_err(serialization)?,
            login: user.login,
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
        })
    }

    async fn fetch_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, login, username, password_hash, role FROM users WHERE id = $1",
        )
        .bind(i64::from(id))
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        row.map(|row| {
            UserRow::try_from(&row)
                .map_err(serialization)
                .and_then(UserRow::into_user)
        })
        .transpose()
    }

    async fn fetch_user_by_login(&self, login: &Login) -> StoreResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, login, username, password_hash, role FROM users WHERE login = $1",
        )
        .bind(login.as_ref())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| map_sqlx_error(&e))?;

        row.map(|row| {
            UserRow::try_from(&row)
                .map_err(serialization)
                .and_then(UserRow::into_user)
        })
        .transpose()
    }

    #[instrument(name = "postgres.update_password", skip(self, password_hash))]
    async fn update_password(&self, id: UserId, password_hash: String) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(&password_hash)
            .bind(i64::from(id))
            .execute(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(id));
        }
        Ok(())
    }

    async fn count_users(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool())
            .await
            .map_err(|e| map_sqlx_error(&e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
