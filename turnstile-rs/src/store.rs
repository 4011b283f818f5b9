//! SQLite-backed credential store and visit log.
//!
//! Each statement commits independently; there are no multi-statement
//! transactions. Consistency under concurrent requests is delegated to
//! SQLite's own locking.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use thiserror::Error;

pub type SqlitePool = Pool<Sqlite>;

/// Schema applied at startup:
/// - `users`: username is the primary key; `created_at` is RFC 3339 text,
///   set once at insert and never updated
/// - `visits`: append-only, one row per visit, no payload columns; the
///   AUTOINCREMENT id doubles as the running total
const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS visits (
    id INTEGER PRIMARY KEY AUTOINCREMENT
);
"#;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A user row as stored, including the password digest. Never serialized
/// into responses.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The client-visible projection of a user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Look up a user by exact username. A miss is `None`, kept structurally
    /// distinct from a later hash mismatch so callers can log which happened.
    pub async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_record).transpose()
    }

    /// All users, oldest first.
    pub async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT username, created_at FROM users ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(User {
                    username: row.try_get("username")?,
                    created_at: parse_timestamp(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }

    /// Insert a new user with the supplied digest. `created_at` is stamped
    /// here and immutable afterwards.
    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(username)
            .bind(password_hash)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM users WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a visit and return the running total.
    ///
    /// A single atomic round trip: the table is append-only, so the
    /// AUTOINCREMENT id of the inserted row equals the post-insert row count.
    /// Concurrent callers each get a distinct, monotonically increasing
    /// value.
    pub async fn record_visit(&self) -> Result<i64, StoreError> {
        let row: (i64,) = sqlx::query_as("INSERT INTO visits DEFAULT VALUES RETURNING id")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

fn row_to_record(row: SqliteRow) -> Result<UserRecord, StoreError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(UserRecord {
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| StoreError::Database(sqlx::Error::Decode(Box::new(err))))
}
