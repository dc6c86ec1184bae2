//! Postgres backend.
//!
//! Every statement runs inside a `db.query` span so slow lookups show up in
//! traces next to the request that issued them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Connection, PgConnection, PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{
    CreateUserOutcome, NewUser, ProfileUpdate, SessionRecord, SessionStore, Store, TokenKind,
    TokenStore, UserPage, UserRecord, UserStore,
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const USER_COLUMNS: &str = r"
    id,
    name,
    email,
    email_verified,
    role,
    banned,
    image,
    password_hash,
    EXTRACT(EPOCH FROM created_at)::BIGINT AS created_at_unix
";

macro_rules! db_span {
    ($operation:expr, $statement:expr) => {
        info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = $operation,
            db.statement = $statement
        )
    };
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply `sql/schema.sql`; every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if a statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection for schema setup")?;
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&mut *conn)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
        role: row.get("role"),
        banned: row.get("banned"),
        image: row.get("image"),
        password_hash: row.get("password_hash"),
        created_at_unix: row.get("created_at_unix"),
    }
}

fn session_from_row(row: &PgRow) -> SessionRecord {
    SessionRecord {
        user_id: row.get("user_id"),
        issued_at_unix: row.get("issued_at_unix"),
        expires_at_unix: row.get("expires_at_unix"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Escape `LIKE` metacharacters so user input matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Split a schema file into statements, skipping comment-only lines.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

impl PgStore {
    async fn fetch_user(&self, query: &str, operation: &'static str, id: Uuid) -> Result<Option<UserRecord>> {
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span!(operation, query))
            .await
            .context("failed to fetch user")?;
        Ok(row.as_ref().map(user_from_row))
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome> {
        let query = format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .instrument(db_span!("INSERT", query.as_str()))
            .await;

        match row {
            Ok(row) => Ok(CreateUserOutcome::Created(user_from_row(&row))),
            Err(err) if is_unique_violation(&err) => Ok(CreateUserOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.fetch_user(&query, "SELECT", id).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span!("SELECT", query.as_str()))
            .await
            .context("failed to lookup user by email")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn list_users(&self, offset: i64, limit: i64) -> Result<UserPage> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC, id OFFSET $1 LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(db_span!("SELECT", query.as_str()))
            .await
            .context("failed to list users")?;

        let count_query = "SELECT COUNT(*) AS total FROM users";
        let total: i64 = sqlx::query(count_query)
            .fetch_one(&self.pool)
            .instrument(db_span!("SELECT", count_query))
            .await
            .context("failed to count users")?
            .get("total");

        Ok(UserPage {
            users: rows.iter().map(user_from_row).collect(),
            total,
        })
    }

    async fn search_users(&self, query_text: &str, limit: i64) -> Result<Vec<UserRecord>> {
        let query = format!(
            r"SELECT {USER_COLUMNS} FROM users
              WHERE name ILIKE '%' || $1 || '%' ESCAPE '\'
              ORDER BY name, id
              LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(escape_like(query_text))
            .bind(limit)
            .fetch_all(&self.pool)
            .instrument(db_span!("SELECT", query.as_str()))
            .await
            .context("failed to search users")?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn update_profile(&self, id: Uuid, update: ProfileUpdate) -> Result<Option<UserRecord>> {
        let query = format!(
            r"UPDATE users
              SET name = COALESCE($1, name),
                  image = COALESCE($2, image),
                  updated_at = NOW()
              WHERE id = $3
              RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(update.name)
            .bind(update.image)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span!("UPDATE", query.as_str()))
            .await
            .context("failed to update user profile")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_role(&self, id: Uuid, role: Option<String>) -> Result<Option<UserRecord>> {
        let query = format!(
            "UPDATE users SET role = $1, updated_at = NOW() WHERE id = $2 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(role)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span!("UPDATE", query.as_str()))
            .await
            .context("failed to set user role")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_banned(&self, id: Uuid, banned: bool) -> Result<Option<UserRecord>> {
        let query = format!(
            "UPDATE users SET banned = $1, updated_at = NOW() WHERE id = $2 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(banned)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span!("UPDATE", query.as_str()))
            .await
            .context("failed to set banned flag")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let query = "UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2";
        let result = sqlx::query(query)
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span!("UPDATE", query))
            .await
            .context("failed to update password hash")?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_email_verified(&self, id: Uuid) -> Result<bool> {
        let query = "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span!("UPDATE", query))
            .await
            .context("failed to mark email verified")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        // Sessions and tokens cascade via foreign keys; deleting sessions first
        // keeps the revocation explicit inside the same transaction.
        let mut tx = self.pool.begin().await.context("begin delete user")?;

        let query = "DELETE FROM sessions WHERE user_id = $1";
        sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(db_span!("DELETE", query))
            .await
            .context("failed to delete user sessions")?;

        let query = "DELETE FROM users WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(db_span!("DELETE", query))
            .await
            .context("failed to delete user")?;

        tx.commit().await.context("commit delete user")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn insert_session(
        &self,
        token_hash: &[u8],
        user_id: Uuid,
        ttl_seconds: i64,
    ) -> Result<SessionRecord> {
        let query = r"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
            RETURNING
                user_id,
                EXTRACT(EPOCH FROM created_at)::BIGINT AS issued_at_unix,
                EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(user_id)
            .bind(ttl_seconds)
            .fetch_one(&self.pool)
            .instrument(db_span!("INSERT", query))
            .await
            .context("failed to insert session")?;
        Ok(session_from_row(&row))
    }

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT
                user_id,
                EXTRACT(EPOCH FROM created_at)::BIGINT AS issued_at_unix,
                EXTRACT(EPOCH FROM expires_at)::BIGINT AS expires_at_unix
            FROM sessions
            WHERE token_hash = $1 AND expires_at > NOW()
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span!("SELECT", query))
            .await
            .context("failed to lookup session")?;
        Ok(row.as_ref().map(session_from_row))
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(db_span!("DELETE", query))
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: Uuid) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE user_id = $1";
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(db_span!("DELETE", query))
            .await
            .context("failed to delete user sessions")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()> {
        let query = r"
            INSERT INTO verification_tokens (token_hash, kind, user_id, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ";
        sqlx::query(query)
            .bind(token_hash)
            .bind(kind.as_str())
            .bind(user_id)
            .bind(ttl_seconds)
            .execute(&self.pool)
            .instrument(db_span!("INSERT", query))
            .await
            .context("failed to insert verification token")?;
        Ok(())
    }

    async fn consume_token(&self, kind: TokenKind, token_hash: &[u8]) -> Result<Option<Uuid>> {
        // Single statement: the row is gone whether or not it was still valid.
        let query = r"
            WITH consumed AS (
                DELETE FROM verification_tokens
                WHERE token_hash = $1 AND kind = $2
                RETURNING user_id, expires_at
            )
            SELECT user_id FROM consumed WHERE expires_at > NOW()
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .instrument(db_span!("DELETE", query))
            .await
            .context("failed to consume verification token")?;
        Ok(row.map(|row| row.get("user_id")))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await
            .context("failed to acquire database connection")?;
        let conn: &mut PgConnection = &mut conn;
        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await
            .context("failed to ping database")
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
