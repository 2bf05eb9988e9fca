//! Transaction persistence on `SQLite`

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use uuid::Uuid;

use super::Category;
use crate::{Error, Result};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id),
    amount REAL NOT NULL,
    category TEXT NOT NULL,
    description TEXT,
    input_method TEXT NOT NULL DEFAULT 'voice',
    occurred_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_user
    ON transactions(user_id, occurred_at DESC);

CREATE TABLE IF NOT EXISTS tool_call_receipts (
    session_id TEXT NOT NULL,
    call_id TEXT NOT NULL,
    transaction_id TEXT NOT NULL REFERENCES transactions(id),
    created_at TEXT NOT NULL,
    PRIMARY KEY (session_id, call_id)
);
";

/// Initialize the database
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    conn.execute_batch(SCHEMA)?;

    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    conn.execute_batch(SCHEMA)?;

    Ok(pool)
}

/// A user transactions are attributed to
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// A durable transaction record
#[derive(Debug, Clone)]
pub struct PersistedTransaction {
    pub id: String,
    pub user_id: String,
    pub amount: f64,
    pub category: Category,
    pub description: Option<String>,
    pub input_method: String,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// User repository
#[derive(Clone)]
pub struct UserRepo {
    pool: DbPool,
}

impl UserRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find or create a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_or_create(&self, id: &str) -> Result<User> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let existing: Option<User> = conn
            .query_row(
                "SELECT id, created_at FROM users WHERE id = ?1",
                [id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        created_at: parse_datetime(&row.get::<_, String>(1)?),
                    })
                },
            )
            .ok();

        if let Some(user) = existing {
            return Ok(user);
        }

        let now = Utc::now();
        conn.execute(
            "INSERT INTO users (id, created_at) VALUES (?1, ?2)",
            [id, &now.to_rfc3339()],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(User {
            id: id.to_string(),
            created_at: now,
        })
    }
}

/// Transaction repository
#[derive(Clone)]
pub struct TransactionRepo {
    pool: DbPool,
}

impl TransactionRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a transaction
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create(
        &self,
        user_id: &str,
        amount: f64,
        category: Category,
        description: Option<&str>,
        input_method: &str,
    ) -> Result<PersistedTransaction> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let record = build_record(user_id, amount, category, description, input_method);
        insert_transaction(&conn, &record)?;

        Ok(record)
    }

    /// Insert a transaction attributed to a tool call, exactly once per
    /// `(session_id, call_id)`
    ///
    /// Tool delivery is at-least-once; a replayed call id returns the
    /// originally persisted record instead of inserting a duplicate.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn create_for_call(
        &self,
        session_id: &str,
        call_id: &str,
        user_id: &str,
        amount: f64,
        category: Category,
        description: Option<&str>,
    ) -> Result<PersistedTransaction> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let tx = conn.transaction()?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT transaction_id FROM tool_call_receipts
                 WHERE session_id = ?1 AND call_id = ?2",
                [session_id, call_id],
                |row| row.get(0),
            )
            .ok();

        if let Some(transaction_id) = existing {
            tracing::debug!(call_id, "duplicate tool call, returning existing record");
            let found = find_transaction(&tx, &transaction_id)?;
            return found.ok_or_else(|| {
                Error::Database(format!(
                    "receipt for call {call_id} points at a missing transaction"
                ))
            });
        }

        let record = build_record(user_id, amount, category, description, "voice");
        insert_transaction(&tx, &record)?;
        tx.execute(
            "INSERT INTO tool_call_receipts (session_id, call_id, transaction_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                session_id,
                call_id,
                record.id,
                record.created_at.to_rfc3339()
            ],
        )?;
        tx.commit()?;

        Ok(record)
    }

    /// Find a transaction by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find(&self, id: &str) -> Result<Option<PersistedTransaction>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        find_transaction(&conn, id)
    }

    /// Most recent transactions for a user, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_recent(&self, user_id: &str, limit: usize) -> Result<Vec<PersistedTransaction>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, amount, category, description, input_method,
                    occurred_at, created_at
             FROM transactions WHERE user_id = ?1
             ORDER BY occurred_at DESC LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(rusqlite::params![user_id, limit], map_transaction_row)?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(rows)
    }

    /// Count of all transactions for a user
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self, user_id: &str) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }
}

fn build_record(
    user_id: &str,
    amount: f64,
    category: Category,
    description: Option<&str>,
    input_method: &str,
) -> PersistedTransaction {
    let now = Utc::now();
    PersistedTransaction {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        amount,
        category,
        description: description.map(ToString::to_string),
        input_method: input_method.to_string(),
        occurred_at: now,
        created_at: now,
    }
}

fn insert_transaction(conn: &Connection, record: &PersistedTransaction) -> Result<()> {
    conn.execute(
        "INSERT INTO transactions
             (id, user_id, amount, category, description, input_method, occurred_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            record.id,
            record.user_id,
            record.amount,
            record.category.as_str(),
            record.description,
            record.input_method,
            record.occurred_at.to_rfc3339(),
            record.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn find_transaction(conn: &Connection, id: &str) -> Result<Option<PersistedTransaction>> {
    let found = conn
        .query_row(
            "SELECT id, user_id, amount, category, description, input_method,
                    occurred_at, created_at
             FROM transactions WHERE id = ?1",
            [id],
            map_transaction_row,
        )
        .ok();

    Ok(found)
}

fn map_transaction_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PersistedTransaction> {
    Ok(PersistedTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        category: parse_category(&row.get::<_, String>(3)?),
        description: row.get(4)?,
        input_method: row.get(5)?,
        occurred_at: parse_datetime(&row.get::<_, String>(6)?),
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

/// Rows are written from validated input, so an unreadable category can
/// only come from external edits; fold it into `Other` rather than fail
/// the whole listing
fn parse_category(s: &str) -> Category {
    Category::from_str(s).unwrap_or(Category::Other)
}
