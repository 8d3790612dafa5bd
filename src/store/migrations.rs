//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `init_schema()` checks the
//! `_migrations` table and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS integrations (
            id TEXT PRIMARY KEY,
            address TEXT NOT NULL UNIQUE,
            scope TEXT NOT NULL DEFAULT 'auto',
            active INTEGER NOT NULL DEFAULT 1,
            auto_process INTEGER NOT NULL DEFAULT 0,
            require_confirmation INTEGER NOT NULL DEFAULT 0,
            confidence_threshold REAL NOT NULL DEFAULT 0.7,
            notify_address TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_integrations_address ON integrations(address);

        CREATE TABLE IF NOT EXISTS processing_log (
            id TEXT PRIMARY KEY,
            message_id TEXT NOT NULL UNIQUE,
            integration_id TEXT,
            sender TEXT NOT NULL,
            subject TEXT NOT NULL,
            domain TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            confidence REAL,
            record_type TEXT,
            record_id TEXT,
            error TEXT,
            security_level TEXT NOT NULL DEFAULT 'none',
            security_summary TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_processing_log_status ON processing_log(status);
        CREATE INDEX IF NOT EXISTS idx_processing_log_domain ON processing_log(domain);
        CREATE INDEX IF NOT EXISTS idx_processing_log_created ON processing_log(created_at);

        CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_customers_email ON customers(email);

        CREATE TABLE IF NOT EXISTS quotes (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            request TEXT NOT NULL,
            items TEXT NOT NULL DEFAULT '[]',
            budget TEXT,
            evidence TEXT NOT NULL DEFAULT '{}',
            pending_review INTEGER NOT NULL DEFAULT 0,
            log_entry_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            items TEXT NOT NULL DEFAULT '[]',
            quantity INTEGER,
            needed_by TEXT,
            note TEXT NOT NULL DEFAULT '',
            evidence TEXT NOT NULL DEFAULT '{}',
            pending_review INTEGER NOT NULL DEFAULT 0,
            log_entry_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS repairs (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            item TEXT,
            issue TEXT,
            urgency TEXT NOT NULL DEFAULT 'normal',
            evidence TEXT NOT NULL DEFAULT '{}',
            pending_review INTEGER NOT NULL DEFAULT 0,
            log_entry_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS trade_ins (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            item TEXT,
            metal TEXT,
            asking_value TEXT,
            evidence TEXT NOT NULL DEFAULT '{}',
            pending_review INTEGER NOT NULL DEFAULT 0,
            log_entry_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS communication_notes (
            id TEXT PRIMARY KEY,
            customer_id TEXT NOT NULL,
            topic TEXT,
            summary TEXT NOT NULL,
            evidence TEXT NOT NULL DEFAULT '{}',
            pending_review INTEGER NOT NULL DEFAULT 0,
            log_entry_id TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS notification_queue (
            id TEXT PRIMARY KEY,
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            attempts INTEGER NOT NULL DEFAULT 0,
            next_attempt_at TEXT NOT NULL,
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notification_queue_due
            ON notification_queue(status, next_attempt_at);
    "#,
}];

/// Apply all migrations newer than the recorded version.
pub async fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    let current: i64 = match rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?
    {
        Some(row) => row
            .get(0)
            .map_err(|e| DatabaseError::Migration(e.to_string()))?,
        None => 0,
    };

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql)
            .await
            .map_err(|e| {
                DatabaseError::Migration(format!("{} failed: {e}", migration.name))
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?1, ?2, datetime('now'))",
            libsql::params![migration.version, migration.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

        tracing::info!(version = migration.version, name = migration.name, "migration applied");
    }

    Ok(())
}
