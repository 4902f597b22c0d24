//! SQLite Storage for execution audit rows
//!
//! Every audited agent execution is written here on creation and on each status
//! change. The coordinator never reads rows back while an execution is in flight;
//! reads exist for the history API and for tests.
//!
//! ## Migration System
//!
//! Database schema is versioned. Migrations run automatically on startup.
//! - Version 1: Initial schema (executions)
//! - Version 2: Add started_by column

use crate::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

const EXECUTION_COLUMNS: &str = r#"
    id, agent_id, status, task_input, parameters, result, execution_history,
    error_message, config_version_used, started_by, started_at, completed_at
"#;

/// Storage service for execution audit rows
#[derive(Clone)]
pub struct AuditStorage {
    conn: Arc<Mutex<Connection>>,
}

impl AuditStorage {
    /// Open (or create) the database file
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        Self::with_connection(conn)
    }

    /// Create an in-memory storage (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        storage.initialize_schema()?;
        storage.run_migrations()?;

        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    /// Get current schema version from database
    pub fn get_schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to get schema version: {}", e)))
    }

    /// Initialize database schema (base tables)
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- Execution audit rows
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                status TEXT NOT NULL CHECK(status IN ('pending', 'running', 'completed', 'failed', 'cancelled')),
                task_input TEXT,
                parameters TEXT NOT NULL DEFAULT '{}',
                result TEXT,
                execution_history TEXT NOT NULL DEFAULT '[]',
                error_message TEXT,
                config_version_used INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_executions_agent
                ON executions(agent_id, started_at);

            -- Insert initial schema version if not exists
            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Run all pending migrations
    fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version()?;

        if current_version >= CURRENT_SCHEMA_VERSION {
            debug!(
                "Database schema is up to date (version {})",
                current_version
            );
            return Ok(());
        }

        info!(
            "Running database migrations from version {} to {}",
            current_version, CURRENT_SCHEMA_VERSION
        );

        let conn = self.lock()?;

        for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
            match version {
                2 => Self::migrate_v2(&conn)?,
                _ => {
                    warn!("Unknown migration version: {}", version);
                }
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![version],
            )
            .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;

            info!("Applied migration to version {}", version);
        }

        Ok(())
    }

    /// Migration to version 2: record which actor started the execution
    fn migrate_v2(conn: &Connection) -> Result<()> {
        // Column may already exist on databases created by a newer binary
        let _ = conn.execute("ALTER TABLE executions ADD COLUMN started_by TEXT", []);
        Ok(())
    }

    // ========================================================================
    // Execution Operations
    // ========================================================================

    /// Insert a new execution row
    pub fn create_execution(&self, record: &ExecutionRow) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO executions (
                id, agent_id, status, task_input, parameters, result, execution_history,
                error_message, config_version_used, started_by, started_at, completed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                record.id,
                record.agent_id,
                record.status,
                record.task_input,
                record.parameters,
                record.result,
                record.execution_history,
                record.error_message,
                record.config_version_used,
                record.started_by,
                record.started_at,
                record.completed_at,
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to create execution: {}", e)))?;

        Ok(())
    }

    /// Update the mutable columns of an execution row.
    ///
    /// `config_version_used`, `agent_id` and `started_at` are never rewritten.
    pub fn update_execution(&self, record: &ExecutionRow) -> Result<()> {
        let conn = self.lock()?;

        let changed = conn
            .execute(
                r#"
                UPDATE executions SET
                    status = ?2,
                    result = ?3,
                    execution_history = ?4,
                    error_message = ?5,
                    completed_at = ?6
                WHERE id = ?1
                "#,
                params![
                    record.id,
                    record.status,
                    record.result,
                    record.execution_history,
                    record.error_message,
                    record.completed_at,
                ],
            )
            .map_err(|e| Error::Storage(format!("Failed to update execution: {}", e)))?;

        if changed == 0 {
            return Err(Error::Storage(format!(
                "Execution {} has no audit row",
                record.id
            )));
        }

        Ok(())
    }

    /// Get an execution row by ID
    pub fn get_execution(&self, id: &str) -> Result<Option<ExecutionRow>> {
        let conn = self.lock()?;

        conn.query_row(
            &format!("SELECT {} FROM executions WHERE id = ?1", EXECUTION_COLUMNS),
            params![id],
            ExecutionRow::from_row,
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get execution: {}", e)))
    }

    /// Execution rows for one agent, newest first
    pub fn get_executions_for_agent(
        &self,
        agent_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<ExecutionRow>> {
        let conn = self.lock()?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM executions WHERE agent_id = ?1 \
                 ORDER BY started_at DESC LIMIT ?2 OFFSET ?3",
                EXECUTION_COLUMNS
            ))
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(
                params![agent_id, limit as i64, skip as i64],
                ExecutionRow::from_row,
            )
            .map_err(|e| Error::Storage(format!("Failed to query executions: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Delete an execution row
    pub fn delete_execution(&self, id: &str) -> Result<bool> {
        let conn = self.lock()?;

        let changed = conn
            .execute("DELETE FROM executions WHERE id = ?1", params![id])
            .map_err(|e| Error::Storage(format!("Failed to delete execution: {}", e)))?;

        Ok(changed > 0)
    }
}

// ============================================================================
// Record Types
// ============================================================================

/// Execution audit row (JSON columns are stored as text)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRow {
    pub id: String,
    pub agent_id: String,
    pub status: String,
    pub task_input: Option<String>,
    pub parameters: String,
    pub result: Option<String>,
    pub execution_history: String,
    pub error_message: Option<String>,
    pub config_version_used: i64,
    pub started_by: Option<String>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            status: row.get(2)?,
            task_input: row.get(3)?,
            parameters: row.get(4)?,
            result: row.get(5)?,
            execution_history: row.get(6)?,
            error_message: row.get(7)?,
            config_version_used: row.get(8)?,
            started_by: row.get(9)?,
            started_at: row.get(10)?,
            completed_at: row.get(11)?,
        })
    }
}
