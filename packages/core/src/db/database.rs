//! Database Connection Management
//!
//! This module provides the database connection and schema initialization
//! for menu storage on top of libsql.
//!
//! # Architecture
//!
//! - **Path-agnostic**: Accepts any valid PathBuf
//! - **Single table**: every item of every menu lives in `menu_items`
//! - **WAL mode**: readers see the last committed state while a writer works
//! - **Foreign keys**: `parent_id` cascades deletes down a subtree
//!
//! # Database Connection Patterns
//!
//! Use `connect_with_timeout()` in async functions. The 5-second busy timeout
//! lets concurrent writers wait for the lock instead of failing immediately
//! with `SQLITE_BUSY`.
//!
//! ```no_run
//! # use menutree_core::db::DatabaseService;
//! # use std::path::PathBuf;
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db_service = DatabaseService::new(PathBuf::from("./data/menutree.db")).await?;
//! let conn = db_service.connect_with_timeout().await?;
//! # Ok(())
//! # }
//! ```

use crate::db::error::DatabaseError;
use libsql::{Builder, Database};
use std::path::PathBuf;
use std::sync::Arc;

/// Database service for managing the libsql connection and schema
#[derive(Debug, Clone)]
pub struct DatabaseService {
    /// libsql database handle (wrapped in Arc for sharing)
    pub db: Arc<Database>,

    /// Path to the database file
    pub db_path: PathBuf,
}

impl DatabaseService {
    /// Open (or create) the database at `db_path`
    ///
    /// This will:
    /// 1. Ensure the parent directory exists (create if needed)
    /// 2. Open/create the database file
    /// 3. Enable WAL mode, busy timeout and foreign keys
    /// 4. Create the schema (CREATE TABLE IF NOT EXISTS)
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if db_path.as_os_str().is_empty() {
            return Err(DatabaseError::invalid_path(db_path));
        }
        let is_new_database = !db_path.exists();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        DatabaseError::permission_denied(db_path.clone())
                    } else {
                        DatabaseError::DirectoryCreationFailed(e)
                    }
                })?;
            }
        }

        let db = Builder::new_local(&db_path)
            .build()
            .await
            .map_err(|e| DatabaseError::connection_failed(db_path.clone(), e))?;

        let service = Self {
            db: Arc::new(db),
            db_path,
        };
        service.initialize_schema(is_new_database).await?;

        tracing::info!("Menu database ready at {}", service.db_path.display());
        Ok(service)
    }

    /// Execute a PRAGMA statement
    ///
    /// PRAGMA statements return rows, so they go through query() instead of execute().
    async fn execute_pragma(
        &self,
        conn: &libsql::Connection,
        pragma: &str,
    ) -> Result<(), DatabaseError> {
        let mut stmt = conn.prepare(pragma).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        let _ = stmt.query(()).await.map_err(|e| {
            DatabaseError::sql_execution(format!("Failed to execute '{}': {}", pragma, e))
        })?;
        Ok(())
    }

    /// Initialize database schema and configuration
    ///
    /// # Schema
    ///
    /// `menu_items`: one row per item. `slug` and `max_depth` are only set on
    /// root rows (`parent_id IS NULL`). The parent foreign key is deferred so
    /// a transaction may write a subtree in any order.
    async fn initialize_schema(&self, is_new_database: bool) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;

        self.execute_pragma(&conn, "PRAGMA journal_mode = WAL")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS menu_items (
                id TEXT PRIMARY KEY,
                tree_id TEXT NOT NULL,
                parent_id TEXT,
                range_start INTEGER NOT NULL,
                range_end INTEGER NOT NULL,
                depth INTEGER NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                link_kind TEXT,
                url TEXT,
                resource_type TEXT,
                resource_id TEXT,
                fallback_url TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                display_at TEXT,
                hide_at TEXT,
                slug TEXT UNIQUE,
                max_depth INTEGER,
                created_at TEXT NOT NULL,
                modified_at TEXT NOT NULL,
                CHECK (range_start < range_end),
                -- Deleting an item deletes its subtree
                FOREIGN KEY (parent_id) REFERENCES menu_items(id)
                    ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED
            )",
            (),
        )
        .await
        .map_err(|e| {
            DatabaseError::initialization_failed(format!(
                "Failed to create menu_items table: {}",
                e
            ))
        })?;

        self.create_core_indexes(&conn).await?;

        // Flush the schema of a fresh file so other connections see it
        if is_new_database {
            self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
                .await?;
        }

        Ok(())
    }

    async fn create_core_indexes(&self, conn: &libsql::Connection) -> Result<(), DatabaseError> {
        let indexes = [
            (
                "idx_menu_items_tree",
                "CREATE INDEX IF NOT EXISTS idx_menu_items_tree ON menu_items(tree_id)",
            ),
            (
                "idx_menu_items_parent",
                "CREATE INDEX IF NOT EXISTS idx_menu_items_parent ON menu_items(parent_id)",
            ),
            (
                "idx_menu_items_range",
                "CREATE INDEX IF NOT EXISTS idx_menu_items_range ON menu_items(tree_id, range_start)",
            ),
        ];

        for (name, sql) in indexes {
            conn.execute(sql, ()).await.map_err(|e| {
                DatabaseError::initialization_failed(format!(
                    "Failed to create index '{}': {}",
                    name, e
                ))
            })?;
        }
        Ok(())
    }

    /// Get a connection to the database
    ///
    /// Only for synchronous, single-threaded use; async code should call
    /// [`connect_with_timeout`](Self::connect_with_timeout).
    pub fn connect(&self) -> Result<libsql::Connection, DatabaseError> {
        self.db.connect().map_err(DatabaseError::LibsqlError)
    }

    /// Get an async connection with busy timeout and foreign keys configured
    ///
    /// Both pragmas are per connection in SQLite, so every connection used
    /// for writes must go through here.
    pub async fn connect_with_timeout(&self) -> Result<libsql::Connection, DatabaseError> {
        let conn = self.connect()?;

        self.execute_pragma(&conn, "PRAGMA busy_timeout = 5000")
            .await?;
        self.execute_pragma(&conn, "PRAGMA foreign_keys = ON")
            .await?;

        Ok(conn)
    }

    /// Checkpoint the WAL so all committed writes are in the main file
    pub async fn db_close(&self) -> Result<(), DatabaseError> {
        let conn = self.connect_with_timeout().await?;
        self.execute_pragma(&conn, "PRAGMA wal_checkpoint(TRUNCATE)")
            .await?;
        Ok(())
    }
}
