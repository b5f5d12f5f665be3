//! SQLite Database
//!
//! Embedded database for uploaded files and analysis results using rusqlite
//! with r2d2 connection pooling.

use std::path::Path;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// Raw uploaded file row from the database
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFileRow {
    pub id: String,
    pub file_name: String,
    /// Location of the payload; relative paths resolve against the storage root
    pub file_path: String,
    pub status: String,
    pub result_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Raw analysis result row from the database
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResultRow {
    pub id: String,
    pub analysis_id: String,
    pub file_id: String,
    pub model_type: String,
    pub industry: String,
    /// JSON result document
    pub result: String,
    /// JSON metrics document
    pub metrics: String,
    pub fallback: bool,
    pub created_at: Option<String>,
}

/// Fields of a new analysis result
#[derive(Debug, Clone)]
pub struct NewAnalysisResult<'a> {
    pub analysis_id: &'a str,
    pub file_id: &'a str,
    pub model_type: &'a str,
    pub industry: &'a str,
    pub result: &'a str,
    pub metrics: &'a str,
    pub fallback: bool,
}

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a database from an existing connection pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an in-memory database for testing.
    ///
    /// Uses an in-memory SQLite database with the same schema as the
    /// production database. The pool holds a single connection so every
    /// caller sees the same data.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Create a database at the default location (~/.ml-analysis/analysis.db)
    pub fn new() -> AppResult<Self> {
        Self::open(&database_path()?)
    }

    /// Create a database backed by an explicit file with connection pooling
    pub fn open(db_path: &Path) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        // Create uploaded files table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS uploaded_files (
                id TEXT PRIMARY KEY,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'uploaded',
                result_id TEXT,
                error_message TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        // Create analysis results table
        conn.execute(
            "CREATE TABLE IF NOT EXISTS analysis_results (
                id TEXT PRIMARY KEY,
                analysis_id TEXT NOT NULL,
                file_id TEXT NOT NULL,
                model_type TEXT NOT NULL,
                industry TEXT NOT NULL,
                result TEXT NOT NULL,
                metrics TEXT NOT NULL,
                fallback INTEGER NOT NULL DEFAULT 0,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_analysis_results_file
             ON analysis_results(file_id)",
            [],
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }

    // ========================================================================
    // Uploaded File Operations
    // ========================================================================

    /// Register an uploaded file in the `uploaded` state
    pub fn register_file(&self, id: &str, file_name: &str, file_path: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO uploaded_files (id, file_name, file_path, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, 'uploaded', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
            params![id, file_name, file_path],
        )?;
        Ok(())
    }

    /// Get a single uploaded file by ID
    pub fn get_file(&self, id: &str) -> AppResult<Option<UploadedFileRow>> {
        let conn = self.get_connection()?;
        let result = conn.query_row(
            "SELECT id, file_name, file_path, status, result_id, error_message,
                    created_at, updated_at
             FROM uploaded_files WHERE id = ?1",
            params![id],
            Self::row_to_uploaded_file,
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// List uploaded files, most recently updated first
    pub fn list_files(&self) -> AppResult<Vec<UploadedFileRow>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, file_name, file_path, status, result_id, error_message,
                    created_at, updated_at
             FROM uploaded_files
             ORDER BY updated_at DESC, id",
        )?;

        let rows = stmt
            .query_map([], Self::row_to_uploaded_file)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    /// Update the status of an uploaded file.
    ///
    /// `result_id` and `error_message` are only overwritten when provided.
    /// Updating an unknown file is a `NotFound` error.
    pub fn update_file_status(
        &self,
        id: &str,
        status: &str,
        result_id: Option<&str>,
        error_message: Option<&str>,
    ) -> AppResult<()> {
        let conn = self.get_connection()?;
        let updated = conn.execute(
            "UPDATE uploaded_files
             SET status = ?2,
                 result_id = COALESCE(?3, result_id),
                 error_message = COALESCE(?4, error_message),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![id, status, result_id, error_message],
        )?;

        if updated == 0 {
            return Err(AppError::not_found(format!("Uploaded file {}", id)));
        }
        Ok(())
    }

    /// Delete an uploaded file record
    pub fn delete_file(&self, id: &str) -> AppResult<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM uploaded_files WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn row_to_uploaded_file(row: &rusqlite::Row) -> rusqlite::Result<UploadedFileRow> {
        Ok(UploadedFileRow {
            id: row.get(0)?,
            file_name: row.get(1)?,
            file_path: row.get(2)?,
            status: row.get(3)?,
            result_id: row.get(4)?,
            error_message: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    // ========================================================================
    // Analysis Result Operations
    // ========================================================================

    /// Insert an analysis result and return its generated ID
    pub fn insert_analysis_result(&self, record: &NewAnalysisResult<'_>) -> AppResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO analysis_results
                (id, analysis_id, file_id, model_type, industry,
                 result, metrics, fallback, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)",
            params![
                id,
                record.analysis_id,
                record.file_id,
                record.model_type,
                record.industry,
                record.result,
                record.metrics,
                record.fallback,
            ],
        )?;
        Ok(id)
    }

    /// Get a single analysis result by ID
    pub fn get_analysis_result(&self, id: &str) -> AppResult<Option<AnalysisResultRow>> {
        let conn = self.get_connection()?;
        let result = conn.query_row(
            "SELECT id, analysis_id, file_id, model_type, industry, result, metrics,
                    fallback, created_at
             FROM analysis_results WHERE id = ?1",
            params![id],
            Self::row_to_analysis_result,
        );

        match result {
            Ok(row) => Ok(Some(row)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::database(e.to_string())),
        }
    }

    /// All results stored for one uploaded file, oldest first
    pub fn get_results_for_file(&self, file_id: &str) -> AppResult<Vec<AnalysisResultRow>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, analysis_id, file_id, model_type, industry, result, metrics,
                    fallback, created_at
             FROM analysis_results
             WHERE file_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt
            .query_map(params![file_id], Self::row_to_analysis_result)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(rows)
    }

    fn row_to_analysis_result(row: &rusqlite::Row) -> rusqlite::Result<AnalysisResultRow> {
        Ok(AnalysisResultRow {
            id: row.get(0)?,
            analysis_id: row.get(1)?,
            file_id: row.get(2)?,
            model_type: row.get(3)?,
            industry: row.get(4)?,
            result: row.get(5)?,
            metrics: row.get(6)?,
            fallback: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("pool_size", &self.pool.state().connections)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Database {
        Database::new_in_memory().unwrap()
    }

    fn sample_result<'a>(file_id: &'a str) -> NewAnalysisResult<'a> {
        NewAnalysisResult {
            analysis_id: "analysis-1",
            file_id,
            model_type: "kmeans",
            industry: "retail",
            result: r#"{"summary":"ok"}"#,
            metrics: r#"{"n_clusters":3}"#,
            fallback: false,
        }
    }

    #[test]
    fn test_database_health() {
        let db = create_test_db();
        assert!(db.is_healthy());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let db = create_test_db();
        db.init_schema().unwrap();
        assert!(db.is_healthy());
    }

    #[test]
    fn test_uploaded_file_lifecycle() {
        let db = create_test_db();
        db.register_file("file-1", "ventas.xlsx", "uploads/ventas.xlsx").unwrap();

        let row = db.get_file("file-1").unwrap().unwrap();
        assert_eq!(row.status, "uploaded");
        assert!(row.result_id.is_none());

        db.update_file_status("file-1", "processing", None, None).unwrap();
        db.update_file_status("file-1", "completed", Some("result-9"), None)
            .unwrap();

        let row = db.get_file("file-1").unwrap().unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.result_id.as_deref(), Some("result-9"));
    }

    #[test]
    fn test_status_update_keeps_existing_result_id() {
        let db = create_test_db();
        db.register_file("file-1", "a.json", "a.json").unwrap();
        db.update_file_status("file-1", "completed", Some("r1"), None).unwrap();
        db.update_file_status("file-1", "processing", None, None).unwrap();
        let row = db.get_file("file-1").unwrap().unwrap();
        assert_eq!(row.result_id.as_deref(), Some("r1"));
    }

    #[test]
    fn test_update_unknown_file_is_not_found() {
        let db = create_test_db();
        let err = db
            .update_file_status("missing", "failed", None, Some("boom"))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_get_missing_file_returns_none() {
        let db = create_test_db();
        assert!(db.get_file("nope").unwrap().is_none());
        assert!(db.get_analysis_result("nope").unwrap().is_none());
    }

    #[test]
    fn test_insert_and_get_analysis_result() {
        let db = create_test_db();
        let id = db.insert_analysis_result(&sample_result("file-1")).unwrap();

        let row = db.get_analysis_result(&id).unwrap().unwrap();
        assert_eq!(row.model_type, "kmeans");
        assert_eq!(row.file_id, "file-1");
        assert!(!row.fallback);

        let second = db.insert_analysis_result(&sample_result("file-1")).unwrap();
        assert_ne!(id, second);
        let rows = db.get_results_for_file("file-1").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, id);
    }

    #[test]
    fn test_list_and_delete_files() {
        let db = create_test_db();
        db.register_file("a", "a.json", "a.json").unwrap();
        db.register_file("b", "b.json", "b.json").unwrap();
        assert_eq!(db.list_files().unwrap().len(), 2);

        db.delete_file("a").unwrap();
        let files = db.list_files().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "b");
    }
}
