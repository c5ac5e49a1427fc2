//! SQLite connection implementation.
//!
//! Safe wrapper around SQLite's C API implementing the
//! [`Connection`](grouped_scope_core::Connection) trait.

// FFI code matches C integer types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use grouped_scope_core::{
    ColumnInfo, Connection, ConnectionError, ConnectionErrorKind, Error, QueryError,
    QueryErrorKind, Result, Row, Value,
};
use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in serialized mode.
    pub full_mutex: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only touched while holding the connection mutex.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// All access to the underlying handle goes through a mutex, so a single
/// connection can be shared between threads (for example inside an `Arc`
/// captured by a group accessor).
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Finalizes the statement when dropped.
struct Statement {
    raw: *mut ffi::sqlite3_stmt,
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: raw came from a successful sqlite3_prepare_v2
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = error_message(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            };
            tracing::warn!(path = %config.path, error = %msg, "Failed to open SQLite database");
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {msg}"),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, ms);
            }
        }

        tracing::debug!(path = %config.path, version = ffi::version(), "Opened SQLite database");

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteInner>> {
        self.inner.lock().map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "SQLite connection mutex poisoned".to_string(),
                source: None,
            })
        })
    }

    /// Execute SQL directly without preparing (DDL, multi-statement scripts).
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock()?;
        let c_sql = to_c_sql(sql)?;

        let mut errmsg: *mut c_char = ptr::null_mut();
        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if errmsg.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: errmsg was allocated by sqlite3_exec
                unsafe {
                    let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                    ffi::sqlite3_free(errmsg.cast());
                    msg
                }
            };
            tracing::debug!(sql = %sql, error = %msg, "execute_raw failed");
            return Err(Error::Query(QueryError::new(
                error_code_to_kind(rc),
                Some(sql),
                msg,
            )));
        }
        Ok(())
    }

    /// Get the rowid of the most recent successful INSERT.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        let inner = self.lock()?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(inner.db) })
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> Result<u64> {
        let inner = self.lock()?;
        // SAFETY: db is valid
        let n = unsafe { ffi::sqlite3_changes(inner.db) };
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn prepare_bound(db: *mut ffi::sqlite3, sql: &str, params: &[Value]) -> Result<Statement> {
        let stmt = prepare_stmt(db, sql)?;
        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).map_err(|_| bind_error(db, sql, i + 1))?;
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(stmt.raw, index, param) };
            if rc != ffi::SQLITE_OK {
                return Err(bind_error(db, sql, i + 1));
            }
        }
        Ok(stmt)
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.lock()?;
        tracing::trace!(sql = %sql, params = params.len(), "SQLite query");
        let stmt = Self::prepare_bound(inner.db, sql, params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let names = (0..col_count)
            // SAFETY: stmt is valid and i < col_count
            .map(|i| unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{i}")))
            .collect();
        let columns = Arc::new(ColumnInfo::new(names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(stmt.raw) } {
                ffi::SQLITE_ROW => {
                    let values = (0..col_count)
                        // SAFETY: stmt just returned SQLITE_ROW
                        .map(|i| unsafe { types::read_column(stmt.raw, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }

        tracing::trace!(rows = rows.len(), "SQLite query complete");
        Ok(rows)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let inner = self.lock()?;
        tracing::trace!(sql = %sql, params = params.len(), "SQLite execute");
        let stmt = Self::prepare_bound(inner.db, sql, params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
        drop(stmt);

        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let changes = unsafe { ffi::sqlite3_changes(inner.db) };
                Ok(u64::try_from(changes).unwrap_or(0))
            }
            _ => Err(step_error(inner.db, sql)),
        }
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.execute(sql, params)?;
        self.last_insert_rowid()
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.lock() {
            if !inner.db.is_null() {
                // SAFETY: db is valid and no statements outlive the connection
                unsafe {
                    ffi::sqlite3_close_v2(inner.db);
                }
            }
        }
    }
}

fn to_c_sql(sql: &str) -> Result<CString> {
    CString::new(sql).map_err(|_| {
        Error::Query(QueryError::new(
            QueryErrorKind::Syntax,
            Some(sql),
            "SQL contains null byte",
        ))
    })
}

fn prepare_stmt(db: *mut ffi::sqlite3, sql: &str) -> Result<Statement> {
    let c_sql = to_c_sql(sql)?;
    let len = c_int::try_from(c_sql.as_bytes().len()).map_err(|_| {
        Error::Query(QueryError::new(
            QueryErrorKind::DataTruncation,
            Some(sql),
            "SQL text too long",
        ))
    })?;

    let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), len, &mut raw, ptr::null_mut()) };

    if rc != ffi::SQLITE_OK {
        return Err(prepare_error(db, sql));
    }
    Ok(Statement { raw })
}

/// # Safety
/// `db` must be a valid handle.
unsafe fn error_message(db: *mut ffi::sqlite3) -> String {
    // SAFETY: sqlite3_errmsg always returns a valid C string for a valid handle
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

fn prepare_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (error_message(db), ffi::sqlite3_errcode(db)) };
    tracing::debug!(sql = %sql, error = %msg, "prepare failed");
    let kind = match error_code_to_kind(code) {
        QueryErrorKind::Database if msg.contains("syntax error") => QueryErrorKind::Syntax,
        QueryErrorKind::Database if msg.starts_with("no such") => QueryErrorKind::NotFound,
        kind => kind,
    };
    Error::Query(QueryError::new(kind, Some(sql), msg))
}

fn bind_error(db: *mut ffi::sqlite3, sql: &str, param_index: usize) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { error_message(db) };
    Error::Query(QueryError::new(
        QueryErrorKind::Database,
        Some(sql),
        format!("Failed to bind parameter {param_index}: {msg}"),
    ))
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (error_message(db), ffi::sqlite3_errcode(db)) };
    tracing::debug!(sql = %sql, error = %msg, "step failed");
    Error::Query(QueryError::new(error_code_to_kind(code), Some(sql), msg))
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    // Extended codes carry the primary code in the low byte
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        _ => QueryErrorKind::Database,
    }
}
