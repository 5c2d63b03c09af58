use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use tessera_api::{Cell, Error, Result, Stage};

use crate::dialect::Dialect;
use crate::options::RdbOptions;
use crate::scan::Scanner;

// ════════════════════════════════════════════════════════════════
//  Driver seam
// ════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("unknown driver `{0}`")]
    UnknownDriver(String),

    #[error("column {column}: {reason}")]
    Scan { column: usize, reason: String },

    #[error("{0}")]
    Backend(String),
}

impl DriverError {
    pub fn backend(msg: impl Into<String>) -> Self {
        DriverError::Backend(msg.into())
    }
}

/// Value as a driver hands it over while scanning a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Native {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// Result column as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// Native type name, e.g. `VARCHAR(32)`, `BIGINT`, `FLOAT8`.
    pub type_name: String,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { name: name.into(), type_name: type_name.into() }
    }
}

/// Opens connections for one driver name.
pub trait Connector: Send + Sync {
    fn open(&self, info: &str) -> std::result::Result<Box<dyn Connection>, DriverError>;
}

/// One database connection. Not shared between concurrent writers:
/// callers serialize access through [`SharedConnection`].
pub trait Connection: Send {
    fn execute(&mut self, sql: &str) -> std::result::Result<u64, DriverError>;

    fn query(&mut self, sql: &str) -> std::result::Result<Box<dyn Rows>, DriverError>;

    fn begin(&mut self) -> std::result::Result<(), DriverError>;

    fn commit(&mut self) -> std::result::Result<(), DriverError>;

    fn rollback(&mut self) -> std::result::Result<(), DriverError>;

    /// Prepare a statement inside the current transaction.
    fn prepare(&mut self, sql: &str) -> std::result::Result<Box<dyn Statement>, DriverError>;

    fn close(&mut self) -> std::result::Result<(), DriverError>;
}

pub trait Statement: Send {
    /// Execute with one parameter per placeholder; `None` binds NULL.
    fn execute(&mut self, params: &[Cell]) -> std::result::Result<u64, DriverError>;

    fn close(&mut self) -> std::result::Result<(), DriverError>;
}

/// Open result set of a query.
pub trait Rows: Send {
    fn columns(&self) -> &[ColumnInfo];

    /// Advance and scan the next row into `dest` (one scanner per
    /// column). `Ok(false)` at the end of the result set.
    fn next_row(&mut self, dest: &mut [Scanner]) -> std::result::Result<bool, DriverError>;

    fn close(&mut self) -> std::result::Result<(), DriverError>;
}

pub type SharedConnection = Arc<Mutex<Box<dyn Connection>>>;

// ════════════════════════════════════════════════════════════════
//  Registry
// ════════════════════════════════════════════════════════════════

fn drivers() -> &'static RwLock<HashMap<String, Arc<dyn Connector>>> {
    static DRIVERS: OnceLock<RwLock<HashMap<String, Arc<dyn Connector>>>> = OnceLock::new();
    DRIVERS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register `connector` under `name`, replacing any previous one.
pub fn register(name: impl Into<String>, connector: Arc<dyn Connector>) {
    drivers().write().insert(name.into(), connector);
}

pub fn connector(name: &str) -> Option<Arc<dyn Connector>> {
    drivers().read().get(name).cloned()
}

// ════════════════════════════════════════════════════════════════
//  Database handle
// ════════════════════════════════════════════════════════════════

/// Where a source or sink gets its connection from.
#[derive(Clone)]
pub enum Database {
    /// `driver:connection-info`; the adapter opens and closes it.
    Url(String),
    /// Caller-owned connection; the adapter never closes it.
    Open(SharedConnection),
}

impl Database {
    pub fn url(url: impl Into<String>) -> Self {
        Database::Url(url.into())
    }

    pub fn open(conn: Box<dyn Connection>) -> Self {
        Database::Open(Arc::new(Mutex::new(conn)))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Database::Url(url) => {
                let (driver, _) = url.split_once(':').unwrap_or((url.as_str(), ""));
                write!(f, "Database::Url({driver}:…)")
            }
            Database::Open(_) => f.write_str("Database::Open"),
        }
    }
}

/// Split `driver:rest` on the first colon.
pub fn split_driver(url: &str) -> Result<(&str, &str)> {
    url.split_once(':')
        .filter(|(driver, _)| !driver.is_empty())
        .ok_or_else(|| Error::config(format!("connection string must look like `driver:info`, got `{url}`")))
}

/// A connection plus whether this adapter owns it.
pub(crate) struct Handle {
    conn: SharedConnection,
    owned: bool,
    closed: bool,
}

impl Handle {
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut dyn Connection) -> R) -> R {
        let mut guard = self.conn.lock();
        f(guard.as_mut())
    }

    /// Close the connection if owned. Idempotent.
    pub(crate) fn close(&mut self) -> std::result::Result<(), DriverError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.owned {
            self.conn.lock().close()?;
        }
        Ok(())
    }
}

/// Resolve the handle and the SQL dialect to speak on it.
pub(crate) fn connect(db: &Database, options: &RdbOptions) -> Result<(Handle, Dialect)> {
    match db {
        Database::Url(url) => {
            let (driver, info) = split_driver(url)?;
            let connector = connector(driver)
                .ok_or_else(|| Error::stage(Stage::Connection, DriverError::UnknownDriver(driver.to_string())))?;
            let conn = connector.open(info).map_err(|e| Error::stage(Stage::Connection, e))?;
            tracing::debug!(driver, "database connection opened");
            let handle = Handle { conn: Arc::new(Mutex::new(conn)), owned: true, closed: false };
            Ok((handle, Dialect::from_driver(driver)))
        }
        Database::Open(conn) => {
            let driver = options.driver.as_deref().unwrap_or_default();
            let handle = Handle { conn: Arc::clone(conn), owned: false, closed: false };
            Ok((handle, Dialect::from_driver(driver)))
        }
    }
}

/// Issue the dialect's schema-selection statement, if any.
pub(crate) fn select_schema(handle: &Handle, dialect: Dialect, options: &RdbOptions) -> Result<()> {
    let Some(schema) = options.schema.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    if let Some(sql) = dialect.select_schema(schema) {
        tracing::debug!(%sql, "select schema");
        handle.with(|c| c.execute(&sql)).map_err(|e| Error::stage(Stage::Query, e))?;
    }
    Ok(())
}
