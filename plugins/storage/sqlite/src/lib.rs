//! SQLite driver for `tessera-rdb`.
//!
//! [`register`] makes `sqlite:<path>` connection strings resolvable; an
//! empty path or `:memory:` opens a private in-memory database.

use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;

use tessera_api::{Cell, Value};
use tessera_rdb::{ColumnInfo, Connection, Connector, DriverError, Native, Rows, Scanner, Statement};

type DriverResult<T> = std::result::Result<T, DriverError>;

fn backend(e: rusqlite::Error) -> DriverError {
    DriverError::backend(e.to_string())
}

/// Register the connector as `sqlite` and `sqlite3`.
pub fn register() {
    let connector: Arc<dyn Connector> = Arc::new(SqliteConnector);
    tessera_rdb::register("sqlite", Arc::clone(&connector));
    tessera_rdb::register("sqlite3", connector);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    fn open(&self, info: &str) -> DriverResult<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::open(info)?))
    }
}

// ════════════════════════════════════════════════════════════════
//  Connection
// ════════════════════════════════════════════════════════════════

type Shared = Arc<Mutex<rusqlite::Connection>>;

/// One SQLite connection. Prepared statements share it and are cached by
/// SQL text, so the same insert is compiled once per connection.
pub struct SqliteConnection {
    conn: Option<Shared>,
}

impl SqliteConnection {
    pub fn open(path: &str) -> DriverResult<Self> {
        let conn = match path.trim() {
            "" | ":memory:" => rusqlite::Connection::open_in_memory(),
            path => rusqlite::Connection::open(path),
        }
        .map_err(backend)?;
        tracing::debug!(path, "sqlite connection opened");
        Ok(Self { conn: Some(Arc::new(Mutex::new(conn))) })
    }

    fn conn(&self) -> DriverResult<&Shared> {
        self.conn.as_ref().ok_or_else(|| DriverError::backend("sqlite connection is closed"))
    }

    fn batch(&self, sql: &str) -> DriverResult<()> {
        self.conn()?.lock().execute_batch(sql).map_err(backend)
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> DriverResult<u64> {
        let changed = self.conn()?.lock().execute(sql, []).map_err(backend)?;
        Ok(changed as u64)
    }

    fn query(&mut self, sql: &str) -> DriverResult<Box<dyn Rows>> {
        let conn = self.conn()?.lock();
        let mut stmt = conn.prepare(sql).map_err(backend)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let declared: Vec<Option<String>> =
            stmt.columns().iter().map(|c| c.decl_type().map(str::to_string)).collect();

        let mut data: Vec<Vec<SqlValue>> = Vec::new();
        let mut rows = stmt.query([]).map_err(backend)?;
        while let Some(row) = rows.next().map_err(backend)? {
            let values = (0..names.len())
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(backend)?;
            data.push(values);
        }

        let columns = names
            .into_iter()
            .zip(declared)
            .enumerate()
            .map(|(i, (name, declared))| {
                let type_name = declared.unwrap_or_else(|| infer_type(&data, i).to_string());
                ColumnInfo::new(name, type_name)
            })
            .collect();
        Ok(Box::new(SqliteRows { columns, data: data.into_iter() }))
    }

    fn begin(&mut self) -> DriverResult<()> {
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.batch("ROLLBACK")
    }

    fn prepare(&mut self, sql: &str) -> DriverResult<Box<dyn Statement>> {
        let conn = Arc::clone(self.conn()?);
        // compile now so syntax errors surface at prepare time
        conn.lock().prepare_cached(sql).map_err(backend)?;
        Ok(Box::new(SqliteStatement { conn: Some(conn), sql: sql.to_string() }))
    }

    fn close(&mut self) -> DriverResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        match Arc::try_unwrap(conn) {
            Ok(conn) => conn.into_inner().close().map_err(|(_, e)| backend(e)),
            // a statement still holds it; the last one out drops it
            Err(_) => Ok(()),
        }
    }
}

/// Column type for expressions SQLite reports no declared type for,
/// taken from the first non-null value.
fn infer_type(data: &[Vec<SqlValue>], column: usize) -> &'static str {
    let first = data.iter().map(|row| &row[column]).find(|v| !matches!(v, SqlValue::Null));
    match first {
        Some(SqlValue::Integer(_)) => "BIGINT",
        Some(SqlValue::Real(_)) => "DOUBLE",
        Some(SqlValue::Blob(_)) => "BLOB",
        Some(SqlValue::Text(_)) | Some(SqlValue::Null) | None => "TEXT",
    }
}

// ════════════════════════════════════════════════════════════════
//  Statement
// ════════════════════════════════════════════════════════════════

struct SqliteStatement {
    conn: Option<Shared>,
    sql: String,
}

impl Statement for SqliteStatement {
    fn execute(&mut self, params: &[Cell]) -> DriverResult<u64> {
        let conn = self.conn.as_ref().ok_or_else(|| DriverError::backend("statement is closed"))?;
        let params = params.iter().map(|cell| bind(cell.as_ref())).collect::<DriverResult<Vec<_>>>()?;
        let conn = conn.lock();
        let mut stmt = conn.prepare_cached(&self.sql).map_err(backend)?;
        let changed = stmt.execute(rusqlite::params_from_iter(params)).map_err(backend)?;
        Ok(changed as u64)
    }

    fn close(&mut self) -> DriverResult<()> {
        self.conn = None;
        Ok(())
    }
}

/// SQLite storage value for a cell. Booleans are stored as 0/1 and
/// timestamps as RFC 3339 text.
fn bind(value: Option<&Value>) -> DriverResult<SqlValue> {
    let Some(value) = value else {
        return Ok(SqlValue::Null);
    };
    let bound = match value {
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Float32(f) => SqlValue::Real(f64::from(*f)),
        Value::Float64(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(_) | Value::Tensor(_) => SqlValue::Text(value.to_string()),
        int => SqlValue::Integer(
            int.as_i64()
                .ok_or_else(|| DriverError::backend(format!("{int} does not fit a sqlite integer")))?,
        ),
    };
    Ok(bound)
}

// ════════════════════════════════════════════════════════════════
//  Rows
// ════════════════════════════════════════════════════════════════

/// Result set fetched in full by `query`; the connection is free again
/// once it returns.
struct SqliteRows {
    columns: Vec<ColumnInfo>,
    data: std::vec::IntoIter<Vec<SqlValue>>,
}

impl Rows for SqliteRows {
    fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    fn next_row(&mut self, dest: &mut [Scanner]) -> DriverResult<bool> {
        let Some(row) = self.data.next() else {
            return Ok(false);
        };
        for (column, (scanner, value)) in dest.iter_mut().zip(row).enumerate() {
            let native = match value {
                SqlValue::Null => Native::Null,
                SqlValue::Integer(i) => Native::Int(i),
                SqlValue::Real(f) => Native::Float(f),
                SqlValue::Text(s) => Native::Text(s),
                SqlValue::Blob(_) => {
                    return Err(DriverError::Scan { column, reason: "blob values are not supported".into() });
                }
            };
            scanner.scan(native)?;
        }
        Ok(true)
    }

    fn close(&mut self) -> DriverResult<()> {
        self.data = Vec::new().into_iter();
        Ok(())
    }
}
