use tessera_api::{Error, Result, Value, parse_timestamp};

use crate::driver::{DriverError, Native};

/// Typed destination for one result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanKind {
    String,
    Small,
    Integer,
    Bigint,
    Bool,
    Double,
    Float,
    Timestamp,
}

impl ScanKind {
    /// Pick the destination for a driver-reported column type.
    pub fn for_type(type_name: &str) -> Result<Self> {
        let upper = type_name.trim().to_ascii_uppercase();
        let kind = match upper.as_str() {
            "VARCHAR" | "TEXT" | "CHAR" | "STRING" => ScanKind::String,
            "INT8" | "SMALLINT" | "INT2" => ScanKind::Small,
            "INTEGER" | "INT" | "INT4" => ScanKind::Integer,
            "BIGINT" => ScanKind::Bigint,
            "BOOLEAN" => ScanKind::Bool,
            "DECIMAL" | "NUMERIC" | "REAL" | "DOUBLE" | "FLOAT8" => ScanKind::Double,
            "FLOAT" | "FLOAT4" => ScanKind::Float,
            "DATE" | "DATETIME" | "TIMESTAMP" => ScanKind::Timestamp,
            _ if upper.starts_with("VARCHAR(") || upper.starts_with("CHAR(") => ScanKind::String,
            _ if upper.starts_with("DECIMAL(") || upper.starts_with("NUMERIC(") => ScanKind::Double,
            _ => return Err(Error::type_err(format!("unknown column type `{type_name}`"))),
        };
        Ok(kind)
    }
}

/// Per-column scan slot. Drivers hand one [`Native`] to [`Scanner::scan`]
/// for each column of every row.
#[derive(Debug, Clone)]
pub struct Scanner {
    kind: ScanKind,
    column: usize,
    value: Option<Value>,
}

impl Scanner {
    pub fn new(kind: ScanKind, column: usize) -> Self {
        Self { kind, column, value: None }
    }

    pub fn kind(&self) -> ScanKind {
        self.kind
    }

    /// Store one scanned value; `Native::Null` leaves the slot absent.
    pub fn scan(&mut self, native: Native) -> std::result::Result<(), DriverError> {
        self.value = match native {
            Native::Null => None,
            native => Some(self.convert(native)?),
        };
        Ok(())
    }

    /// Take the scanned value, leaving the slot absent.
    pub fn take(&mut self) -> Option<Value> {
        self.value.take()
    }

    fn convert(&self, native: Native) -> std::result::Result<Value, DriverError> {
        let mismatch = |native: &Native| DriverError::Scan {
            column: self.column,
            reason: format!("cannot scan {native:?} into {:?}", self.kind),
        };
        let value = match (self.kind, native) {
            (ScanKind::String, Native::Text(s)) => Value::String(s),
            (ScanKind::String, Native::Int(i)) => Value::String(i.to_string()),
            (ScanKind::String, Native::Float(f)) => Value::String(f.to_string()),
            (ScanKind::String, Native::Bool(b)) => Value::String(b.to_string()),
            (ScanKind::String, Native::Timestamp(t)) => Value::String(Value::Timestamp(t).to_string()),

            (ScanKind::Small, Native::Int(i)) => Value::Int16(i16::try_from(i).map_err(|e| self.fail(e))?),
            (ScanKind::Integer, Native::Int(i)) => Value::Int32(i32::try_from(i).map_err(|e| self.fail(e))?),
            (ScanKind::Bigint, Native::Int(i)) => Value::Int64(i),
            (ScanKind::Small, Native::Text(s)) => Value::Int16(s.trim().parse().map_err(|e| self.fail(e))?),
            (ScanKind::Integer, Native::Text(s)) => Value::Int32(s.trim().parse().map_err(|e| self.fail(e))?),
            (ScanKind::Bigint, Native::Text(s)) => Value::Int64(s.trim().parse().map_err(|e| self.fail(e))?),

            (ScanKind::Bool, Native::Bool(b)) => Value::Bool(b),
            (ScanKind::Bool, Native::Int(i)) => Value::Bool(i != 0),
            (ScanKind::Bool, Native::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "t" | "true" => Value::Bool(true),
                "0" | "f" | "false" => Value::Bool(false),
                _ => return Err(mismatch(&Native::Text(s))),
            },

            (ScanKind::Double, Native::Float(f)) => Value::Float64(f),
            (ScanKind::Double, Native::Int(i)) => Value::Float64(i as f64),
            (ScanKind::Double, Native::Text(s)) => Value::Float64(s.trim().parse().map_err(|e| self.fail(e))?),
            (ScanKind::Float, Native::Float(f)) => Value::Float32(f as f32),
            (ScanKind::Float, Native::Int(i)) => Value::Float32(i as f32),
            (ScanKind::Float, Native::Text(s)) => Value::Float32(s.trim().parse().map_err(|e| self.fail(e))?),

            (ScanKind::Timestamp, Native::Timestamp(t)) => Value::Timestamp(t),
            (ScanKind::Timestamp, Native::Text(s)) => {
                Value::Timestamp(parse_timestamp(&s).map_err(|e| self.fail(e))?)
            }

            (_, native) => return Err(mismatch(&native)),
        };
        Ok(value)
    }

    fn fail(&self, reason: impl std::fmt::Display) -> DriverError {
        DriverError::Scan { column: self.column, reason: reason.to_string() }
    }
}
