use tessera_api::{Error, Kind, Result};

/// SQL flavour spoken on a connection, derived from the driver name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Mysql,
    Generic,
}

impl Dialect {
    pub fn from_driver(driver: &str) -> Self {
        match driver {
            "postgres" | "postgresql" => Dialect::Postgres,
            "mysql" => Dialect::Mysql,
            _ => Dialect::Generic,
        }
    }

    /// Statement selecting the default schema, where the dialect has one.
    pub fn select_schema(&self, schema: &str) -> Option<String> {
        match self {
            Dialect::Mysql => Some(format!("use {schema}")),
            Dialect::Postgres => Some(format!("set search_path to {schema}")),
            Dialect::Generic => None,
        }
    }

    /// Placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${n}"),
            _ => "?".to_string(),
        }
    }

    /// Column type used when creating a table for values of `kind`.
    pub fn sql_type(&self, kind: Kind) -> Result<&'static str> {
        let postgres = *self == Dialect::Postgres;
        let ty = match kind {
            Kind::String if postgres => "VARCHAR(65535)",
            Kind::String => "TEXT",
            Kind::Int8 | Kind::UInt8 | Kind::Int16 => "SMALLINT",
            Kind::UInt16 | Kind::Int32 | Kind::Isize => "INTEGER",
            Kind::Usize | Kind::UInt32 | Kind::Int64 | Kind::UInt64 => "BIGINT",
            Kind::Float32 if postgres => "REAL",
            Kind::Float32 => "FLOAT",
            Kind::Float64 if postgres => "DOUBLE PRECISION",
            Kind::Float64 => "DOUBLE",
            Kind::Bool => "BOOLEAN",
            Kind::Timestamp => "DATETIME",
            Kind::Tensor => return Err(Error::type_err(format!("unsupported data type {kind}"))),
        };
        Ok(ty)
    }
}
