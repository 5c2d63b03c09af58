use std::collections::HashMap;

use serde::Deserialize;

use tessera_api::{Error, Prefetch, Result, StreamOptions};

/// What a sink does when its target table already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IfExists {
    /// Fail on create.
    Error,
    /// Keep the table and append.
    #[default]
    Skip,
    /// Drop it before creating.
    Drop,
    /// Append, updating rows whose primary key already exists.
    InsertOrUpdate,
}

/// Per-column override, keyed by the column's row name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnOverride {
    /// SQL type text. For sources, replaces the driver-reported type name.
    #[serde(default)]
    pub sql_type: Option<String>,
    /// Name used in the database (sinks) or in the row (sources).
    #[serde(default)]
    pub rename: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

impl ColumnOverride {
    pub fn sql_type(sql_type: impl Into<String>) -> Self {
        Self { sql_type: Some(sql_type.into()), ..Self::default() }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.rename = Some(name.into());
        self
    }
}

/// Resolved description of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Described {
    pub name: String,
    pub sql_type: Option<String>,
    pub primary_key: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RdbOptions {
    // ── Connection ──
    /// Driver name for an already-open connection; picks the dialect.
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,

    // ── Target ──
    #[serde(default)]
    pub table: Option<String>,
    /// Source query. Defaults to `select * from <table>`.
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub columns: HashMap<String, ColumnOverride>,

    // ── Insert tuning ──
    /// Rows per INSERT statement.
    #[serde(default = "default_batch")]
    pub batch: usize,
    #[serde(default)]
    pub if_exists: IfExists,

    // ── Engine ──
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub prefetch: Prefetch,
}

fn default_batch() -> usize { 1 }
fn default_workers() -> usize { 1 }

impl Default for RdbOptions {
    fn default() -> Self {
        Self {
            driver: None,
            schema: None,
            table: None,
            query: None,
            columns: HashMap::new(),
            batch: default_batch(),
            if_exists: IfExists::default(),
            workers: default_workers(),
            prefetch: Prefetch::None,
        }
    }
}

impl RdbOptions {
    pub fn table(table: impl Into<String>) -> Self {
        Self { table: Some(table.into()), ..Self::default() }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self { query: Some(query.into()), ..Self::default() }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::config(format!("rdb options: {e}")))
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch;
        self
    }

    pub fn with_if_exists(mut self, if_exists: IfExists) -> Self {
        self.if_exists = if_exists;
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, column: ColumnOverride) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_prefetch(mut self, prefetch: Prefetch) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions::workers(self.workers).with_prefetch(self.prefetch)
    }

    /// Apply the override for `name`, if any.
    pub fn describe(&self, name: &str) -> Described {
        match self.columns.get(name) {
            Some(o) => Described {
                name: o.rename.clone().unwrap_or_else(|| name.to_string()),
                sql_type: o.sql_type.clone(),
                primary_key: o.primary_key,
            },
            None => Described { name: name.to_string(), sql_type: None, primary_key: false },
        }
    }

    /// Resolve the query a source runs.
    pub fn validate_source(&self) -> Result<String> {
        self.validate_common()?;
        if self.if_exists != IfExists::default() {
            return Err(Error::config("if_exists applies to sinks only"));
        }
        match (self.query.as_deref(), self.table.as_deref()) {
            (Some(q), _) if !q.trim().is_empty() => Ok(q.to_string()),
            (_, Some(t)) => {
                validate_identifier(t, "table")?;
                Ok(format!("select * from {t}"))
            }
            _ => Err(Error::config("either query or table is required")),
        }
    }

    /// Resolve the table a sink writes to.
    pub fn validate_sink(&self) -> Result<String> {
        self.validate_common()?;
        if self.query.is_some() {
            return Err(Error::config("query is not allowed for a sink"));
        }
        let table = self.table.as_deref().ok_or_else(|| Error::config("table is required"))?;
        validate_identifier(table, "table")?;
        if self.batch == 0 {
            return Err(Error::config("batch must be at least 1"));
        }
        for (name, column) in &self.columns {
            if let Some(rename) = &column.rename {
                validate_identifier(rename, &format!("column {name}"))?;
            }
        }
        Ok(table.to_string())
    }

    fn validate_common(&self) -> Result<()> {
        if let Some(schema) = &self.schema {
            validate_identifier(schema, "schema")?;
        }
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.prefetch == Prefetch::Buffered(0) {
            return Err(Error::config("prefetch buffer must be at least 1"));
        }
        Ok(())
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_.]*`; identifiers are spliced into SQL text.
pub fn validate_identifier(name: &str, context: &str) -> Result<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(Error::config(format!("{context}: identifier is empty")));
    };
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::config(format!(
            "{context}: invalid identifier '{name}', must start with a letter or underscore"
        )));
    }
    if let Some(ch) = chars.find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_' && *ch != '.') {
        return Err(Error::config(format!("{context}: invalid character '{ch}' in identifier '{name}'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = RdbOptions::from_json(r#"{"table": "t"}"#).unwrap();
        assert_eq!(o.batch, 1);
        assert_eq!(o.if_exists, IfExists::Skip);
        assert_eq!(o.workers, 1);
        assert_eq!(o.prefetch, Prefetch::None);
        assert_eq!(o.validate_source().unwrap(), "select * from t");
        assert_eq!(o.validate_sink().unwrap(), "t");
    }

    #[test]
    fn parses_full_json() {
        let o = RdbOptions::from_json(
            r#"{
                "table": "colors",
                "schema": "main",
                "batch": 100,
                "if_exists": "insert_or_update",
                "workers": 4,
                "prefetch": {"buffered": 16},
                "columns": {"Color": {"sql_type": "VARCHAR(16)", "primary_key": true}}
            }"#,
        )
        .unwrap();
        assert_eq!(o.if_exists, IfExists::InsertOrUpdate);
        assert_eq!(o.prefetch, Prefetch::Buffered(16));
        assert_eq!(o.stream_options().workers, 4);
        let d = o.describe("Color");
        assert_eq!(d.sql_type.as_deref(), Some("VARCHAR(16)"));
        assert!(d.primary_key);
        assert_eq!(o.describe("Index").sql_type, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = RdbOptions::from_json(r#"{"table": "t", "bacth": 3}"#).unwrap_err();
        assert!(err.to_string().contains("bacth"));
    }

    #[test]
    fn source_needs_query_or_table() {
        let err = RdbOptions::default().validate_source().unwrap_err();
        assert!(err.to_string().contains("either query or table"));
        assert_eq!(RdbOptions::query("select 1").validate_source().unwrap(), "select 1");
    }

    #[test]
    fn sink_rejects_conflicts() {
        assert!(RdbOptions::default().validate_sink().is_err());
        assert!(RdbOptions::table("t").with_batch(0).validate_sink().is_err());
        let mut o = RdbOptions::table("t");
        o.query = Some("select 1".into());
        assert!(o.validate_sink().is_err());
        assert!(RdbOptions::table("t").with_if_exists(IfExists::Drop).validate_source().is_err());
    }

    #[test]
    fn identifiers() {
        assert!(validate_identifier("main.colors", "table").is_ok());
        assert!(validate_identifier("_t1", "table").is_ok());
        assert!(validate_identifier("", "table").is_err());
        assert!(validate_identifier("1t", "table").is_err());
        assert!(validate_identifier("t; drop table x", "table").is_err());
    }
}
