//! SQL text generation. Identifiers are validated before they get here.

use crate::dialect::Dialect;
use crate::options::IfExists;

/// One column of a table to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub primary_key: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>, primary_key: bool) -> Self {
        Self { name: name.into(), sql_type: sql_type.into(), primary_key }
    }
}

/// `create table [if not exists] T( a INTEGER, b TEXT[, primary key (b)] )`
pub fn create_table(table: &str, columns: &[ColumnDef], if_exists: IfExists) -> String {
    let mut sql = String::from("create table ");
    if !matches!(if_exists, IfExists::Error | IfExists::Drop) {
        sql.push_str("if not exists ");
    }
    sql.push_str(table);
    sql.push_str("( ");
    let defs: Vec<String> = columns.iter().map(|c| format!("{} {}", c.name, c.sql_type)).collect();
    sql.push_str(&defs.join(", "));
    let keys: Vec<&str> = columns.iter().filter(|c| c.primary_key).map(|c| c.name.as_str()).collect();
    if !keys.is_empty() {
        sql.push_str(", primary key (");
        sql.push_str(&keys.join(","));
        sql.push(')');
    }
    sql.push_str(" )");
    sql
}

pub fn drop_table(table: &str, schema: Option<&str>) -> String {
    match schema.filter(|s| !s.is_empty()) {
        Some(schema) => format!("drop table if exists {schema}.{table}"),
        None => format!("drop table if exists {table}"),
    }
}

/// Multi-row parameterized insert of `rows` rows.
///
/// With [`IfExists::InsertOrUpdate`] and at least one primary key column,
/// appends `on duplicate key update` for every non-key column.
pub fn batch_insert(table: &str, columns: &[ColumnDef], rows: usize, dialect: Dialect, if_exists: IfExists) -> String {
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    let mut sql = format!("insert into {table}({}) values ", names.join(","));

    let width = columns.len();
    let tuples: Vec<String> = (0..rows)
        .map(|row| {
            let marks: Vec<String> = (0..width).map(|col| dialect.placeholder(row * width + col + 1)).collect();
            format!("({})", marks.join(","))
        })
        .collect();
    sql.push_str(&tuples.join(","));

    if if_exists == IfExists::InsertOrUpdate && columns.iter().any(|c| c.primary_key) {
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !c.primary_key)
            .map(|c| format!("{0} = values({0})", c.name))
            .collect();
        if !updates.is_empty() {
            sql.push_str(" on duplicate key update ");
            sql.push_str(&updates.join(", "));
        }
    }
    sql
}
