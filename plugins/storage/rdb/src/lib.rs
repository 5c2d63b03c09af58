//! Relational database adapter: a [`Source`] over query results and a
//! [`Sink`] that creates a table and fills it with batched inserts.
//!
//! Drivers plug in through [`Connector`] and are looked up by the
//! `driver` prefix of a `driver:info` connection string.
//!
//! [`Source`]: tessera_api::Source
//! [`Sink`]: tessera_api::Sink

mod dialect;
mod driver;
mod options;
mod scan;
mod sink;
mod source;
pub mod sql;

use std::sync::Arc;

use tessera_api::Result;
use tessera_table::Table;

pub use dialect::Dialect;
pub use driver::{
    ColumnInfo, Connection, Connector, Database, DriverError, Native, Rows, SharedConnection, Statement, connector,
    register, split_driver,
};
pub use options::{ColumnOverride, Described, IfExists, RdbOptions, validate_identifier};
pub use scan::{ScanKind, Scanner};
pub use sink::RdbSink;
pub use source::RdbSource;

/// Run the configured query and collect the result into a table.
pub async fn read(db: Database, options: RdbOptions) -> Result<Table> {
    let stream = options.stream_options();
    let source = RdbSource::new(db, options)?;
    Table::read(Arc::new(source), stream).await
}

/// Write every row of `table` into the configured database table.
pub async fn write(table: &Table, db: Database, options: RdbOptions) -> Result<()> {
    let stream = options.stream_options();
    let sink = RdbSink::open(db, options)?;
    table.drain_into(Arc::new(sink), stream).await
}
