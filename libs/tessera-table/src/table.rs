use std::sync::Arc;

use tessera_api::{Error, Result, Row, RowFactory, Sink, Source, StreamOptions};

use crate::column::Column;
use crate::sink::TableSink;
use crate::source::TableSource;

/// Columnar in-memory store: ordered rows sharing one factory.
///
/// A table is built through its [`TableSink`] and is immutable
/// afterwards; clones share the row storage.
#[derive(Debug, Clone, Default)]
pub struct Table {
    factory: Option<Arc<RowFactory>>,
    rows: Arc<Vec<Row>>,
}

impl Table {
    /// Ingestion endpoint. With a capacity hint the backing storage is
    /// pre-sized so indexed writes never grow it.
    pub fn sink(capacity: Option<usize>) -> TableSink {
        TableSink::new(capacity)
    }

    /// Drain `source` into a fresh table.
    pub async fn read(source: Arc<dyn Source>, options: StreamOptions) -> Result<Table> {
        let sink = Table::sink(None);
        tessera_pipeline::drain(source, Arc::new(sink.clone()), options).await?;
        sink.into_table()
    }

    /// Build a table from already-ordered rows. All rows must share
    /// the first row's schema.
    pub fn from_rows(rows: Vec<Row>) -> Result<Table> {
        let factory = rows.first().map(|r| Arc::clone(r.factory()));
        if let Some(f) = &factory {
            if let Some(bad) = rows.iter().find(|r| !f.same_schema(r.factory())) {
                return Err(Error::SchemaMismatch {
                    expected: f.names().join(","),
                    got: bad.factory().names().join(","),
                });
            }
        }
        Ok(Table { factory, rows: Arc::new(rows) })
    }

    pub(crate) fn from_parts(factory: Option<Arc<RowFactory>>, rows: Vec<Row>) -> Table {
        Table { factory, rows: Arc::new(rows) }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Schema of the table; `None` until a row has been ingested.
    pub fn factory(&self) -> Option<&Arc<RowFactory>> {
        self.factory.as_ref()
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Column view by name.
    pub fn col(&self, name: &str) -> Option<Column<'_>> {
        let index = self.factory.as_ref()?.index_of(name)?;
        Some(Column::new(self, index))
    }

    /// Re-expose the rows as a stream source, indices `0..len`.
    pub fn lazy(&self) -> TableSource {
        TableSource::new(Arc::clone(&self.rows))
    }

    /// Drain this table into `sink`.
    pub async fn drain_into(&self, sink: Arc<dyn Sink>, options: StreamOptions) -> Result<()> {
        tessera_pipeline::drain(Arc::new(self.lazy()), sink, options).await
    }
}
