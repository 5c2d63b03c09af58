use std::sync::Arc;

use tessera_api::{Error, Item, Next, Result, RowFactory, Source, Stage, Stream, StreamOptions};

use crate::driver::{self, Database, Handle, Rows};
use crate::options::RdbOptions;
use crate::scan::{ScanKind, Scanner};

/// Streams the result of one query as rows.
#[derive(Debug)]
pub struct RdbSource {
    db: Database,
    options: RdbOptions,
    query: String,
}

impl RdbSource {
    pub fn new(db: Database, options: RdbOptions) -> Result<Self> {
        let query = options.validate_source()?;
        Ok(Self { db, options, query })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    fn start(&self, handle: &Handle) -> Result<(Box<dyn Rows>, Arc<RowFactory>, Vec<Scanner>)> {
        tracing::debug!(query = %self.query, "running query");
        let mut rows = handle.with(|c| c.query(&self.query)).map_err(|e| Error::stage(Stage::Query, e))?;

        let columns = rows.columns().to_vec();
        let mut names = Vec::with_capacity(columns.len());
        let mut scanners = Vec::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            let described = self.options.describe(&column.name);
            let type_name = described.sql_type.as_deref().unwrap_or(&column.type_name);
            match ScanKind::for_type(type_name) {
                Ok(kind) => scanners.push(Scanner::new(kind, i)),
                Err(e) => {
                    if let Err(close) = rows.close() {
                        tracing::warn!(error = %close, "failed to close result set");
                    }
                    return Err(e.with_context(format!("column {}", column.name)));
                }
            }
            names.push(described.name);
        }
        Ok((rows, RowFactory::new(names), scanners))
    }
}

impl Source for RdbSource {
    fn open(&self, _options: &StreamOptions) -> Result<Box<dyn Stream>> {
        let (mut handle, dialect) = driver::connect(&self.db, &self.options)?;

        let started = driver::select_schema(&handle, dialect, &self.options).and_then(|_| self.start(&handle));
        match started {
            Ok((rows, factory, scanners)) => Ok(Box::new(RdbStream {
                handle,
                rows: Some(rows),
                factory,
                scanners,
                index: 0,
            })),
            Err(e) => {
                if let Err(close) = handle.close() {
                    tracing::warn!(error = %close, "failed to close connection");
                }
                Err(e)
            }
        }
    }
}

struct RdbStream {
    handle: Handle,
    rows: Option<Box<dyn Rows>>,
    factory: Arc<RowFactory>,
    scanners: Vec<Scanner>,
    index: usize,
}

impl RdbStream {
    fn read_row(&mut self) -> Result<Option<Item>> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        if !rows.next_row(&mut self.scanners).map_err(|e| Error::stage(Stage::Scan, e))? {
            return Ok(None);
        }
        let mut row = self.factory.new_row();
        for (i, scanner) in self.scanners.iter_mut().enumerate() {
            row.set(i, scanner.take())?;
        }
        Ok(Some(Item::Row(row)))
    }
}

impl Stream for RdbStream {
    fn next(&mut self) -> Next {
        match self.read_row() {
            Ok(Some(item)) => {
                let index = self.index;
                self.index += 1;
                Next::Item(item, index)
            }
            Ok(None) => Next::End(None),
            Err(e) => Next::End(Some(e)),
        }
    }

    fn close(&mut self) -> Result<()> {
        let rows = self.rows.take().map(|mut rows| rows.close()).transpose();
        let conn = self.handle.close();
        if self.index > 0 {
            tracing::debug!(rows = self.index, "query stream closed");
        }
        rows.map_err(|e| Error::stage(Stage::Query, e))?;
        conn.map_err(|e| Error::stage(Stage::Connection, e))?;
        Ok(())
    }
}

impl Drop for RdbStream {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "failed to release query stream");
        }
    }
}
