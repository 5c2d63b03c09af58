use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use tessera_api::{Error, Item, Result, Row, RowFactory, Sink, Stage};

use crate::options::CsvOptions;
use crate::parser::quote_field;

/// Writes rows as CSV in logical index order.
///
/// Rows delivered ahead of their turn are held until every lower index
/// has been written.
pub struct CsvSink {
    delimiter: char,
    options: CsvOptions,
    state: Mutex<State>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Done,
    Failed,
}

struct State {
    out: BufWriter<Box<dyn Write + Send>>,
    factory: Option<Arc<RowFactory>>,
    /// Deliveries ahead of `next`; `None` is a no-op that only occupies its index.
    held: BTreeMap<usize, Option<Row>>,
    next: usize,
    written: usize,
    status: Status,
}

impl CsvSink {
    pub fn create(path: impl AsRef<Path>, options: CsvOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::stage(Stage::Write, format!("{}: {e}", path.display())))?;
        Self::new(Box::new(file), options)
    }

    pub fn new(out: Box<dyn Write + Send>, options: CsvOptions) -> Result<Self> {
        let delimiter = options.delimiter()?;
        let state = State {
            out: BufWriter::new(out),
            factory: None,
            held: BTreeMap::new(),
            next: 0,
            written: 0,
            status: Status::Open,
        };
        Ok(Self { delimiter, options, state: Mutex::new(state) })
    }

    /// Rows written so far.
    pub fn written(&self) -> usize {
        self.state.lock().written
    }

    fn line<'a>(&self, fields: impl Iterator<Item = &'a str>) -> String {
        let quoted: Vec<String> = fields.map(|f| quote_field(f, self.delimiter, self.options.quoting)).collect();
        let mut line = quoted.join(&self.delimiter.to_string());
        line.push('\n');
        line
    }

    fn write_row(&self, state: &mut State, row: &Row) -> Result<()> {
        let texts: Vec<String> = row
            .cells()
            .iter()
            .map(|cell| cell.as_ref().map(ToString::to_string).unwrap_or_default())
            .collect();
        let line = self.line(texts.iter().map(String::as_str));
        state.out.write_all(line.as_bytes()).map_err(|e| Error::stage(Stage::Write, e))
    }

    fn check_schema(&self, state: &mut State, row: &Row) -> Result<()> {
        match &state.factory {
            Some(factory) if !factory.same_schema(row.factory()) => Err(Error::SchemaMismatch {
                expected: factory.names().join(", "),
                got: row.factory().names().join(", "),
            }),
            Some(_) => Ok(()),
            None => {
                if self.options.header {
                    let header = self.line(row.factory().names().iter().map(String::as_str));
                    state.out.write_all(header.as_bytes()).map_err(|e| Error::stage(Stage::Write, e))?;
                }
                state.factory = Some(Arc::clone(row.factory()));
                Ok(())
            }
        }
    }

    fn accept(&self, state: &mut State, row: Option<Row>, index: usize) -> Result<()> {
        if let Some(row) = &row {
            self.check_schema(state, row)?;
        }
        if index < state.next || state.held.contains_key(&index) {
            return Err(Error::stage(Stage::Write, format!("row {index} delivered twice")));
        }
        state.held.insert(index, row);
        while let Some(row) = state.held.remove(&state.next) {
            if let Some(row) = row {
                self.write_row(state, &row)?;
                state.written += 1;
            }
            state.next += 1;
        }
        Ok(())
    }
}

impl Sink for CsvSink {
    fn put(&self, item: Item, index: usize) -> Result<()> {
        let row = match item {
            Item::Row(row) => Some(row),
            Item::Sync => None,
        };
        let mut state = self.state.lock();
        if state.status != Status::Open {
            return Err(Error::stage(Stage::Write, "csv sink is finished"));
        }
        let result = self.accept(&mut state, row, index);
        if result.is_err() {
            state.status = Status::Failed;
        }
        result
    }

    fn finish(&self, error: Option<&Error>) -> Result<()> {
        let mut state = self.state.lock();
        if state.status == Status::Done {
            return Ok(());
        }
        if let Some(e) = error {
            state.status = Status::Failed;
            tracing::warn!(rows = state.written, error = %e, "csv output is incomplete");
            return Ok(());
        }
        if let Some((&missing, _)) = state.held.first_key_value() {
            state.status = Status::Failed;
            return Err(Error::stage(
                Stage::Write,
                format!("rows {}..{missing} were never delivered", state.next),
            ));
        }
        if state.status == Status::Failed {
            return Err(Error::stage(Stage::Write, "an earlier write failed"));
        }
        state.out.flush().map_err(|e| Error::stage(Stage::Write, e))?;
        state.status = Status::Done;
        tracing::info!(rows = state.written, "csv written");
        Ok(())
    }
}
