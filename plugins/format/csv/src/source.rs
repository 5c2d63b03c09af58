use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::PathBuf;
use std::sync::Arc;

use tessera_api::{Error, Item, Next, Result, Source, Stage, Stream, StreamOptions};

use crate::column::{Column, Layout};
use crate::options::CsvOptions;
use crate::parser::{parse_fields, quote_is_open};

#[derive(Debug, Clone)]
enum Input {
    Path(PathBuf),
    Text(Arc<str>),
}

/// Rows parsed from CSV text, one per non-empty record. A quoted field may
/// span several lines.
#[derive(Debug, Clone)]
pub struct CsvSource {
    input: Input,
    columns: Vec<Column>,
    options: CsvOptions,
    delimiter: char,
}

impl CsvSource {
    pub fn from_path(path: impl Into<PathBuf>, columns: Vec<Column>, options: CsvOptions) -> Result<Self> {
        Self::build(Input::Path(path.into()), columns, options)
    }

    pub fn from_string(text: impl Into<Arc<str>>, columns: Vec<Column>, options: CsvOptions) -> Result<Self> {
        Self::build(Input::Text(text.into()), columns, options)
    }

    fn build(input: Input, columns: Vec<Column>, options: CsvOptions) -> Result<Self> {
        let delimiter = options.delimiter()?;
        Ok(Self { input, columns, options, delimiter })
    }

    fn reader(&self) -> Result<Box<dyn BufRead + Send>> {
        match &self.input {
            Input::Path(path) => {
                let file = File::open(path)
                    .map_err(|e| Error::stage(Stage::Read, format!("{}: {e}", path.display())))?;
                Ok(Box::new(BufReader::new(file)))
            }
            Input::Text(text) => Ok(Box::new(Cursor::new(text.as_bytes().to_vec()))),
        }
    }
}

impl Source for CsvSource {
    fn open(&self, _options: &StreamOptions) -> Result<Box<dyn Stream>> {
        let mut stream = CsvStream {
            lines: Some(self.reader()?),
            delimiter: self.delimiter,
            quoting: self.options.quoting,
            layout: None,
            pending: None,
            line: 0,
            index: 0,
        };

        let Some(first) = stream.read_record()? else {
            tracing::debug!("csv input is empty");
            return Ok(Box::new(stream));
        };
        let fields = if self.options.header {
            first.into_iter().map(|f| f.trim().to_string()).collect()
        } else {
            let names = (0..first.len()).map(|i| format!("col{i}")).collect();
            stream.pending = Some(first);
            names
        };
        stream.layout = Some(Layout::resolve(fields, &self.columns)?);
        Ok(Box::new(stream))
    }
}

struct CsvStream {
    lines: Option<Box<dyn BufRead + Send>>,
    delimiter: char,
    quoting: bool,
    layout: Option<Layout>,
    /// First record when the input has no header line.
    pending: Option<Vec<String>>,
    line: usize,
    index: usize,
}

impl CsvStream {
    fn read_record(&mut self) -> Result<Option<Vec<String>>> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        let mut buf = String::new();
        loop {
            if lines.read_line(&mut buf).map_err(|e| Error::stage(Stage::Read, e))? == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                return Err(Error::stage(
                    Stage::Read,
                    format!("line {}: quoted field is not terminated", self.line),
                ));
            }
            self.line += 1;
            if self.quoting && quote_is_open(&buf, self.delimiter) {
                continue;
            }
            let record = buf.trim_end_matches(['\r', '\n']);
            if !record.is_empty() {
                return Ok(Some(parse_fields(record, self.delimiter, self.quoting)));
            }
            buf.clear();
        }
    }

    fn read_row(&mut self) -> Result<Option<Item>> {
        let record = match self.pending.take() {
            Some(record) => record,
            None => match self.read_record()? {
                Some(record) => record,
                None => return Ok(None),
            },
        };
        let Some(layout) = self.layout.as_ref() else {
            return Ok(None);
        };
        if record.len() > layout.fields.len() {
            return Err(Error::stage(
                Stage::Read,
                format!("line {}: {} fields, header has {}", self.line, record.len(), layout.fields.len()),
            ));
        }

        let mut row = layout.factory.new_row();
        for (i, text) in record.iter().enumerate() {
            let Some(target) = &layout.targets[i] else { continue };
            if text.is_empty() {
                continue;
            }
            if let Some(slot) = row.cell_mut(target.column) {
                target
                    .meta
                    .convert(text, slot, target.index, target.width)
                    .map_err(|e| e.with_context(format!("line {}, field {}", self.line, layout.fields[i])))?;
            }
        }
        Ok(Some(Item::Row(row)))
    }
}

impl Stream for CsvStream {
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
        if self.lines.take().is_some() {
            tracing::debug!(rows = self.index, lines = self.line, "csv source closed");
        }
        Ok(())
    }
}
