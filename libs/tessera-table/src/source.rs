use std::sync::Arc;

use tessera_api::{Item, Next, Result, Row, Source, Stream, StreamOptions};

/// Egress path of a [`crate::Table`]: yields row `i` at logical index `i`.
#[derive(Debug, Clone)]
pub struct TableSource {
    rows: Arc<Vec<Row>>,
}

impl TableSource {
    pub(crate) fn new(rows: Arc<Vec<Row>>) -> Self {
        Self { rows }
    }
}

impl Source for TableSource {
    fn open(&self, _options: &StreamOptions) -> Result<Box<dyn Stream>> {
        Ok(Box::new(TableStream { rows: Some(Arc::clone(&self.rows)), index: 0 }))
    }
}

struct TableStream {
    rows: Option<Arc<Vec<Row>>>,
    index: usize,
}

impl Stream for TableStream {
    fn next(&mut self) -> Next {
        let Some(rows) = &self.rows else {
            return Next::End(None);
        };
        match rows.get(self.index) {
            Some(row) => {
                let j = self.index;
                self.index += 1;
                Next::Item(Item::Row(row.clone()), j)
            }
            None => Next::End(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.rows = None;
        Ok(())
    }
}
