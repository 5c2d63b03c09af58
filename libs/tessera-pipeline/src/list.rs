use tessera_api::{Item, Next, Result, Row, Source, Stream, StreamOptions};

/// In-memory producer: yields its items in order with indices `0..n`.
#[derive(Debug, Clone, Default)]
pub struct ListSource {
    items: Vec<Item>,
}

impl ListSource {
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn rows(rows: impl IntoIterator<Item = Row>) -> Self {
        Self { items: rows.into_iter().map(Item::Row).collect() }
    }
}

impl Source for ListSource {
    fn open(&self, _options: &StreamOptions) -> Result<Box<dyn Stream>> {
        Ok(Box::new(ListStream { items: self.items.clone().into_iter(), index: 0 }))
    }
}

struct ListStream {
    items: std::vec::IntoIter<Item>,
    index: usize,
}

impl Stream for ListStream {
    fn next(&mut self) -> Next {
        match self.items.next() {
            Some(item) => {
                let j = self.index;
                self.index += 1;
                Next::Item(item, j)
            }
            None => Next::End(None),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.items = Vec::new().into_iter();
        Ok(())
    }
}
