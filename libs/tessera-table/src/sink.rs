use std::sync::Arc;

use parking_lot::Mutex;

use tessera_api::{Error, Item, Result, Row, RowFactory, Sink};

use crate::table::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Done,
    Failed,
}

#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Pending,
    Row(Row),
    /// A no-op delivery; occupies its index but yields no row.
    Skipped,
}

impl Slot {
    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }
}

#[derive(Debug)]
struct Ingest {
    factory: Option<Arc<RowFactory>>,
    slots: Vec<Slot>,
    /// One past the highest index written so far.
    high: usize,
    filled: usize,
    status: Status,
}

/// Ordered, concurrency-safe ingestion endpoint of a [`Table`].
///
/// Each row lands at its logical index regardless of the order workers
/// deliver it in. The schema is captured from the first row; a row with
/// different column names fails the ingestion. Clones share one buffer.
#[derive(Debug, Clone)]
pub struct TableSink {
    inner: Arc<Mutex<Ingest>>,
}

impl TableSink {
    pub(crate) fn new(capacity: Option<usize>) -> Self {
        let slots = match capacity {
            Some(n) => vec![Slot::Pending; n],
            None => Vec::new(),
        };
        Self {
            inner: Arc::new(Mutex::new(Ingest {
                factory: None,
                slots,
                high: 0,
                filled: 0,
                status: Status::Open,
            })),
        }
    }

    /// Take the ingested table. Only valid after a clean `finish`.
    pub fn into_table(self) -> Result<Table> {
        let mut ingest = self.inner.lock();
        match ingest.status {
            Status::Done => {}
            Status::Failed => return Err(Error::type_err("table ingestion failed")),
            Status::Open => return Err(Error::type_err("table ingestion is not finished")),
        }
        let slots = std::mem::take(&mut ingest.slots);
        let rows: Vec<Row> = slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Row(row) => Some(row),
                _ => None,
            })
            .collect();
        Ok(Table::from_parts(ingest.factory.clone(), rows))
    }
}

impl Sink for TableSink {
    fn put(&self, item: Item, index: usize) -> Result<()> {
        let mut ingest = self.inner.lock();
        if ingest.status != Status::Open {
            return Err(Error::type_err("table sink is already finished"));
        }

        let slot = match item {
            Item::Row(row) => {
                match ingest.factory.clone() {
                    None => ingest.factory = Some(Arc::clone(row.factory())),
                    Some(f) if f.same_schema(row.factory()) => {}
                    Some(f) => {
                        return Err(Error::SchemaMismatch {
                            expected: f.names().join(","),
                            got: row.factory().names().join(","),
                        });
                    }
                }
                Slot::Row(row)
            }
            Item::Sync => Slot::Skipped,
        };

        let end = index
            .checked_add(1)
            .ok_or_else(|| Error::type_err(format!("row index {index} is out of range")))?;
        if end > ingest.slots.len() {
            let grow = end - ingest.slots.len();
            ingest
                .slots
                .try_reserve(grow)
                .map_err(|e| Error::type_err(format!("row index {index} is out of range: {e}")))?;
            ingest.slots.resize_with(end, Slot::default);
        }
        if !ingest.slots[index].is_pending() {
            return Err(Error::type_err(format!("row index {index} delivered twice")));
        }
        ingest.slots[index] = slot;
        ingest.filled += 1;
        ingest.high = ingest.high.max(end);
        Ok(())
    }

    fn finish(&self, terminal: Option<&Error>) -> Result<()> {
        let mut ingest = self.inner.lock();
        if terminal.is_some() {
            ingest.status = Status::Failed;
            return Ok(());
        }

        let high = ingest.high;
        ingest.slots.truncate(high);
        if ingest.filled != high {
            ingest.status = Status::Failed;
            let gap = ingest.slots.iter().position(Slot::is_pending).unwrap_or(high);
            return Err(Error::type_err(format!(
                "table ingestion left row {gap} unfilled ({} of {high} rows)",
                ingest.filled
            )));
        }
        ingest.status = Status::Done;
        tracing::debug!(indices = high, "table ingestion complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_api::Value;

    fn row(f: &Arc<RowFactory>, v: i64) -> Item {
        Item::Row(f.row(vec![Some(Value::Int64(v))]).unwrap())
    }

    #[test]
    fn out_of_order_writes_land_by_index() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(None);
        for i in [3usize, 0, 2, 1] {
            sink.put(row(&f, i as i64 * 10), i).unwrap();
        }
        sink.finish(None).unwrap();
        let t = sink.into_table().unwrap();
        assert_eq!(t.len(), 4);
        for i in 0..4 {
            assert_eq!(t.row(i).unwrap().get(0), Some(&Value::Int64(i as i64 * 10)));
        }
    }

    #[test]
    fn capacity_hint_is_trimmed_to_ingested_rows() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(Some(10));
        sink.put(row(&f, 1), 0).unwrap();
        sink.put(row(&f, 2), 1).unwrap();
        sink.finish(None).unwrap();
        assert_eq!(sink.into_table().unwrap().len(), 2);
    }

    #[test]
    fn gap_fails_completion() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(None);
        sink.put(row(&f, 1), 0).unwrap();
        sink.put(row(&f, 3), 2).unwrap();
        assert!(sink.finish(None).is_err());
        assert!(sink.into_table().is_err());
    }

    #[test]
    fn duplicate_index_rejected() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(None);
        sink.put(row(&f, 1), 0).unwrap();
        assert!(sink.put(row(&f, 1), 0).is_err());
    }

    #[test]
    fn sync_items_are_ignored() {
        let sink = TableSink::new(None);
        sink.put(Item::Sync, 0).unwrap();
        sink.finish(None).unwrap();
        let t = sink.into_table().unwrap();
        assert!(t.is_empty());
        assert!(t.factory().is_none());
    }

    #[test]
    fn sync_between_rows_does_not_leave_a_gap() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(None);
        sink.put(row(&f, 2), 2).unwrap();
        sink.put(Item::Sync, 1).unwrap();
        sink.put(row(&f, 0), 0).unwrap();
        sink.finish(None).unwrap();
        let t = sink.into_table().unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.row(1).unwrap().get(0), Some(&Value::Int64(2)));
    }

    #[test]
    fn sync_index_counts_as_delivered() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(None);
        sink.put(Item::Sync, 0).unwrap();
        assert!(sink.put(row(&f, 1), 0).is_err());
    }

    #[test]
    fn unrepresentable_index_is_an_error() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(None);
        assert!(sink.put(row(&f, 1), usize::MAX).is_err());
        assert!(sink.put(row(&f, 1), usize::MAX / 2).is_err());
        sink.put(row(&f, 1), 0).unwrap();
        sink.finish(None).unwrap();
        assert_eq!(sink.into_table().unwrap().len(), 1);
    }

    #[test]
    fn terminal_error_marks_failed() {
        let f = RowFactory::new(["v"]);
        let sink = TableSink::new(None);
        sink.put(row(&f, 1), 0).unwrap();
        sink.finish(Some(&Error::type_err("upstream"))).unwrap();
        assert!(sink.into_table().is_err());
    }

    #[test]
    fn unfinished_sink_has_no_table() {
        assert!(TableSink::new(None).into_table().is_err());
    }
}
