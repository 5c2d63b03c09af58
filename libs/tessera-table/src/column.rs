use tessera_api::Value;

use crate::table::Table;

/// Read-only view of one column across every row of a table.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    table: &'a Table,
    index: usize,
}

impl<'a> Column<'a> {
    pub(crate) fn new(table: &'a Table, index: usize) -> Self {
        Self { table, index }
    }

    pub fn name(&self) -> &'a str {
        self.table
            .factory()
            .and_then(|f| f.name(self.index))
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Value at row `i`; `None` when the cell is absent or `i` is out of range.
    pub fn at(&self, i: usize) -> Option<&'a Value> {
        self.table.row(i).and_then(|r| r.get(self.index))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        let index = self.index;
        self.table.rows().iter().map(move |r| r.get(index))
    }
}
