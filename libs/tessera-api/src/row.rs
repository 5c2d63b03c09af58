use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

/// One cell of a row. `None` is SQL NULL / a missing CSV field.
pub type Cell = Option<Value>;

// ════════════════════════════════════════════════════════════════
//  RowFactory
// ════════════════════════════════════════════════════════════════

/// Schema identity shared by compatible rows: ordered column names.
///
/// Factories are handed around as `Arc<RowFactory>`; rows built by the
/// same factory (or by one with the same names) are schema-compatible.
#[derive(Debug, PartialEq, Eq)]
pub struct RowFactory {
    names: Vec<String>,
}

impl RowFactory {
    pub fn new<I, S>(names: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self { names: names.into_iter().map(Into::into).collect() })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Same factory, or one with identical names in identical order.
    pub fn same_schema(&self, other: &RowFactory) -> bool {
        std::ptr::eq(self, other) || self.names == other.names
    }

    /// Row bound to this factory with every cell absent.
    pub fn new_row(self: &Arc<Self>) -> Row {
        Row { factory: Arc::clone(self), data: vec![None; self.names.len()] }
    }

    /// Row bound to this factory holding `cells`.
    pub fn row(self: &Arc<Self>, cells: Vec<Cell>) -> Result<Row> {
        if cells.len() != self.names.len() {
            return Err(Error::type_err(format!(
                "row of {} cells does not fit factory of {} columns",
                cells.len(),
                self.names.len()
            )));
        }
        Ok(Row { factory: Arc::clone(self), data: cells })
    }
}

// ════════════════════════════════════════════════════════════════
//  Row
// ════════════════════════════════════════════════════════════════

/// Schema-bound tuple of typed, possibly-absent cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    factory: Arc<RowFactory>,
    data: Vec<Cell>,
}

impl Row {
    pub fn factory(&self) -> &Arc<RowFactory> {
        &self.factory
    }

    pub fn width(&self) -> usize {
        self.data.len()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.data
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.data
    }

    /// Value at `index`; `None` when absent or out of range.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.data.get(index).and_then(Option::as_ref)
    }

    /// Value of the column called `name`.
    pub fn col(&self, name: &str) -> Option<&Value> {
        self.factory.index_of(name).and_then(|i| self.get(i))
    }

    pub fn cell_mut(&mut self, index: usize) -> Option<&mut Cell> {
        self.data.get_mut(index)
    }

    pub fn set(&mut self, index: usize, cell: Cell) -> Result<()> {
        let width = self.data.len();
        let slot = self
            .data
            .get_mut(index)
            .ok_or_else(|| Error::type_err(format!("cell index {index} out of range 0..{width}")))?;
        *slot = cell;
        Ok(())
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Row{")?;
        for (i, (name, cell)) in self.factory.names.iter().zip(&self.data).enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            match cell {
                Some(v) => write!(f, "{name}: {}({v})", v.kind())?,
                None => write!(f, "{name}: <none>")?,
            }
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_stamps_empty_rows() {
        let f = RowFactory::new(["Color", "Index"]);
        let r = f.new_row();
        assert_eq!(r.width(), 2);
        assert!(r.cells().iter().all(Option::is_none));
        assert!(Arc::ptr_eq(r.factory(), &f));
    }

    #[test]
    fn row_display_lists_kinds() {
        let f = RowFactory::new(["Color", "Index", "Note"]);
        let r = f.row(vec![Some("red".into()), Some(Value::Int64(0)), None]).unwrap();
        assert_eq!(r.to_string(), "Row{Color: string(red), Index: i64(0), Note: <none>}");
    }

    #[test]
    fn lookup_by_name() {
        let f = RowFactory::new(["a", "b"]);
        let mut r = f.new_row();
        r.set(1, Some(Value::Int32(7))).unwrap();
        assert_eq!(r.col("b"), Some(&Value::Int32(7)));
        assert_eq!(r.col("a"), None);
        assert_eq!(r.col("zzz"), None);
        assert!(r.set(2, None).is_err());
    }

    #[test]
    fn schema_identity_is_structural() {
        let a = RowFactory::new(["x", "y"]);
        let b = RowFactory::new(["x", "y"]);
        let c = RowFactory::new(["y", "x"]);
        assert!(a.same_schema(&b));
        assert!(!a.same_schema(&c));
        assert!(a.row(vec![None]).is_err());
    }
}
