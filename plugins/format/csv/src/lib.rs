//! CSV format plugin: a [`CsvSource`] that parses fields through column
//! metas and a [`CsvSink`] that writes rows back in order.
//!
//! ```text
//! sepal_len,sepal_wid,class
//! 5.1,3.5,setosa
//! ```
//!
//! `Column::new(tensor_f32, "sepal*").group("F1")` reads both sepal
//! fields into one two-element column.

mod column;
mod options;
mod parser;
mod sink;
mod source;

pub use column::{Column, ColumnSpec};
pub use options::CsvOptions;
pub use sink::CsvSink;
pub use source::CsvSource;
