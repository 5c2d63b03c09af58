mod column;
mod sink;
mod source;
mod table;

pub use column::Column;
pub use sink::TableSink;
pub use source::TableSource;
pub use table::Table;
