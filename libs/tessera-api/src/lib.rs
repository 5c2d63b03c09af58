pub mod enumset;
pub mod error;
pub mod meta;
pub mod row;
pub mod stream;
pub mod tensor;
pub mod value;

pub use enumset::EnumMeta;
pub use error::{BoxError, Error, ErrorKind, Result, Stage};
pub use meta::{Meta, ScalarMeta, meta_by_name, parse_timestamp, parse_value};
pub use row::{Cell, Row, RowFactory};
pub use stream::{Item, Next, Prefetch, Sink, Source, Stream, StreamOptions};
pub use tensor::{Dim, Tensor, TensorElem, TensorMeta};
pub use value::{Kind, Value};
