mod drain;
mod list;

pub use drain::{drain, drain_until};
pub use list::ListSource;
