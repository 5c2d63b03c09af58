pub mod copy;
pub mod show;
