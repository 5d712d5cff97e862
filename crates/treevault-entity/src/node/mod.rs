//! Tree nodes and closure-table rows.

pub mod model;

pub use model::{ClosureJoinedRow, ClosureRow, Node};
