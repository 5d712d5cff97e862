//! Stores: independent root file trees.

pub mod model;

pub use model::{AccessRule, NewStore, Store};
