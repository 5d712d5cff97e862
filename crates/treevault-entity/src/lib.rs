//! # treevault-entity
//!
//! Domain entity models for TreeVault. Every struct in this crate
//! represents a database row or a domain value object. Row types
//! additionally derive `sqlx::FromRow`.
//!
//! The [`tree`] module holds the arena tree and the builder that assembles
//! flat closure rows into it.

pub mod node;
pub mod resource;
pub mod store;
pub mod task;
pub mod tree;
