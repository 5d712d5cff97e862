//! # treevault-core
//!
//! Core crate for TreeVault. Contains the unified error system, the
//! configuration schema, typed identifiers, domain events, and the
//! storage provider trait.
//!
//! This crate has **no** internal dependencies on other TreeVault crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
