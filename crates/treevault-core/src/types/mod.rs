//! Core type definitions used across the TreeVault workspace.

pub mod id;
pub mod permission;

pub use id::*;
pub use permission::Permission;
