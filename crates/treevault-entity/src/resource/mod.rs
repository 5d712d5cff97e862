//! Path resources: the typed view of a node as a directory or file.

pub mod access;
pub mod model;
pub mod path;

pub use access::{AccessBits, AccessGroups};
pub use model::{
    DirectoryResource, FileMetaResource, NewFileMeta, PathResource, Resource, ResourceType,
};
pub use path::{join_relative_path, validate_name};
