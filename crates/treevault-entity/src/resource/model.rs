//! Path resource entity models.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::{NodeId, Permission, StoreId};

use super::access::{AccessBits, AccessGroups};
use super::path::join_relative_path;
use crate::tree::TreeRow;

/// Kind of a path resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "resource_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A directory.
    Directory,
    /// A file.
    File,
}

impl ResourceType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "directory" => Ok(Self::Directory),
            "file" => Ok(Self::File),
            other => Err(format!("Unknown resource type: {other}")),
        }
    }
}

/// Fields shared by directories and files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathResource {
    /// The node this resource describes.
    pub node_id: NodeId,
    /// Parent directory node, `None` for a store root.
    pub parent_node_id: Option<NodeId>,
    /// Owning store.
    pub store_id: StoreId,
    /// Directory or file.
    pub resource_type: ResourceType,
    /// Own name.
    pub path_name: String,
    /// Store-relative, forward-slash path. Empty for a store root.
    pub relative_path: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Declared access groups.
    pub groups: AccessGroups,
    /// Bits resolved for the acting user by the permission tree builder.
    #[serde(default)]
    pub access: AccessBits,
    /// When the resource was created.
    pub created_at: DateTime<Utc>,
    /// When the resource was last updated.
    pub updated_at: DateTime<Utc>,
}

impl PathResource {
    /// Whether this is a store root directory.
    pub fn is_root(&self) -> bool {
        self.parent_node_id.is_none()
    }

    /// The relative path a child named `name` would have.
    pub fn child_path(&self, name: &str) -> String {
        join_relative_path(&self.relative_path, name)
    }

    /// Resolved bit for one permission kind.
    pub fn can(&self, permission: Permission) -> bool {
        self.access.get(permission)
    }
}

/// A directory resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryResource {
    /// Shared path fields.
    #[serde(flatten)]
    pub resource: PathResource,
}

/// A file resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetaResource {
    /// Shared path fields.
    #[serde(flatten)]
    pub resource: PathResource,
    /// Size of the file on disk.
    pub file_size_bytes: i64,
    /// Detected MIME type.
    pub mime_type: Option<String>,
    /// Whether the bytes are also held in the binary blob table.
    pub is_binary_mirrored: bool,
}

impl Deref for DirectoryResource {
    type Target = PathResource;

    fn deref(&self) -> &PathResource {
        &self.resource
    }
}

impl DerefMut for DirectoryResource {
    fn deref_mut(&mut self) -> &mut PathResource {
        &mut self.resource
    }
}

impl Deref for FileMetaResource {
    type Target = PathResource;

    fn deref(&self) -> &PathResource {
        &self.resource
    }
}

impl DerefMut for FileMetaResource {
    fn deref_mut(&mut self) -> &mut PathResource {
        &mut self.resource
    }
}

/// Either kind of path resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resource {
    /// A directory.
    Directory(DirectoryResource),
    /// A file.
    File(FileMetaResource),
}

impl Resource {
    /// Shared path fields.
    pub fn path(&self) -> &PathResource {
        match self {
            Self::Directory(d) => &d.resource,
            Self::File(f) => &f.resource,
        }
    }

    /// Mutable shared path fields.
    pub fn path_mut(&mut self) -> &mut PathResource {
        match self {
            Self::Directory(d) => &mut d.resource,
            Self::File(f) => &mut f.resource,
        }
    }

    /// The described node.
    pub fn node_id(&self) -> NodeId {
        self.path().node_id
    }

    /// Directory or file.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Directory(_) => ResourceType::Directory,
            Self::File(_) => ResourceType::File,
        }
    }

    /// Whether this is a directory.
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Borrow as a file, if it is one.
    pub fn as_file(&self) -> Option<&FileMetaResource> {
        match self {
            Self::File(f) => Some(f),
            Self::Directory(_) => None,
        }
    }

    /// Convert into a directory or fail with a validation error.
    pub fn into_directory(self) -> AppResult<DirectoryResource> {
        match self {
            Self::Directory(d) => Ok(d),
            Self::File(f) => Err(AppError::validation(format!(
                "Node {} is a file, not a directory",
                f.node_id
            ))),
        }
    }

    /// Convert into a file or fail with a validation error.
    pub fn into_file(self) -> AppResult<FileMetaResource> {
        match self {
            Self::File(f) => Ok(f),
            Self::Directory(d) => Err(AppError::validation(format!(
                "Node {} is a directory, not a file",
                d.node_id
            ))),
        }
    }
}

impl From<DirectoryResource> for Resource {
    fn from(dir: DirectoryResource) -> Self {
        Self::Directory(dir)
    }
}

impl From<FileMetaResource> for Resource {
    fn from(file: FileMetaResource) -> Self {
        Self::File(file)
    }
}

impl TreeRow for Resource {
    fn row_id(&self) -> NodeId {
        self.node_id()
    }

    fn row_parent_id(&self) -> Option<NodeId> {
        self.path().parent_node_id
    }

    fn row_name(&self) -> &str {
        &self.path().path_name
    }
}

/// Data required to record a new file under a directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFileMeta {
    /// File name.
    pub name: String,
    /// Size of the bytes written to disk.
    pub file_size_bytes: i64,
    /// Detected MIME type.
    pub mime_type: Option<String>,
    /// Optional description.
    pub description: Option<String>,
    /// Declared access groups.
    pub groups: AccessGroups,
}
