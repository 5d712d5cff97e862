//! Row shapes that only exist at the SQL boundary.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use treevault_core::types::{NodeId, StoreId};
use treevault_entity::resource::{
    AccessBits, AccessGroups, DirectoryResource, FileMetaResource, PathResource, Resource,
    ResourceType,
};
use treevault_entity::store::{AccessRule, Store};

/// Columns of a path resource joined with its optional file row.
macro_rules! resource_select {
    ($tail:literal) => {
        concat!(
            "SELECT p.node_id, p.parent_node_id, p.store_id, p.resource_type, p.path_name, \
             p.relative_path, p.description, p.read_group, p.write_group, p.execute_group, \
             p.created_at, p.updated_at, f.file_size_bytes, f.mime_type, f.is_binary_mirrored \
             FROM path_resource p LEFT JOIN file_meta_resource f ON f.node_id = p.node_id ",
            $tail
        )
    };
}

pub(crate) use resource_select;

#[derive(Debug, FromRow)]
pub(crate) struct ResourceRow {
    node_id: NodeId,
    parent_node_id: Option<NodeId>,
    store_id: StoreId,
    resource_type: ResourceType,
    path_name: String,
    relative_path: String,
    description: Option<String>,
    read_group: Option<String>,
    write_group: Option<String>,
    execute_group: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    file_size_bytes: Option<i64>,
    mime_type: Option<String>,
    is_binary_mirrored: Option<bool>,
}

impl ResourceRow {
    pub(crate) fn into_resource(self) -> Resource {
        let path = PathResource {
            node_id: self.node_id,
            parent_node_id: self.parent_node_id,
            store_id: self.store_id,
            resource_type: self.resource_type,
            path_name: self.path_name,
            relative_path: self.relative_path,
            description: self.description,
            groups: AccessGroups {
                read: self.read_group,
                write: self.write_group,
                execute: self.execute_group,
            },
            access: AccessBits::default(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        match self.resource_type {
            ResourceType::Directory => Resource::Directory(DirectoryResource { resource: path }),
            ResourceType::File => Resource::File(FileMetaResource {
                resource: path,
                file_size_bytes: self.file_size_bytes.unwrap_or_default(),
                mime_type: self.mime_type,
                is_binary_mirrored: self.is_binary_mirrored.unwrap_or(false),
            }),
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct StoreRow {
    pub(crate) id: StoreId,
    name: String,
    description: Option<String>,
    path: String,
    pub(crate) root_dir_node_id: NodeId,
    max_mirrored_file_size_bytes: i64,
    access_rule: AccessRule,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoreRow {
    pub(crate) fn into_store(self, root_dir: DirectoryResource) -> Store {
        Store {
            id: self.id,
            name: self.name,
            description: self.description,
            path: self.path,
            root_dir_node_id: self.root_dir_node_id,
            max_mirrored_file_size_bytes: self.max_mirrored_file_size_bytes,
            access_rule: self.access_rule,
            created_at: self.created_at,
            updated_at: self.updated_at,
            root_dir,
        }
    }
}
