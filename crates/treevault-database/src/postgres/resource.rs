//! Path resource operations.

use async_trait::async_trait;
use sqlx::PgConnection;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::NodeId;
use treevault_entity::resource::{
    AccessGroups, DirectoryResource, FileMetaResource, NewFileMeta, PathResource, Resource,
    ResourceType,
};

use super::node::{insert_node, relocate_in};
use super::rows::{ResourceRow, resource_select};
use super::{PgMetadataStore, db_error};
use crate::metadata::ResourceStore;

/// Insert the path row for a freshly created node.
pub(crate) async fn insert_path_row(conn: &mut PgConnection, path: &PathResource) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO path_resource (node_id, parent_node_id, store_id, resource_type, path_name, \
         relative_path, description, read_group, write_group, execute_group, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(path.node_id)
    .bind(path.parent_node_id)
    .bind(path.store_id)
    .bind(path.resource_type)
    .bind(&path.path_name)
    .bind(&path.relative_path)
    .bind(&path.description)
    .bind(&path.groups.read)
    .bind(&path.groups.write)
    .bind(&path.groups.execute)
    .bind(path.created_at)
    .bind(path.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to insert path resource"))?;
    Ok(())
}

/// Insert the directory row for an existing path row.
pub(crate) async fn insert_directory_row(conn: &mut PgConnection, node_id: NodeId) -> AppResult<()> {
    sqlx::query("INSERT INTO directory_resource (node_id) VALUES ($1)")
        .bind(node_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to insert directory resource"))?;
    Ok(())
}

pub(crate) async fn find_resource_in(
    conn: &mut PgConnection,
    node_id: NodeId,
) -> AppResult<Option<Resource>> {
    sqlx::query_as::<_, ResourceRow>(resource_select!("WHERE p.node_id = $1"))
        .bind(node_id)
        .fetch_optional(&mut *conn)
        .await
        .map(|row| row.map(ResourceRow::into_resource))
        .map_err(db_error("Failed to find resource"))
}

async fn update_row(conn: &mut PgConnection, path: &PathResource) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE path_resource SET parent_node_id = $2, store_id = $3, path_name = $4, \
         relative_path = $5, description = $6, read_group = $7, write_group = $8, \
         execute_group = $9, updated_at = NOW() WHERE node_id = $1",
    )
    .bind(path.node_id)
    .bind(path.parent_node_id)
    .bind(path.store_id)
    .bind(&path.path_name)
    .bind(&path.relative_path)
    .bind(&path.description)
    .bind(&path.groups.read)
    .bind(&path.groups.write)
    .bind(&path.groups.execute)
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to update path resource"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!(
            "Resource {} not found",
            path.node_id
        )));
    }

    sqlx::query("UPDATE node SET name = $2, updated_at = NOW() WHERE id = $1")
        .bind(path.node_id)
        .bind(&path.path_name)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to update node name"))?;
    Ok(())
}

#[async_trait]
impl ResourceStore for PgMetadataStore {
    async fn insert_directory(
        &self,
        parent: &PathResource,
        name: &str,
        description: Option<&str>,
        groups: &AccessGroups,
    ) -> AppResult<DirectoryResource> {
        let mut tx = self.db.begin().await?;
        let node = insert_node(&mut tx, Some(parent.node_id), name).await?;

        let dir = DirectoryResource {
            resource: PathResource {
                node_id: node.id,
                parent_node_id: Some(parent.node_id),
                store_id: parent.store_id,
                resource_type: ResourceType::Directory,
                path_name: name.to_string(),
                relative_path: parent.child_path(name),
                description: description.map(str::to_string),
                groups: groups.clone(),
                access: Default::default(),
                created_at: node.created_at,
                updated_at: node.updated_at,
            },
        };
        insert_path_row(&mut tx, &dir).await?;
        insert_directory_row(&mut tx, node.id).await?;

        tx.commit().await.map_err(db_error("Failed to commit directory"))?;
        Ok(dir)
    }

    async fn insert_file(
        &self,
        parent: &PathResource,
        file: &NewFileMeta,
    ) -> AppResult<FileMetaResource> {
        let mut tx = self.db.begin().await?;
        let node = insert_node(&mut tx, Some(parent.node_id), &file.name).await?;

        let meta = FileMetaResource {
            resource: PathResource {
                node_id: node.id,
                parent_node_id: Some(parent.node_id),
                store_id: parent.store_id,
                resource_type: ResourceType::File,
                path_name: file.name.clone(),
                relative_path: parent.child_path(&file.name),
                description: file.description.clone(),
                groups: file.groups.clone(),
                access: Default::default(),
                created_at: node.created_at,
                updated_at: node.updated_at,
            },
            file_size_bytes: file.file_size_bytes,
            mime_type: file.mime_type.clone(),
            is_binary_mirrored: false,
        };
        insert_path_row(&mut tx, &meta).await?;

        sqlx::query(
            "INSERT INTO file_meta_resource (node_id, file_size_bytes, mime_type, is_binary_mirrored) \
             VALUES ($1, $2, $3, FALSE)",
        )
        .bind(node.id)
        .bind(meta.file_size_bytes)
        .bind(&meta.mime_type)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert file resource"))?;

        tx.commit().await.map_err(db_error("Failed to commit file"))?;
        Ok(meta)
    }

    async fn find_resource(&self, node_id: NodeId) -> AppResult<Option<Resource>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        find_resource_in(&mut conn, node_id).await
    }

    async fn find_child(
        &self,
        dir_id: NodeId,
        name: &str,
        resource_type: ResourceType,
        exclude: Option<NodeId>,
    ) -> AppResult<Option<Resource>> {
        sqlx::query_as::<_, ResourceRow>(resource_select!(
            "WHERE p.parent_node_id = $1 AND p.resource_type = $2 \
             AND LOWER(p.path_name) = LOWER($3) \
             AND ($4::INT8 IS NULL OR p.node_id <> $4) LIMIT 1"
        ))
        .bind(dir_id)
        .bind(resource_type)
        .bind(name)
        .bind(exclude)
        .fetch_optional(self.pool())
        .await
        .map(|row| row.map(ResourceRow::into_resource))
        .map_err(db_error("Failed to find child resource"))
    }

    async fn list_children(&self, dir_id: NodeId) -> AppResult<Vec<Resource>> {
        sqlx::query_as::<_, ResourceRow>(resource_select!(
            "WHERE p.parent_node_id = $1 ORDER BY p.resource_type ASC, p.path_name ASC"
        ))
        .bind(dir_id)
        .fetch_all(self.pool())
        .await
        .map(|rows| rows.into_iter().map(ResourceRow::into_resource).collect())
        .map_err(db_error("Failed to list children"))
    }

    async fn find_subtree(
        &self,
        node_id: NodeId,
        max_depth: Option<i32>,
    ) -> AppResult<Vec<Resource>> {
        sqlx::query_as::<_, ResourceRow>(resource_select!(
            "JOIN node_closure c ON c.descendant_id = p.node_id \
             WHERE c.ancestor_id = $1 AND ($2::INT4 IS NULL OR c.depth <= $2) \
             ORDER BY c.depth ASC, p.path_name ASC"
        ))
        .bind(node_id)
        .bind(max_depth)
        .fetch_all(self.pool())
        .await
        .map(|rows| rows.into_iter().map(ResourceRow::into_resource).collect())
        .map_err(db_error("Failed to load subtree"))
    }

    async fn find_ancestor_chain(&self, node_id: NodeId) -> AppResult<Vec<Resource>> {
        sqlx::query_as::<_, ResourceRow>(resource_select!(
            "JOIN node_closure c ON c.ancestor_id = p.node_id \
             WHERE c.descendant_id = $1 \
             ORDER BY c.depth DESC"
        ))
        .bind(node_id)
        .fetch_all(self.pool())
        .await
        .map(|rows| rows.into_iter().map(ResourceRow::into_resource).collect())
        .map_err(db_error("Failed to load ancestor chain"))
    }

    async fn update_resources(&self, resources: &[PathResource]) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        for path in resources {
            update_row(&mut tx, path).await?;
        }
        tx.commit().await.map_err(db_error("Failed to commit resource updates"))?;
        Ok(())
    }

    async fn relocate_resource(
        &self,
        node_id: NodeId,
        new_parent_id: NodeId,
        updated: &[PathResource],
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        relocate_in(&mut tx, node_id, new_parent_id).await?;
        for path in updated {
            update_row(&mut tx, path).await?;
        }
        tx.commit().await.map_err(db_error("Failed to commit relocation"))?;
        Ok(())
    }

    async fn replace_file_meta(
        &self,
        node_id: NodeId,
        file_size_bytes: i64,
        mime_type: Option<&str>,
    ) -> AppResult<FileMetaResource> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE file_meta_resource SET file_size_bytes = $2, mime_type = $3, \
             is_binary_mirrored = FALSE WHERE node_id = $1",
        )
        .bind(node_id)
        .bind(file_size_bytes)
        .bind(mime_type)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to update file resource"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("File {node_id} not found")));
        }

        sqlx::query("DELETE FROM binary_resource WHERE node_id = $1")
            .bind(node_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to discard mirrored binary"))?;

        sqlx::query("UPDATE path_resource SET updated_at = NOW() WHERE node_id = $1")
            .bind(node_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to touch path resource"))?;

        let file = find_resource_in(&mut tx, node_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("File {node_id} not found")))?
            .into_file()?;

        tx.commit().await.map_err(db_error("Failed to commit file replacement"))?;
        Ok(file)
    }
}
