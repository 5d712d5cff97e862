//! Closure-table node operations.

use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::debug;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::NodeId;
use treevault_entity::node::{ClosureJoinedRow, Node};

use super::{PgMetadataStore, db_error};
use crate::metadata::NodeStore;

/// Insert a node, its self row, and the fan-out rows against its parent's
/// ancestors.
pub(crate) async fn insert_node(
    conn: &mut PgConnection,
    parent_id: Option<NodeId>,
    name: &str,
) -> AppResult<Node> {
    if let Some(parent) = parent_id {
        ensure_node(conn, parent).await?;
    }

    let node = sqlx::query_as::<_, Node>(
        "INSERT INTO node (parent_id, name) VALUES ($1, $2) \
         RETURNING id, parent_id, created_at, updated_at, name",
    )
    .bind(parent_id)
    .bind(name)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("Failed to insert node"))?;

    sqlx::query(
        "INSERT INTO node_closure (ancestor_id, descendant_id, depth) \
         SELECT $1, $1, 0 \
         UNION ALL \
         SELECT ancestor_id, $1, depth + 1 FROM node_closure WHERE descendant_id = $2",
    )
    .bind(node.id)
    .bind(parent_id)
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to insert closure rows"))?;

    debug!(node_id = %node.id, parent_id = ?parent_id, "Inserted node");
    Ok(node)
}

/// Fail with not-found unless the node exists.
pub(crate) async fn ensure_node(conn: &mut PgConnection, node_id: NodeId) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM node WHERE id = $1)")
        .bind(node_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("Failed to look up node"))?;
    if exists {
        Ok(())
    } else {
        Err(AppError::not_found(format!("Node {node_id} not found")))
    }
}

async fn is_descendant_in(
    conn: &mut PgConnection,
    ancestor_id: NodeId,
    node_id: NodeId,
) -> AppResult<bool> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM node_closure WHERE ancestor_id = $1 AND descendant_id = $2)",
    )
    .bind(ancestor_id)
    .bind(node_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(db_error("Failed to check ancestry"))
}

/// Detach the subtree of `node_id` from its old ancestors and attach it
/// under `new_parent_id`.
pub(crate) async fn relocate_in(
    conn: &mut PgConnection,
    node_id: NodeId,
    new_parent_id: NodeId,
) -> AppResult<()> {
    ensure_node(conn, node_id).await?;
    ensure_node(conn, new_parent_id).await?;
    if is_descendant_in(conn, node_id, new_parent_id).await? {
        return Err(AppError::structural(format!(
            "Cannot move node {node_id} under its own subtree ({new_parent_id})"
        )));
    }

    sqlx::query(
        "DELETE FROM node_closure \
         WHERE descendant_id IN (SELECT descendant_id FROM node_closure WHERE ancestor_id = $1) \
           AND ancestor_id NOT IN (SELECT descendant_id FROM node_closure WHERE ancestor_id = $1)",
    )
    .bind(node_id)
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to detach subtree"))?;

    sqlx::query(
        "INSERT INTO node_closure (ancestor_id, descendant_id, depth) \
         SELECT p.ancestor_id, c.descendant_id, p.depth + c.depth + 1 \
         FROM node_closure p CROSS JOIN node_closure c \
         WHERE p.descendant_id = $2 AND c.ancestor_id = $1",
    )
    .bind(node_id)
    .bind(new_parent_id)
    .execute(&mut *conn)
    .await
    .map_err(db_error("Failed to attach subtree"))?;

    sqlx::query("UPDATE node SET parent_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(node_id)
        .bind(new_parent_id)
        .execute(&mut *conn)
        .await
        .map_err(db_error("Failed to update node parent"))?;

    Ok(())
}

/// Delete the subtree of `node_id` and every row keyed by its nodes.
pub(crate) async fn prune_in(
    conn: &mut PgConnection,
    node_id: NodeId,
    include_self: bool,
) -> AppResult<Vec<NodeId>> {
    ensure_node(conn, node_id).await?;

    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT descendant_id FROM node_closure \
         WHERE ancestor_id = $1 AND (depth > 0 OR $2) \
         ORDER BY depth DESC",
    )
    .bind(node_id)
    .bind(include_self)
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to collect subtree"))?;

    if ids.is_empty() {
        return Ok(Vec::new());
    }

    for statement in [
        "DELETE FROM binary_resource WHERE node_id = ANY($1)",
        "DELETE FROM file_meta_resource WHERE node_id = ANY($1)",
        "DELETE FROM directory_resource WHERE node_id = ANY($1)",
        "DELETE FROM path_resource WHERE node_id = ANY($1)",
        "DELETE FROM node_closure WHERE ancestor_id = ANY($1) OR descendant_id = ANY($1)",
        "DELETE FROM node WHERE id = ANY($1)",
    ] {
        sqlx::query(statement)
            .bind(&ids)
            .execute(&mut *conn)
            .await
            .map_err(db_error("Failed to prune subtree"))?;
    }

    debug!(node_id = %node_id, removed = ids.len(), include_self, "Pruned subtree");
    Ok(ids.into_iter().map(NodeId).collect())
}

#[async_trait]
impl NodeStore for PgMetadataStore {
    async fn add_node(&self, parent_id: Option<NodeId>, name: &str) -> AppResult<Node> {
        let mut tx = self.db.begin().await?;
        let node = insert_node(&mut tx, parent_id, name).await?;
        tx.commit().await.map_err(db_error("Failed to commit node"))?;
        Ok(node)
    }

    async fn get_node(&self, node_id: NodeId) -> AppResult<Option<Node>> {
        sqlx::query_as::<_, Node>(
            "SELECT id, parent_id, created_at, updated_at, name FROM node WHERE id = $1",
        )
        .bind(node_id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_error("Failed to find node"))
    }

    async fn rename_node(&self, node_id: NodeId, name: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE node SET name = $2, updated_at = NOW() WHERE id = $1")
            .bind(node_id)
            .bind(name)
            .execute(self.pool())
            .await
            .map_err(db_error("Failed to rename node"))?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Node {node_id} not found")));
        }
        Ok(())
    }

    async fn get_descendants(
        &self,
        node_id: NodeId,
        max_depth: Option<i32>,
    ) -> AppResult<Vec<ClosureJoinedRow>> {
        sqlx::query_as::<_, ClosureJoinedRow>(
            "SELECT c.link_id, c.ancestor_id, c.descendant_id, c.depth, \
                    n.id AS node_id, n.parent_id, n.name, n.created_at, n.updated_at \
             FROM node_closure c JOIN node n ON n.id = c.descendant_id \
             WHERE c.ancestor_id = $1 AND ($2::INT4 IS NULL OR c.depth <= $2) \
             ORDER BY c.depth ASC, n.name ASC",
        )
        .bind(node_id)
        .bind(max_depth)
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Failed to list descendants"))
    }

    async fn get_ancestors(
        &self,
        node_id: NodeId,
        max_levels: Option<i32>,
    ) -> AppResult<Vec<ClosureJoinedRow>> {
        sqlx::query_as::<_, ClosureJoinedRow>(
            "SELECT c.link_id, c.ancestor_id, c.descendant_id, c.depth, \
                    n.id AS node_id, n.parent_id, n.name, n.created_at, n.updated_at \
             FROM node_closure c JOIN node n ON n.id = c.ancestor_id \
             WHERE c.descendant_id = $1 AND ($2::INT4 IS NULL OR c.depth <= $2) \
             ORDER BY c.depth DESC",
        )
        .bind(node_id)
        .bind(max_levels)
        .fetch_all(self.pool())
        .await
        .map_err(db_error("Failed to list ancestors"))
    }

    async fn is_descendant(&self, ancestor_id: NodeId, node_id: NodeId) -> AppResult<bool> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        is_descendant_in(&mut conn, ancestor_id, node_id).await
    }

    async fn prune(&self, node_id: NodeId, include_self: bool) -> AppResult<Vec<NodeId>> {
        let mut tx = self.db.begin().await?;
        let removed = prune_in(&mut tx, node_id, include_self).await?;
        tx.commit().await.map_err(db_error("Failed to commit prune"))?;
        Ok(removed)
    }

    async fn relocate(&self, node_id: NodeId, new_parent_id: NodeId) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        relocate_in(&mut tx, node_id, new_parent_id).await?;
        tx.commit().await.map_err(db_error("Failed to commit relocation"))?;
        Ok(())
    }
}
