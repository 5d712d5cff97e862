//! PostgreSQL metadata backend.
//!
//! Every trait method that writes more than one row opens a transaction;
//! closure fan-out and subtree reconnection are single set-based statements.

mod binary;
mod catalog;
mod node;
mod resource;
mod rows;

use sqlx::PgPool;

use treevault_core::error::{AppError, ErrorKind};

use crate::connection::DatabasePool;

/// Metadata store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgMetadataStore {
    db: DatabasePool,
}

impl PgMetadataStore {
    /// Create a store over an existing pool.
    pub fn new(db: DatabasePool) -> Self {
        Self { db }
    }

    fn pool(&self) -> &PgPool {
        self.db.pool()
    }
}

/// Map a sqlx error, turning unique violations into conflicts.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            match db.constraint() {
                Some("path_resource_sibling_name_key") => AppError::conflict(
                    "A resource with the same name and type already exists in this directory",
                ),
                Some("store_name_key") => AppError::conflict("A store with this name already exists"),
                _ => AppError::conflict(format!("{context}: duplicate entry")),
            }
        }
        _ => AppError::with_source(ErrorKind::Database, context, e),
    }
}

/// These run against the database named by `DATABASE_URL` and return early
/// when it is unset. Each test works under its own fresh root node or store.
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use treevault_core::config::DatabaseConfig;
    use treevault_core::types::NodeId;
    use treevault_entity::resource::AccessGroups;
    use treevault_entity::store::{AccessRule, NewStore};

    use crate::metadata::{NodeStore, ResourceStore, StoreCatalog};

    async fn connect() -> Option<PgMetadataStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        };
        let config = DatabaseConfig {
            backend: "postgres".into(),
            url,
            ..DatabaseConfig::default()
        };
        let db = DatabasePool::connect(&config).await.expect("connect and migrate");
        Some(PgMetadataStore::new(db))
    }

    fn unique(prefix: &str) -> String {
        format!("{prefix}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    async fn chain(db: &PgMetadataStore, names: &[&str]) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut parent = None;
        for name in names {
            let node = db.add_node(parent, name).await.expect("add node");
            parent = Some(node.id);
            ids.push(node.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_closure_depths_after_insert() {
        let Some(db) = connect().await else { return };
        let root_name = unique("root");
        let ids = chain(&db, &[&root_name, "a", "b", "c"]).await;

        let ancestors = db.get_ancestors(ids[3], None).await.expect("ancestors");
        let depths: Vec<i32> = ancestors.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![3, 2, 1, 0]);
        let path: Vec<NodeId> = ancestors.iter().map(|r| r.node_id).collect();
        assert_eq!(path, ids);

        let limited = db.get_ancestors(ids[3], Some(1)).await.expect("ancestors");
        assert_eq!(limited.len(), 2);
        assert!(db.is_descendant(ids[0], ids[3]).await.expect("check"));
        assert!(db.is_descendant(ids[2], ids[2]).await.expect("check"));
        assert!(!db.is_descendant(ids[3], ids[0]).await.expect("check"));
    }

    #[tokio::test]
    async fn test_depth_one_rows_are_siblings() {
        let Some(db) = connect().await else { return };
        let root = db.add_node(None, &unique("root")).await.expect("root");
        let x = db.add_node(Some(root.id), "x").await.expect("x");
        db.add_node(Some(root.id), "w").await.expect("w");
        db.add_node(Some(root.id), "y").await.expect("y");
        db.add_node(Some(x.id), "deep").await.expect("deep");

        let rows = db.get_descendants(root.id, None).await.expect("descendants");
        let siblings: Vec<&str> = rows
            .iter()
            .filter(|r| r.depth == 1)
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(siblings, vec!["w", "x", "y"]);
        assert!(rows.iter().all(|r| r.depth != 1 || r.parent_id == Some(root.id)));

        let shallow = db.get_descendants(root.id, Some(1)).await.expect("descendants");
        assert_eq!(shallow.len(), 4);
    }

    #[tokio::test]
    async fn test_relocate_into_own_subtree_is_structural() {
        let Some(db) = connect().await else { return };
        let root_name = unique("root");
        let ids = chain(&db, &[&root_name, "a", "b"]).await;

        let err = db.relocate(ids[1], ids[2]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);
        let err = db.relocate(ids[1], ids[1]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Structural);

        // The rejected relocations left the closure as it was.
        let depths: Vec<i32> = db
            .get_ancestors(ids[2], None)
            .await
            .expect("ancestors")
            .iter()
            .map(|r| r.depth)
            .collect();
        assert_eq!(depths, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn test_relocate_rewrites_subtree_depths() {
        let Some(db) = connect().await else { return };
        let root = db.add_node(None, &unique("root")).await.expect("root");
        let a = db.add_node(Some(root.id), "a").await.expect("a");
        let b = db.add_node(Some(a.id), "b").await.expect("b");
        let c = db.add_node(Some(b.id), "c").await.expect("c");
        let other = db.add_node(Some(root.id), "other").await.expect("other");

        db.relocate(b.id, other.id).await.expect("relocate");

        let path: Vec<NodeId> = db
            .get_ancestors(c.id, None)
            .await
            .expect("ancestors")
            .iter()
            .map(|r| r.node_id)
            .collect();
        assert_eq!(path, vec![root.id, other.id, b.id, c.id]);
        assert!(!db.is_descendant(a.id, c.id).await.expect("check"));
        let moved = db.get_node(b.id).await.expect("node").expect("exists");
        assert_eq!(moved.parent_id, Some(other.id));
    }

    #[tokio::test]
    async fn test_prune_leaves_siblings_alone() {
        let Some(db) = connect().await else { return };
        let root = db.add_node(None, &unique("root")).await.expect("root");
        let doomed = db.add_node(Some(root.id), "doomed").await.expect("doomed");
        let inner = db.add_node(Some(doomed.id), "inner").await.expect("inner");
        let kept = db.add_node(Some(root.id), "kept").await.expect("kept");
        let kept_child = db.add_node(Some(kept.id), "child").await.expect("child");

        let removed = db.prune(doomed.id, true).await.expect("prune");
        assert_eq!(removed, vec![inner.id, doomed.id]);
        assert!(db.get_node(doomed.id).await.expect("lookup").is_none());
        assert!(db.get_node(inner.id).await.expect("lookup").is_none());

        let path: Vec<NodeId> = db
            .get_ancestors(kept_child.id, None)
            .await
            .expect("ancestors")
            .iter()
            .map(|r| r.node_id)
            .collect();
        assert_eq!(path, vec![root.id, kept.id, kept_child.id]);
        let remaining: Vec<NodeId> = db
            .get_descendants(root.id, None)
            .await
            .expect("descendants")
            .iter()
            .map(|r| r.node_id)
            .collect();
        assert_eq!(remaining.len(), 3);
        assert!(!remaining.contains(&inner.id));

        // Pruning below a node keeps the node itself.
        assert_eq!(db.prune(kept.id, false).await.expect("prune"), vec![kept_child.id]);
        assert!(db.get_node(kept.id).await.expect("lookup").is_some());
    }

    #[tokio::test]
    async fn test_unique_violations_map_to_conflict() {
        let Some(db) = connect().await else { return };
        let new_store = NewStore {
            name: unique("store"),
            description: None,
            path: "/tmp/unused".into(),
            max_mirrored_file_size_bytes: 0,
            access_rule: AccessRule::Deny,
            root_groups: AccessGroups::all("G1"),
        };
        let store = db.create_store(&new_store).await.expect("create store");
        let err = db.create_store(&new_store).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        db.insert_directory(&store.root_dir, "Reports", None, &AccessGroups::inherit())
            .await
            .expect("insert directory");
        let err = db
            .insert_directory(&store.root_dir, "reports", None, &AccessGroups::inherit())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        let children = db.list_children(store.root_dir_node_id).await.expect("children");
        assert_eq!(children.len(), 1);
    }
}
