//! Store catalog.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgConnection;
use tracing::info;

use treevault_core::error::AppError;
use treevault_core::result::AppResult;
use treevault_core::types::StoreId;
use treevault_entity::resource::{AccessBits, DirectoryResource, PathResource, ResourceType};
use treevault_entity::store::{NewStore, Store};

use super::node::insert_node;
use super::resource::{find_resource_in, insert_directory_row, insert_path_row};
use super::rows::StoreRow;
use super::{PgMetadataStore, db_error};
use crate::metadata::StoreCatalog;

const STORE_COLUMNS: &str = "id, name, description, path, root_dir_node_id, \
     max_mirrored_file_size_bytes, access_rule, created_at, updated_at";

async fn attach_root(conn: &mut PgConnection, row: StoreRow) -> AppResult<Store> {
    let root = find_resource_in(conn, row.root_dir_node_id)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("Root directory of store {} is missing", row.id))
        })?
        .into_directory()?;
    Ok(row.into_store(root))
}

#[async_trait]
impl StoreCatalog for PgMetadataStore {
    async fn create_store(&self, new: &NewStore) -> AppResult<Store> {
        if !new.root_groups.is_complete() {
            return Err(AppError::validation(
                "A store root directory must declare read, write, and execute groups",
            ));
        }

        let mut tx = self.db.begin().await?;
        let root = insert_node(&mut tx, None, &new.name).await?;

        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "INSERT INTO store (name, description, path, root_dir_node_id, \
             max_mirrored_file_size_bytes, access_rule) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {STORE_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.path)
        .bind(root.id)
        .bind(new.max_mirrored_file_size_bytes)
        .bind(new.access_rule)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to insert store"))?;

        let now = Utc::now();
        let root_dir = DirectoryResource {
            resource: PathResource {
                node_id: root.id,
                parent_node_id: None,
                store_id: row.id,
                resource_type: ResourceType::Directory,
                path_name: new.name.clone(),
                relative_path: String::new(),
                description: new.description.clone(),
                groups: new.root_groups.clone(),
                access: AccessBits::default(),
                created_at: now,
                updated_at: now,
            },
        };
        insert_path_row(&mut tx, &root_dir).await?;
        insert_directory_row(&mut tx, root.id).await?;

        tx.commit().await.map_err(db_error("Failed to commit store"))?;

        info!(store_id = %row.id, name = %new.name, path = %new.path, "Created store");
        Ok(row.into_store(root_dir))
    }

    async fn find_store(&self, store_id: StoreId) -> AppResult<Option<Store>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM store WHERE id = $1"
        ))
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to find store"))?;

        match row {
            Some(row) => attach_root(&mut conn, row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_store_by_name(&self, name: &str) -> AppResult<Option<Store>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        let row = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM store WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to find store by name"))?;

        match row {
            Some(row) => attach_root(&mut conn, row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn list_stores(&self) -> AppResult<Vec<Store>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        let rows = sqlx::query_as::<_, StoreRow>(&format!(
            "SELECT {STORE_COLUMNS} FROM store ORDER BY id ASC"
        ))
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("Failed to list stores"))?;

        let mut stores = Vec::with_capacity(rows.len());
        for row in rows {
            stores.push(attach_root(&mut conn, row).await?);
        }
        Ok(stores)
    }
}
