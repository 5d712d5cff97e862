//! Table and JSON output for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use treevault_core::types::Permission;
use treevault_entity::resource::Resource;
use treevault_entity::store::Store;

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of rows in the selected format.
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print one row in the selected format.
pub fn print_item<T: Serialize + Tabled>(item: T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", Table::new([item])),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&item).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
    }
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// A store as one table row.
#[derive(Debug, Serialize, Tabled)]
pub struct StoreRow {
    /// Store id
    pub id: i64,
    /// Name
    pub name: String,
    /// Disk root
    pub path: String,
    /// Rule for undeclared kinds
    pub access_rule: String,
    /// Mirroring threshold
    pub max_mirrored_bytes: i64,
}

impl From<&Store> for StoreRow {
    fn from(store: &Store) -> Self {
        Self {
            id: store.id.get(),
            name: store.name.clone(),
            path: store.path.clone(),
            access_rule: store.access_rule.to_string(),
            max_mirrored_bytes: store.max_mirrored_file_size_bytes,
        }
    }
}

/// A resource as one table row.
#[derive(Debug, Serialize, Tabled)]
pub struct ResourceRow {
    /// Node id
    pub node_id: i64,
    /// Directory or file
    pub kind: String,
    /// Path, indented by depth in tree listings
    pub path: String,
    /// Size in bytes, files only
    pub size: String,
    /// Declared groups as read/write/execute
    pub groups: String,
    /// Resolved bits for the acting user
    pub access: String,
}

impl ResourceRow {
    /// Row for `resource`, with `label` in the path column.
    pub fn new(resource: &Resource, label: String) -> Self {
        let path = resource.path();
        let declared = |p: Permission| path.groups.get(p).unwrap_or("-").to_string();
        let bit = |p: Permission, c: char| if path.can(p) { c } else { '-' };
        Self {
            node_id: path.node_id.get(),
            kind: resource.resource_type().to_string(),
            path: label,
            size: resource
                .as_file()
                .map(|f| f.file_size_bytes.to_string())
                .unwrap_or_default(),
            groups: format!(
                "{}/{}/{}",
                declared(Permission::Read),
                declared(Permission::Write),
                declared(Permission::Execute)
            ),
            access: [
                bit(Permission::Read, 'r'),
                bit(Permission::Write, 'w'),
                bit(Permission::Execute, 'x'),
            ]
            .iter()
            .collect(),
        }
    }
}

impl From<&Resource> for ResourceRow {
    fn from(resource: &Resource) -> Self {
        let path = resource.path();
        let label = if path.relative_path.is_empty() {
            "/".to_string()
        } else {
            path.relative_path.clone()
        };
        Self::new(resource, label)
    }
}
