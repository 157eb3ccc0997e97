use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::ItemKind;

/// A project exclusively owns all items created under it (cascade delete).
/// `import_mutex` is the persisted serialization point for C2: acquire
/// before import work, release on every exit path (SPEC_FULL.md §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Determines which item extension the project's items carry, and
    /// which field table C3 validates filters against.
    pub item_type: ItemKind,
    pub import_mutex: bool,
}

/// A named, typed ingestion scope, e.g. "Scopus query 2024-06".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub item_type: ItemKind,
    /// Source-specific ingestion configuration (query string, API params, ...).
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Monotonically counted (1..) per-import snapshot of one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportRevision {
    pub id: Uuid,
    pub import_id: Uuid,
    /// 1-based, strictly increasing per import.
    pub revision_number: i32,
    pub num_items_retrieved: Option<i32>,
    pub num_items_new: i32,
    pub num_items_updated: i32,
    pub num_items_removed: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "m2m_import_item_type", rename_all = "lowercase")]
pub enum M2MType {
    Explicit,
    Derived,
}

/// `(import_id, item_id)` membership tuple. `first_revision`/`latest_revision`
/// make the set of items "active in revision N" computable without a
/// separate membership-history table (invariant 3, spec.md §8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct M2MImportItem {
    pub import_id: Uuid,
    pub item_id: Uuid,
    pub m2m_type: M2MType,
    pub first_revision: i32,
    pub latest_revision: i32,
}
