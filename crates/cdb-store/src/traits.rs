//! Storage-trait boundary. The relational engine itself ("a Postgres-
//! compatible engine accessed via a SQL builder") is out of this core's
//! scope; these traits are the interface the spec calls for, consumed by
//! C2 (import) and C4 (resolution). C1 and C3 never touch storage directly:
//! C1 consumes plain iterators (SPEC_FULL.md §6), C3 only produces a query
//! plan for the caller to execute.

use std::collections::HashMap;

use async_trait::async_trait;
use cdb_models::{
    AcademicItem, AcademicItemVariant, AnnotationScheme, AnnotationValue, Assignment,
    BotAnnotation, BotAnnotationMetadata, Import, ImportRevision, LexisNexisItemSource,
    M2MImportItem, Result,
};
use uuid::Uuid;

/// One candidate/existing text observation, as consumed by the duplicate
/// index (C1) and produced here for the scan phases of C2.
#[derive(Debug, Clone)]
pub struct ItemEntry {
    pub item_id: Uuid,
    pub text: String,
}

/// Acquire/release semantics for the per-project import mutex
/// (SPEC_FULL.md §5). Implementations must fail loudly on nested
/// acquisition from within the same run.
#[async_trait]
pub trait ProjectLock: Send + Sync {
    async fn try_acquire(&self, project_id: Uuid) -> Result<()>;
    async fn release(&self, project_id: Uuid) -> Result<()>;
}

/// Reference describing which import a run should target: an existing
/// import id, or a `(name, item_type)` pair to get-or-create one.
#[derive(Debug, Clone)]
pub enum ImportRef {
    Existing(Uuid),
    Named {
        name: String,
        item_type: cdb_models::ItemKind,
        config: serde_json::Value,
    },
}

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn get_or_create_import(&self, project_id: Uuid, import_ref: &ImportRef) -> Result<Import>;
    async fn latest_revision(&self, import_id: Uuid) -> Result<Option<ImportRevision>>;
    async fn create_revision(&self, import_id: Uuid, revision_number: i32) -> Result<ImportRevision>;
    async fn update_revision_stats(
        &self,
        revision_id: Uuid,
        retrieved: i32,
        new: i32,
        updated: i32,
        removed: i32,
    ) -> Result<()>;
    async fn mark_started(&self, import_id: Uuid) -> Result<()>;
    async fn mark_finished(&self, import_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Looks up an item by one trusted external id (provider, value).
    async fn find_by_trusted_id(
        &self,
        project_id: Uuid,
        provider: &str,
        value: &str,
    ) -> Result<Option<Uuid>>;

    async fn find_by_title_slug(&self, project_id: Uuid, slug: &str) -> Result<Option<Uuid>>;

    /// Every `(provider, value) -> item_id` trusted-id pair known under a
    /// project, loaded once up front so C2's pass A can match candidates
    /// against an in-memory map instead of a round trip per id per
    /// candidate (SPEC_FULL.md §4.2 "PASS_A ... against loaded known-id maps").
    async fn trusted_id_map(&self, project_id: Uuid) -> Result<HashMap<(String, String), Uuid>>;

    /// All item texts already stored under a project, for C1's `init`.
    async fn existing_item_texts(&self, project_id: Uuid) -> Result<Vec<ItemEntry>>;

    async fn get_academic_item(&self, item_id: Uuid) -> Result<Option<AcademicItem>>;

    /// `text` is the item's abstract, stored on the shared `items` row
    /// (not on `academic_items`) so NQL's abstract/title filters and a
    /// later `existing_item_texts` call can see it.
    async fn insert_academic_item(&self, project_id: Uuid, item: &AcademicItem, text: Option<&str>) -> Result<Uuid>;

    async fn insert_academic_variant(&self, variant: &AcademicItemVariant) -> Result<Uuid>;

    /// Inserts or bumps `latest_revision` for an `(import_id, item_id)` tuple.
    async fn upsert_m2m(&self, row: &M2MImportItem) -> Result<()>;

    /// Item ids that were active at `revision - 1` but did not appear in
    /// `revision` (used to derive the "removed" count).
    async fn stale_at_revision(&self, import_id: Uuid, revision: i32) -> Result<Vec<Uuid>>;

    /// Looks up the item a previously-ingested LexisNexis source was
    /// attached to, by that source's own external id (SPEC_FULL.md §4.2
    /// "LexisNexis ingestion path" supplement).
    async fn find_item_by_lexis_source_id(
        &self,
        project_id: Uuid,
        lexis_id: &str,
    ) -> Result<Option<Uuid>>;

    /// Creates the `items` + `lexis_nexis_items` pair for a freshly observed
    /// logical article, keyed by its own `lexis_id`.
    async fn insert_lexis_item(&self, project_id: Uuid, lexis_id: &str, text: Option<&str>) -> Result<Uuid>;

    /// Attaches one syndicated outlet's source row to an (existing or
    /// freshly created) logical article.
    async fn insert_lexis_source(&self, source: &LexisNexisItemSource) -> Result<Uuid>;
}

/// One row of the annotation-ordering list (SPEC_FULL.md §4.4 step 2).
#[derive(Debug, Clone)]
pub struct OrderingEntry {
    pub key: String,
    pub item_id: Uuid,
    pub assignments: Vec<Assignment>,
}

/// A user annotation together with the full label path from the scheme
/// root, as emitted by the recursive parent-walking query.
#[derive(Debug, Clone)]
pub struct PathedAnnotation {
    pub item_id: Uuid,
    pub user_id: Uuid,
    pub path: Vec<String>,
    pub repeat: u32,
    pub value: AnnotationValue,
}

#[async_trait]
pub trait AnnotationStore: Send + Sync {
    async fn get_scheme(&self, scheme_id: Uuid) -> Result<AnnotationScheme>;

    async fn ordering(&self, scope_ids: &[Uuid]) -> Result<Vec<OrderingEntry>>;

    async fn fetch_annotations(
        &self,
        scope_ids: &[Uuid],
        scheme_id: Uuid,
    ) -> Result<Vec<PathedAnnotation>>;

    async fn get_bot_metadata(&self, id: Uuid) -> Result<BotAnnotationMetadata>;

    /// Every `BotAnnotation` row currently persisted under one metadata —
    /// the prior resolution C4 diffs a re-resolution run against.
    async fn fetch_resolutions(&self, metadata_id: Uuid) -> Result<Vec<BotAnnotation>>;

    /// Inserts a new `RESOLVE`-kind metadata row plus its resolutions,
    /// topologically ordered parents-first (SPEC_FULL.md §4.4 "Persistence").
    async fn commit_resolution(
        &self,
        metadata: &BotAnnotationMetadata,
        resolutions: &[BotAnnotation],
    ) -> Result<Uuid>;

    /// Updates an existing `RESOLVE`-kind metadata in place: existing rows
    /// updated, new ones inserted, rows whose cell no longer exists deleted.
    async fn update_resolution(
        &self,
        metadata: &BotAnnotationMetadata,
        resolutions: &[BotAnnotation],
    ) -> Result<()>;
}
