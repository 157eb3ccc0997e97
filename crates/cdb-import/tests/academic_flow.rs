//! End-to-end exercise of `import_academic_items` against in-memory mocks
//! of the storage traits, covering the seed scenarios and testable
//! properties that a real Postgres-backed run can't be exercised against
//! here (SPEC_FULL.md §8).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cdb_import::{import_academic_items, ImportOptions, RawAcademicRecord};
use cdb_models::{
    AcademicItem, AcademicItemVariant, Error, Import, ImportRevision, ItemKind, M2MImportItem,
    Result,
};
use cdb_store::{ImportRef, ImportStore, ItemEntry, ItemStore, ProjectLock};
use chrono::Utc;
use uuid::Uuid;

#[derive(Default)]
struct MockState {
    mutex_held: bool,
    import: Option<Import>,
    revisions: Vec<ImportRevision>,
    academic_items: HashMap<Uuid, AcademicItem>,
    item_texts: HashMap<Uuid, String>,
    variants: Vec<AcademicItemVariant>,
    m2m: HashMap<(Uuid, Uuid), M2MImportItem>,
}

/// Single-project in-memory stand-in for `PgProjectLock` + `PgImportStore`
/// + `PgItemStore`, implementing all three traits the way a hand-rolled
/// `MockControlPlane` stands in for a real control plane in other tests.
#[derive(Default)]
struct MockStore {
    state: Mutex<MockState>,
}

impl MockStore {
    fn new() -> Self {
        Self::default()
    }

    fn revision_count(&self) -> usize {
        self.state.lock().unwrap().revisions.len()
    }

    fn mutex_held(&self) -> bool {
        self.state.lock().unwrap().mutex_held
    }

    fn academic_item_count(&self) -> usize {
        self.state.lock().unwrap().academic_items.len()
    }

    fn variant_count(&self) -> usize {
        self.state.lock().unwrap().variants.len()
    }

    fn m2m_count(&self) -> usize {
        self.state.lock().unwrap().m2m.len()
    }

    /// Seeds an already-persisted academic item as if a prior revision had
    /// inserted it, so PASS_A's trusted-id map is non-empty at the start.
    fn seed_item(&self, item: AcademicItem, text: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        if let Some(text) = text {
            state.item_texts.insert(item.item_id, text.to_string());
        }
        state.academic_items.insert(item.item_id, item);
    }
}

#[async_trait]
impl ProjectLock for MockStore {
    async fn try_acquire(&self, project_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.mutex_held {
            return Err(Error::MutexHeld(project_id));
        }
        state.mutex_held = true;
        Ok(())
    }

    async fn release(&self, _project_id: Uuid) -> Result<()> {
        self.state.lock().unwrap().mutex_held = false;
        Ok(())
    }
}

#[async_trait]
impl ImportStore for MockStore {
    async fn get_or_create_import(&self, project_id: Uuid, import_ref: &ImportRef) -> Result<Import> {
        let mut state = self.state.lock().unwrap();
        if let Some(import) = state.import.clone() {
            return Ok(import);
        }
        let (name, item_type, config) = match import_ref {
            ImportRef::Existing(id) => return Err(Error::NotFound(id.to_string())),
            ImportRef::Named { name, item_type, config } => (name.clone(), *item_type, config.clone()),
        };
        let import = Import {
            id: Uuid::new_v4(),
            project_id,
            name,
            item_type,
            config,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };
        state.import = Some(import.clone());
        Ok(import)
    }

    async fn latest_revision(&self, import_id: Uuid) -> Result<Option<ImportRevision>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .revisions
            .iter()
            .filter(|r| r.import_id == import_id)
            .max_by_key(|r| r.revision_number)
            .cloned())
    }

    async fn create_revision(&self, import_id: Uuid, revision_number: i32) -> Result<ImportRevision> {
        let revision = ImportRevision {
            id: Uuid::new_v4(),
            import_id,
            revision_number,
            num_items_retrieved: None,
            num_items_new: 0,
            num_items_updated: 0,
            num_items_removed: 0,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().revisions.push(revision.clone());
        Ok(revision)
    }

    async fn update_revision_stats(
        &self,
        revision_id: Uuid,
        retrieved: i32,
        new: i32,
        updated: i32,
        removed: i32,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let revision = state
            .revisions
            .iter_mut()
            .find(|r| r.id == revision_id)
            .expect("revision exists");
        revision.num_items_retrieved = Some(retrieved);
        revision.num_items_new = new;
        revision.num_items_updated = updated;
        revision.num_items_removed = removed;
        Ok(())
    }

    async fn mark_started(&self, import_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(import) = state.import.as_mut().filter(|i| i.id == import_id) {
            import.started_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_finished(&self, import_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(import) = state.import.as_mut().filter(|i| i.id == import_id) {
            import.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MockStore {
    async fn find_by_trusted_id(&self, _project_id: Uuid, provider: &str, value: &str) -> Result<Option<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .academic_items
            .values()
            .find(|item| item.trusted_ids.present().any(|(p, v)| p == provider && v == value))
            .map(|item| item.item_id))
    }

    async fn find_by_title_slug(&self, _project_id: Uuid, slug: &str) -> Result<Option<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .academic_items
            .values()
            .find(|item| item.title_slug == slug)
            .map(|item| item.item_id))
    }

    async fn trusted_id_map(&self, _project_id: Uuid) -> Result<HashMap<(String, String), Uuid>> {
        let state = self.state.lock().unwrap();
        let mut map = HashMap::new();
        for item in state.academic_items.values() {
            if let Some(doi) = &item.doi {
                map.insert(("doi".to_string(), doi.clone()), item.item_id);
            }
            for (provider, value) in item.trusted_ids.present() {
                map.insert((provider.to_string(), value.to_string()), item.item_id);
            }
        }
        Ok(map)
    }

    async fn existing_item_texts(&self, _project_id: Uuid) -> Result<Vec<ItemEntry>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .item_texts
            .iter()
            .map(|(item_id, text)| ItemEntry { item_id: *item_id, text: text.clone() })
            .collect())
    }

    async fn get_academic_item(&self, item_id: Uuid) -> Result<Option<AcademicItem>> {
        Ok(self.state.lock().unwrap().academic_items.get(&item_id).cloned())
    }

    async fn insert_academic_item(&self, _project_id: Uuid, item: &AcademicItem, text: Option<&str>) -> Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        let item_id = Uuid::new_v4();
        let mut stored = item.clone();
        stored.item_id = item_id;
        if let Some(text) = text {
            state.item_texts.insert(item_id, text.to_string());
        }
        state.academic_items.insert(item_id, stored);
        Ok(item_id)
    }

    async fn insert_academic_variant(&self, variant: &AcademicItemVariant) -> Result<Uuid> {
        let mut state = self.state.lock().unwrap();
        state.variants.push(variant.clone());
        Ok(variant.id)
    }

    async fn upsert_m2m(&self, row: &M2MImportItem) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .m2m
            .entry((row.import_id, row.item_id))
            .and_modify(|existing| existing.latest_revision = row.latest_revision)
            .or_insert_with(|| row.clone());
        Ok(())
    }

    async fn stale_at_revision(&self, _import_id: Uuid, _revision: i32) -> Result<Vec<Uuid>> {
        Ok(Vec::new())
    }

    async fn find_item_by_lexis_source_id(&self, _project_id: Uuid, _lexis_id: &str) -> Result<Option<Uuid>> {
        Ok(None)
    }

    async fn insert_lexis_item(&self, _project_id: Uuid, _lexis_id: &str, _text: Option<&str>) -> Result<Uuid> {
        unimplemented!("not exercised by the academic-item flow")
    }

    async fn insert_lexis_source(&self, _source: &cdb_models::LexisNexisItemSource) -> Result<Uuid> {
        unimplemented!("not exercised by the academic-item flow")
    }
}

fn import_ref() -> ImportRef {
    ImportRef::Named {
        name: "test import".into(),
        item_type: ItemKind::Academic,
        config: serde_json::json!({}),
    }
}

fn record(title: &str, doi: Option<&str>) -> RawAcademicRecord {
    RawAcademicRecord {
        text: Some(format!("{title} abstract body text long enough to vectorize")),
        title: Some(title.to_string()),
        doi: doi.map(str::to_string),
        ..Default::default()
    }
}

/// Seed scenario 1 (spec.md §7): two records sharing a DOI but different
/// titles collapse to one `AcademicItem` with one variant row.
#[tokio::test]
async fn dedup_by_doi_creates_one_item_and_one_variant() {
    let store = MockStore::new();
    let project_id = Uuid::new_v4();
    let records = vec![
        record("Original Title One", Some("10.1/x")),
        record("A Rather Different Title", Some("10.1/x")),
    ];

    let outcome = import_academic_items(
        &store,
        &store,
        &store,
        project_id,
        import_ref(),
        records,
        ImportOptions::default(),
    )
    .await
    .expect("import succeeds");

    assert_eq!(outcome.revision_number, Some(1));
    assert_eq!(store.academic_item_count(), 1, "the two DOI-sharing records collapse to one item");
    assert_eq!(store.variant_count(), 1, "the second observation is preserved as a variant");
    assert_eq!(store.m2m_count(), 1, "both records fold into a single import-item membership row");
    assert!(!store.mutex_held(), "mutex released on the happy path");
}

/// Seed scenario 6: a candidate count within `min_update_size` of the
/// prior revision's retrieved count gates the run — no new revision row,
/// `revision_number: None`, mutex still released.
#[tokio::test]
async fn revision_gate_fires_when_candidate_count_is_within_min_update_size() {
    let store = MockStore::new();
    let project_id = Uuid::new_v4();

    let first = import_academic_items(
        &store,
        &store,
        &store,
        project_id,
        import_ref(),
        (0..50).map(|i| record(&format!("Title {i}"), None)),
        ImportOptions { min_update_size: 10, ..Default::default() },
    )
    .await
    .expect("first import succeeds");
    assert_eq!(first.revision_number, Some(1));
    assert_eq!(store.revision_count(), 1);

    let second = import_academic_items(
        &store,
        &store,
        &store,
        project_id,
        ImportRef::Existing(first.import_id),
        std::iter::empty(),
        ImportOptions { n_new: Some(55), min_update_size: 10, ..Default::default() },
    )
    .await
    .expect("gated import still returns Ok");

    assert_eq!(second.import_id, first.import_id);
    assert_eq!(second.revision_number, None, "the gate fired: no new revision was created");
    assert_eq!(store.revision_count(), 1, "still only the first revision exists");
    assert!(!store.mutex_held(), "mutex released on the gated path");
}

/// Testable property 7 (spec.md §8): the mutex is released even when the
/// run fails mid-pass on a fatal (non-per-candidate-recoverable) error.
#[tokio::test]
async fn mutex_is_released_when_a_fatal_error_aborts_the_run() {
    struct PoisonedAfterFirstLookup {
        inner: MockStore,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ProjectLock for PoisonedAfterFirstLookup {
        async fn try_acquire(&self, project_id: Uuid) -> Result<()> {
            self.inner.try_acquire(project_id).await
        }
        async fn release(&self, project_id: Uuid) -> Result<()> {
            self.inner.release(project_id).await
        }
    }

    #[async_trait]
    impl ImportStore for PoisonedAfterFirstLookup {
        async fn get_or_create_import(&self, project_id: Uuid, import_ref: &ImportRef) -> Result<Import> {
            self.inner.get_or_create_import(project_id, import_ref).await
        }
        async fn latest_revision(&self, import_id: Uuid) -> Result<Option<ImportRevision>> {
            self.inner.latest_revision(import_id).await
        }
        async fn create_revision(&self, import_id: Uuid, revision_number: i32) -> Result<ImportRevision> {
            self.inner.create_revision(import_id, revision_number).await
        }
        async fn update_revision_stats(&self, revision_id: Uuid, retrieved: i32, new: i32, updated: i32, removed: i32) -> Result<()> {
            self.inner.update_revision_stats(revision_id, retrieved, new, updated, removed).await
        }
        async fn mark_started(&self, import_id: Uuid) -> Result<()> {
            self.inner.mark_started(import_id).await
        }
        async fn mark_finished(&self, import_id: Uuid) -> Result<()> {
            self.inner.mark_finished(import_id).await
        }
    }

    #[async_trait]
    impl ItemStore for PoisonedAfterFirstLookup {
        async fn find_by_trusted_id(&self, project_id: Uuid, provider: &str, value: &str) -> Result<Option<Uuid>> {
            self.inner.find_by_trusted_id(project_id, provider, value).await
        }
        async fn find_by_title_slug(&self, project_id: Uuid, slug: &str) -> Result<Option<Uuid>> {
            self.inner.find_by_title_slug(project_id, slug).await
        }
        async fn trusted_id_map(&self, project_id: Uuid) -> Result<HashMap<(String, String), Uuid>> {
            self.inner.trusted_id_map(project_id).await
        }
        async fn existing_item_texts(&self, project_id: Uuid) -> Result<Vec<ItemEntry>> {
            self.inner.existing_item_texts(project_id).await
        }
        async fn get_academic_item(&self, item_id: Uuid) -> Result<Option<AcademicItem>> {
            self.inner.get_academic_item(item_id).await
        }
        async fn insert_academic_item(&self, project_id: Uuid, item: &AcademicItem, text: Option<&str>) -> Result<Uuid> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls > 1 {
                return Err(Error::NotFound("simulated fatal failure mid-pass".into()));
            }
            drop(calls);
            self.inner.insert_academic_item(project_id, item, text).await
        }
        async fn insert_academic_variant(&self, variant: &AcademicItemVariant) -> Result<Uuid> {
            self.inner.insert_academic_variant(variant).await
        }
        async fn upsert_m2m(&self, row: &M2MImportItem) -> Result<()> {
            self.inner.upsert_m2m(row).await
        }
        async fn stale_at_revision(&self, import_id: Uuid, revision: i32) -> Result<Vec<Uuid>> {
            self.inner.stale_at_revision(import_id, revision).await
        }
        async fn find_item_by_lexis_source_id(&self, project_id: Uuid, lexis_id: &str) -> Result<Option<Uuid>> {
            self.inner.find_item_by_lexis_source_id(project_id, lexis_id).await
        }
        async fn insert_lexis_item(&self, project_id: Uuid, lexis_id: &str, text: Option<&str>) -> Result<Uuid> {
            self.inner.insert_lexis_item(project_id, lexis_id, text).await
        }
        async fn insert_lexis_source(&self, source: &cdb_models::LexisNexisItemSource) -> Result<Uuid> {
            self.inner.insert_lexis_source(source).await
        }
    }

    let store = PoisonedAfterFirstLookup { inner: MockStore::new(), calls: Mutex::new(0) };
    let project_id = Uuid::new_v4();

    // `Error::NotFound` is not in the narrow per-candidate-recoverable set
    // (only `UniqueViolation`/`Connection`/certain sqlx variants are), so it
    // must propagate out of the scan loop and trigger the abort path.
    let records = vec![record("First Title", None), record("Second Title", None)];

    let result = import_academic_items(
        &store,
        &store,
        &store,
        project_id,
        import_ref(),
        records,
        ImportOptions::default(),
    )
    .await;

    assert!(result.is_err(), "the second insert's fatal error must propagate");
    assert!(!store.inner.mutex_held(), "mutex released on the abort path despite the mid-pass failure");
}
