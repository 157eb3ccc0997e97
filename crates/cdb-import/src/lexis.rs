//! News ingestion: PASS_A matches a source already seen under its own
//! external id, PASS_B runs the duplicate index to catch a new outlet's
//! syndication of an already-known article (SPEC_FULL.md §4.2 "LexisNexis
//! ingestion path" supplement).

use std::collections::HashMap;

use cdb_dedup::{DuplicateIndex, ItemEntry as DedupEntry};
use cdb_models::{LexisNexisItemSource, M2MImportItem, M2MType, Result};
use cdb_store::{ImportRef, ImportStore, ItemStore, ProjectLock};
use uuid::Uuid;

use crate::buffer::CandidateSpill;
use crate::lifecycle::{self, Setup};
use crate::options::{ImportOptions, ImportOutcome, RevisionStats};
use crate::record::RawLexisRecord;

pub async fn import_lexis_items<L, I, S, R>(
    lock: &L,
    imports: &I,
    items: &S,
    project_id: Uuid,
    import_ref: ImportRef,
    records: R,
    options: ImportOptions,
) -> Result<ImportOutcome>
where
    L: ProjectLock,
    I: ImportStore,
    S: ItemStore,
    R: IntoIterator<Item = RawLexisRecord>,
{
    let setup = lifecycle::setup(lock, imports, project_id, &import_ref, options.n_new, options.min_update_size).await?;
    let (import, revision) = match setup {
        Setup::Gated(import_id) => return Ok(ImportOutcome { import_id, revision_number: None }),
        Setup::Active(import, revision) => (import, revision),
    };

    match run_passes(items, project_id, import.id, revision.revision_number, records, &options).await {
        Ok(stats) => {
            lifecycle::finish(lock, imports, project_id, import.id, revision.id, stats).await?;
            Ok(ImportOutcome { import_id: import.id, revision_number: Some(revision.revision_number) })
        }
        Err(e) => {
            lifecycle::abort(lock, project_id).await?;
            Err(e)
        }
    }
}

async fn run_passes<S, R>(
    items: &S,
    project_id: Uuid,
    import_id: Uuid,
    revision_number: i32,
    records: R,
    options: &ImportOptions,
) -> Result<RevisionStats>
where
    S: ItemStore,
    R: IntoIterator<Item = RawLexisRecord>,
{
    let mut stats = RevisionStats::default();
    let mut synth_to_real: HashMap<Uuid, Uuid> = HashMap::new();
    let mut spill = CandidateSpill::create()?;

    for record in records {
        stats.retrieved += 1;

        match items.find_item_by_lexis_source_id(project_id, &record.lexis_id).await {
            Ok(Some(item_id)) => {
                if let Err(e) = bump_membership(items, import_id, revision_number, item_id).await {
                    if e.is_per_candidate_recoverable() {
                        tracing::warn!(error = %e, "recoverable error re-attaching known source, skipping");
                        continue;
                    }
                    return Err(e);
                }
            }
            Ok(None) => {
                let synth_id = Uuid::new_v4();
                spill.append(synth_id, &record)?;
            }
            Err(e) if e.is_per_candidate_recoverable() => {
                tracing::warn!(error = %e, "recoverable error on source-id lookup, buffering for ANN pass");
                let synth_id = Uuid::new_v4();
                spill.append(synth_id, &record)?;
            }
            Err(e) => return Err(e),
        }
    }

    let buffered: Vec<(Uuid, RawLexisRecord)> = spill.read_all()?;

    let existing_texts = items.existing_item_texts(project_id).await?;
    let mut index = DuplicateIndex::new();
    index.init(
        existing_texts.into_iter().map(|e| DedupEntry { item_id: e.item_id, text: e.text }),
        buffered.iter().map(|(synth_id, record)| DedupEntry { item_id: *synth_id, text: record.dedup_text() }),
        None,
        options.max_slop,
        options.max_features,
        options.batch_size,
    );

    for (synth_id, record) in &buffered {
        let entry = DedupEntry { item_id: *synth_id, text: record.dedup_text() };
        let matched = index.test(&entry);

        let outcome = match matched {
            Some(candidate) => {
                let real_id = synth_to_real.get(&candidate).copied().unwrap_or(candidate);
                index.register_stored(*synth_id, Some(candidate));
                synth_to_real.insert(*synth_id, real_id);
                attach_source(items, import_id, revision_number, real_id, record, &mut stats).await
            }
            None => {
                insert_new_article(items, &index, &mut synth_to_real, *synth_id, project_id, import_id, revision_number, record)
                    .await
                    .map(|()| stats.new += 1)
            }
        };

        if let Err(e) = outcome {
            if e.is_per_candidate_recoverable() {
                tracing::warn!(error = %e, "recoverable error persisting candidate, skipping");
                continue;
            }
            return Err(e);
        }
    }

    let stale = items.stale_at_revision(import_id, revision_number).await?;
    stats.removed = stale.len() as i32;

    Ok(stats)
}

#[allow(clippy::too_many_arguments)]
async fn insert_new_article<S: ItemStore>(
    items: &S,
    index: &DuplicateIndex,
    synth_to_real: &mut HashMap<Uuid, Uuid>,
    synth_id: Uuid,
    project_id: Uuid,
    import_id: Uuid,
    revision_number: i32,
    record: &RawLexisRecord,
) -> Result<()> {
    let real_id = items.insert_lexis_item(project_id, &record.lexis_id, record.text.as_deref()).await?;
    index.register_stored(synth_id, None);
    synth_to_real.insert(synth_id, real_id);

    let source = LexisNexisItemSource {
        id: Uuid::new_v4(),
        item_id: real_id,
        lexis_id: record.lexis_id.clone(),
        title: record.title.clone(),
        outlet: record.outlet.clone(),
        section: record.section.clone(),
        publish_date: record.publish_date,
        meta: record.meta.clone(),
    };
    items.insert_lexis_source(&source).await?;
    bump_membership(items, import_id, revision_number, real_id).await
}

/// A new outlet's syndication of an article already known under the
/// project: attach the source row, then fold it into this revision.
async fn attach_source<S: ItemStore>(
    items: &S,
    import_id: Uuid,
    revision_number: i32,
    item_id: Uuid,
    record: &RawLexisRecord,
    stats: &mut RevisionStats,
) -> Result<()> {
    let source = LexisNexisItemSource {
        id: Uuid::new_v4(),
        item_id,
        lexis_id: record.lexis_id.clone(),
        title: record.title.clone(),
        outlet: record.outlet.clone(),
        section: record.section.clone(),
        publish_date: record.publish_date,
        meta: record.meta.clone(),
    };
    items.insert_lexis_source(&source).await?;
    bump_membership(items, import_id, revision_number, item_id).await?;
    stats.updated += 1;
    Ok(())
}

async fn bump_membership<S: ItemStore>(
    items: &S,
    import_id: Uuid,
    revision_number: i32,
    item_id: Uuid,
) -> Result<()> {
    items
        .upsert_m2m(&M2MImportItem {
            import_id,
            item_id,
            m2m_type: M2MType::Explicit,
            first_revision: revision_number,
            latest_revision: revision_number,
        })
        .await
}
