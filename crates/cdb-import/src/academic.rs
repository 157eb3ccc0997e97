//! Bibliographic ingestion: PASS_A matches candidates against a loaded
//! trusted-id map, PASS_B runs the duplicate index over whatever PASS_A
//! couldn't place (SPEC_FULL.md §4.2).

use std::collections::HashMap;

use cdb_dedup::{DuplicateIndex, ItemEntry as DedupEntry};
use cdb_models::{AcademicItem, AcademicItemVariant, M2MImportItem, M2MType, Result};
use cdb_store::{ImportRef, ImportStore, ItemStore, ProjectLock};
use chrono::Utc;
use uuid::Uuid;

use crate::buffer::CandidateSpill;
use crate::lifecycle::{self, Setup};
use crate::options::{ImportOptions, ImportOutcome, RevisionStats};
use crate::record::RawAcademicRecord;

/// Runs one academic ingestion revision end to end: acquires the project's
/// import mutex, determines (or gates) the revision, streams `records`
/// through PASS_A/PASS_B, and releases the mutex on every exit path.
pub async fn import_academic_items<L, I, S, R>(
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
    R: IntoIterator<Item = RawAcademicRecord>,
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
    R: IntoIterator<Item = RawAcademicRecord>,
{
    let mut stats = RevisionStats::default();
    let mut synth_to_real: HashMap<Uuid, Uuid> = HashMap::new();
    let mut spill = CandidateSpill::create()?;

    // Starts as a snapshot of what's already stored, then grows as PASS_B
    // inserts fresh items — so two candidates sharing a trusted id within
    // the *same* batch still collapse to one item instead of relying on
    // ANN text similarity to catch them (SPEC_FULL.md §7 "Dedup by DOI").
    let mut trusted_map = items.trusted_id_map(project_id).await?;

    for record in records {
        stats.retrieved += 1;

        match trusted_lookup(&record, &trusted_map) {
            Some(item_id) => {
                if let Err(e) = merge_candidate(items, import_id, revision_number, item_id, &record, &mut stats).await {
                    if e.is_per_candidate_recoverable() {
                        tracing::warn!(error = %e, "recoverable error on trusted-id match, skipping candidate");
                        continue;
                    }
                    return Err(e);
                }
            }
            None => {
                let synth_id = Uuid::new_v4();
                spill.append(synth_id, &record)?;
            }
        }
    }

    let buffered: Vec<(Uuid, RawAcademicRecord)> = spill.read_all()?;

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
        // A trusted-id hit always wins over ANN similarity: re-checked here
        // because PASS_A's snapshot predates any item PASS_B itself inserts.
        let item_id = match trusted_lookup(record, &trusted_map) {
            Some(real_id) => {
                index.register_stored(*synth_id, Some(real_id));
                synth_to_real.insert(*synth_id, real_id);
                Some(real_id)
            }
            None => resolve_candidate(&index, &mut synth_to_real, synth_id, record),
        };

        let outcome = match item_id {
            Some(existing_or_merged) => {
                merge_candidate(items, import_id, revision_number, existing_or_merged, record, &mut stats).await
            }
            None => {
                insert_fresh(
                    items,
                    &mut synth_to_real,
                    &index,
                    &mut trusted_map,
                    *synth_id,
                    project_id,
                    import_id,
                    revision_number,
                    record,
                    &mut stats,
                )
                .await
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

/// DOI is a trusted identifier alongside the per-provider ids
/// (SPEC_FULL.md §3 "Trusted identifier") but lives as its own field
/// rather than inside `TrustedIds`, so it's chained in here.
fn trusted_lookup(record: &RawAcademicRecord, trusted_map: &HashMap<(String, String), Uuid>) -> Option<Uuid> {
    record
        .doi
        .as_deref()
        .map(|doi| ("doi", doi))
        .into_iter()
        .chain(record.trusted_ids.present())
        .find_map(|(provider, value)| trusted_map.get(&(provider.to_string(), value.to_string())).copied())
}

fn record_trusted_ids(trusted_map: &mut HashMap<(String, String), Uuid>, item_id: Uuid, item: &AcademicItem) {
    if let Some(doi) = &item.doi {
        trusted_map.insert(("doi".to_string(), doi.clone()), item_id);
    }
    for (provider, value) in item.trusted_ids.present() {
        trusted_map.insert((provider.to_string(), value.to_string()), item_id);
    }
}

/// Tests one buffered candidate against the fitted index and translates
/// whatever id comes back (an existing item's real id, or an earlier new
/// candidate's synthetic id) into a real item id via `synth_to_real`.
fn resolve_candidate(
    index: &DuplicateIndex,
    synth_to_real: &mut HashMap<Uuid, Uuid>,
    synth_id: &Uuid,
    record: &RawAcademicRecord,
) -> Option<Uuid> {
    let entry = DedupEntry { item_id: *synth_id, text: record.dedup_text() };
    let matched = index.test(&entry)?;
    let real_id = synth_to_real.get(&matched).copied().unwrap_or(matched);
    index.register_stored(*synth_id, Some(matched));
    synth_to_real.insert(*synth_id, real_id);
    Some(real_id)
}

#[allow(clippy::too_many_arguments)]
async fn insert_fresh<S: ItemStore>(
    items: &S,
    synth_to_real: &mut HashMap<Uuid, Uuid>,
    index: &DuplicateIndex,
    trusted_map: &mut HashMap<(String, String), Uuid>,
    synth_id: Uuid,
    project_id: Uuid,
    import_id: Uuid,
    revision_number: i32,
    record: &RawAcademicRecord,
    stats: &mut RevisionStats,
) -> Result<()> {
    // A structured title-slug lookup catches duplicates the ANN pass missed
    // (near-identical titles tokenized away, or text below the index's
    // minimum length floor) before committing to a fresh insert.
    let title_slug = AcademicItem::slug(record.title.as_deref().unwrap_or_default());
    if let Some(real_id) = items.find_by_title_slug(project_id, &title_slug).await? {
        index.register_stored(synth_id, Some(real_id));
        synth_to_real.insert(synth_id, real_id);
        return merge_candidate(items, import_id, revision_number, real_id, record, stats).await;
    }

    let item = record.to_academic_item();
    let real_id = items.insert_academic_item(project_id, &item, record.text.as_deref()).await?;
    index.register_stored(synth_id, None);
    synth_to_real.insert(synth_id, real_id);
    record_trusted_ids(trusted_map, real_id, &item);

    items
        .upsert_m2m(&M2MImportItem {
            import_id,
            item_id: real_id,
            m2m_type: M2MType::Explicit,
            first_revision: revision_number,
            latest_revision: revision_number,
        })
        .await?;
    stats.new += 1;
    Ok(())
}

/// Diffs the candidate's content hash against the already-stored item; a
/// changed hash is preserved as an [`AcademicItemVariant`] rather than
/// overwriting the canonical row. Always bumps the import's membership.
async fn merge_candidate<S: ItemStore>(
    items: &S,
    import_id: Uuid,
    revision_number: i32,
    item_id: Uuid,
    record: &RawAcademicRecord,
    stats: &mut RevisionStats,
) -> Result<()> {
    let candidate = record.to_academic_item();
    let changed = match items.get_academic_item(item_id).await? {
        Some(existing) => existing.content_hash() != candidate.content_hash(),
        None => false,
    };

    if changed {
        let variant = AcademicItemVariant {
            id: Uuid::new_v4(),
            item_id,
            import_id,
            doi: candidate.doi,
            trusted_ids: candidate.trusted_ids,
            title: candidate.title,
            title_slug: candidate.title_slug,
            pub_year: candidate.pub_year,
            journal: candidate.journal,
            keywords: candidate.keywords,
            authors: candidate.authors,
            meta: candidate.meta,
            created_at: Utc::now(),
        };
        items.insert_academic_variant(&variant).await?;
        stats.updated += 1;
    }

    items
        .upsert_m2m(&M2MImportItem {
            import_id,
            item_id,
            m2m_type: M2MType::Explicit,
            first_revision: revision_number,
            latest_revision: revision_number,
        })
        .await?;
    Ok(())
}
