//! Lock-acquire / revision-create / stats-commit / lock-release bracket
//! shared by `import_academic_items` and `import_lexis_items`
//! (SPEC_FULL.md §4.2 state machine, §5 "release on all paths").

use cdb_models::{Import, ImportRevision, Result};
use cdb_store::{ImportRef, ImportStore, ProjectLock};
use uuid::Uuid;

use crate::options::RevisionStats;

pub(crate) enum Setup {
    /// `min_update_size` gate fired: mutex already released, nothing else
    /// to do.
    Gated(Uuid),
    Active(Import, ImportRevision),
}

fn gate_fires(n_new: Option<i32>, prior: Option<&ImportRevision>, min_update_size: i32) -> bool {
    if min_update_size <= 0 {
        return false;
    }
    match (n_new, prior.and_then(|p| p.num_items_retrieved)) {
        (Some(n_new), Some(n_prev)) => (n_new - n_prev).abs() < min_update_size,
        // num_items_retrieved null on the prior revision: gate does not
        // fire (SPEC_FULL.md §9 Open Questions).
        _ => false,
    }
}

/// `LOCK_PROJECT -> GET_OR_CREATE_IMPORT -> DETERMINE_REVISION -> (gate) ->
/// CREATE_REVISION`. Releases the mutex itself on every early-exit path;
/// the caller only needs to release on a later, mid-pass failure.
pub(crate) async fn setup<L, I>(
    lock: &L,
    imports: &I,
    project_id: Uuid,
    import_ref: &ImportRef,
    n_new: Option<i32>,
    min_update_size: i32,
) -> Result<Setup>
where
    L: ProjectLock,
    I: ImportStore,
{
    lock.try_acquire(project_id).await?;

    let import = match imports.get_or_create_import(project_id, import_ref).await {
        Ok(import) => import,
        Err(e) => {
            let _ = lock.release(project_id).await;
            return Err(e);
        }
    };

    let prior = match imports.latest_revision(import.id).await {
        Ok(prior) => prior,
        Err(e) => {
            let _ = lock.release(project_id).await;
            return Err(e);
        }
    };

    if gate_fires(n_new, prior.as_ref(), min_update_size) {
        lock.release(project_id).await?;
        tracing::info!(import_id = %import.id, "revision gated: candidate count within min_update_size of prior revision");
        return Ok(Setup::Gated(import.id));
    }

    let revision_number = prior.map(|r| r.revision_number + 1).unwrap_or(1);

    let revision = match imports.create_revision(import.id, revision_number).await {
        Ok(revision) => revision,
        Err(e) => {
            let _ = lock.release(project_id).await;
            return Err(e);
        }
    };

    if let Err(e) = imports.mark_started(import.id).await {
        let _ = lock.release(project_id).await;
        return Err(e);
    }

    tracing::info!(import_id = %import.id, revision_number, "import revision started");
    Ok(Setup::Active(import, revision))
}

/// Writes final revision stats, marks the import finished, and releases
/// the mutex unconditionally — matching "release on all paths" even when
/// the stats/finish writes themselves fail.
pub(crate) async fn finish<L, I>(
    lock: &L,
    imports: &I,
    project_id: Uuid,
    import_id: Uuid,
    revision_id: Uuid,
    stats: RevisionStats,
) -> Result<()>
where
    L: ProjectLock,
    I: ImportStore,
{
    let stats_result = imports
        .update_revision_stats(revision_id, stats.retrieved, stats.new, stats.updated, stats.removed)
        .await;
    let finished_result = imports.mark_finished(import_id).await;
    lock.release(project_id).await?;
    stats_result?;
    finished_result?;
    tracing::info!(%import_id, ?stats, "import revision finished");
    Ok(())
}

/// Releases the mutex after a fatal mid-pass error without touching the
/// revision row — it stays with whatever partial counts it has, per the
/// cancellation contract (SPEC_FULL.md §5).
pub(crate) async fn abort<L>(lock: &L, project_id: Uuid) -> Result<()>
where
    L: ProjectLock,
{
    lock.release(project_id).await
}
