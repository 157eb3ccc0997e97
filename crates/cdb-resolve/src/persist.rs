//! Commit/update paths (spec.md §4.4 "Persistence", "Update path"): turns a
//! resolved matrix into the snapshot + resolution rows `AnnotationStore`
//! expects, and drives the two acceptance flows the UI exposes.

use cdb_models::{BotAnnotation, BotAnnotationMetadata, BotKind, ResolutionSnapshot, Result, SnapshotEntry, SnapshotResolution};
use cdb_store::AnnotationStore;
use uuid::Uuid;

use crate::matrix::Matrix;

/// Freezes every current user entry's fingerprint plus the resolution id
/// it produced, keyed the same way the matrix itself is, so the next
/// resolution run can diff against it.
pub fn build_snapshot(matrix: &Matrix) -> ResolutionSnapshot {
    let mut entries = Vec::new();
    let mut resolutions = Vec::new();

    for (order_key, row) in matrix {
        for (path_key, cell) in row {
            for user in &cell.users {
                entries.push(SnapshotEntry {
                    order_key: order_key.clone(),
                    path_key: path_key.clone(),
                    user_id: user.user_id,
                    value: user.value.clone(),
                });
            }
            resolutions.push(SnapshotResolution {
                order_key: order_key.clone(),
                path_key: path_key.clone(),
                bot_annotation_id: cell.resolution.id,
            });
        }
    }

    ResolutionSnapshot { entries, resolutions }
}

fn collect_resolutions(matrix: &Matrix) -> Vec<BotAnnotation> {
    matrix.values().flat_map(|row| row.values().map(|cell| cell.resolution.clone())).collect()
}

/// Inserts a fresh `RESOLVE`-kind metadata row plus its resolutions.
pub async fn commit<A: AnnotationStore>(
    store: &A,
    project_id: Uuid,
    scheme_id: Uuid,
    name: String,
    matrix: &Matrix,
) -> Result<Uuid> {
    let snapshot = build_snapshot(matrix);
    let metadata = BotAnnotationMetadata {
        id: Uuid::nil(),
        project_id,
        scheme_id,
        kind: BotKind::Resolve,
        name,
        meta: serde_json::to_value(&snapshot)?,
        created_at: chrono::Utc::now(),
    };
    let resolutions = collect_resolutions(matrix);
    store.commit_resolution(&metadata, &resolutions).await
}

/// Updates an existing `RESOLVE`-kind metadata in place: existing rows
/// updated, new ones inserted, cells dropped since the prior run deleted
/// (spec.md §4.4 "Update path").
pub async fn update<A: AnnotationStore>(store: &A, mut metadata: BotAnnotationMetadata, matrix: &Matrix) -> Result<()> {
    let snapshot = build_snapshot(matrix);
    metadata.meta = serde_json::to_value(&snapshot)?;
    let resolutions = collect_resolutions(matrix);
    store.update_resolution(&metadata, &resolutions).await
}
