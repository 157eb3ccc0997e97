//! Matrix construction, population, prior-snapshot merge, and pruning
//! (SPEC_FULL.md §4.4 steps 4-6, 9).

use std::collections::HashMap;

use cdb_models::{AnnotationValue, BotAnnotation, LabelKind, ResolutionSnapshot};
use cdb_store::{OrderingEntry, PathedAnnotation};
use uuid::Uuid;

use crate::flatten::{path_key, FlatLabel};
use crate::strategy::ResolutionStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStatus {
    New,
    Changed,
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct UserEntry {
    pub user_id: Uuid,
    pub value: AnnotationValue,
    pub status: CellStatus,
}

/// One (item, label, repeat) slot of the matrix: every user's answer plus
/// the single resolved value the strategy writes into `resolution`.
#[derive(Debug, Clone)]
pub struct Cell {
    pub item_id: Uuid,
    pub path_key: String,
    pub repeat: u32,
    pub users: Vec<UserEntry>,
    pub resolution: BotAnnotation,
    pub resolution_status: CellStatus,
}

/// `matrix[item_key][cell_key]`, where `cell_key` folds a label's
/// `path_key` and repeat number together so repeated labels get distinct
/// cells under the same outer row.
pub type Matrix = HashMap<String, HashMap<String, Cell>>;

pub fn cell_key(path_key: &str, repeat: u32) -> String {
    format!("{path_key}#{repeat}")
}

fn placeholder_value(kind: LabelKind) -> AnnotationValue {
    match kind {
        LabelKind::Bool => AnnotationValue::Bool(false),
        LabelKind::Int | LabelKind::Single => AnnotationValue::Int(0),
        LabelKind::Float => AnnotationValue::Float(0.0),
        LabelKind::Str | LabelKind::Intext => AnnotationValue::Str(String::new()),
        LabelKind::Multi => AnnotationValue::MultiInt(Vec::new()),
    }
}

/// Step 4: one cell per (item, label, repeat) with an empty user list and
/// a placeholder `NEW` resolution.
pub fn build_empty(ordering: &[OrderingEntry], labels: &[FlatLabel]) -> Matrix {
    let mut matrix = Matrix::new();
    for entry in ordering {
        let mut row = HashMap::new();
        for label in labels {
            for repeat in 1..=label.max_repeat {
                let key = cell_key(&label.path_key, repeat);
                row.insert(
                    key,
                    Cell {
                        item_id: entry.item_id,
                        path_key: label.path_key.clone(),
                        repeat,
                        users: Vec::new(),
                        resolution: BotAnnotation {
                            id: Uuid::new_v4(),
                            bot_annotation_metadata_id: Uuid::nil(),
                            item_id: entry.item_id,
                            key: label.key.clone(),
                            repeat,
                            parent: None,
                            value: placeholder_value(label.kind),
                        },
                        resolution_status: CellStatus::New,
                    },
                );
            }
        }
        matrix.insert(entry.key.clone(), row);
    }
    matrix
}

/// Step 5: attaches each stored annotation to its cell as a fresh
/// (`NEW`-status) `UserEntry`. Annotations outside the requested ordering
/// scope, or whose path doesn't match any flattened label, are logged and
/// skipped rather than aborting the run (spec.md §4.4 "Failure semantics").
pub fn populate(
    matrix: &mut Matrix,
    ordering: &[OrderingEntry],
    annotations: &[PathedAnnotation],
    ignore_hierarchy: bool,
    ignore_repeat: bool,
) {
    let item_keys: HashMap<Uuid, &str> = ordering.iter().map(|e| (e.item_id, e.key.as_str())).collect();

    for annotation in annotations {
        let Some(&item_key) = item_keys.get(&annotation.item_id) else {
            tracing::warn!(item_id = %annotation.item_id, "annotation outside the requested ordering scope, skipping");
            continue;
        };
        let Some(row) = matrix.get_mut(item_key) else { continue };

        let path = path_key(&annotation.path, ignore_hierarchy);
        let repeat = if ignore_repeat { 1 } else { annotation.repeat };
        let key = cell_key(&path, repeat);

        let Some(cell) = row.get_mut(&key) else {
            tracing::warn!(path_key = %path, item_id = %annotation.item_id, "stored annotation path not found in scheme, skipping");
            continue;
        };
        cell.users.push(UserEntry { user_id: annotation.user_id, value: annotation.value.clone(), status: CellStatus::New });
    }
}

/// Step 6: reconciles the freshly populated matrix against a prior run's
/// snapshot plus its persisted resolutions. Returns the set of
/// `(item_key, cell_key)` pairs the snapshot actually covered, so the
/// caller can prune to `include_new = false` afterwards.
pub fn merge_snapshot(
    matrix: &mut Matrix,
    snapshot: &ResolutionSnapshot,
    prior_resolutions: &[BotAnnotation],
) -> std::collections::HashSet<(String, String)> {
    let prior_by_id: HashMap<Uuid, &BotAnnotation> = prior_resolutions.iter().map(|r| (r.id, r)).collect();
    let mut covered = std::collections::HashSet::new();

    for reference in &snapshot.resolutions {
        covered.insert((reference.order_key.clone(), reference.path_key.clone()));
        let Some(row) = matrix.get_mut(&reference.order_key) else { continue };
        let Some(cell) = row.get_mut(&reference.path_key) else { continue };
        if let Some(prior) = prior_by_id.get(&reference.bot_annotation_id) {
            cell.resolution = (*prior).clone();
            cell.resolution_status = CellStatus::Unchanged;
        }
    }

    for entry in &snapshot.entries {
        covered.insert((entry.order_key.clone(), entry.path_key.clone()));
        let Some(row) = matrix.get_mut(&entry.order_key) else { continue };
        let Some(cell) = row.get_mut(&entry.path_key) else { continue };
        if let Some(current) = cell.users.iter_mut().find(|u| u.user_id == entry.user_id) {
            current.status = if current.value == entry.value { CellStatus::Unchanged } else { CellStatus::Changed };
        }
        // Users present in the snapshot but absent from the current fetch
        // (withdrawn annotations) leave no trace beyond the diff; the next
        // snapshot will simply not mention them again.
    }

    covered
}

/// Step 6's `include_new = false`: drops every (item, cell) not covered by
/// the prior snapshot.
pub fn drop_uncovered(matrix: &mut Matrix, covered: &std::collections::HashSet<(String, String)>) {
    for (item_key, row) in matrix.iter_mut() {
        row.retain(|cell_key, _| covered.contains(&(item_key.clone(), cell_key.clone())));
    }
}

/// Step 9: drops items (rows) with no annotations in any of their cells.
pub fn prune_empty_items(matrix: &mut Matrix) {
    matrix.retain(|_, row| row.values().any(|cell| !cell.users.is_empty()));
}

/// Step 7: runs `strategy` over every cell's user entries. A cell with no
/// user entries has nothing to resolve from (`EmptyAnnotations`, spec.md §7)
/// — it keeps its `NEW`-placeholder resolution rather than aborting the run.
pub fn apply_strategy(matrix: &mut Matrix, strategy: ResolutionStrategy) {
    for row in matrix.values_mut() {
        for cell in row.values_mut() {
            match strategy.resolve_cell(&cell.users) {
                Some(value) => cell.resolution.value = value,
                None => tracing::debug!(
                    item_id = %cell.item_id, path_key = %cell.path_key,
                    "cell has no user entries, leaving placeholder resolution"
                ),
            }
        }
    }
}

/// Step 8: points each resolution's `parent` at the bot_annotation id of
/// its parent label's resolution within the same item and repeat. A no-op
/// under `ignore_hierarchy`, since every label's own path there is a
/// single segment with nothing above it.
pub fn relink_parents(matrix: &mut Matrix, labels: &[FlatLabel]) {
    let parent_of: HashMap<&str, String> = labels
        .iter()
        .filter(|l| l.path.len() > 1)
        .map(|l| (l.path_key.as_str(), l.path[..l.path.len() - 1].join(".")))
        .collect();

    for row in matrix.values_mut() {
        let resolution_ids: HashMap<String, Uuid> = row.iter().map(|(key, cell)| (key.clone(), cell.resolution.id)).collect();
        for cell in row.values_mut() {
            let Some(parent_path) = parent_of.get(cell.path_key.as_str()) else { continue };
            let parent_id = resolution_ids
                .get(&cell_key(parent_path, cell.repeat))
                .or_else(|| resolution_ids.get(&cell_key(parent_path, 1)))
                .copied();
            cell.resolution.parent = parent_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_label() -> FlatLabel {
        FlatLabel {
            path: vec!["include".into()],
            path_key: "include".into(),
            key: "include".into(),
            max_repeat: 1,
            kind: LabelKind::Bool,
            choices: vec![],
        }
    }

    fn ordering_entry(item_id: Uuid) -> OrderingEntry {
        OrderingEntry { key: "00000000000000000001".into(), item_id, assignments: vec![] }
    }

    #[test]
    fn build_empty_creates_one_cell_per_item_label_repeat() {
        let item_id = Uuid::new_v4();
        let ordering = vec![ordering_entry(item_id)];
        let labels = vec![flat_label()];
        let matrix = build_empty(&ordering, &labels);
        assert_eq!(matrix.len(), 1);
        let row = &matrix["00000000000000000001"];
        assert_eq!(row.len(), 1);
        assert_eq!(row[&cell_key("include", 1)].resolution_status, CellStatus::New);
    }

    #[test]
    fn prune_empty_items_drops_rows_with_no_user_entries() {
        let item_id = Uuid::new_v4();
        let ordering = vec![ordering_entry(item_id)];
        let labels = vec![flat_label()];
        let mut matrix = build_empty(&ordering, &labels);
        prune_empty_items(&mut matrix);
        assert!(matrix.is_empty());
    }
}
