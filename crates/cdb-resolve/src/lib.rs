//! Annotation resolution engine (C4): builds a per-item-per-label matrix
//! of user annotations, applies a resolution strategy, reconciles it
//! against a prior snapshot, and persists the result as a `RESOLVE`-kind
//! bot annotation metadata.

mod filter;
mod flatten;
mod matrix;
mod persist;
mod strategy;

pub use filter::ResolveFilter;
pub use flatten::FlatLabel;
pub use matrix::{Cell, CellStatus, Matrix, UserEntry};
pub use persist::{build_snapshot, commit, update};
pub use strategy::ResolutionStrategy;

use std::collections::BTreeSet;

use cdb_models::{AnnotationScheme, Result};
use cdb_store::{AnnotationStore, OrderingEntry};
use uuid::Uuid;

/// Everything the UI needs to render a resolution run before it's accepted.
pub struct ResolutionProposal {
    pub scheme: AnnotationScheme,
    pub labels: Vec<FlatLabel>,
    pub annotators: Vec<Uuid>,
    pub ordering: Vec<OrderingEntry>,
    pub matrix: Matrix,
}

/// Tuning knobs for one `resolve` call (spec.md §4.4 contract).
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub ignore_hierarchy: bool,
    pub ignore_repeat: bool,
    pub include_empty: bool,
    pub include_new: bool,
    pub update_existing: bool,
    /// Re-resolution against an existing `RESOLVE`-kind metadata.
    pub prior_metadata_id: Option<Uuid>,
}

/// Runs the full algorithm (SPEC_FULL.md §4.4 steps 1-9) and returns the
/// proposal for the caller to display, and optionally accept via
/// [`commit`]/[`update`].
pub async fn resolve<A: AnnotationStore>(
    store: &A,
    filter: &ResolveFilter,
    strategy: ResolutionStrategy,
    options: &ResolveOptions,
) -> Result<ResolutionProposal> {
    filter.validate()?;

    let scheme = store.get_scheme(filter.scheme_id).await?;
    let labels = flatten::flatten(&scheme, options.ignore_hierarchy, options.ignore_repeat);

    let ordering = store.ordering(&filter.scope_ids).await?;
    let annotations = store.fetch_annotations(&filter.scope_ids, filter.scheme_id).await?;

    let annotators: Vec<Uuid> = annotations
        .iter()
        .map(|a| a.user_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut matrix = matrix::build_empty(&ordering, &labels);
    matrix::populate(&mut matrix, &ordering, &annotations, options.ignore_hierarchy, options.ignore_repeat);

    let mut run_strategy = true;
    if let Some(metadata_id) = options.prior_metadata_id {
        let metadata = store.get_bot_metadata(metadata_id).await?;
        let snapshot = metadata.snapshot()?;
        let prior_resolutions = store.fetch_resolutions(metadata_id).await?;
        let covered = matrix::merge_snapshot(&mut matrix, &snapshot, &prior_resolutions);
        if !options.include_new {
            matrix::drop_uncovered(&mut matrix, &covered);
        }
        run_strategy = options.update_existing;
    }

    if run_strategy {
        matrix::apply_strategy(&mut matrix, strategy);
        matrix::relink_parents(&mut matrix, &labels);
    }

    if !options.include_empty {
        matrix::prune_empty_items(&mut matrix);
    }

    Ok(ResolutionProposal { scheme, labels, annotators, ordering, matrix })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use cdb_models::{AnnotationScheme, AnnotationValue, BotAnnotation, BotAnnotationMetadata, Error, Label, LabelKind};
    use cdb_store::PathedAnnotation;

    use super::*;

    struct FakeStore {
        scheme: AnnotationScheme,
        ordering: Vec<OrderingEntry>,
        annotations: Vec<PathedAnnotation>,
        committed: Mutex<Vec<(BotAnnotationMetadata, Vec<BotAnnotation>)>>,
    }

    #[async_trait]
    impl AnnotationStore for FakeStore {
        async fn get_scheme(&self, _scheme_id: Uuid) -> Result<AnnotationScheme> {
            Ok(self.scheme.clone())
        }
        async fn ordering(&self, _scope_ids: &[Uuid]) -> Result<Vec<OrderingEntry>> {
            Ok(self.ordering.clone())
        }
        async fn fetch_annotations(&self, _scope_ids: &[Uuid], _scheme_id: Uuid) -> Result<Vec<PathedAnnotation>> {
            Ok(self.annotations.clone())
        }
        async fn get_bot_metadata(&self, _id: Uuid) -> Result<BotAnnotationMetadata> {
            Err(Error::NotFound("no prior metadata in this fixture".into()))
        }
        async fn fetch_resolutions(&self, _metadata_id: Uuid) -> Result<Vec<BotAnnotation>> {
            Ok(vec![])
        }
        async fn commit_resolution(&self, metadata: &BotAnnotationMetadata, resolutions: &[BotAnnotation]) -> Result<Uuid> {
            let mut metadata = metadata.clone();
            metadata.id = Uuid::new_v4();
            let id = metadata.id;
            self.committed.lock().unwrap().push((metadata, resolutions.to_vec()));
            Ok(id)
        }
        async fn update_resolution(&self, _metadata: &BotAnnotationMetadata, _resolutions: &[BotAnnotation]) -> Result<()> {
            Ok(())
        }
    }

    fn bool_scheme() -> AnnotationScheme {
        let include = Label { key: "include".into(), kind: LabelKind::Bool, max_repeat: 1, required: true, choices: vec![] };
        AnnotationScheme { id: Uuid::new_v4(), project_id: Uuid::new_v4(), name: "t".into(), labels: vec![include] }
    }

    #[tokio::test]
    async fn resolve_picks_majority_value_across_users() {
        let item_id = Uuid::new_v4();
        let scheme = bool_scheme();
        let ordering = vec![OrderingEntry { key: "00000000000000000001".into(), item_id, assignments: vec![] }];
        let annotations = vec![
            PathedAnnotation { item_id, user_id: Uuid::new_v4(), path: vec!["include".into()], repeat: 1, value: AnnotationValue::Bool(true) },
            PathedAnnotation { item_id, user_id: Uuid::new_v4(), path: vec!["include".into()], repeat: 1, value: AnnotationValue::Bool(true) },
            PathedAnnotation { item_id, user_id: Uuid::new_v4(), path: vec!["include".into()], repeat: 1, value: AnnotationValue::Bool(false) },
        ];
        let store = FakeStore { scheme: scheme.clone(), ordering, annotations, committed: Mutex::new(vec![]) };

        let filter = ResolveFilter { scheme_id: scheme.id, scope_ids: vec![Uuid::new_v4()] };
        let options = ResolveOptions { include_empty: true, ..Default::default() };
        let proposal = resolve(&store, &filter, ResolutionStrategy::Majority, &options).await.unwrap();

        let row = &proposal.matrix["00000000000000000001"];
        let cell = &row[&crate::matrix::cell_key("include", 1)];
        assert_eq!(cell.resolution.value, AnnotationValue::Bool(true));
        assert_eq!(proposal.annotators.len(), 3);
    }

    #[tokio::test]
    async fn empty_scope_is_rejected() {
        let store = FakeStore { scheme: bool_scheme(), ordering: vec![], annotations: vec![], committed: Mutex::new(vec![]) };
        let filter = ResolveFilter { scheme_id: Uuid::new_v4(), scope_ids: vec![] };
        let err = resolve(&store, &filter, ResolutionStrategy::Majority, &ResolveOptions::default()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[tokio::test]
    async fn empty_items_are_pruned_unless_include_empty() {
        let item_id = Uuid::new_v4();
        let scheme = bool_scheme();
        let ordering = vec![OrderingEntry { key: "k1".into(), item_id, assignments: vec![] }];
        let store = FakeStore { scheme: scheme.clone(), ordering, annotations: vec![], committed: Mutex::new(vec![]) };
        let filter = ResolveFilter { scheme_id: scheme.id, scope_ids: vec![Uuid::new_v4()] };

        let proposal = resolve(&store, &filter, ResolutionStrategy::Majority, &ResolveOptions::default()).await.unwrap();
        assert!(proposal.matrix.is_empty());
    }

    #[tokio::test]
    async fn commit_persists_snapshot_and_resolutions() {
        let item_id = Uuid::new_v4();
        let scheme = bool_scheme();
        let ordering = vec![OrderingEntry { key: "k1".into(), item_id, assignments: vec![] }];
        let annotations = vec![PathedAnnotation {
            item_id,
            user_id: Uuid::new_v4(),
            path: vec!["include".into()],
            repeat: 1,
            value: AnnotationValue::Bool(true),
        }];
        let store = FakeStore { scheme: scheme.clone(), ordering, annotations, committed: Mutex::new(vec![]) };
        let filter = ResolveFilter { scheme_id: scheme.id, scope_ids: vec![Uuid::new_v4()] };
        let options = ResolveOptions { include_empty: true, ..Default::default() };
        let proposal = resolve(&store, &filter, ResolutionStrategy::Majority, &options).await.unwrap();

        let id = commit(&store, scheme.project_id, scheme.id, "run 1".into(), &proposal.matrix).await.unwrap();
        assert_ne!(id, Uuid::nil());
        assert_eq!(store.committed.lock().unwrap().len(), 1);
    }
}
