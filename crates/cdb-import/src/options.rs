/// Tuning knobs for one `import_academic_items`/`import_lexis_items` run
/// (SPEC_FULL.md §4.2).
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// The caller's expected candidate count, if known up front — feeds the
    /// `min_update_size` gate together with the prior revision's
    /// `num_items_retrieved`.
    pub n_new: Option<i32>,
    /// Abort the revision (no-op) when `|n_new - n_prev| < min_update_size`.
    /// `0` disables the gate unconditionally (every non-negative difference
    /// clears it).
    pub min_update_size: i32,
    /// Forwarded to [`cdb_dedup::DuplicateIndex::init`].
    pub max_slop: f32,
    pub max_features: usize,
    pub batch_size: usize,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            n_new: None,
            min_update_size: 0,
            max_slop: cdb_dedup::DEFAULT_MAX_SLOP,
            max_features: usize::MAX,
            batch_size: 500,
        }
    }
}

/// Outcome of one run: the import that was targeted, and the new revision
/// number, or `None` when the `min_update_size` gate fired (SPEC_FULL.md
/// §4.2 "Revision gating").
#[derive(Debug, Clone, Copy)]
pub struct ImportOutcome {
    pub import_id: uuid::Uuid,
    pub revision_number: Option<i32>,
}

/// Per-revision tallies, accumulated while PASS_A/PASS_B run and written
/// back via `ImportStore::update_revision_stats` on completion.
#[derive(Debug, Clone, Copy, Default)]
pub struct RevisionStats {
    pub retrieved: i32,
    pub new: i32,
    pub updated: i32,
    pub removed: i32,
}
