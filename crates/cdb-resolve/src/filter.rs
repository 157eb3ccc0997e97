//! The discriminating predicate a resolution run is scoped to.

use cdb_models::{Error, Result};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ResolveFilter {
    pub scheme_id: Uuid,
    pub scope_ids: Vec<Uuid>,
}

impl ResolveFilter {
    /// Called with no discriminating predicate raises `InvalidFilter`
    /// (spec.md §4.4 "Failure semantics").
    pub fn validate(&self) -> Result<()> {
        if self.scope_ids.is_empty() {
            return Err(Error::InvalidFilter("resolution filter names no assignment scope".into()));
        }
        Ok(())
    }
}
