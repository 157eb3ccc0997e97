//! Import orchestrator (C2): owns the per-project mutex, revision
//! lifecycle, and the two-pass duplicate-matching scan over a streamed
//! population of candidates. Built on the duplicate index (`cdb-dedup`)
//! and the storage traits (`cdb-store`); never talks to a connection pool
//! directly.

mod academic;
mod buffer;
mod lexis;
mod lifecycle;
mod options;
mod record;

pub use academic::import_academic_items;
pub use lexis::import_lexis_items;
pub use options::{ImportOptions, ImportOutcome, RevisionStats};
pub use record::{RawAcademicRecord, RawLexisRecord};
