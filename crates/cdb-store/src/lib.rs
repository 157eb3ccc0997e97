//! Storage boundary consumed by the import orchestrator (C2) and the
//! annotation resolution engine (C4). The relational engine itself is out
//! of scope; this crate owns the trait definitions plus one Postgres
//! implementation of them.

pub mod pg;
pub mod traits;

pub use pg::{PgAnnotationStore, PgImportStore, PgItemStore, PgProjectLock, PgStore};
pub use traits::{
    AnnotationStore, ImportRef, ImportStore, ItemEntry, ItemStore, OrderingEntry,
    PathedAnnotation, ProjectLock,
};
