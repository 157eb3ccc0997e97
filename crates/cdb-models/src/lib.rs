//! Domain model and error taxonomy shared by every component of the
//! corpusdb core (duplicate index, import orchestrator, NQL compiler,
//! annotation resolution engine).

pub mod annotation;
pub mod assignment;
pub mod error;
pub mod import;
pub mod item;
pub mod scheme;

pub use annotation::{
    Annotation, AnnotationValue, BotAnnotation, BotAnnotationMetadata, BotKind,
    ResolutionSnapshot, SnapshotEntry, SnapshotResolution,
};
pub use assignment::{Assignment, AssignmentScope, AssignmentStatus};
pub use error::{Error, Result};
pub use import::{Import, ImportRevision, M2MImportItem, M2MType, Project};
pub use item::{
    AcademicItem, AcademicItemVariant, Author, GenericItem, Item, ItemKind, LexisNexisItem,
    LexisNexisItemSource, TrustedIds, TwitterItem,
};
pub use scheme::{AnnotationScheme, Choice, Label, LabelKind};
