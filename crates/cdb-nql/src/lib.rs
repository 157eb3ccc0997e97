//! Compiler from the tree-shaped query language (SPEC_FULL.md §4.3) down to
//! a `sqlx::QueryBuilder` plan. The grammar itself lives as a serde-tagged
//! AST rather than a hand-rolled parser: callers build or deserialize a
//! [`Filter`] tree (the CLI reads one from a JSON file) and hand it to
//! [`compile`].

pub mod ast;
pub mod compile;
pub mod fields;

pub use ast::{
    AbstractFilter, AbstractTarget, AnnotationFilter, AnnotationSource, AssignmentFilter,
    AssignmentMode, Comparator, FieldFilter, FieldFilters, Filter, LabelFilter, LabelValue,
    MetaFilter, MetaValue, MultiSetComparator, Scalar, UserMode, UserSelector, and_, not_, or_,
};
pub use compile::{compile, CompiledQuery};
