use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One node of a query tree. Boolean combinators nest arbitrarily; leaves
/// carry one predicate each.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Filter {
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Field(FieldFilter),
    Fields(FieldFilters),
    Meta(MetaFilter),
    Abstract(AbstractFilter),
    Import(ImportFilter),
    Assignment(AssignmentFilter),
    Annotation(AnnotationFilter),
    Label(LabelFilter),
}

pub fn and_(filters: Vec<Filter>) -> Filter {
    Filter::And(filters)
}

pub fn or_(filters: Vec<Filter>) -> Filter {
    Filter::Or(filters)
}

pub fn not_(filter: Filter) -> Filter {
    Filter::Not(Box::new(filter))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    Similar,
}

/// A scalar literal compared against one column. `title`/`abstract` force
/// `ILIKE '%v%'` regardless of the requested comparator (SPEC_FULL.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub comp: Comparator,
    pub value: Scalar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldFilters {
    pub field: String,
    pub values: Vec<Scalar>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFilter {
    pub field: String,
    pub value: MetaValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractTarget {
    Size(i64),
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbstractFilter {
    pub comp: Comparator,
    pub target: AbstractTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFilter {
    pub included: Vec<Uuid>,
    pub excluded: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMode {
    Any,
    InScopes,
    AssignedNotInScopes,
    NotAssignedAtAll,
    NotAssignedInScopes,
    UnderScheme,
    NotUnderScheme,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentFilter {
    pub mode: AssignmentMode,
    pub scope_ids: Option<Vec<Uuid>>,
    pub scheme_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationFilter {
    pub scheme_id: Option<Uuid>,
    pub scope_ids: Option<Vec<Uuid>>,
    pub include: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationSource {
    User,
    Bot,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMode {
    Any,
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSelector {
    pub mode: UserMode,
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiSetComparator {
    Eq,
    Superset,
    NotSuperset,
    Intersects,
}

/// Collapses `LabelFilter{Bool,Int,Multi}` into one struct with a tagged
/// value, the same move made for `AnnotationValue` on the storage side:
/// the label kind and its comparison operator travel together instead of
/// three near-identical structs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelValue {
    Bool(bool),
    Int { comp: Comparator, value: i64 },
    Multi { comp: MultiSetComparator, values: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelFilter {
    pub source: AnnotationSource,
    pub key: String,
    pub value: LabelValue,
    pub users: Option<UserSelector>,
    pub scope_ids: Option<Vec<Uuid>>,
    pub scheme_id: Option<Uuid>,
    pub repeats: Option<Vec<u32>>,
}
