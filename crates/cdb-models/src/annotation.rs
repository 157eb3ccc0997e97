use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The value carried by an [`Annotation`] or [`BotAnnotation`]. Exactly one
/// of `value_bool`/`value_int`/`value_float`/`value_str`/`multi_int` may be
/// non-null per invariant 1 (spec.md §8); modelling it as a tagged enum
/// enforces that by construction instead of a runtime check over five
/// nullable columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    MultiInt(Vec<i64>),
}

impl AnnotationValue {
    /// A total, deterministic ordering used to break majority-vote ties
    /// ("value ascending", spec.md §4.4 step 7). Cross-variant order is
    /// fixed but arbitrary; it only has to be stable.
    pub fn sort_key(&self) -> (u8, String) {
        match self {
            AnnotationValue::Bool(b) => (0, b.to_string()),
            AnnotationValue::Int(i) => (1, format!("{i:020}")),
            AnnotationValue::Float(f) => (2, format!("{f}")),
            AnnotationValue::Str(s) => (3, s.clone()),
            AnnotationValue::MultiInt(v) => {
                let mut v = v.clone();
                v.sort();
                (4, format!("{v:?}"))
            }
        }
    }
}

/// A user's judgment responding to an [`crate::Assignment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub key: String,
    /// >= 1; distinguishes repeated answers for the same key under the same parent.
    pub repeat: u32,
    /// Non-null means this annotation is a child of another, e.g. a
    /// sub-question shown because the parent answer was a particular value.
    pub parent: Option<Uuid>,
    pub value: AnnotationValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bot_annotation_kind", rename_all = "UPPERCASE")]
pub enum BotKind {
    Classification,
    Rules,
    Topics,
    Resolve,
    Script,
}

/// One fingerprinted user entry as captured by a prior resolution run — the
/// unit a re-resolution diffs the current annotation state against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub order_key: String,
    pub path_key: String,
    pub user_id: Uuid,
    pub value: AnnotationValue,
}

/// One persisted resolution reference from a prior run, keyed the same way
/// as [`SnapshotEntry`] so the two lists can be joined by `(order_key, path_key)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResolution {
    pub order_key: String,
    pub path_key: String,
    pub bot_annotation_id: Uuid,
}

/// The diffable artifact that lets C4 compute incremental re-resolutions.
/// Persisted as the `meta` of a `RESOLVE`-kind [`BotAnnotationMetadata`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionSnapshot {
    pub entries: Vec<SnapshotEntry>,
    pub resolutions: Vec<SnapshotResolution>,
}

/// Analogous to [`Annotation`] but produced non-interactively; groups a
/// batch of [`BotAnnotation`]s under one kind and (for `Resolve`) one
/// [`ResolutionSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotAnnotationMetadata {
    pub id: Uuid,
    pub project_id: Uuid,
    pub scheme_id: Uuid,
    pub kind: BotKind,
    pub name: String,
    /// For `kind == Resolve`, holds a [`ResolutionSnapshot`] as JSON.
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl BotAnnotationMetadata {
    pub fn snapshot(&self) -> crate::error::Result<ResolutionSnapshot> {
        Ok(serde_json::from_value(self.meta.clone())?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotAnnotation {
    pub id: Uuid,
    pub bot_annotation_metadata_id: Uuid,
    pub item_id: Uuid,
    pub key: String,
    pub repeat: u32,
    pub parent: Option<Uuid>,
    pub value: AnnotationValue,
}
