use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Logical grouping of [`Assignment`]s under one [`crate::AnnotationScheme`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentScope {
    pub id: Uuid,
    pub annotation_scheme_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "assignment_status", rename_all = "UPPERCASE")]
pub enum AssignmentStatus {
    Open,
    Partial,
    Full,
    Invalid,
}

/// `(scope, user, item, scheme)` task unit: user should label item under scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub scope_id: Uuid,
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub scheme_id: Uuid,
    pub status: AssignmentStatus,
    /// Monotone within the scope; assignments are ordered ascending by this.
    pub order_key: i32,
}
