/// The error taxonomy shared by every component of the core (C1-C4).
///
/// Kinds map 1:1 onto the propagation policy described for the system:
/// most variants are terminal and propagate to the caller unchanged: only
/// [`Error::UniqueViolation`] and [`Error::Connection`] are ever recovered
/// locally, and only at a savepoint boundary inside the import loop.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid NQL filter: {0}")]
    InvalidNql(String),

    #[error("invalid resolution filter: {0}")]
    InvalidFilter(String),

    #[error("invalid resolution snapshot: {0}")]
    InvalidResolution(String),

    #[error("cell has no user annotations: {item_id}/{label_path}")]
    EmptyAnnotations { item_id: uuid::Uuid, label_path: String },

    #[error("resolution strategy not implemented: {0}")]
    Unimplemented(String),

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("transient database error: {0}")]
    Connection(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("insufficient permission: {0}")]
    InsufficientPermission(String),

    #[error("import mutex already held for project {0}")]
    MutexHeld(uuid::Uuid),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for the narrow set of per-candidate errors C2 is allowed to
    /// recover from at a savepoint boundary; everything else aborts the run.
    pub fn is_per_candidate_recoverable(&self) -> bool {
        match self {
            Error::UniqueViolation(_) => true,
            Error::Connection(_) => true,
            Error::Sqlx(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            Error::Sqlx(sqlx::Error::PoolTimedOut) | Error::Sqlx(sqlx::Error::Io(_)) => true,
            _ => false,
        }
    }
}
