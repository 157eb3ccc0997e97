//! Postgres implementations of the `cdb-store` traits, built on runtime
//! `sqlx::query`/`query_as` calls rather than the `query!` compile-time
//! macros (those require either a live database or a checked-in
//! `.sqlx` cache at build time, which this workspace has neither of).

mod annotations;
mod imports;
mod items;
mod lock;
mod value;

pub use annotations::PgAnnotationStore;
pub use imports::PgImportStore;
pub use items::PgItemStore;
pub use lock::PgProjectLock;

use sqlx::PgPool;

/// Bundles one `PgPool` into all four store implementations. Convenience
/// constructor for callers (C2, C4, `cdb-cli`) that want every trait object
/// wired to the same connection pool.
pub struct PgStore {
    pub locks: PgProjectLock,
    pub imports: PgImportStore,
    pub items: PgItemStore,
    pub annotations: PgAnnotationStore,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            locks: PgProjectLock::new(pool.clone()),
            imports: PgImportStore::new(pool.clone()),
            items: PgItemStore::new(pool.clone()),
            annotations: PgAnnotationStore::new(pool),
        }
    }
}
