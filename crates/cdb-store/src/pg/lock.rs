use async_trait::async_trait;
use cdb_models::{Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::traits::ProjectLock;

/// Persisted project mutex (a boolean column on `projects`), supplemented
/// in-process by a per-project lock set to catch same-process nested
/// acquisition before a round trip to the database (SPEC_FULL.md §9).
pub struct PgProjectLock {
    pool: PgPool,
    in_process: std::sync::Mutex<std::collections::HashSet<Uuid>>,
}

impl PgProjectLock {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            in_process: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }
}

#[async_trait]
impl ProjectLock for PgProjectLock {
    async fn try_acquire(&self, project_id: Uuid) -> Result<()> {
        if !self.in_process.lock().unwrap().insert(project_id) {
            return Err(Error::MutexHeld(project_id));
        }

        let result = sqlx::query(
            "update projects set import_mutex = true where id = $1 and import_mutex = false",
        )
        .bind(project_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) if res.rows_affected() == 1 => Ok(()),
            Ok(_) => {
                self.in_process.lock().unwrap().remove(&project_id);
                Err(Error::MutexHeld(project_id))
            }
            Err(err) => {
                self.in_process.lock().unwrap().remove(&project_id);
                Err(err.into())
            }
        }
    }

    async fn release(&self, project_id: Uuid) -> Result<()> {
        self.in_process.lock().unwrap().remove(&project_id);
        sqlx::query("update projects set import_mutex = false where id = $1")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
