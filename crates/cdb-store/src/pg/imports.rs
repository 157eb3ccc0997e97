use async_trait::async_trait;
use cdb_models::{Error, Import, ImportRevision, Result};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::traits::{ImportRef, ImportStore};

pub struct PgImportStore {
    pool: PgPool,
}

impl PgImportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_import(row: &sqlx::postgres::PgRow) -> sqlx::Result<Import> {
    Ok(Import {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        name: row.try_get("name")?,
        item_type: row.try_get("item_type")?,
        config: row.try_get("config")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

fn row_to_revision(row: &sqlx::postgres::PgRow) -> sqlx::Result<ImportRevision> {
    Ok(ImportRevision {
        id: row.try_get("id")?,
        import_id: row.try_get("import_id")?,
        revision_number: row.try_get("revision_number")?,
        num_items_retrieved: row.try_get("num_items_retrieved")?,
        num_items_new: row.try_get("num_items_new")?,
        num_items_updated: row.try_get("num_items_updated")?,
        num_items_removed: row.try_get("num_items_removed")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ImportStore for PgImportStore {
    async fn get_or_create_import(&self, project_id: Uuid, import_ref: &ImportRef) -> Result<Import> {
        match import_ref {
            ImportRef::Existing(id) => {
                let row = sqlx::query("select * from imports where id = $1 and project_id = $2")
                    .bind(id)
                    .bind(project_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("import {id}")))?;
                Ok(row_to_import(&row)?)
            }
            ImportRef::Named { name, item_type, config } => {
                if let Some(row) = sqlx::query("select * from imports where project_id = $1 and name = $2")
                    .bind(project_id)
                    .bind(name)
                    .fetch_optional(&self.pool)
                    .await?
                {
                    return Ok(row_to_import(&row)?);
                }

                let id = Uuid::new_v4();
                let row = sqlx::query(
                    r#"
                    insert into imports (id, project_id, name, item_type, config)
                    values ($1, $2, $3, $4, $5)
                    returning *
                    "#,
                )
                .bind(id)
                .bind(project_id)
                .bind(name)
                .bind(*item_type)
                .bind(config)
                .fetch_one(&self.pool)
                .await?;
                Ok(row_to_import(&row)?)
            }
        }
    }

    async fn latest_revision(&self, import_id: Uuid) -> Result<Option<ImportRevision>> {
        let row = sqlx::query(
            "select * from import_revisions where import_id = $1 order by revision_number desc limit 1",
        )
        .bind(import_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(row_to_revision).transpose()?)
    }

    async fn create_revision(&self, import_id: Uuid, revision_number: i32) -> Result<ImportRevision> {
        let row = sqlx::query(
            r#"
            insert into import_revisions (id, import_id, revision_number)
            values ($1, $2, $3)
            returning *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(import_id)
        .bind(revision_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_revision(&row)?)
    }

    async fn update_revision_stats(
        &self,
        revision_id: Uuid,
        retrieved: i32,
        new: i32,
        updated: i32,
        removed: i32,
    ) -> Result<()> {
        sqlx::query(
            r#"
            update import_revisions set
                num_items_retrieved = $2,
                num_items_new = $3,
                num_items_updated = $4,
                num_items_removed = $5
            where id = $1
            "#,
        )
        .bind(revision_id)
        .bind(retrieved)
        .bind(new)
        .bind(updated)
        .bind(removed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_started(&self, import_id: Uuid) -> Result<()> {
        sqlx::query("update imports set started_at = now() where id = $1 and started_at is null")
            .bind(import_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_finished(&self, import_id: Uuid) -> Result<()> {
        sqlx::query("update imports set finished_at = now() where id = $1")
            .bind(import_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
