use async_trait::async_trait;
use cdb_models::{
    AnnotationScheme, AnnotationValue, Assignment, BotAnnotation, BotAnnotationMetadata, Error,
    Result,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::pg::value::ValueColumns;
use crate::traits::{AnnotationStore, OrderingEntry, PathedAnnotation};

pub struct PgAnnotationStore {
    pool: PgPool,
}

impl PgAnnotationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_assignment(row: &sqlx::postgres::PgRow) -> sqlx::Result<Assignment> {
    Ok(Assignment {
        id: row.try_get("id")?,
        scope_id: row.try_get("scope_id")?,
        user_id: row.try_get("user_id")?,
        item_id: row.try_get("item_id")?,
        scheme_id: row.try_get("scheme_id")?,
        status: row.try_get("status")?,
        order_key: row.try_get("order_key")?,
    })
}

fn row_to_metadata(row: &sqlx::postgres::PgRow) -> sqlx::Result<BotAnnotationMetadata> {
    Ok(BotAnnotationMetadata {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        scheme_id: row.try_get("scheme_id")?,
        kind: row.try_get("kind")?,
        name: row.try_get("name")?,
        meta: row.try_get("meta")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl AnnotationStore for PgAnnotationStore {
    async fn get_scheme(&self, scheme_id: Uuid) -> Result<AnnotationScheme> {
        let row = sqlx::query("select * from annotation_schemes where id = $1")
            .bind(scheme_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("annotation scheme {scheme_id}")))?;
        let labels_json: serde_json::Value = row.try_get("labels")?;
        let scheme = AnnotationScheme {
            id: row.try_get("id")?,
            project_id: row.try_get("project_id")?,
            name: row.try_get("name")?,
            labels: serde_json::from_value(labels_json)?,
        };
        scheme.validate()?;
        Ok(scheme)
    }

    async fn ordering(&self, scope_ids: &[Uuid]) -> Result<Vec<OrderingEntry>> {
        let rows = sqlx::query(
            r#"
            select * from assignments
            where scope_id = any($1)
            order by item_id, order_key
            "#,
        )
        .bind(scope_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_item: Vec<(Uuid, i32, Vec<Assignment>)> = Vec::new();
        for row in &rows {
            let assignment = row_to_assignment(row)?;
            match by_item.iter_mut().find(|(id, _, _)| *id == assignment.item_id) {
                Some((_, min_key, assignments)) => {
                    *min_key = (*min_key).min(assignment.order_key);
                    assignments.push(assignment);
                }
                None => by_item.push((assignment.item_id, assignment.order_key, vec![assignment])),
            }
        }
        by_item.sort_by_key(|(_, min_key, _)| *min_key);

        Ok(by_item
            .into_iter()
            .map(|(item_id, min_key, assignments)| OrderingEntry {
                key: format!("{min_key:020}"),
                item_id,
                assignments,
            })
            .collect())
    }

    async fn fetch_annotations(
        &self,
        scope_ids: &[Uuid],
        scheme_id: Uuid,
    ) -> Result<Vec<PathedAnnotation>> {
        // Recursive walk from each root annotation (parent is null) down to
        // its leaves, accumulating the label-key path as it descends.
        let rows = sqlx::query(
            r#"
            with recursive walked as (
                select
                    a.id, a.assignment_id, a.key, a.repeat, a.parent,
                    a.value_bool, a.value_int, a.value_float, a.value_str, a.multi_int,
                    array[a.key] as path
                from annotations a
                join assignments asg on asg.id = a.assignment_id
                where asg.scope_id = any($1) and asg.scheme_id = $2 and a.parent is null

                union all

                select
                    c.id, c.assignment_id, c.key, c.repeat, c.parent,
                    c.value_bool, c.value_int, c.value_float, c.value_str, c.multi_int,
                    w.path || c.key
                from annotations c
                join walked w on w.id = c.parent
            )
            select w.*, asg.item_id, asg.user_id
            from walked w
            join assignments asg on asg.id = w.assignment_id
            "#,
        )
        .bind(scope_ids)
        .bind(scheme_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let cols = ValueColumns {
                value_bool: row.try_get("value_bool")?,
                value_int: row.try_get("value_int")?,
                value_float: row.try_get("value_float")?,
                value_str: row.try_get("value_str")?,
                multi_int: row.try_get("multi_int")?,
            };
            let value: AnnotationValue = cols.try_into()?;
            let repeat: i32 = row.try_get("repeat")?;
            out.push(PathedAnnotation {
                item_id: row.try_get("item_id")?,
                user_id: row.try_get("user_id")?,
                path: row.try_get("path")?,
                repeat: repeat as u32,
                value,
            });
        }
        Ok(out)
    }

    async fn get_bot_metadata(&self, id: Uuid) -> Result<BotAnnotationMetadata> {
        let row = sqlx::query("select * from bot_annotation_metadata where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("bot annotation metadata {id}")))?;
        Ok(row_to_metadata(&row)?)
    }

    async fn fetch_resolutions(&self, metadata_id: Uuid) -> Result<Vec<BotAnnotation>> {
        let rows = sqlx::query("select * from bot_annotations where bot_annotation_metadata_id = $1")
            .bind(metadata_id)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let cols = ValueColumns {
                value_bool: row.try_get("value_bool")?,
                value_int: row.try_get("value_int")?,
                value_float: row.try_get("value_float")?,
                value_str: row.try_get("value_str")?,
                multi_int: row.try_get("multi_int")?,
            };
            let repeat: i32 = row.try_get("repeat")?;
            out.push(BotAnnotation {
                id: row.try_get("id")?,
                bot_annotation_metadata_id: row.try_get("bot_annotation_metadata_id")?,
                item_id: row.try_get("item_id")?,
                key: row.try_get("key")?,
                repeat: repeat as u32,
                parent: row.try_get("parent")?,
                value: cols.try_into()?,
            });
        }
        Ok(out)
    }

    async fn commit_resolution(
        &self,
        metadata: &BotAnnotationMetadata,
        resolutions: &[BotAnnotation],
    ) -> Result<Uuid> {
        let mut txn = self.pool.begin().await?;
        let metadata_id = if metadata.id.is_nil() { Uuid::new_v4() } else { metadata.id };

        sqlx::query(
            r#"
            insert into bot_annotation_metadata (id, project_id, scheme_id, kind, name, meta)
            values ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(metadata_id)
        .bind(metadata.project_id)
        .bind(metadata.scheme_id)
        .bind(metadata.kind)
        .bind(&metadata.name)
        .bind(&metadata.meta)
        .execute(&mut *txn)
        .await?;

        insert_resolutions_ordered(&mut txn, metadata_id, resolutions).await?;

        txn.commit().await?;
        Ok(metadata_id)
    }

    async fn update_resolution(
        &self,
        metadata: &BotAnnotationMetadata,
        resolutions: &[BotAnnotation],
    ) -> Result<()> {
        let mut txn = self.pool.begin().await?;

        sqlx::query("update bot_annotation_metadata set meta = $2 where id = $1")
            .bind(metadata.id)
            .bind(&metadata.meta)
            .execute(&mut *txn)
            .await?;

        sqlx::query("delete from bot_annotations where bot_annotation_metadata_id = $1")
            .bind(metadata.id)
            .execute(&mut *txn)
            .await?;

        insert_resolutions_ordered(&mut txn, metadata.id, resolutions).await?;

        txn.commit().await?;
        Ok(())
    }
}

/// Inserts `resolutions` parents-first so that every `parent` foreign key is
/// already present by the time a child row references it.
async fn insert_resolutions_ordered(
    txn: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    metadata_id: Uuid,
    resolutions: &[BotAnnotation],
) -> Result<()> {
    let mut remaining: Vec<&BotAnnotation> = resolutions.iter().collect();
    let mut inserted: std::collections::HashSet<Uuid> = std::collections::HashSet::new();

    while !remaining.is_empty() {
        let mut progressed = false;
        remaining.retain(|ann| {
            let ready = ann.parent.map_or(true, |p| inserted.contains(&p));
            if !ready {
                return true;
            }
            progressed = true;
            false
        });
        if !progressed {
            return Err(Error::InvalidResolution(
                "resolution batch has a cycle or dangling parent reference".into(),
            ));
        }

        for ann in resolutions
            .iter()
            .filter(|a| !inserted.contains(&a.id) && a.parent.map_or(true, |p| inserted.contains(&p)))
        {
            let cols = ValueColumns::from(&ann.value);
            sqlx::query(
                r#"
                insert into bot_annotations (
                    id, bot_annotation_metadata_id, item_id, key, repeat, parent,
                    value_bool, value_int, value_float, value_str, multi_int
                ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(ann.id)
            .bind(metadata_id)
            .bind(ann.item_id)
            .bind(&ann.key)
            .bind(ann.repeat as i32)
            .bind(ann.parent)
            .bind(cols.value_bool)
            .bind(cols.value_int)
            .bind(cols.value_float)
            .bind(&cols.value_str)
            .bind(&cols.multi_int)
            .execute(&mut **txn)
            .await?;
            inserted.insert(ann.id);
        }
    }
    Ok(())
}
