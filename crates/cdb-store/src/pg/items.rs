use std::collections::HashMap;

use async_trait::async_trait;
use cdb_models::{
    AcademicItem, Author, Error, LexisNexisItemSource, M2MImportItem, Result, TrustedIds,
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::traits::{ItemEntry, ItemStore};

pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a trusted-id provider name to its column on `academic_items`.
/// The provider set is closed (SPEC_FULL.md §4.2 "Trusted-id set") and
/// never derived from external input, so building the column name this
/// way carries no injection risk.
fn trusted_id_column(provider: &str) -> Result<&'static str> {
    match provider {
        "doi" => Ok("doi"),
        "openalex" => Ok("openalex_id"),
        "s2" => Ok("s2_id"),
        "scopus" => Ok("scopus_id"),
        "wos" => Ok("wos_id"),
        "pubmed" => Ok("pubmed_id"),
        "dimensions" => Ok("dimensions_id"),
        other => Err(Error::NotFound(format!("unknown trusted-id provider {other:?}"))),
    }
}

fn row_to_academic_item(row: &sqlx::postgres::PgRow) -> sqlx::Result<AcademicItem> {
    let authors_json: serde_json::Value = row.try_get("authors")?;
    let authors: Vec<Author> = serde_json::from_value(authors_json).unwrap_or_default();
    Ok(AcademicItem {
        item_id: row.try_get("item_id")?,
        doi: row.try_get("doi")?,
        trusted_ids: TrustedIds {
            openalex_id: row.try_get("openalex_id")?,
            s2_id: row.try_get("s2_id")?,
            scopus_id: row.try_get("scopus_id")?,
            wos_id: row.try_get("wos_id")?,
            pubmed_id: row.try_get("pubmed_id")?,
            dimensions_id: row.try_get("dimensions_id")?,
        },
        title: row.try_get("title")?,
        title_slug: row.try_get("title_slug")?,
        pub_year: row.try_get("pub_year")?,
        journal: row.try_get("journal")?,
        keywords: row.try_get("keywords")?,
        authors,
        meta: row.try_get("meta")?,
    })
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn find_by_trusted_id(
        &self,
        project_id: Uuid,
        provider: &str,
        value: &str,
    ) -> Result<Option<Uuid>> {
        let column = trusted_id_column(provider)?;
        let sql = format!(
            "select ai.item_id from academic_items ai \
             join items i on i.id = ai.item_id \
             where i.project_id = $1 and ai.{column} = $2"
        );
        let row = sqlx::query(&sql)
            .bind(project_id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("item_id")))
    }

    async fn find_by_title_slug(&self, project_id: Uuid, slug: &str) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            "select ai.item_id from academic_items ai \
             join items i on i.id = ai.item_id \
             where i.project_id = $1 and ai.title_slug = $2",
        )
        .bind(project_id)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("item_id")))
    }

    async fn trusted_id_map(&self, project_id: Uuid) -> Result<HashMap<(String, String), Uuid>> {
        let rows = sqlx::query(
            "select ai.item_id, ai.doi, ai.openalex_id, ai.s2_id, ai.scopus_id, ai.wos_id, ai.pubmed_id, ai.dimensions_id \
             from academic_items ai join items i on i.id = ai.item_id where i.project_id = $1",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let mut map = HashMap::new();
        for row in rows {
            let item_id: Uuid = row.try_get("item_id")?;
            let doi: Option<String> = row.try_get("doi")?;
            let ids = TrustedIds {
                openalex_id: row.try_get("openalex_id")?,
                s2_id: row.try_get("s2_id")?,
                scopus_id: row.try_get("scopus_id")?,
                wos_id: row.try_get("wos_id")?,
                pubmed_id: row.try_get("pubmed_id")?,
                dimensions_id: row.try_get("dimensions_id")?,
            };
            if let Some(doi) = doi {
                map.insert(("doi".to_string(), doi), item_id);
            }
            for (provider, value) in ids.present() {
                map.insert((provider.to_string(), value.to_string()), item_id);
            }
        }
        Ok(map)
    }

    async fn existing_item_texts(&self, project_id: Uuid) -> Result<Vec<ItemEntry>> {
        let rows = sqlx::query("select id, text from items where project_id = $1 and text is not null")
            .bind(project_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| ItemEntry {
                item_id: r.get("id"),
                text: r.get("text"),
            })
            .collect())
    }

    async fn get_academic_item(&self, item_id: Uuid) -> Result<Option<AcademicItem>> {
        let row = sqlx::query("select * from academic_items where item_id = $1")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_academic_item).transpose()?)
    }

    async fn insert_academic_item(&self, project_id: Uuid, item: &AcademicItem, text: Option<&str>) -> Result<Uuid> {
        let item_id = if item.item_id.is_nil() { Uuid::new_v4() } else { item.item_id };
        sqlx::query("insert into items (id, project_id, kind, text) values ($1, $2, 'academic', $3)")
            .bind(item_id)
            .bind(project_id)
            .bind(text)
            .execute(&self.pool)
            .await?;

        let authors_json = serde_json::to_value(&item.authors)?;
        sqlx::query(
            r#"
            insert into academic_items (
                item_id, project_id, doi, openalex_id, s2_id, scopus_id, wos_id, pubmed_id, dimensions_id,
                title, title_slug, pub_year, journal, keywords, authors, meta
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(item_id)
        .bind(project_id)
        .bind(&item.doi)
        .bind(&item.trusted_ids.openalex_id)
        .bind(&item.trusted_ids.s2_id)
        .bind(&item.trusted_ids.scopus_id)
        .bind(&item.trusted_ids.wos_id)
        .bind(&item.trusted_ids.pubmed_id)
        .bind(&item.trusted_ids.dimensions_id)
        .bind(&item.title)
        .bind(&item.title_slug)
        .bind(item.pub_year)
        .bind(&item.journal)
        .bind(&item.keywords)
        .bind(authors_json)
        .bind(&item.meta)
        .execute(&self.pool)
        .await?;

        Ok(item_id)
    }

    async fn insert_academic_variant(
        &self,
        variant: &cdb_models::AcademicItemVariant,
    ) -> Result<Uuid> {
        let authors_json = serde_json::to_value(&variant.authors)?;
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            insert into academic_item_variants (
                id, item_id, import_id, doi, openalex_id, s2_id, scopus_id, wos_id, pubmed_id,
                dimensions_id, title, title_slug, pub_year, journal, keywords, authors, meta
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(id)
        .bind(variant.item_id)
        .bind(variant.import_id)
        .bind(&variant.doi)
        .bind(&variant.trusted_ids.openalex_id)
        .bind(&variant.trusted_ids.s2_id)
        .bind(&variant.trusted_ids.scopus_id)
        .bind(&variant.trusted_ids.wos_id)
        .bind(&variant.trusted_ids.pubmed_id)
        .bind(&variant.trusted_ids.dimensions_id)
        .bind(&variant.title)
        .bind(&variant.title_slug)
        .bind(variant.pub_year)
        .bind(&variant.journal)
        .bind(&variant.keywords)
        .bind(authors_json)
        .bind(&variant.meta)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn upsert_m2m(&self, row: &M2MImportItem) -> Result<()> {
        sqlx::query(
            r#"
            insert into m2m_import_item (import_id, item_id, m2m_type, first_revision, latest_revision)
            values ($1, $2, $3, $4, $5)
            on conflict (import_id, item_id) do update set
                latest_revision = excluded.latest_revision,
                m2m_type = excluded.m2m_type
            "#,
        )
        .bind(row.import_id)
        .bind(row.item_id)
        .bind(row.m2m_type)
        .bind(row.first_revision)
        .bind(row.latest_revision)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stale_at_revision(&self, import_id: Uuid, revision: i32) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "select item_id from m2m_import_item where import_id = $1 and latest_revision = $2",
        )
        .bind(import_id)
        .bind(revision - 1)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get("item_id")).collect())
    }

    async fn find_item_by_lexis_source_id(
        &self,
        project_id: Uuid,
        lexis_id: &str,
    ) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            "select lnis.item_id from lexis_nexis_item_sources lnis \
             join items i on i.id = lnis.item_id \
             where i.project_id = $1 and lnis.lexis_id = $2",
        )
        .bind(project_id)
        .bind(lexis_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("item_id")))
    }

    async fn insert_lexis_item(&self, project_id: Uuid, lexis_id: &str, text: Option<&str>) -> Result<Uuid> {
        let item_id = Uuid::new_v4();
        sqlx::query("insert into items (id, project_id, kind, text) values ($1, $2, 'lexis', $3)")
            .bind(item_id)
            .bind(project_id)
            .bind(text)
            .execute(&self.pool)
            .await?;
        sqlx::query("insert into lexis_nexis_items (item_id, lexis_id) values ($1, $2)")
            .bind(item_id)
            .bind(lexis_id)
            .execute(&self.pool)
            .await?;
        Ok(item_id)
    }

    async fn insert_lexis_source(&self, source: &LexisNexisItemSource) -> Result<Uuid> {
        let id = if source.id.is_nil() { Uuid::new_v4() } else { source.id };
        sqlx::query(
            r#"
            insert into lexis_nexis_item_sources (id, item_id, lexis_id, title, outlet, section, publish_date, meta)
            values ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(source.item_id)
        .bind(&source.lexis_id)
        .bind(&source.title)
        .bind(&source.outlet)
        .bind(&source.section)
        .bind(source.publish_date)
        .bind(&source.meta)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}
