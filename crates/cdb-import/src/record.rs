//! Candidate record shapes yielded by the caller's reader (SPEC_FULL.md §6
//! "Record reader contract"). These are deliberately thinner than
//! [`cdb_models::AcademicItem`]/[`cdb_models::LexisNexisItemSource`]: a
//! reader only guarantees a non-null `text` or `title`, everything else is
//! optional, and no `item_id` exists yet.

use cdb_models::{AcademicItem, Author, TrustedIds};
use serde::{Deserialize, Serialize};

/// One academic candidate as read off an external source, before C2 has
/// decided whether it's new or a duplicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAcademicRecord {
    pub text: Option<String>,
    pub title: Option<String>,
    pub doi: Option<String>,
    #[serde(default)]
    pub trusted_ids: TrustedIds,
    pub pub_year: Option<i32>,
    pub journal: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl RawAcademicRecord {
    /// The text C1 vectorizes: the abstract when present, falling back to
    /// the title so title-only records still participate in dedup.
    pub fn dedup_text(&self) -> String {
        self.text.clone().or_else(|| self.title.clone()).unwrap_or_default()
    }

    /// Materializes the stored shape. `item_id` is left nil; the store
    /// assigns one on insert.
    pub fn to_academic_item(&self) -> AcademicItem {
        let title = self.title.clone().unwrap_or_default();
        AcademicItem {
            item_id: uuid::Uuid::nil(),
            doi: self.doi.clone(),
            trusted_ids: self.trusted_ids.clone(),
            title_slug: AcademicItem::slug(&title),
            title,
            pub_year: self.pub_year,
            journal: self.journal.clone(),
            keywords: self.keywords.clone(),
            authors: self.authors.clone(),
            meta: self.meta.clone(),
        }
    }
}

/// One LexisNexis candidate: a single outlet's syndication of an article,
/// before C2 has decided whether it joins an existing logical item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLexisRecord {
    pub text: Option<String>,
    pub title: Option<String>,
    /// This source's own external id (distinct from the logical item's,
    /// since syndicated copies each carry their own upstream identifier —
    /// SPEC_FULL.md §3 "LexisNexisItem + LexisNexisItemSource" supplement).
    pub lexis_id: String,
    pub outlet: String,
    pub section: Option<String>,
    pub publish_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

impl RawLexisRecord {
    pub fn dedup_text(&self) -> String {
        self.text.clone().or_else(|| self.title.clone()).unwrap_or_default()
    }
}
