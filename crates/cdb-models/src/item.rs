use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Discriminator selecting which extension table an [`Item`] joins to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "item_kind", rename_all = "lowercase")]
pub enum ItemKind {
    Academic,
    Lexis,
    Generic,
    Twitter,
}

/// The polymorphic root of every record in the system. `extension` carries
/// the discriminator-selected payload instead of an inheritance hierarchy,
/// so a match on it is exhaustive at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub project_id: Uuid,
    pub kind: ItemKind,
    /// Abstract (academic), article body/status (lexis/generic), or tweet text.
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub initials: Option<String>,
    pub orcid: Option<String>,
    /// Provider-keyed author identifiers, e.g. `{"scopus": "..."}`.
    pub provider_ids: HashMap<String, String>,
    pub affiliations: Vec<String>,
}

/// External identifiers trusted as definitive evidence of duplication
/// within a project (spec.md §4.2 "Trusted-id set").
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrustedIds {
    pub openalex_id: Option<String>,
    pub s2_id: Option<String>,
    pub scopus_id: Option<String>,
    pub wos_id: Option<String>,
    pub pubmed_id: Option<String>,
    pub dimensions_id: Option<String>,
}

impl TrustedIds {
    /// Iterates the non-null trusted ids as `(provider, value)` pairs, in
    /// the fixed order the spec lists them — order is irrelevant for
    /// matching, but a stable order keeps query plans and logs deterministic.
    pub fn present(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("openalex", self.openalex_id.as_deref()),
            ("s2", self.s2_id.as_deref()),
            ("scopus", self.scopus_id.as_deref()),
            ("wos", self.wos_id.as_deref()),
            ("pubmed", self.pubmed_id.as_deref()),
            ("dimensions", self.dimensions_id.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicItem {
    pub item_id: Uuid,
    pub doi: Option<String>,
    pub trusted_ids: TrustedIds,
    pub title: String,
    pub title_slug: String,
    pub pub_year: Option<i32>,
    pub journal: Option<String>,
    pub keywords: Vec<String>,
    pub authors: Vec<Author>,
    /// Provider-specific extras that don't warrant a dedicated column.
    pub meta: serde_json::Value,
}

impl AcademicItem {
    /// Canonicalizes a title into a cheap equality key: lowercase, then
    /// strip everything outside `[a-z]`. Idempotent by construction since
    /// the output alphabet is a fixed point of the transform
    /// (invariant 6, spec.md §8).
    pub fn slug(title: &str) -> String {
        title
            .chars()
            .flat_map(|c| c.to_lowercase())
            .filter(|c| c.is_ascii_lowercase())
            .collect()
    }
}

/// A historical copy of an [`AcademicItem`] as seen in a specific [`crate::Import`],
/// preserved when deduplication merged it into the canonical record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcademicItemVariant {
    pub id: Uuid,
    pub item_id: Uuid,
    pub import_id: Uuid,
    pub doi: Option<String>,
    pub trusted_ids: TrustedIds,
    pub title: String,
    pub title_slug: String,
    pub pub_year: Option<i32>,
    pub journal: Option<String>,
    pub keywords: Vec<String>,
    pub authors: Vec<Author>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// The subset of [`AcademicItem`] content hashed to decide whether a new
/// observation of an already-known item is worth persisting as a variant.
/// Affiliations and per-provider ids are provenance, not content, and are
/// deliberately excluded (SPEC_FULL.md §4.2).
#[derive(Hash)]
struct VariantContentKey<'a> {
    title: &'a str,
    title_slug: &'a str,
    pub_year: Option<i32>,
    journal: Option<&'a str>,
    doi: Option<&'a str>,
    keywords: &'a [String],
    author_names: Vec<&'a str>,
}

impl AcademicItem {
    pub fn content_hash(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut keywords = self.keywords.clone();
        keywords.sort();
        let key = VariantContentKey {
            title: &self.title,
            title_slug: &self.title_slug,
            pub_year: self.pub_year,
            journal: self.journal.as_deref(),
            doi: self.doi.as_deref(),
            keywords: &keywords,
            author_names: self.authors.iter().map(|a| a.name.as_str()).collect(),
        };
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }
}

/// One logical article, potentially syndicated across multiple outlets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexisNexisItem {
    pub item_id: Uuid,
    pub lexis_id: String,
}

/// A single outlet's syndication of a [`LexisNexisItem`]. Unique on
/// `(lexis_id, item_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexisNexisItemSource {
    pub id: Uuid,
    pub item_id: Uuid,
    pub lexis_id: String,
    pub title: Option<String>,
    pub outlet: String,
    pub section: Option<String>,
    pub publish_date: Option<NaiveDate>,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericItem {
    pub item_id: Uuid,
}

/// Placeholder extension row. Twitter ingestion is out of this core's scope
/// (SPEC_FULL.md §3 supplement); the discriminator and an empty row keep
/// the `Item` variant match exhaustive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterItem {
    pub item_id: Uuid,
}
