use cdb_models::ItemKind;

/// Per-discriminator allowed-field tables for [`crate::ast::FieldFilter`] /
/// [`crate::ast::FieldFilters`]. Requesting a field outside this list is an
/// `InvalidNql` error, not a silently-empty result.
pub fn allowed_fields(item_type: ItemKind) -> &'static [&'static str] {
    match item_type {
        ItemKind::Academic => &["title", "abstract", "pub_year", "item_id", "openalex_id", "doi"],
        ItemKind::Lexis => &["title", "abstract", "pub_year", "source", "item_id", "date"],
        ItemKind::Generic => &["abstract", "item_id"],
        ItemKind::Twitter => &["abstract", "item_id"],
    }
}

pub fn is_allowed(item_type: ItemKind, field: &str) -> bool {
    allowed_fields(item_type).contains(&field)
}

/// `title`/`abstract` are always compared with `ILIKE '%v%'`, regardless of
/// the requested comparator (SPEC_FULL.md §4.3).
pub fn forces_ilike(field: &str) -> bool {
    matches!(field, "title" | "abstract")
}
