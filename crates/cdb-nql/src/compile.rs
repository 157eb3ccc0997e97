use cdb_models::{Error, ItemKind, Result};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::ast::*;
use crate::fields::{forces_ilike, is_allowed};

/// A compiled, not-yet-executed query plan. Wraps `sqlx::QueryBuilder`
/// instead of a bespoke AST-to-SQL-string printer (SPEC_FULL.md §4.3); the
/// caller `.build_query_as(...)`/`.fetch_all(pool)`s it, keeping the
/// compiler itself free of a database handle.
pub struct CompiledQuery {
    pub builder: QueryBuilder<'static, Postgres>,
}

impl CompiledQuery {
    pub fn sql(&self) -> &str {
        self.builder.sql()
    }
}

/// Compiles `filter` into a `SELECT` over one project's items, restricted
/// to `item_type`'s extension table.
///
/// Boolean nesting (`and_`/`or_`/`not_`) is compiled to correlated
/// `EXISTS`/`NOT EXISTS` subqueries rather than top-level joins: a join
/// predicate can't be OR'd or negated against another join predicate
/// without changing result cardinality, and the grammar allows arbitrary
/// nesting of `AssignmentFilter`/`AnnotationFilter`/`LabelFilter` under
/// `or_`/`not_`.
pub fn compile(item_type: ItemKind, project_id: Uuid, filter: &Filter) -> Result<CompiledQuery> {
    let mut qb = QueryBuilder::<Postgres>::new(from_clause(item_type));
    qb.push(" where items.project_id = ");
    qb.push_bind(project_id);
    qb.push(" and (");
    push_filter(&mut qb, item_type, filter)?;
    qb.push(")");
    if matches!(item_type, ItemKind::Lexis) {
        qb.push(" group by items.id");
    }
    Ok(CompiledQuery { builder: qb })
}

fn from_clause(item_type: ItemKind) -> &'static str {
    match item_type {
        ItemKind::Lexis => {
            "select distinct items.id, items.project_id, items.kind, items.text, items.created_at, \
             array_agg(distinct lexis_nexis_item_sources.outlet) as sources \
             from items \
             join lexis_nexis_items on lexis_nexis_items.item_id = items.id \
             join lexis_nexis_item_sources on lexis_nexis_item_sources.item_id = items.id"
        }
        ItemKind::Academic => "select distinct on (items.id) items.* from items join academic_items on academic_items.item_id = items.id",
        ItemKind::Generic | ItemKind::Twitter => "select distinct on (items.id) items.* from items",
    }
}

fn push_filter(qb: &mut QueryBuilder<Postgres>, item_type: ItemKind, filter: &Filter) -> Result<()> {
    match filter {
        Filter::And(children) => push_combinator(qb, item_type, children, " and ")?,
        Filter::Or(children) => push_combinator(qb, item_type, children, " or ")?,
        Filter::Not(inner) => {
            qb.push("not (");
            push_filter(qb, item_type, inner)?;
            qb.push(")");
        }
        Filter::Field(f) => push_field_filter(qb, item_type, f)?,
        Filter::Fields(f) => push_field_filters(qb, item_type, f)?,
        Filter::Meta(m) => push_meta_filter(qb, item_type, m)?,
        Filter::Abstract(a) => push_abstract_filter(qb, a),
        Filter::Import(i) => push_import_filter(qb, i)?,
        Filter::Assignment(a) => push_assignment_filter(qb, a)?,
        Filter::Annotation(a) => push_annotation_filter(qb, a),
        Filter::Label(l) => push_label_filter(qb, l)?,
    }
    Ok(())
}

fn push_combinator(
    qb: &mut QueryBuilder<Postgres>,
    item_type: ItemKind,
    children: &[Filter],
    joiner: &str,
) -> Result<()> {
    if children.is_empty() {
        return Err(Error::InvalidNql("and_/or_ subtree with no children".into()));
    }
    qb.push("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            qb.push(joiner);
        }
        push_filter(qb, item_type, child)?;
    }
    qb.push(")");
    Ok(())
}

fn resolve_column(item_type: ItemKind, field: &str) -> Result<String> {
    let column = match (item_type, field) {
        (ItemKind::Academic, "title") => "academic_items.title",
        (ItemKind::Academic, "abstract") => "items.text",
        (ItemKind::Academic, "pub_year") => "academic_items.pub_year",
        (ItemKind::Academic, "item_id") => "items.id",
        (ItemKind::Academic, "openalex_id") => "academic_items.openalex_id",
        (ItemKind::Academic, "doi") => "academic_items.doi",
        (ItemKind::Lexis, "title") => "lexis_nexis_item_sources.title",
        (ItemKind::Lexis, "abstract") => "items.text",
        (ItemKind::Lexis, "date") => "lexis_nexis_item_sources.publish_date",
        (ItemKind::Lexis, "pub_year") => "extract(year from lexis_nexis_item_sources.publish_date)",
        (ItemKind::Lexis, "source") => "lexis_nexis_item_sources.outlet",
        (ItemKind::Lexis, "item_id") => "items.id",
        (ItemKind::Generic, "abstract") | (ItemKind::Twitter, "abstract") => "items.text",
        (ItemKind::Generic, "item_id") | (ItemKind::Twitter, "item_id") => "items.id",
        _ => return Err(Error::InvalidNql(format!("field {field:?} not valid for {item_type:?}"))),
    };
    Ok(column.to_string())
}

fn push_field_filter(qb: &mut QueryBuilder<Postgres>, item_type: ItemKind, f: &FieldFilter) -> Result<()> {
    if !is_allowed(item_type, &f.field) {
        return Err(Error::InvalidNql(format!("unknown field {:?}", f.field)));
    }
    let column = resolve_column(item_type, &f.field)?;

    if forces_ilike(&f.field) {
        let Scalar::Str(s) = &f.value else {
            return Err(Error::InvalidNql(format!(
                "title/abstract filters require a string value, got {:?}",
                f.value
            )));
        };
        qb.push(column);
        qb.push(" ilike ");
        qb.push_bind(format!("%{s}%"));
        qb.push(" and ");
        qb.push(resolve_column(item_type, &f.field)?);
        qb.push(" is not null");
        return Ok(());
    }

    qb.push(&column);
    qb.push(comparator_sql(f.comp));
    push_scalar(qb, &f.value);
    qb.push(" and ");
    qb.push(column);
    qb.push(" is not null");
    Ok(())
}

fn push_field_filters(qb: &mut QueryBuilder<Postgres>, item_type: ItemKind, f: &FieldFilters) -> Result<()> {
    if !is_allowed(item_type, &f.field) {
        return Err(Error::InvalidNql(format!("unknown field {:?}", f.field)));
    }
    let column = resolve_column(item_type, &f.field)?;
    qb.push(column);
    qb.push(" in (");
    for (i, value) in f.values.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_scalar(qb, value);
    }
    qb.push(")");
    Ok(())
}

fn comparator_sql(comp: Comparator) -> &'static str {
    match comp {
        Comparator::Eq => " = ",
        Comparator::Ne => " != ",
        Comparator::Lt => " < ",
        Comparator::Le => " <= ",
        Comparator::Gt => " > ",
        Comparator::Ge => " >= ",
        Comparator::Like => " like ",
        Comparator::Similar => " similar to ",
    }
}

fn push_scalar(qb: &mut QueryBuilder<Postgres>, value: &Scalar) {
    match value {
        Scalar::Bool(b) => {
            qb.push_bind(*b);
        }
        Scalar::Int(i) => {
            qb.push_bind(*i);
        }
        Scalar::Float(f) => {
            qb.push_bind(*f);
        }
        Scalar::Str(s) => {
            qb.push_bind(s.clone());
        }
        Scalar::Date(d) => {
            qb.push_bind(*d);
        }
    }
}

fn meta_column(item_type: ItemKind) -> Result<&'static str> {
    match item_type {
        ItemKind::Academic => Ok("academic_items.meta"),
        ItemKind::Lexis => Ok("lexis_nexis_item_sources.meta"),
        ItemKind::Generic | ItemKind::Twitter => {
            Err(Error::InvalidNql(format!("{item_type:?} items carry no meta column")))
        }
    }
}

fn push_meta_filter(qb: &mut QueryBuilder<Postgres>, item_type: ItemKind, m: &MetaFilter) -> Result<()> {
    let column = meta_column(item_type)?;
    match &m.value {
        MetaValue::Bool(b) => {
            qb.push(format!("({column} ->> "));
            qb.push_bind(m.field.clone());
            qb.push(")::boolean = ");
            qb.push_bind(*b);
        }
        MetaValue::Int(i) => {
            qb.push(format!("({column} ->> "));
            qb.push_bind(m.field.clone());
            qb.push(")::bigint = ");
            qb.push_bind(*i);
        }
        MetaValue::Str(s) => {
            qb.push(format!("{column} ->> "));
            qb.push_bind(m.field.clone());
            qb.push(" ilike ");
            qb.push_bind(format!("%{s}%"));
        }
    }
    Ok(())
}

fn push_abstract_filter(qb: &mut QueryBuilder<Postgres>, a: &AbstractFilter) {
    match &a.target {
        AbstractTarget::Empty => {
            qb.push("(items.text is null or items.text = '')");
        }
        AbstractTarget::Size(size) => {
            qb.push("items.text is not null and char_length(items.text)");
            qb.push(comparator_sql(a.comp));
            qb.push_bind(*size);
        }
    }
}

fn push_import_filter(qb: &mut QueryBuilder<Postgres>, f: &ImportFilter) -> Result<()> {
    if f.included.is_empty() && f.excluded.is_empty() {
        return Err(Error::InvalidNql("ImportFilter with no included/excluded ids".into()));
    }
    qb.push("(true");
    if !f.included.is_empty() {
        qb.push(" and exists (select 1 from m2m_import_item mii where mii.item_id = items.id and mii.import_id = any(");
        qb.push_bind(f.included.clone());
        qb.push("))");
    }
    if !f.excluded.is_empty() {
        qb.push(" and not exists (select 1 from m2m_import_item mii where mii.item_id = items.id and mii.import_id = any(");
        qb.push_bind(f.excluded.clone());
        qb.push("))");
    }
    qb.push(")");
    Ok(())
}

fn push_assignment_filter(qb: &mut QueryBuilder<Postgres>, f: &AssignmentFilter) -> Result<()> {
    let positive = |qb: &mut QueryBuilder<Postgres>, extra: Option<&str>, bind: Option<&Filter>| {
        let _ = bind;
        qb.push("exists (select 1 from assignments a where a.item_id = items.id");
        if let Some(extra) = extra {
            qb.push(extra);
        }
        qb.push(")");
    };

    match f.mode {
        AssignmentMode::Any => {
            positive(qb, None, None);
        }
        AssignmentMode::InScopes => {
            let scopes = f.scope_ids.as_ref().ok_or_else(|| Error::InvalidNql("InScopes mode requires scope_ids".into()))?;
            qb.push("exists (select 1 from assignments a where a.item_id = items.id and a.scope_id = any(");
            qb.push_bind(scopes.clone());
            qb.push("))");
        }
        AssignmentMode::AssignedNotInScopes => {
            let scopes = f.scope_ids.as_ref().ok_or_else(|| Error::InvalidNql("AssignedNotInScopes mode requires scope_ids".into()))?;
            qb.push("exists (select 1 from assignments a where a.item_id = items.id) and not exists (select 1 from assignments a where a.item_id = items.id and a.scope_id = any(");
            qb.push_bind(scopes.clone());
            qb.push("))");
        }
        AssignmentMode::NotAssignedAtAll => {
            qb.push("not exists (select 1 from assignments a where a.item_id = items.id)");
        }
        AssignmentMode::NotAssignedInScopes => {
            let scopes = f.scope_ids.as_ref().ok_or_else(|| Error::InvalidNql("NotAssignedInScopes mode requires scope_ids".into()))?;
            qb.push("not exists (select 1 from assignments a where a.item_id = items.id and a.scope_id = any(");
            qb.push_bind(scopes.clone());
            qb.push("))");
        }
        AssignmentMode::UnderScheme => {
            let scheme = f.scheme_id.ok_or_else(|| Error::InvalidNql("UnderScheme mode requires scheme_id".into()))?;
            qb.push("exists (select 1 from assignments a where a.item_id = items.id and a.scheme_id = ");
            qb.push_bind(scheme);
            qb.push(")");
        }
        AssignmentMode::NotUnderScheme => {
            let scheme = f.scheme_id.ok_or_else(|| Error::InvalidNql("NotUnderScheme mode requires scheme_id".into()))?;
            qb.push("exists (select 1 from assignments a where a.item_id = items.id and a.scheme_id != ");
            qb.push_bind(scheme);
            qb.push(")");
        }
    }
    Ok(())
}

fn push_annotation_filter(qb: &mut QueryBuilder<Postgres>, f: &AnnotationFilter) {
    let negate = !f.include;
    if negate {
        qb.push("not ");
    }
    qb.push("exists (select 1 from annotations an join assignments a on a.id = an.assignment_id where a.item_id = items.id");
    if let Some(scheme) = f.scheme_id {
        qb.push(" and a.scheme_id = ");
        qb.push_bind(scheme);
    }
    if let Some(scopes) = &f.scope_ids {
        qb.push(" and a.scope_id = any(");
        qb.push_bind(scopes.clone());
        qb.push(")");
    }
    qb.push(")");
}

fn label_table(source: AnnotationSource) -> &'static str {
    match source {
        AnnotationSource::User => "annotations",
        AnnotationSource::Bot | AnnotationSource::Resolved => "bot_annotations",
    }
}

fn push_label_value_predicate(qb: &mut QueryBuilder<Postgres>, alias: &str, value: &LabelValue) {
    match value {
        LabelValue::Bool(b) => {
            qb.push(format!("{alias}.value_bool = "));
            qb.push_bind(*b);
        }
        LabelValue::Int { comp, value } => {
            qb.push(format!("{alias}.value_int"));
            qb.push(comparator_sql(*comp));
            qb.push_bind(*value);
        }
        LabelValue::Multi { comp, values } => {
            let values: Vec<i64> = values.iter().filter_map(|v| v.parse().ok()).collect();
            match comp {
                MultiSetComparator::Eq => {
                    qb.push(format!("{alias}.multi_int = "));
                    qb.push_bind(values);
                }
                MultiSetComparator::Superset => {
                    qb.push(format!("{alias}.multi_int @> "));
                    qb.push_bind(values);
                }
                MultiSetComparator::NotSuperset => {
                    qb.push(format!("not ({alias}.multi_int @> "));
                    qb.push_bind(values);
                    qb.push(")");
                }
                MultiSetComparator::Intersects => {
                    qb.push(format!("{alias}.multi_int && "));
                    qb.push_bind(values);
                }
            }
        }
    }
}

/// The user-scoping clause one `build_one` call applies, shared between
/// the unscoped, `ALL`, and `ANY` cases so every mode gets the same
/// `repeats`/`scope_ids`/`scheme_id` predicate assembly.
enum UserConstraint<'a> {
    None,
    One(Uuid),
    AnyOf(&'a [Uuid]),
}

/// `LabelFilter` compiles to one `EXISTS` per selected user under
/// `users.mode == ALL` (each gets its own correlated subquery, ANDed), or a
/// single `EXISTS` with `user_id = any(...)` under `ANY` — mirroring the
/// join-per-user vs. single-join split of the original ALL/ANY handling,
/// without relying on join aliasing to keep arbitrary nesting correct. Both
/// branches route through `build_one` so `repeats`/`scope_ids`/`scheme_id`
/// are applied identically regardless of `users.mode`.
fn push_label_filter(qb: &mut QueryBuilder<Postgres>, f: &LabelFilter) -> Result<()> {
    if matches!(f.source, AnnotationSource::Bot | AnnotationSource::Resolved) && f.users.is_some() {
        return Err(Error::InvalidNql("cannot filter bot/resolved annotations by user".into()));
    }

    let table = label_table(f.source);
    let build_one = |qb: &mut QueryBuilder<Postgres>, user_constraint: UserConstraint| -> Result<()> {
        qb.push(format!("exists (select 1 from {table} an"));
        if f.source == AnnotationSource::User {
            qb.push(" join assignments a on a.id = an.assignment_id");
        } else {
            qb.push(" join bot_annotation_metadata bam on bam.id = an.bot_annotation_metadata_id");
        }
        qb.push(" where an.key = ");
        qb.push_bind(f.key.clone());
        qb.push(" and ");
        push_label_value_predicate(qb, "an", &f.value);

        match user_constraint {
            UserConstraint::None => {}
            UserConstraint::One(user_id) => {
                qb.push(" and a.user_id = ");
                qb.push_bind(user_id);
            }
            UserConstraint::AnyOf(user_ids) => {
                qb.push(" and a.user_id = any(");
                qb.push_bind(user_ids.to_vec());
                qb.push(")");
            }
        }
        if let Some(repeats) = &f.repeats {
            qb.push(" and an.repeat = any(");
            qb.push_bind(repeats.iter().map(|r| *r as i32).collect::<Vec<_>>());
            qb.push(")");
        }
        match f.source {
            AnnotationSource::User => {
                qb.push(" and a.item_id = items.id");
                if let Some(scopes) = &f.scope_ids {
                    qb.push(" and a.scope_id = any(");
                    qb.push_bind(scopes.clone());
                    qb.push(")");
                }
                if let Some(scheme) = f.scheme_id {
                    qb.push(" and a.scheme_id = ");
                    qb.push_bind(scheme);
                }
            }
            AnnotationSource::Bot => {
                qb.push(" and an.item_id = items.id and bam.kind != 'RESOLVE'");
                if let Some(scheme) = f.scheme_id {
                    qb.push(" and bam.scheme_id = ");
                    qb.push_bind(scheme);
                }
            }
            AnnotationSource::Resolved => {
                qb.push(" and an.item_id = items.id and bam.kind = 'RESOLVE'");
                if let Some(scheme) = f.scheme_id {
                    qb.push(" and bam.scheme_id = ");
                    qb.push_bind(scheme);
                }
            }
        }
        qb.push(")");
        Ok(())
    };

    match &f.users {
        None => build_one(qb, UserConstraint::None)?,
        Some(selector) if selector.mode == UserMode::Any => {
            build_one(qb, UserConstraint::AnyOf(&selector.user_ids))?;
        }
        Some(selector) => {
            // ALL mode: one correlated EXISTS per user, ANDed together.
            qb.push("(");
            for (i, user_id) in selector.user_ids.iter().enumerate() {
                if i > 0 {
                    qb.push(" and ");
                }
                build_one(qb, UserConstraint::One(*user_id))?;
            }
            qb.push(")");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    fn pid() -> Uuid {
        Uuid::nil()
    }

    #[test]
    fn unknown_field_is_invalid_nql() {
        let filter = Filter::Field(FieldFilter {
            field: "not_a_field".into(),
            comp: Comparator::Eq,
            value: Scalar::Str("x".into()),
        });
        let err = compile(ItemKind::Academic, pid(), &filter).unwrap_err();
        assert!(matches!(err, Error::InvalidNql(_)));
    }

    #[test]
    fn title_filter_forces_ilike_regardless_of_requested_comparator() {
        let filter = Filter::Field(FieldFilter {
            field: "title".into(),
            comp: Comparator::Eq,
            value: Scalar::Str("emissions".into()),
        });
        let compiled = compile(ItemKind::Academic, pid(), &filter).unwrap();
        assert!(compiled.sql().contains("academic_items.title ilike"));
        assert!(!compiled.sql().contains("academic_items.title = "));
    }

    #[test]
    fn empty_and_or_subtree_is_invalid_nql() {
        let filter = Filter::And(vec![]);
        let err = compile(ItemKind::Academic, pid(), &filter).unwrap_err();
        assert!(matches!(err, Error::InvalidNql(_)));
    }

    #[test]
    fn import_filter_partitions_included_and_excluded() {
        let included = Uuid::new_v4();
        let excluded = Uuid::new_v4();
        let filter = Filter::Import(ImportFilter { included: vec![included], excluded: vec![excluded] });
        let compiled = compile(ItemKind::Academic, pid(), &filter).unwrap();
        assert_eq!(compiled.sql().matches("m2m_import_item").count(), 2);
        assert!(compiled.sql().contains("not exists"));
    }

    #[test]
    fn label_filter_all_mode_emits_one_exists_per_user() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let filter = Filter::Label(LabelFilter {
            source: AnnotationSource::User,
            key: "include".into(),
            value: LabelValue::Bool(true),
            users: Some(UserSelector { mode: UserMode::All, user_ids: vec![u1, u2] }),
            scope_ids: None,
            scheme_id: None,
            repeats: None,
        });
        let compiled = compile(ItemKind::Academic, pid(), &filter).unwrap();
        assert_eq!(compiled.sql().matches("exists (select 1 from annotations").count(), 2);
    }

    #[test]
    fn label_filter_any_mode_emits_a_single_exists_with_user_in() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let filter = Filter::Label(LabelFilter {
            source: AnnotationSource::User,
            key: "include".into(),
            value: LabelValue::Bool(true),
            users: Some(UserSelector { mode: UserMode::Any, user_ids: vec![u1, u2] }),
            scope_ids: None,
            scheme_id: None,
            repeats: None,
        });
        let compiled = compile(ItemKind::Academic, pid(), &filter).unwrap();
        assert_eq!(compiled.sql().matches("exists (select 1 from annotations").count(), 1);
        assert!(compiled.sql().contains("user_id = any("));
    }

    #[test]
    fn label_filter_any_mode_still_applies_scope_scheme_and_repeats() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let scope = Uuid::new_v4();
        let scheme = Uuid::new_v4();
        let filter = Filter::Label(LabelFilter {
            source: AnnotationSource::User,
            key: "include".into(),
            value: LabelValue::Bool(true),
            users: Some(UserSelector { mode: UserMode::Any, user_ids: vec![u1, u2] }),
            scope_ids: Some(vec![scope]),
            scheme_id: Some(scheme),
            repeats: Some(vec![1, 2]),
        });
        let compiled = compile(ItemKind::Academic, pid(), &filter).unwrap();
        let sql = compiled.sql();
        // ANY mode must not silently drop the other predicates — a filter
        // scoped to one assignment scope must not match annotations from
        // an unrelated scope just because the label/value/user matched.
        assert!(sql.contains("a.scope_id = any("));
        assert!(sql.contains("a.scheme_id = "));
        assert!(sql.contains("an.repeat = any("));
        assert!(sql.contains("user_id = any("));
    }

    #[test]
    fn bot_and_resolved_sources_cannot_carry_a_user_selector() {
        let filter = Filter::Label(LabelFilter {
            source: AnnotationSource::Bot,
            key: "include".into(),
            value: LabelValue::Bool(true),
            users: Some(UserSelector { mode: UserMode::Any, user_ids: vec![Uuid::new_v4()] }),
            scope_ids: None,
            scheme_id: None,
            repeats: None,
        });
        let err = compile(ItemKind::Academic, pid(), &filter).unwrap_err();
        assert!(matches!(err, Error::InvalidNql(_)));
    }

    #[test]
    fn resolved_source_filters_on_resolve_kind() {
        let filter = Filter::Label(LabelFilter {
            source: AnnotationSource::Resolved,
            key: "include".into(),
            value: LabelValue::Bool(true),
            users: None,
            scope_ids: None,
            scheme_id: None,
            repeats: None,
        });
        let compiled = compile(ItemKind::Academic, pid(), &filter).unwrap();
        assert!(compiled.sql().contains("bam.kind = 'RESOLVE'"));
    }

    /// Seed scenario 4 (spec.md §8): `and_[AbstractFilter(empty=false),
    /// LabelFilter(user, key="include", value_bool=true, users={ANY,[u1,u2]})]`
    /// against an academic project with no scope restriction.
    #[test]
    fn seed_scenario_abstract_and_label_filter_compiles_with_one_join_and_combined_where() {
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let filter = and_(vec![
            Filter::Abstract(AbstractFilter { comp: Comparator::Ne, target: AbstractTarget::Empty }),
            Filter::Label(LabelFilter {
                source: AnnotationSource::User,
                key: "include".into(),
                value: LabelValue::Bool(true),
                users: Some(UserSelector { mode: UserMode::Any, user_ids: vec![u1, u2] }),
                scope_ids: None,
                scheme_id: None,
                repeats: None,
            }),
        ]);
        let project_id = Uuid::new_v4();
        let compiled = compile(ItemKind::Academic, project_id, &filter).unwrap();
        let sql = compiled.sql();
        assert!(sql.contains("items.project_id = "));
        assert!(!sql.contains("char_length")); // AbstractTarget::Empty, not Size
        assert_eq!(sql.matches("exists (select 1 from annotations").count(), 1);
        assert!(sql.contains("an.key = "));
        assert!(sql.contains("user_id = any("));
    }

    /// Testable property 8 (spec.md §8): double negation is structurally a
    /// no-op wrapper around the same inner compilation, so it is
    /// semantically equivalent to the unnegated filter.
    #[test]
    fn double_negation_wraps_the_identical_inner_sql_twice() {
        let filter = Filter::Field(FieldFilter {
            field: "pub_year".into(),
            comp: Comparator::Ge,
            value: Scalar::Int(2020),
        });
        let project_id = Uuid::new_v4();
        let predicate = "academic_items.pub_year >= $2 and academic_items.pub_year is not null";
        let plain = compile(ItemKind::Academic, project_id, &filter).unwrap();
        let double_negated = compile(ItemKind::Academic, project_id, &not_(not_(filter))).unwrap();

        assert!(plain.sql().ends_with(&format!("and ({predicate})")));
        assert!(double_negated.sql().ends_with(&format!("and (not (not ({predicate})))")));
    }

    #[test]
    fn lexis_item_type_groups_by_item_and_aggregates_sources() {
        let filter = Filter::Abstract(AbstractFilter { comp: Comparator::Ne, target: AbstractTarget::Empty });
        let compiled = compile(ItemKind::Lexis, pid(), &filter).unwrap();
        assert!(compiled.sql().contains("group by items.id"));
        assert!(compiled.sql().contains("array_agg"));
    }

    #[test]
    fn assignment_filter_negative_modes_use_not_exists() {
        let filter = Filter::Assignment(AssignmentFilter {
            mode: AssignmentMode::NotAssignedAtAll,
            scope_ids: None,
            scheme_id: None,
        });
        let compiled = compile(ItemKind::Academic, pid(), &filter).unwrap();
        assert!(compiled.sql().contains("not exists (select 1 from assignments"));
    }
}
