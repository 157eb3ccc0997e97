//! Conversion between [`AnnotationValue`] and the five nullable
//! `value_bool`/`value_int`/`value_float`/`value_str`/`multi_int` columns
//! invariant 1 (spec.md §8) requires exactly one of to be non-null.
use cdb_models::AnnotationValue;

#[derive(Debug, Default, Clone, sqlx::FromRow)]
pub struct ValueColumns {
    pub value_bool: Option<bool>,
    pub value_int: Option<i64>,
    pub value_float: Option<f64>,
    pub value_str: Option<String>,
    pub multi_int: Option<Vec<i64>>,
}

impl From<&AnnotationValue> for ValueColumns {
    fn from(v: &AnnotationValue) -> Self {
        let mut cols = ValueColumns::default();
        match v {
            AnnotationValue::Bool(b) => cols.value_bool = Some(*b),
            AnnotationValue::Int(i) => cols.value_int = Some(*i),
            AnnotationValue::Float(f) => cols.value_float = Some(*f),
            AnnotationValue::Str(s) => cols.value_str = Some(s.clone()),
            AnnotationValue::MultiInt(v) => cols.multi_int = Some(v.clone()),
        }
        cols
    }
}

impl TryFrom<ValueColumns> for AnnotationValue {
    type Error = cdb_models::Error;

    fn try_from(cols: ValueColumns) -> Result<Self, Self::Error> {
        match (
            cols.value_bool,
            cols.value_int,
            cols.value_float,
            cols.value_str,
            cols.multi_int,
        ) {
            (Some(b), None, None, None, None) => Ok(AnnotationValue::Bool(b)),
            (None, Some(i), None, None, None) => Ok(AnnotationValue::Int(i)),
            (None, None, Some(f), None, None) => Ok(AnnotationValue::Float(f)),
            (None, None, None, Some(s), None) => Ok(AnnotationValue::Str(s)),
            (None, None, None, None, Some(v)) => Ok(AnnotationValue::MultiInt(v)),
            other => Err(cdb_models::Error::InvalidResolution(format!(
                "row does not carry exactly one annotation value column: {other:?}"
            ))),
        }
    }
}
