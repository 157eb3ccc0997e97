//! Depth-first scheme flattening (SPEC_FULL.md §4.4 step 1): turns the label
//! tree into a flat list addressable by a single `path_key`, optionally
//! collapsing hierarchy and repeat distinctions for the matrix.

use cdb_models::{AnnotationScheme, Label, LabelKind};

const PATH_SEP: &str = ".";

#[derive(Debug, Clone)]
pub struct FlatLabel {
    pub path: Vec<String>,
    pub path_key: String,
    pub key: String,
    pub max_repeat: u32,
    pub kind: LabelKind,
    pub choices: Vec<String>,
}

/// Flattens `scheme`'s label tree. With `ignore_hierarchy`, every label is
/// addressed by its own key alone (as if it were a root). With
/// `ignore_repeat`, every label's `max_repeat` is compressed to 1 — the
/// matrix then has one cell per label regardless of how many repeats were
/// actually recorded.
pub fn flatten(scheme: &AnnotationScheme, ignore_hierarchy: bool, ignore_repeat: bool) -> Vec<FlatLabel> {
    scheme
        .walk()
        .into_iter()
        .map(|(path, label)| to_flat(path, label, ignore_hierarchy, ignore_repeat))
        .collect()
}

fn to_flat(path: Vec<String>, label: &Label, ignore_hierarchy: bool, ignore_repeat: bool) -> FlatLabel {
    let path = if ignore_hierarchy { vec![label.key.clone()] } else { path };
    FlatLabel {
        path_key: path.join(PATH_SEP),
        path,
        key: label.key.clone(),
        max_repeat: if ignore_repeat { 1 } else { label.max_repeat },
        kind: label.kind,
        choices: label.choices.iter().map(|c| c.value.clone()).collect(),
    }
}

/// Maps a stored annotation's path (as the recursive query walked it) onto
/// the flattened key space, honoring the same two collapsing options.
pub fn path_key(path: &[String], ignore_hierarchy: bool) -> String {
    if ignore_hierarchy {
        path.last().cloned().unwrap_or_default()
    } else {
        path.join(PATH_SEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdb_models::Choice;
    use uuid::Uuid;

    fn scheme() -> AnnotationScheme {
        let reason = Label { key: "reason".into(), kind: LabelKind::Str, max_repeat: 3, required: false, choices: vec![] };
        let include = Label {
            key: "include".into(),
            kind: LabelKind::Bool,
            max_repeat: 1,
            required: true,
            choices: vec![Choice { value: "yes".into(), children: vec![reason] }],
        };
        AnnotationScheme { id: Uuid::new_v4(), project_id: Uuid::new_v4(), name: "t".into(), labels: vec![include] }
    }

    #[test]
    fn hierarchy_preserved_by_default() {
        let flat = flatten(&scheme(), false, false);
        let reason = flat.iter().find(|f| f.key == "reason").unwrap();
        assert_eq!(reason.path_key, "include.reason");
        assert_eq!(reason.max_repeat, 3);
    }

    #[test]
    fn ignore_hierarchy_flattens_paths() {
        let flat = flatten(&scheme(), true, false);
        let reason = flat.iter().find(|f| f.key == "reason").unwrap();
        assert_eq!(reason.path_key, "reason");
    }

    #[test]
    fn ignore_repeat_compresses_to_one() {
        let flat = flatten(&scheme(), false, true);
        let reason = flat.iter().find(|f| f.key == "reason").unwrap();
        assert_eq!(reason.max_repeat, 1);
    }

    #[test]
    fn path_key_matches_flatten_convention() {
        assert_eq!(path_key(&["include".to_string(), "reason".to_string()], false), "include.reason");
        assert_eq!(path_key(&["include".to_string(), "reason".to_string()], true), "reason");
    }
}
