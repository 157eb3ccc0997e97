use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "label_kind", rename_all = "lowercase")]
pub enum LabelKind {
    Bool,
    Int,
    Float,
    Str,
    Single,
    Multi,
    Intext,
}

/// One selectable value of a `single`/`multi` label, which may itself carry
/// a nested sub-tree of labels shown only when this value is chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    pub children: Vec<Label>,
}

/// A node in a project's annotation scheme tree. Sibling `key`s are unique
/// (enforced by [`AnnotationScheme::validate`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub kind: LabelKind,
    pub max_repeat: u32,
    pub required: bool,
    pub choices: Vec<Choice>,
}

impl Label {
    pub fn children(&self) -> impl Iterator<Item = &Label> {
        self.choices.iter().flat_map(|c| c.children.iter())
    }
}

/// Per-project tree of [`Label`]s that annotators and resolution both walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationScheme {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub labels: Vec<Label>,
}

impl AnnotationScheme {
    /// Checks the sibling-key-uniqueness invariant at every level of the tree.
    pub fn validate(&self) -> crate::error::Result<()> {
        fn check(labels: &[Label]) -> crate::error::Result<()> {
            let mut seen = std::collections::HashSet::new();
            for label in labels {
                if !seen.insert(label.key.as_str()) {
                    return Err(crate::error::Error::InvalidFilter(format!(
                        "duplicate sibling label key {:?}",
                        label.key
                    )));
                }
                if label.max_repeat < 1 {
                    return Err(crate::error::Error::InvalidFilter(format!(
                        "label {:?} has max_repeat < 1",
                        label.key
                    )));
                }
                for choice in &label.choices {
                    check(&choice.children)?;
                }
            }
            Ok(())
        }
        check(&self.labels)
    }

    /// Depth-first walk of every label in the tree, yielding `(path, label)`
    /// where `path` is the chain of keys from the root.
    pub fn walk(&self) -> Vec<(Vec<String>, &Label)> {
        fn recurse<'a>(labels: &'a [Label], prefix: &[String], out: &mut Vec<(Vec<String>, &'a Label)>) {
            for label in labels {
                let mut path = prefix.to_vec();
                path.push(label.key.clone());
                for choice in &label.choices {
                    recurse(&choice.children, &path, out);
                }
                out.push((path, label));
            }
        }
        let mut out = Vec::new();
        recurse(&self.labels, &[], &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(key: &str) -> Label {
        Label {
            key: key.to_string(),
            kind: LabelKind::Bool,
            max_repeat: 1,
            required: false,
            choices: vec![],
        }
    }

    #[test]
    fn rejects_duplicate_sibling_keys() {
        let scheme = AnnotationScheme {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "t".into(),
            labels: vec![leaf("include"), leaf("include")],
        };
        assert!(scheme.validate().is_err());
    }

    #[test]
    fn walk_includes_nested_children() {
        let child = leaf("reason");
        let parent = Label {
            key: "include".into(),
            kind: LabelKind::Single,
            max_repeat: 1,
            required: true,
            choices: vec![Choice {
                value: "yes".into(),
                children: vec![child],
            }],
        };
        let scheme = AnnotationScheme {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            name: "t".into(),
            labels: vec![parent],
        };
        let paths: Vec<_> = scheme.walk().into_iter().map(|(p, _)| p.join(".")).collect();
        assert!(paths.contains(&"include".to_string()));
        assert!(paths.contains(&"include.reason".to_string()));
    }
}
