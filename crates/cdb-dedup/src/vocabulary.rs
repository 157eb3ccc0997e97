use std::collections::HashMap;

/// Token -> dense id mapping fit from a corpus, or supplied by the caller
/// (e.g. reused across import revisions so candidate and stored text share
/// the same term space).
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    terms: HashMap<String, u32>,
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term_id(&self, term: &str) -> Option<u32> {
        self.terms.get(term).copied()
    }

    /// Fits a vocabulary over every document's tokens: terms occurring more
    /// than once survive, ranked by descending frequency (ties broken
    /// alphabetically for determinism) and capped at `max_features`.
    pub fn fit<'a, I>(documents: I, max_features: usize) -> Self
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let mut freq: HashMap<String, u32> = HashMap::new();
        for doc in documents {
            for token in doc {
                *freq.entry(token.clone()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, u32)> = freq.into_iter().filter(|(_, count)| *count > 1).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let terms = ranked
            .into_iter()
            .enumerate()
            .map(|(id, (term, _))| (term, id as u32))
            .collect();
        Self { terms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_hapax_legomena() {
        let docs: Vec<Vec<String>> = vec![
            vec!["climate".into(), "change".into()],
            vec!["climate".into(), "policy".into()],
        ];
        let refs: Vec<&[String]> = docs.iter().map(|d| d.as_slice()).collect();
        let vocab = Vocabulary::fit(refs, 100);
        assert!(vocab.term_id("climate").is_some());
        assert!(vocab.term_id("change").is_none());
        assert!(vocab.term_id("policy").is_none());
    }

    #[test]
    fn caps_at_max_features() {
        let doc: Vec<String> = (0..50).flat_map(|i| vec![format!("t{i}"), format!("t{i}")]).collect();
        let vocab = Vocabulary::fit(std::iter::once(doc.as_slice()), 10);
        assert_eq!(vocab.len(), 10);
    }
}
