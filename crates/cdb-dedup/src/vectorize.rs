use std::collections::BTreeMap;

use crate::vocabulary::Vocabulary;

/// Sparse term-count vector: `(term_id, count)` pairs sorted ascending by
/// id. Retained even though C1's decision rule only consumes the
/// deduplicated term-id set, since the counts are the representation a
/// future cosine-similarity backend would need.
#[derive(Debug, Clone, Default)]
pub struct SparseRow {
    pub counts: Vec<(u32, u32)>,
}

impl SparseRow {
    pub fn from_tokens(tokens: &[String], vocab: &Vocabulary) -> Self {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for token in tokens {
            if let Some(id) = vocab.term_id(token) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        Self { counts: counts.into_iter().collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The deduplicated, sorted set of term ids this row touches — the view
    /// `DistJaccard` compares two rows over.
    pub fn term_set(&self) -> Vec<u32> {
        self.counts.iter().map(|(id, _)| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_repeated_tokens_and_drops_unknown() {
        let docs = vec![vec!["climate".to_string(), "climate".to_string(), "policy".to_string()]];
        let refs: Vec<&[String]> = docs.iter().map(|d| d.as_slice()).collect();
        let mut corpus = docs.clone();
        corpus.push(vec!["climate".to_string(), "unrelated".to_string()]);
        let corpus_refs: Vec<&[String]> = corpus.iter().map(|d| d.as_slice()).collect();
        let vocab = Vocabulary::fit(corpus_refs, 100);

        let row = SparseRow::from_tokens(&refs[0].to_vec(), &vocab);
        let climate_id = vocab.term_id("climate").unwrap();
        assert_eq!(row.counts.iter().find(|(id, _)| *id == climate_id).unwrap().1, 2);
        assert!(vocab.term_id("unrelated").is_none());
    }
}
