use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use hnsw_rs::prelude::*;
use uuid::Uuid;

use crate::tokenize::{tokenize, MIN_TEXT_LEN};
use crate::vectorize::SparseRow;
use crate::vocabulary::Vocabulary;

/// One candidate/existing text observation, mirroring the shape `cdb-store`
/// reads off `items` — C1 never touches storage directly, so it takes this
/// plain struct instead of a trait object.
#[derive(Debug, Clone)]
pub struct ItemEntry {
    pub item_id: Uuid,
    pub text: String,
}

/// Default maximum Jaccard distance for a candidate to be considered a
/// near-duplicate.
pub const DEFAULT_MAX_SLOP: f32 = 0.02;
const ANN_K: usize = 5;
const EF_SEARCH: usize = 64;
const M: usize = 16;
const EF_CONSTRUCTION: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Existing,
    New,
}

/// The fitted ANN structure over one project's existing-plus-new item texts.
/// Built once per `init` call; `test`/`register_stored` are then cheap.
pub struct FittedIndex {
    vocabulary: Vocabulary,
    max_slop: f32,
    /// Kept alongside `hnsw`: the index holds references into these rows,
    /// not owned copies, so they must outlive every `search` call.
    #[allow(dead_code)]
    vectors: Vec<Vec<u32>>,
    ids: Vec<Uuid>,
    origins: Vec<Origin>,
    hnsw: Hnsw<'static, u32, DistJaccard<u32>>,
    /// `register_stored`'s union-find-style chain: new_id -> {new_id itself
    /// (canonical, freshly stored) | existing/new id it was merged into}.
    canonical: Mutex<HashMap<Uuid, Uuid>>,
}

impl FittedIndex {
    fn build(
        existing: Vec<ItemEntry>,
        new: Vec<ItemEntry>,
        vocabulary: Option<Vocabulary>,
        max_slop: f32,
        max_features: usize,
    ) -> Self {
        let existing_tokens: Vec<Vec<String>> =
            existing.iter().map(|e| tokenize(&e.text, true)).collect();
        let new_tokens: Vec<Vec<String>> = new.iter().map(|e| tokenize(&e.text, true)).collect();

        let vocabulary = vocabulary.unwrap_or_else(|| {
            let refs = existing_tokens
                .iter()
                .chain(new_tokens.iter())
                .map(|d| d.as_slice());
            Vocabulary::fit(refs, max_features)
        });

        let mut vectors = Vec::with_capacity(existing.len() + new.len());
        let mut ids = Vec::with_capacity(existing.len() + new.len());
        let mut origins = Vec::with_capacity(existing.len() + new.len());

        for (entry, tokens) in existing.iter().zip(existing_tokens.iter()) {
            vectors.push(SparseRow::from_tokens(tokens, &vocabulary).term_set());
            ids.push(entry.item_id);
            origins.push(Origin::Existing);
        }
        for (entry, tokens) in new.iter().zip(new_tokens.iter()) {
            vectors.push(SparseRow::from_tokens(tokens, &vocabulary).term_set());
            ids.push(entry.item_id);
            origins.push(Origin::New);
        }

        let nb_elem = vectors.len().max(1);
        let max_layer = 16.min((nb_elem as f32).ln().trunc() as usize).max(1);
        let hnsw = Hnsw::<u32, DistJaccard<u32>>::new(M, nb_elem, max_layer, EF_CONSTRUCTION, DistJaccard {});
        for (i, v) in vectors.iter().enumerate() {
            hnsw.insert((&v[..], i));
        }

        Self {
            vocabulary,
            max_slop,
            vectors,
            ids,
            origins,
            hnsw,
            canonical: Mutex::new(HashMap::new()),
        }
    }

    fn test(&self, entry: &ItemEntry) -> Option<Uuid> {
        if entry.text.chars().count() < MIN_TEXT_LEN {
            return None;
        }
        let tokens = tokenize(&entry.text, true);
        let query = SparseRow::from_tokens(&tokens, &self.vocabulary).term_set();
        if query.is_empty() {
            return None;
        }

        let mut neighbours = self.hnsw.search(&query, ANN_K, EF_SEARCH);
        neighbours.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        for n in neighbours {
            if n.distance > self.max_slop {
                break;
            }
            let idx = n.d_id;
            let candidate_id = self.ids[idx];
            if candidate_id == entry.item_id {
                continue;
            }
            match self.origins[idx] {
                Origin::Existing => return Some(candidate_id),
                Origin::New => {
                    if let Some(canonical) = self.resolve_canonical(candidate_id) {
                        return Some(canonical);
                    }
                    // Not yet `register_stored`: false positive, keep scanning.
                }
            }
        }
        None
    }

    fn register_stored(&self, new_id: Uuid, existing_id: Option<Uuid>) {
        let mut canonical = self.canonical.lock().unwrap();
        canonical.insert(new_id, existing_id.unwrap_or(new_id));
    }

    /// Walks the `register_stored` chain from `id` to its fixed point,
    /// guarding against cycles.
    fn resolve_canonical(&self, id: Uuid) -> Option<Uuid> {
        let canonical = self.canonical.lock().unwrap();
        let mut current = *canonical.get(&id)?;
        let mut visited = HashSet::new();
        while let Some(next) = canonical.get(&current) {
            if *next == current || !visited.insert(current) {
                break;
            }
            current = *next;
        }
        Some(current)
    }
}

/// Lazily-initialized wrapper so `test`/`register_stored` called before
/// `init` is a loud programmer error rather than a silently empty index.
#[derive(Default)]
pub struct DuplicateIndex {
    inner: Option<FittedIndex>,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self { inner: None }
    }

    /// Fits or reuses a vocabulary, folds both streams into vectors, and
    /// builds the ANN structure over their union. `batch_size` governs how
    /// many entries are pulled from each stream per fold iteration; present
    /// for API symmetry with the streaming ingestion callers use.
    pub fn init<E, N>(
        &mut self,
        existing_items: E,
        new_items: N,
        vocabulary: Option<Vocabulary>,
        max_slop: f32,
        max_features: usize,
        batch_size: usize,
    ) where
        E: IntoIterator<Item = ItemEntry>,
        N: IntoIterator<Item = ItemEntry>,
    {
        let _ = batch_size;
        let existing: Vec<ItemEntry> = existing_items.into_iter().collect();
        let new: Vec<ItemEntry> = new_items.into_iter().collect();
        self.inner = Some(FittedIndex::build(existing, new, vocabulary, max_slop, max_features));
    }

    pub fn test(&self, entry: &ItemEntry) -> Option<Uuid> {
        self.inner
            .as_ref()
            .expect("DuplicateIndex::test called before init")
            .test(entry)
    }

    pub fn register_stored(&self, new_id: Uuid, existing_id: Option<Uuid>) {
        self.inner
            .as_ref()
            .expect("DuplicateIndex::register_stored called before init")
            .register_stored(new_id, existing_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> ItemEntry {
        ItemEntry { item_id: Uuid::new_v4(), text: text.to_string() }
    }

    #[test]
    #[should_panic(expected = "called before init")]
    fn test_before_init_panics() {
        let index = DuplicateIndex::new();
        index.test(&entry("this text is long enough to pass the floor"));
    }

    #[test]
    fn short_text_returns_none_without_panicking() {
        let mut index = DuplicateIndex::new();
        index.init(vec![], vec![], None, DEFAULT_MAX_SLOP, usize::MAX, 100);
        assert_eq!(index.test(&entry("too short")), None);
    }

    #[test]
    fn stopword_only_text_returns_none_not_an_error() {
        let mut index = DuplicateIndex::new();
        let existing = vec![entry("climate policy research on emissions trading schemes")];
        index.init(existing, vec![], None, DEFAULT_MAX_SLOP, usize::MAX, 100);
        // every token below min length or absent from the fitted vocabulary
        assert_eq!(index.test(&entry("a an to of is")), None);
    }

    #[test]
    fn exact_duplicate_of_an_existing_item_matches() {
        let mut index = DuplicateIndex::new();
        let existing_id = Uuid::new_v4();
        let text = "deep learning approaches to climate policy emissions trading schemes research";
        let existing = vec![ItemEntry { item_id: existing_id, text: text.to_string() }];
        index.init(existing, vec![], None, DEFAULT_MAX_SLOP, usize::MAX, 100);

        let candidate = entry(text);
        assert_eq!(index.test(&candidate), Some(existing_id));
    }

    #[test]
    fn register_stored_resolves_merge_chain() {
        let mut index = DuplicateIndex::new();
        let text = "deep learning approaches to climate policy emissions trading schemes research";
        let new_a = ItemEntry { item_id: Uuid::new_v4(), text: text.to_string() };
        let new_b = ItemEntry { item_id: Uuid::new_v4(), text: text.to_string() };
        let new_a_id = new_a.item_id;
        let new_b_id = new_b.item_id;
        index.init(vec![], vec![new_a, new_b], None, DEFAULT_MAX_SLOP, usize::MAX, 100);

        // new_a gets stored fresh; new_b should have merged into new_a's
        // canonical id once registered.
        index.register_stored(new_a_id, None);
        index.register_stored(new_b_id, Some(new_a_id));

        assert_eq!(index.test(&entry(text)), Some(new_a_id));
        let _ = new_b_id;
    }
}
