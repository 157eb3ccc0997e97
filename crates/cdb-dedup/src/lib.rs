//! Near-duplicate detection over a streaming population of bibliographic
//! candidates. Storage is out of scope here: callers hand in plain
//! [`ItemEntry`] values and get back the canonical id of a match, if any.

mod index;
mod tokenize;
mod vectorize;
mod vocabulary;

pub use index::{DuplicateIndex, ItemEntry, DEFAULT_MAX_SLOP};
pub use tokenize::{tokenize, MIN_TEXT_LEN};
pub use vectorize::SparseRow;
pub use vocabulary::Vocabulary;
