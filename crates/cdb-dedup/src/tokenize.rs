use unicode_segmentation::UnicodeSegmentation;

/// Abstracts are long but informative near the top; only the first 80
/// tokens are kept so vectorization stays cheap over a large candidate
/// stream.
pub const MAX_TOKENS: usize = 80;
pub const MIN_TOKEN_LEN: usize = 2;
pub const MIN_TEXT_LEN: usize = 10;

/// Splits `text` into Unicode word tokens of length >= 2, keeping only the
/// first [`MAX_TOKENS`].
pub fn tokenize(text: &str, lowercase: bool) -> Vec<String> {
    text.unicode_words()
        .filter(|word| word.chars().count() >= MIN_TOKEN_LEN)
        .take(MAX_TOKENS)
        .map(|word| if lowercase { word.to_lowercase() } else { word.to_string() })
        .collect()
}
