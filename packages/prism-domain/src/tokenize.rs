use std::sync::LazyLock;

use regex::Regex;

static WORD: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is a valid regex"));

/// Splits `text` into lower-cased terms on non-word boundaries.
///
/// Ingest and query paths must tokenize identically so term identifiers
/// match; this is the only tokenizer in the workspace.
pub fn tokenize(text: &str) -> Vec<String> {
	WORD.find_iter(text).map(|m| m.as_str().to_lowercase()).collect()
}
