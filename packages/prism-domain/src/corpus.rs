use std::collections::{HashMap, HashSet};

use crate::tokenize::tokenize;

/// Document-frequency statistics over every ingested text.
///
/// Counts only grow. Observing the same batch twice doubles every affected
/// count, so callers must not re-ingest unchanged documents.
#[derive(Debug, Default)]
pub struct CorpusStats {
	doc_freq: HashMap<String, u64>,
	total_docs: u64,
	total_tokens: u64,
}
impl CorpusStats {
	pub fn new() -> Self {
		Self::default()
	}

	/// Folds a batch of document texts into the statistics.
	///
	/// A text that tokenizes to nothing still counts toward `total_docs`;
	/// it carries no terms and no length, so it cannot distort the average
	/// document length.
	pub fn observe(&mut self, texts: &[String]) {
		for text in texts {
			self.observe_one(text);
		}
	}

	fn observe_one(&mut self, text: &str) {
		let tokens = tokenize(text);

		self.total_docs += 1;

		if tokens.is_empty() {
			return;
		}

		self.total_tokens += tokens.len() as u64;

		let mut seen = HashSet::new();

		for token in tokens {
			// Document frequency, not term frequency: one increment per
			// distinct term per document.
			if seen.insert(token.clone()) {
				*self.doc_freq.entry(token).or_insert(0) += 1;
			}
		}
	}

	pub fn doc_freq(&self, term: &str) -> u64 {
		self.doc_freq.get(term).copied().unwrap_or(0)
	}

	pub fn total_docs(&self) -> u64 {
		self.total_docs
	}

	pub fn total_tokens(&self) -> u64 {
		self.total_tokens
	}

	/// Average document length in tokens, or `fallback` while the corpus is
	/// still empty (avoids a zero division on the very first scoring call).
	pub fn avg_doc_len(&self, fallback: f32) -> f32 {
		if self.total_docs == 0 {
			return fallback;
		}

		self.total_tokens as f32 / self.total_docs as f32
	}
}
