use std::{
	collections::{BTreeMap, HashMap},
	sync::RwLock,
};

use crate::{corpus::CorpusStats, tokenize::tokenize};

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Bm25Params {
	pub k1: f32,
	pub b: f32,
	/// Width of the sparse vector space, shared with the dense encoder.
	pub vector_dim: u32,
}
impl Default for Bm25Params {
	fn default() -> Self {
		Self { k1: 1.2, b: 0.75, vector_dim: 384 }
	}
}

/// Non-zero dimensions of a term-weight vector, sorted by index.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SparseVector {
	pub indices: Vec<u32>,
	pub values: Vec<f32>,
}
impl SparseVector {
	pub fn is_empty(&self) -> bool {
		self.indices.is_empty()
	}
}

/// BM25 term weights for `text` against the observed corpus.
///
/// Terms map to dimensions via FNV-1a over their UTF-8 bytes, modulo the
/// vector width. The hash and modulus are pinned so independent ingesters
/// produce identical vectors for the same corpus. Terms that collide on a
/// dimension sum their weights; that loss is accepted to keep the vector
/// width fixed.
///
/// An empty corpus or a text with no terms yields an empty vector — the
/// caller treats that as "no lexical signal", not as an error.
pub fn sparse_vector(stats: &CorpusStats, params: &Bm25Params, text: &str) -> SparseVector {
	let tokens = tokenize(text);

	if tokens.is_empty() || stats.total_docs() == 0 {
		return SparseVector::default();
	}

	let doc_len = tokens.len() as f32;
	let avgdl = stats.avg_doc_len(doc_len);
	let total_docs = stats.total_docs() as f32;
	let mut term_freq: HashMap<String, f32> = HashMap::new();

	for token in tokens {
		*term_freq.entry(token).or_insert(0.0) += 1.0;
	}

	// BTreeMap keeps the output ordering independent of hash-map iteration
	// order.
	let mut weights: BTreeMap<u32, f32> = BTreeMap::new();

	for (term, freq) in &term_freq {
		let freq = *freq;
		let df = stats.doc_freq(term) as f32;
		let idf = ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln();
		let denom = if avgdl > 0.0 {
			freq + params.k1 * (1.0 - params.b + params.b * doc_len / avgdl)
		} else {
			freq + params.k1
		};
		let weight = idf * freq * (params.k1 + 1.0) / denom;
		let index = (fnv1a_64(term.as_bytes()) % u64::from(params.vector_dim)) as u32;

		*weights.entry(index).or_insert(0.0) += weight;
	}

	let mut out = SparseVector {
		indices: Vec::with_capacity(weights.len()),
		values: Vec::with_capacity(weights.len()),
	};

	for (index, value) in weights {
		out.indices.push(index);
		out.values.push(value);
	}

	out
}

pub fn fnv1a_64(bytes: &[u8]) -> u64 {
	bytes
		.iter()
		.fold(FNV_OFFSET_BASIS, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME))
}

/// Owns the corpus statistics and hands out BM25 sparse vectors.
///
/// Ingest takes the write lock, scoring takes the read lock; scoring calls
/// run concurrently with each other and never observe a half-applied batch.
#[derive(Debug)]
pub struct SparseScorer {
	params: Bm25Params,
	stats: RwLock<CorpusStats>,
}
impl SparseScorer {
	pub fn new(params: Bm25Params) -> Self {
		Self { params, stats: RwLock::new(CorpusStats::new()) }
	}

	/// Folds a batch of texts into the corpus statistics.
	///
	/// Not idempotent: observing the same batch twice doubles every affected
	/// count. Callers own deduplication.
	pub fn observe(&self, texts: &[String]) {
		let mut stats = self.stats.write().unwrap_or_else(|err| err.into_inner());

		stats.observe(texts);
	}

	pub fn score(&self, text: &str) -> SparseVector {
		let stats = self.stats.read().unwrap_or_else(|err| err.into_inner());

		sparse_vector(&stats, &self.params, text)
	}

	pub fn total_docs(&self) -> u64 {
		self.stats.read().unwrap_or_else(|err| err.into_inner()).total_docs()
	}

	pub fn total_tokens(&self) -> u64 {
		self.stats.read().unwrap_or_else(|err| err.into_inner()).total_tokens()
	}

	pub fn doc_freq(&self, term: &str) -> u64 {
		self.stats.read().unwrap_or_else(|err| err.into_inner()).doc_freq(term)
	}
}
