use std::collections::HashMap;

/// One retrieval method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
	Fulltext,
	Semantic,
	Image,
	Kg,
}
impl Modality {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fulltext => "fulltext",
			Self::Semantic => "semantic",
			Self::Image => "image",
			Self::Kg => "kg",
		}
	}
}
impl std::fmt::Display for Modality {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single result from one modality. Position within its list is its rank;
/// producers return lists already sorted best-first.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RankedHit {
	pub doc_id: String,
	pub score: f32,
	pub source: Modality,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FusedHit {
	pub doc_id: String,
	pub fused_score: f64,
}

/// Merges ranked lists with Reciprocal Rank Fusion.
///
/// A hit at 1-based rank `r` contributes `1 / (k + r)`; a document absent
/// from a list contributes nothing from it. Input lists are taken as
/// already ordered — re-sorting them here would destroy the ranks the
/// producers assigned. Raw scores are ignored entirely, which is what lets
/// incomparable score scales fuse at all.
///
/// Ties break by ascending document id so the ordering never depends on
/// map iteration order.
pub fn fuse(lists: &[Vec<RankedHit>], k: u32) -> Vec<FusedHit> {
	let mut scores: HashMap<&str, f64> = HashMap::new();

	for list in lists {
		for (position, hit) in list.iter().enumerate() {
			let rank = position as f64 + 1.0;

			*scores.entry(hit.doc_id.as_str()).or_insert(0.0) += 1.0 / (f64::from(k) + rank);
		}
	}

	let mut fused: Vec<FusedHit> = scores
		.into_iter()
		.map(|(doc_id, fused_score)| FusedHit { doc_id: doc_id.to_string(), fused_score })
		.collect();

	fused.sort_by(|a, b| {
		b.fused_score.total_cmp(&a.fused_score).then_with(|| a.doc_id.cmp(&b.doc_id))
	});

	fused
}

#[cfg(test)]
mod tests {
	use super::*;

	fn hit(doc_id: &str, score: f32, source: Modality) -> RankedHit {
		RankedHit { doc_id: doc_id.to_string(), score, source }
	}

	#[test]
	fn absent_lists_contribute_nothing() {
		let lists =
			vec![vec![hit("a", 9.0, Modality::Semantic)], Vec::new(), Vec::new(), Vec::new()];
		let fused = fuse(&lists, 60);

		assert_eq!(fused.len(), 1);
		assert!((fused[0].fused_score - 1.0 / 61.0).abs() < 1e-12);
	}
}
