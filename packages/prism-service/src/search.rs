use std::collections::HashSet;

use prism_backend::{MultiVectorHits, VectorSelection};
use prism_domain::{FusedHit, RankedHit, fuse};

use crate::{Error, Result, SearchService};

/// One requested retrieval method; `fused` piggybacks on whatever the
/// modal methods return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
	Fulltext,
	Semantic,
	Image,
	Kg,
	Fused,
}
impl Method {
	pub const ALL: [Self; 5] = [Self::Fulltext, Self::Semantic, Self::Image, Self::Kg, Self::Fused];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Fulltext => "fulltext",
			Self::Semantic => "semantic",
			Self::Image => "image",
			Self::Kg => "kg",
			Self::Fused => "fused",
		}
	}
}
impl std::str::FromStr for Method {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw {
			"fulltext" => Ok(Self::Fulltext),
			"semantic" => Ok(Self::Semantic),
			"image" => Ok(Self::Image),
			"kg" => Ok(Self::Kg),
			"fused" => Ok(Self::Fused),
			other => Err(Error::invalid(format!("Unrecognized method {other:?}."))),
		}
	}
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	/// Raw image payload; only forwarded when the image method is
	/// requested.
	#[serde(default)]
	pub image: Option<Vec<u8>>,
	/// Comma-separated subset of fulltext, semantic, image, kg, fused.
	/// Unset means all five.
	#[serde(default)]
	pub methods: Option<String>,
	#[serde(default)]
	pub top_k: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
	pub doc_id: String,
	pub score: f32,
}
impl From<&RankedHit> for SearchHit {
	fn from(hit: &RankedHit) -> Self {
		Self { doc_id: hit.doc_id.clone(), score: hit.score }
	}
}

/// Response map: each modality key is present exactly when it was
/// requested, `degraded` names modalities that failed under the degraded
/// policy.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fulltext: Option<Vec<SearchHit>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub semantic: Option<Vec<SearchHit>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub image: Option<Vec<SearchHit>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub kg: Option<Vec<SearchHit>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub fused: Option<Vec<FusedHit>>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub degraded: Vec<String>,
}

impl SearchService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::invalid("query must be non-empty."));
		}

		let top_k = req.top_k.unwrap_or(self.cfg.search.default_top_k);

		if top_k <= 0 {
			return Err(Error::invalid(format!("top_k must be at least one, got {top_k}.")));
		}

		let k = top_k as u64;
		let requested = resolve_methods(req.methods.as_deref())?;

		if requested.is_empty() {
			return Ok(SearchResponse::default());
		}

		let selection = VectorSelection {
			fulltext: requested.contains(&Method::Fulltext),
			semantic: requested.contains(&Method::Semantic),
			image: requested.contains(&Method::Image),
		};
		// A payload supplied without the image method is dropped here and
		// never reaches a backend.
		let image = if selection.image { req.image.as_deref() } else { None };

		tracing::debug!(
			methods = ?requested.iter().map(|method| method.as_str()).collect::<Vec<_>>(),
			vector_methods = selection.count(),
			kg = requested.contains(&Method::Kg),
			top_k,
			"Planned search fan-out."
		);

		let vector_future = self.vector_call(query, image, selection, k);
		let graph_future = self.graph_call(query, requested.contains(&Method::Kg), k);
		// Fan-in barrier: fusion only ever sees fully assembled lists.
		let (vector_hits, kg_hits, degraded) = if self.cfg.search.degraded {
			let (vector_result, graph_result) = tokio::join!(vector_future, graph_future);
			let mut degraded = Vec::new();
			let vector_hits = match vector_result {
				Ok(hits) => hits,
				Err(err) => {
					tracing::warn!(error = %err, "Vector backend degraded to empty lists.");

					for method in [Method::Fulltext, Method::Semantic, Method::Image] {
						if requested.contains(&method) {
							degraded.push(method.as_str().to_string());
						}
					}

					MultiVectorHits {
						fulltext: selection.fulltext.then(Vec::new),
						semantic: selection.semantic.then(Vec::new),
						image: selection.image.then(Vec::new),
					}
				},
			};
			let kg_hits = match graph_result {
				Ok(hits) => hits,
				Err(err) => {
					tracing::warn!(error = %err, "Graph backend degraded to an empty list.");

					degraded.push(Method::Kg.as_str().to_string());

					Some(Vec::new())
				},
			};

			(vector_hits, kg_hits, degraded)
		} else {
			let (vector_hits, kg_hits) = tokio::try_join!(vector_future, graph_future)?;

			(vector_hits, kg_hits, Vec::new())
		};

		let MultiVectorHits { fulltext, semantic, image } = vector_hits;
		let mut response = SearchResponse {
			fulltext: hits_if(requested.contains(&Method::Fulltext), &fulltext),
			semantic: hits_if(requested.contains(&Method::Semantic), &semantic),
			image: hits_if(requested.contains(&Method::Image), &image),
			kg: hits_if(requested.contains(&Method::Kg), &kg_hits),
			fused: None,
			degraded,
		};

		if requested.contains(&Method::Fused) {
			// Fixed modality order; absent lists contribute nothing.
			let lists = [
				fulltext.unwrap_or_default(),
				semantic.unwrap_or_default(),
				image.unwrap_or_default(),
				kg_hits.unwrap_or_default(),
			];

			response.fused = Some(fuse(&lists, self.cfg.search.rrf_k));
		}

		tracing::info!(
			fulltext = response.fulltext.as_ref().map(Vec::len),
			semantic = response.semantic.as_ref().map(Vec::len),
			image = response.image.as_ref().map(Vec::len),
			kg = response.kg.as_ref().map(Vec::len),
			fused = response.fused.as_ref().map(Vec::len),
			"Search complete."
		);

		Ok(response)
	}

	/// At most one vector-backend round trip: a combined call when more
	/// than one vector modality is requested, an individual call for a
	/// single one, none otherwise.
	async fn vector_call(
		&self,
		query: &str,
		image: Option<&[u8]>,
		selection: VectorSelection,
		k: u64,
	) -> Result<MultiVectorHits> {
		if selection.count() == 0 {
			return Ok(MultiVectorHits::default());
		}
		if selection.count() > 1 {
			return self
				.vector
				.multi_vector_search(query, image, selection, k)
				.await
				.map_err(|err| Error::backend(vector_label(selection), err));
		}

		let mut hits = MultiVectorHits::default();

		if selection.fulltext {
			hits.fulltext = Some(
				self.vector
					.search_fulltext(query, k)
					.await
					.map_err(|err| Error::backend(Method::Fulltext.as_str(), err))?,
			);
		} else if selection.semantic {
			hits.semantic = Some(
				self.vector
					.search_semantic(query, k)
					.await
					.map_err(|err| Error::backend(Method::Semantic.as_str(), err))?,
			);
		} else if selection.image {
			hits.image = Some(match image {
				Some(image) => self
					.vector
					.search_image(image, k)
					.await
					.map_err(|err| Error::backend(Method::Image.as_str(), err))?,
				// Image search without a payload has no signal to match
				// against.
				None => Vec::new(),
			});
		}

		Ok(hits)
	}

	async fn graph_call(
		&self,
		query: &str,
		requested: bool,
		k: u64,
	) -> Result<Option<Vec<RankedHit>>> {
		if !requested {
			return Ok(None);
		}

		self.graph
			.search_entities(query, k)
			.await
			.map(Some)
			.map_err(|err| Error::backend(Method::Kg.as_str(), err))
	}
}

/// Parses the comma-separated method list; `None` resolves to all five.
fn resolve_methods(raw: Option<&str>) -> Result<HashSet<Method>> {
	let Some(raw) = raw else {
		return Ok(Method::ALL.into_iter().collect());
	};
	let mut requested = HashSet::new();

	for part in raw.split(',') {
		let part = part.trim();

		if part.is_empty() {
			continue;
		}

		requested.insert(part.parse::<Method>()?);
	}

	Ok(requested)
}

fn hits_if(requested: bool, hits: &Option<Vec<RankedHit>>) -> Option<Vec<SearchHit>> {
	if !requested {
		return None;
	}

	Some(hits.as_deref().unwrap_or_default().iter().map(SearchHit::from).collect())
}

fn vector_label(selection: VectorSelection) -> String {
	let mut parts = Vec::new();

	if selection.fulltext {
		parts.push(Method::Fulltext.as_str());
	}
	if selection.semantic {
		parts.push(Method::Semantic.as_str());
	}
	if selection.image {
		parts.push(Method::Image.as_str());
	}

	parts.join("+")
}
