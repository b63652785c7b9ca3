pub const SEMANTIC_VECTOR_NAME: &str = "semantic";
pub const IMAGE_VECTOR_NAME: &str = "image";
pub const FULLTEXT_VECTOR_NAME: &str = "fulltext";

use std::{collections::HashMap, sync::Arc};

use qdrant_client::{
	Payload,
	qdrant::{
		CreateCollectionBuilder, Distance, NamedVectors, PointStruct, Query, QueryBatchPointsBuilder,
		QueryPoints, QueryPointsBuilder, ScoredPoint, SparseVectorParamsBuilder,
		SparseVectorsConfigBuilder, UpsertPointsBuilder, Value, Vector, VectorInput,
		VectorParamsBuilder, VectorsConfigBuilder, value::Kind,
	},
};
use uuid::Uuid;

use prism_domain::{Modality, RankedHit, SparseScorer, SparseVector};

use crate::{
	BoxFuture, DocumentRecord, EmbeddingProvider, Error, MultiVectorHits, Result, VectorBackend,
	VectorSelection,
};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
}
impl QdrantStore {
	pub fn new(cfg: &prism_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone() })
	}
}

/// Multi-vector document collection over Qdrant: named dense vectors for
/// the semantic and image modalities, a named sparse vector for lexical
/// BM25 weights.
pub struct QdrantVectorBackend {
	store: QdrantStore,
	dense_dim: u32,
	image_dim: u32,
	embedder: Arc<dyn EmbeddingProvider>,
	scorer: Arc<SparseScorer>,
}
impl QdrantVectorBackend {
	pub fn new(
		cfg: &prism_config::Qdrant,
		embedder: Arc<dyn EmbeddingProvider>,
		scorer: Arc<SparseScorer>,
	) -> Result<Self> {
		let store = QdrantStore::new(cfg)?;

		Ok(Self { store, dense_dim: cfg.dense_dim, image_dim: cfg.image_dim, embedder, scorer })
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let embeddings = self.embedder.embed_text(std::slice::from_ref(&query.to_string())).await?;
		let vector = embeddings
			.into_iter()
			.next()
			.ok_or_else(|| Error::Provider("Embedding provider returned no vectors.".to_string()))?;

		if vector.len() != self.dense_dim as usize {
			return Err(Error::Provider("Embedding vector dimension mismatch.".to_string()));
		}

		Ok(vector)
	}

	fn query_points(&self, using: &str, query: impl Into<VectorInput>, k: u64) -> QueryPoints {
		QueryPointsBuilder::new(self.store.collection.clone())
			.query(Query::new_nearest(query))
			.using(using)
			.limit(k)
			.with_payload(true)
			.build()
	}

	async fn run_query(&self, points: QueryPoints, source: Modality) -> Result<Vec<RankedHit>> {
		let response = self.store.client.query(points).await?;

		Ok(collect_hits(&response.result, source))
	}
}

impl VectorBackend for QdrantVectorBackend {
	fn search_fulltext<'a>(
		&'a self,
		query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			let sparse = self.scorer.score(query);

			// Empty corpus or no query terms: no lexical signal, not an
			// error.
			if sparse.is_empty() {
				return Ok(Vec::new());
			}

			let points =
				self.query_points(FULLTEXT_VECTOR_NAME, sparse_input(&sparse), k);

			self.run_query(points, Modality::Fulltext).await
		})
	}

	fn search_semantic<'a>(
		&'a self,
		query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			let vector = self.embed_query(query).await?;
			let points = self.query_points(SEMANTIC_VECTOR_NAME, vector, k);

			self.run_query(points, Modality::Semantic).await
		})
	}

	fn search_image<'a>(
		&'a self,
		image: &'a [u8],
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			let vector = self.embedder.embed_image(image).await?;

			if vector.len() != self.image_dim as usize {
				return Err(Error::Provider(
					"Image embedding vector dimension mismatch.".to_string(),
				));
			}

			let points = self.query_points(IMAGE_VECTOR_NAME, vector, k);

			self.run_query(points, Modality::Image).await
		})
	}

	fn multi_vector_search<'a>(
		&'a self,
		query: &'a str,
		image: Option<&'a [u8]>,
		selection: VectorSelection,
		k: u64,
	) -> BoxFuture<'a, Result<MultiVectorHits>> {
		Box::pin(async move {
			let mut hits = MultiVectorHits::default();
			let mut batch = Vec::new();
			let mut order = Vec::new();

			if selection.fulltext {
				let sparse = self.scorer.score(query);

				if sparse.is_empty() {
					hits.fulltext = Some(Vec::new());
				} else {
					batch.push(self.query_points(
						FULLTEXT_VECTOR_NAME,
						sparse_input(&sparse),
						k,
					));
					order.push(Modality::Fulltext);
				}
			}
			if selection.semantic {
				let vector = self.embed_query(query).await?;

				batch.push(self.query_points(SEMANTIC_VECTOR_NAME, vector, k));
				order.push(Modality::Semantic);
			}
			if selection.image {
				match image {
					Some(image) => {
						let vector = self.embedder.embed_image(image).await?;

						batch.push(self.query_points(IMAGE_VECTOR_NAME, vector, k));
						order.push(Modality::Image);
					},
					// Image modality requested without a payload degrades
					// to an empty list, mirroring the single-call path.
					None => hits.image = Some(Vec::new()),
				}
			}

			if batch.is_empty() {
				return Ok(hits);
			}

			let response = self
				.store
				.client
				.query_batch(QueryBatchPointsBuilder::new(self.store.collection.clone(), batch))
				.await?;

			for (source, result) in order.into_iter().zip(response.result) {
				let collected = collect_hits(&result.result, source);

				match source {
					Modality::Fulltext => hits.fulltext = Some(collected),
					Modality::Semantic => hits.semantic = Some(collected),
					Modality::Image => hits.image = Some(collected),
					Modality::Kg => {},
				}
			}

			Ok(hits)
		})
	}

	fn upsert_documents<'a>(
		&'a self,
		documents: &'a [DocumentRecord],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if documents.is_empty() {
				return Ok(());
			}

			let texts: Vec<String> =
				documents.iter().map(|document| document.text.clone()).collect();
			let dense = self.embedder.embed_text(&texts).await?;

			if dense.len() != documents.len() {
				return Err(Error::Provider(
					"Embedding provider returned mismatched vector count.".to_string(),
				));
			}

			let mut points = Vec::with_capacity(documents.len());

			for (document, dense_vector) in documents.iter().zip(dense) {
				if dense_vector.len() != self.dense_dim as usize {
					return Err(Error::Provider(
						"Embedding vector dimension mismatch.".to_string(),
					));
				}

				let mut vectors = NamedVectors::default()
					.add_vector(SEMANTIC_VECTOR_NAME, Vector::new_dense(dense_vector));

				if !document.sparse.is_empty() {
					vectors = vectors.add_vector(
						FULLTEXT_VECTOR_NAME,
						Vector::new_sparse(
							document.sparse.indices.clone(),
							document.sparse.values.clone(),
						),
					);
				}
				if let Some(image) = document.image.as_deref() {
					let image_vector = self.embedder.embed_image(image).await?;

					if image_vector.len() != self.image_dim as usize {
						return Err(Error::Provider(
							"Image embedding vector dimension mismatch.".to_string(),
						));
					}

					vectors =
						vectors.add_vector(IMAGE_VECTOR_NAME, Vector::new_dense(image_vector));
				}

				let payload: Payload = serde_json::json!({
					"doc_id": document.id,
					"text": document.text,
				})
				.try_into()?;

				points.push(PointStruct::new(point_id(&document.id), vectors, payload));
			}

			self.store
				.client
				.upsert_points(
					UpsertPointsBuilder::new(self.store.collection.clone(), points).wait(true),
				)
				.await?;

			Ok(())
		})
	}

	fn ensure_collection<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			if self.store.client.collection_exists(&self.store.collection).await? {
				return Ok(());
			}

			let mut vectors = VectorsConfigBuilder::default();

			vectors.add_named_vector_params(
				SEMANTIC_VECTOR_NAME,
				VectorParamsBuilder::new(u64::from(self.dense_dim), Distance::Dot),
			);
			vectors.add_named_vector_params(
				IMAGE_VECTOR_NAME,
				VectorParamsBuilder::new(u64::from(self.image_dim), Distance::Dot),
			);

			let mut sparse = SparseVectorsConfigBuilder::default();

			sparse.add_named_vector_params(
				FULLTEXT_VECTOR_NAME,
				SparseVectorParamsBuilder::default(),
			);

			self.store
				.client
				.create_collection(
					CreateCollectionBuilder::new(self.store.collection.clone())
						.vectors_config(vectors)
						.sparse_vectors_config(sparse),
				)
				.await?;

			Ok(())
		})
	}
}

/// Stable point id for a caller-assigned document id; the raw id rides in
/// the payload.
fn point_id(doc_id: &str) -> String {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, doc_id.as_bytes()).to_string()
}

fn sparse_input(sparse: &SparseVector) -> VectorInput {
	VectorInput::new_sparse(sparse.indices.clone(), sparse.values.clone())
}

fn collect_hits(points: &[ScoredPoint], source: Modality) -> Vec<RankedHit> {
	let mut out = Vec::with_capacity(points.len());

	for point in points {
		let Some(doc_id) = payload_string(&point.payload, "doc_id") else {
			tracing::warn!(%source, "Scored point is missing its doc_id payload.");

			continue;
		};

		out.push(RankedHit { doc_id, score: point.score, source });
	}

	out
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}
