use std::sync::Arc;

use color_eyre::eyre;

use prism_backend::{
	EmbeddingProvider, GraphBackend, VectorBackend,
	embedding::HttpEmbeddingProvider,
	graph::{MemoryGraphBackend, PostgresGraphBackend},
	qdrant::QdrantVectorBackend,
};
use prism_config::{Config, GRAPH_BACKEND_POSTGRES};
use prism_domain::{Bm25Params, SparseScorer};
use prism_service::SearchService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<SearchService>,
}
impl AppState {
	/// Builds the production collaborators once and hands them to the
	/// orchestrator by reference; their lifecycles end with the process.
	pub async fn new(config: Config) -> color_eyre::Result<Self> {
		let scorer = Arc::new(SparseScorer::new(Bm25Params {
			k1: config.bm25.k1,
			b: config.bm25.b,
			vector_dim: config.bm25.vector_dim,
		}));
		let embedder: Arc<dyn EmbeddingProvider> =
			Arc::new(HttpEmbeddingProvider::new(config.providers.embedding.clone()));
		let vector: Arc<dyn VectorBackend> = Arc::new(QdrantVectorBackend::new(
			&config.storage.qdrant,
			embedder,
			scorer.clone(),
		)?);

		vector.ensure_collection().await?;

		let graph: Arc<dyn GraphBackend> = if config.graph.backend == GRAPH_BACKEND_POSTGRES {
			let Some(pg) = config.graph.postgres.as_ref() else {
				return Err(eyre::eyre!(
					"graph.postgres must be configured for the postgres backend."
				));
			};

			Arc::new(PostgresGraphBackend::connect(pg).await?)
		} else {
			Arc::new(MemoryGraphBackend::new())
		};

		graph.ensure_schema().await?;

		let service = SearchService::new(config, scorer, vector, graph);

		Ok(Self { service: Arc::new(service) })
	}

	/// Wraps an already-assembled service; used by router tests to inject
	/// backend doubles.
	pub fn from_service(service: Arc<SearchService>) -> Self {
		Self { service }
	}
}
