pub mod ingest;
pub mod search;

mod error;

pub use error::{Error, Result};
pub use ingest::{
	DocumentInput, GraphInsertRequest, GraphInsertResponse, IngestRequest, IngestResponse,
	NeighborsRequest, NeighborsResponse,
};
pub use search::{Method, SearchHit, SearchRequest, SearchResponse};

use std::sync::Arc;

use prism_backend::{GraphBackend, VectorBackend};
use prism_config::Config;
use prism_domain::SparseScorer;

/// Top-level orchestrator. Holds one shared handle per collaborator,
/// constructed once at process start and passed in by the owning process;
/// connect/close lifecycles stay outside the core.
pub struct SearchService {
	pub cfg: Config,
	pub scorer: Arc<SparseScorer>,
	pub vector: Arc<dyn VectorBackend>,
	pub graph: Arc<dyn GraphBackend>,
}
impl SearchService {
	pub fn new(
		cfg: Config,
		scorer: Arc<SparseScorer>,
		vector: Arc<dyn VectorBackend>,
		graph: Arc<dyn GraphBackend>,
	) -> Self {
		Self { cfg, scorer, vector, graph }
	}
}
