pub mod embedding;
pub mod graph;
pub mod qdrant;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin};

use prism_domain::{RankedHit, SparseVector};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Which vector sub-modalities a combined backend call must cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorSelection {
	pub fulltext: bool,
	pub semantic: bool,
	pub image: bool,
}
impl VectorSelection {
	pub fn count(self) -> usize {
		usize::from(self.fulltext) + usize::from(self.semantic) + usize::from(self.image)
	}
}

/// Per-modality result lists of a combined call; only the requested
/// sub-keys are populated.
#[derive(Debug, Clone, Default)]
pub struct MultiVectorHits {
	pub fulltext: Option<Vec<RankedHit>>,
	pub semantic: Option<Vec<RankedHit>>,
	pub image: Option<Vec<RankedHit>>,
}

/// A document ready for vector-store upsert. The sparse lexical vector is
/// computed by the ingest pipeline before the backend is involved.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
	pub id: String,
	pub text: String,
	pub image: Option<Vec<u8>>,
	pub sparse: SparseVector,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphNodeInput {
	pub id: String,
	#[serde(default)]
	pub label: String,
	#[serde(default)]
	pub text: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphEdgeInput {
	pub from: String,
	pub to: String,
	#[serde(default)]
	pub relation: String,
}

/// Vector-store collaborator. The orchestrator only sees this trait; the
/// production implementation lives in [`qdrant`].
pub trait VectorBackend
where
	Self: Send + Sync,
{
	fn search_fulltext<'a>(
		&'a self,
		query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>>;

	fn search_semantic<'a>(
		&'a self,
		query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>>;

	fn search_image<'a>(
		&'a self,
		image: &'a [u8],
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>>;

	/// One round trip covering every selected sub-modality.
	fn multi_vector_search<'a>(
		&'a self,
		query: &'a str,
		image: Option<&'a [u8]>,
		selection: VectorSelection,
		k: u64,
	) -> BoxFuture<'a, Result<MultiVectorHits>>;

	fn upsert_documents<'a>(
		&'a self,
		documents: &'a [DocumentRecord],
	) -> BoxFuture<'a, Result<()>>;

	fn ensure_collection<'a>(&'a self) -> BoxFuture<'a, Result<()>>;
}

/// Knowledge-graph collaborator; in-memory and Postgres variants are picked
/// once at construction.
pub trait GraphBackend
where
	Self: Send + Sync,
{
	fn search_entities<'a>(
		&'a self,
		query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>>;

	/// Node identifiers reachable within `hops` edges, the start node
	/// included. Not on the search hot path.
	fn expand_neighbors<'a>(
		&'a self,
		node_id: &'a str,
		hops: u32,
	) -> BoxFuture<'a, Result<Vec<String>>>;

	/// Merge-upserts nodes and edges; repeated inserts are idempotent.
	fn insert_nodes_edges<'a>(
		&'a self,
		nodes: &'a [GraphNodeInput],
		edges: &'a [GraphEdgeInput],
	) -> BoxFuture<'a, Result<()>>;

	fn ensure_schema<'a>(&'a self) -> BoxFuture<'a, Result<()>>;
}

/// Embedding-model collaborator; the core never computes embeddings.
pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed_text<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;

	fn embed_image<'a>(&'a self, image: &'a [u8]) -> BoxFuture<'a, Result<Vec<f32>>>;
}
