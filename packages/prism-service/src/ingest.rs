use std::collections::HashSet;

use prism_backend::{DocumentRecord, GraphEdgeInput, GraphNodeInput};

use crate::{Error, Result, SearchService};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentInput {
	/// Caller-assigned, unique within the corpus. Documents are append-only
	/// and never mutated after insertion.
	pub id: String,
	pub text: String,
	#[serde(default)]
	pub image: Option<Vec<u8>>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestRequest {
	pub documents: Vec<DocumentInput>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IngestResponse {
	pub ingested: usize,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GraphInsertRequest {
	#[serde(default)]
	pub nodes: Vec<GraphNodeInput>,
	#[serde(default)]
	pub edges: Vec<GraphEdgeInput>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphInsertResponse {
	pub nodes: usize,
	pub edges: usize,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NeighborsRequest {
	pub node_id: String,
	#[serde(default = "default_hops")]
	pub hops: u32,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NeighborsResponse {
	pub node_ids: Vec<String>,
}

fn default_hops() -> u32 {
	1
}

impl SearchService {
	/// Feeds a document batch into the corpus statistics and the vector
	/// store.
	///
	/// Corpus counts are folded in completely before the first backend
	/// await, so cancelling the request mid-upsert can never leave them
	/// half-applied. The statistics are not idempotent — re-ingesting an
	/// unchanged batch doubles its counts.
	pub async fn ingest(&self, req: IngestRequest) -> Result<IngestResponse> {
		if req.documents.is_empty() {
			return Err(Error::invalid("documents must be non-empty."));
		}

		let mut seen = HashSet::new();

		for document in &req.documents {
			if document.id.trim().is_empty() {
				return Err(Error::invalid("document ids must be non-empty."));
			}
			if !seen.insert(document.id.as_str()) {
				return Err(Error::invalid(format!("Duplicate document id {:?}.", document.id)));
			}
		}

		let texts: Vec<String> =
			req.documents.iter().map(|document| document.text.clone()).collect();

		self.scorer.observe(&texts);

		let records: Vec<DocumentRecord> = req
			.documents
			.into_iter()
			.map(|document| {
				let sparse = self.scorer.score(&document.text);

				DocumentRecord { id: document.id, text: document.text, image: document.image, sparse }
			})
			.collect();

		self.vector
			.upsert_documents(&records)
			.await
			.map_err(|err| Error::backend("vector", err))?;

		tracing::info!(documents = records.len(), "Ingest complete.");

		Ok(IngestResponse { ingested: records.len() })
	}

	pub async fn insert_graph(&self, req: GraphInsertRequest) -> Result<GraphInsertResponse> {
		if req.nodes.is_empty() && req.edges.is_empty() {
			return Err(Error::invalid("nodes or edges must be non-empty."));
		}

		for node in &req.nodes {
			if node.id.trim().is_empty() {
				return Err(Error::invalid("graph node ids must be non-empty."));
			}
		}
		for edge in &req.edges {
			if edge.from.trim().is_empty() || edge.to.trim().is_empty() {
				return Err(Error::invalid("graph edge endpoints must be non-empty."));
			}
		}

		self.graph
			.insert_nodes_edges(&req.nodes, &req.edges)
			.await
			.map_err(|err| Error::backend("kg", err))?;

		tracing::info!(nodes = req.nodes.len(), edges = req.edges.len(), "Graph insert complete.");

		Ok(GraphInsertResponse { nodes: req.nodes.len(), edges: req.edges.len() })
	}

	pub async fn neighbors(&self, req: NeighborsRequest) -> Result<NeighborsResponse> {
		if req.node_id.trim().is_empty() {
			return Err(Error::invalid("node_id must be non-empty."));
		}

		let node_ids = self
			.graph
			.expand_neighbors(&req.node_id, req.hops)
			.await
			.map_err(|err| Error::backend("kg", err))?;

		Ok(NeighborsResponse { node_ids })
	}
}
