//! Backend doubles for orchestrator and router tests: scripted hit lists,
//! call counters, and a stall probe for exercising cancellation.

use std::sync::{
	Arc, Mutex,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};

use tokio::sync::Notify;

use prism_backend::{
	BoxFuture, DocumentRecord, EmbeddingProvider, Error, GraphBackend, GraphEdgeInput,
	GraphNodeInput, MultiVectorHits, Result, VectorBackend, VectorSelection,
};
use prism_domain::{Modality, RankedHit};

pub fn hit(doc_id: &str, score: f32, source: Modality) -> RankedHit {
	RankedHit { doc_id: doc_id.to_string(), score, source }
}

/// Observes whether a stalled backend call was released or dropped
/// mid-flight.
#[derive(Debug, Default)]
pub struct StallProbe {
	started: Notify,
	release: Notify,
	pub cancelled: AtomicBool,
	pub completed: AtomicBool,
}
impl StallProbe {
	/// Resolves once the backend call has begun; a permit is stored if the
	/// call started first.
	pub async fn wait_until_started(&self) {
		self.started.notified().await;
	}

	/// Lets the stalled call run to completion.
	pub fn release(&self) {
		self.release.notify_one();
	}
}

async fn park(probe: Arc<StallProbe>) {
	let guard = CancelGuard { probe: probe.clone() };

	probe.started.notify_one();
	probe.release.notified().await;
	probe.completed.store(true, Ordering::SeqCst);

	drop(guard);
}

struct CancelGuard {
	probe: Arc<StallProbe>,
}
impl Drop for CancelGuard {
	fn drop(&mut self) {
		if !self.probe.completed.load(Ordering::SeqCst) {
			self.probe.cancelled.store(true, Ordering::SeqCst);
		}
	}
}

/// Scripted vector backend: fixed hit lists, per-method call counters, an
/// optional failure, an optional stall probe.
#[derive(Default)]
pub struct ScriptedVectorBackend {
	pub fulltext: Vec<RankedHit>,
	pub semantic: Vec<RankedHit>,
	pub image: Vec<RankedHit>,
	fail: Option<String>,
	stall: Option<Arc<StallProbe>>,
	pub fulltext_calls: AtomicUsize,
	pub semantic_calls: AtomicUsize,
	pub image_calls: AtomicUsize,
	pub multi_calls: AtomicUsize,
	pub upsert_calls: AtomicUsize,
	pub upserted: Mutex<Vec<DocumentRecord>>,
	pub last_selection: Mutex<Option<VectorSelection>>,
	pub last_image_bytes: Mutex<Option<usize>>,
}
impl ScriptedVectorBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_hits(
		fulltext: Vec<RankedHit>,
		semantic: Vec<RankedHit>,
		image: Vec<RankedHit>,
	) -> Self {
		Self { fulltext, semantic, image, ..Self::default() }
	}

	pub fn failing(message: &str) -> Self {
		Self { fail: Some(message.to_string()), ..Self::default() }
	}

	pub fn stalled() -> (Self, Arc<StallProbe>) {
		let probe = Arc::new(StallProbe::default());
		let backend = Self { stall: Some(probe.clone()), ..Self::default() };

		(backend, probe)
	}

	async fn gate(&self) -> Result<()> {
		if let Some(probe) = &self.stall {
			park(probe.clone()).await;
		}
		if let Some(message) = &self.fail {
			return Err(Error::Provider(message.clone()));
		}

		Ok(())
	}

	fn clip(hits: &[RankedHit], k: u64) -> Vec<RankedHit> {
		hits.iter().take(k as usize).cloned().collect()
	}
}

impl VectorBackend for ScriptedVectorBackend {
	fn search_fulltext<'a>(
		&'a self,
		_query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			self.fulltext_calls.fetch_add(1, Ordering::SeqCst);
			self.gate().await?;

			Ok(Self::clip(&self.fulltext, k))
		})
	}

	fn search_semantic<'a>(
		&'a self,
		_query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			self.semantic_calls.fetch_add(1, Ordering::SeqCst);
			self.gate().await?;

			Ok(Self::clip(&self.semantic, k))
		})
	}

	fn search_image<'a>(
		&'a self,
		image: &'a [u8],
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			self.image_calls.fetch_add(1, Ordering::SeqCst);
			*self.last_image_bytes.lock().unwrap_or_else(|err| err.into_inner()) =
				Some(image.len());
			self.gate().await?;

			Ok(Self::clip(&self.image, k))
		})
	}

	fn multi_vector_search<'a>(
		&'a self,
		_query: &'a str,
		image: Option<&'a [u8]>,
		selection: VectorSelection,
		k: u64,
	) -> BoxFuture<'a, Result<MultiVectorHits>> {
		Box::pin(async move {
			self.multi_calls.fetch_add(1, Ordering::SeqCst);
			*self.last_selection.lock().unwrap_or_else(|err| err.into_inner()) = Some(selection);
			*self.last_image_bytes.lock().unwrap_or_else(|err| err.into_inner()) =
				image.map(<[u8]>::len);
			self.gate().await?;

			Ok(MultiVectorHits {
				fulltext: selection.fulltext.then(|| Self::clip(&self.fulltext, k)),
				semantic: selection.semantic.then(|| Self::clip(&self.semantic, k)),
				image: selection.image.then(|| {
					if image.is_some() { Self::clip(&self.image, k) } else { Vec::new() }
				}),
			})
		})
	}

	fn upsert_documents<'a>(
		&'a self,
		documents: &'a [DocumentRecord],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.upsert_calls.fetch_add(1, Ordering::SeqCst);
			self.gate().await?;
			self.upserted
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.extend(documents.iter().cloned());

			Ok(())
		})
	}

	fn ensure_collection<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(()) })
	}
}

/// Scripted graph backend with the same shape as the vector double.
#[derive(Default)]
pub struct ScriptedGraphBackend {
	pub entities: Vec<RankedHit>,
	pub neighbors: Vec<String>,
	fail: Option<String>,
	stall: Option<Arc<StallProbe>>,
	pub entity_calls: AtomicUsize,
	pub neighbor_calls: AtomicUsize,
	pub insert_calls: AtomicUsize,
	pub inserted_nodes: Mutex<Vec<GraphNodeInput>>,
	pub inserted_edges: Mutex<Vec<GraphEdgeInput>>,
}
impl ScriptedGraphBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_entities(entities: Vec<RankedHit>) -> Self {
		Self { entities, ..Self::default() }
	}

	pub fn with_neighbors(neighbors: Vec<String>) -> Self {
		Self { neighbors, ..Self::default() }
	}

	pub fn failing(message: &str) -> Self {
		Self { fail: Some(message.to_string()), ..Self::default() }
	}

	pub fn stalled() -> (Self, Arc<StallProbe>) {
		let probe = Arc::new(StallProbe::default());
		let backend = Self { stall: Some(probe.clone()), ..Self::default() };

		(backend, probe)
	}

	async fn gate(&self) -> Result<()> {
		if let Some(probe) = &self.stall {
			park(probe.clone()).await;
		}
		if let Some(message) = &self.fail {
			return Err(Error::Provider(message.clone()));
		}

		Ok(())
	}
}

impl GraphBackend for ScriptedGraphBackend {
	fn search_entities<'a>(
		&'a self,
		_query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			self.entity_calls.fetch_add(1, Ordering::SeqCst);
			self.gate().await?;

			Ok(self.entities.iter().take(k as usize).cloned().collect())
		})
	}

	fn expand_neighbors<'a>(
		&'a self,
		_node_id: &'a str,
		_hops: u32,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			self.neighbor_calls.fetch_add(1, Ordering::SeqCst);
			self.gate().await?;

			Ok(self.neighbors.clone())
		})
	}

	fn insert_nodes_edges<'a>(
		&'a self,
		nodes: &'a [GraphNodeInput],
		edges: &'a [GraphEdgeInput],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.insert_calls.fetch_add(1, Ordering::SeqCst);
			self.gate().await?;
			self.inserted_nodes
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.extend(nodes.iter().cloned());
			self.inserted_edges
				.lock()
				.unwrap_or_else(|err| err.into_inner())
				.extend(edges.iter().cloned());

			Ok(())
		})
	}

	fn ensure_schema<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(()) })
	}
}

/// Deterministic embedding double; vectors carry the requested dimension
/// so dimension checks in adapters stay exercised.
pub struct FixedEmbeddingProvider {
	pub dimensions: usize,
}
impl EmbeddingProvider for FixedEmbeddingProvider {
	fn embed_text<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let vec = vec![0.0; self.dimensions];

		Box::pin(async move { Ok(vec![vec; texts.len()]) })
	}

	fn embed_image<'a>(&'a self, _image: &'a [u8]) -> BoxFuture<'a, Result<Vec<f32>>> {
		let vec = vec![0.0; self.dimensions];

		Box::pin(async move { Ok(vec) })
	}
}
