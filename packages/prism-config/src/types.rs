use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub search: Search,
	pub bm25: Bm25,
	pub storage: Storage,
	pub graph: Graph,
	pub providers: Providers,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	/// Per-method result count when a request leaves `top_k` unset.
	#[serde(default = "default_top_k")]
	pub default_top_k: i64,
	/// RRF smoothing constant; higher damps low-rank contributions.
	#[serde(default = "default_rrf_k")]
	pub rrf_k: u32,
	/// When true a failed modality yields an empty, annotated list instead
	/// of failing the whole request.
	#[serde(default)]
	pub degraded: bool,
}

#[derive(Debug, Deserialize)]
pub struct Bm25 {
	#[serde(default = "default_k1")]
	pub k1: f32,
	#[serde(default = "default_b")]
	pub b: f32,
	#[serde(default = "default_vector_dim")]
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub dense_dim: u32,
	pub image_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Graph {
	/// "memory" or "postgres"; picked once at startup, the orchestrator
	/// never learns which.
	pub backend: String,
	pub postgres: Option<GraphPostgres>,
}

#[derive(Debug, Deserialize)]
pub struct GraphPostgres {
	pub dsn: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub text_path: String,
	pub image_path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

fn default_top_k() -> i64 {
	5
}

fn default_rrf_k() -> u32 {
	60
}

fn default_k1() -> f32 {
	1.2
}

fn default_b() -> f32 {
	0.75
}

fn default_vector_dim() -> u32 {
	384
}

fn default_pool_max_conns() -> u32 {
	5
}
