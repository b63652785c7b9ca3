mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Bm25, Config, EmbeddingProviderConfig, Graph, GraphPostgres, Providers, Qdrant, Search,
	Service, Storage,
};

use std::{fs, path::Path};

pub const GRAPH_BACKEND_MEMORY: &str = "memory";
pub const GRAPH_BACKEND_POSTGRES: &str = "postgres";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.search.default_top_k < 1 {
		return Err(Error::Validation {
			message: "search.default_top_k must be at least one.".to_string(),
		});
	}
	if cfg.search.rrf_k == 0 {
		return Err(Error::Validation {
			message: "search.rrf_k must be greater than zero.".to_string(),
		});
	}
	if !cfg.bm25.k1.is_finite() || cfg.bm25.k1 <= 0.0 {
		return Err(Error::Validation {
			message: "bm25.k1 must be a positive finite number.".to_string(),
		});
	}
	if !cfg.bm25.b.is_finite() || !(0.0..=1.0).contains(&cfg.bm25.b) {
		return Err(Error::Validation {
			message: "bm25.b must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.bm25.vector_dim == 0 {
		return Err(Error::Validation {
			message: "bm25.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.dense_dim == 0 || cfg.storage.qdrant.image_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant dense_dim and image_dim must be greater than zero."
				.to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.dense_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.dense_dim."
				.to_string(),
		});
	}

	match cfg.graph.backend.as_str() {
		GRAPH_BACKEND_MEMORY => {},
		GRAPH_BACKEND_POSTGRES =>
			if cfg.graph.postgres.as_ref().map(|pg| pg.dsn.trim().is_empty()).unwrap_or(true) {
				return Err(Error::Validation {
					message: "graph.postgres.dsn must be set when graph.backend is postgres."
						.to_string(),
				});
			},
		other =>
			return Err(Error::Validation {
				message: format!("graph.backend must be memory or postgres, got {other:?}."),
			}),
	}

	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.graph
		.postgres
		.as_ref()
		.map(|pg| pg.dsn.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.graph.postgres = None;
	}
}
