use std::{
	collections::{BTreeMap, HashSet, VecDeque},
	sync::RwLock,
};

use sqlx::{PgPool, Row, postgres::PgPoolOptions};

use prism_domain::{Modality, RankedHit};

use crate::{BoxFuture, GraphBackend, GraphEdgeInput, GraphNodeInput, Result};

#[derive(Debug, Clone, Default)]
struct NodeRecord {
	label: String,
	text: String,
}

#[derive(Debug, Default)]
struct GraphData {
	// BTreeMaps keep entity scans and neighbor expansion deterministic;
	// hash-map iteration order must never reach a response.
	nodes: BTreeMap<String, NodeRecord>,
	adjacency: BTreeMap<String, Vec<(String, String)>>,
}

/// In-process graph variant; undirected, merge-on-insert.
#[derive(Debug, Default)]
pub struct MemoryGraphBackend {
	data: RwLock<GraphData>,
}
impl MemoryGraphBackend {
	pub fn new() -> Self {
		Self::default()
	}

	fn insert_sync(&self, nodes: &[GraphNodeInput], edges: &[GraphEdgeInput]) {
		let mut data = self.data.write().unwrap_or_else(|err| err.into_inner());

		for node in nodes {
			data.nodes.insert(
				node.id.clone(),
				NodeRecord { label: node.label.clone(), text: node.text.clone() },
			);
		}
		for edge in edges {
			for (from, to) in
				[(edge.from.clone(), edge.to.clone()), (edge.to.clone(), edge.from.clone())]
			{
				let neighbors = data.adjacency.entry(from).or_default();
				let entry = (to, edge.relation.clone());

				if !neighbors.contains(&entry) {
					neighbors.push(entry);
				}
			}
		}
	}

	fn search_sync(&self, query: &str, k: u64) -> Vec<RankedHit> {
		let needle = query.to_lowercase();
		let data = self.data.read().unwrap_or_else(|err| err.into_inner());
		let mut out = Vec::new();

		for (node_id, record) in &data.nodes {
			if out.len() as u64 >= k {
				break;
			}
			if record.text.to_lowercase().contains(&needle)
				|| record.label.to_lowercase().contains(&needle)
			{
				out.push(RankedHit { doc_id: node_id.clone(), score: 1.0, source: Modality::Kg });
			}
		}

		out
	}

	fn neighbors_sync(&self, node_id: &str, hops: u32) -> Vec<String> {
		let data = self.data.read().unwrap_or_else(|err| err.into_inner());

		if !data.nodes.contains_key(node_id) && !data.adjacency.contains_key(node_id) {
			return Vec::new();
		}

		let mut visited = HashSet::new();
		let mut queue = VecDeque::new();
		let mut out = Vec::new();

		visited.insert(node_id.to_string());
		queue.push_back((node_id.to_string(), 0_u32));

		while let Some((current, depth)) = queue.pop_front() {
			out.push(current.clone());

			if depth >= hops {
				continue;
			}
			if let Some(neighbors) = data.adjacency.get(&current) {
				for (neighbor, _) in neighbors {
					if visited.insert(neighbor.clone()) {
						queue.push_back((neighbor.clone(), depth + 1));
					}
				}
			}
		}

		out
	}
}

impl GraphBackend for MemoryGraphBackend {
	fn search_entities<'a>(
		&'a self,
		query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move { Ok(self.search_sync(query, k)) })
	}

	fn expand_neighbors<'a>(
		&'a self,
		node_id: &'a str,
		hops: u32,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move { Ok(self.neighbors_sync(node_id, hops)) })
	}

	fn insert_nodes_edges<'a>(
		&'a self,
		nodes: &'a [GraphNodeInput],
		edges: &'a [GraphEdgeInput],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.insert_sync(nodes, edges);

			Ok(())
		})
	}

	fn ensure_schema<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(()) })
	}
}

/// Remote graph variant over Postgres.
pub struct PostgresGraphBackend {
	pool: PgPool,
}
impl PostgresGraphBackend {
	pub async fn connect(cfg: &prism_config::GraphPostgres) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool })
	}
}

impl GraphBackend for PostgresGraphBackend {
	fn search_entities<'a>(
		&'a self,
		query: &'a str,
		k: u64,
	) -> BoxFuture<'a, Result<Vec<RankedHit>>> {
		Box::pin(async move {
			let rows = sqlx::query(
				"\
SELECT node_id
FROM graph_nodes
WHERE text ILIKE '%' || $1 || '%' OR label ILIKE '%' || $1 || '%'
ORDER BY node_id
LIMIT $2",
			)
			.bind(query)
			.bind(k as i64)
			.fetch_all(&self.pool)
			.await?;
			let mut out = Vec::with_capacity(rows.len());

			for row in rows {
				let node_id: String = row.try_get("node_id")?;

				out.push(RankedHit { doc_id: node_id, score: 1.0, source: Modality::Kg });
			}

			Ok(out)
		})
	}

	fn expand_neighbors<'a>(
		&'a self,
		node_id: &'a str,
		hops: u32,
	) -> BoxFuture<'a, Result<Vec<String>>> {
		Box::pin(async move {
			let rows = sqlx::query(
				"\
WITH RECURSIVE frontier (node_id, depth) AS (
	SELECT $1::text, 0
	UNION
	SELECT CASE WHEN e.from_id = f.node_id THEN e.to_id ELSE e.from_id END, f.depth + 1
	FROM graph_edges e
	JOIN frontier f ON e.from_id = f.node_id OR e.to_id = f.node_id
	WHERE f.depth < $2
)
SELECT DISTINCT node_id
FROM frontier
ORDER BY node_id",
			)
			.bind(node_id)
			.bind(i64::from(hops))
			.fetch_all(&self.pool)
			.await?;
			let mut out = Vec::with_capacity(rows.len());

			for row in rows {
				out.push(row.try_get("node_id")?);
			}

			Ok(out)
		})
	}

	fn insert_nodes_edges<'a>(
		&'a self,
		nodes: &'a [GraphNodeInput],
		edges: &'a [GraphEdgeInput],
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let mut tx = self.pool.begin().await?;

			for node in nodes {
				sqlx::query(
					"\
INSERT INTO graph_nodes (node_id, label, text)
VALUES ($1, $2, $3)
ON CONFLICT (node_id) DO UPDATE SET label = EXCLUDED.label, text = EXCLUDED.text",
				)
				.bind(&node.id)
				.bind(&node.label)
				.bind(&node.text)
				.execute(&mut *tx)
				.await?;
			}
			for edge in edges {
				sqlx::query(
					"\
INSERT INTO graph_edges (from_id, to_id, relation)
VALUES ($1, $2, $3)
ON CONFLICT (from_id, to_id, relation) DO NOTHING",
				)
				.bind(&edge.from)
				.bind(&edge.to)
				.bind(&edge.relation)
				.execute(&mut *tx)
				.await?;
			}

			tx.commit().await?;

			Ok(())
		})
	}

	fn ensure_schema<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			sqlx::query(
				"\
CREATE TABLE IF NOT EXISTS graph_nodes (
	node_id TEXT PRIMARY KEY,
	label   TEXT NOT NULL DEFAULT '',
	text    TEXT NOT NULL DEFAULT ''
)",
			)
			.execute(&self.pool)
			.await?;
			sqlx::query(
				"\
CREATE TABLE IF NOT EXISTS graph_edges (
	from_id  TEXT NOT NULL,
	to_id    TEXT NOT NULL,
	relation TEXT NOT NULL DEFAULT '',
	PRIMARY KEY (from_id, to_id, relation)
)",
			)
			.execute(&self.pool)
			.await?;

			Ok(())
		})
	}
}
