use std::time::Duration;

use reqwest::{
	Client,
	header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName},
};
use serde_json::Value;

use prism_config::EmbeddingProviderConfig;

use crate::{BoxFuture, EmbeddingProvider, Error, Result};

/// Text and image embeddings over an OpenAI-style HTTP endpoint. The model
/// itself is an external collaborator; this adapter only moves bytes.
pub struct HttpEmbeddingProvider {
	cfg: EmbeddingProviderConfig,
}
impl HttpEmbeddingProvider {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}

impl EmbeddingProvider for HttpEmbeddingProvider {
	fn embed_text<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(embed_text(&self.cfg, texts))
	}

	fn embed_image<'a>(&'a self, image: &'a [u8]) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(embed_image(&self.cfg, image))
	}
}

pub async fn embed_text(
	cfg: &EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.text_path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client.post(url).headers(auth_headers(cfg)?).json(&body).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(json)
}

pub async fn embed_image(cfg: &EmbeddingProviderConfig, image: &[u8]) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.image_path);
	let mut headers = auth_headers(cfg)?;

	headers.insert(
		CONTENT_TYPE,
		"application/octet-stream"
			.parse()
			.map_err(|_| Error::Provider("Invalid content type header.".to_string()))?,
	);

	let res = client
		.post(url)
		.headers(headers)
		.query(&[("model", cfg.model.as_str())])
		.body(image.to_vec())
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let embedding = json
		.get("embedding")
		.and_then(|value| value.as_array())
		.ok_or_else(|| Error::Provider("Image response is missing embedding array.".to_string()))?;

	parse_vector(embedding)
}

fn auth_headers(cfg: &EmbeddingProviderConfig) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(
		AUTHORIZATION,
		format!("Bearer {}", cfg.api_key)
			.parse()
			.map_err(|_| Error::Provider("Invalid authorization header.".to_string()))?,
	);

	for (key, value) in &cfg.default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::Provider("Default header values must be strings.".to_string()));
		};
		let name = HeaderName::from_bytes(key.as_bytes())
			.map_err(|_| Error::Provider(format!("Invalid header name {key:?}.")))?;

		headers.insert(
			name,
			raw.parse()
				.map_err(|_| Error::Provider(format!("Invalid header value for {key:?}.")))?,
		);
	}

	Ok(headers)
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|value| value.as_array())
		.ok_or_else(|| Error::Provider("Embedding response is missing data array.".to_string()))?;
	let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());

	for (fallback_index, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|value| value.as_u64())
			.map(|value| value as usize)
			.unwrap_or(fallback_index);
		let embedding = item.get("embedding").and_then(|value| value.as_array()).ok_or_else(
			|| Error::Provider("Embedding item is missing its embedding array.".to_string()),
		)?;

		indexed.push((index, parse_vector(embedding)?));
	}

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn parse_vector(values: &[Value]) -> Result<Vec<f32>> {
	let mut vec = Vec::with_capacity(values.len());

	for value in values {
		let number = value
			.as_f64()
			.ok_or_else(|| Error::Provider("Embedding value must be numeric.".to_string()))?;

		vec.push(number as f32);
	}

	Ok(vec)
}
