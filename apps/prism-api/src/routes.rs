use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use prism_service::{
	Error as ServiceError, GraphInsertRequest, GraphInsertResponse, IngestRequest, IngestResponse,
	NeighborsRequest, NeighborsResponse, SearchRequest, SearchResponse,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.route("/v1/ingest", post(ingest))
		.route("/v1/graph/insert", post(graph_insert))
		.route("/v1/graph/neighbors", post(graph_neighbors))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

async fn ingest(
	State(state): State<AppState>,
	Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
	let response = state.service.ingest(payload).await?;

	Ok(Json(response))
}

async fn graph_insert(
	State(state): State<AppState>,
	Json(payload): Json<GraphInsertRequest>,
) -> Result<Json<GraphInsertResponse>, ApiError> {
	let response = state.service.insert_graph(payload).await?;

	Ok(Json(response))
}

async fn graph_neighbors(
	State(state): State<AppState>,
	Json(payload): Json<NeighborsRequest>,
) -> Result<Json<NeighborsResponse>, ApiError> {
	let response = state.service.neighbors(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let (status, error_code) = match &err {
			ServiceError::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			ServiceError::BackendUnavailable { .. } =>
				(StatusCode::BAD_GATEWAY, "backend_unavailable"),
		};

		Self { status, error_code: error_code.to_string(), message: err.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
