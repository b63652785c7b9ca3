use std::sync::{Arc, atomic::Ordering};

use prism_config::{
	Bm25, Config, EmbeddingProviderConfig, Graph, Providers, Qdrant, Search, Service, Storage,
};
use prism_domain::{Bm25Params, Modality, SparseScorer};
use prism_service::{Error, Method, SearchRequest, SearchService};
use prism_testkit::{ScriptedGraphBackend, ScriptedVectorBackend, hit};

fn test_config(degraded: bool) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "info".to_string(),
		},
		search: Search { default_top_k: 5, rrf_k: 60, degraded },
		bm25: Bm25 { k1: 1.2, b: 0.75, vector_dim: 384 },
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "prism_test".to_string(),
				dense_dim: 384,
				image_dim: 512,
			},
		},
		graph: Graph { backend: "memory".to_string(), postgres: None },
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				api_base: "http://127.0.0.1:1".to_string(),
				api_key: "test-key".to_string(),
				text_path: "/v1/embeddings".to_string(),
				image_path: "/v1/image-embeddings".to_string(),
				model: "test".to_string(),
				dimensions: 384,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
		},
	}
}

fn service(
	vector: ScriptedVectorBackend,
	graph: ScriptedGraphBackend,
	degraded: bool,
) -> (SearchService, Arc<ScriptedVectorBackend>, Arc<ScriptedGraphBackend>) {
	let vector = Arc::new(vector);
	let graph = Arc::new(graph);
	let scorer = Arc::new(SparseScorer::new(Bm25Params::default()));
	let service =
		SearchService::new(test_config(degraded), scorer, vector.clone(), graph.clone());

	(service, vector, graph)
}

fn request(methods: Option<&str>) -> SearchRequest {
	SearchRequest {
		query: "rust retrieval".to_string(),
		image: None,
		methods: methods.map(str::to_string),
		top_k: None,
	}
}

#[tokio::test]
async fn multiple_vector_methods_issue_one_combined_call() {
	let (service, vector, graph) = service(
		ScriptedVectorBackend::with_hits(
			Vec::new(),
			vec![hit("s-1", 0.9, Modality::Semantic)],
			vec![hit("i-1", 0.8, Modality::Image)],
		),
		ScriptedGraphBackend::new(),
		false,
	);
	let response = service
		.search(SearchRequest {
			image: Some(vec![1, 2, 3]),
			..request(Some("semantic,image"))
		})
		.await
		.expect("search must succeed");

	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 1);
	assert_eq!(vector.fulltext_calls.load(Ordering::SeqCst), 0);
	assert_eq!(vector.semantic_calls.load(Ordering::SeqCst), 0);
	assert_eq!(vector.image_calls.load(Ordering::SeqCst), 0);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 0);

	let selection = vector
		.last_selection
		.lock()
		.expect("selection must be recorded")
		.expect("combined call must record its selection");

	assert!(!selection.fulltext);
	assert!(selection.semantic);
	assert!(selection.image);

	assert!(response.fulltext.is_none());
	assert_eq!(response.semantic.expect("semantic requested").len(), 1);
	assert_eq!(response.image.expect("image requested").len(), 1);
	assert!(response.kg.is_none());
	assert!(response.fused.is_none());
}

#[tokio::test]
async fn single_vector_method_issues_one_individual_call() {
	let (service, vector, graph) = service(
		ScriptedVectorBackend::with_hits(
			Vec::new(),
			vec![hit("s-1", 0.9, Modality::Semantic)],
			Vec::new(),
		),
		ScriptedGraphBackend::new(),
		false,
	);
	let response = service.search(request(Some("semantic"))).await.expect("search must succeed");

	assert_eq!(vector.semantic_calls.load(Ordering::SeqCst), 1);
	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 0);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 0);
	assert_eq!(response.semantic.expect("semantic requested").len(), 1);
}

#[tokio::test]
async fn kg_only_issues_one_graph_call_and_no_vector_calls() {
	let (service, vector, graph) = service(
		ScriptedVectorBackend::new(),
		ScriptedGraphBackend::with_entities(vec![hit("node-1", 1.0, Modality::Kg)]),
		false,
	);
	let response = service.search(request(Some("kg"))).await.expect("search must succeed");

	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 1);
	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 0);
	assert_eq!(vector.fulltext_calls.load(Ordering::SeqCst), 0);
	assert_eq!(vector.semantic_calls.load(Ordering::SeqCst), 0);
	assert_eq!(vector.image_calls.load(Ordering::SeqCst), 0);
	assert_eq!(response.kg.expect("kg requested").len(), 1);
	assert!(response.semantic.is_none());
}

#[tokio::test]
async fn default_method_set_runs_combined_vector_and_graph_calls() {
	let (service, vector, graph) = service(
		ScriptedVectorBackend::with_hits(
			vec![hit("f-1", 2.0, Modality::Fulltext)],
			vec![hit("s-1", 0.9, Modality::Semantic)],
			vec![hit("i-1", 0.8, Modality::Image)],
		),
		ScriptedGraphBackend::with_entities(vec![hit("node-1", 1.0, Modality::Kg)]),
		false,
	);
	let response = service.search(request(None)).await.expect("search must succeed");

	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 1);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 1);
	assert!(response.fulltext.is_some());
	assert!(response.semantic.is_some());
	// No payload was supplied, so the image list is present but empty.
	assert_eq!(response.image.expect("image requested"), Vec::new());
	assert!(response.kg.is_some());
	assert!(response.fused.is_some());
}

#[tokio::test]
async fn image_payload_is_dropped_when_image_is_not_requested() {
	let (service, vector, _graph) = service(
		ScriptedVectorBackend::with_hits(
			vec![hit("f-1", 2.0, Modality::Fulltext)],
			vec![hit("s-1", 0.9, Modality::Semantic)],
			Vec::new(),
		),
		ScriptedGraphBackend::new(),
		false,
	);
	let response = service
		.search(SearchRequest {
			image: Some(vec![9; 128]),
			..request(Some("fulltext,semantic"))
		})
		.await
		.expect("search must succeed");

	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 1);
	// The payload never reached the backend.
	assert_eq!(*vector.last_image_bytes.lock().expect("probe lock"), None);
	assert!(response.image.is_none());
}

#[tokio::test]
async fn empty_method_list_issues_no_backend_calls() {
	let (service, vector, graph) =
		service(ScriptedVectorBackend::new(), ScriptedGraphBackend::new(), false);
	let response = service.search(request(Some(" , "))).await.expect("search must succeed");

	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 0);
	assert_eq!(vector.fulltext_calls.load(Ordering::SeqCst), 0);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 0);
	assert_eq!(serde_json::to_value(&response).expect("serialize"), serde_json::json!({}));
}

#[tokio::test]
async fn fused_alone_runs_fusion_over_empty_lists() {
	let (service, vector, graph) =
		service(ScriptedVectorBackend::new(), ScriptedGraphBackend::new(), false);
	let response = service.search(request(Some("fused"))).await.expect("search must succeed");

	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 0);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 0);
	assert_eq!(response.fused.expect("fused requested"), Vec::new());
}

#[tokio::test]
async fn rejects_empty_query_before_any_backend_call() {
	let (service, vector, graph) =
		service(ScriptedVectorBackend::new(), ScriptedGraphBackend::new(), false);
	let err = service
		.search(SearchRequest { query: "  ".to_string(), ..request(None) })
		.await
		.expect_err("blank query must be rejected");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 0);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejects_non_positive_top_k() {
	let (service, vector, _graph) =
		service(ScriptedVectorBackend::new(), ScriptedGraphBackend::new(), false);

	for top_k in [0, -3] {
		let err = service
			.search(SearchRequest { top_k: Some(top_k), ..request(None) })
			.await
			.expect_err("non-positive top_k must be rejected");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	assert_eq!(vector.multi_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejects_unknown_method_names_before_fan_out() {
	let (service, vector, graph) =
		service(ScriptedVectorBackend::new(), ScriptedGraphBackend::new(), false);
	let err = service
		.search(request(Some("semantic,telepathy")))
		.await
		.expect_err("unknown method must be rejected");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(err.to_string().contains("telepathy"));
	assert_eq!(vector.semantic_calls.load(Ordering::SeqCst), 0);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn top_k_bounds_every_modality_list() {
	let (service, _vector, _graph) = service(
		ScriptedVectorBackend::with_hits(
			vec![
				hit("f-1", 3.0, Modality::Fulltext),
				hit("f-2", 2.0, Modality::Fulltext),
				hit("f-3", 1.0, Modality::Fulltext),
			],
			Vec::new(),
			Vec::new(),
		),
		ScriptedGraphBackend::new(),
		false,
	);
	let response = service
		.search(SearchRequest { top_k: Some(2), ..request(Some("fulltext")) })
		.await
		.expect("search must succeed");

	assert_eq!(response.fulltext.expect("fulltext requested").len(), 2);
}

#[tokio::test]
async fn fused_ranking_matches_the_worked_example() {
	let (service, _vector, _graph) = service(
		ScriptedVectorBackend::with_hits(
			vec![
				hit("A", 3.0, Modality::Fulltext),
				hit("B", 2.0, Modality::Fulltext),
				hit("C", 1.0, Modality::Fulltext),
			],
			vec![
				hit("B", 0.9, Modality::Semantic),
				hit("A", 0.8, Modality::Semantic),
				hit("D", 0.7, Modality::Semantic),
			],
			Vec::new(),
		),
		ScriptedGraphBackend::new(),
		false,
	);
	let response = service
		.search(request(Some("fulltext,semantic,fused")))
		.await
		.expect("search must succeed");
	let fused = response.fused.expect("fused requested");
	let order: Vec<&str> = fused.iter().map(|hit| hit.doc_id.as_str()).collect();

	assert_eq!(order, vec!["A", "B", "C", "D"]);
	assert!(response.kg.is_none());
	assert!(response.image.is_none());
}

#[tokio::test]
async fn fail_fast_reports_the_failing_modality() {
	let (service, _vector, _graph) = service(
		ScriptedVectorBackend::new(),
		ScriptedGraphBackend::failing("graph store is down"),
		false,
	);
	let err = service.search(request(None)).await.expect_err("kg failure must fail the request");

	match err {
		Error::BackendUnavailable { modality, message } => {
			assert_eq!(modality, "kg");
			assert!(message.contains("graph store is down"));
		},
		other => panic!("expected BackendUnavailable, got {other:?}"),
	}
}

#[tokio::test]
async fn fail_fast_names_the_single_vector_modality() {
	let (service, _vector, _graph) = service(
		ScriptedVectorBackend::failing("vector store is down"),
		ScriptedGraphBackend::new(),
		false,
	);
	let err = service
		.search(request(Some("semantic")))
		.await
		.expect_err("vector failure must fail the request");

	match err {
		Error::BackendUnavailable { modality, .. } => assert_eq!(modality, "semantic"),
		other => panic!("expected BackendUnavailable, got {other:?}"),
	}
}

#[tokio::test]
async fn degraded_mode_annotates_the_failed_modality() {
	let (service, _vector, _graph) = service(
		ScriptedVectorBackend::with_hits(
			Vec::new(),
			vec![hit("s-1", 0.9, Modality::Semantic)],
			Vec::new(),
		),
		ScriptedGraphBackend::failing("graph store is down"),
		true,
	);
	let response = service
		.search(request(Some("semantic,kg,fused")))
		.await
		.expect("degraded search must succeed");

	assert_eq!(response.degraded, vec!["kg".to_string()]);
	assert_eq!(response.kg.expect("kg requested"), Vec::new());

	let semantic = response.semantic.expect("semantic requested");

	assert_eq!(semantic.len(), 1);

	// Fusion still runs over the surviving lists.
	let fused = response.fused.expect("fused requested");

	assert_eq!(fused.len(), 1);
	assert_eq!(fused[0].doc_id, "s-1");
}

#[tokio::test]
async fn degraded_mode_annotates_every_requested_vector_modality() {
	let (service, _vector, _graph) = service(
		ScriptedVectorBackend::failing("vector store is down"),
		ScriptedGraphBackend::with_entities(vec![hit("node-1", 1.0, Modality::Kg)]),
		true,
	);
	let response = service
		.search(request(Some("fulltext,semantic,kg")))
		.await
		.expect("degraded search must succeed");

	assert_eq!(response.degraded, vec!["fulltext".to_string(), "semantic".to_string()]);
	assert_eq!(response.fulltext.expect("fulltext requested"), Vec::new());
	assert_eq!(response.semantic.expect("semantic requested"), Vec::new());
	assert_eq!(response.kg.expect("kg requested").len(), 1);
}

#[tokio::test]
async fn cancellation_drops_in_flight_calls_without_fusing_or_corrupting_stats() {
	let (vector, probe) = ScriptedVectorBackend::stalled();
	let (service, _vector, graph) =
		service(vector, ScriptedGraphBackend::with_entities(Vec::new()), false);
	let service = Arc::new(service);
	let handle = tokio::spawn({
		let service = service.clone();

		async move { service.search(request(Some("fulltext,semantic,fused"))).await }
	});

	probe.wait_until_started().await;
	handle.abort();

	let joined = handle.await;

	assert!(joined.expect_err("task must be aborted").is_cancelled());
	// The in-flight vector call was dropped, not completed, so no fused
	// result was ever assembled.
	assert!(probe.cancelled.load(Ordering::SeqCst));
	assert!(!probe.completed.load(Ordering::SeqCst));
	// Search paths never touch the corpus statistics.
	assert_eq!(service.scorer.total_docs(), 0);
	assert_eq!(graph.entity_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn released_stall_completes_normally() {
	let (vector, probe) = ScriptedVectorBackend::stalled();
	let (service, _vector, _graph) = service(vector, ScriptedGraphBackend::new(), false);
	let service = Arc::new(service);
	let handle = tokio::spawn({
		let service = service.clone();

		async move { service.search(request(Some("semantic"))).await }
	});

	probe.wait_until_started().await;
	probe.release();

	let response = handle.await.expect("task must join").expect("search must succeed");

	assert!(probe.completed.load(Ordering::SeqCst));
	assert!(!probe.cancelled.load(Ordering::SeqCst));
	assert_eq!(response.semantic.expect("semantic requested"), Vec::new());
}

#[test]
fn method_set_round_trips_its_names() {
	for method in Method::ALL {
		assert_eq!(method.as_str().parse::<Method>().expect("must parse"), method);
	}
}
