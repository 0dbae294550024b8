use std::{
	collections::BTreeMap,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use axum::{Json, Router, routing::get};

use scout_config::WebSource;
use scout_domain::{Query, SourceTag};
use scout_service::{
	BoxFuture, EngineLauncher, Error, EscalationJudge, Result, SourceAdapter, ToolRegistry,
	WebAdapter, WebEngine,
};
use scout_testkit::StubServer;

use super::ScriptedChat;

#[derive(Default)]
struct CountingLauncher {
	starts: AtomicUsize,
	stops: AtomicUsize,
}
impl EngineLauncher for CountingLauncher {
	fn start<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		self.starts.fetch_add(1, Ordering::SeqCst);

		Box::pin(async { Ok(()) })
	}

	fn stop<'a>(&'a self) -> BoxFuture<'a, Result<()>> {
		self.stops.fetch_add(1, Ordering::SeqCst);

		Box::pin(async { Ok(()) })
	}
}

fn web_config(base_url: String) -> WebSource {
	WebSource {
		base_url,
		health_path: "/search".to_string(),
		max_retries: 2,
		retry_interval_ms: 10,
		timeout_ms: 2_000,
		max_results: 2,
		start_command: None,
		stop_command: None,
	}
}

async fn search_server() -> StubServer {
	let router = Router::new().route(
		"/search",
		get(|| async {
			Json(serde_json::json!({
				"answers": ["Paris"],
				"results": [
					{ "url": "https://en.wikipedia.org/wiki/Paris", "title": "Paris", "content": "Capital of France.", "engine": "wikipedia" },
					{ "url": "https://example.com/france", "title": "France", "content": "A country in Europe." }
				]
			}))
		}),
	);

	StubServer::start(router).await.expect("Failed to start stub server.")
}

#[tokio::test]
async fn concurrent_leases_start_once_and_stop_once() {
	let server = search_server().await;
	let launcher = Arc::new(CountingLauncher::default());
	let engine = WebEngine::new(web_config(server.base_url()), launcher.clone());
	let (a, b, c) = tokio::join!(engine.acquire(), engine.acquire(), engine.acquire());
	let leases = [a, b, c].map(|lease| lease.expect("Lease failed."));

	assert_eq!(launcher.starts.load(Ordering::SeqCst), 1);
	assert_eq!(engine.lease_count().await, 3);
	assert!(engine.is_running().await);

	for lease in leases {
		lease.release().await;
	}

	assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);
	assert!(!engine.is_running().await);

	engine.shutdown().await;

	assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn lease_from_before_shutdown_does_not_stop_a_restarted_engine() {
	let server = search_server().await;
	let launcher = Arc::new(CountingLauncher::default());
	let engine = WebEngine::new(web_config(server.base_url()), launcher.clone());
	let stale = engine.acquire().await.expect("Lease failed.");

	engine.shutdown().await;

	let live = engine.acquire().await.expect("Lease failed.");

	stale.release().await;

	assert!(engine.is_running().await);
	assert_eq!(engine.lease_count().await, 1);
	assert_eq!(launcher.starts.load(Ordering::SeqCst), 2);
	assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);

	live.release().await;

	assert!(!engine.is_running().await);
	assert_eq!(launcher.stops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unhealthy_engine_fails_construction() {
	let base_url = scout_testkit::closed_base_url().await.expect("Failed to reserve a port.");
	let launcher = Arc::new(CountingLauncher::default());
	let engine = WebEngine::new(web_config(base_url), launcher.clone());
	let err = engine.acquire().await.err().expect("Acquire must fail.");

	assert!(matches!(err, Error::EngineUnavailable { .. }));
	assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);
	assert_eq!(engine.lease_count().await, 0);
}

#[tokio::test]
async fn dropped_lease_is_released_in_the_background() {
	let server = search_server().await;
	let launcher = Arc::new(CountingLauncher::default());
	let engine = WebEngine::new(web_config(server.base_url()), launcher.clone());

	drop(engine.acquire().await.expect("Lease failed."));

	for _ in 0..50 {
		if engine.lease_count().await == 0 {
			break;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	assert_eq!(engine.lease_count().await, 0);
	assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn web_adapter_returns_unscored_read_only_results() {
	let server = search_server().await;
	let cfg = web_config(server.base_url());
	let engine = WebEngine::new(cfg.clone(), Arc::new(CountingLauncher::default()));
	let adapter = WebAdapter::new(cfg, engine.acquire().await.expect("Lease failed."));
	let docs = adapter.search(&Query::new("capital of France"), 10).await.expect("Search failed.");

	assert_eq!(docs.len(), 2);
	assert_eq!(docs[0].content, "Paris");
	assert_eq!(docs[1].id, "https://en.wikipedia.org/wiki/Paris");
	assert!(docs.iter().all(|doc| doc.source_tag == SourceTag::Web && doc.distance.is_none()));
	assert!(matches!(
		adapter.upsert("x", "y", &BTreeMap::new()).await,
		Err(Error::InvalidRequest { .. })
	));
	assert!(adapter.delete("x").await.is_err());

	adapter.close().await;

	assert!(!engine.is_running().await);
}

#[tokio::test]
async fn web_adapter_released_by_its_registry_can_be_closed_explicitly() {
	let server = search_server().await;
	let cfg = web_config(server.base_url());
	let launcher = Arc::new(CountingLauncher::default());
	let engine = WebEngine::new(cfg.clone(), launcher.clone());
	let adapter = Arc::new(WebAdapter::new(cfg, engine.acquire().await.expect("Lease failed.")));
	let judge = EscalationJudge::new(super::llm_config(), Arc::new(ScriptedChat::always("{}")));
	let registry = ToolRegistry::new(scout_config::Fusion::default(), Vec::new())
		.with_web(adapter.clone(), judge, 2);

	drop(registry);

	let Ok(adapter) = Arc::try_unwrap(adapter) else {
		panic!("The registry must not keep the adapter alive.");
	};

	adapter.close().await;

	assert_eq!(engine.lease_count().await, 0);
	assert!(!engine.is_running().await);
	assert_eq!(launcher.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_web_search_is_source_unavailable() {
	let server = search_server().await;
	let cfg = web_config(server.base_url());
	let engine = WebEngine::new(cfg.clone(), Arc::new(CountingLauncher::default()));
	let lease = engine.acquire().await.expect("Lease failed.");
	let closed = scout_testkit::closed_base_url().await.expect("Failed to reserve a port.");
	let adapter = WebAdapter::new(web_config(closed), lease);
	let err = adapter.search(&Query::new("capital of France"), 2).await.expect_err("Search must fail.");

	assert!(matches!(err, Error::SourceUnavailable { source_tag: SourceTag::Web, .. }));

	adapter.close().await;
}
