//! API routes

mod health;
pub mod metrics;
pub mod proxy;
mod worker;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        // Health check
        .merge(health::routes())
        // Status, control channel, manual sweep
        .merge(worker::routes())
        // Everything else is a fetch event
        .fallback(proxy::intercept)
        .with_state(state)
        // Document packages can be large (256MB max)
        .layer(DefaultBodyLimit::max(256 * 1024 * 1024));

    // Add metrics endpoint if handle is provided
    if let Some(handle) = metrics_handle {
        router = router.merge(metrics::routes(handle));
    }

    router.layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request as HttpRequest, StatusCode};
    use folio_core::{EventHandler, Worker, WorkerConfig};
    use folio_proxy::{Fetcher, ProxyError};
    use folio_storage::{CacheStore, MemoryStorage, Request, Response};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use tokio_util::task::TaskTracker;
    use tower::ServiceExt;
    use url::Url;

    const INDEX: &str = "https://reader.example.com/index.html";

    #[derive(Default)]
    struct Upstream {
        routes: Mutex<HashMap<String, Response>>,
        offline: Mutex<bool>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Fetcher for Upstream {
        async fn fetch(&self, request: &Request) -> Result<Response, ProxyError> {
            *self.calls.lock() += 1;
            if *self.offline.lock() {
                return Err(ProxyError::Unavailable(request.url.clone()));
            }
            self.routes
                .lock()
                .get(&request.url)
                .cloned()
                .ok_or_else(|| ProxyError::Unavailable(request.url.clone()))
        }
    }

    fn setup() -> (Router, Arc<Worker>, Arc<Upstream>) {
        setup_with(None)
    }

    fn setup_with(
        metrics_handle: Option<Arc<MetricsHandle>>,
    ) -> (Router, Arc<Worker>, Arc<Upstream>) {
        let upstream = Arc::new(Upstream::default());
        upstream.routes.lock().insert(
            INDEX.to_string(),
            Response::new(200, "<html>index</html>").with_header("content-type", "text/html"),
        );

        let config = WorkerConfig {
            static_assets: vec![INDEX.to_string()],
            ..WorkerConfig::default()
        };
        let store = CacheStore::new(Arc::new(MemoryStorage::new()));
        let worker = Arc::new(Worker::new(config, store, upstream.clone()).unwrap());

        let state = AppState::new(
            worker.clone(),
            upstream.clone(),
            Some(Url::parse("https://reader.example.com/").unwrap()),
            TaskTracker::new(),
        );
        (create_router(state, metrics_handle), worker, upstream)
    }

    async fn send(router: &Router, request: HttpRequest<Body>) -> (StatusCode, String) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    fn get(uri: &str) -> HttpRequest<Body> {
        HttpRequest::get(uri)
            .header(proxy::CLIENT_HEADER, "tab-1")
            .body(Body::empty())
            .unwrap()
    }

    fn post(uri: &str, body: &str) -> HttpRequest<Body> {
        HttpRequest::post(uri).body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (router, worker, _) = setup();
        let (status, body) = send(&router, get("/_folio/health")).await;
        assert_eq!(status, StatusCode::OK);
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["worker"], "parsed");
        assert_eq!(health["serving"], false);

        worker.on_install().await.unwrap();
        let (_, body) = send(&router, get("/_folio/health")).await;
        let health: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(health["worker"], "active");
        assert_eq!(health["serving"], true);
    }

    #[tokio::test]
    async fn test_metrics_under_reserved_prefix() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let (router, _, upstream) = setup_with(Some(Arc::new(handle)));

        let response = router.clone().oneshot(get(super::metrics::METRICS_PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/plain")
        );
        assert_eq!(*upstream.calls.lock(), 0);

        // A host page named /metrics is still a fetch event
        upstream.routes.lock().insert(
            "https://reader.example.com/metrics".to_string(),
            Response::new(200, "host metrics page"),
        );
        let (status, body) = send(&router, get("/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "host metrics page");
        assert_eq!(*upstream.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_unknown_message_rejected() {
        let (router, _, _) = setup();
        let (status, body) = send(&router, post("/_folio/message", r#"{"type":"RELOAD"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("INVALID_MESSAGE"));
    }

    #[tokio::test]
    async fn test_passthrough_before_install() {
        let (router, _, upstream) = setup();
        let (status, body) = send(&router, get("/index.html")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html>index</html>");
        assert_eq!(*upstream.calls.lock(), 1);

        // Passthrough failures surface as a gateway error
        *upstream.offline.lock() = true;
        let (status, _) = send(&router, get("/index.html")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_served_from_cache_when_offline() {
        let (router, worker, upstream) = setup();
        worker.on_install().await.unwrap();
        *upstream.offline.lock() = true;

        let response = router.clone().oneshot(get("/index.html")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/html");

        let (status, body) = send(&router, get("/library")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(folio_core::offline::OFFLINE_MARKER));

        let (status, body) = send(&router, get("/_folio/status")).await;
        assert_eq!(status, StatusCode::OK);
        let status: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(status["state"], "active");
        assert_eq!(status["partitions"][0]["name"], "folio-static-v1");
        assert_eq!(status["partitions"][0]["entries"], 1);
        assert_eq!(status["controlled_clients"], 1);
    }

    #[tokio::test]
    async fn test_sweep_reports() {
        let (router, worker, _) = setup();
        worker.on_install().await.unwrap();

        let (status, body) = send(&router, post("/_folio/sweep", "")).await;
        assert_eq!(status, StatusCode::OK);
        let report: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(report["evicted"], 0);
    }
}
