//! Ingestion integration tests
//!
//! Drive the public router end to end: origin classification, CORS,
//! validation, suppression, aggregation and persistence.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use beacon::config::{ContactConfig, IngestConfig, MonitoredSite, SiteRegistry};
use beacon::ingest::create_ingest_router;
use beacon::mailer::LogMailer;
use async_trait::async_trait;
use beacon::models::{EventType, MailLogEntry, PersistedEvent, StoredEvent};
use beacon::state::AppContext;
use beacon::storage::{RefererCount, SqliteStorage, Storage, StorageError, StorageResult};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::{Layer, ServiceExt};

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    // One connection: every pooled connection to :memory: is its own database
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn test_sites() -> SiteRegistry {
    SiteRegistry::new(
        vec![
            MonitoredSite::new("test.com", &["http://test.com"]),
            MonitoredSite::new("legacy.com", &["https://legacy.com"])
                .with_referers(&["https://legacy.com/index.html"]),
        ],
        &["10.0.0.0/8"],
    )
    .unwrap()
}

async fn create_test_state() -> Arc<AppContext> {
    Arc::new(
        AppContext::new(
            test_sites(),
            create_test_storage().await,
            Arc::new(LogMailer),
            IngestConfig::default(),
            ContactConfig::default(),
        )
        .unwrap(),
    )
}

/// Storage whose every call fails, as a lost database would
struct FailingStorage;

#[async_trait]
impl Storage for FailingStorage {
    async fn init(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn append_event(&self, _event: &PersistedEvent) -> StorageResult<()> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }

    async fn append_mail(&self, _entry: &MailLogEntry) -> StorageResult<()> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }

    async fn user_agent_id(&self, _user_agent: &str) -> StorageResult<i64> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }

    async fn count_events(&self, _host: &str, _event: EventType, _since: i64) -> StorageResult<i64> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }

    async fn top_referers(
        &self,
        _host: &str,
        _since: i64,
        _limit: i64,
    ) -> StorageResult<Vec<RefererCount>> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }

    async fn recent_events(&self, _host: &str, _limit: i64) -> StorageResult<Vec<StoredEvent>> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }

    async fn recent_mail(&self, _host: &str, _limit: i64) -> StorageResult<Vec<MailLogEntry>> {
        Err(StorageError::Database(sqlx::Error::PoolClosed))
    }
}

/// Helper layer to inject ConnectInfo for tests
#[derive(Clone)]
struct TestConnectInfoLayer;

impl<S> Layer<S> for TestConnectInfoLayer {
    type Service = TestConnectInfoMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TestConnectInfoMiddleware { inner }
    }
}

#[derive(Clone)]
struct TestConnectInfoMiddleware<S> {
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for TestConnectInfoMiddleware<S>
where
    S: tower::Service<Request<B>> + Clone,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let addr = SocketAddr::from(([127, 0, 0, 1], 12345));
        req.extensions_mut()
            .insert(axum::extract::connect_info::ConnectInfo(addr));
        self.inner.call(req)
    }
}

fn app(state: &Arc<AppContext>) -> Router {
    create_ingest_router(Arc::clone(state)).layer(TestConnectInfoLayer)
}

fn beacon(origin: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("origin", origin)
        .header("user-agent", "integration-test")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_pageview_is_counted_and_exported() {
    let state = create_test_state().await;

    let response = app(&state)
        .oneshot(beacon("http://test.com", r#"{"event":"pageview"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://test.com"
    );
    assert_eq!(
        state.aggregator.site_snapshot("test.com").get(EventType::Pageview),
        1
    );

    let exposition = state.exporter.render().unwrap();
    assert!(
        exposition.contains(r#"events_total{event="pageview",site="test.com"} 1"#),
        "unexpected exposition: {}",
        exposition
    );
}

#[tokio::test]
async fn test_unknown_origin_is_rejected() {
    let state = create_test_state().await;

    let response = app(&state)
        .oneshot(beacon("http://unknown.com", r#"{"event":"pageview"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
    assert!(body_text(response).await.contains("unknown host"));
    assert!(state.aggregator.is_empty());
}

#[tokio::test]
async fn test_preflight_returns_cors_headers_only() {
    let state = create_test_state().await;

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header("origin", "http://test.com")
        .header("access-control-request-headers", "content-type")
        .body(Body::empty())
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://test.com");
    assert_eq!(headers["access-control-allow-headers"], "content-type");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(state.aggregator.site_snapshot("test.com").total(), 0);
}

#[tokio::test]
async fn test_invalid_payloads() {
    let state = create_test_state().await;

    let cases = [
        (r#"{"event":"bogus"}"#, "unknown event type"),
        (r#"{"page":"/a"}"#, "no event type"),
        ("", "could not decode request body"),
        ("not json", "could not decode request body"),
    ];

    for (body, expected) in cases {
        let response = app(&state)
            .oneshot(beacon("http://test.com", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://test.com"
        );
        assert!(body_text(response).await.contains(expected), "body {:?}", body);
    }

    assert_eq!(state.aggregator.site_snapshot("test.com").total(), 0);
    assert!(state
        .storage
        .recent_events("test.com", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_ignored_ip_is_not_counted_or_stored() {
    let state = create_test_state().await;

    // One counted click so the series exists in the exposition
    let response = app(&state)
        .oneshot(beacon("http://test.com", r#"{"event":"click"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let before = state.exporter.render().unwrap();
    assert!(before.contains(r#"events_total{event="click",site="test.com"} 1"#));

    for _ in 0..5 {
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("origin", "http://test.com")
            .header("fly-client-ip", "10.1.2.3")
            .body(Body::from(r#"{"event":"click"}"#))
            .unwrap();
        let response = app(&state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://test.com"
        );
    }

    assert_eq!(state.aggregator.site_snapshot("test.com").get(EventType::Click), 1);
    let after = state.exporter.render().unwrap();
    assert!(after.contains(r#"events_total{event="click",site="test.com"} 1"#));
    assert!(!after.contains(r#"events_total{event="click",site="test.com"} 6"#));

    let events = state.storage.recent_events("test.com", 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events.iter().all(|event| event.ip != "10.1.2.3"));
}

#[tokio::test]
async fn test_ignored_ip_alone_stores_nothing() {
    let state = create_test_state().await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("origin", "http://test.com")
        .header("fly-client-ip", "10.1.2.3")
        .body(Body::from(r#"{"event":"click"}"#))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.aggregator.site_snapshot("test.com").get(EventType::Click), 0);
    assert!(!state.exporter.render().unwrap().contains("events_total{"));
    assert!(state
        .storage
        .recent_events("test.com", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_counts_per_event_type() {
    let state = create_test_state().await;

    for body in [
        r#"{"event":"pageview"}"#,
        r#"{"event":"pageview"}"#,
        r#"{"event":"click"}"#,
        r#"{"event":"activity"}"#,
    ] {
        let response = app(&state)
            .oneshot(beacon("http://test.com", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let snapshot = state.aggregator.site_snapshot("test.com");
    assert_eq!(snapshot.get(EventType::Pageview), 2);
    assert_eq!(snapshot.get(EventType::Click), 1);
    assert_eq!(snapshot.get(EventType::Activity), 1);
    assert_eq!(snapshot.get(EventType::Vitals), 0);

    let exposition = state.exporter.render().unwrap();
    assert!(exposition.contains(r#"events_total{event="pageview",site="test.com"} 2"#));
    assert!(exposition.contains(r#"events_total{event="click",site="test.com"} 1"#));
    assert!(exposition.contains(r#"events_total{event="activity",site="test.com"} 1"#));
    assert!(!exposition.contains(r#"event="vitals""#));
}

#[tokio::test]
async fn test_accepted_event_is_persisted() {
    let state = create_test_state().await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("origin", "http://test.com")
        .header("referer", "http://test.com/post")
        .header("user-agent", "integration-test")
        .body(Body::from(
            r#"{"event":"pageview","referer":"https://search.example","loadTime":12.5}"#,
        ))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let events = state.storage.recent_events("test.com", 10).await.unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.page, "http://test.com/post");
    assert_eq!(event.referer, "https://search.example");
    assert_eq!(event.ip, "127.0.0.1");
    assert_eq!(event.user_agent.as_deref(), Some("integration-test"));
    assert_eq!(event.raw_event, r#"{"Event":"pageview","LoadTime":12.5}"#);

    assert_eq!(
        state
            .storage
            .count_events("test.com", EventType::Pageview, 0)
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_legacy_referer_attribution() {
    let state = create_test_state().await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("referer", "https://legacy.com/index.html")
        .body(Body::from(r#"{"event":"pageview"}"#))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(
        state.aggregator.site_snapshot("legacy.com").get(EventType::Pageview),
        1
    );

    let events = state.storage.recent_events("legacy.com", 10).await.unwrap();
    assert_eq!(events[0].page, "https://legacy.com/index.html");

    // A referer that only shares a prefix is not a legacy match
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("referer", "https://legacy.com/other.html")
        .body(Body::from(r#"{"event":"pageview"}"#))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_ingestion() {
    let state = create_test_state().await;
    let callers = 8;
    let events_per_caller = 25;

    let mut handles = vec![];
    for _ in 0..callers {
        let router = app(&state);
        handles.push(tokio::spawn(async move {
            for _ in 0..events_per_caller {
                let response = router
                    .clone()
                    .oneshot(beacon("http://test.com", r#"{"event":"click"}"#))
                    .await
                    .unwrap();
                assert_eq!(response.status(), StatusCode::OK);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let expected = (callers * events_per_caller) as u64;
    assert_eq!(
        state.aggregator.site_snapshot("test.com").get(EventType::Click),
        expected
    );
    assert_eq!(
        state
            .storage
            .count_events("test.com", EventType::Click, 0)
            .await
            .unwrap(),
        expected as i64
    );
}

#[tokio::test]
async fn test_health_and_client_script() {
    let state = create_test_state().await;

    let response = app(&state)
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "all good");

    let request = Request::builder()
        .uri("/js/beacon.js")
        .header("origin", "http://test.com")
        .body(Body::empty())
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://test.com"
    );
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.contains("javascript"), "{}", content_type);
    assert!(body_text(response).await.contains("Beacon"));
}

#[tokio::test]
async fn test_storage_failure_still_counts_and_succeeds() {
    let sites = SiteRegistry::new(
        vec![MonitoredSite::new("test.com", &["http://test.com"]).with_contacts(&["hi@test.com"])],
        &[] as &[&str],
    )
    .unwrap();
    let state = Arc::new(
        AppContext::new(
            sites,
            Arc::new(FailingStorage),
            Arc::new(LogMailer),
            IngestConfig::default(),
            ContactConfig::default(),
        )
        .unwrap(),
    );

    let response = app(&state)
        .oneshot(beacon("http://test.com", r#"{"event":"pageview"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://test.com"
    );
    assert_eq!(
        state.aggregator.site_snapshot("test.com").get(EventType::Pageview),
        1
    );

    let request = Request::builder()
        .method("POST")
        .uri("/contact")
        .header("origin", "http://test.com")
        .body(Body::from(r#"{"name":"me","msg":"hi"}"#))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://test.com"
    );
    assert_eq!(state.aggregator.site_snapshot("test.com").get(EventType::Email), 1);
}

#[tokio::test]
async fn test_malformed_origin_is_rejected_despite_legacy_referer() {
    let state = create_test_state().await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header(
            "origin",
            axum::http::HeaderValue::from_bytes(b"http://evil\xff.com").unwrap(),
        )
        .header("referer", "https://legacy.com/index.html")
        .body(Body::from(r#"{"event":"pageview"}"#))
        .unwrap();
    let response = app(&state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(state.aggregator.is_empty());
}
