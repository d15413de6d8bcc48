use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use tower::ServiceExt;

use conductor_api::{router, ApiState, Credentials, ServerOptions};
use conductor_core::wire::{DesiredLrpResponse, ErrorResponse, ErrorType};
use conductor_services::store::{MemoryStore, Store, StoreError, StoreNode, Watch};

/// Memory store that counts calls and can be told to fail.
#[derive(Clone, Default)]
struct FakeStore {
    inner: MemoryStore,
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl FakeStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("etcd is down".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn get(&self, key: &str) -> Result<StoreNode, StoreError> {
        self.enter()?;
        self.inner.get(key).await
    }

    async fn get_all(&self, prefix: &str) -> Result<Vec<StoreNode>, StoreError> {
        self.enter()?;
        self.inner.get_all(prefix).await
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<StoreNode, StoreError> {
        self.enter()?;
        self.inner.set(key, value).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        prev_index: u64,
        value: Bytes,
    ) -> Result<StoreNode, StoreError> {
        self.enter()?;
        self.inner.compare_and_swap(key, prev_index, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.enter()?;
        self.inner.delete(key).await
    }

    async fn watch(&self, prefix: &str) -> Result<Watch, StoreError> {
        self.enter()?;
        self.inner.watch(prefix).await
    }
}

fn app(store: &FakeStore) -> Router {
    router(ApiState::new(Arc::new(store.clone())), &ServerOptions::default())
}

fn request(method: Method, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Bytes) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

fn error_body(body: &[u8]) -> ErrorResponse {
    serde_json::from_slice(body).unwrap()
}

const P1: &str = r#"{
    "process_guid": "p1",
    "domain": "cf",
    "instances": 1,
    "action": {"run": {"path": "/bin/sleep", "args": ["100"]}},
    "routes": ["p1.example.com"],
    "annotation": "first"
}"#;

#[tokio::test]
async fn create_returns_created_with_empty_body() {
    let store = FakeStore::default();
    let app = app(&store);

    let (status, body) = send(&app, request(Method::POST, "/v1/desired_lrps", P1)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.is_empty());

    let (status, body) = send(&app, request(Method::GET, "/v1/desired_lrps/p1", "")).await;
    assert_eq!(status, StatusCode::OK);
    let lrp: DesiredLrpResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(lrp.process_guid, "p1");
    assert_eq!(lrp.instances, 1);
    assert_eq!(lrp.routes, vec!["p1.example.com"]);
}

#[tokio::test]
async fn malformed_json_is_rejected_before_the_store() {
    let store = FakeStore::default();
    let app = app(&store);

    let (status, body) = send(&app, request(Method::POST, "/v1/desired_lrps", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err = error_body(&body);
    assert_eq!(err.error_type, ErrorType::InvalidJson);
    assert!(!err.message.is_empty());

    let (status, body) = send(&app, request(Method::PUT, "/v1/desired_lrps/p1", "[")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_body(&body).error_type, ErrorType::InvalidJson);

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn invalid_lrp_reports_every_field() {
    let store = FakeStore::default();
    let app = app(&store);

    let body = r#"{"process_guid": "bad/guid", "instances": -2, "action": {"run": {"path": ""}}}"#;
    let (status, body) = send(&app, request(Method::POST, "/v1/desired_lrps", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err = error_body(&body);
    assert_eq!(err.error_type, ErrorType::InvalidLrp);
    assert!(err.message.contains("process_guid"));
    assert!(err.message.contains("instances"));
    assert!(err.message.contains("action"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn missing_guid_is_an_invalid_request_without_store_calls() {
    let store = FakeStore::default();
    let app = app(&store);

    for method in [Method::GET, Method::PUT, Method::DELETE] {
        let (status, body) = send(&app, request(method, "/v1/desired_lrps/", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err = error_body(&body);
        assert_eq!(err.error_type, ErrorType::InvalidRequest);
        assert_eq!(err.message, "process_guid missing from request");
    }
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn encoded_path_segments_in_guid_never_touch_the_store() {
    let store = FakeStore::default();
    let app = app(&store);

    for (method, body) in [
        (Method::GET, ""),
        (Method::PUT, r#"{"instances": 2}"#),
        (Method::DELETE, ""),
    ] {
        let (status, resp) =
            send(&app, request(method, "/v1/desired_lrps/..%2Ftask%2Ft1", body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_body(&resp).error_type, ErrorType::DesiredLrpNotFound);
    }

    let (status, body) = send(&app, request(Method::GET, "/v1/actual_lrps/..%2Fx", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"[]");

    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn extractor_rejections_use_the_json_error_body() {
    let store = FakeStore::default();
    let app = app(&store);

    for uri in [
        "/v1/desired_lrps?domain=a&domain=b",
        "/v1/actual_lrps?domain=a&domain=b",
        "/v1/desired_lrps/%FF",
        "/v1/actual_lrps/%FF",
    ] {
        let (status, body) = send(&app, request(Method::GET, uri, "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        let err = error_body(&body);
        assert_eq!(err.error_type, ErrorType::InvalidRequest, "{uri}");
        assert!(!err.message.is_empty());
    }
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn missing_records_are_not_found() {
    let store = FakeStore::default();
    let app = app(&store);

    for (method, body) in [
        (Method::GET, ""),
        (Method::PUT, r#"{"instances": 2}"#),
        (Method::DELETE, ""),
    ] {
        let (status, resp) = send(&app, request(method, "/v1/desired_lrps/ghost", body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            error_body(&resp),
            ErrorResponse {
                error_type: ErrorType::DesiredLrpNotFound,
                message: "Desired LRP with guid 'ghost' not found".to_string(),
            }
        );
    }
}

#[tokio::test]
async fn store_failures_are_unknown_errors() {
    let store = FakeStore::default();
    store.failing.store(true, Ordering::SeqCst);
    let app = app(&store);

    let (status, body) = send(&app, request(Method::GET, "/v1/desired_lrps/p1", "")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let err = error_body(&body);
    assert_eq!(err.error_type, ErrorType::UnknownError);
    assert_eq!(err.message, "store unavailable: etcd is down");

    let (status, _) = send(&app, request(Method::GET, "/v1/desired_lrps", "")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn list_filters_by_domain_and_rejects_empty_domain() {
    let store = FakeStore::default();
    let app = app(&store);

    let (status, body) = send(&app, request(Method::GET, "/v1/desired_lrps", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"[]");

    send(&app, request(Method::POST, "/v1/desired_lrps", P1)).await;
    let other = P1.replace("\"p1\"", "\"p2\"").replace("\"cf\"", "\"other\"");
    send(&app, request(Method::POST, "/v1/desired_lrps", &other)).await;

    let (_, body) = send(&app, request(Method::GET, "/v1/desired_lrps?domain=other", "")).await;
    let lrps: Vec<DesiredLrpResponse> = serde_json::from_slice(&body).unwrap();
    assert_eq!(lrps.len(), 1);
    assert_eq!(lrps[0].process_guid, "p2");

    let before = store.calls();
    let (status, body) = send(&app, request(Method::GET, "/v1/desired_lrps?domain=", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err = error_body(&body);
    assert_eq!(err.error_type, ErrorType::InvalidRequest);
    assert_eq!(err.message, "domain missing from request");
    assert_eq!(store.calls(), before);
}

#[tokio::test]
async fn update_applies_only_present_fields() {
    let store = FakeStore::default();
    let app = app(&store);
    send(&app, request(Method::POST, "/v1/desired_lrps", P1)).await;

    let (status, body) = send(
        &app,
        request(Method::PUT, "/v1/desired_lrps/p1", r#"{"annotation": "", "routes": null}"#),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (_, body) = send(&app, request(Method::GET, "/v1/desired_lrps/p1", "")).await;
    let lrp: DesiredLrpResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(lrp.annotation, "");
    assert_eq!(lrp.routes, vec!["p1.example.com"]);
    assert_eq!(lrp.instances, 1);
}

#[tokio::test]
async fn basic_auth_gates_every_route() {
    let store = FakeStore::default();
    let options = ServerOptions {
        credentials: Credentials::from_config("admin", "s3cret"),
        cors_enabled: false,
    };
    let app = router(ApiState::new(Arc::new(store.clone())), &options);

    let resp = app
        .clone()
        .oneshot(request(Method::GET, "/v1/desired_lrps", ""))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(store.calls(), 0);

    let mut req = request(Method::GET, "/v1/desired_lrps", "");
    req.headers_mut().insert(
        header::AUTHORIZATION,
        // base64("admin:s3cret")
        "Basic YWRtaW46czNjcmV0".parse().unwrap(),
    );
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn read_only_views_list_actual_lrps_and_cells() {
    let store = FakeStore::default();
    store
        .inner
        .set(
            "/v1/actual/p1/0/i0",
            Bytes::from_static(br#"{"process_guid":"p1","index":0,"instance_guid":"i0","domain":"cf","state":"running"}"#),
        )
        .await
        .unwrap();
    store
        .inner
        .set(
            "/v1/cell/c1",
            Bytes::from_static(br#"{"cell_id":"c1","stack":"lucid64"}"#),
        )
        .await
        .unwrap();
    let app = app(&store);

    let (status, body) = send(&app, request(Method::GET, "/v1/actual_lrps/p1", "")).await;
    assert_eq!(status, StatusCode::OK);
    let actual: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(actual.len(), 1);
    assert_eq!(actual[0]["state"], "RUNNING");

    let (_, body) = send(&app, request(Method::GET, "/v1/actual_lrps?domain=nope", "")).await;
    assert_eq!(&body[..], b"[]");

    let (_, body) = send(&app, request(Method::GET, "/v1/cells", "")).await;
    let cells: Vec<serde_json::Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(cells[0]["cell_id"], "c1");
}
