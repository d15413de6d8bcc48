use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};

use conductor_core::keys::task_key;

use crate::*;

/// Callback receiver that fails the first `failures` requests.
#[derive(Clone)]
struct Receiver {
    hits: Arc<AtomicUsize>,
    failures: usize,
}

async fn receive(State(r): State<Receiver>, Json(_body): Json<Value>) -> StatusCode {
    let n = r.hits.fetch_add(1, Ordering::SeqCst);
    if n < r.failures {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn spawn_receiver(failures: usize) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/callback", post(receive))
        .with_state(Receiver {
            hits: Arc::clone(&hits),
            failures,
        });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/callback"), hits)
}

fn completed_task(guid: &str, callback: &str) -> Bytes {
    let task = json!({
        "task_guid": guid,
        "domain": "tests",
        "action": {"run": {"path": "/bin/true"}},
        "completion_callback_url": callback,
        "state": "completed",
        "result": "done",
        "created_at": 1,
        "updated_at": 1
    });
    Bytes::from(serde_json::to_vec(&task).unwrap())
}

#[tokio::test]
async fn test_completed_task_is_delivered_once_and_resolved() {
    let (callback, hits) = spawn_receiver(0).await;
    let stack = spawn_stack().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    stack
        .store
        .set(&task_key("t1"), completed_task("t1", &callback))
        .await
        .unwrap();

    let store = stack.store.clone();
    assert!(
        eventually(2000, || {
            let store = store.clone();
            async move { store.get(&task_key("t1")).await.is_err() }
        })
        .await,
        "task was not resolved"
    );
    // Several sweeps pass; none may redeliver.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_delivery_is_retried_until_accepted() {
    let (callback, hits) = spawn_receiver(1).await;
    let stack = spawn_stack().await.unwrap();

    stack
        .store
        .set(&task_key("t2"), completed_task("t2", &callback))
        .await
        .unwrap();

    // First POST fails; the task stays put.
    let h = Arc::clone(&hits);
    assert!(eventually(2000, || {
        let h = Arc::clone(&h);
        async move { h.load(Ordering::SeqCst) >= 1 }
    })
    .await);
    assert!(stack.store.get(&task_key("t2")).await.is_ok());

    // The sweep reclaims the stale delivery and the second POST succeeds.
    let store = stack.store.clone();
    assert!(
        eventually(3000, || {
            let store = store.clone();
            async move { store.get(&task_key("t2")).await.is_err() }
        })
        .await,
        "task was never redelivered"
    );
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
