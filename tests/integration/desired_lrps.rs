use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::*;

fn p1() -> Value {
    json!({
        "process_guid": "p1",
        "domain": "cf",
        "instances": 1,
        "action": {"run": {"path": "/bin/sleep", "args": ["1000"]}},
        "routes": ["p1.example.com"],
        "annotation": "hello"
    })
}

/// Full lifecycle: create, read, scale, delete, then 404.
#[tokio::test]
async fn test_desired_lrp_lifecycle() {
    let stack = spawn_stack().await.unwrap();
    let url = stack.url("/v1/desired_lrps/p1");

    let resp = stack
        .http
        .post(stack.url("/v1/desired_lrps"))
        .json(&p1())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = stack.http.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let before: Value = resp.json().await.unwrap();
    assert_eq!(before["instances"], 1);

    let resp = stack
        .http
        .put(&url)
        .json(&json!({"instances": 5}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let after: Value = stack.http.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(after["instances"], 5);
    let mut expected = before.clone();
    expected["instances"] = json!(5);
    assert_eq!(after, expected, "fields other than instances changed");

    let resp = stack.http.delete(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = stack.http.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({"type": "DesiredLRPNotFound", "message": "Desired LRP with guid 'p1' not found"})
    );
}

#[tokio::test]
async fn test_list_by_domain_over_http() {
    let stack = spawn_stack().await.unwrap();

    for (guid, domain) in [("a", "cf"), ("b", "other"), ("c", "cf")] {
        let mut body = p1();
        body["process_guid"] = json!(guid);
        body["domain"] = json!(domain);
        let resp = stack
            .http
            .post(stack.url("/v1/desired_lrps"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let all: Vec<Value> = stack
        .http
        .get(stack.url("/v1/desired_lrps"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let cf: Vec<Value> = stack
        .http
        .get(stack.url("/v1/desired_lrps?domain=cf"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let guids: Vec<&str> = cf.iter().filter_map(|l| l["process_guid"].as_str()).collect();
    assert_eq!(guids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_bad_requests_leave_the_store_untouched() {
    let stack = spawn_stack().await.unwrap();

    let resp = stack
        .http
        .post(stack.url("/v1/desired_lrps"))
        .header("content-type", "application/json")
        .body("{\"process_guid\":")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["type"], "InvalidJSON");

    let mut invalid = p1();
    invalid["instances"] = json!(-1);
    let resp = stack
        .http
        .post(stack.url("/v1/desired_lrps"))
        .json(&invalid)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["type"], "InvalidLRP");

    assert!(stack.store.is_empty());
}
