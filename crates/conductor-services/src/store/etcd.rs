//! etcd v2 keys API adapter.
//!
//! Requests go to one cluster member at a time, picked round-robin. A failed
//! request is reported to the caller; it is never retried on another member.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::sync::mpsc;
use url::Url;

use super::{ChangeEvent, ChangeKind, Store, StoreError, StoreNode, Watch, WATCH_BUFFER};

const ETCD_INDEX_HEADER: &str = "x-etcd-index";

const ERR_KEY_NOT_FOUND: u32 = 100;
const ERR_TEST_FAILED: u32 = 101;
const ERR_EVENT_INDEX_CLEARED: u32 = 401;

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    action: String,
    node: Option<EtcdNode>,
    #[serde(rename = "prevNode")]
    prev_node: Option<EtcdNode>,
}

#[derive(Debug, Clone, Deserialize)]
struct EtcdNode {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default, rename = "modifiedIndex")]
    modified_index: u64,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
}

#[derive(Debug, Deserialize)]
struct EtcdErrorBody {
    #[serde(rename = "errorCode")]
    error_code: u32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    cause: String,
}

impl EtcdNode {
    fn into_store_node(self) -> StoreNode {
        StoreNode {
            key: self.key,
            value: self.value.map(Bytes::from).unwrap_or_default(),
            index: self.modified_index,
        }
    }

    fn collect_leaves(self, out: &mut Vec<StoreNode>) {
        if self.dir {
            for child in self.nodes {
                child.collect_leaves(out);
            }
        } else {
            out.push(self.into_store_node());
        }
    }
}

/// Raw reply: status, the cluster index header, and the body.
struct Reply {
    status: StatusCode,
    etcd_index: Option<u64>,
    body: Bytes,
}

impl Reply {
    fn decode(self, key: &str) -> Result<EtcdResponse, StoreError> {
        if self.status.is_success() {
            return serde_json::from_slice(&self.body)
                .map_err(|e| StoreError::Protocol(format!("bad etcd response for {key}: {e}")));
        }
        Err(self.into_error(key))
    }

    fn into_error(self, key: &str) -> StoreError {
        match serde_json::from_slice::<EtcdErrorBody>(&self.body) {
            Ok(body) => match body.error_code {
                ERR_KEY_NOT_FOUND => StoreError::NotFound(key.to_string()),
                ERR_TEST_FAILED => StoreError::Conflict(key.to_string()),
                code => StoreError::Protocol(format!(
                    "etcd error {code}: {} ({})",
                    body.message, body.cause
                )),
            },
            Err(_) => StoreError::Unavailable(format!(
                "etcd returned {} for {key}",
                self.status
            )),
        }
    }
}

#[derive(Clone)]
pub struct EtcdStore {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    endpoints: Vec<Url>,
    next: AtomicUsize,
    request_timeout: Duration,
}

impl EtcdStore {
    pub fn new(cluster: &[String], request_timeout: Duration) -> Result<Self, StoreError> {
        let endpoints = cluster
            .iter()
            .map(|addr| {
                Url::parse(addr.trim_end_matches('/'))
                    .map_err(|e| StoreError::Unavailable(format!("bad etcd address {addr}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if endpoints.is_empty() {
            return Err(StoreError::Unavailable("no etcd addresses configured".into()));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                endpoints,
                next: AtomicUsize::new(0),
                request_timeout,
            }),
        })
    }

    /// Build the client and confirm a cluster member answers `/version`.
    pub async fn connect(cluster: &[String], request_timeout: Duration) -> Result<Self, StoreError> {
        let store = Self::new(cluster, request_timeout)?;
        let url = store.inner.url("/version", &[])?;
        let resp = store
            .inner
            .http
            .get(url.clone())
            .timeout(request_timeout)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "{url} answered {}",
                resp.status()
            )));
        }
        tracing::info!(endpoint = %url, "connected to etcd");
        Ok(store)
    }
}

impl Inner {
    fn endpoint(&self) -> &Url {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[i]
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, StoreError> {
        let base = self.endpoint();
        let mut url = Url::parse(&format!("{}{}", base.as_str().trim_end_matches('/'), path))
            .map_err(|e| StoreError::Protocol(format!("bad url for {path}: {e}")))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn keys_url(&self, key: &str, query: &[(&str, &str)]) -> Result<Url, StoreError> {
        let key = if key.starts_with('/') {
            key.to_string()
        } else {
            format!("/{key}")
        };
        self.url(&format!("/v2/keys{key}"), query)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        form: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Reply, StoreError> {
        let mut req = self.http.request(method, url.clone());
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        if let Some(form) = form {
            req = req
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(form);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{url}: {e}")))?;
        let status = resp.status();
        let etcd_index = resp
            .headers()
            .get(ETCD_INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = resp
            .bytes()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{url}: {e}")))?;
        Ok(Reply {
            status,
            etcd_index,
            body,
        })
    }

    async fn put(&self, key: &str, value: &Bytes, query: &[(&str, &str)]) -> Result<StoreNode, StoreError> {
        let value = std::str::from_utf8(value)
            .map_err(|_| StoreError::Protocol(format!("value for {key} is not utf-8")))?;
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("value", value)
            .finish();
        let url = self.keys_url(key, query)?;
        let reply = self
            .send(Method::PUT, url, Some(form), Some(self.request_timeout))
            .await?;
        let resp = reply.decode(key)?;
        resp.node
            .map(EtcdNode::into_store_node)
            .ok_or_else(|| StoreError::Protocol(format!("etcd set of {key} returned no node")))
    }
}

fn change_kind(resp: &EtcdResponse) -> Option<ChangeKind> {
    match resp.action.as_str() {
        "create" => Some(ChangeKind::Created),
        "set" if resp.prev_node.is_none() => Some(ChangeKind::Created),
        "set" | "update" | "compareAndSwap" => Some(ChangeKind::Modified),
        "delete" | "expire" | "compareAndDelete" => Some(ChangeKind::Deleted),
        _ => None,
    }
}

#[async_trait]
impl Store for EtcdStore {
    async fn get(&self, key: &str) -> Result<StoreNode, StoreError> {
        let url = self.inner.keys_url(key, &[])?;
        let reply = self
            .inner
            .send(Method::GET, url, None, Some(self.inner.request_timeout))
            .await?;
        let resp = reply.decode(key)?;
        match resp.node {
            Some(node) if !node.dir => Ok(node.into_store_node()),
            Some(_) => Err(StoreError::Protocol(format!("{key} is a directory"))),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn get_all(&self, prefix: &str) -> Result<Vec<StoreNode>, StoreError> {
        let url = self.inner.keys_url(prefix, &[("recursive", "true")])?;
        let reply = self
            .inner
            .send(Method::GET, url, None, Some(self.inner.request_timeout))
            .await?;
        let resp = match reply.decode(prefix) {
            Ok(resp) => resp,
            Err(StoreError::NotFound(_)) => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };
        let mut out = Vec::new();
        if let Some(node) = resp.node {
            node.collect_leaves(&mut out);
        }
        Ok(out)
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<StoreNode, StoreError> {
        self.inner.put(key, &value, &[]).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        prev_index: u64,
        value: Bytes,
    ) -> Result<StoreNode, StoreError> {
        let prev = prev_index.to_string();
        self.inner.put(key, &value, &[("prevIndex", prev.as_str())]).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let url = self.inner.keys_url(key, &[])?;
        let reply = self
            .inner
            .send(Method::DELETE, url, None, Some(self.inner.request_timeout))
            .await?;
        reply.decode(key).map(|_| ())
    }

    async fn watch(&self, prefix: &str) -> Result<Watch, StoreError> {
        // Seed the wait index from the cluster index so the stream begins
        // after the state a caller could have just read.
        let url = self.inner.keys_url(prefix, &[])?;
        let reply = self
            .inner
            .send(Method::GET, url, None, Some(self.inner.request_timeout))
            .await?;
        let start = match reply.etcd_index {
            Some(index) => index + 1,
            None => {
                return Err(StoreError::Protocol(format!(
                    "etcd reply for {prefix} carried no index"
                )))
            }
        };

        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let inner = Arc::clone(&self.inner);
        let prefix = prefix.to_string();
        tokio::spawn(async move {
            let mut wait_index = start;
            loop {
                let next = wait_index.to_string();
                let event = async {
                    let url = inner.keys_url(
                        &prefix,
                        &[("wait", "true"), ("recursive", "true"), ("waitIndex", next.as_str())],
                    )?;
                    let reply = inner.send(Method::GET, url, None, None).await?;
                    if !reply.status.is_success() {
                        if let Ok(body) = serde_json::from_slice::<EtcdErrorBody>(&reply.body) {
                            if body.error_code == ERR_EVENT_INDEX_CLEARED {
                                return Err(StoreError::Protocol(format!(
                                    "watch index {next} cleared: {}",
                                    body.message
                                )));
                            }
                        }
                    }
                    reply.decode(&prefix)
                }
                .await;

                let resp = match event {
                    Ok(resp) => resp,
                    Err(err) => {
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                };
                let kind = change_kind(&resp);
                let Some(node) = resp.node.or(resp.prev_node) else {
                    let _ = tx
                        .send(Err(StoreError::Protocol(format!(
                            "etcd watch event on {prefix} carried no node"
                        ))))
                        .await;
                    return;
                };
                wait_index = node.modified_index + 1;
                let Some(kind) = kind else {
                    tracing::debug!(action = %resp.action, "ignoring etcd watch action");
                    continue;
                };
                if node.dir {
                    continue;
                }
                let event = ChangeEvent {
                    kind,
                    node: node.into_store_node(),
                };
                if tx.send(Ok(event)).await.is_err() {
                    return;
                }
            }
        });

        Ok(Watch::new(rx))
    }
}
