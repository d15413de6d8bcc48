//! Shared HTTP client for CLI commands.

use anyhow::{bail, Context, Result};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

pub struct Client {
    base: Url,
    credentials: Option<(String, String)>,
    http: reqwest::Client,
}

impl Client {
    pub fn new(addr: &str, credentials: Option<(String, String)>) -> Result<Self> {
        let base = Url::parse(addr).with_context(|| format!("invalid --addr {addr}"))?;
        Ok(Self {
            base,
            credentials,
            http: reqwest::Client::new(),
        })
    }

    /// `path` plus optional query pairs, resolved against the server address.
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base
            .join(path)
            .with_context(|| format!("invalid path {path}"))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.credentials {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self.send(self.request(Method::GET, url.clone()), &url).await?;
        resp.json::<T>().await.context("failed to parse response")
    }

    pub async fn post_json<T: Serialize>(&self, url: Url, body: &T) -> Result<()> {
        self.send(self.request(Method::POST, url.clone()).json(body), &url)
            .await
            .map(|_| ())
    }

    pub async fn put_json<T: Serialize>(&self, url: Url, body: &T) -> Result<()> {
        self.send(self.request(Method::PUT, url.clone()).json(body), &url)
            .await
            .map(|_| ())
    }

    pub async fn delete(&self, url: Url) -> Result<()> {
        self.send(self.request(Method::DELETE, url.clone()), &url)
            .await
            .map(|_| ())
    }

    async fn send(&self, req: RequestBuilder, url: &Url) -> Result<Response> {
        let resp = req
            .send()
            .await
            .with_context(|| format!("failed to connect to conductord at {url}, is it running?"))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(err) => bail!("{} ({}): {}", err.error_type, status, err.message),
            Err(_) => bail!("request failed with {status}: {text}"),
        }
    }
}
