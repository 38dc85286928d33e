//! Sessions stored as documents in an Elasticsearch index, over the REST API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::SessionStore;
use crate::error::{CodemindError, Result};
use crate::gateway::http::shared_client;
use crate::types::Session;

pub const DEFAULT_INDEX: &str = "codemind-chat-history";

/// Most sessions returned by a listing.
const LIST_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub index: String,
}

impl ElasticConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: None,
            index: DEFAULT_INDEX.to_string(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct ElasticSessionStore {
    config: ElasticConfig,
    /// Set once the index is known to exist.
    index_ready: Arc<OnceCell<()>>,
}

impl ElasticSessionStore {
    pub fn new(config: ElasticConfig) -> Self {
        Self {
            config,
            index_ready: Arc::new(OnceCell::new()),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.config.api_key {
            if let Ok(val) = HeaderValue::from_str(&format!("ApiKey {key}")) {
                headers.insert(AUTHORIZATION, val);
            }
        }
        headers
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}{}", self.config.url, self.config.index, path);
        shared_client().request(method, url).headers(self.headers())
    }

    async fn ensure_index(&self) -> Result<()> {
        self.index_ready
            .get_or_try_init(|| self.create_index_if_missing())
            .await
            .map(|_| ())
    }

    async fn create_index_if_missing(&self) -> Result<()> {
        let resp = self.request(Method::HEAD, "").send().await?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let resp = self.request(Method::PUT, "").send().await?;
                let status = resp.status();
                // Losing a creation race is fine.
                if status.is_success() || status == StatusCode::BAD_REQUEST {
                    tracing::info!(index = %self.config.index, "session index ready");
                    Ok(())
                } else {
                    Err(store_error(resp).await)
                }
            }
            _ => Err(store_error(resp).await),
        }
    }
}

async fn store_error(resp: reqwest::Response) -> CodemindError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    CodemindError::Store(format!("elasticsearch returned {status}: {body}"))
}

#[async_trait]
impl SessionStore for ElasticSessionStore {
    async fn initialize(&self) -> Result<()> {
        self.ensure_index().await
    }

    async fn save(&self, session: &Session) -> Result<()> {
        self.ensure_index().await?;
        let resp = self
            .request(Method::PUT, &format!("/_doc/{}", session.id))
            .query(&[("refresh", "true")])
            .json(session)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(store_error(resp).await);
        }
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Session>> {
        let resp = self.request(Method::GET, &format!("/_doc/{id}")).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(store_error(resp).await);
        }
        let doc: GetResponse = resp.json().await?;
        Ok(doc.source)
    }

    async fn load_all(&self) -> Result<HashMap<String, Session>> {
        let resp = self
            .request(Method::POST, "/_search")
            .json(&serde_json::json!({ "size": LIST_SIZE, "query": { "match_all": {} } }))
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(HashMap::new());
        }
        if !resp.status().is_success() {
            return Err(store_error(resp).await);
        }
        let result: SearchResponse = resp.json().await?;
        let mut sessions = HashMap::new();
        for hit in result.hits.hits {
            match serde_json::from_value::<Session>(hit.source) {
                Ok(session) => {
                    sessions.insert(session.id.clone(), session);
                }
                Err(err) => {
                    tracing::warn!(doc = ?hit.id, error = %err, "skipping unreadable session document");
                }
            }
        }
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let resp = self
            .request(Method::DELETE, &format!("/_doc/{id}"))
            .query(&[("refresh", "true")])
            .send()
            .await?;
        if resp.status().is_success() || resp.status() == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(store_error(resp).await)
        }
    }
}

#[derive(Deserialize)]
struct GetResponse {
    #[serde(rename = "_source")]
    source: Option<Session>,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(rename = "_source", default)]
    source: serde_json::Value,
}
