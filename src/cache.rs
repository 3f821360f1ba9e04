//! Offline cache in front of the Loom origin.
//!
//! API reads are network-first with a freshness window; static assets are
//! cache-first; navigations fall back to the cached app shell. Anything
//! else goes straight to the network and is never stored.

use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName};
use serde_json::json;
use sqlx::SqlitePool;

use crate::config::CacheConfig;
use crate::db;
use crate::models::CachedResponse;

const OFFLINE_MESSAGE: &str = "You are offline. Please check your connection.";

/// Headers that describe a single connection and must not be forwarded or stored.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "content-length",
];

/// An incoming request to relay to the origin.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path plus optional query, starting with `/`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn get(path_and_query: &str) -> Self {
        Self {
            method: Method::GET,
            path_and_query: path_and_query.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn is_api(&self) -> bool {
        self.path_and_query.starts_with("/api/")
    }

    pub fn is_navigation(&self) -> bool {
        if self.method != Method::GET {
            return false;
        }
        let header = |name: &str| {
            self.headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
        };
        header("sec-fetch-mode") == "navigate" || header("accept").contains("text/html")
    }
}

pub struct CacheLayer {
    pool: SqlitePool,
    client: reqwest::Client,
    upstream_url: String,
    static_cache: String,
    api_cache: String,
    max_age: Duration,
    app_shell: String,
}

impl CacheLayer {
    pub fn new(
        pool: SqlitePool,
        client: reqwest::Client,
        upstream_url: &str,
        config: &CacheConfig,
    ) -> Self {
        Self {
            pool,
            client,
            upstream_url: upstream_url.trim_end_matches('/').to_string(),
            static_cache: config.static_cache_name(),
            api_cache: config.api_cache_name(),
            max_age: config.max_age,
            app_shell: config.app_shell.clone(),
        }
    }

    pub fn static_cache_name(&self) -> &str {
        &self.static_cache
    }

    pub fn api_cache_name(&self) -> &str {
        &self.api_cache
    }

    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.upstream_url, path_and_query)
    }

    pub async fn handle(&self, req: ProxyRequest) -> CachedResponse {
        match (req.method == Method::GET, req.is_api()) {
            (true, true) => self.network_first(&req).await,
            (true, false) => self.cache_first(&req).await,
            (false, is_api) => match self.fetch(&req).await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::debug!("{} {} failed: {e}", req.method, req.path_and_query);
                    if is_api { offline_json() } else { offline_text() }
                }
            },
        }
    }

    /// Network first: store fresh 2xx copies, fall back to a cached copy
    /// younger than the freshness window, else a synthesized 503.
    pub async fn network_first(&self, req: &ProxyRequest) -> CachedResponse {
        let url = self.url_for(&req.path_and_query);

        match self.fetch(req).await {
            Ok(resp) => {
                if resp.is_success() {
                    let stamped = resp.stamped(Utc::now().timestamp_millis());
                    self.put(&self.api_cache, &url, &stamped).await;
                }
                resp
            }
            Err(e) => {
                tracing::debug!("Network request failed, trying cache: {e}");
                match self.lookup_fresh(&url).await {
                    Some(cached) => cached,
                    None => offline_json(),
                }
            }
        }
    }

    /// Cache lookup for an API read, evicting the entry if it outlived the window.
    pub async fn lookup_fresh(&self, url: &str) -> Option<CachedResponse> {
        let cached = self.get(&self.api_cache, url).await?;

        let expired = cached.captured_at().is_some_and(|captured| {
            let age_ms = Utc::now().timestamp_millis().saturating_sub(captured);
            age_ms > i64::try_from(self.max_age.as_millis()).unwrap_or(i64::MAX)
        });

        if expired {
            tracing::debug!("Evicting expired cache entry for {url}");
            if let Err(e) = db::response_cache::delete(&self.pool, &self.api_cache, "GET", url).await {
                tracing::error!("Failed to evict cache entry for {url}: {e}");
            }
            return None;
        }

        Some(cached)
    }

    /// Cache first: serve a stored copy, otherwise fetch and store 200s.
    pub async fn cache_first(&self, req: &ProxyRequest) -> CachedResponse {
        let url = self.url_for(&req.path_and_query);

        if let Some(cached) = self.get(&self.static_cache, &url).await {
            return cached;
        }

        match self.fetch(req).await {
            Ok(resp) => {
                if resp.status == 200 {
                    self.put(&self.static_cache, &url, &resp).await;
                }
                resp
            }
            Err(e) => {
                tracing::debug!("Fetch failed for {}: {e}", req.path_and_query);
                if req.is_navigation() {
                    let shell = self.url_for(&self.app_shell);
                    if let Some(cached) = self.get(&self.static_cache, &shell).await {
                        return cached;
                    }
                }
                offline_text()
            }
        }
    }

    /// Fetch and store the app shell assets. Failures are logged and skipped.
    pub async fn precache(&self, paths: &[String]) -> usize {
        let mut stored = 0;
        for path in paths {
            let url = self.url_for(path);
            match self.fetch(&ProxyRequest::get(path)).await {
                Ok(resp) if resp.status == 200 => {
                    self.put(&self.static_cache, &url, &resp).await;
                    stored += 1;
                }
                Ok(resp) => tracing::warn!("Precache of {path} returned {}", resp.status),
                Err(e) => tracing::warn!("Precache of {path} failed: {e}"),
            }
        }
        tracing::info!("Precached {stored}/{} static assets", paths.len());
        stored
    }

    /// Drop every cache namespace other than the current static and API ones.
    pub async fn activate(&self) -> u64 {
        let keep = [self.static_cache.as_str(), self.api_cache.as_str()];
        match db::response_cache::purge_except(&self.pool, &keep).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!("Failed to purge old caches: {e}");
                0
            }
        }
    }

    async fn fetch(&self, req: &ProxyRequest) -> Result<CachedResponse, reqwest::Error> {
        let url = self.url_for(&req.path_and_query);

        let mut builder = self.client.request(req.method.clone(), &url);
        for (name, value) in req.headers.iter() {
            if !is_hop_by_hop(name) && name.as_str() != "host" {
                builder = builder.header(name, value);
            }
        }
        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name))
            .filter_map(|(name, value)| match std::str::from_utf8(value.as_bytes()) {
                Ok(v) => Some((name.as_str().to_string(), v.to_string())),
                Err(_) => {
                    tracing::warn!("Dropping non-UTF-8 header '{name}' from {url}");
                    None
                }
            })
            .collect();
        let body = resp.bytes().await?;

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }

    async fn get(&self, cache_name: &str, url: &str) -> Option<CachedResponse> {
        match db::response_cache::find(&self.pool, cache_name, "GET", url).await {
            Ok(found) => found,
            Err(e) => {
                tracing::error!("Cache lookup failed for {url}: {e}");
                None
            }
        }
    }

    async fn put(&self, cache_name: &str, url: &str, resp: &CachedResponse) {
        if let Err(e) = db::response_cache::put(&self.pool, cache_name, "GET", url, resp).await {
            tracing::error!("Failed to cache {url}: {e}");
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

pub fn offline_json() -> CachedResponse {
    let body = json!({ "error": "Offline", "message": OFFLINE_MESSAGE });
    CachedResponse {
        status: 503,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: Bytes::from(body.to_string()),
    }
}

pub fn offline_text() -> CachedResponse {
    CachedResponse {
        status: 503,
        headers: vec![("content-type".to_string(), "text/plain".to_string())],
        body: Bytes::from_static(b"Offline"),
    }
}
