use bytes::Bytes;

/// Header carrying the wall-clock capture time (ms since epoch) of a cached response.
pub const CACHE_TIMESTAMP_HEADER: &str = "sw-cache-timestamp";

/// An upstream response as stored in (or served from) the response cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Capture time in ms, if the entry was stamped when stored.
    pub fn captured_at(&self) -> Option<i64> {
        self.header(CACHE_TIMESTAMP_HEADER)
            .and_then(|v| v.trim().parse().ok())
    }

    /// Returns a copy carrying `sw-cache-timestamp: now_ms`, replacing any earlier stamp.
    pub fn stamped(&self, now_ms: i64) -> Self {
        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(CACHE_TIMESTAMP_HEADER))
            .cloned()
            .collect();
        headers.push((CACHE_TIMESTAMP_HEADER.to_string(), now_ms.to_string()));
        Self {
            status: self.status,
            headers,
            body: self.body.clone(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
