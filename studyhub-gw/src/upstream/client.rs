//! HTTP client for the external processing service
//!
//! Every call is a single attempt: no caching (`Cache-Control: no-store`),
//! no retries. Buffered replies are read as text and only then decoded as
//! JSON, so upstream output reaches the caller byte-for-byte. Streaming
//! replies are handed back undecoded once the status line is in.

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("studyhub-gw/", env!("CARGO_PKG_VERSION"));

/// Upstream client errors
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// No base URL configured for this client
    #[error("External API URL not configured")]
    Configuration,

    /// Upstream answered with a non-2xx status
    #[error("Upstream returned status {status}")]
    Status { status: u16, body: UpstreamBody },

    /// DNS, connection, timeout or body read failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// 2xx reply that does not have the expected shape
    #[error("Malformed upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Transport failures and 5xx replies; 4xx and configuration errors are final
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => (500..600).contains(status),
            UpstreamError::Configuration | UpstreamError::Decode(_) => false,
        }
    }
}

/// Upstream reply body: JSON (parsed, with the text it came from), or the
/// raw text when it is not JSON
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamBody {
    Structured { value: Value, raw: String },
    Opaque(String),
}

impl UpstreamBody {
    /// Classify a reply body; an empty body counts as `{}`
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            return UpstreamBody::Structured {
                value: json!({}),
                raw: "{}".to_string(),
            };
        }
        match serde_json::from_str(&text) {
            Ok(value) => UpstreamBody::Structured { value, raw: text },
            Err(_) => UpstreamBody::Opaque(text),
        }
    }

    /// Parsed JSON, if the body was JSON
    pub fn json(&self) -> Option<&Value> {
        match self {
            UpstreamBody::Structured { value, .. } => Some(value),
            UpstreamBody::Opaque(_) => None,
        }
    }

    /// The reply text as received
    pub fn as_str(&self) -> &str {
        match self {
            UpstreamBody::Structured { raw, .. } => raw,
            UpstreamBody::Opaque(text) => text,
        }
    }
}

impl fmt::Display for UpstreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful (2xx) upstream reply
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: UpstreamBody,
}

impl UpstreamResponse {
    /// Decode a structured body into `T`
    ///
    /// Opaque bodies never decode; the proxy does not invent structure.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, UpstreamError> {
        match self.body {
            UpstreamBody::Structured { value, .. } => {
                serde_json::from_value(value).map_err(|e| UpstreamError::Decode(e.to_string()))
            }
            UpstreamBody::Opaque(_) => Err(UpstreamError::Decode(
                "expected JSON, got non-JSON body".to_string(),
            )),
        }
    }
}

/// 2xx upstream reply whose body has not been read yet
#[derive(Debug)]
pub struct UpstreamStream {
    pub status: u16,
    pub content_type: Option<String>,
    response: reqwest::Response,
}

impl UpstreamStream {
    /// Body chunks as they arrive from upstream
    pub fn into_byte_stream(self) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        self.response.bytes_stream()
    }
}

/// Outbound request body
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Multipart form forwarded byte-for-byte; `content_type` carries the boundary
    Multipart { content_type: String, bytes: Bytes },
}

/// Client for the external processing service
///
/// Cheap to clone; clones share one connection pool. `timeout` bounds a
/// whole buffered call; streaming calls are only bounded while connecting.
#[derive(Clone)]
pub struct UpstreamClient {
    http_client: reqwest::Client,
    base_url: Option<String>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let base_url = base_url
            .map(|b| b.trim().trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());

        Ok(Self {
            http_client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Join the configured base with an absolute upstream path
    pub fn url_for(&self, path: &str) -> Result<String, UpstreamError> {
        let base = self.base_url.as_deref().ok_or(UpstreamError::Configuration)?;
        Ok(format!("{}/{}", base, path.trim_start_matches('/')))
    }

    fn request(
        &self,
        method: &Method,
        path: &str,
        body: RequestBody,
    ) -> Result<reqwest::RequestBuilder, UpstreamError> {
        let url = self.url_for(path)?;

        debug!(method = %method, url = %url, "Calling upstream");

        let request = self
            .http_client
            .request(method.clone(), &url)
            .header(CACHE_CONTROL, "no-store");

        Ok(match body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.header(ACCEPT, "application/json").json(&value),
            RequestBody::Multipart {
                content_type,
                bytes,
            } => request.header(CONTENT_TYPE, content_type).body(bytes),
        })
    }

    /// Send one request and classify the buffered reply
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let request = self.request(&method, path, body)?.timeout(self.timeout);

        let response = request.send().await.map_err(|e| {
            warn!(method = %method, path = %path, error = %e, "Upstream request failed");
            UpstreamError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            warn!(path = %path, status, error = %e, "Failed to read upstream body");
            UpstreamError::Transport(e.to_string())
        })?;
        let body = UpstreamBody::from_text(text);

        if !(200..300).contains(&status) {
            warn!(path = %path, status, "Upstream returned error status");
            return Err(UpstreamError::Status { status, body });
        }

        info!(
            path = %path,
            status,
            structured = body.json().is_some(),
            "Upstream call completed"
        );

        Ok(UpstreamResponse { status, body })
    }

    /// Send one request and return the 2xx body as a stream
    ///
    /// Non-2xx replies are buffered and reported as `Status` like `send`.
    pub async fn send_streaming(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
    ) -> Result<UpstreamStream, UpstreamError> {
        let response = self
            .request(&method, path, body)?
            .send()
            .await
            .map_err(|e| {
                warn!(method = %method, path = %path, error = %e, "Upstream request failed");
                UpstreamError::Transport(e.to_string())
            })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let text = response.text().await.map_err(|e| {
                warn!(path = %path, status, error = %e, "Failed to read upstream body");
                UpstreamError::Transport(e.to_string())
            })?;
            warn!(path = %path, status, "Upstream returned error status");
            return Err(UpstreamError::Status {
                status,
                body: UpstreamBody::from_text(text),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        info!(path = %path, status, content_type = ?content_type, "Upstream stream opened");

        Ok(UpstreamStream {
            status,
            content_type,
            response,
        })
    }

    /// POST a serializable value as JSON
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let value =
            serde_json::to_value(payload).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        self.send(Method::POST, path, RequestBody::Json(value)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_classification() {
        assert_eq!(
            UpstreamBody::from_text(r#"{"ok":true}"#.to_string()),
            UpstreamBody::Structured {
                value: json!({"ok": true}),
                raw: r#"{"ok":true}"#.to_string(),
            }
        );
        assert_eq!(UpstreamBody::from_text("".to_string()).json(), Some(&json!({})));
        assert_eq!(
            UpstreamBody::from_text("<html>bad gateway</html>".to_string()),
            UpstreamBody::Opaque("<html>bad gateway</html>".to_string())
        );
    }

    #[test]
    fn test_structured_body_keeps_original_text() {
        let text = "{ \"z\": 1,\n  \"a\": 2 }";
        let body = UpstreamBody::from_text(text.to_string());
        assert_eq!(body.json(), Some(&json!({"a": 2, "z": 1})));
        assert_eq!(body.as_str(), text);
        assert_eq!(body.to_string(), text);
    }

    #[test]
    fn test_url_join() {
        let client = UpstreamClient::new(
            Some("http://upstream:5000/".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            client.url_for("/api/video/search").unwrap(),
            "http://upstream:5000/api/video/search"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_client_fails_fast() {
        let client = UpstreamClient::new(Some("  ".to_string()), Duration::from_secs(5)).unwrap();
        assert!(!client.is_configured());

        let err = client
            .send(Method::POST, "/api/documents/upload", RequestBody::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Configuration));
    }

    #[test]
    fn test_retryable_classification() {
        let status = |status| UpstreamError::Status {
            status,
            body: UpstreamBody::Opaque(String::new()),
        };
        assert!(status(503).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(UpstreamError::Transport("refused".to_string()).is_retryable());
        assert!(!UpstreamError::Configuration.is_retryable());
    }

    #[test]
    fn test_opaque_body_does_not_decode() {
        let response = UpstreamResponse {
            status: 200,
            body: UpstreamBody::Opaque("plain".to_string()),
        };
        assert!(matches!(response.decode::<Value>(), Err(UpstreamError::Decode(_))));
    }
}
