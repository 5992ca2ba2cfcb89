//! Drive client implementation
//!
//! Wraps a reqwest client and implements the DriveStore trait from gd-core.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use gd_core::traits::MIN_FIELDS;
use gd_core::{
    DriveConfig, DriveStore, Error, ListPage, ListRequest, Node, NodeKind, Result, RetryConfig,
};

use crate::query;

/// Drive v3 client
pub struct DriveClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    retry: RetryConfig,
}

impl std::fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveClient")
            .field("endpoint", &self.endpoint)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl DriveClient {
    /// Create a new client from the drive configuration and an access token
    pub fn new(config: &DriveConfig, token: impl Into<String>) -> Result<Self> {
        let endpoint = url::Url::parse(&config.endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Unsupported endpoint scheme: {}",
                endpoint.scheme()
            )));
        }

        let token = token.into();
        if token.is_empty() {
            return Err(Error::Config("An access token is required".into()));
        }

        let timeout = config.timeout.clone().unwrap_or_default();
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeout.connect_ms))
            .timeout(Duration::from_millis(timeout.read_ms))
            .user_agent(concat!("gd/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token,
            retry: config.retry.clone().unwrap_or_default(),
        })
    }

    /// GET a JSON resource, retrying rate limits and server errors
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let sent = self
                .http
                .get(url)
                .bearer_auth(&self.token)
                .query(params)
                .send()
                .await;

            let (error, retry_after) = match sent {
                Ok(response) if response.status().is_success() => {
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| {
                            Error::transport(502, format!("Failed to read response: {e}"))
                        })?;
                    return Ok(serde_json::from_slice(&body)?);
                }
                Ok(response) => {
                    let status = response.status();
                    let retry_after = retry_after_header(&response);
                    let body = response.text().await.unwrap_or_default();
                    let error = Error::transport(status.as_u16(), error_message(status, &body));
                    if !is_retryable(status) {
                        return Err(error);
                    }
                    (error, retry_after)
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    (Error::transport(503, format!("Request failed: {e}")), None)
                }
                Err(e) => return Err(Error::transport(503, format!("Request failed: {e}"))),
            };

            if attempt >= attempts {
                return Err(error);
            }
            let wait = retry_after.unwrap_or_else(|| backoff_delay(&self.retry, attempt));
            warn!(%error, attempt, ?wait, "retrying request");
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl DriveStore for DriveClient {
    async fn list(&self, request: ListRequest) -> Result<ListPage> {
        let params = query::list_params(&request, &[]);
        debug!(q = %params[0].1, page_size = request.page_size, "files.list");

        let url = format!("{}/files", self.endpoint);
        let list: FileList = self.get_json(&url, &params).await?;
        Ok(ListPage {
            items: list.files.into_iter().map(Node::from).collect(),
            next_page_token: list.next_page_token,
        })
    }

    async fn get_by_id(&self, id: &str) -> Result<Node> {
        debug!(id, "files.get");
        let url = format!("{}/files/{}", self.endpoint, id);
        let params = [("fields", MIN_FIELDS.to_string())];
        let file: DriveFile = self.get_json(&url, &params).await?;
        Ok(file.into())
    }
}

/// Statuses worth another attempt
pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Exponential backoff before retry number `attempt` (1-based), capped
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    let millis = retry
        .initial_backoff_ms
        .saturating_mul(factor)
        .min(retry.max_backoff_ms);
    Duration::from_millis(millis)
}

fn retry_after_header(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Pull the API's error message out of a failure body
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string())
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

/// File resource as the API returns it
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    #[serde(default)]
    parents: Vec<String>,
    /// Sent as a decimal string
    size: Option<String>,
    modified_time: Option<jiff::Timestamp>,
}

impl From<DriveFile> for Node {
    fn from(file: DriveFile) -> Self {
        Node {
            kind: NodeKind::from_mime_type(&file.mime_type),
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            parents: file.parents,
            size: file.size.and_then(|s| s.parse().ok()),
            modified_time: file.modified_time,
            file_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_resource_to_node() {
        let json = r#"{
            "id": "1aBc",
            "name": "flyer.pdf",
            "mimeType": "application/pdf",
            "parents": ["0AXyz"],
            "size": "2048",
            "modifiedTime": "2024-03-01T10:15:00.000Z"
        }"#;
        let node: Node = serde_json::from_str::<DriveFile>(json).unwrap().into();
        assert_eq!(node.kind, NodeKind::File);
        assert_eq!(node.size, Some(2048));
        assert_eq!(node.parents, vec!["0AXyz".to_string()]);
        assert_eq!(
            node.modified_time.unwrap().to_string(),
            "2024-03-01T10:15:00Z"
        );
    }

    #[test]
    fn test_root_resource() {
        let json = r#"{
            "id": "0AXyz",
            "name": "My Drive",
            "mimeType": "application/vnd.google-apps.folder"
        }"#;
        let node: Node = serde_json::from_str::<DriveFile>(json).unwrap().into();
        assert!(node.is_root());
        assert!(node.is_folder());
        assert!(node.size.is_none());
    }

    #[test]
    fn test_file_list() {
        let json = r#"{"nextPageToken": "p2", "files": [
            {"id": "a", "name": "a", "mimeType": "text/plain", "parents": ["r"]}
        ]}"#;
        let list: FileList = serde_json::from_str(json).unwrap();
        assert_eq!(list.files.len(), 1);
        assert_eq!(list.next_page_token.as_deref(), Some("p2"));

        let empty: FileList = serde_json::from_str("{}").unwrap();
        assert!(empty.files.is_empty());
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error": {"code": 404, "message": "File not found: xyz."}}"#;
        assert_eq!(error_message(StatusCode::NOT_FOUND, body), "File not found: xyz.");
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>"),
            "502 Bad Gateway"
        );
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
        };
        assert_eq!(backoff_delay(&retry, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&retry, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(&retry, 4), Duration::from_millis(800));
        assert_eq!(backoff_delay(&retry, 5), Duration::from_millis(1000));
        assert_eq!(backoff_delay(&retry, 64), Duration::from_millis(1000));
    }

    #[test]
    fn test_client_config_validation() {
        let config = DriveConfig::default();
        assert!(DriveClient::new(&config, "token").is_ok());
        assert!(matches!(
            DriveClient::new(&config, ""),
            Err(Error::Config(_))
        ));

        let bad = DriveConfig {
            endpoint: "not a url".into(),
            ..DriveConfig::default()
        };
        assert!(matches!(DriveClient::new(&bad, "token"), Err(Error::InvalidUrl(_))));

        let ftp = DriveConfig {
            endpoint: "ftp://example.com".into(),
            ..DriveConfig::default()
        };
        assert!(matches!(DriveClient::new(&ftp, "token"), Err(Error::Config(_))));
    }
}
