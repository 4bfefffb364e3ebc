//! Registry client for the two-phase publish protocol.
//!
//! Publishing first creates a metadata record (retried on transient
//! failures), then uploads the archive to the location the registry returns
//! (never retried). If the upload fails the client deletes the record it just
//! created, best-effort, and returns the upload error.

use reqwest::header::{CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{ARCHIVE_MEDIA_TYPE, HTTP_TIMEOUT};
use crate::error::{GeneralFailure, MeshError, MeshResult};
use crate::manifest::ConnectorManifest;
use crate::retry::{RetryOptions, with_retry};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// API version prefix.
const API_PREFIX: &str = "/v1";

/// User agent sent with every request.
const USER_AGENT: &str = concat!("contextmesh-cli/", env!("CARGO_PKG_VERSION"));

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Client for the connector registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    /// Registry base URL without a trailing slash.
    url: String,

    /// Bearer token.
    auth_token: Option<String>,

    /// Retry policy for record creation.
    retry: RetryOptions,

    /// HTTP client.
    http: Client,
}

/// Registry response to record creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedRecord {
    /// Connector id as stored by the registry.
    pub id: String,

    /// Version as stored by the registry.
    pub version: String,

    /// Where to upload the archive, if the registry wants it.
    #[serde(default, alias = "uploadUrl")]
    pub upload_url: Option<String>,
}

/// Outcome of a complete publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResult {
    /// Published connector id.
    pub id: String,

    /// Published version.
    pub version: String,

    /// `sha256:<hex>` of the uploaded archive.
    pub checksum: String,

    /// Location the archive was uploaded to.
    pub upload_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    manifest: &'a ConnectorManifest,
    #[serde(skip_serializing_if = "Option::is_none")]
    readme: Option<&'a str>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl RegistryClient {
    /// Create a client for the registry at `url`.
    pub fn new(url: impl Into<String>) -> MeshResult<Self> {
        let url = url.into().trim_end_matches('/').to_string();
        if reqwest::Url::parse(&url).is_err() {
            return Err(MeshError::general(format!("Invalid registry URL: {}", url)));
        }

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                MeshError::General(GeneralFailure {
                    message: format!("Failed to create HTTP client: {}", e),
                    cause: Some(Box::new(e)),
                })
            })?;

        Ok(Self {
            url,
            auth_token: None,
            retry: RetryOptions::default(),
            http,
        })
    }

    /// Set the authentication token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the retry policy used for record creation.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Get the registry URL.
    pub fn registry_url(&self) -> &str {
        &self.url
    }

    /// Check if authentication is configured.
    pub fn has_auth(&self) -> bool {
        self.auth_token.is_some()
    }

    /// Run both protocol phases, compensating if the upload fails.
    ///
    /// `manifest` must already carry `checksum`.
    pub async fn publish(
        &self,
        manifest: &ConnectorManifest,
        readme: Option<&str>,
        archive: Vec<u8>,
        checksum: &str,
    ) -> MeshResult<PublishResult> {
        let record = self.create_record(manifest, readme).await?;

        if let Some(upload_url) = &record.upload_url
            && let Err(err) = self.upload_artifact(upload_url, archive).await
        {
            self.compensate(&record).await;
            return Err(err);
        }

        tracing::info!(id = %record.id, version = %record.version, "published");
        Ok(PublishResult {
            id: record.id,
            version: record.version,
            checksum: checksum.to_string(),
            upload_url: record.upload_url,
        })
    }

    /// Create the metadata record. Retried per the client's policy.
    pub async fn create_record(
        &self,
        manifest: &ConnectorManifest,
        readme: Option<&str>,
    ) -> MeshResult<CreatedRecord> {
        let token = self.token()?;
        let endpoint = format!("{}{}/connectors", self.url, API_PREFIX);
        let body = CreateRecordRequest { manifest, readme };

        let response = with_retry(&self.retry, |attempt| {
            tracing::debug!(attempt, endpoint = %endpoint, "creating record");
            let request = self.http.post(&endpoint).bearer_auth(token).json(&body);
            let endpoint = endpoint.as_str();
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| MeshError::transport(e, endpoint))?;
                check_response(response, endpoint).await
            }
        })
        .await?;

        let text = response
            .text()
            .await
            .map_err(|e| MeshError::transport(e, &endpoint))?;
        serde_json::from_str(&text).map_err(|e| {
            MeshError::General(GeneralFailure {
                message: format!("Unexpected response from the registry: {}", e),
                cause: Some(Box::new(e)),
            })
        })
    }

    /// Upload the archive bytes. Never retried.
    pub async fn upload_artifact(&self, upload_url: &str, archive: Vec<u8>) -> MeshResult<()> {
        let size = archive.len();
        tracing::debug!(size, "uploading archive");

        let response = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, ARCHIVE_MEDIA_TYPE)
            .body(archive)
            .send()
            .await
            .map_err(|e| MeshError::transport(e, upload_url))?;
        check_response(response, upload_url).await?;

        tracing::debug!(size, "archive uploaded");
        Ok(())
    }

    /// Delete a record created by [`create_record`](Self::create_record).
    pub async fn delete_record(&self, id: &str, version: &str) -> MeshResult<()> {
        let token = self.token()?;
        let endpoint = format!(
            "{}{}/connectors/{}/versions/{}",
            self.url, API_PREFIX, id, version
        );

        let response = self
            .http
            .delete(&endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| MeshError::transport(e, &endpoint))?;
        check_response(response, &endpoint).await?;
        Ok(())
    }

    async fn compensate(&self, record: &CreatedRecord) {
        match self.delete_record(&record.id, &record.version).await {
            Ok(()) => tracing::info!(
                id = %record.id,
                version = %record.version,
                "upload failed, removed the created record"
            ),
            Err(err) => tracing::warn!(
                id = %record.id,
                version = %record.version,
                error = %err,
                "upload failed and the created record could not be removed"
            ),
        }
    }

    fn token(&self) -> MeshResult<&str> {
        self.auth_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(MeshError::missing_token)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pass successful responses through; translate the rest via the status table.
async fn check_response(response: Response, endpoint: &str) -> MeshResult<Response> {
    let status = response.status();
    tracing::debug!(status = status.as_u16(), endpoint, "response");
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    let body = response.text().await.unwrap_or_default();
    let detail = extract_detail(&body);

    Err(MeshError::http_status(
        status.as_u16(),
        endpoint,
        detail.as_deref(),
        retry_after,
    ))
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP-date.
///
/// A date in the past yields zero.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// The server's explanation from an error body: a JSON `message`, `error` or
/// `detail` string, else the raw text.
fn extract_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }

    Some(body.to_string())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{delete, post, put};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const CHECKSUM: &str =
        "sha256:0000000000000000000000000000000000000000000000000000000000000000";

    /// In-process registry double.
    struct Stub {
        addr: SocketAddr,
        create_script: Mutex<VecDeque<u16>>,
        upload_status: u16,
        creates: AtomicUsize,
        auth_headers: Mutex<Vec<Option<String>>>,
        create_bodies: Mutex<Vec<serde_json::Value>>,
        uploads: Mutex<Vec<(Option<String>, Vec<u8>)>>,
        deletes: Mutex<Vec<String>>,
    }

    async fn create(
        State(stub): State<Arc<Stub>>,
        headers: HeaderMap,
        body: Bytes,
    ) -> AxumResponse {
        stub.creates.fetch_add(1, Ordering::SeqCst);
        stub.auth_headers.lock().unwrap().push(
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        );
        stub.create_bodies
            .lock()
            .unwrap()
            .push(serde_json::from_slice(&body).unwrap());

        let scripted = stub.create_script.lock().unwrap().pop_front();
        match scripted {
            Some(429) => (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", "0")],
                "slow down",
            )
                .into_response(),
            Some(422) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                axum::Json(json!({ "message": "tag \"x\" is reserved" })),
            )
                .into_response(),
            Some(code) => StatusCode::from_u16(code).unwrap().into_response(),
            None => (
                StatusCode::CREATED,
                axum::Json(json!({
                    "id": "demo",
                    "version": "0.1.0",
                    "upload_url": format!("http://{}/upload/demo", stub.addr),
                })),
            )
                .into_response(),
        }
    }

    async fn upload(
        State(stub): State<Arc<Stub>>,
        Path(_id): Path<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> StatusCode {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        stub.uploads
            .lock()
            .unwrap()
            .push((content_type, body.to_vec()));
        StatusCode::from_u16(stub.upload_status).unwrap()
    }

    async fn remove(
        State(stub): State<Arc<Stub>>,
        Path((id, version)): Path<(String, String)>,
    ) -> StatusCode {
        stub.deletes
            .lock()
            .unwrap()
            .push(format!("{}/{}", id, version));
        StatusCode::NO_CONTENT
    }

    async fn start(create_script: Vec<u16>, upload_status: u16) -> (Arc<Stub>, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let stub = Arc::new(Stub {
            addr,
            create_script: Mutex::new(create_script.into()),
            upload_status,
            creates: AtomicUsize::new(0),
            auth_headers: Mutex::new(Vec::new()),
            create_bodies: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/connectors", post(create))
            .route("/upload/{id}", put(upload))
            .route("/v1/connectors/{id}/versions/{version}", delete(remove))
            .with_state(stub.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (stub, format!("http://{}", addr))
    }

    fn manifest() -> ConnectorManifest {
        serde_json::from_value(json!({
            "$schema": "https://mcp.dev/schema/1.0",
            "id": "demo",
            "tools": [{ "name": "t", "description": "d" }],
            "_contextmesh": {
                "version": "0.1.0",
                "tags": ["x"],
                "language": "typescript",
                "repo": "https://github.com/a/b",
                "checksum": CHECKSUM
            }
        }))
        .unwrap()
    }

    fn client(url: &str) -> RegistryClient {
        RegistryClient::new(url)
            .unwrap()
            .with_auth_token("tok")
            .with_retry(RetryOptions {
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
                ..Default::default()
            })
    }

    #[tokio::test]
    async fn test_publish_creates_then_uploads() {
        let (stub, url) = start(vec![], 200).await;
        let result = client(&url)
            .publish(&manifest(), Some("# Demo"), b"archive".to_vec(), CHECKSUM)
            .await
            .unwrap();

        assert_eq!(result.id, "demo");
        assert_eq!(result.version, "0.1.0");
        assert_eq!(result.checksum, CHECKSUM);
        assert_eq!(
            result.upload_url.as_deref(),
            Some(format!("{}/upload/demo", url).as_str())
        );

        assert_eq!(
            stub.auth_headers.lock().unwrap()[0].as_deref(),
            Some("Bearer tok")
        );
        let body = stub.create_bodies.lock().unwrap()[0].clone();
        assert_eq!(body["readme"], "# Demo");
        assert_eq!(body["manifest"]["id"], "demo");
        assert_eq!(body["manifest"]["_contextmesh"]["checksum"], CHECKSUM);

        let uploads = stub.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0.as_deref(), Some("application/gzip"));
        assert_eq!(uploads[0].1, b"archive");
        assert!(stub.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_readme_is_omitted_when_absent() {
        let (stub, url) = start(vec![], 200).await;
        client(&url)
            .publish(&manifest(), None, Vec::new(), CHECKSUM)
            .await
            .unwrap();
        let body = stub.create_bodies.lock().unwrap()[0].clone();
        assert!(body.get("readme").is_none());
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried() {
        let (stub, url) = start(vec![409], 200).await;
        let err = client(&url)
            .publish(&manifest(), None, Vec::new(), CHECKSUM)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.to_string(), "Conflict: resource already exists");
        assert!(!err.retryable());
        assert_eq!(stub.creates.load(Ordering::SeqCst), 1);
        assert!(stub.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let (stub, url) = start(vec![429], 200).await;
        let result = client(&url)
            .publish(&manifest(), None, Vec::new(), CHECKSUM)
            .await
            .unwrap();

        assert_eq!(result.id, "demo");
        assert_eq!(stub.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_attempts() {
        let (stub, url) = start(vec![503, 503, 503, 503], 200).await;
        let err = client(&url)
            .publish(&manifest(), None, Vec::new(), CHECKSUM)
            .await
            .unwrap_err();

        assert!(err.retryable());
        match err {
            MeshError::Network(n) => assert_eq!(n.status_code, Some(503)),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(stub.creates.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unprocessable_includes_server_detail() {
        let (_stub, url) = start(vec![422], 200).await;
        let err = client(&url)
            .publish(&manifest(), None, Vec::new(), CHECKSUM)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed on the registry: tag \"x\" is reserved"
        );
    }

    #[tokio::test]
    async fn test_failed_upload_deletes_record_and_is_not_retried() {
        let (stub, url) = start(vec![], 500).await;
        let err = client(&url)
            .publish(&manifest(), None, b"archive".to_vec(), CHECKSUM)
            .await
            .unwrap_err();

        match &err {
            MeshError::Network(n) => {
                assert_eq!(n.status_code, Some(500));
                assert_eq!(
                    n.endpoint.as_deref(),
                    Some(format!("{}/upload/demo", url).as_str())
                );
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(stub.uploads.lock().unwrap().len(), 1);
        assert_eq!(*stub.deletes.lock().unwrap(), vec!["demo/0.1.0".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let (stub, url) = start(vec![], 200).await;
        let err = RegistryClient::new(&url)
            .unwrap()
            .publish(&manifest(), None, Vec::new(), CHECKSUM)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.exit_code(), 2);
        assert_eq!(stub.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&url)
            .with_retry(RetryOptions::none())
            .create_record(&manifest(), None)
            .await
            .unwrap_err();
        match err {
            MeshError::Network(n) => assert_eq!(n.status_code, None),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable_whatever_the_path() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/dns-gateway/reset", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&url)
            .with_retry(RetryOptions::none())
            .create_record(&manifest(), None)
            .await
            .unwrap_err();
        assert!(err.retryable());
        assert!(err.to_string().starts_with("Connection refused"), "{}", err);
    }

    #[tokio::test]
    async fn test_server_error_retry_after_is_kept() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/busy", listener.local_addr().unwrap());
        let app = Router::new().route(
            "/busy",
            post(|| async {
                (StatusCode::SERVICE_UNAVAILABLE, [("retry-after", "120")], "busy")
            }),
        );
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let response = reqwest::Client::new().post(&url).send().await.unwrap();
        let err = check_response(response, &url).await.unwrap_err();
        assert!(err.retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));

        let options = RetryOptions::default();
        assert_eq!(
            crate::retry::compute_delay(&options, 1, &err),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = RegistryClient::new("https://api.contextmesh.io/").unwrap();
        assert_eq!(client.registry_url(), "https://api.contextmesh.io");
        assert!(!client.has_auth());
        assert!(RegistryClient::new("not a url").is_err());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::ZERO));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon"), None);
    }

    #[test]
    fn test_extract_detail() {
        assert_eq!(
            extract_detail(r#"{"error":"bad tag"}"#).as_deref(),
            Some("bad tag")
        );
        assert_eq!(extract_detail("plain text").as_deref(), Some("plain text"));
        assert_eq!(extract_detail("  "), None);
    }
}
