//! The publish pipeline: load, validate, pack, then send to the registry.
//!
//! Stages run strictly in order and each one fails fast. The temporary
//! archive is owned by this function's scope, so it is removed whether the
//! registry call succeeds or not.

use serde::Serialize;
use std::io;
use std::path::Path;

use crate::constants::DEFAULT_REGISTRY_URL;
use crate::error::{GeneralFailure, MeshError, MeshResult};
use crate::manifest::manifest_path;
use crate::pack::{PackResult, pack};
use crate::registry::{PublishResult, RegistryClient};
use crate::retry::RetryOptions;
use crate::validate::{ValidationWarning, validate_with_warnings};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Readme file name, matched case-insensitively at the top level.
const README_FILE: &str = "readme.md";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Inputs to [`publish`]. Resolved by the caller; the pipeline reads no environment.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Registry base URL.
    pub registry_url: String,

    /// Bearer token. Required unless `dry_run` is set.
    pub token: Option<String>,

    /// Stop after packing.
    pub dry_run: bool,

    /// Retry policy for record creation.
    pub retry: RetryOptions,
}

/// What a dry run would have published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRunSummary {
    /// Connector id.
    pub id: String,

    /// Version that would be published.
    pub version: String,

    /// Registry tags.
    pub tags: Vec<String>,

    /// `sha256:<hex>` of the archive that was built and discarded.
    pub checksum: String,

    /// Number of files in that archive.
    pub file_count: usize,
}

/// How the pipeline ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// Both protocol phases completed.
    Published(PublishResult),

    /// The network phase was skipped.
    DryRun(DryRunSummary),
}

/// Archive statistics reported alongside the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackStats {
    /// Number of files archived.
    pub file_count: usize,

    /// Total uncompressed size in bytes.
    pub total_size: u64,

    /// Archive size in bytes.
    pub compressed_size: u64,

    /// Relative paths left out of the archive.
    pub ignored_files: Vec<String>,
}

/// Everything a successful pipeline run produced.
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Published or dry run.
    pub outcome: PublishOutcome,

    /// Non-fatal validation findings.
    pub warnings: Vec<ValidationWarning>,

    /// Archive statistics.
    pub stats: PackStats,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PublishOptions {
    /// Options for publishing to `registry_url`.
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            registry_url: registry_url.into(),
            ..Self::default()
        }
    }

    /// Set the token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

impl From<&PackResult> for PackStats {
    fn from(pack: &PackResult) -> Self {
        Self {
            file_count: pack.file_count,
            total_size: pack.total_size,
            compressed_size: pack.compressed_size,
            ignored_files: pack.ignored_files.clone(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Publish the connector in `dir`.
pub async fn publish(dir: &Path, options: &PublishOptions) -> MeshResult<PublishReport> {
    ensure_directory(dir).await?;

    tracing::info!(dir = %dir.display(), "validating");
    let manifest_file = manifest_path(dir);
    let outcome = blocking("validate", move || validate_with_warnings(&manifest_file)).await?;
    let manifest = outcome.manifest;

    let client = if options.dry_run {
        None
    } else {
        Some(build_client(options)?)
    };

    tracing::info!(id = %manifest.id, "packing");
    let pack_dir = dir.to_path_buf();
    let packed = blocking("pack", move || pack(&pack_dir)).await?;
    let stats = PackStats::from(&packed);
    let manifest = manifest.with_checksum(&packed.checksum);

    let Some(client) = client else {
        tracing::info!(id = %manifest.id, checksum = %packed.checksum, "dry run, skipping upload");
        return Ok(PublishReport {
            outcome: PublishOutcome::DryRun(DryRunSummary {
                id: manifest.id.clone(),
                version: manifest.metadata.version.clone(),
                tags: manifest.metadata.tags.clone(),
                checksum: packed.checksum.clone(),
                file_count: packed.file_count,
            }),
            warnings: outcome.warnings,
            stats,
        });
    };

    let readme = read_readme(dir).await?;
    let archive_path = packed.archive.path();
    let bytes = tokio::fs::read(archive_path)
        .await
        .map_err(|e| MeshError::io(e, archive_path, "read"))?;

    tracing::info!(registry = %client.registry_url(), "publishing");
    let result = client
        .publish(&manifest, readme.as_deref(), bytes, &packed.checksum)
        .await?;

    Ok(PublishReport {
        outcome: PublishOutcome::Published(result),
        warnings: outcome.warnings,
        stats,
    })
}

/// Run synchronous filesystem work off the async runtime.
async fn blocking<T, F>(task: &str, f: F) -> MeshResult<T>
where
    F: FnOnce() -> MeshResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        MeshError::General(GeneralFailure {
            message: format!("{} task failed: {}", task, e),
            cause: Some(Box::new(e)),
        })
    })?
}

async fn ensure_directory(dir: &Path) -> MeshResult<()> {
    let metadata = tokio::fs::metadata(dir).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            MeshError::file_not_found(dir)
        } else {
            MeshError::io(e, dir, "read directory")
        }
    })?;

    if !metadata.is_dir() {
        return Err(MeshError::io(
            io::Error::from(io::ErrorKind::NotADirectory),
            dir,
            "read directory",
        ));
    }
    Ok(())
}

fn build_client(options: &PublishOptions) -> MeshResult<RegistryClient> {
    let token = options
        .token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(MeshError::missing_token)?
        .trim();

    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(MeshError::invalid_token(
            "the token contains whitespace or control characters",
        ));
    }

    Ok(RegistryClient::new(&options.registry_url)?
        .with_auth_token(token)
        .with_retry(options.retry.clone()))
}

/// Read the top-level readme, if there is one.
async fn read_readme(dir: &Path) -> MeshResult<Option<String>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| MeshError::io(e, dir, "read directory"))?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MeshError::io(e, dir, "read directory"))?
    {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.eq_ignore_ascii_case(README_FILE) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();

    let Some(path) = candidates.into_iter().next() else {
        return Ok(None);
    };
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| MeshError::io(e, &path, "read"))?;
    tracing::debug!(path = %path.display(), "including readme");
    Ok(Some(text))
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            token: None,
            dry_run: false,
            retry: RetryOptions::default(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ARCHIVE_FILE;
    use crate::error::ErrorKind;
    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{delete, post, put};
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn connector() -> TempDir {
        let dir = TempDir::new().unwrap();
        let manifest = json!({
            "$schema": "https://mcp.dev/schema/1.0",
            "id": "demo",
            "tools": [{ "name": "t", "description": "d" }],
            "_contextmesh": {
                "version": "0.1.0",
                "tags": ["x"],
                "language": "typescript",
                "repo": "https://github.com/a/b"
            }
        });
        std::fs::write(
            dir.path().join("mcp.json"),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("index.ts"), "export {}").unwrap();
        dir
    }

    #[derive(Default)]
    struct Recorder {
        creates: Mutex<Vec<serde_json::Value>>,
        deletes: Mutex<usize>,
    }

    /// Registry double whose upload endpoint answers with `upload_status`.
    async fn registry(upload_status: u16) -> (Arc<Recorder>, String) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let recorder = Arc::new(Recorder::default());

        let upload_url = format!("{}/upload", url);
        let app = Router::new()
            .route(
                "/v1/connectors",
                post(move |State(r): State<Arc<Recorder>>, body: Bytes| {
                    let upload_url = upload_url.clone();
                    async move {
                        r.creates
                            .lock()
                            .unwrap()
                            .push(serde_json::from_slice(&body).unwrap());
                        axum::Json(json!({
                            "id": "demo",
                            "version": "0.1.0",
                            "uploadUrl": upload_url,
                        }))
                    }
                }),
            )
            .route(
                "/upload",
                put(move || async move { StatusCode::from_u16(upload_status).unwrap() }),
            )
            .route(
                "/v1/connectors/{id}/versions/{version}",
                delete(|State(r): State<Arc<Recorder>>| async move {
                    *r.deletes.lock().unwrap() += 1;
                    StatusCode::NO_CONTENT
                }),
            )
            .with_state(recorder.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (recorder, url)
    }

    fn no_retry(url: &str) -> PublishOptions {
        PublishOptions::new(url)
            .with_token("tok")
            .with_retry(RetryOptions::none())
    }

    #[tokio::test]
    async fn test_dry_run_summarizes_without_network() {
        let dir = connector();
        let options = PublishOptions::new("http://127.0.0.1:9").with_dry_run(true);
        let report = publish(dir.path(), &options).await.unwrap();

        match report.outcome {
            PublishOutcome::DryRun(summary) => {
                assert_eq!(summary.id, "demo");
                assert_eq!(summary.version, "0.1.0");
                assert_eq!(summary.tags, vec!["x".to_string()]);
                assert!(summary.checksum.starts_with("sha256:"));
                assert_eq!(summary.file_count, 2);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(!dir.path().join(ARCHIVE_FILE).exists());
    }

    #[tokio::test]
    async fn test_publish_sends_checksum_and_readme() {
        let dir = connector();
        std::fs::write(dir.path().join("README.md"), "# Demo").unwrap();
        let (recorder, url) = registry(200).await;

        let report = publish(dir.path(), &no_retry(&url)).await.unwrap();
        let PublishOutcome::Published(result) = report.outcome else {
            panic!("expected a published outcome");
        };

        let body = recorder.creates.lock().unwrap()[0].clone();
        assert_eq!(body["readme"], "# Demo");
        assert_eq!(body["manifest"]["_contextmesh"]["checksum"], result.checksum);
        assert_eq!(result.upload_url, Some(format!("{}/upload", url)));
        assert!(!dir.path().join(ARCHIVE_FILE).exists());

        let on_disk = std::fs::read_to_string(dir.path().join("mcp.json")).unwrap();
        assert!(!on_disk.contains("checksum"));
    }

    #[tokio::test]
    async fn test_upload_failure_cleans_up_archive() {
        let dir = connector();
        let (recorder, url) = registry(500).await;

        let err = publish(dir.path(), &no_retry(&url)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(*recorder.deletes.lock().unwrap(), 1);
        assert!(!dir.path().join(ARCHIVE_FILE).exists());
    }

    #[tokio::test]
    async fn test_missing_token_is_auth_error() {
        let dir = connector();
        let err = publish(dir.path(), &PublishOptions::new("http://127.0.0.1:9"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(!dir.path().join(ARCHIVE_FILE).exists());
    }

    #[tokio::test]
    async fn test_malformed_token_is_auth_error() {
        let dir = connector();
        let options = PublishOptions::new("http://127.0.0.1:9").with_token("abc def");
        let err = publish(dir.path(), &options).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_invalid_manifest_stops_before_packing() {
        let dir = connector();
        std::fs::write(dir.path().join("mcp.json"), r#"{ "id": "demo" }"#).unwrap();
        let err = publish(dir.path(), &PublishOptions::default().with_dry_run(true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let err = publish(&dir.path().join("nope"), &PublishOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filesystem);
    }

    #[tokio::test]
    async fn test_readme_lookup_is_case_insensitive() {
        let dir = connector();
        assert_eq!(read_readme(dir.path()).await.unwrap(), None);

        std::fs::write(dir.path().join("readme.MD"), "hello").unwrap();
        assert_eq!(read_readme(dir.path()).await.unwrap().as_deref(), Some("hello"));
    }
}
