//! Error types for contextmesh-cli.
//!
//! Every failure the publish pipeline can surface is one of five kinds, each
//! with its own exit code and a fixed payload. Factories on [`MeshError`]
//! own the known-cause-to-message tables so call sites never format user
//! messages themselves.

use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{DEFAULT_RATE_LIMIT_DELAY, REGISTRY_TOKEN_ENV};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Result type for contextmesh-cli operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// Boxed underlying cause attached to an error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Manifest failed schema or semantic validation.
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,

    /// Transport or HTTP failure talking to the registry.
    #[serde(rename = "NETWORK_ERROR")]
    Network,

    /// Missing or unusable credentials.
    #[serde(rename = "AUTH_ERROR")]
    Auth,

    /// Reading the connector directory or writing the archive failed.
    #[serde(rename = "FILESYSTEM_ERROR")]
    Filesystem,

    /// Anything not classified above.
    #[serde(rename = "GENERAL_ERROR")]
    General,
}

/// Error type for contextmesh-cli operations.
#[derive(Debug, Error)]
pub enum MeshError {
    /// Manifest validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    /// Registry communication failed.
    #[error(transparent)]
    Network(#[from] NetworkFailure),

    /// Credentials are missing or rejected.
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    /// Filesystem operation failed.
    #[error(transparent)]
    Filesystem(#[from] FilesystemFailure),

    /// Unclassified failure.
    #[error(transparent)]
    General(#[from] GeneralFailure),
}

/// A single located manifest violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// JSON-pointer-like path of the offending field (e.g. `/_contextmesh/version`).
    pub field: String,

    /// Human-readable message.
    pub message: String,

    /// Best-effort 1-based line of the field in the manifest text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,

    /// Best-effort 1-based column of the field in the manifest text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,

    /// How to fix it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Payload of [`MeshError::Validation`].
///
/// Holds at least one violation: the first is promoted to the error message,
/// the rest are kept for verbose display.
#[derive(Debug, Error)]
#[error("{}", .primary.message)]
pub struct ValidationFailure {
    /// The violation shown as the error message.
    pub primary: FieldViolation,

    /// Remaining violations, in discovery order.
    pub additional: Vec<FieldViolation>,

    /// Manifest the violations were found in.
    pub manifest_path: Option<PathBuf>,
}

/// Payload of [`MeshError::Network`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct NetworkFailure {
    /// Human-readable message.
    pub message: String,

    /// HTTP status, absent for connection-level failures.
    pub status_code: Option<u16>,

    /// URL the request was sent to.
    pub endpoint: Option<String>,

    /// Whether the request may be re-attempted.
    pub retryable: bool,

    /// Server-supplied wait before the next attempt.
    pub retry_after: Option<Duration>,

    /// How to fix it.
    pub suggestion: Option<String>,

    /// Underlying transport error.
    #[source]
    pub cause: Option<BoxError>,
}

/// Payload of [`MeshError::Auth`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthFailure {
    /// Human-readable message.
    pub message: String,

    /// Whether a token was supplied at all.
    pub token_present: bool,

    /// How to fix it.
    pub suggestion: Option<String>,
}

/// Payload of [`MeshError::Filesystem`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FilesystemFailure {
    /// Named failure variant.
    pub code: FsErrorCode,

    /// Human-readable message.
    pub message: String,

    /// Path the operation touched.
    pub path: Option<PathBuf>,

    /// Operation being performed (e.g. "read", "create archive").
    pub operation: Option<String>,

    /// How to fix it.
    pub suggestion: Option<String>,

    /// Underlying I/O or parser error.
    #[source]
    pub cause: Option<BoxError>,
}

/// Payload of [`MeshError::General`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GeneralFailure {
    /// Human-readable message.
    pub message: String,

    /// Underlying error, if any.
    #[source]
    pub cause: Option<BoxError>,
}

/// Named filesystem failure variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FsErrorCode {
    /// ENOENT.
    NotFound,
    /// EACCES / EPERM.
    PermissionDenied,
    /// EISDIR.
    IsADirectory,
    /// ENOTDIR.
    NotADirectory,
    /// EEXIST.
    AlreadyExists,
    /// ENOSPC.
    NoSpace,
    /// EMFILE.
    TooManyOpenFiles,
    /// File exists but cannot be parsed.
    InvalidContent,
    /// Archive stream could not be written.
    ArchiveCreation,
    /// Anything else.
    Other,
}

/// Connection-level failures that never produced an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// The remote refused the connection.
    Refused,
    /// The host name did not resolve.
    UnresolvedHost,
    /// The request timed out.
    TimedOut,
    /// The connection was reset mid-request.
    Reset,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ErrorKind {
    /// Process exit code for this kind.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::General => 1,
            ErrorKind::Auth => 2,
            ErrorKind::Validation => 3,
            ErrorKind::Network => 4,
            ErrorKind::Filesystem => 5,
        }
    }

    /// Stable machine name.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Filesystem => "FILESYSTEM_ERROR",
            ErrorKind::General => "GENERAL_ERROR",
        }
    }
}

impl FsErrorCode {
    /// Map an I/O error onto a named variant.
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => return FsErrorCode::NotFound,
            io::ErrorKind::PermissionDenied => return FsErrorCode::PermissionDenied,
            io::ErrorKind::AlreadyExists => return FsErrorCode::AlreadyExists,
            io::ErrorKind::IsADirectory => return FsErrorCode::IsADirectory,
            io::ErrorKind::NotADirectory => return FsErrorCode::NotADirectory,
            io::ErrorKind::StorageFull => return FsErrorCode::NoSpace,
            io::ErrorKind::InvalidData => return FsErrorCode::InvalidContent,
            _ => {}
        }

        // Older platforms report some of these only through the raw errno.
        match err.raw_os_error() {
            Some(2) => FsErrorCode::NotFound,
            Some(1) | Some(13) => FsErrorCode::PermissionDenied,
            Some(17) => FsErrorCode::AlreadyExists,
            Some(20) => FsErrorCode::NotADirectory,
            Some(21) => FsErrorCode::IsADirectory,
            Some(24) => FsErrorCode::TooManyOpenFiles,
            Some(28) => FsErrorCode::NoSpace,
            _ => FsErrorCode::Other,
        }
    }

    /// Map a conventional error code string (`ENOENT`, `EACCES`, ...) onto a variant.
    pub fn from_code_str(code: &str) -> Option<Self> {
        let code = match code {
            "ENOENT" => FsErrorCode::NotFound,
            "EACCES" | "EPERM" => FsErrorCode::PermissionDenied,
            "EISDIR" => FsErrorCode::IsADirectory,
            "ENOTDIR" => FsErrorCode::NotADirectory,
            "EEXIST" => FsErrorCode::AlreadyExists,
            "ENOSPC" => FsErrorCode::NoSpace,
            "EMFILE" => FsErrorCode::TooManyOpenFiles,
            _ => return None,
        };
        Some(code)
    }

    /// Message and suggestion for this variant at `path`.
    fn describe(self, path: &str) -> (String, &'static str) {
        match self {
            FsErrorCode::NotFound => (
                format!("File not found: {}", path),
                "Verify the path and rerun the command.",
            ),
            FsErrorCode::PermissionDenied => (
                format!("Permission denied: {}", path),
                "Check the file permissions or run from a directory you own.",
            ),
            FsErrorCode::IsADirectory => (
                format!("Expected a file but found a directory: {}", path),
                "Point the command at the manifest file, not a directory.",
            ),
            FsErrorCode::NotADirectory => (
                format!("Expected a directory but found a file: {}", path),
                "Pass the connector directory instead of a file.",
            ),
            FsErrorCode::AlreadyExists => (
                format!("File already exists: {}", path),
                "Remove the existing file or choose another location.",
            ),
            FsErrorCode::NoSpace => (
                format!("No space left on device while writing {}", path),
                "Free up disk space and rerun the command.",
            ),
            FsErrorCode::TooManyOpenFiles => (
                format!("Too many open files while accessing {}", path),
                "Raise the open file limit (ulimit -n) and rerun the command.",
            ),
            FsErrorCode::InvalidContent => (
                format!("Invalid file content: {}", path),
                "Fix the syntax error reported above.",
            ),
            FsErrorCode::ArchiveCreation => (
                format!("Failed to create archive: {}", path),
                "Check that the connector directory is readable and the disk is writable.",
            ),
            FsErrorCode::Other => (
                format!("Filesystem error: {}", path),
                "Check the path and rerun the command.",
            ),
        }
    }
}

impl ConnectionFailure {
    /// Message, retryability and suggestion for this failure.
    fn describe(self, endpoint: &str) -> (String, bool, &'static str) {
        match self {
            ConnectionFailure::Refused => (
                format!("Connection refused: could not reach {}", endpoint),
                true,
                "Check that the registry is reachable and try again.",
            ),
            ConnectionFailure::UnresolvedHost => (
                format!("Host not found: could not resolve {}", endpoint),
                false,
                "Check the --registry URL and your DNS settings.",
            ),
            ConnectionFailure::TimedOut => (
                format!("Request timed out: {}", endpoint),
                true,
                "The registry may be slow or unreachable. Try again later.",
            ),
            ConnectionFailure::Reset => (
                format!("Connection reset by {}", endpoint),
                true,
                "The connection dropped mid-request. Try again.",
            ),
        }
    }
}

impl ValidationFailure {
    /// All violations, primary first.
    pub fn violations(&self) -> impl Iterator<Item = &FieldViolation> {
        std::iter::once(&self.primary).chain(self.additional.iter())
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        1 + self.additional.len()
    }

    /// Always false: a validation failure carries at least one violation.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl MeshError {
    //----------------------------------------------------------------------------------------------
    // Accessors
    //----------------------------------------------------------------------------------------------

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::Validation(_) => ErrorKind::Validation,
            MeshError::Network(_) => ErrorKind::Network,
            MeshError::Auth(_) => ErrorKind::Auth,
            MeshError::Filesystem(_) => ErrorKind::Filesystem,
            MeshError::General(_) => ErrorKind::General,
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Whether a retry may succeed. Only network errors can be retryable.
    pub fn retryable(&self) -> bool {
        match self {
            MeshError::Network(n) => n.retryable,
            _ => false,
        }
    }

    /// Server-supplied wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            MeshError::Network(n) => n.retry_after,
            _ => None,
        }
    }

    /// Suggested fix, if one is known.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            MeshError::Validation(v) => v.primary.suggestion.as_deref(),
            MeshError::Network(n) => n.suggestion.as_deref(),
            MeshError::Auth(a) => a.suggestion.as_deref(),
            MeshError::Filesystem(f) => f.suggestion.as_deref(),
            MeshError::General(_) => None,
        }
    }

    //----------------------------------------------------------------------------------------------
    // Validation
    //----------------------------------------------------------------------------------------------

    /// Build a validation error from a primary violation and any others.
    pub fn validation(primary: FieldViolation, additional: Vec<FieldViolation>) -> Self {
        MeshError::Validation(ValidationFailure {
            primary,
            additional,
            manifest_path: None,
        })
    }

    /// Build a validation error from an ordered list, or `None` if it is empty.
    pub fn from_violations(mut violations: Vec<FieldViolation>) -> Option<Self> {
        if violations.is_empty() {
            return None;
        }
        let primary = violations.remove(0);
        Some(Self::validation(primary, violations))
    }

    /// Attach the manifest path to a validation error; other kinds pass through.
    pub fn with_manifest_path(self, path: &Path) -> Self {
        match self {
            MeshError::Validation(mut v) => {
                v.manifest_path = Some(path.to_path_buf());
                MeshError::Validation(v)
            }
            other => other,
        }
    }

    //----------------------------------------------------------------------------------------------
    // Filesystem
    //----------------------------------------------------------------------------------------------

    /// The path does not exist.
    pub fn file_not_found(path: &Path) -> Self {
        Self::filesystem(FsErrorCode::NotFound, path, Some("read"), None)
    }

    /// Translate an I/O error on `path` through the code table.
    pub fn io(err: io::Error, path: &Path, operation: &str) -> Self {
        let code = FsErrorCode::from_io(&err);
        Self::filesystem(code, path, Some(operation), Some(Box::new(err)))
    }

    /// The file exists but is not valid manifest content.
    pub fn invalid_content(path: &Path, parser_message: impl fmt::Display) -> Self {
        let display = path.display().to_string();
        MeshError::Filesystem(FilesystemFailure {
            code: FsErrorCode::InvalidContent,
            message: format!("Invalid file content: {}: {}", display, parser_message),
            path: Some(path.to_path_buf()),
            operation: Some("parse".into()),
            suggestion: Some("Fix the syntax error and make sure the file is valid JSON.".into()),
            cause: None,
        })
    }

    /// The archive stream failed.
    pub fn archive_creation(path: &Path, reason: impl Into<BoxError>) -> Self {
        let reason = reason.into();
        MeshError::Filesystem(FilesystemFailure {
            code: FsErrorCode::ArchiveCreation,
            message: format!("Failed to create archive: {}", reason),
            path: Some(path.to_path_buf()),
            operation: Some("create archive".into()),
            suggestion: Some(
                "Check that the connector directory is readable and the disk is writable.".into(),
            ),
            cause: Some(reason),
        })
    }

    fn filesystem(
        code: FsErrorCode,
        path: &Path,
        operation: Option<&str>,
        cause: Option<BoxError>,
    ) -> Self {
        let (message, suggestion) = code.describe(&path.display().to_string());
        MeshError::Filesystem(FilesystemFailure {
            code,
            message,
            path: Some(path.to_path_buf()),
            operation: operation.map(String::from),
            suggestion: Some(suggestion.into()),
            cause,
        })
    }

    //----------------------------------------------------------------------------------------------
    // Network
    //----------------------------------------------------------------------------------------------

    /// Translate a non-success HTTP status through the status table.
    ///
    /// `detail` is the server's own explanation, appended for 422 responses.
    /// `retry_after` is the parsed `Retry-After` header, kept for 429 and 5xx.
    pub fn http_status(
        status: u16,
        endpoint: &str,
        detail: Option<&str>,
        retry_after: Option<Duration>,
    ) -> Self {
        let (message, suggestion, retryable, retry_after) = match status {
            400 => (
                "Bad request: the registry rejected the request payload".to_string(),
                "Check the manifest for fields the registry does not accept.".to_string(),
                false,
                None,
            ),
            401 => (
                "Authentication failed: the registry rejected the token".to_string(),
                format!("Check --token or the {} environment variable.", REGISTRY_TOKEN_ENV),
                false,
                None,
            ),
            403 => (
                "Forbidden: the token is not allowed to publish this connector".to_string(),
                "Make sure you own this connector id or ask an owner for access.".to_string(),
                false,
                None,
            ),
            404 => (
                "Not found: the registry endpoint does not exist".to_string(),
                "Check the --registry URL.".to_string(),
                false,
                None,
            ),
            409 => (
                "Conflict: resource already exists".to_string(),
                "This version is already published. Bump _contextmesh.version and publish again."
                    .to_string(),
                false,
                None,
            ),
            413 => (
                "Payload too large: the archive exceeds the registry size limit".to_string(),
                "Remove large files from the connector directory and publish again.".to_string(),
                false,
                None,
            ),
            422 => {
                let message = match detail {
                    Some(d) if !d.is_empty() => {
                        format!("Validation failed on the registry: {}", d)
                    }
                    _ => "Validation failed on the registry".to_string(),
                };
                (
                    message,
                    "Fix the reported problem in the manifest and publish again.".to_string(),
                    false,
                    None,
                )
            }
            429 => (
                "Rate limited: too many requests".to_string(),
                "Wait a moment before publishing again.".to_string(),
                true,
                Some(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_DELAY)),
            ),
            500..=599 => (
                format!("Server error ({}): the registry failed to handle the request", status),
                "This is likely temporary. Try again later.".to_string(),
                true,
                retry_after,
            ),
            _ => (
                format!("Unexpected response from the registry ({})", status),
                "Check the --registry URL and try again.".to_string(),
                false,
                None,
            ),
        };

        MeshError::Network(NetworkFailure {
            message,
            status_code: Some(status),
            endpoint: Some(endpoint.to_string()),
            retryable,
            retry_after,
            suggestion: Some(suggestion),
            cause: None,
        })
    }

    /// A connection-level failure.
    pub fn connection(kind: ConnectionFailure, endpoint: &str, cause: Option<BoxError>) -> Self {
        let (message, retryable, suggestion) = kind.describe(endpoint);
        MeshError::Network(NetworkFailure {
            message,
            status_code: None,
            endpoint: Some(endpoint.to_string()),
            retryable,
            retry_after: None,
            suggestion: Some(suggestion.into()),
            cause,
        })
    }

    /// Translate a reqwest transport error.
    pub fn transport(err: reqwest::Error, endpoint: &str) -> Self {
        if let Some(status) = err.status() {
            return Self::http_status(status.as_u16(), endpoint, None, None);
        }
        let kind = classify_transport(&err);
        Self::connection(kind, endpoint, Some(Box::new(err)))
    }

    //----------------------------------------------------------------------------------------------
    // Auth
    //----------------------------------------------------------------------------------------------

    /// No token was supplied.
    pub fn missing_token() -> Self {
        MeshError::Auth(AuthFailure {
            message: "Authentication required: no registry token provided".into(),
            token_present: false,
            suggestion: Some(format!(
                "Pass --token or set the {} environment variable.",
                REGISTRY_TOKEN_ENV
            )),
        })
    }

    /// A token was supplied but is unusable.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        MeshError::Auth(AuthFailure {
            message: format!("Invalid registry token: {}", reason.into()),
            token_present: true,
            suggestion: Some("Generate a new token and try again.".into()),
        })
    }

    //----------------------------------------------------------------------------------------------
    // General
    //----------------------------------------------------------------------------------------------

    /// An unclassified error.
    pub fn general(message: impl Into<String>) -> Self {
        MeshError::General(GeneralFailure {
            message: message.into(),
            cause: None,
        })
    }

    /// Best-effort upgrade of an unclassified error to the closest kind.
    ///
    /// Looks for a reqwest or I/O error in the cause chain first, then falls
    /// back to keywords in the message. Classified errors pass through.
    pub fn classify(self) -> Self {
        let general = match self {
            MeshError::General(g) => g,
            other => return other,
        };

        if let Some(kind) = find_in_chain::<reqwest::Error, _>(&general, classify_transport) {
            let endpoint = find_in_chain::<reqwest::Error, _>(&general, |e| {
                e.url().map(|u| u.to_string())
            })
            .flatten()
            .unwrap_or_else(|| "registry".into());
            return Self::connection(kind, &endpoint, Some(Box::new(general)));
        }

        if let Some(code) = find_in_chain::<io::Error, _>(&general, FsErrorCode::from_io) {
            let (message, suggestion) = code.describe(&general.message);
            return MeshError::Filesystem(FilesystemFailure {
                code,
                message,
                path: None,
                operation: None,
                suggestion: Some(suggestion.into()),
                cause: Some(Box::new(general)),
            });
        }

        classify_by_keyword(general)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Decide which connection failure a reqwest error represents.
///
/// Only the sources are inspected; reqwest's own message embeds the request URL.
fn classify_transport(err: &reqwest::Error) -> ConnectionFailure {
    if err.is_timeout() {
        return ConnectionFailure::TimedOut;
    }
    classify_sources(std::error::Error::source(err), err.is_connect())
}

/// Classify a transport failure from its cause chain.
fn classify_sources(
    source: Option<&(dyn std::error::Error + 'static)>,
    is_connect: bool,
) -> ConnectionFailure {
    let mut text = String::new();
    let mut current = source;
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionRefused => return ConnectionFailure::Refused,
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return ConnectionFailure::Reset,
                io::ErrorKind::TimedOut => return ConnectionFailure::TimedOut,
                _ => {}
            }
        }
        text.push_str(&err.to_string().to_lowercase());
        text.push('\n');
        current = err.source();
    }

    if text.contains("dns error")
        || text.contains("failed to lookup")
        || text.contains("name or service not known")
        || text.contains("no such host")
    {
        ConnectionFailure::UnresolvedHost
    } else if text.contains("connection reset") || text.contains("broken pipe") {
        ConnectionFailure::Reset
    } else if is_connect || text.contains("refused") {
        ConnectionFailure::Refused
    } else {
        ConnectionFailure::Reset
    }
}

/// Lowercased concatenation of an error and all its sources.
fn error_chain_text(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        text.push_str(": ");
        text.push_str(&s.to_string());
        source = s.source();
    }
    text.to_lowercase()
}

/// Walk the cause chain of `general` looking for an error of type `E`.
fn find_in_chain<E, R>(general: &GeneralFailure, f: impl Fn(&E) -> R) -> Option<R>
where
    E: std::error::Error + 'static,
{
    let mut source: Option<&(dyn std::error::Error + 'static)> = general
        .cause
        .as_deref()
        .map(|c| c as &(dyn std::error::Error + 'static));
    while let Some(err) = source {
        if let Some(found) = err.downcast_ref::<E>() {
            return Some(f(found));
        }
        source = err.source();
    }
    None
}

/// Keyword fallback used by [`MeshError::classify`].
fn classify_by_keyword(general: GeneralFailure) -> MeshError {
    let text = error_chain_text(&general);

    const NETWORK: &[(&str, ConnectionFailure)] = &[
        ("econnrefused", ConnectionFailure::Refused),
        ("connection refused", ConnectionFailure::Refused),
        ("enotfound", ConnectionFailure::UnresolvedHost),
        ("getaddrinfo", ConnectionFailure::UnresolvedHost),
        ("etimedout", ConnectionFailure::TimedOut),
        ("timed out", ConnectionFailure::TimedOut),
        ("econnreset", ConnectionFailure::Reset),
        ("connection reset", ConnectionFailure::Reset),
    ];
    for (needle, kind) in NETWORK {
        if text.contains(needle) {
            return MeshError::connection(*kind, "registry", Some(Box::new(general)));
        }
    }

    for code in ["ENOENT", "EACCES", "EPERM", "EISDIR", "ENOTDIR", "EEXIST", "ENOSPC", "EMFILE"] {
        if text.contains(&code.to_lowercase())
            && let Some(code) = FsErrorCode::from_code_str(code)
        {
            let (message, suggestion) = code.describe(&general.message);
            return MeshError::Filesystem(FilesystemFailure {
                code,
                message,
                path: None,
                operation: None,
                suggestion: Some(suggestion.into()),
                cause: Some(Box::new(general)),
            });
        }
    }

    if ["unauthorized", "authentication", "token"]
        .iter()
        .any(|k| text.contains(k))
    {
        return MeshError::Auth(AuthFailure {
            message: general.message,
            token_present: !text.contains("missing") && !text.contains("no token"),
            suggestion: Some(format!(
                "Pass --token or set the {} environment variable.",
                REGISTRY_TOKEN_ENV
            )),
        });
    }

    if ["validation", "invalid", "schema"]
        .iter()
        .any(|k| text.contains(k))
    {
        return MeshError::validation(
            FieldViolation {
                field: String::new(),
                message: general.message,
                line: None,
                column: None,
                suggestion: None,
            },
            Vec::new(),
        );
    }

    MeshError::General(general)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context-wrapped errors enter as general and are sorted out by [`MeshError::classify`].
impl From<anyhow::Error> for MeshError {
    fn from(err: anyhow::Error) -> Self {
        MeshError::General(GeneralFailure {
            message: err.to_string(),
            cause: Some(err.into()),
        })
    }
}

impl From<io::Error> for MeshError {
    fn from(err: io::Error) -> Self {
        let code = FsErrorCode::from_io(&err);
        let (message, suggestion) = code.describe(&err.to_string());
        MeshError::Filesystem(FilesystemFailure {
            code,
            message,
            path: None,
            operation: None,
            suggestion: Some(suggestion.into()),
            cause: Some(Box::new(err)),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorKind::General.exit_code(), 1);
        assert_eq!(ErrorKind::Auth.exit_code(), 2);
        assert_eq!(ErrorKind::Validation.exit_code(), 3);
        assert_eq!(ErrorKind::Network.exit_code(), 4);
        assert_eq!(ErrorKind::Filesystem.exit_code(), 5);
    }

    #[test]
    fn test_file_not_found_message() {
        let err = MeshError::file_not_found(Path::new("/tmp/missing/mcp.json"));
        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert_eq!(err.to_string(), "File not found: /tmp/missing/mcp.json");
        assert!(err.suggestion().unwrap().contains("Verify the path"));
        assert!(!err.retryable());
    }

    #[test]
    fn test_io_error_code_table() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let err = MeshError::io(denied, Path::new("mcp.json"), "read");
        match err {
            MeshError::Filesystem(f) => {
                assert_eq!(f.code, FsErrorCode::PermissionDenied);
                assert_eq!(f.operation.as_deref(), Some("read"));
                assert!(f.message.starts_with("Permission denied"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let no_space = io::Error::from_raw_os_error(28);
        assert_eq!(FsErrorCode::from_io(&no_space), FsErrorCode::NoSpace);
    }

    #[test]
    fn test_http_conflict() {
        let err = MeshError::http_status(409, "https://r/v1/connectors", None, None);
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.to_string(), "Conflict: resource already exists");
        assert!(err.suggestion().unwrap().contains("Bump"));
        assert!(!err.retryable());
    }

    #[test]
    fn test_http_rate_limited_defaults_to_sixty_seconds() {
        let err = MeshError::http_status(429, "https://r", None, None);
        assert!(err.retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));

        let err = MeshError::http_status(429, "https://r", None, Some(Duration::from_secs(5)));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_http_server_errors_are_retryable() {
        for status in [500, 502, 503, 504] {
            assert!(MeshError::http_status(status, "https://r", None, None).retryable());
        }
        for status in [400, 401, 403, 404, 409, 413, 422] {
            assert!(!MeshError::http_status(status, "https://r", None, None).retryable());
        }
    }

    #[test]
    fn test_http_server_error_keeps_retry_after() {
        let err = MeshError::http_status(503, "https://r", None, Some(Duration::from_secs(120)));
        assert!(err.retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
        assert_eq!(MeshError::http_status(503, "https://r", None, None).retry_after(), None);
    }

    #[test]
    fn test_connection_failure_ignores_url_text() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_sources(Some(&refused), true), ConnectionFailure::Refused);

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert_eq!(classify_sources(Some(&reset), false), ConnectionFailure::Reset);

        let dns = io::Error::other("dns error: failed to lookup address information");
        assert_eq!(classify_sources(Some(&dns), true), ConnectionFailure::UnresolvedHost);

        assert_eq!(classify_sources(None, true), ConnectionFailure::Refused);
    }

    #[test]
    fn test_http_unprocessable_includes_detail() {
        let err = MeshError::http_status(422, "https://r", Some("tags must be unique"), None);
        assert_eq!(
            err.to_string(),
            "Validation failed on the registry: tags must be unique"
        );
    }

    #[test]
    fn test_connection_failures() {
        let err = MeshError::connection(ConnectionFailure::UnresolvedHost, "https://nope", None);
        assert!(!err.retryable());
        let err = MeshError::connection(ConnectionFailure::Refused, "https://r", None);
        assert!(err.retryable());
        let err = MeshError::connection(ConnectionFailure::TimedOut, "https://r", None);
        assert!(err.retryable());
    }

    #[test]
    fn test_only_network_errors_are_retryable() {
        assert!(!MeshError::missing_token().retryable());
        assert!(!MeshError::general("boom").retryable());
        assert!(!MeshError::file_not_found(Path::new("x")).retryable());
    }

    #[test]
    fn test_from_violations_requires_one() {
        assert!(MeshError::from_violations(Vec::new()).is_none());

        let v = |field: &str| FieldViolation {
            field: field.into(),
            message: format!("bad {}", field),
            line: None,
            column: None,
            suggestion: None,
        };
        let err = MeshError::from_violations(vec![v("/id"), v("/tools")]).unwrap();
        assert_eq!(err.to_string(), "bad /id");
        match err {
            MeshError::Validation(f) => {
                assert_eq!(f.len(), 2);
                assert_eq!(f.additional[0].field, "/tools");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_io_in_chain() {
        let io = io::Error::from(io::ErrorKind::NotFound);
        let err: MeshError = anyhow::Error::new(io).context("loading config").into();
        assert_eq!(err.kind(), ErrorKind::General);
        let upgraded = err.classify();
        assert_eq!(upgraded.kind(), ErrorKind::Filesystem);
    }

    #[test]
    fn test_classify_keywords() {
        let err = MeshError::general("connect ECONNREFUSED 127.0.0.1:443").classify();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.retryable());

        let err = MeshError::general("request was unauthorized").classify();
        assert_eq!(err.kind(), ErrorKind::Auth);

        let err = MeshError::general("something odd happened").classify();
        assert_eq!(err.kind(), ErrorKind::General);
    }

    #[test]
    fn test_classify_leaves_typed_errors_alone() {
        let err = MeshError::http_status(409, "https://r", None, None).classify();
        assert_eq!(err.to_string(), "Conflict: resource already exists");
    }
}
