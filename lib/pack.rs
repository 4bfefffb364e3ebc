//! Deterministic connector archives.
//!
//! The connector directory is walked in sorted order and every file that
//! survives the exclusion list is streamed into a gzip-compressed tar. The
//! compressed bytes pass through a hashing writer on their way to disk, so
//! the checksum is known as soon as the stream is finished. Entry headers
//! carry a fixed mtime and mode, making the checksum depend only on file
//! paths and contents.

use flate2::Compression;
use flate2::write::GzEncoder;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use walkdir::WalkDir;

use crate::constants::{ARCHIVE_FILE, CHECKSUM_PREFIX};
use crate::error::{MeshError, MeshResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Gitignore-style patterns that are never archived.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    // Version control
    ".git/",
    ".hg/",
    ".svn/",
    // Dependency installs
    "node_modules/",
    "bower_components/",
    ".venv/",
    "venv/",
    "__pycache__/",
    // Build output
    "dist/",
    "build/",
    "target/",
    // Logs and OS artifacts
    "*.log",
    ".DS_Store",
    "Thumbs.db",
    // Environment files
    ".env",
    ".env.*",
    // Temp files
    "*.tmp",
    "*.temp",
    "*.swp",
    "*~",
    // The archive itself
    ARCHIVE_FILE,
];

/// Permission bits recorded for every entry.
const ENTRY_MODE: u32 = 0o644;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A temporary archive on disk, deleted when dropped.
#[derive(Debug)]
pub struct TempArchive {
    path: PathBuf,
}

/// Result of packing a connector directory.
#[derive(Debug)]
pub struct PackResult {
    /// The archive. Dropping this deletes the file.
    pub archive: TempArchive,

    /// `sha256:<hex>` of the compressed archive bytes.
    pub checksum: String,

    /// Number of files archived.
    pub file_count: usize,

    /// Total uncompressed size in bytes.
    pub total_size: u64,

    /// Compressed size in bytes.
    pub compressed_size: u64,

    /// Relative paths that were excluded. Excluded directories are listed once.
    pub ignored_files: Vec<String>,
}

/// A file selected for the archive.
#[derive(Debug)]
struct ArchiveEntry {
    /// Absolute path on disk.
    source: PathBuf,

    /// `/`-separated entry name.
    name: String,
}

/// Forwards writes to `inner` and hashes every byte that passes through.
struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
    written: u64,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl TempArchive {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Location of the archive.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            written: 0,
        }
    }

    /// Flush and return the inner writer, the hex digest and the byte count.
    fn finish(mut self) -> io::Result<(W, String, u64)> {
        self.inner.flush()?;
        let digest = format!("{:x}", self.hasher.finalize());
        Ok((self.inner, digest, self.written))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pack `dir` into a temporary archive inside it.
///
/// The archive is deleted when the returned [`PackResult::archive`] is
/// dropped, and immediately if packing fails part-way.
pub fn pack(dir: &Path) -> MeshResult<PackResult> {
    let archive_path = dir.join(ARCHIVE_FILE);
    let (entries, ignored_files) = collect_entries(dir)?;

    let file = File::create(&archive_path)
        .map_err(|e| MeshError::archive_creation(&archive_path, e))?;
    let archive = TempArchive::new(archive_path.clone());

    let encoder = GzEncoder::new(HashingWriter::new(file), Compression::best());
    let mut builder = Builder::new(encoder);
    let mut total_size = 0u64;

    for entry in &entries {
        let source = File::open(&entry.source)
            .map_err(|e| MeshError::io(e, &entry.source, "read"))?;
        let size = source
            .metadata()
            .map_err(|e| MeshError::io(e, &entry.source, "read"))?
            .len();

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(0);

        builder
            .append_data(&mut header, &entry.name, source)
            .map_err(|e| MeshError::archive_creation(&archive_path, e))?;

        tracing::debug!(entry = %entry.name, size, "added");
        total_size += size;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| MeshError::archive_creation(&archive_path, e))?;
    let hashing = encoder
        .finish()
        .map_err(|e| MeshError::archive_creation(&archive_path, e))?;
    let (file, digest, compressed_size) = hashing
        .finish()
        .map_err(|e| MeshError::archive_creation(&archive_path, e))?;
    file.sync_all()
        .map_err(|e| MeshError::archive_creation(&archive_path, e))?;

    tracing::info!(
        files = entries.len(),
        total_size,
        compressed_size,
        "archive created"
    );

    Ok(PackResult {
        archive,
        checksum: format!("{}{}", CHECKSUM_PREFIX, digest),
        file_count: entries.len(),
        total_size,
        compressed_size,
        ignored_files,
    })
}

/// Walk `dir` in sorted order, splitting paths into archived entries and ignored paths.
fn collect_entries(dir: &Path) -> MeshResult<(Vec<ArchiveEntry>, Vec<String>)> {
    let matcher = build_exclude_matcher(dir)?;
    let mut entries = Vec::new();
    let mut ignored = Vec::new();

    let mut walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| walk_error(e, dir))?;
        let path = entry.path();
        if path == dir {
            continue;
        }

        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        let name = entry_name(relative);
        let is_dir = entry.file_type().is_dir();

        if matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
        {
            tracing::debug!(path = %name, "excluded");
            ignored.push(name);
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        if entry.file_type().is_file() {
            entries.push(ArchiveEntry {
                source: path.to_path_buf(),
                name,
            });
        }
    }

    Ok((entries, ignored))
}

fn build_exclude_matcher(dir: &Path) -> MeshResult<Gitignore> {
    let mut builder = GitignoreBuilder::new(dir);
    for pattern in DEFAULT_EXCLUDES {
        builder
            .add_line(None, pattern)
            .map_err(|e| MeshError::archive_creation(dir, e))?;
    }
    builder
        .build()
        .map_err(|e| MeshError::archive_creation(dir, e))
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn walk_error(err: walkdir::Error, dir: &Path) -> MeshError {
    let path = err.path().unwrap_or(dir).to_path_buf();
    match err.into_io_error() {
        Some(io_err) => MeshError::io(io_err, &path, "read directory"),
        None => MeshError::archive_creation(&path, "filesystem loop detected"),
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "temporary archive removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove temporary archive"
            ),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
