//! Certificate image storage on the local file system.
//!
//! Uploads are streamed chunk by chunk into a hidden partial file and renamed
//! to their final generated name only after every check has passed. The
//! partial file is removed whenever the upload is dropped unfinished, including
//! when the client disconnects mid-stream.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempPath;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

/// URL prefix the upload directory is served under.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub const ALLOWED_EXTENSIONS: &[&str] = &["jpeg", "jpg", "png", "gif", "webp"];

const MAX_STORED_NAME_LEN: usize = 100;

const PARTIAL_PREFIX: &str = ".partial-";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only image files are allowed!")]
    UnsupportedType,

    #[error("File too large. Maximum size is {}.", format_limit(.max_bytes))]
    TooLarge { max_bytes: usize },

    #[error("No file uploaded")]
    Missing,

    #[error("File upload failed. Please try again.")]
    Malformed,

    #[error("Upload I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reference returned to the client after a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredCertificate {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct CertificateStorage {
    dir: PathBuf,
    max_bytes: usize,
}

impl CertificateStorage {
    /// Opens (creating if missing) the upload directory.
    pub fn open(dir: impl Into<PathBuf>, max_bytes: usize) -> std::io::Result<Self> {
        let dir = dir.into();
        if dir.is_dir() {
            info!("Uploads directory exists: {}", dir.display());
        } else {
            std::fs::create_dir_all(&dir)?;
            info!("Created uploads directory: {}", dir.display());
        }
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validates the declared type and starts a new upload.
    pub async fn begin(
        &self,
        content_type: Option<&str>,
        original_name: &str,
    ) -> Result<PendingUpload, UploadError> {
        check_image_type(content_type, original_name)?;

        let filename = generate_filename(original_name);
        let dir = self.dir.clone();
        let partial = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(PARTIAL_PREFIX)
                .rand_bytes(16)
                .tempfile_in(dir)
        })
        .await
        .map_err(std::io::Error::other)??;
        let (file, partial) = partial.into_parts();

        Ok(PendingUpload {
            file: File::from_std(file),
            partial,
            final_path: self.dir.join(&filename),
            filename,
            written: 0,
            max_bytes: self.max_bytes,
        })
    }

    /// Maps a stored filename to its path, or `None` if it is not a plain
    /// name inside the upload directory or does not exist.
    pub async fn resolve(&self, filename: &str) -> Option<PathBuf> {
        if !is_plain_filename(filename) {
            return None;
        }
        let path = self.dir.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            _ => None,
        }
    }
}

/// An upload in progress. Dropping it without `finish` deletes the partial file.
pub struct PendingUpload {
    file: File,
    partial: TempPath,
    final_path: PathBuf,
    filename: String,
    written: usize,
    max_bytes: usize,
}

impl PendingUpload {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.written += chunk.len();
        if self.written > self.max_bytes {
            return Err(UploadError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }
        self.file.write_all(chunk).await?;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredCertificate, UploadError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        let partial = self.partial;
        let final_path = self.final_path;
        tokio::task::spawn_blocking(move || partial.persist(final_path).map_err(|e| e.error))
            .await
            .map_err(std::io::Error::other)??;

        info!(bytes = self.written, "File uploaded successfully: {}", self.filename);
        Ok(StoredCertificate {
            url: format!("{UPLOADS_URL_PREFIX}/{}", self.filename),
            filename: self.filename,
        })
    }
}

/// Human-readable size limit for error messages.
fn format_limit(max_bytes: &usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;

    let bytes = *max_bytes;
    if bytes >= MIB {
        scaled(bytes, MIB, "MB")
    } else if bytes >= KIB {
        scaled(bytes, KIB, "KB")
    } else {
        format!("{bytes} bytes")
    }
}

fn scaled(bytes: usize, unit: usize, suffix: &str) -> String {
    if bytes % unit == 0 {
        format!("{}{suffix}", bytes / unit)
    } else {
        format!("{:.1}{suffix}", bytes as f64 / unit as f64)
    }
}

/// Both the declared content type and the file extension must name an
/// allowed image format.
pub fn check_image_type(
    content_type: Option<&str>,
    original_name: &str,
) -> Result<(), UploadError> {
    let type_ok = content_type
        .map(|ct| ct.trim().to_ascii_lowercase())
        .is_some_and(|ct| ALLOWED_CONTENT_TYPES.contains(&ct.as_str()));
    let ext_ok = extension_of(original_name)
        .is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()));

    if type_ok && ext_ok {
        Ok(())
    } else {
        Err(UploadError::UnsupportedType)
    }
}

/// `<uuid>-<sanitized original name>`.
pub fn generate_filename(original_name: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_name(original_name))
}

/// Content type to serve a stored certificate with, by extension.
pub fn content_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Keeps the last path component and replaces anything outside
/// `[A-Za-z0-9._-]`. The extension is preserved when truncating.
fn sanitize_name(original_name: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();

    if cleaned.len() <= MAX_STORED_NAME_LEN {
        return cleaned;
    }
    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot < MAX_STORED_NAME_LEN => {
            let ext = &cleaned[dot..];
            format!("{}{ext}", &cleaned[..MAX_STORED_NAME_LEN - ext.len()])
        }
        _ => cleaned[..MAX_STORED_NAME_LEN].to_string(),
    }
}

fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}
