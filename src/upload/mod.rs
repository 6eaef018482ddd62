//! Upload processing.
//!
//! # Responsibilities
//! - Pull the `file` and optional `prefix` parts out of a multipart stream
//! - Validate the prefix before any filesystem mutation
//! - Write the file under the keyed lock, honoring the overwrite policy
//!
//! # Design Decisions
//! - The multipart read happens on the async side; the filesystem write is
//!   synchronous and runs on a blocking thread
//! - The stored name can be prefixed with a random hex token; that is
//!   collision avoidance, not a security measure

use std::fs;
use std::path::{Component, Path, PathBuf};

use axum::body::Bytes;
use axum::extract::multipart::Multipart;
use rand::RngCore;

use crate::sync::KeyedLock;

/// Error type for upload handling.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The `prefix` part climbs out of the destination root. A client error.
    #[error("invalid upload prefix: {0}")]
    InvalidPrefix(String),

    /// The overwrite policy forbids replacing this file. A client error.
    #[error("refusing to overwrite {0}")]
    AlreadyExists(PathBuf),

    /// The multipart stream carried no usable `file` part. A client error.
    #[error("missing file part in upload")]
    MissingFile,

    /// The upload exceeds the domain's size limit. A client error.
    #[error("upload larger than {limit} bytes")]
    TooLarge { limit: u64 },

    /// The multipart stream itself is malformed. A client error.
    #[error("malformed multipart stream: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    /// Writing to disk failed. An internal error.
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// One file pulled out of a multipart request, not yet on disk.
#[derive(Debug)]
pub struct UploadedEntry {
    pub file_name: String,
    pub content: Bytes,
    pub prefix: Option<String>,
}

/// Read the `file` part (name and content) and optional `prefix` part out of
/// a multipart stream, enforcing `max_size` on the file content.
pub async fn read_multipart(
    multipart: &mut Multipart,
    max_size: u64,
) -> Result<UploadedEntry, UploadError> {
    let mut file: Option<(String, Bytes)> = None;
    let mut prefix: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let name = field
                    .file_name()
                    .map(ToOwned::to_owned)
                    .ok_or(UploadError::MissingFile)?;
                let content = field.bytes().await?;
                if content.len() as u64 > max_size {
                    return Err(UploadError::TooLarge { limit: max_size });
                }
                file = Some((name, content));
            }
            Some("prefix") => {
                prefix = Some(field.text().await?);
            }
            _ => {}
        }
    }

    let (file_name, content) = file.ok_or(UploadError::MissingFile)?;
    Ok(UploadedEntry {
        file_name,
        content,
        prefix,
    })
}

/// Write an uploaded entry under `root`, returning the stored base name.
///
/// The prefix is validated before any filesystem mutation; the overwrite
/// check happens before the lock is taken.
pub fn store(
    entry: &UploadedEntry,
    root: &Path,
    randomize_name: bool,
    prevent_overwrite: bool,
    locks: &KeyedLock,
) -> Result<String, UploadError> {
    let prefix = match entry.prefix.as_deref() {
        Some(prefix) => Some(validate_prefix(prefix)?),
        None => None,
    };

    let base_name = sanitize_file_name(&entry.file_name);
    let stored_name = if randomize_name {
        format!("{}-{}", random_token(), base_name)
    } else {
        base_name
    };

    let mut target = root.to_path_buf();
    if let Some(prefix) = &prefix {
        target.push(prefix);
    }
    target.push(&stored_name);

    if prevent_overwrite && target.exists() {
        return Err(UploadError::AlreadyExists(target));
    }

    let key = target.to_string_lossy().into_owned();
    let _guard = locks.acquire(&key);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, &entry.content)?;
    Ok(stored_name)
}

/// Strip leading separators and reject parent-directory traversal.
fn validate_prefix(prefix: &str) -> Result<PathBuf, UploadError> {
    let trimmed = prefix.trim_start_matches(['/', '\\']);
    let path = Path::new(trimmed);
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(UploadError::InvalidPrefix(prefix.to_string())),
        }
    }
    Ok(path.to_path_buf())
}

/// Reduce a client-supplied file name to its base name.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        "unnamed".to_string()
    } else {
        base.to_string()
    }
}

/// 16 random bytes as lower hex.
fn random_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
