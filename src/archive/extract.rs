//! Security-hardened archive extraction.
//!
//! # Responsibilities
//! - Unpack a gzip-compressed tar stream under a confinement root
//! - Neutralize path traversal in entry names and symlink targets
//! - Serialize writes per target path through the keyed lock
//! - Honor the domain's overwrite policy
//!
//! # Design Decisions
//! - Entries are processed strictly in stream order; there is no rollback,
//!   entries written before a failure stay on disk
//! - Directory locks are held until the whole extraction finishes, since
//!   later entries in the stream may write beneath them
//! - Escaping symlink targets are re-rooted under the confinement root
//!   instead of aborting the extraction; the link breaks, the sandbox holds

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use crate::archive::paths::{confine, lexical_resolve};
use crate::sync::{KeyedGuard, KeyedLock};

/// Error type for archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The overwrite policy forbids replacing this file. A client error.
    #[error("refusing to overwrite {0}")]
    AlreadyExists(PathBuf),

    /// The stream is not a well-formed gzip'd tar archive. A client error.
    #[error("invalid archive: {0}")]
    Archive(#[source] io::Error),

    /// Writing an entry to disk failed. An internal error.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    /// Whether the client sent something unacceptable, as opposed to the
    /// server failing to act on it.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::AlreadyExists(_) | Self::Archive(_))
    }
}

/// Unpack `stream` (a gzip-compressed tar archive) under `root`.
///
/// Returns the archive-order names of the entries written to disk. Entry
/// types other than files, directories and symlinks are skipped. No write
/// ever lands outside `root`.
pub fn extract<R: Read>(
    stream: R,
    root: &Path,
    prevent_overwrite: bool,
    locks: &KeyedLock,
) -> Result<Vec<String>, ExtractError> {
    let root = lexical_resolve(root);
    let mut archive = Archive::new(GzDecoder::new(stream));
    let mut written: Vec<String> = Vec::new();
    // Directory guards live until extraction completes. Keyed by path so a
    // duplicate directory entry does not re-acquire its own lock.
    let mut dir_guards: HashMap<String, KeyedGuard<'_>> = HashMap::new();

    for entry in archive.entries().map_err(ExtractError::Archive)? {
        let mut entry = entry.map_err(ExtractError::Archive)?;
        let name = entry.path().map_err(ExtractError::Archive)?.into_owned();
        let target = confine(&root, &name);
        let key = target.to_string_lossy().into_owned();
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            if !dir_guards.contains_key(&key) {
                dir_guards.insert(key.clone(), locks.acquire(&key));
            }
            fs::create_dir_all(&target).map_err(|source| ExtractError::Write {
                path: target.clone(),
                source,
            })?;
        } else if entry_type.is_file() {
            // Early rejection, before taking the lock.
            if prevent_overwrite && target.exists() {
                return Err(ExtractError::AlreadyExists(target));
            }
            // A directory entry at this path already holds the key for the
            // rest of the run; re-acquiring would deadlock.
            let _guard = (!dir_guards.contains_key(&key)).then(|| locks.acquire(&key));
            write_file(&mut entry, &target)?;
        } else if entry_type.is_symlink() {
            let link = entry
                .link_name()
                .map_err(ExtractError::Archive)?
                .ok_or_else(|| {
                    ExtractError::Archive(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("symlink entry {} has no target", name.display()),
                    ))
                })?;
            let _guard = (!dir_guards.contains_key(&key)).then(|| locks.acquire(&key));
            write_symlink(&root, &target, &link)?;
        } else {
            tracing::debug!(
                entry = %name.display(),
                entry_type = ?entry_type,
                "Skipping unsupported archive entry"
            );
            continue;
        }

        written.push(name.to_string_lossy().into_owned());
    }

    drop(dir_guards);
    Ok(written)
}

fn write_file<R: Read>(entry: &mut R, target: &Path) -> Result<(), ExtractError> {
    let write_err = |source| ExtractError::Write {
        path: target.to_path_buf(),
        source,
    };
    if let Some(parent) = target.parent() {
        // The archive may not carry explicit directory entries.
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let mut file = File::create(target).map_err(write_err)?;
    io::copy(entry, &mut file).map_err(write_err)?;
    Ok(())
}

/// Create a symlink at `target`, re-rooting its destination under `root`
/// when it would otherwise point outside the sandbox.
fn write_symlink(root: &Path, target: &Path, link: &Path) -> Result<(), ExtractError> {
    let base = target.parent().unwrap_or(root);
    let resolved = lexical_resolve(&base.join(link));
    let destination = if resolved.starts_with(root) {
        resolved
    } else {
        let rerooted = confine(root, link);
        tracing::warn!(
            target = %target.display(),
            link = %link.display(),
            rerooted = %rerooted.display(),
            "Symlink target escapes the extraction root; re-rooting"
        );
        rerooted
    };

    let write_err = |source| ExtractError::Write {
        path: target.to_path_buf(),
        source,
    };
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    // Replace a leftover link from a previous extraction.
    match fs::remove_file(target) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(write_err(source)),
    }
    make_symlink(&destination, target).map_err(write_err)
}

#[cfg(unix)]
fn make_symlink(destination: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(destination, target)
}

#[cfg(not(unix))]
fn make_symlink(destination: &Path, target: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(destination, target)
}
