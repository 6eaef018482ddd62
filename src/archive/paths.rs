//! Lexical path confinement.
//!
//! Archive entry names and link targets are attacker-supplied. These helpers
//! keep every derived path under a confinement root without consulting the
//! filesystem: `..` cannot climb past the root and absolute prefixes are
//! discarded.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components lexically, without touching the
/// filesystem. `..` at the front of a relative path is dropped.
pub fn lexical_resolve(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Never pops past a root or prefix component.
                if !matches!(
                    out.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                ) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Join an untrusted path under `root`, clamping it there.
///
/// Leading separators and drive prefixes are dropped; `..` pops within the
/// untrusted part but never climbs above `root`. The result always satisfies
/// `result.starts_with(root)`.
pub fn confine(root: &Path, untrusted: &Path) -> PathBuf {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in untrusted.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                parts.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    let mut out = root.to_path_buf();
    for part in parts {
        out.push(part);
    }
    out
}
