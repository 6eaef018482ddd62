//! htpasswd-backed basic authentication.
//!
//! Credential files are parsed once per path and memoized for the process
//! lifetime. Supported password forms: plaintext and `{SHA}` (base64 of the
//! SHA-1 digest).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;
use sha1::{Digest, Sha1};

/// Error type for credential handling.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid htpasswd line: {0}")]
    InvalidLine(String),
}

type Credentials = Arc<HashMap<String, String>>;

/// Memoized htpasswd files: path → user → stored password.
#[derive(Debug, Default)]
pub struct HtpasswdStore {
    cache: DashMap<PathBuf, Credentials>,
}

impl HtpasswdStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `user`/`password` against the htpasswd file at `path`.
    pub fn verify(&self, path: &Path, user: &str, password: &str) -> Result<bool, AuthError> {
        let creds = self.credentials(path)?;
        Ok(creds
            .get(user)
            .is_some_and(|stored| verify_password(stored, password)))
    }

    fn credentials(&self, path: &Path) -> Result<Credentials, AuthError> {
        if let Some(cached) = self.cache.get(path) {
            return Ok(cached.clone());
        }
        let content = std::fs::read_to_string(path).map_err(|source| AuthError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let creds = Arc::new(parse_credentials(&content)?);
        self.cache.insert(path.to_path_buf(), creds.clone());
        Ok(creds)
    }
}

/// Parse htpasswd content: `user:password` per line, `#` comments allowed.
fn parse_credentials(content: &str) -> Result<HashMap<String, String>, AuthError> {
    let mut creds = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (user, password) = line
            .split_once(':')
            .ok_or_else(|| AuthError::InvalidLine(line.to_string()))?;
        creds.insert(user.trim().to_string(), password.trim().to_string());
    }
    Ok(creds)
}

fn verify_password(stored: &str, given: &str) -> bool {
    if let Some(digest) = stored.strip_prefix("{SHA}") {
        let hashed = BASE64.encode(Sha1::digest(given.as_bytes()));
        hashed == digest
    } else {
        stored == given
    }
}

/// Decode a `Basic` authorization header value into user and password.
pub fn decode_basic_auth(header: &str) -> Option<(String, String)> {
    let encoded = header.strip_prefix("Basic ")?.trim();
    let decoded = BASE64.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}
