//! Shared utilities for integration tests.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use multihost::auth::{Authenticator, ExtensionRegistry};
use multihost::config::{Config, DomainConfig, DEFAULT_DOMAIN};
use multihost::http::{build_router, AppState};
use multihost::routing::DomainRegistry;
use multihost::sync::KeyedLock;

pub const BOUNDARY: &str = "XTESTBOUNDARY";

/// Build a router serving `config` as a plain listener on `port`.
#[allow(dead_code)]
pub fn router_for(config: &Config, port: u16) -> Router {
    router_with_extensions(config, port, ExtensionRegistry::new())
}

#[allow(dead_code)]
pub fn router_with_extensions(config: &Config, port: u16, extensions: ExtensionRegistry) -> Router {
    let registry = Arc::new(DomainRegistry::from_config(config));
    let extensions = Arc::new(extensions);
    let state = AppState {
        registry,
        locks: Arc::new(KeyedLock::new()),
        authenticator: Arc::new(Authenticator::new(extensions.clone())),
        extensions,
        port,
        tls: false,
    };
    build_router(state)
}

/// A config whose default domain serves `root` on port 8080.
#[allow(dead_code)]
pub fn config_with_root(root: &Path) -> Config {
    let mut config = Config::default();
    let domain = config.domains.get_mut(DEFAULT_DOMAIN).unwrap();
    domain.host = DEFAULT_DOMAIN.to_string();
    domain.root_dir = root.to_path_buf();
    config
}

/// Add a named domain to a config, filling the `host` field from the name.
#[allow(dead_code)]
pub fn add_domain(config: &mut Config, name: &str, mut domain: DomainConfig) {
    domain.host = name.to_string();
    config.domains.insert(name.to_string(), domain);
}

/// One part of a multipart request body.
#[allow(dead_code)]
pub enum Part<'a> {
    File { name: &'a str, content: &'a [u8] },
    Field { name: &'a str, value: &'a str },
}

/// Assemble a `multipart/form-data` body from parts.
#[allow(dead_code)]
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File { name, content } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(content);
            }
            Part::Field { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// A POST request carrying a multipart body.
#[allow(dead_code)]
pub fn multipart_request(path: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

/// One entry for a generated tar archive.
#[allow(dead_code)]
pub enum TarEntry<'a> {
    Dir(&'a str),
    File(&'a str, &'a [u8]),
    Symlink { path: &'a str, target: &'a str },
}

/// Build a gzip-compressed tar archive in memory.
#[allow(dead_code)]
pub fn targz(entries: &[TarEntry<'_>]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for entry in entries {
        match entry {
            TarEntry::Dir(path) => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Directory);
                header.set_size(0);
                header.set_mode(0o755);
                header.set_cksum();
                builder.append_data(&mut header, path, std::io::empty()).unwrap();
            }
            TarEntry::File(path, content) => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Regular);
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                // Write the name bytes directly: `set_path` rejects `..`,
                // which hostile-archive tests need to encode.
                header.as_gnu_mut().unwrap().name[..path.len()]
                    .copy_from_slice(path.as_bytes());
                header.set_cksum();
                builder.append(&header, *content).unwrap();
            }
            TarEntry::Symlink { path, target } => {
                let mut header = tar::Header::new_gnu();
                header.set_entry_type(tar::EntryType::Symlink);
                header.set_size(0);
                header.set_mode(0o777);
                builder.append_link(&mut header, path, target).unwrap();
            }
        }
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Collect a response body into bytes.
#[allow(dead_code)]
pub async fn body_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec()
}
