//! HTTP request routing and handling.
//!
//! # Responsibilities
//! - Build the per-listener Axum router (one catch-all dispatch handler)
//! - Resolve the virtual domain for every request
//! - Gate guarded methods behind authentication
//! - Route to upload, extraction, or static file serving
//! - Emit one access-log line per request
//!
//! # Design Decisions
//! - Routing is dynamic: upload/extract paths are per-domain config values,
//!   so dispatch happens after domain resolution, not in the route table
//! - Blocking filesystem work (uploads, extraction) runs on blocking threads
//! - Static serving delegates to tower-http's ServeDir

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::multipart::Multipart;
use axum::extract::{DefaultBodyLimit, FromRequest, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use http_body_util::Limited;
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::archive;
use crate::archive::paths::confine;
use crate::auth::{Authenticator, ExtensionRegistry};
use crate::config::DomainConfig;
use crate::http::error::{ApiError, ApiResult};
use crate::routing::DomainRegistry;
use crate::sync::KeyedLock;
use crate::upload::{self, UploadedEntry};

/// Application state injected into handlers. One instance per listener,
/// carrying the port and TLS mode the listener serves.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DomainRegistry>,
    pub locks: Arc<KeyedLock>,
    pub authenticator: Arc<Authenticator>,
    pub extensions: Arc<ExtensionRegistry>,
    pub port: u16,
    pub tls: bool,
}

/// Build the Axum router for one listener.
pub fn build_router(state: AppState) -> Router {
    // Domains sharing the port may declare different timeouts; the listener
    // honors the longest one.
    let timeout = state
        .registry
        .domains()
        .filter(|d| d.listens_on(state.port))
        .map(|d| d.timeout_secs)
        .max()
        .unwrap_or(240);
    Router::new()
        .route("/", any(dispatch))
        .route("/{*path}", any(dispatch))
        .with_state(state)
        // Upload bodies are capped per domain in multipart_reader.
        .layer(DefaultBodyLimit::disable())
        .layer(TimeoutLayer::new(Duration::from_secs(timeout)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        remote = %client_ip(request),
                        method = %request.method(),
                        path = %request.uri().path(),
                        user_agent = %header_or_dash(request, header::USER_AGENT),
                    )
                })
                .on_response(
                    |response: &Response<Body>, latency: Duration, _span: &tracing::Span| {
                        tracing::info!(
                            status = response.status().as_u16(),
                            latency_ms = latency.as_millis() as u64,
                            "Request served"
                        );
                    },
                ),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Peer address for the access log, honoring common proxy headers.
fn client_ip(request: &Request<Body>) -> String {
    for name in ["x-real-ip", "x-forwarded-for"] {
        if let Some(value) = request.headers().get(name).and_then(|v| v.to_str().ok()) {
            if !value.is_empty() {
                return value.to_string();
            }
        }
    }
    "-".to_string()
}

fn header_or_dash(request: &Request<Body>, name: header::HeaderName) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

/// Single entry point: resolves the domain, then routes the request.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok());
    let domain = state.registry.resolve(host, Some(state.port), state.tls);

    // A serve extension replaces all built-in handling for its domain.
    if let Some(name) = &domain.serve_extension {
        match state.extensions.serve(name) {
            Some(extension) => return extension.serve(request, &domain).await,
            None => {
                tracing::error!(
                    domain = %domain.host,
                    extension = %name,
                    "Serve extension not registered"
                );
                return ApiError::Internal.into_response();
            }
        }
    }

    let request = match guard_request(&state, &domain, request).await {
        Ok(request) => request,
        Err(error) => return error.into_response(),
    };

    let path = request.uri().path().to_string();
    let result = if path == domain.upload_path {
        receive_file(&state, &domain, request).await
    } else if path == domain.extract_path {
        receive_and_extract(&state, &domain, request).await
    } else {
        show_file(&domain, request).await
    };

    match result {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

/// Run authentication when the domain guards this request's method.
async fn guard_request(
    state: &AppState,
    domain: &DomainConfig,
    request: Request<Body>,
) -> ApiResult<Request<Body>> {
    if !domain.requires_auth(request.method().as_str()) {
        return Ok(request);
    }
    let (parts, body) = request.into_parts();
    let outcome = state.authenticator.authenticate(&parts, domain).await;
    if !outcome.allowed {
        return Err(ApiError::from_auth_status(outcome.status));
    }
    Ok(Request::from_parts(parts, body))
}

/// Check method and content type, then hand back the multipart reader.
///
/// The whole body, multipart framing included, is capped at `max_size`
/// while it streams in.
async fn multipart_reader(request: Request<Body>, max_size: u64) -> ApiResult<Multipart> {
    if request.method() != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));
    if !is_multipart {
        return Err(ApiError::BadRequest(
            "bad request. Use Content-Type: multipart/form-data",
        ));
    }
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > max_size) {
        return Err(ApiError::BadRequest("upload too large"));
    }
    let request = request.map(|body| Body::new(Limited::new(body, max_size as usize)));
    Multipart::from_request(request, &())
        .await
        .map_err(|_| ApiError::BadRequest("malformed multipart body"))
}

/// `POST <upload_path>`: store one uploaded file under the domain root.
async fn receive_file(
    state: &AppState,
    domain: &Arc<DomainConfig>,
    request: Request<Body>,
) -> ApiResult<Response> {
    let mut multipart = multipart_reader(request, domain.max_upload_size).await?;
    let entry = upload::read_multipart(&mut multipart, domain.max_upload_size)
        .await
        .map_err(ApiError::from)?;

    let domain = domain.clone();
    let locks = state.locks.clone();
    let name = tokio::task::spawn_blocking(move || {
        upload::store(
            &entry,
            &domain.root_dir,
            false,
            domain.prevent_overwrite,
            &locks,
        )
    })
    .await
    .map_err(|_| ApiError::Internal)??;

    Ok((StatusCode::CREATED, format!("{name}\n")).into_response())
}

/// `POST <extract_path>`: unpack an uploaded tar.gz under the domain root.
async fn receive_and_extract(
    state: &AppState,
    domain: &Arc<DomainConfig>,
    request: Request<Body>,
) -> ApiResult<Response> {
    let mut multipart = multipart_reader(request, domain.max_upload_size).await?;
    let entry: UploadedEntry = upload::read_multipart(&mut multipart, domain.max_upload_size)
        .await
        .map_err(ApiError::from)?;

    let domain = domain.clone();
    let locks = state.locks.clone();
    let names = tokio::task::spawn_blocking(move || {
        archive::extract(
            Cursor::new(entry.content),
            &domain.root_dir,
            domain.prevent_overwrite,
            &locks,
        )
    })
    .await
    .map_err(|_| ApiError::Internal)??;

    let mut body = String::new();
    for name in names {
        body.push_str(&name);
        body.push('\n');
    }
    Ok((StatusCode::CREATED, body).into_response())
}

/// Serve a file (or directory) from the domain root.
async fn show_file(domain: &Arc<DomainConfig>, request: Request<Body>) -> ApiResult<Response> {
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return Err(ApiError::MethodNotAllowed);
    }

    // ServeDir decodes the path itself; the directory check needs the
    // decoded form too, or encoded names miss it.
    let url_path = request.uri().path().to_string();
    let decoded = percent_decode_str(&url_path)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| url_path.clone());
    let fs_path = confine(&domain.root_dir, Path::new(decoded.trim_start_matches('/')));
    if fs_path.is_dir() && !domain.default_to_index {
        return directory_listing(&fs_path, &decoded);
    }

    let serve = ServeDir::new(&domain.root_dir)
        .append_index_html_on_directories(domain.default_to_index);
    match serve.oneshot(request).await {
        Ok(response) => Ok(response.map(Body::new)),
        Err(infallible) => match infallible {},
    }
}

/// Render a minimal HTML index of a directory.
fn directory_listing(fs_path: &Path, url_path: &str) -> ApiResult<Response> {
    let mut names: Vec<String> = Vec::new();
    let entries = std::fs::read_dir(fs_path).map_err(|source| {
        tracing::debug!(path = %fs_path.display(), %source, "Directory not listable");
        ApiError::NotFound
    })?;
    for entry in entries.flatten() {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    let title = html_escape(url_path);
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head><title>Index of {title}</title></head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    for name in &names {
        let escaped = html_escape(name);
        page.push_str(&format!("<li><a href=\"{escaped}\">{escaped}</a></li>\n"));
    }
    page.push_str("</ul>\n</body>\n</html>\n");
    Ok(Html(page).into_response())
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
