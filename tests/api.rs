//! End-to-end request handling through the router.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use common::{
    add_domain, body_bytes, config_with_root, multipart_request, router_for, targz, Part, TarEntry,
};
use multihost::config::DomainConfig;
use tower::ServiceExt;

/// A config whose default domain serves `root` with no guarded methods.
fn open_config(root: &std::path::Path) -> multihost::config::Config {
    let mut config = config_with_root(root);
    config
        .domains
        .get_mut(multihost::config::DEFAULT_DOMAIN)
        .unwrap()
        .auth_methods
        .clear();
    config
}

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn serves_static_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), b"hi there").unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let response = router.clone().oneshot(get("/hello.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response.into_body()).await, b"hi there");

    let response = router.oneshot(get("/missing.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_read_methods_are_rejected_on_static_paths() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("hello.txt"), b"hi").unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let request = Request::builder()
        .method("DELETE")
        .uri("/hello.txt")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn lists_directories_when_index_is_off() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.txt"), b"x").unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let response = router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert!(body.contains("b.txt"));
    assert!(body.contains("sub/"));
}

#[tokio::test]
async fn lists_directories_with_encoded_names() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("my dir")).unwrap();
    std::fs::write(dir.path().join("my dir/inside.txt"), b"x").unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let response = router.oneshot(get("/my%20dir")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert!(body.contains("inside.txt"));
}

#[tokio::test]
async fn upload_stores_the_file_and_answers_created() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let request = multipart_request(
        "/u/",
        &[Part::File {
            name: "report.txt",
            content: b"contents",
        }],
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert_eq!(body, "report.txt\n");
    assert_eq!(
        std::fs::read(dir.path().join("report.txt")).unwrap(),
        b"contents"
    );
}

#[tokio::test]
async fn upload_honors_the_prefix_part() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let request = multipart_request(
        "/u/",
        &[
            Part::File {
                name: "f.txt",
                content: b"x",
            },
            Part::Field {
                name: "prefix",
                value: "reports/2026",
            },
        ],
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(dir.path().join("reports/2026/f.txt").is_file());
}

#[tokio::test]
async fn traversal_prefix_is_a_bad_request_with_no_write() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let request = multipart_request(
        "/u/",
        &[
            Part::File {
                name: "evil.txt",
                content: b"x",
            },
            Part::Field {
                name: "prefix",
                value: "../evil",
            },
        ],
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn upload_requires_post_and_multipart() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let response = router.clone().oneshot(get("/u/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let request = Request::builder()
        .method("POST")
        .uri("/u/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn large_upload_within_the_limit_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    // 3 MiB against the stock 10 MiB limit, well past common framework
    // default body caps.
    let content = vec![0x5au8; 3 * 1024 * 1024];
    let router = router_for(&open_config(dir.path()), 8080);

    let request = multipart_request(
        "/u/",
        &[Part::File {
            name: "big.bin",
            content: &content,
        }],
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        std::fs::metadata(dir.path().join("big.bin")).unwrap().len(),
        content.len() as u64
    );
}

#[tokio::test]
async fn upload_over_the_size_limit_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = open_config(dir.path());
    config
        .domains
        .get_mut(multihost::config::DEFAULT_DOMAIN)
        .unwrap()
        .max_upload_size = 8;
    let router = router_for(&config, 8080);

    let request = multipart_request(
        "/u/",
        &[Part::File {
            name: "big.bin",
            content: &[0u8; 64],
        }],
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!dir.path().join("big.bin").exists());
}

#[tokio::test]
async fn overwrite_protection_keeps_the_first_upload() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = open_config(dir.path());
    config
        .domains
        .get_mut(multihost::config::DEFAULT_DOMAIN)
        .unwrap()
        .prevent_overwrite = true;
    let router = router_for(&config, 8080);

    let first = multipart_request(
        "/u/",
        &[Part::File {
            name: "f.txt",
            content: b"first",
        }],
    );
    let response = router.clone().oneshot(first).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let second = multipart_request(
        "/u/",
        &[Part::File {
            name: "f.txt",
            content: b"second",
        }],
    );
    let response = router.oneshot(second).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(std::fs::read(dir.path().join("f.txt")).unwrap(), b"first");
}

#[tokio::test]
async fn extract_unpacks_and_lists_the_entries() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let archive = targz(&[
        TarEntry::Dir("docs/"),
        TarEntry::File("docs/a.txt", b"alpha"),
    ]);
    let request = multipart_request(
        "/e/",
        &[Part::File {
            name: "bundle.tar.gz",
            content: &archive,
        }],
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = String::from_utf8(body_bytes(response.into_body()).await).unwrap();
    assert_eq!(body, "docs/\ndocs/a.txt\n");
    assert_eq!(std::fs::read(dir.path().join("docs/a.txt")).unwrap(), b"alpha");
}

#[tokio::test]
async fn extract_rejects_garbage_archives() {
    let dir = tempfile::tempdir().unwrap();
    let router = router_for(&open_config(dir.path()), 8080);

    let request = multipart_request(
        "/e/",
        &[Part::File {
            name: "bundle.tar.gz",
            content: b"not a tarball",
        }],
    );
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn guarded_methods_challenge_without_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let htpasswd = dir.path().join("htpasswd");
    std::fs::write(&htpasswd, b"test:123\n").unwrap();

    // Default policy guards POST; GET stays open.
    let mut config = config_with_root(dir.path());
    config
        .domains
        .get_mut(multihost::config::DEFAULT_DOMAIN)
        .unwrap()
        .htpasswd_file = Some(htpasswd);
    let router = router_for(&config, 8080);

    let response = router
        .clone()
        .oneshot(multipart_request(
            "/u/",
            &[Part::File {
                name: "f.txt",
                content: b"x",
            }],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok()),
        Some("Basic realm=\"*\"")
    );
    assert!(!dir.path().join("f.txt").exists());

    let wrong = BASE64.encode("test:wrong");
    let mut request = multipart_request(
        "/u/",
        &[Part::File {
            name: "f.txt",
            content: b"x",
        }],
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Basic {wrong}").parse().unwrap(),
    );
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let good = BASE64.encode("test:123");
    let mut request = multipart_request(
        "/u/",
        &[Part::File {
            name: "f.txt",
            content: b"x",
        }],
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Basic {good}").parse().unwrap(),
    );
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // GET is not a guarded method under the default policy.
    std::fs::write(dir.path().join("open.txt"), b"public").unwrap();
    let response = router.oneshot(get("/open.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn host_header_selects_the_domain() {
    let alpha = tempfile::tempdir().unwrap();
    let beta = tempfile::tempdir().unwrap();
    std::fs::write(alpha.path().join("who.txt"), b"alpha").unwrap();
    std::fs::write(beta.path().join("who.txt"), b"beta").unwrap();

    let mut config = open_config(alpha.path());
    add_domain(
        &mut config,
        "beta.test",
        DomainConfig {
            root_dir: beta.path().to_path_buf(),
            auth_methods: Vec::new(),
            ..DomainConfig::default()
        },
    );
    let router = router_for(&config, 8080);

    let request = Request::builder()
        .uri("/who.txt")
        .header(header::HOST, "beta.test")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(body_bytes(response.into_body()).await, b"beta");

    // Port in the header is honored for domain matching.
    let request = Request::builder()
        .uri("/who.txt")
        .header(header::HOST, "beta.test:8080")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(body_bytes(response.into_body()).await, b"beta");

    // Unknown hosts fall back to the default domain.
    let request = Request::builder()
        .uri("/who.txt")
        .header(header::HOST, "unknown.test")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(body_bytes(response.into_body()).await, b"alpha");
}

#[tokio::test]
async fn upload_paths_are_per_domain() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = open_config(dir.path());
    {
        let domain = config
            .domains
            .get_mut(multihost::config::DEFAULT_DOMAIN)
            .unwrap();
        domain.upload_path = "/incoming/".to_string();
    }
    let router = router_for(&config, 8080);

    let request = multipart_request(
        "/incoming/",
        &[Part::File {
            name: "f.txt",
            content: b"x",
        }],
    );
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // The default path is plain static territory now.
    let response = router.oneshot(get("/u/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
