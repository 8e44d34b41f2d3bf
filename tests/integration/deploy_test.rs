// Packing a site, ingesting it into file storage and serving it from a
// catalog-configured database resolver

use http::header::{CONTENT_RANGE, CONTENT_TYPE};
use http::{Method, StatusCode};
use std::fs::File;

use siteedge::config::Config;
use siteedge::deploy::{self, DeployError, DeployLimits, Manifest};
use siteedge::pipeline::RequestContext;
use siteedge::proxy::init::initialize_from_config;
use siteedge::storage::StorageRegistry;

use super::common::{body_text, get, site_tree};

const LOGO: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

#[tokio::test]
async fn test_pack_ingest_and_serve() {
    let site = site_tree(&[
        ("site.yaml", "spa: false\n"),
        ("index.html", "<h1>shipped</h1>"),
        ("img/logo.txt", LOGO),
    ]);
    let work = tempfile::tempdir().unwrap();
    let blobs = work.path().join("blobs");
    std::fs::create_dir_all(&blobs).unwrap();

    // Client side
    let manifest = deploy::collect(site.path(), 100).unwrap();
    let manifest_path = work.path().join("d-1.json");
    std::fs::write(&manifest_path, manifest.to_json().unwrap()).unwrap();
    let archive_path = work.path().join("d-1.tar.gz");
    deploy::pack(site.path(), &manifest, File::create(&archive_path).unwrap()).unwrap();

    // Server side
    let storage_url = format!("file://{}", blobs.display());
    let store = StorageRegistry::with_defaults().open(&storage_url).await.unwrap();
    let uploaded = Manifest::from_json(&std::fs::read(&manifest_path).unwrap()).unwrap();
    let report = deploy::ingest(
        &uploaded,
        File::open(&archive_path).unwrap(),
        DeployLimits::default(),
        store,
        "acme/main/d-1/",
    )
    .await
    .unwrap();
    assert_eq!(report.files, 3);

    let catalog = r#"
apps:
  - id: acme
    sites:
      - pattern: main
deployments:
  - id: d-1
    app: acme
    site: main
    prefix: acme/main/d-1/
    manifest: d-1.json
    uploaded_at: 2024-05-01T12:00:00Z
"#;
    let catalog_path = work.path().join("catalog.yaml");
    std::fs::write(&catalog_path, catalog).unwrap();

    let config_yaml = format!(
        "hosts:\n  pattern: \"http://*.pages.test\"\nresolver:\n  kind: database\n  catalog: {}\n  storage: \"{}\"\n",
        catalog_path.display(),
        storage_url
    );
    let config = Config::from_yaml_with_env(&config_yaml).unwrap();
    config.validate().unwrap();
    let edge = initialize_from_config(&config).await.unwrap();

    let mut served = edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(served.response.status(), StatusCode::OK);
    assert_eq!(body_text(&mut served.response).await, "<h1>shipped</h1>");
    assert_eq!(served.response.headers()[CONTENT_TYPE], "text/html");

    let mut range = edge
        .serve(get("acme.pages.test", "/img/logo.txt").with_header(http::header::RANGE, "bytes=10-15"))
        .await;
    assert_eq!(range.response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(range.response.headers()[CONTENT_RANGE], "bytes 10-15/36");
    assert_eq!(body_text(&mut range.response).await, "abcdef");

    let head = edge
        .serve(RequestContext::new(Method::HEAD, "acme.pages.test", "/img/logo.txt"))
        .await;
    assert_eq!(head.response.status(), StatusCode::OK);
    assert!(head.response.body().is_empty());
}

#[tokio::test]
async fn test_tampered_archive_is_rejected() {
    let site = site_tree(&[("index.html", "original")]);
    let manifest = deploy::collect(site.path(), 100).unwrap();

    // Same size, different content
    std::fs::write(site.path().join("index.html"), "tampered").unwrap();
    let archive = deploy::pack(site.path(), &manifest, Vec::new()).unwrap();

    let store = StorageRegistry::with_defaults().open("memory://").await.unwrap();
    let result = deploy::ingest(
        &manifest,
        std::io::Cursor::new(archive),
        DeployLimits::default(),
        store,
        "acme/main/d-9/",
    )
    .await;
    assert!(matches!(result, Err(DeployError::HashMismatch { .. })));
}

#[tokio::test]
async fn test_oversized_deployment_is_rejected_before_reading() {
    let site = site_tree(&[("a.txt", "aaaa"), ("b.txt", "bbbb")]);
    let manifest = deploy::collect(site.path(), 100).unwrap();
    let limits = DeployLimits {
        max_files: 10,
        max_total_size: 5,
    };

    let store = StorageRegistry::with_defaults().open("memory://").await.unwrap();
    let result = deploy::ingest(
        &manifest,
        std::io::Cursor::new(Vec::new()),
        limits,
        store,
        "x/",
    )
    .await;
    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::DeploymentTooLarge { size: 8, max: 5 }));
    assert_eq!(err.status_code(), 413);
}
