// Serving sites from local directories through the static and adhoc resolvers

use http::header::{CONTENT_TYPE, LOCATION};
use http::StatusCode;
use std::sync::Arc;

use siteedge::config::Config;
use siteedge::hostid::HostIdScheme;
use siteedge::proxy::init::initialize_from_config;
use siteedge::resolver::{AdHocResolver, DefaultSite, StaticResolver};

use super::common::{body_text, edge, get, site_tree, write_files};

#[tokio::test]
async fn test_static_sites() {
    let root = site_tree(&[
        ("landing/site.yaml", "spa: false\n"),
        ("landing/index.html", "landing"),
        ("acme/site.yaml", "spa: false\n"),
        ("acme/index.html", "acme main"),
        ("acme-docs/site.yaml", "spa: false\nnot_found: /missing.html\n"),
        ("acme-docs/index.html", "acme docs"),
        ("acme-docs/missing.html", "custom 404"),
    ]);
    let sites = vec![
        ("main", root.path().join("landing")),
        ("main.acme", root.path().join("acme")),
        ("docs.acme", root.path().join("acme-docs")),
    ];
    let edge = edge(Arc::new(StaticResolver::new(
        sites,
        HostIdScheme::Subdomain,
        DefaultSite::new("main", true),
    )));

    let mut bare = edge.serve(get("pages.test", "/")).await;
    assert_eq!(body_text(&mut bare.response).await, "landing");

    let mut tenant = edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(body_text(&mut tenant.response).await, "acme main");

    let mut docs = edge.serve(get("docs.acme.pages.test", "/")).await;
    assert_eq!(body_text(&mut docs.response).await, "acme docs");

    let mut missing = edge.serve(get("docs.acme.pages.test", "/nope.html")).await;
    assert_eq!(missing.response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(&mut missing.response).await, "custom 404");
    assert_eq!(missing.response.headers()[CONTENT_TYPE], "text/html");

    let unknown = edge.serve(get("blog.acme.pages.test", "/")).await;
    assert_eq!(unknown.response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_directory_without_site_yaml_is_not_found() {
    let root = site_tree(&[("acme/index.html", "no config")]);
    let edge = edge(Arc::new(AdHocResolver::new(
        root.path(),
        DefaultSite::new("main", true),
    )));
    let served = edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(served.response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_adhoc_labels_map_to_nested_directories() {
    let root = site_tree(&[
        ("acme/docs/site.yaml", "public: public\n"),
        ("acme/docs/public/index.html", "nested docs"),
        ("acme/docs/public/guide/index.html", "guide"),
    ]);
    let edge = edge(Arc::new(AdHocResolver::new(
        root.path(),
        DefaultSite::new("main", true),
    )));

    let mut served = edge.serve(get("docs.acme.pages.test", "/")).await;
    assert_eq!(body_text(&mut served.response).await, "nested docs");

    let served = edge.serve(get("docs.acme.pages.test", "/guide")).await;
    assert_eq!(served.response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(served.response.headers()[LOCATION], "/guide/");

    let served = edge.serve(get("docs.acme.pages.test", "/guide/index.html")).await;
    assert_eq!(served.response.headers()[LOCATION], "/guide/");
}

#[tokio::test]
async fn test_adhoc_rejects_dot_labels() {
    let root = site_tree(&[("acme/site.yaml", ""), ("acme/index.html", "acme")]);
    let edge = edge(Arc::new(AdHocResolver::new(
        root.path(),
        DefaultSite::new("main", true),
    )));
    let served = edge.serve(get("...pages.test", "/")).await;
    assert_eq!(served.response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_edge_from_config_file() {
    let root = site_tree(&[]);
    write_files(
        root.path(),
        &[("acme/site.yaml", "spa: false\n"), ("acme/index.html", "from config")],
    );
    let config_path = root.path().join("config.yaml");
    std::fs::write(
        &config_path,
        format!(
            "server:\n  admin_host: admin.pages.test\nhosts:\n  pattern: \"http://*.pages.test\"\nresolver:\n  kind: adhoc\n  root: {}\n",
            root.path().display()
        ),
    )
    .unwrap();

    let config = Config::from_file(&config_path).unwrap();
    config.validate().unwrap();
    let edge = initialize_from_config(&config).await.unwrap();

    let mut served = edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(body_text(&mut served.response).await, "from config");

    let mut health = edge.serve(get("admin.pages.test", "/health")).await;
    assert_eq!(health.response.status(), StatusCode::OK);
    assert!(body_text(&mut health.response).await.contains("\"status\":\"healthy\""));
}
