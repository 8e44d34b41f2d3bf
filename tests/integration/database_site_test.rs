// End-to-end serving of uploaded deployments: pack → ingest → resolve → serve

use http::header::{
    ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, ETAG, IF_NONE_MATCH, LAST_MODIFIED,
    LOCATION, VARY,
};
use http::StatusCode;

use super::common::{acme_edge, body_text, get};

#[tokio::test]
async fn test_default_site_serves_index() {
    let (edge, _) = acme_edge().await;

    let mut served = edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(served.identity.as_deref(), Some("acme"));
    assert_eq!(served.response.status(), StatusCode::OK);
    assert!(body_text(&mut served.response).await.contains("<title>app</title>"));

    let headers = served.response.headers();
    assert_eq!(headers[CACHE_CONTROL], "public, max-age=31536000, no-cache");
    assert_eq!(headers[LAST_MODIFIED], "Wed, 01 May 2024 12:00:00 GMT");
    assert_eq!(headers[VARY], "Accept-Encoding");
}

#[tokio::test]
async fn test_explicit_and_default_site_are_the_same_deployment() {
    let (edge, _) = acme_edge().await;
    let explicit = edge.serve(get("main.acme.pages.test", "/")).await;
    let aliased = edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(explicit.response.headers()[ETAG], aliased.response.headers()[ETAG]);
}

#[tokio::test]
async fn test_spa_fallback_serves_root_index() {
    let (edge, _) = acme_edge().await;
    let mut served = edge.serve(get("acme.pages.test", "/app/route/deep")).await;
    assert_eq!(served.response.status(), StatusCode::OK);
    assert!(body_text(&mut served.response).await.contains("<title>app</title>"));
}

#[tokio::test]
async fn test_directory_redirects_to_trailing_slash() {
    let (edge, _) = acme_edge().await;
    let served = edge.serve(get("acme.pages.test", "/docs?tab=2")).await;
    assert_eq!(served.response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(served.response.headers()[LOCATION], "/docs/?tab=2");

    let mut served = edge.serve(get("acme.pages.test", "/docs/")).await;
    assert_eq!(served.response.status(), StatusCode::OK);
    assert_eq!(body_text(&mut served.response).await, "<h1>docs</h1>");
}

#[tokio::test]
async fn test_site_with_domain_redirects_to_it() {
    let (edge, _) = acme_edge().await;
    let served = edge
        .serve(get("docs.acme.pages.test", "/assets/app.js?v=3"))
        .await;
    assert_eq!(served.response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        served.response.headers()[LOCATION],
        "https://docs.acme.com/assets/app.js?v=3"
    );
}

#[tokio::test]
async fn test_undeclared_site_is_404() {
    let (edge, _) = acme_edge().await;
    let served = edge.serve(get("blog.acme.pages.test", "/")).await;
    assert_eq!(served.response.status(), StatusCode::NOT_FOUND);

    let served = edge.serve(get("nobody.pages.test", "/")).await;
    assert_eq!(served.response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deployment_without_upload_time_is_500() {
    let (edge, _) = acme_edge().await;
    let mut served = edge.serve(get("preview-7.acme.pages.test", "/")).await;
    assert_eq!(served.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body_text(&mut served.response).await.contains("d-3"));
}

#[tokio::test]
async fn test_conditional_request() {
    let (edge, _) = acme_edge().await;
    let first = edge.serve(get("acme.pages.test", "/assets/app.js")).await;
    let etag = first.response.headers()[ETAG].to_str().unwrap().to_string();

    let second = edge
        .serve(get("acme.pages.test", "/assets/app.js").with_header(IF_NONE_MATCH, &etag))
        .await;
    assert_eq!(second.response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_custom_not_found_page_is_not_reached_with_spa() {
    // With spa enabled (the default) unknown paths fall back to the root
    // index instead of the custom 404 page.
    let (edge, _) = acme_edge().await;
    let served = edge.serve(get("acme.pages.test", "/missing.png")).await;
    assert_eq!(served.response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_compressed_response() {
    let (edge, _) = acme_edge().await;
    let served = edge
        .serve(get("acme.pages.test", "/").with_header(ACCEPT_ENCODING, "gzip;q=0.5, br"))
        .await;
    assert_eq!(served.response.status(), StatusCode::OK);
    // The root index is tiny, below the compression threshold
    assert!(!served.response.headers().contains_key(CONTENT_ENCODING));
}

#[tokio::test(start_paused = true)]
async fn test_resolution_is_cached_per_identity() {
    let (edge, resolver) = acme_edge().await;

    edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(resolver.calls(), 1);

    let targets = ["/docs/", "/assets/app.js", "/", "/app/route", "/docs/"];
    for (i, target) in targets.into_iter().enumerate() {
        tokio::time::advance(std::time::Duration::from_secs(10)).await;
        let host = if i % 2 == 0 { "acme.pages.test" } else { "acme.pages.test:443" };
        edge.serve(get(host, target)).await;
    }
    assert_eq!(resolver.calls(), 1);

    tokio::time::advance(std::time::Duration::from_secs(11)).await;
    edge.serve(get("acme.pages.test", "/")).await;
    assert_eq!(resolver.calls(), 2);
}
