// Request pipeline unit tests

use http::Method;
use siteedge::pipeline::{parse_range_header, RequestContext};

#[test]
fn test_request_context_includes_request_id() {
    let context1 = RequestContext::new(Method::GET, "a.localhost", "/test1");
    let context2 = RequestContext::new(Method::GET, "a.localhost", "/test2");

    let id1 = context1.request_id();
    let id2 = context2.request_id();

    assert_ne!(id1, id2, "Each request should have a unique ID");
    assert_eq!(id1.len(), 36, "UUID should be 36 characters long");
}

#[test]
fn test_request_context_timestamp_is_recent() {
    let context = RequestContext::new(Method::GET, "a.localhost", "/");
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    assert!(now - context.timestamp() < 5);
}

#[test]
fn test_path_without_leading_slash_is_rooted() {
    let context = RequestContext::new(Method::GET, "a.localhost", "index.html");
    assert_eq!(context.path(), "/index.html");
}

#[test]
fn test_invalid_percent_encoding_is_kept() {
    let context = RequestContext::new(Method::GET, "a.localhost", "/%ff%fe");
    assert_eq!(context.path(), "/%ff%fe");
}

#[test]
fn test_range_header_single_range() {
    let header = parse_range_header("bytes=0-99").unwrap();
    let range = header.single_bytes_range().unwrap();
    assert_eq!(range.resolve(50), Some((0, 49)));
}
