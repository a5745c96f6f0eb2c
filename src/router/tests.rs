use super::{RouteResolver, Router};
use crate::chain::handler;
use http::Method;

#[test]
fn test_root_path() {
    let (re, params) = Router::path_to_regex("/").unwrap();
    assert!(re.is_match("/"));
    assert!(params.is_empty());
}

#[test]
fn test_parameterized_path() {
    let (re, params) = Router::path_to_regex("/items/{id}").unwrap();
    assert!(re.is_match("/items/123"));
    assert!(!re.is_match("/items/123/extra"));
    assert_eq!(params, vec!["id"]);
}

#[test]
fn test_literal_segments_are_escaped() {
    let (re, _) = Router::path_to_regex("/files/v1.0").unwrap();
    assert!(re.is_match("/files/v1.0"));
    assert!(!re.is_match("/files/v1x0"));
}

#[test]
fn test_resolve_extracts_params_in_order() {
    let mut router = Router::new();
    router
        .add(
            Method::GET,
            "/users/{user_id}/posts/{post_id}",
            vec![handler(|_| {}), handler(|_| {})],
        )
        .unwrap();

    let m = router.resolve(&Method::GET, "/users/7/posts/abc").unwrap();
    assert_eq!(m.chain.len(), 2);
    assert_eq!(m.get_path_param("user_id"), Some("7"));
    assert_eq!(m.get_path_param("post_id"), Some("abc"));
    assert_eq!(&*m.name, "/users/{user_id}/posts/{post_id}");
}

#[test]
fn test_method_must_match() {
    let mut router = Router::new();
    router.add(Method::POST, "/pets", vec![]).unwrap();
    assert!(router.resolve(&Method::GET, "/pets").is_none());
    assert!(router.resolve(&Method::POST, "/pets").is_some());
}

#[test]
fn test_first_registered_route_wins() {
    let mut router = Router::new();
    router
        .add(Method::GET, "/pets/mine", vec![handler(|_| {})])
        .unwrap();
    router.add(Method::GET, "/pets/{id}", vec![]).unwrap();

    let m = router.resolve(&Method::GET, "/pets/mine").unwrap();
    assert_eq!(m.chain.len(), 1);
    assert!(m.path_params.is_empty());
    assert_eq!(router.patterns(), vec!["GET /pets/mine", "GET /pets/{id}"]);
}
