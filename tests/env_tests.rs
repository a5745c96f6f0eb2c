#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Tests for the application environment and the capability registry
//!
//! # Test Coverage
//!
//! - Loading `AppConfig` from a YAML file
//! - Built-in capabilities invoked through `Context::call`
//! - Custom and replaced capabilities, including a failing `release`

mod common;

use brrtcore::chain::{chain, handler};
use brrtcore::context::Context;
use brrtcore::env::{AppConfig, Env};
use brrtcore::extension::{Capability, CapabilityError};
use brrtcore::response::{BufferedResponse, ResponseWriter};
use common::{bound, env, get, Recorder};
use http::StatusCode;
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;

const CONFIG: &str = r#"
mode:
  development: false
  production: true
store:
  greeting: hello
  features: "a, b"
session:
  cookie_name: app_session
  gc_lifetime_secs: 600
"#;

#[test]
fn test_env_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = AppConfig::from_yaml_file(file.path()).unwrap();
    let env = Env::from_config(config).unwrap();

    assert!(env.modes.production);
    assert!(!env.modes.development);
    assert_eq!(env.store.get("greeting").unwrap().value, "hello");
    assert_eq!(env.store.get("features").unwrap().as_list(), vec!["a", "b"]);
    let manager = env.session_manager().unwrap();
    assert_eq!(manager.config().cookie_name, "app_session");
    assert_eq!(manager.config().max_lifetime_secs, 600);
}

#[test]
fn test_missing_config_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = AppConfig::from_yaml_file(&path).unwrap_err();

    assert!(err.to_string().contains("absent.yaml"), "{err}");
}

#[test]
fn test_invalid_yaml_is_rejected() {
    assert!(AppConfig::from_yaml_str("mode: [not, a, map]").is_err());
    assert_eq!(AppConfig::from_yaml_str("{}").unwrap(), AppConfig::default());
}

#[test]
fn test_mode_and_store_capabilities() {
    let config = AppConfig::from_yaml_str(CONFIG).unwrap();
    let (mut ctx, _sink) = bound(Arc::new(Env::from_config(config).unwrap()), "/", chain([]));

    let modes = ctx.call("mode", &[]).unwrap();
    assert_eq!(modes["production"], json!(true));
    assert_eq!(ctx.call("store", &[json!("greeting")]).unwrap(), json!("hello"));
    assert!(matches!(
        ctx.call("store", &[json!("missing")]),
        Err(CapabilityError::NotFound { .. })
    ));
    assert!(matches!(
        ctx.call("store", &[]),
        Err(CapabilityError::InvalidArguments { .. })
    ));
}

#[test]
fn test_serve_capabilities_write_response() {
    let (mut ctx, sink) = bound(env(), "/", chain([]));

    let written = ctx
        .call("servejson", &[json!(201), json!({"id": 7})])
        .unwrap();

    assert_eq!(written, json!(8));
    assert_eq!(sink.status(), Some(StatusCode::CREATED));
    assert_eq!(sink.body_text(), r#"{"id":7}"#);

    let (mut ctx, sink) = bound(env(), "/", chain([]));
    ctx.call("header", &[json!("x-served-by"), json!("core")]).unwrap();
    ctx.call("serveplain", &[json!(200), json!("plain")]).unwrap();
    assert_eq!(sink.header("x-served-by").as_deref(), Some("core"));
    assert_eq!(
        sink.header("content-type").as_deref(),
        Some("text/plain; charset=utf-8")
    );
    assert_eq!(sink.body_text(), "plain");
}

#[test]
fn test_redirect_capability() {
    let (mut ctx, sink) = bound(env(), "/old", chain([]));

    assert!(matches!(
        ctx.call("redirect", &[json!(200), json!("/new")]),
        Err(CapabilityError::InvalidArguments { .. })
    ));
    ctx.call("redirect", &[json!(302), json!("/new")]).unwrap();

    assert_eq!(sink.status(), Some(StatusCode::FOUND));
    assert_eq!(sink.header("location").as_deref(), Some("/new"));
    assert!(sink.body().is_empty());
}

#[test]
fn test_custom_capabilities() {
    let mut env = Env::new();
    env.add_extension(
        "sum",
        Capability::detached(|args| Ok(json!(args.iter().filter_map(Value::as_i64).sum::<i64>()))),
    )
    .add_extension(
        "whoami",
        Capability::contextual(|ctx, _| Ok(json!(ctx.path()))),
    );
    let (mut ctx, _sink) = bound(Arc::new(env), "/me", chain([]));

    assert_eq!(ctx.call("sum", &[json!(2), json!(3), json!(4)]).unwrap(), json!(9));
    assert_eq!(ctx.call("whoami", &[]).unwrap(), json!("/me"));
}

#[test]
fn test_failing_release_still_cancels() {
    let rec = Recorder::new();
    let r = rec.clone();
    let mut env = Env::new();
    env.add_extension(
        "release",
        Capability::detached(|_| {
            Err(CapabilityError::InvalidArguments {
                name: "release".to_string(),
                reason: "refusing".to_string(),
            })
        }),
    )
    .on_post_process(move |_request, status| r.push(format!("post:{}", status.as_u16())));

    let sink = BufferedResponse::new();
    let mut ctx = Context::new(Arc::new(env));
    ctx.reset(
        get("/"),
        ResponseWriter::new(Box::new(sink.clone())),
        chain([handler(|ctx: &mut Context| {
            ctx.serve_plain(StatusCode::OK, "ok").unwrap();
        })]),
    );

    ctx.run();

    assert!(ctx.is_done());
    assert_eq!(rec.events(), vec!["post:200"]);
}
