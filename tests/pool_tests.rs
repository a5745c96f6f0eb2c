#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Tests for the context pool
//!
//! A context handed out by the pool must be indistinguishable from a freshly
//! constructed one, and no two concurrent acquisitions may share an instance.

mod common;

use brrtcore::chain::{chain, handler};
use brrtcore::context::Context;
use brrtcore::env::Env;
use brrtcore::pool::ContextPool;
use brrtcore::response::ResponseWriter;
use brrtcore::runtime_config::RuntimeConfig;
use common::{env, get};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};

fn address(ctx: &Context) -> usize {
    std::ptr::from_ref(ctx) as usize
}

#[test]
fn test_concurrent_acquire_yields_distinct_contexts() {
    let pool = ContextPool::with_capacity(env(), 16, 4);
    let barrier = Barrier::new(8);

    let addresses: Vec<usize> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    let ctx = pool.acquire();
                    let addr = address(&ctx);
                    // Hold every context until all workers have one
                    barrier.wait();
                    pool.release(ctx);
                    addr
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let unique: HashSet<usize> = addresses.iter().copied().collect();
    assert_eq!(unique.len(), 8);
    let metrics = pool.metrics();
    assert_eq!(metrics.get_acquired(), 8);
    assert_eq!(metrics.get_created(), 8);
    assert_eq!(metrics.get_reused(), 4);
    assert_eq!(metrics.get_in_flight(), 0);
    assert_eq!(pool.idle_count(), 8);
}

#[test]
fn test_reused_context_matches_fresh_one() {
    let env = env();
    let pool = ContextPool::with_capacity(Arc::clone(&env), 2, 0);

    let mut ctx = pool.acquire();
    ctx.reset(
        get("/orders/9"),
        ResponseWriter::detached(),
        chain([handler(|ctx| {
            ctx.data().set("order", json!(9));
            ctx.defer(|| {});
            let _child = ctx.replicate();
            ctx.response().set_status(http::StatusCode::ACCEPTED);
        })]),
    );
    ctx.run();
    let first = address(&ctx);
    pool.release(ctx);

    let reused = pool.acquire();
    assert_eq!(address(&reused), first);
    assert_eq!(reused.snapshot(), Context::new(env).snapshot());
    assert_eq!(reused.path(), "/");
}

#[test]
fn test_release_cancels_unfinished_request() {
    let pool = ContextPool::with_capacity(env(), 2, 0);
    let mut ctx = pool.acquire();
    ctx.reset(get("/"), ResponseWriter::detached(), chain([]));
    let replica = ctx.replicate();
    let signal = ctx.done_signal();

    pool.release(ctx);

    assert!(signal.is_done());
    assert!(replica.is_done());
    let again = pool.acquire();
    assert!(!again.is_done());
    assert_eq!(again.cancel_node().child_count(), 0);
}

#[test]
fn test_pool_sized_from_runtime_config() {
    let mut env = Env::new();
    env.runtime = RuntimeConfig {
        pool_max_idle: 3,
        pool_preallocate: 2,
        ..RuntimeConfig::default()
    };
    let pool = ContextPool::new(Arc::new(env));

    assert_eq!(pool.max_idle(), 3);
    assert_eq!(pool.idle_count(), 2);
}

#[test]
fn test_zero_max_idle_never_retains() {
    let pool = ContextPool::with_capacity(env(), 0, 8);
    assert_eq!(pool.idle_count(), 0);

    let ctx = pool.acquire();
    pool.release(ctx);

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.metrics().get_dropped(), 1);
}
