#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Tests for the cancellation tree under concurrency
//!
//! Children are registered from several coroutines while the root is cancelled;
//! every child must end up cancelled whether it registered before or after.

mod common;

use brrtcore::cancel::{CancelError, CancelNode};
use brrtcore::chain::chain;
use brrtcore::context::Context;
use common::{bound, env};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_concurrent_registration_and_cancel() {
    let root = CancelNode::root();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let root = Arc::clone(&root);
            may::go!(move || {
                (0..50)
                    .map(|i| {
                        if i % 10 == 0 {
                            may::coroutine::yield_now();
                        }
                        CancelNode::child_of(&root)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    root.cancel(false, CancelError::Canceled);

    let children: Vec<Arc<CancelNode>> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(children.len(), 400);
    for child in &children {
        assert_eq!(child.err(), Some(CancelError::Canceled));
    }
    assert_eq!(root.child_count(), 0);
}

#[test]
fn test_done_signal_wakes_waiting_coroutine() {
    let node = CancelNode::root();
    let signal = node.done_signal();
    let waiter = may::go!(move || signal.wait());

    may::coroutine::sleep(Duration::from_millis(20));
    node.cancel(false, CancelError::aborted("shutdown"));

    assert_eq!(waiter.join().unwrap(), CancelError::aborted("shutdown"));
}

#[test]
fn test_wait_timeout_expires_on_live_node() {
    let node = CancelNode::root();
    assert_eq!(node.done_signal().wait_timeout(Duration::from_millis(20)), None);
    node.cancel(false, CancelError::DeadlineExceeded);
    assert_eq!(
        node.done_signal().wait_timeout(Duration::from_millis(20)),
        Some(CancelError::DeadlineExceeded)
    );
}

#[test]
fn test_cancel_propagates_through_generations() {
    let root = CancelNode::root();
    let a = CancelNode::child_of(&root);
    let b = CancelNode::child_of(&a);
    let c = CancelNode::child_of(&b);

    root.cancel(false, CancelError::aborted("drain"));

    for node in [&a, &b, &c] {
        assert_eq!(node.err(), Some(CancelError::aborted("drain")));
    }
    // Propagation clears child sets but keeps parent links
    assert_eq!(b.child_count(), 0);
    assert_eq!(c.parent().unwrap().id(), b.id());
}

#[test]
fn test_child_cancel_leaves_siblings_running() {
    let root = CancelNode::root();
    let a = CancelNode::child_of(&root);
    let b = CancelNode::child_of(&root);

    a.cancel(true, CancelError::Canceled);

    assert!(a.is_done());
    assert!(!b.is_done());
    assert!(!root.is_done());
    assert!(!root.has_child(a.id()));
    assert!(root.has_child(b.id()));
}

#[test]
fn test_late_child_inherits_parent_error() {
    let root = CancelNode::root();
    root.cancel(false, CancelError::DeadlineExceeded);

    let late = CancelNode::child_of(&root);

    assert_eq!(late.err(), Some(CancelError::DeadlineExceeded));
    assert_eq!(root.child_count(), 0);
}

#[test]
#[should_panic(expected = "missing cancel error")]
fn test_cancel_without_reason_panics() {
    CancelNode::root().cancel(false, CancelError::aborted("  "));
}

#[test]
fn test_spawned_replica_waits_for_parent_cancel() {
    let (ctx, _sink) = bound(env(), "/", chain([]));

    let handle = ctx
        .spawn_replica(|replica: &mut Context| replica.done_signal().wait())
        .unwrap();
    may::coroutine::sleep(Duration::from_millis(20));
    ctx.cancel();

    assert_eq!(handle.join().unwrap(), CancelError::Canceled);
    assert_eq!(ctx.cancel_node().child_count(), 0);
}
