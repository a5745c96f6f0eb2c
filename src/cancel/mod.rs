//! # Cancel Module
//!
//! Tree-structured cancellation for request contexts.
//!
//! ## Overview
//!
//! Every [`Context`](crate::context::Context) owns a [`CancelNode`]. A node carries a
//! one-shot done-signal, the error it was cancelled with, and the set of child nodes
//! registered under it. Replicas of a context hang their node off the parent's node,
//! so cancelling the request cancels every sub-task, while cancelling a sub-task never
//! touches the request.
//!
//! ## Ownership
//!
//! Nodes are reference counted. A parent keeps strong references to its children,
//! keyed by [`NodeId`]; a child keeps only a weak reference back to its parent. The
//! child set is mutated exclusively under the owning node's lock, and locks are only
//! ever taken downward (parent, then child) while propagating.
//!
//! ```text
//!        request node
//!        /          \
//!   replica A     replica B
//!       |
//!   replica A.1
//! ```
//!
//! ## Propagation Rules
//!
//! - Cancelling a node cancels all registered children with the same error, then
//!   clears the child set as a whole. Children do not detach themselves during a
//!   parent-initiated cancel.
//! - A child registered on an already cancelled parent is cancelled immediately.
//! - A second cancel of the same node is a no-op; the first error wins.
//! - Cancellation never travels upward.
//!
//! ## Waiting
//!
//! [`DoneSignal`] lets collaborators block on cancellation (for example to abort
//! in-flight I/O, or to race a timer for a deadline). Waiting uses `may`'s
//! coroutine-aware `Condvar`, so it parks a coroutine rather than an OS thread.

mod core;

pub use core::{CancelError, CancelNode, DoneSignal, NodeId};
