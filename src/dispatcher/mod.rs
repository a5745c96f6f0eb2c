//! # Dispatcher Module
//!
//! The per-request entry point. For every request the dispatcher:
//!
//! 1. Resolves the method and path through the current [`RouteResolver`]
//! 2. Takes a context from the [`ContextPool`]
//! 3. Resets it with the request, a writer over the response sink and the resolved chain
//! 4. Starts the session when the environment has a session manager, staging any
//!    `Set-Cookie` header before a handler can commit the response
//! 5. Runs the chain and its finalizers
//! 6. Takes the sink back and returns the context to the pool
//!
//! Requests with no matching route run the not-found chain through the same lifecycle.
//!
//! ## Concurrency
//!
//! [`Dispatcher::handle`] runs on the caller's coroutine or thread. [`Dispatcher::serve`]
//! spawns a `may` coroutine per request, so concurrent requests only meet in the pool,
//! which hands each of them a distinct context.
//!
//! The resolver sits in an [`ArcSwap`](arc_swap::ArcSwap), so
//! [`Dispatcher::replace_resolver`] swaps routes without blocking in-flight requests.
//!
//! ## Panics
//!
//! A panic that escapes the chain is re-raised from `handle` after the finalizers ran;
//! the context is discarded rather than pooled. Install
//! [`middleware::recover`](crate::middleware::recover) to turn panics into 500 responses.
//!
//! [`RouteResolver`]: crate::router::RouteResolver
//! [`ContextPool`]: crate::pool::ContextPool

mod core;

pub use core::{not_found_handler, Dispatcher, Served};
