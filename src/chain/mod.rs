//! # Chain Module
//!
//! Handler chains and the cursor that walks them.
//!
//! A [`Chain`] is an immutable, cheaply cloned sequence of [`Handler`]s resolved for a
//! request. The [`Cursor`] is the movable position inside that chain: it starts one
//! slot before the first handler so the first advance lands on index 0.
//!
//! Middleware is expressed as ordinary handlers that call
//! [`Context::next`](crate::context::Context::next) to run everything downstream and
//! then resume their own post-processing. A handler that returns without calling
//! `next` short-circuits the rest of the chain.
//!
//! [`Finalizers`] are the deferred actions a context runs, in registration order, once
//! the chain has stopped advancing.

mod core;

pub use core::{chain, handler, Chain, Cursor, Deferred, Finalizers, Handler};
