//! # Extension Module
//!
//! Name-keyed capabilities a handler can invoke through its context.
//!
//! ## Overview
//!
//! Some behaviour is late-bound: a handler calls `ctx.call("serveplain", &args)` rather
//! than a statically typed method, and the application decides at startup what sits
//! behind the name. The registry maps each name to a [`Capability`], a tagged callable
//! with a uniform calling convention:
//!
//! ```text
//! (context, [serde_json::Value]) -> Result<serde_json::Value, CapabilityError>
//! ```
//!
//! A missing name or a failing invocation comes back as a [`CapabilityError`] to the
//! handler that made the call; nothing else in the request is affected.
//!
//! ## Built-in Capabilities
//!
//! [`Env::new`](crate::env::Env::new) registers these:
//!
//! | Name | Arguments | Effect |
//! |------|-----------|--------|
//! | `mode` | none | current modes as JSON |
//! | `store` | key | configured value for `key` |
//! | `start` | none | start the session, returns its id or null |
//! | `release` | none | release the session and cancel the context |
//! | `serveplain` | status, text | write a `text/plain` response |
//! | `servejson` | status, value | write an `application/json` response |
//! | `redirect` | status, location | set `Location` and commit the status |
//! | `header` | name, value | set a response header |
//!
//! Applications can replace any of them by adding a capability under the same name.

pub(crate) mod builtin;
mod core;

pub use core::{Capability, CapabilityError, CapabilityResult, Extensions};
