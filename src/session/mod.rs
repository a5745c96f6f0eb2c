//! # Session Module
//!
//! Session handles for request contexts.
//!
//! The request core calls a [`SessionManager`] once per request (the `start`
//! capability) and exposes the resulting [`SessionStore`] on the context. Storage is
//! behind the [`SessionProvider`] trait; [`MemoryProvider`] keeps sessions in process
//! and is what [`SessionManager::in_memory`] wires up.
//!
//! ## Session Identification
//!
//! The session id travels in a cookie (`brrtcore_session` by default). When the
//! request carries no cookie, an empty one, or an id the provider does not know, a
//! fresh id is generated and a `Set-Cookie` header is staged on the response:
//!
//! ```text
//! Set-Cookie: brrtcore_session=3f9c...; Path=/; HttpOnly
//! ```
//!
//! `Secure`, `Domain` and `Max-Age` are appended when configured.
//!
//! ## Garbage Collection
//!
//! [`SessionManager::spawn_gc`] runs the provider's `gc` every `gc_lifetime_secs` on
//! a `may` coroutine until the manager is dropped.

mod cookie;
mod core;
mod manager;
mod memory;

pub use core::{SessionConfig, SessionError, SessionProvider, SessionStore};
pub use cookie::request_cookie;
pub use manager::SessionManager;
pub use memory::{MemoryProvider, MemorySession};
