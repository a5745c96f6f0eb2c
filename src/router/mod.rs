//! # Router Module
//!
//! Route resolution at the boundary of the request core.
//!
//! ## Overview
//!
//! The dispatcher does not care how routes are registered or matched. It asks a
//! [`RouteResolver`] for a [`RouteMatch`] and treats the result as opaque input to
//! [`Context::reset`](crate::context::Context::reset): the resolved handler chain and
//! the extracted path parameters.
//!
//! [`Router`] is the stock resolver. It compiles path patterns such as
//! `/users/{id}/posts/{post_id}` into anchored regexes at registration time and scans
//! them in registration order when resolving, so the first registered match wins.
//!
//! ## Example
//!
//! ```rust
//! use brrtcore::chain::handler;
//! use brrtcore::router::{RouteResolver, Router};
//! use http::Method;
//!
//! let mut router = Router::new();
//! router
//!     .add(Method::GET, "/pets/{id}", vec![handler(|_ctx| {})])
//!     .expect("valid pattern");
//!
//! let matched = router.resolve(&Method::GET, "/pets/42").expect("route");
//! assert_eq!(matched.get_path_param("id"), Some("42"));
//! ```

mod core;
#[cfg(test)]
mod tests;

pub use core::{ParamVec, RouteMatch, RouteResolver, Router, MAX_INLINE_PARAMS};
