//! Router core - hot path for route resolution.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use crate::chain::{Chain, Handler};
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Names are `Arc<str>` because they come from the route table, which is built once.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Resolves a method and path to a handler chain.
pub trait RouteResolver: Send + Sync {
    /// `None` when nothing matches; the dispatcher then runs its not-found chain
    fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch>;
}

/// Result of resolving a request
#[derive(Clone)]
pub struct RouteMatch {
    /// Route name used in logs (the registered pattern for [`Router`])
    pub name: Arc<str>,
    /// Handlers to run, in order
    pub chain: Chain,
    /// Parameters extracted from the path
    pub path_params: ParamVec,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("name", &self.name)
            .field("handlers", &self.chain.len())
            .field("path_params", &self.path_params)
            .finish()
    }
}

impl RouteMatch {
    /// Get a path parameter by name
    ///
    /// "Last write wins" when the same name appears at several depths.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Convert path_params to a HashMap
    /// Note: This allocates - use get_path_param() in hot paths
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

struct CompiledRoute {
    method: Method,
    pattern: Arc<str>,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    chain: Chain,
}

/// Pattern router resolving `/segment/{param}` style paths.
#[derive(Default)]
pub struct Router {
    routes: Vec<CompiledRoute>,
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handlers` for `method` on `pattern`.
    pub fn add(
        &mut self,
        method: Method,
        pattern: &str,
        handlers: Vec<Handler>,
    ) -> Result<&mut Self, regex::Error> {
        let (regex, param_names) = Self::path_to_regex(pattern)?;
        info!(
            method = %method,
            pattern = %pattern,
            handlers = handlers.len(),
            total_routes = self.routes.len() + 1,
            "Route registered"
        );
        self.routes.push(CompiledRoute {
            method,
            pattern: Arc::from(pattern),
            regex,
            param_names: param_names.into_iter().map(Arc::from).collect(),
            chain: Chain::from(handlers),
        });
        Ok(self)
    }

    /// Number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Registered `METHOD pattern` pairs, in registration order
    #[must_use]
    pub fn patterns(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|r| format!("{} {}", r.method, r.pattern))
            .collect()
    }

    /// Convert a path pattern to an anchored regex and its parameter names
    ///
    /// `/users/{id}` becomes `^/users/([^/]+)$` with names `["id"]`. Literal
    /// segments are escaped.
    pub(crate) fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
        if path == "/" {
            return Ok((Regex::new(r"^/$")?, Vec::new()));
        }

        let mut pattern = String::with_capacity(path.len() + 5);
        pattern.push('^');
        let mut param_names = Vec::with_capacity(path.matches('{').count());

        for segment in path.split('/') {
            if segment.len() > 2 && segment.starts_with('{') && segment.ends_with('}') {
                pattern.push_str("/([^/]+)");
                param_names.push(segment[1..segment.len() - 1].to_string());
            } else if !segment.is_empty() {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }

        pattern.push('$');
        Ok((Regex::new(&pattern)?, param_names))
    }
}

impl RouteResolver for Router {
    fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        for route in &self.routes {
            if route.method != *method {
                continue;
            }
            let Some(caps) = route.regex.captures(path) else {
                continue;
            };
            let mut path_params = ParamVec::new();
            for (name, value) in route.param_names.iter().zip(caps.iter().skip(1)) {
                if let Some(value) = value {
                    path_params.push((Arc::clone(name), value.as_str().to_string()));
                }
            }
            debug!(
                method = %method,
                path = %path,
                route_pattern = %route.pattern,
                path_params = ?path_params,
                "Route matched"
            );
            return Some(RouteMatch {
                name: Arc::clone(&route.pattern),
                chain: Arc::clone(&route.chain),
                path_params,
            });
        }
        debug!(method = %method, path = %path, "No route matched");
        None
    }
}
