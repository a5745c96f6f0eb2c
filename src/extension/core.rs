//! Extension core - registry and calling convention.

use crate::context::Context;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Value-or-error returned by every capability
pub type CapabilityResult = Result<Value, CapabilityError>;

type ContextualFn = Arc<dyn Fn(&mut Context, &[Value]) -> CapabilityResult + Send + Sync>;
type DetachedFn = Arc<dyn Fn(&[Value]) -> CapabilityResult + Send + Sync>;

/// Failure of a capability call
#[derive(Debug)]
pub enum CapabilityError {
    /// No capability is registered under the name
    NotFound {
        /// The requested name
        name: String,
    },
    /// The arguments do not fit the capability
    InvalidArguments {
        /// Capability name
        name: String,
        /// What was wrong
        reason: String,
    },
    /// The capability ran and failed
    Failed {
        /// Capability name
        name: String,
        /// Underlying error
        source: anyhow::Error,
    },
}

impl CapabilityError {
    pub(crate) fn invalid(name: &str, reason: impl Into<String>) -> Self {
        CapabilityError::InvalidArguments {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn failed(name: &str, source: impl Into<anyhow::Error>) -> Self {
        CapabilityError::Failed {
            name: name.to_string(),
            source: source.into(),
        }
    }
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::NotFound { name } => {
                write!(f, "capability '{name}' is not registered")
            }
            CapabilityError::InvalidArguments { name, reason } => {
                write!(f, "capability '{name}' called with invalid arguments: {reason}")
            }
            CapabilityError::Failed { name, source } => {
                write!(f, "capability '{name}' failed: {source}")
            }
        }
    }
}

impl std::error::Error for CapabilityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CapabilityError::Failed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// A registered callable.
#[derive(Clone)]
pub enum Capability {
    /// Needs the calling context
    Contextual(ContextualFn),
    /// Works on its arguments alone
    Detached(DetachedFn),
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Contextual(_) => f.write_str("Capability::Contextual"),
            Capability::Detached(_) => f.write_str("Capability::Detached"),
        }
    }
}

impl Capability {
    pub fn contextual<F>(f: F) -> Self
    where
        F: Fn(&mut Context, &[Value]) -> CapabilityResult + Send + Sync + 'static,
    {
        Capability::Contextual(Arc::new(f))
    }

    pub fn detached<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> CapabilityResult + Send + Sync + 'static,
    {
        Capability::Detached(Arc::new(f))
    }

    /// Invoke with the calling context and arguments
    pub fn invoke(&self, ctx: &mut Context, args: &[Value]) -> CapabilityResult {
        match self {
            Capability::Contextual(f) => f(ctx, args),
            Capability::Detached(f) => f(args),
        }
    }
}

/// Name → capability registry.
#[derive(Clone, Debug, Default)]
pub struct Extensions {
    entries: HashMap<String, Capability>,
}

impl Extensions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `capability` under `name`, replacing any previous entry
    pub fn add(&mut self, name: impl Into<String>, capability: Capability) -> &mut Self {
        self.entries.insert(name.into(), capability);
        self
    }

    /// Copy every entry of `other` in, overriding names that already exist
    pub fn merge(&mut self, other: &Extensions) {
        for (name, capability) in &other.entries {
            self.entries.insert(name.clone(), capability.clone());
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
