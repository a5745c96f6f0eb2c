//! # Runtime Configuration Module
//!
//! Environment variable configuration for the request runtime.
//!
//! ## Environment Variables
//!
//! ### `BRRTR_STACK_SIZE`
//!
//! Stack size for request and replica coroutines. Accepts decimal (`65536`) or
//! hexadecimal (`0x10000`). Default: `0x10000` (64 KB).
//!
//! ### `BRRTR_CTX_POOL_MAX_IDLE`
//!
//! Maximum number of idle contexts the pool keeps. Contexts released beyond this are
//! dropped. Default: `1024`.
//!
//! ### `BRRTR_CTX_POOL_PREALLOCATE`
//!
//! Contexts created when the pool is built. Default: `0`.
//!
//! ## Usage
//!
//! ```rust
//! use brrtcore::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

pub const DEFAULT_STACK_SIZE: usize = 0x10000;
pub const DEFAULT_POOL_MAX_IDLE: usize = 1024;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// Idle contexts retained by the pool
    pub pool_max_idle: usize,
    /// Contexts created up front
    pub pool_preallocate: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            pool_max_idle: DEFAULT_POOL_MAX_IDLE,
            pool_preallocate: 0,
        }
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    if let Some(hex) = val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        usize::from_str_radix(hex, 16).ok()
    } else {
        val.parse().ok()
    }
}

fn var_or(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| parse_size(&v))
        .unwrap_or(default)
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            stack_size: var_or("BRRTR_STACK_SIZE", DEFAULT_STACK_SIZE),
            pool_max_idle: var_or("BRRTR_CTX_POOL_MAX_IDLE", DEFAULT_POOL_MAX_IDLE),
            pool_preallocate: var_or("BRRTR_CTX_POOL_PREALLOCATE", 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size_accepts_hex_and_decimal() {
        assert_eq!(parse_size("0x4000"), Some(0x4000));
        assert_eq!(parse_size("0X10"), Some(16));
        assert_eq!(parse_size(" 32768 "), Some(32768));
        assert_eq!(parse_size("lots"), None);
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.stack_size, 0x10000);
        assert_eq!(config.pool_max_idle, 1024);
        assert_eq!(config.pool_preallocate, 0);
    }
}
