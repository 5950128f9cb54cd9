//! Library definitions.
//!
//! Exports the rewriting core, allow-list matching, and the Pingora proxy
//! service that applies them to live exchanges.

pub mod config;
pub mod core;
pub mod security;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use config::{Config, RelayError, Result};
pub use core::proxy::RelayProxy;
pub use core::rewrite::{
    ProxyCodec, RELAY_SCHEME, REDIRECT_STATUSES, RedirectDecision, RedirectRewriter, RequestParts,
    RequestRewriter, RewriteDecision, is_redirect,
};
pub use security::allowlist::{AllowRule, DEFAULT_RULES, DomainMatcher, load_rules};
