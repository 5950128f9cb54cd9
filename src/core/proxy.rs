//! Proxy service implementation.
//!
//! Adapts the pure rewriting core onto live Pingora exchanges: request
//! rewriting on the inbound leg, redirect correction on the outbound leg.

pub mod service;

pub use service::RelayProxy;
