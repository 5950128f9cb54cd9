//! Test utilities and shared configuration.
//!
//! This module provides common helpers for unit and integration tests,
//! reducing duplication across the codebase.

#[cfg(any(test, feature = "testing"))]
use crate::config::Config;
#[cfg(any(test, feature = "testing"))]
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
#[cfg(any(test, feature = "testing"))]
use std::sync::Arc;

/// Creates a standard configuration for testing purposes.
///
/// Uses `relay.test` as the relay identity and the built-in default
/// allow-list rules.
#[cfg(any(test, feature = "testing"))]
#[must_use]
pub fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
        relay_host: "relay.test".to_string(),
        relay_port: 443,
        proxy_prefix: "----".to_string(),
        allowed_domains_file: None,
        proxy_all_hosts: false,
        default_scheme: "https".to_string(),
        log_format: "pretty".to_string(),
    })
}
