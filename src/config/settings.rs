//! Configuration settings.
//!
//! Defines the main `Config` struct and environment variable loading logic.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

fn get_env_u16_or(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the interception listener binds to.
    pub listen_addr: SocketAddr,
    /// Hostname of the fixed relay every proxied request is redirected to.
    ///
    /// Every process participating in the same redirect chain must agree on
    /// this value: a decode performed by one instance has to reverse an
    /// encode performed by another.
    pub relay_host: String,
    /// Relay port. The relay is always reached over HTTPS.
    pub relay_port: u16,
    /// Marker string delimiting the encoded original URL within a path.
    ///
    /// Part of the wire contract, same constraint as `relay_host`.
    pub proxy_prefix: String,
    /// Path to the allow-list file. Falls back to the built-in default
    /// rules when unset or missing.
    pub allowed_domains_file: Option<PathBuf>,
    /// Proxy every non-relay request instead of gating on the allow-list.
    pub proxy_all_hosts: bool,
    /// Scheme assumed for inbound requests that carry no absolute-form URI.
    pub default_scheme: String,
    /// Logging format: "json" or "pretty".
    pub log_format: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Panics
    ///
    /// Panics if `LISTEN_ADDR` or `RELAY_PORT` is present but does not parse.
    #[must_use]
    pub fn from_env() -> Arc<Self> {
        let listen_addr = get_env_or("LISTEN_ADDR", "127.0.0.1:8080")
            .parse()
            .expect("LISTEN_ADDR must be a valid socket address");
        let relay_host = get_env_or("RELAY_HOST", "worker-proxy.workers.dev");
        let relay_port = get_env_u16_or("RELAY_PORT", 443);
        let proxy_prefix = get_env_or("PROXY_PREFIX", "----");
        let allowed_domains_file = env::var("ALLOWED_DOMAINS_FILE")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Arc::new(Self {
            listen_addr,
            relay_host,
            relay_port,
            proxy_prefix,
            allowed_domains_file,
            proxy_all_hosts: get_env_bool("PROXY_ALL_HOSTS"),
            default_scheme: get_env_or("DEFAULT_SCHEME", "https"),
            log_format: get_env_or("LOG_FORMAT", "json"),
        })
    }
}
