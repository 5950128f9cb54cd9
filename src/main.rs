//! `relaygate` - URL rewriting filter for relay-routed HTTP(S) traffic.
//!
//! SPDX-License-Identifier: AGPL-3.0-only
//!
//! Initializes the application runtime, loads configuration and the domain
//! allow-list, sets up logging, and launches the proxy service.

use relaygate::{Config, DomainMatcher, RelayProxy, load_rules};

use pingora::proxy::http_proxy_service;
use pingora::server::Server;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    dotenvy::dotenv().ok();

    let (non_blocking, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(non_blocking);

    if log_format.eq_ignore_ascii_case("pretty") {
        subscriber.init();
    } else {
        subscriber.json().init();
    }

    let config = Config::from_env();
    let rules = load_rules(config.allowed_domains_file.as_deref())
        .expect("Failed to load allow-list rules");
    let matcher = Arc::new(DomainMatcher::new(rules));

    info!(
        listen_addr = %config.listen_addr,
        relay_host = %config.relay_host,
        relay_port = config.relay_port,
        prefix = %config.proxy_prefix,
        rules = matcher.len(),
        proxy_all_hosts = config.proxy_all_hosts,
        "Filter initialized"
    );

    let mut server = Server::new(None).expect("Failed to create Pingora server");
    server.bootstrap();

    let proxy = RelayProxy::new(config.clone(), matcher);

    let mut proxy_service = http_proxy_service(&server.configuration, proxy);
    proxy_service.add_tcp(&config.listen_addr.to_string());
    server.add_service(proxy_service);

    server.run_forever();
}
