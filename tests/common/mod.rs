use relaygate::{DomainMatcher, ProxyCodec, RedirectRewriter, RequestParts, RequestRewriter};
use std::sync::Arc;

pub const RELAY_HOST: &str = "relay.test";
pub const PREFIX: &str = "----";

pub fn codec() -> Arc<ProxyCodec> {
    Arc::new(ProxyCodec::new(RELAY_HOST, 443, PREFIX))
}

pub fn matcher() -> Arc<DomainMatcher> {
    Arc::new(DomainMatcher::new(relaygate::load_rules(None).unwrap()))
}

pub fn request_rewriter() -> RequestRewriter {
    RequestRewriter::new(codec(), matcher(), true)
}

pub fn redirect_rewriter() -> RedirectRewriter {
    RedirectRewriter::new(codec(), matcher())
}

pub fn https_request(host: &str, path: &str) -> RequestParts {
    RequestParts {
        scheme: "https".to_string(),
        host: host.to_string(),
        port: 443,
        path: path.to_string(),
    }
}
