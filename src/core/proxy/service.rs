//! Proxy service logic.
//!
//! Implements the Pingora `ProxyHttp` adapter over the rewriting core:
//! the inbound leg consults the request rewriter and redirects eligible
//! traffic to the relay, the outbound leg corrects redirect locations on
//! relay-bound exchanges.

use crate::config::Config;
use crate::core::rewrite::{
    ProxyCodec, RedirectDecision, RedirectRewriter, RequestParts, RequestRewriter,
    RewriteDecision, is_redirect,
};
use crate::security::allowlist::DomainMatcher;
use async_trait::async_trait;
use http::Uri;
use pingora::Result;
use pingora::http::{RequestHeader, ResponseHeader};
use pingora::proxy::{ProxyHttp, Session};
use pingora::upstreams::peer::HttpPeer;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context for a single exchange.
#[derive(Default)]
pub struct RewriteCtx {
    /// The inbound decision, applied on the upstream request.
    pub decision: RewriteDecision,
    /// Whether the upstream request is addressed to the relay identity.
    /// Redirect correction only runs on relay-bound exchanges.
    pub relay_bound: bool,
    /// Final upstream path-and-query. Server-relative redirects recover
    /// their origin from this.
    pub upstream_path: String,
    pub peer_host: String,
    pub peer_port: u16,
    pub peer_tls: bool,
}

/// Main proxy service implementing `ProxyHttp`.
pub struct RelayProxy {
    config: Arc<Config>,
    codec: Arc<ProxyCodec>,
    request_rewriter: RequestRewriter,
    redirect_rewriter: RedirectRewriter,
}

impl RelayProxy {
    /// Creates a new `RelayProxy` service.
    #[must_use]
    pub fn new(config: Arc<Config>, matcher: Arc<DomainMatcher>) -> Self {
        let codec = Arc::new(ProxyCodec::new(
            config.relay_host.clone(),
            config.relay_port,
            config.proxy_prefix.clone(),
        ));
        let request_rewriter =
            RequestRewriter::new(codec.clone(), matcher.clone(), !config.proxy_all_hosts);
        let redirect_rewriter = RedirectRewriter::new(codec.clone(), matcher);

        Self {
            config,
            codec,
            request_rewriter,
            redirect_rewriter,
        }
    }

    /// Reconstructs the original-URL components from the request header.
    ///
    /// Absolute-form URIs win; otherwise the host (and optional port)
    /// come from the `Host` header and the scheme falls back to the
    /// configured default, since TLS terminates before this filter.
    fn request_parts(&self, header: &RequestHeader) -> Option<RequestParts> {
        let uri = &header.uri;

        let (host, explicit_port) = match uri.host() {
            Some(host) => (host.to_string(), uri.port_u16()),
            None => {
                let raw = header.headers.get(http::header::HOST)?.to_str().ok()?;
                split_host_port(raw)
            }
        };
        if host.is_empty() {
            return None;
        }

        let scheme = uri
            .scheme_str()
            .map_or_else(|| self.config.default_scheme.clone(), str::to_string);
        let port = explicit_port.unwrap_or(if scheme == "http" { 80 } else { 443 });

        Some(RequestParts {
            scheme,
            host,
            port,
            path: uri.path().to_string(),
        })
    }
}

/// Splits an optional `:port` suffix off a `Host` header value.
fn split_host_port(raw: &str) -> (String, Option<u16>) {
    if let Some((host, port)) = raw.rsplit_once(':')
        && !host.is_empty()
        && let Ok(port) = port.parse::<u16>()
    {
        return (host.to_string(), Some(port));
    }
    (raw.to_string(), None)
}

#[async_trait]
impl ProxyHttp for RelayProxy {
    type CTX = RewriteCtx;

    fn new_ctx(&self) -> Self::CTX {
        RewriteCtx::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let header = session.req_header();
        let Some(parts) = self.request_parts(header) else {
            warn!("Request without resolvable host, passing through");
            return Ok(false);
        };
        let query = header.uri.query().map(str::to_string);
        let original_pq = header
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), std::string::ToString::to_string);

        let decision = self.request_rewriter.rewrite(&parts);
        match &decision {
            RewriteDecision::PassThrough => {
                ctx.relay_bound = self.codec.is_relay_host(&parts.host);
                ctx.upstream_path = original_pq;
                ctx.peer_host = parts.host.clone();
                ctx.peer_port = parts.port;
                ctx.peer_tls = parts.scheme == "https";
                debug!(host = %parts.host, relay_bound = ctx.relay_bound, "Pass-through");
            }
            RewriteDecision::Repaired { path } => {
                ctx.relay_bound = true;
                ctx.upstream_path = match &query {
                    Some(q) => format!("{path}?{q}"),
                    None => path.clone(),
                };
                ctx.peer_host = parts.host.clone();
                ctx.peer_port = parts.port;
                ctx.peer_tls = parts.scheme == "https";
                info!(before = %original_pq, after = %ctx.upstream_path, "Fixed double prefix");
            }
            RewriteDecision::Rewritten {
                host, port, path, ..
            } => {
                ctx.relay_bound = true;
                ctx.upstream_path = match &query {
                    Some(q) => format!("{path}?{q}"),
                    None => path.clone(),
                };
                ctx.peer_host = host.clone();
                ctx.peer_port = *port;
                ctx.peer_tls = true;
                info!(
                    original = %self.codec.canonical_url(&parts),
                    proxied = %ctx.upstream_path,
                    "Proxying allowed domain"
                );
            }
        }
        ctx.decision = decision;

        Ok(false)
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        if ctx.peer_host.is_empty() {
            return Err(pingora::Error::new(pingora::ErrorType::Custom(
                "no upstream host resolved",
            )));
        }

        let sni = if ctx.peer_tls {
            ctx.peer_host.clone()
        } else {
            String::new()
        };
        let peer = Box::new(HttpPeer::new(
            (ctx.peer_host.as_str(), ctx.peer_port),
            ctx.peer_tls,
            sni,
        ));
        Ok(peer)
    }

    async fn upstream_request_filter(
        &self,
        _session: &mut Session,
        upstream_request: &mut RequestHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        match &ctx.decision {
            RewriteDecision::PassThrough => {}
            RewriteDecision::Repaired { .. } => {
                set_path(upstream_request, &ctx.upstream_path);
            }
            RewriteDecision::Rewritten { host, .. } => {
                set_path(upstream_request, &ctx.upstream_path);
                upstream_request.insert_header("Host", host.as_str())?;
            }
        }
        Ok(())
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        // Redirects on non-relay traffic are never touched.
        if !ctx.relay_bound {
            return Ok(());
        }
        let status = upstream_response.status.as_u16();
        if !is_redirect(status) {
            return Ok(());
        }
        let Some(location) = upstream_response
            .headers
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
        else {
            return Ok(());
        };

        match self
            .redirect_rewriter
            .rewrite(status, &location, &ctx.upstream_path)
        {
            RedirectDecision::PassThrough => {
                debug!(location = %location, status, "Redirect left untouched");
            }
            RedirectDecision::Rewritten { location: fixed } => {
                info!(before = %location, after = %fixed, status, "Corrected redirect");
                upstream_response.insert_header("Location", fixed)?;
            }
            RedirectDecision::Deproxied { location: bare } => {
                warn!(
                    before = %location,
                    after = %bare,
                    status,
                    "Redirect to disallowed domain, de-proxied"
                );
                upstream_response.insert_header("Location", bare)?;
            }
        }

        Ok(())
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status = session.response_written().map_or(0, |r| r.status.as_u16());
        debug!(
            host = %ctx.peer_host,
            status,
            relay_bound = ctx.relay_bound,
            "Request completed"
        );

        if status >= 400 {
            let path = session.req_header().uri.path();
            warn!(host = %ctx.peer_host, status, http_path = %path, "Request error");
        }
    }
}

/// Replaces a request's path-and-query, leaving it untouched when the
/// rewritten value does not form a valid URI.
fn set_path(upstream_request: &mut RequestHeader, path_and_query: &str) {
    match path_and_query.parse::<Uri>() {
        Ok(uri) => upstream_request.set_uri(uri),
        Err(e) => {
            warn!(path = %path_and_query, error = %e, "Rewritten path is not a valid URI");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingora::upstreams::peer::Peer;

    fn create_test_config() -> Arc<Config> {
        crate::test_utils::create_test_config()
    }

    fn create_proxy(config: Arc<Config>) -> RelayProxy {
        let matcher = Arc::new(
            DomainMatcher::new(crate::security::allowlist::load_rules(None).unwrap()),
        );
        RelayProxy::new(config, matcher)
    }

    fn mock_session() -> &'static mut Session {
        unsafe { &mut *(std::ptr::NonNull::<Session>::dangling().as_ptr()) }
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(
            split_host_port("download.jetbrains.com:8080"),
            ("download.jetbrains.com".to_string(), Some(8080))
        );
        assert_eq!(
            split_host_port("download.jetbrains.com"),
            ("download.jetbrains.com".to_string(), None)
        );
        assert_eq!(split_host_port("[::1]"), ("[::1]".to_string(), None));
    }

    #[test]
    fn test_request_parts_from_host_header() {
        let proxy = create_proxy(create_test_config());
        let mut req = RequestHeader::build("GET", b"/a/b?x=1", None).unwrap();
        req.insert_header("Host", "download.jetbrains.com").unwrap();

        let parts = proxy.request_parts(&req).unwrap();
        assert_eq!(parts.host, "download.jetbrains.com");
        assert_eq!(parts.port, 443);
        assert_eq!(parts.scheme, "https");
        assert_eq!(parts.path, "/a/b");
    }

    #[test]
    fn test_request_parts_absolute_form() {
        let proxy = create_proxy(create_test_config());
        let mut req = RequestHeader::build("GET", b"/x", None).unwrap();
        req.set_uri("http://download.jetbrains.com:8080/x".parse().unwrap());

        let parts = proxy.request_parts(&req).unwrap();
        assert_eq!(parts.scheme, "http");
        assert_eq!(parts.host, "download.jetbrains.com");
        assert_eq!(parts.port, 8080);
        assert_eq!(parts.path, "/x");
    }

    #[test]
    fn test_request_parts_missing_host() {
        let proxy = create_proxy(create_test_config());
        let req = RequestHeader::build("GET", b"/x", None).unwrap();
        assert!(proxy.request_parts(&req).is_none());
    }

    #[tokio::test]
    async fn test_upstream_peer_selection() {
        let proxy = create_proxy(create_test_config());
        let mut ctx = proxy.new_ctx();
        ctx.peer_host = "127.0.0.1".to_string();
        ctx.peer_port = 8081;
        ctx.peer_tls = false;

        let peer = proxy.upstream_peer(mock_session(), &mut ctx).await.unwrap();
        assert_eq!(peer.address().to_string(), "127.0.0.1:8081");
        assert!(peer.sni().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_peer_without_host_fails() {
        let proxy = create_proxy(create_test_config());
        let mut ctx = proxy.new_ctx();

        let res = proxy.upstream_peer(mock_session(), &mut ctx).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn test_upstream_request_filter_rewritten() {
        let proxy = create_proxy(create_test_config());
        let mut ctx = proxy.new_ctx();
        ctx.decision = RewriteDecision::Rewritten {
            scheme: "https".to_string(),
            host: "relay.test".to_string(),
            port: 443,
            path: "/----https://download.jetbrains.com/a".to_string(),
        };
        ctx.upstream_path = "/----https://download.jetbrains.com/a?x=1".to_string();

        let mut req = RequestHeader::build("GET", b"/a?x=1", None).unwrap();
        req.insert_header("Host", "download.jetbrains.com").unwrap();

        proxy
            .upstream_request_filter(mock_session(), &mut req, &mut ctx)
            .await
            .unwrap();

        assert_eq!(req.uri.path(), "/----https://download.jetbrains.com/a");
        assert_eq!(req.uri.query(), Some("x=1"));
        assert_eq!(
            req.headers.get("Host").unwrap().to_str().unwrap(),
            "relay.test"
        );
    }

    #[tokio::test]
    async fn test_upstream_request_filter_pass_through() {
        let proxy = create_proxy(create_test_config());
        let mut ctx = proxy.new_ctx();

        let mut req = RequestHeader::build("GET", b"/a", None).unwrap();
        req.insert_header("Host", "evil.com").unwrap();

        proxy
            .upstream_request_filter(mock_session(), &mut req, &mut ctx)
            .await
            .unwrap();

        assert_eq!(req.uri.path(), "/a");
        assert_eq!(req.headers.get("Host").unwrap().to_str().unwrap(), "evil.com");
    }

    #[tokio::test]
    async fn test_response_filter_rewrites_relay_redirect() {
        let proxy = create_proxy(create_test_config());
        let mut ctx = proxy.new_ctx();
        ctx.relay_bound = true;
        ctx.upstream_path = "/----https://download.jetbrains.com/page".to_string();

        let mut resp = ResponseHeader::build(302, None).unwrap();
        resp.insert_header("Location", "/other").unwrap();

        proxy
            .response_filter(mock_session(), &mut resp, &mut ctx)
            .await
            .unwrap();

        assert_eq!(
            resp.headers.get("Location").unwrap().to_str().unwrap(),
            "https://relay.test/----https://download.jetbrains.com/other"
        );
    }

    #[tokio::test]
    async fn test_response_filter_ignores_non_relay_exchange() {
        let proxy = create_proxy(create_test_config());
        let mut ctx = proxy.new_ctx();
        ctx.relay_bound = false;

        let mut resp = ResponseHeader::build(302, None).unwrap();
        resp.insert_header("Location", "https://download.jetbrains.com/f")
            .unwrap();

        proxy
            .response_filter(mock_session(), &mut resp, &mut ctx)
            .await
            .unwrap();

        assert_eq!(
            resp.headers.get("Location").unwrap().to_str().unwrap(),
            "https://download.jetbrains.com/f"
        );
    }

    #[tokio::test]
    async fn test_response_filter_ignores_non_redirect_status() {
        let proxy = create_proxy(create_test_config());
        let mut ctx = proxy.new_ctx();
        ctx.relay_bound = true;

        let mut resp = ResponseHeader::build(200, None).unwrap();
        resp.insert_header("Location", "/other").unwrap();

        proxy
            .response_filter(mock_session(), &mut resp, &mut ctx)
            .await
            .unwrap();

        assert_eq!(
            resp.headers.get("Location").unwrap().to_str().unwrap(),
            "/other"
        );
    }
}
