//! Outbound redirect correction.
//!
//! Classifies a redirect `Location` into one of four shapes and produces
//! the corrected value so that multi-hop redirect chains keep resolving
//! through the relay instead of diverging after repeated passes.

use super::codec::ProxyCodec;
use super::{RedirectDecision, is_redirect};
use crate::security::allowlist::DomainMatcher;
use std::sync::Arc;
use url::Url;

/// Rewrites `Location` headers on relay-bound exchanges.
///
/// Only applies to redirect statuses; the caller is responsible for
/// invoking it solely when the exchange's request host was the relay
/// identity. `request_path` is the (possibly rewritten) path of the
/// request that produced the response, needed to recover the origin for
/// server-relative redirects.
#[derive(Debug, Clone)]
pub struct RedirectRewriter {
    codec: Arc<ProxyCodec>,
    matcher: Arc<DomainMatcher>,
}

impl RedirectRewriter {
    /// Creates a new rewriter.
    #[must_use]
    pub fn new(codec: Arc<ProxyCodec>, matcher: Arc<DomainMatcher>) -> Self {
        Self { codec, matcher }
    }

    /// Decides what to do with one redirect `Location`.
    #[must_use]
    pub fn rewrite(&self, status: u16, location: &str, request_path: &str) -> RedirectDecision {
        if !is_redirect(status) {
            return RedirectDecision::PassThrough;
        }

        let marker = format!("/{}", self.codec.prefix());
        if location.starts_with(&marker) {
            self.rewrite_prefixed(location)
        } else if location.starts_with("http://") || location.starts_with("https://") {
            self.rewrite_absolute(location)
        } else if location.starts_with('/') {
            self.rewrite_relative(location, request_path)
        } else {
            // Opaque shapes (protocol-relative, fragments, garbage) are
            // left alone.
            RedirectDecision::PassThrough
        }
    }

    /// Shape 1: already-proxied relative location (`/` + prefix + URL).
    fn rewrite_prefixed(&self, location: &str) -> RedirectDecision {
        let mut target = self.codec.extract(location);

        // Extraction stops at the prefix split; if the raw location
        // carried a query the decoded target lost, reattach it.
        if location.contains('?')
            && !target.contains('?')
            && let Some((_, query)) = location.split_once('?')
        {
            target = format!("{target}?{query}");
        }

        if target.starts_with("http") {
            let Ok(url) = Url::parse(&target) else {
                return RedirectDecision::PassThrough;
            };
            if let Some(host) = url.host_str()
                && !self.matcher.allowed(host)
            {
                // Redirect toward a disallowed destination: hand the
                // client the bare decoded URL instead of relay-wrapping.
                return RedirectDecision::Deproxied { location: target };
            }
        }

        RedirectDecision::Rewritten {
            location: self.codec.wrap(&target),
        }
    }

    /// Shape 2: absolute URL.
    fn rewrite_absolute(&self, location: &str) -> RedirectDecision {
        let Ok(url) = Url::parse(location) else {
            return RedirectDecision::PassThrough;
        };
        let Some(host) = url.host_str() else {
            return RedirectDecision::PassThrough;
        };
        if !self.matcher.allowed(host) {
            return RedirectDecision::PassThrough;
        }

        // An absolute location that already carries the prefix marker is
        // decoded first, otherwise doubling would creep in.
        let target = if location.contains(self.codec.prefix()) {
            self.codec.extract(location)
        } else {
            location.to_string()
        };

        RedirectDecision::Rewritten {
            location: self.codec.wrap(&target),
        }
    }

    /// Shape 3: server-relative location with no prefix. The origin that
    /// produced the redirect has to be recovered from the current
    /// request's encoded path.
    fn rewrite_relative(&self, location: &str, request_path: &str) -> RedirectDecision {
        if !request_path.contains(self.codec.prefix()) {
            return RedirectDecision::PassThrough;
        }

        let original = self.codec.extract(request_path);
        if !original.starts_with("http") {
            return RedirectDecision::PassThrough;
        }
        let Ok(url) = Url::parse(&original) else {
            return RedirectDecision::PassThrough;
        };
        let Some(host) = url.host_str() else {
            return RedirectDecision::PassThrough;
        };
        if !self.matcher.allowed(host) {
            return RedirectDecision::PassThrough;
        }

        let origin = match url.port() {
            Some(port) => format!("{}://{host}:{port}", url.scheme()),
            None => format!("{}://{host}", url.scheme()),
        };

        RedirectDecision::Rewritten {
            location: self.codec.wrap(&format!("{origin}{location}")),
        }
    }
}
