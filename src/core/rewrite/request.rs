//! Inbound request rewriting.

use super::codec::{ProxyCodec, RELAY_SCHEME};
use super::{RequestParts, RewriteDecision};
use crate::security::allowlist::DomainMatcher;
use std::sync::Arc;

/// Rewrites inbound requests onto the relay.
///
/// Two checks run in order: relay-bound traffic is passed through (or
/// repaired when the path carries a doubled prefix), then the allow-list
/// gate decides whether the origin is eligible at all. Only after both
/// does the request get encoded and redirected.
#[derive(Debug, Clone)]
pub struct RequestRewriter {
    codec: Arc<ProxyCodec>,
    matcher: Arc<DomainMatcher>,
    gate_on_allowlist: bool,
}

impl RequestRewriter {
    /// Creates a new rewriter.
    ///
    /// `gate_on_allowlist` is the hardened default; disabling it restores
    /// the variant that proxies every non-relay request.
    #[must_use]
    pub fn new(
        codec: Arc<ProxyCodec>,
        matcher: Arc<DomainMatcher>,
        gate_on_allowlist: bool,
    ) -> Self {
        Self {
            codec,
            matcher,
            gate_on_allowlist,
        }
    }

    /// Decides what to do with one inbound request.
    #[must_use]
    pub fn rewrite(&self, request: &RequestParts) -> RewriteDecision {
        // Already relay-bound: never re-encode, only self-heal a path
        // that a previous pass through this filter doubled up.
        if self.codec.is_relay_host(&request.host) {
            if self.codec.prefix_count(&request.path) > 1 {
                return RewriteDecision::Repaired {
                    path: self.codec.repair(&request.path),
                };
            }
            return RewriteDecision::PassThrough;
        }

        if self.gate_on_allowlist && !self.matcher.allowed(&request.host) {
            return RewriteDecision::PassThrough;
        }

        RewriteDecision::Rewritten {
            scheme: RELAY_SCHEME.to_string(),
            host: self.codec.relay_host().to_string(),
            port: self.codec.relay_port(),
            path: self.codec.encode(request),
        }
    }
}
