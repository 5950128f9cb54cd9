//! URL rewriting core.
//!
//! Pure, per-exchange transformations between original absolute URLs and
//! their relay-routed representation. No component here touches the
//! transport; the proxy service applies the returned decisions to live
//! requests and responses.

pub mod codec;
pub mod redirect;
pub mod request;

pub use codec::{ProxyCodec, RELAY_SCHEME};
pub use redirect::RedirectRewriter;
pub use request::RequestRewriter;

/// Redirect status codes whose `Location` header is subject to correction.
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Whether a status code carries a rewritable `Location`.
#[must_use]
pub const fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// The components of one inbound request the filter reads and may rewrite.
///
/// `path` excludes the query string: the encoded representation is a
/// host+path identifier only, and the transport forwards the original
/// query unchanged alongside whatever path the decision produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParts {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

/// Outcome of the inbound rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RewriteDecision {
    /// Leave the request untouched.
    #[default]
    PassThrough,
    /// Redirect the request to the relay with the original URL encoded
    /// into the path.
    Rewritten {
        scheme: String,
        host: String,
        port: u16,
        path: String,
    },
    /// The request was already relay-bound but its path carried the
    /// prefix marker more than once; replace the path with the corrected
    /// single-prefix form.
    Repaired { path: String },
}

/// Outcome of the outbound `Location` correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectDecision {
    /// Leave the header untouched.
    PassThrough,
    /// Replace the header with a relay-wrapped location.
    Rewritten { location: String },
    /// The decoded target points at a disallowed domain: replace the
    /// header with the bare decoded URL, deliberately routing the client
    /// away from the relay.
    Deproxied { location: String },
}
