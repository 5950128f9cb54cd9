//! Encoding and decoding of relay-routed paths.
//!
//! The forward transform embeds an absolute URL into a request path behind
//! a fixed prefix marker; the inverse recovers the innermost original URL
//! even when the transform was accidentally applied more than once.

use super::RequestParts;

/// The relay is only ever reached over HTTPS.
pub const RELAY_SCHEME: &str = "https";

/// Bidirectional mapping between original URLs and proxied paths.
///
/// Holds the relay identity and prefix marker, which form the wire
/// contract shared by every process in a redirect chain.
#[derive(Debug, Clone)]
pub struct ProxyCodec {
    relay_host: String,
    relay_port: u16,
    prefix: String,
}

impl ProxyCodec {
    /// Creates a codec for the given relay identity and prefix marker.
    #[must_use]
    pub fn new(relay_host: impl Into<String>, relay_port: u16, prefix: impl Into<String>) -> Self {
        Self {
            relay_host: relay_host.into(),
            relay_port,
            prefix: prefix.into(),
        }
    }

    /// The relay hostname.
    #[must_use]
    pub fn relay_host(&self) -> &str {
        &self.relay_host
    }

    /// The relay port.
    #[must_use]
    pub const fn relay_port(&self) -> u16 {
        self.relay_port
    }

    /// The prefix marker.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether `host` is the relay identity itself.
    #[must_use]
    pub fn is_relay_host(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.relay_host)
    }

    /// Number of prefix-marker occurrences in `path`.
    #[must_use]
    pub fn prefix_count(&self, path: &str) -> usize {
        path.matches(&self.prefix).count()
    }

    /// `https://relay-host` with the port elided when it is the default.
    #[must_use]
    pub fn relay_origin(&self) -> String {
        if self.relay_port == 443 {
            format!("{RELAY_SCHEME}://{}", self.relay_host)
        } else {
            format!("{RELAY_SCHEME}://{}:{}", self.relay_host, self.relay_port)
        }
    }

    /// Canonical string form of an original URL, eliding conventional
    /// default ports (80 for http, 443 for https). The query is excluded
    /// by contract.
    #[must_use]
    pub fn canonical_url(&self, parts: &RequestParts) -> String {
        let default_port = matches!(
            (parts.scheme.as_str(), parts.port),
            ("http", 80) | ("https", 443)
        );
        if default_port {
            format!("{}://{}{}", parts.scheme, parts.host, parts.path)
        } else {
            format!("{}://{}:{}{}", parts.scheme, parts.host, parts.port, parts.path)
        }
    }

    /// Encodes an original URL into a proxied path: `/` + prefix +
    /// canonical URL.
    #[must_use]
    pub fn encode(&self, parts: &RequestParts) -> String {
        format!("/{}{}", self.prefix, self.canonical_url(parts))
    }

    /// Wraps an already-extracted target into a full relay location.
    #[must_use]
    pub fn wrap(&self, target: &str) -> String {
        format!("{}/{}{}", self.relay_origin(), self.prefix, target)
    }

    /// Recovers the innermost original URL from a proxied path or URL.
    ///
    /// Splits on every prefix occurrence and keeps the last piece, which
    /// is what makes repeated encoding reversible in a single call. When
    /// no prefix is present the input is returned unchanged (minus one
    /// leading slash).
    #[must_use]
    pub fn extract(&self, path_or_url: &str) -> String {
        let stripped = path_or_url.strip_prefix('/').unwrap_or(path_or_url);
        if !stripped.contains(&self.prefix) {
            return stripped.to_string();
        }
        let target = stripped
            .rsplit(&self.prefix)
            .next()
            .unwrap_or(stripped);
        target.strip_prefix('/').unwrap_or(target).to_string()
    }

    /// Rebuilds a double-prefixed path into the corrected single-prefix
    /// form, carrying any trailing query over unchanged.
    ///
    /// Stable under repeated application: repairing an already-correct
    /// path is a no-op.
    #[must_use]
    pub fn repair(&self, path: &str) -> String {
        let target = self.extract(path);
        let (url, query) = match target.split_once('?') {
            Some((url, query)) => (url.to_string(), Some(query.to_string())),
            None => (target, None),
        };

        let mut fixed = format!("/{}{}", self.prefix, url);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            fixed.push('?');
            fixed.push_str(&query);
        }
        fixed
    }
}
