//! URL parsing and formatting for WebSocket endpoints.
//!
//! Supports the `scheme://host:port/path?query#fragment` shape. Every
//! delimiter is optional; missing ports are defaulted by scheme.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Default port for a scheme, if the scheme has one.
fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

/// A parsed URL.
///
/// Immutable value type. The invariant `Url::parse(&u.to_string()) == u`
/// holds for every `Url` produced by [`Url::parse`], modulo default-port
/// elision when formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    /// URL scheme (may be empty when the input had no `://`).
    pub scheme: String,
    /// Host name or address.
    pub host: String,
    /// Port, if given or derivable from the scheme.
    pub port: Option<String>,
    /// Path, always `/`-prefixed.
    pub path: String,
    /// Query parameters. Pair order is not significant.
    pub query: HashMap<String, String>,
    /// Fragment (without the leading `#`).
    pub fragment: String,
}

impl Url {
    /// Parse a URL from its string form.
    ///
    /// The scheme (`scheme://`), port (`:port`), path (`/path`), query
    /// (`?k=v&...`) and fragment (`#frag`) parts may each be absent. A
    /// missing port is defaulted to 80 for `http`/`ws` and 443 for
    /// `https`/`wss`; other schemes leave it absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if a query pair lacks `=`.
    pub fn parse(raw: &str) -> Result<Self> {
        let (scheme, rest) = match raw.split_once("://") {
            Some((scheme, rest)) => (scheme.to_string(), rest),
            None => (String::new(), raw),
        };

        let (rest, fragment) = match rest.split_once('#') {
            Some((rest, fragment)) => (rest, fragment.to_string()),
            None => (rest, String::new()),
        };

        let (rest, query_str) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, format!("/{path}")),
            None => (rest, "/".to_string()),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host.to_string(), Some(port.to_string())),
            None => (authority.to_string(), None),
        };

        let port = port.or_else(|| default_port(&scheme).map(|p| p.to_string()));

        let mut query = HashMap::new();
        if let Some(query_str) = query_str {
            for pair in query_str.split('&').filter(|p| !p.is_empty()) {
                let (key, val) = pair
                    .split_once('=')
                    .ok_or_else(|| Error::InvalidUrl(format!("query pair without '=': {pair}")))?;
                query.insert(key.to_string(), val.to_string());
            }
        }

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query,
            fragment,
        })
    }

    /// Host and numeric port, for connecting a stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPort`] if the port is absent or non-numeric.
    pub fn hostpair(&self) -> Result<(String, u16)> {
        let port = self
            .port
            .as_deref()
            .ok_or_else(|| Error::InvalidPort("(none)".to_string()))?;
        let port: u16 = port
            .parse()
            .map_err(|_| Error::InvalidPort(port.to_string()))?;
        Ok((self.host.clone(), port))
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}://", self.scheme)?;
        }
        write!(f, "{}", self.host)?;

        // Elide the port when it equals the scheme default.
        if let Some(ref port) = self.port {
            let is_default = default_port(&self.scheme)
                .is_some_and(|d| port.parse::<u16>() == Ok(d));
            if !is_default {
                write!(f, ":{port}")?;
            }
        }

        write!(f, "{}", self.path)?;

        if !self.query.is_empty() {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(key, val)| format!("{key}={val}"))
                .collect();
            write!(f, "?{}", pairs.join("&"))?;
        }

        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }
}
