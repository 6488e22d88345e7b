use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ProxyError, ProxyResult};

/// One tenant application's routing rule: a public domain proxied to
/// a local upstream, plus response headers and an access log derived
/// from the fragment name.
///
/// The `name` is the tenant's identity in the shared fragment
/// directory. Two tenants using the same name overwrite each other's
/// file - uniqueness is enforced by path collision only, so pick
/// names centrally (one per repository works well).
///
/// # Example
///
/// ```
/// use trellis::Fragment;
///
/// let fragment = Fragment::new("app1", "app1.example.com", 8080)
///     .security_headers()
///     .gzip();
///
/// assert_eq!(fragment.name, "app1");
/// assert_eq!(fragment.upstream(), "localhost:8080");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub name: String,
    pub domain: String,
    #[serde(default = "default_upstream_host")]
    pub upstream_host: String,
    #[serde(rename = "port")]
    pub upstream_port: u16,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub gzip: bool,
    #[serde(default)]
    pub extra_directives: Vec<String>,
}

fn default_upstream_host() -> String {
    "localhost".to_string()
}

impl Fragment {
    #[must_use]
    pub fn new(name: &str, domain: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            domain: domain.to_string(),
            upstream_host: default_upstream_host(),
            upstream_port: port,
            headers: IndexMap::new(),
            gzip: false,
            extra_directives: Vec::new(),
        }
    }

    /// Read a fragment definition from a YAML deploy descriptor.
    pub fn from_yaml_file(path: &Path) -> ProxyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    #[must_use]
    pub fn upstream_host(mut self, host: &str) -> Self {
        self.upstream_host = host.to_string();
        self
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Add the standard hardening header set.
    #[must_use]
    pub fn security_headers(self) -> Self {
        self.header("X-Content-Type-Options", "nosniff")
            .header("X-Frame-Options", "DENY")
            .header("X-XSS-Protection", "1; mode=block")
            .header("Referrer-Policy", "strict-origin-when-cross-origin")
    }

    #[must_use]
    pub const fn gzip(mut self) -> Self {
        self.gzip = true;
        self
    }

    #[must_use]
    pub fn directive(mut self, raw: &str) -> Self {
        self.extra_directives.push(raw.to_string());
        self
    }

    /// The `host:port` pair the fragment proxies to.
    #[must_use]
    pub fn upstream(&self) -> String {
        format!("{}:{}", self.upstream_host, self.upstream_port)
    }

    /// Check everything except the name, which [`validate_name`]
    /// covers on its own since callers also need it for bare strings.
    pub fn validate(&self) -> ProxyResult<()> {
        validate_name(&self.name)?;

        if self.domain.is_empty() {
            return Err(self.invalid("domain must not be empty"));
        }
        if self.domain.chars().any(char::is_whitespace) {
            return Err(self.invalid("domain must not contain whitespace"));
        }
        if self.upstream_port == 0 {
            return Err(self.invalid("upstream port must be between 1 and 65535"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> ProxyError {
        ProxyError::Fragment {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

/// Check a fragment name against the allowed pattern
/// `^[a-z0-9][a-z0-9-]*$`.
///
/// The name becomes a filename and an access-log stem, so anything
/// outside that set is rejected before touching the filesystem.
pub fn validate_name(name: &str) -> ProxyResult<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if !name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        Some("must start with a lowercase letter or digit")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        Some("may only contain lowercase letters, digits, and hyphens")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ProxyError::Naming {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
