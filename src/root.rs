use serde::{Deserialize, Serialize};

/// The proxy owner's global configuration: operator contact,
/// admin-endpoint binding, and nothing application-specific. Routing
/// lives exclusively in tenant fragments pulled in by the wildcard
/// import.
///
/// # Example
///
/// ```
/// use trellis::RootConfig;
///
/// let root = RootConfig::new("admin@example.com").admin("localhost:2019");
///
/// assert_eq!(root.email, "admin@example.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootConfig {
    pub email: String,
    pub admin: String,
    #[serde(default)]
    pub extra_globals: Vec<String>,
}

impl RootConfig {
    #[must_use]
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            admin: "localhost:2019".to_string(),
            extra_globals: Vec::new(),
        }
    }

    /// Bind the admin endpoint somewhere else, or pass `"off"` to
    /// disable it entirely.
    #[must_use]
    pub fn admin(mut self, bind: &str) -> Self {
        self.admin = bind.to_string();
        self
    }

    #[must_use]
    pub fn global(mut self, raw: &str) -> Self {
        self.extra_globals.push(raw.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let root = RootConfig::new("ops@example.com");

        assert_eq!(root.email, "ops@example.com");
        assert_eq!(root.admin, "localhost:2019");
        assert!(root.extra_globals.is_empty());
    }

    #[test]
    fn builder_chain() {
        let root = RootConfig::new("ops@example.com")
            .admin("off")
            .global("log_credentials")
            .global("grace_period 20s");

        assert_eq!(root.admin, "off");
        assert_eq!(
            root.extra_globals,
            vec!["log_credentials", "grace_period 20s"],
        );
    }

    #[test]
    fn admin_overrides() {
        let root = RootConfig::new("a@b.c").admin("first:1").admin("second:2");

        assert_eq!(root.admin, "second:2");
    }
}
