use std::path::{Path, PathBuf};

/// File extension that the root configuration's wildcard import picks up.
pub const FRAGMENT_EXT: &str = "caddy";

/// Suffix appended to a fragment file to exclude it from the import
/// without deleting it.
pub const DISABLED_SUFFIX: &str = "disabled";

/// Filesystem layout shared by the proxy owner and every tenant.
///
/// The defaults match a stock Caddy install on a Debian/Ubuntu VPS;
/// every path is overridable so tests (and unusual hosts) can point
/// the whole protocol at a scratch directory.
///
/// # Example
///
/// ```
/// use trellis::Layout;
///
/// let layout = Layout::default();
/// assert_eq!(
///     layout.fragment_path("app1").to_str(),
///     Some("/etc/caddy/sites.d/app1.caddy"),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    pub root_file: PathBuf,
    pub fragment_dir: PathBuf,
    pub log_dir: PathBuf,
    pub snapshot_dir: PathBuf,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            root_file: PathBuf::from("/etc/caddy/Caddyfile"),
            fragment_dir: PathBuf::from("/etc/caddy/sites.d"),
            log_dir: PathBuf::from("/var/log/caddy"),
            snapshot_dir: PathBuf::from("/etc/caddy/snapshots"),
        }
    }
}

impl Layout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Root every path under `base`, keeping the relative shape.
    /// Intended for tests and containerized hosts.
    #[must_use]
    pub fn under(base: &Path) -> Self {
        Self {
            root_file: base.join("Caddyfile"),
            fragment_dir: base.join("sites.d"),
            log_dir: base.join("log"),
            snapshot_dir: base.join("snapshots"),
        }
    }

    #[must_use]
    pub fn root_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_file = path.into();
        self
    }

    #[must_use]
    pub fn fragment_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.fragment_dir = path.into();
        self
    }

    #[must_use]
    pub fn log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = path.into();
        self
    }

    #[must_use]
    pub fn snapshot_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = path.into();
        self
    }

    /// Path of the active fragment owned by `name`.
    #[must_use]
    pub fn fragment_path(&self, name: &str) -> PathBuf {
        self.fragment_dir.join(format!("{name}.{FRAGMENT_EXT}"))
    }

    /// Path of the soft-disabled variant of `name`'s fragment.
    #[must_use]
    pub fn disabled_path(&self, name: &str) -> PathBuf {
        self.fragment_dir
            .join(format!("{name}.{FRAGMENT_EXT}.{DISABLED_SUFFIX}"))
    }

    /// Access log path derived from the fragment name.
    #[must_use]
    pub fn access_log_path(&self, name: &str) -> PathBuf {
        self.log_dir.join(format!("{name}.log"))
    }

    /// Wildcard import pattern the root configuration carries.
    #[must_use]
    pub fn import_pattern(&self) -> String {
        format!("{}/*.{FRAGMENT_EXT}", self.fragment_dir.display())
    }
}
