pub mod caddy;

use std::path::Path;

use crate::error::ProxyResult;

/// The seam to the serving process and its service manager: validate
/// a merged configuration, and ask the running service to swap to it.
pub trait ServiceManager: Send + Sync {
    /// Check that whatever the adapter depends on is available
    /// before the first real operation.
    fn check_prerequisites(&self) -> ProxyResult<()> {
        Ok(())
    }

    /// Validate the merged configuration rooted at `root` without
    /// applying it.
    ///
    /// Rejections come back as `ProxyError::Validation` carrying the
    /// validator's diagnostics; a hung validator surfaces as
    /// `ProxyError::Timeout`.
    fn check(&self, root: &Path) -> ProxyResult<()>;

    /// Ask the running service to swap to the configuration on disk.
    ///
    /// Implementations must be transactional from the caller's point
    /// of view: on failure the previously-active configuration keeps
    /// serving.
    fn reload(&self) -> ProxyResult<()>;
}
