use std::path::Path;

use crate::caddyfile;
use crate::error::{ProxyResult, io_at};
use crate::layout::Layout;
use crate::root::RootConfig;
use crate::snapshot::SnapshotStore;
use crate::store::write_atomic;

/// Initialize the root configuration and directory layout. Safe to
/// re-run: an existing non-empty root file is snapshotted before it
/// is overwritten, and directory creation is a no-op when the
/// directories are already there.
///
/// On a permission failure nothing is partially applied - directory
/// creation happens before the root write, and the root write itself
/// is atomic.
pub fn initialize(
    layout: &Layout,
    root: &RootConfig,
    snapshots: &SnapshotStore,
) -> ProxyResult<()> {
    for dir in [&layout.fragment_dir, &layout.log_dir, &layout.snapshot_dir] {
        std::fs::create_dir_all(dir).map_err(|e| io_at(dir, e))?;
        restrict(dir)?;
    }

    snapshots.take(&layout.root_file)?;
    write_atomic(&layout.root_file, &caddyfile::render_root(root, layout))?;

    tracing::info!(
        root = %layout.root_file.display(),
        import = %layout.import_pattern(),
        "root configuration initialized"
    );
    Ok(())
}

/// Keep the configuration and log directories out of reach of other
/// local users; tenants write through the store, not by hand.
#[cfg(unix)]
fn restrict(dir: &Path) -> ProxyResult<()> {
    use std::os::unix::fs::PermissionsExt;

    let perms = std::fs::Permissions::from_mode(0o750);
    std::fs::set_permissions(dir, perms).map_err(|e| io_at(dir, e))
}

#[cfg(not(unix))]
fn restrict(_dir: &Path) -> ProxyResult<()> {
    Ok(())
}
