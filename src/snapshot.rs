use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ProxyError, ProxyResult, io_at};
use crate::store::write_atomic;

/// Versioned copies of the root configuration, replacing ad hoc
/// `cp Caddyfile Caddyfile.bak.$(date +%s)` backups. Snapshots are
/// named `<file>.<epoch>.<seq>.bak` and pruned to the most recent
/// `keep` entries.
pub struct SnapshotStore {
    dir: PathBuf,
    keep: usize,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            keep: 10,
        }
    }

    /// How many snapshots to retain. Older ones are removed on the
    /// next `take`.
    #[must_use]
    pub const fn keep(mut self, keep: usize) -> Self {
        self.keep = keep;
        self
    }

    /// Snapshot `source` if it exists and is non-empty. Returns the
    /// snapshot path, or `None` when there was nothing worth copying.
    pub fn take(&self, source: &Path) -> ProxyResult<Option<PathBuf>> {
        if !source.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(source).map_err(|e| io_at(source, e))?;
        if content.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| io_at(&self.dir, e))?;

        let stem = source
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("config");
        let epoch = epoch_secs();
        let mut seq = 0u64;
        let path = loop {
            let candidate = self.dir.join(format!("{stem}.{epoch}.{seq}.bak"));
            if !candidate.exists() {
                break candidate;
            }
            seq += 1;
        };

        write_atomic(&path, &content)?;
        self.prune()?;

        tracing::debug!(snapshot = %path.display(), "root configuration snapshotted");
        Ok(Some(path))
    }

    /// All snapshots, oldest first.
    pub fn list(&self) -> ProxyResult<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(|e| io_at(&self.dir, e))? {
            let path = entry?.path();
            if path.is_file() && sort_key(&path).is_some() {
                snapshots.push(path);
            }
        }
        snapshots.sort_by_key(|p| sort_key(p));
        Ok(snapshots)
    }

    /// Copy the most recent snapshot back over `dest`.
    pub fn restore_latest(&self, dest: &Path) -> ProxyResult<PathBuf> {
        let snapshot = self.list()?.pop().ok_or_else(|| {
            ProxyError::PrerequisiteMissing(format!(
                "no snapshots in {} to restore",
                self.dir.display(),
            ))
        })?;

        let content = std::fs::read_to_string(&snapshot).map_err(|e| io_at(&snapshot, e))?;
        write_atomic(dest, &content)?;

        tracing::info!(snapshot = %snapshot.display(), dest = %dest.display(), "snapshot restored");
        Ok(snapshot)
    }

    fn prune(&self) -> ProxyResult<()> {
        let snapshots = self.list()?;
        if snapshots.len() <= self.keep {
            return Ok(());
        }
        for stale in &snapshots[..snapshots.len() - self.keep] {
            std::fs::remove_file(stale).map_err(|e| io_at(stale, e))?;
        }
        Ok(())
    }
}

/// Seconds since the epoch; the snapshot and `applied_at` clock.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Parse `<stem>.<epoch>.<seq>.bak` into an ordering key. Returns
/// `None` for files that are not snapshots.
fn sort_key(path: &Path) -> Option<(u64, u64)> {
    let name = path.file_name()?.to_str()?;
    let rest = name.strip_suffix(".bak")?;
    let (rest, seq) = rest.rsplit_once('.')?;
    let (_, epoch) = rest.rsplit_once('.')?;
    Some((epoch.parse().ok()?, seq.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_key_parses_snapshot_names() {
        assert_eq!(
            sort_key(Path::new("/s/Caddyfile.1722950400.0.bak")),
            Some((1_722_950_400, 0)),
        );
        assert_eq!(
            sort_key(Path::new("/s/Caddyfile.1722950400.11.bak")),
            Some((1_722_950_400, 11)),
        );
        assert_eq!(sort_key(Path::new("/s/Caddyfile")), None);
        assert_eq!(sort_key(Path::new("/s/notes.bak")), None);
    }

    #[test]
    fn same_second_snapshots_order_by_sequence() {
        let a = sort_key(Path::new("/s/Caddyfile.100.2.bak")).expect("key");
        let b = sort_key(Path::new("/s/Caddyfile.100.10.bak")).expect("key");
        assert!(a < b);
    }
}
