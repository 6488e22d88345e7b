use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tempfile::NamedTempFile;

use crate::caddyfile;
use crate::error::{ProxyError, ProxyResult, io_at};
use crate::fragment::{Fragment, validate_name};
use crate::layout::{FRAGMENT_EXT, Layout};

/// The explicit name-to-fragment mapping over the shared fragment
/// directory. The directory scan is only the persistence mechanism;
/// ownership and naming rules are enforced here.
///
/// Uniqueness is path collision: writing a fragment under a name
/// another tenant already uses silently replaces their file. There is
/// deliberately no reservation registry - coordinate names out of
/// band, one per application.
pub struct FragmentStore {
    layout: Layout,
}

impl FragmentStore {
    #[must_use]
    pub const fn new(layout: Layout) -> Self {
        Self { layout }
    }

    #[must_use]
    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Render and write `fragment` to its owned path, atomically: the
    /// content lands in a temp file in the same directory and is
    /// renamed over the target, so a concurrent reconciliation never
    /// reads a partial fragment. Re-deploying the same name
    /// overwrites in place - that is the update mechanism.
    pub fn write(&self, fragment: &Fragment) -> ProxyResult<PathBuf> {
        fragment.validate()?;

        if !self.layout.fragment_dir.is_dir() {
            return Err(ProxyError::PrerequisiteMissing(format!(
                "fragment directory {} does not exist (run init first)",
                self.layout.fragment_dir.display(),
            )));
        }

        let content = caddyfile::render_fragment(fragment, &self.layout);
        let path = self.layout.fragment_path(&fragment.name);
        write_atomic(&path, &content)?;

        tracing::info!(name = %fragment.name, path = %path.display(), "fragment written");
        Ok(path)
    }

    /// Exclude a fragment from the import without deleting it, by
    /// renaming it out of the wildcard pattern.
    pub fn disable(&self, name: &str) -> ProxyResult<PathBuf> {
        validate_name(name)?;
        let from = self.layout.fragment_path(name);
        let to = self.layout.disabled_path(name);
        rename_fragment(name, &from, &to)?;
        tracing::info!(name, "fragment disabled");
        Ok(to)
    }

    /// Bring a soft-disabled fragment back into the import.
    pub fn enable(&self, name: &str) -> ProxyResult<PathBuf> {
        validate_name(name)?;
        let from = self.layout.disabled_path(name);
        let to = self.layout.fragment_path(name);
        rename_fragment(name, &from, &to)?;
        tracing::info!(name, "fragment enabled");
        Ok(to)
    }

    /// Delete a fragment outright.
    pub fn remove(&self, name: &str) -> ProxyResult<()> {
        validate_name(name)?;
        let path = self.layout.fragment_path(name);
        std::fs::remove_file(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProxyError::FragmentNotFound(name.to_string())
            } else {
                io_at(&path, e)
            }
        })?;
        tracing::info!(name, "fragment removed");
        Ok(())
    }

    /// Every file the wildcard import will pick up, keyed by fragment
    /// name and sorted for deterministic validation order. Files with
    /// any other extension (including `.caddy.disabled`) are ignored;
    /// they never fail a reconciliation.
    pub fn active(&self) -> ProxyResult<IndexMap<String, PathBuf>> {
        Ok(self
            .scan(FRAGMENT_EXT)?
            .into_iter()
            .collect::<IndexMap<_, _>>())
    }

    /// Names of soft-disabled fragments.
    pub fn disabled(&self) -> ProxyResult<Vec<String>> {
        Ok(self
            .scan("disabled")?
            .into_iter()
            .map(|(name, _)| name.trim_end_matches(".caddy").to_string())
            .collect())
    }

    fn scan(&self, ext: &str) -> ProxyResult<Vec<(String, PathBuf)>> {
        let dir = &self.layout.fragment_dir;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(|e| io_at(dir, e))? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(ext) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                entries.push((stem.to_string(), path.clone()));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

/// Write `content` to `path` through a temp file in the same
/// directory plus an atomic rename. On any failure the temp file is
/// cleaned up on drop; the target is either absent, the old content,
/// or the new content - never a truncated mix.
pub(crate) fn write_atomic(path: &Path, content: &str) -> ProxyResult<()> {
    let dir = path.parent().ok_or_else(|| {
        ProxyError::Other(format!("no parent directory for {}", path.display()))
    })?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| io_at(dir, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| io_at(path, e))?;
    tmp.persist(path).map_err(|e| io_at(path, e.error))?;
    Ok(())
}

fn rename_fragment(name: &str, from: &Path, to: &Path) -> ProxyResult<()> {
    std::fs::rename(from, to).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProxyError::FragmentNotFound(name.to_string())
        } else {
            io_at(from, e)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> FragmentStore {
        let layout = Layout::under(dir);
        std::fs::create_dir_all(&layout.fragment_dir).expect("create fragment dir");
        FragmentStore::new(layout)
    }

    #[test]
    fn write_rejects_bad_name_before_touching_disk() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());

        let err = store
            .write(&Fragment::new("My App", "a.example.com", 8080))
            .unwrap_err();

        assert!(matches!(err, ProxyError::Naming { .. }));
        let entries: Vec<_> = std::fs::read_dir(&store.layout.fragment_dir)
            .expect("read dir")
            .collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn write_without_init_is_a_prerequisite_error() {
        let dir = tempdir().expect("tempdir");
        let store = FragmentStore::new(Layout::under(dir.path()));

        let err = store
            .write(&Fragment::new("app1", "a.example.com", 8080))
            .unwrap_err();

        assert!(matches!(err, ProxyError::PrerequisiteMissing(_)));
    }

    #[test]
    fn scan_ignores_foreign_files() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());
        let frag_dir = &store.layout.fragment_dir;

        std::fs::write(frag_dir.join("app1.caddy"), "app1.dev {\n}\n").expect("write");
        std::fs::write(frag_dir.join("app2.caddy.disabled"), "app2.dev {\n}\n").expect("write");
        std::fs::write(frag_dir.join("README.md"), "# notes\n").expect("write");

        let active = store.active().expect("scan");
        assert_eq!(active.len(), 1);
        assert!(active.contains_key("app1"));

        let disabled = store.disabled().expect("scan");
        assert_eq!(disabled, vec!["app2"]);
    }

    #[test]
    fn disable_and_enable_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());
        store
            .write(&Fragment::new("app1", "a.example.com", 8080))
            .expect("write");

        store.disable("app1").expect("disable");
        assert!(store.active().expect("scan").is_empty());
        assert_eq!(store.disabled().expect("scan"), vec!["app1"]);

        store.enable("app1").expect("enable");
        assert!(store.active().expect("scan").contains_key("app1"));
    }

    #[test]
    fn disable_missing_fragment() {
        let dir = tempdir().expect("tempdir");
        let store = store(dir.path());

        let err = store.disable("ghost").unwrap_err();
        assert!(matches!(err, ProxyError::FragmentNotFound(_)));
    }
}
