use std::fs;
use std::path::Path;
use std::thread;

use tempfile::tempdir;
use trellis::{Fragment, FragmentStore, Layout, ProxyError};

fn ready_store(base: &Path) -> FragmentStore {
    let layout = Layout::under(base);
    fs::create_dir_all(&layout.fragment_dir).expect("create fragment dir");
    FragmentStore::new(layout)
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn write_creates_the_named_fragment() {
    let dir = tempdir().expect("tempdir");
    let store = ready_store(dir.path());

    let path = store
        .write(&Fragment::new("app1", "app1.example.com", 8080))
        .expect("write");

    assert!(path.ends_with("sites.d/app1.caddy"));
    let content = fs::read_to_string(&path).expect("read fragment");
    assert!(content.contains("app1.example.com {"));
    assert!(content.contains("reverse_proxy localhost:8080"));
    assert!(content.contains("log/app1.log"));
}

#[test]
fn invalid_names_fail_without_side_effects() {
    let dir = tempdir().expect("tempdir");
    let store = ready_store(dir.path());

    for name in ["A", "my app", "-leading"] {
        let err = store
            .write(&Fragment::new(name, "a.example.com", 8080))
            .unwrap_err();
        assert!(
            matches!(err, ProxyError::Naming { .. }),
            "expected naming error for '{name}'",
        );
    }

    assert!(dir_entries(&store.layout().fragment_dir).is_empty());
}

#[test]
fn overwrite_is_idempotent_and_leaves_no_temp_files() {
    let dir = tempdir().expect("tempdir");
    let store = ready_store(dir.path());

    store
        .write(&Fragment::new("app1", "app1.example.com", 8080))
        .expect("first write");
    store
        .write(&Fragment::new("app1", "app1.example.com", 9090))
        .expect("second write");

    let entries = dir_entries(&store.layout().fragment_dir);
    assert_eq!(entries, vec!["app1.caddy"]);

    let content =
        fs::read_to_string(store.layout().fragment_path("app1")).expect("read fragment");
    assert!(content.contains("reverse_proxy localhost:9090"));
    assert!(!content.contains("8080"));
}

#[test]
fn writing_one_fragment_leaves_others_alone() {
    let dir = tempdir().expect("tempdir");
    let store = ready_store(dir.path());

    store
        .write(&Fragment::new("app1", "app1.example.com", 8080))
        .expect("write app1");
    let before = fs::read_to_string(store.layout().fragment_path("app1")).expect("read");

    store
        .write(&Fragment::new("app2", "app2.example.com", 9090))
        .expect("write app2");
    let after = fs::read_to_string(store.layout().fragment_path("app1")).expect("read");

    assert_eq!(before, after);
}

#[test]
fn writer_never_touches_the_root_file() {
    let dir = tempdir().expect("tempdir");
    let store = ready_store(dir.path());
    let root = &store.layout().root_file;
    fs::write(root, "# owner-managed\n").expect("seed root");

    store
        .write(&Fragment::new("app1", "app1.example.com", 8080))
        .expect("write");

    assert_eq!(
        fs::read_to_string(root).expect("read root"),
        "# owner-managed\n",
    );
}

// A reader racing the writer must only ever see a complete fragment:
// the write goes to a temp file and lands via rename.
#[test]
fn concurrent_reads_never_observe_a_partial_fragment() {
    let dir = tempdir().expect("tempdir");
    let store = ready_store(dir.path());
    let path = store.layout().fragment_path("app1");

    store
        .write(&Fragment::new("app1", "app1.example.com", 8080))
        .expect("initial write");

    let layout = store.layout().clone();
    let writer = thread::spawn(move || {
        let store = FragmentStore::new(layout);
        for i in 0..100u16 {
            let fragment = Fragment::new("app1", "app1.example.com", 8000 + i)
                .security_headers()
                .header("X-Deploy-Round", &i.to_string());
            store.write(&fragment).expect("rewrite");
        }
    });

    for _ in 0..300 {
        let problems = trellis::validate::check_file(&path).expect("fragment readable");
        assert!(problems.is_empty(), "saw a partial fragment: {problems:?}");
    }

    writer.join().expect("writer thread");
}
