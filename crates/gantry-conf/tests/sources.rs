use std::path::{Path, PathBuf};

use gantry_conf::PropSet;

fn create_temp_dir(prefix: &str) -> PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let base = std::env::temp_dir();
    let pid = std::process::id();
    for _ in 0..10_000 {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path = base.join(format!("{prefix}_{pid}_{n}"));
        if std::fs::create_dir(&path).is_ok() {
            return path;
        }
    }
    panic!("failed to create temp dir under {}", base.display());
}

fn rm_rf(path: &Path) {
    let _ = std::fs::remove_dir_all(path);
}

fn as_str(path: &Path) -> &str {
    path.to_str().expect("temp path is valid UTF-8")
}

#[test]
fn file_entries_load_into_the_set() {
    let dir = create_temp_dir("gantry_sources_load");
    let file = dir.join("runtime.properties");
    std::fs::write(
        &file,
        b"# defaults\ngantry.runtime.home = /opt/runtime\nname: demo\n",
    )
    .unwrap();

    let mut set = PropSet::new();
    let mut scratch = Vec::new();
    set.load_file(as_str(&file), &mut scratch).unwrap();

    assert_eq!(set.len(), 2);
    assert_eq!(set.get("gantry.runtime.home"), Some("/opt/runtime"));
    assert_eq!(set.get("name"), Some("demo"));

    rm_rf(&dir);
}

#[test]
fn missing_file_contributes_nothing() {
    let dir = create_temp_dir("gantry_sources_missing");

    let mut set = PropSet::new();
    let mut scratch = Vec::new();
    let path = dir.join("nowhere.properties");
    set.load_file(as_str(&path), &mut scratch).unwrap();
    assert!(set.is_empty());

    rm_rf(&dir);
}

#[test]
fn layered_sources_merge_with_later_files_overriding() {
    let dir = create_temp_dir("gantry_sources_layered");
    std::fs::write(dir.join("install.properties"), b"k = install\nbase = i\n").unwrap();
    std::fs::write(dir.join("user.properties"), b"k = user\nextra = u\n").unwrap();

    let mut scratch = Vec::new();
    let mut merged = PropSet::new();
    for name in ["install.properties", "user.properties", "build.properties"] {
        let mut layer = PropSet::new();
        layer.load_file(as_str(&dir.join(name)), &mut scratch).unwrap();
        merged.merge_from(layer);
    }

    assert_eq!(merged.get("k"), Some("user"));
    assert_eq!(merged.get("base"), Some("i"));
    assert_eq!(merged.get("extra"), Some("u"));

    rm_rf(&dir);
}

#[test]
fn scratch_buffer_is_reused_across_files() {
    let dir = create_temp_dir("gantry_sources_scratch");
    let big = "x".repeat(10_000);
    std::fs::write(dir.join("a.properties"), format!("a = {big}\n")).unwrap();
    std::fs::write(dir.join("b.properties"), b"b = small\n").unwrap();

    let mut set = PropSet::new();
    let mut scratch = Vec::new();
    set.load_file(as_str(&dir.join("a.properties")), &mut scratch).unwrap();
    let grown = scratch.capacity();
    set.load_file(as_str(&dir.join("b.properties")), &mut scratch).unwrap();

    assert!(scratch.capacity() >= grown);
    assert_eq!(set.get("a").map(str::len), Some(10_000));
    assert_eq!(set.get("b"), Some("small"));

    rm_rf(&dir);
}
