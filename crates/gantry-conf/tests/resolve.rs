use std::path::{Path, PathBuf};

use gantry_conf::{absolute, is_canonical, mkdirs, Error};

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
fn relative_path_resolves_against_the_working_dir() {
    let dir = create_temp_dir("gantry_resolve_rel");
    std::fs::write(dir.join("x"), b"").unwrap();

    let mut buf = Vec::new();
    let got = absolute("x", as_str(&dir), &mut buf).unwrap();
    assert_eq!(got, format!("{}/x", as_str(&dir)));
    assert!(is_canonical(&got));

    rm_rf(&dir);
}

#[test]
fn dot_and_dotdot_collapse_without_touching_skipped_components() {
    let dir = create_temp_dir("gantry_resolve_collapse");
    std::fs::create_dir(dir.join("a")).unwrap();
    std::fs::write(dir.join("a").join("c"), b"").unwrap();

    // "b" is never created; only the collapsed result is checked on disk.
    let mut buf = Vec::new();
    let input = format!("{}/a/b/../c", as_str(&dir));
    let got = absolute(&input, "", &mut buf).unwrap();
    assert_eq!(got, format!("{}/a/c", as_str(&dir)));

    let input = format!("{}/a/./c", as_str(&dir));
    let got = absolute(&input, "", &mut buf).unwrap();
    assert_eq!(got, format!("{}/a/c", as_str(&dir)));

    rm_rf(&dir);
}

#[test]
fn dotdot_climbs_out_of_the_working_dir() {
    let dir = create_temp_dir("gantry_resolve_climb");
    std::fs::create_dir(dir.join("sub")).unwrap();
    std::fs::write(dir.join("sib"), b"").unwrap();

    let mut buf = Vec::new();
    let wd = dir.join("sub");
    let got = absolute("../sib", as_str(&wd), &mut buf).unwrap();
    assert_eq!(got, format!("{}/sib", as_str(&dir)));

    rm_rf(&dir);
}

#[test]
fn trailing_and_repeated_separators_are_tolerated() {
    let dir = create_temp_dir("gantry_resolve_seps");
    std::fs::write(dir.join("x"), b"").unwrap();

    let mut buf = Vec::new();
    let got = absolute("x/", as_str(&dir), &mut buf).unwrap();
    assert_eq!(got, format!("{}/x", as_str(&dir)));

    let input = format!("{}//x", as_str(&dir));
    let got = absolute(&input, "", &mut buf).unwrap();
    assert_eq!(got, format!("{}/x", as_str(&dir)));

    rm_rf(&dir);
}

#[test]
fn symlink_final_component_is_dereferenced() {
    let dir = create_temp_dir("gantry_resolve_link");
    std::fs::write(dir.join("real"), b"").unwrap();
    std::os::unix::fs::symlink("real", dir.join("rel_link")).unwrap();
    std::os::unix::fs::symlink(dir.join("real"), dir.join("abs_link")).unwrap();

    let mut buf = Vec::new();
    let want = format!("{}/real", as_str(&dir));

    let got = absolute("rel_link", as_str(&dir), &mut buf).unwrap();
    assert_eq!(got, want);

    let got = absolute("abs_link", as_str(&dir), &mut buf).unwrap();
    assert_eq!(got, want);

    rm_rf(&dir);
}

#[test]
fn chained_symlinks_resolve_through_directories() {
    let dir = create_temp_dir("gantry_resolve_chain");
    std::fs::create_dir(dir.join("d")).unwrap();
    std::fs::write(dir.join("d").join("target"), b"").unwrap();
    std::os::unix::fs::symlink("d/target", dir.join("hop1")).unwrap();
    std::os::unix::fs::symlink("hop1", dir.join("hop2")).unwrap();

    let mut buf = Vec::new();
    let got = absolute("hop2", as_str(&dir), &mut buf).unwrap();
    assert_eq!(got, format!("{}/d/target", as_str(&dir)));

    rm_rf(&dir);
}

#[test]
fn symlink_cycle_fails_instead_of_spinning() {
    let dir = create_temp_dir("gantry_resolve_cycle");
    std::os::unix::fs::symlink("b", dir.join("a")).unwrap();
    std::os::unix::fs::symlink("a", dir.join("b")).unwrap();

    let mut buf = Vec::new();
    assert!(matches!(
        absolute("a", as_str(&dir), &mut buf),
        Err(Error::LinkDepth { .. })
    ));

    rm_rf(&dir);
}

#[test]
fn dangling_symlink_reports_the_missing_target() {
    let dir = create_temp_dir("gantry_resolve_dangling");
    std::os::unix::fs::symlink("gone", dir.join("dang")).unwrap();

    let mut buf = Vec::new();
    match absolute("dang", as_str(&dir), &mut buf) {
        Err(Error::Access { path, .. }) => {
            assert_eq!(path, format!("{}/gone", as_str(&dir)));
        }
        other => panic!("expected an access error, got {other:?}"),
    }

    rm_rf(&dir);
}

#[test]
fn missing_entry_is_an_access_error() {
    let dir = create_temp_dir("gantry_resolve_missing");

    let mut buf = Vec::new();
    assert!(matches!(
        absolute("no_such_file", as_str(&dir), &mut buf),
        Err(Error::Access { .. })
    ));

    rm_rf(&dir);
}

#[test]
fn mkdirs_creates_nested_directories_and_converges() {
    let dir = create_temp_dir("gantry_mkdirs");
    let target = dir.join("m1").join("m2").join("m3");

    mkdirs(as_str(&target)).unwrap();
    assert!(target.is_dir());

    mkdirs(as_str(&target)).unwrap();
    assert!(target.is_dir());

    let deeper = target.join("m4");
    mkdirs(as_str(&deeper)).unwrap();
    assert!(deeper.is_dir());

    rm_rf(&dir);
}

#[test]
fn mkdirs_reports_the_component_that_failed() {
    let dir = create_temp_dir("gantry_mkdirs_blocked");
    std::fs::write(dir.join("f"), b"").unwrap();

    let target = dir.join("f").join("sub");
    match mkdirs(as_str(&target)) {
        Err(Error::CreateDir { path, .. }) => {
            assert_eq!(path, as_str(&target));
        }
        other => panic!("expected a create error, got {other:?}"),
    }

    rm_rf(&dir);
}
