// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn write_atomic_creates_parents_and_leaves_no_temp() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("a/b/c.json");

    write_atomic(&path, b"{}").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"{}");
    let siblings: Vec<_> = fs::read_dir(path.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(siblings.len(), 1, "temp file left behind: {:?}", siblings);
}

#[test]
fn persist_with_backup_preserves_previous_version() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    persist_with_backup(&path, b"v1").unwrap();
    persist_with_backup(&path, b"v2").unwrap();

    assert_eq!(fs::read(&path).unwrap(), b"v2");
    assert_eq!(fs::read(path.with_extension("bak")).unwrap(), b"v1");
}

#[test]
fn backups_rotate_and_cap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    for version in ["v1", "v2", "v3", "v4", "v5"] {
        persist_with_backup(&path, version.as_bytes()).unwrap();
    }

    assert_eq!(fs::read(&path).unwrap(), b"v5");
    assert_eq!(fs::read(path.with_extension("bak")).unwrap(), b"v4");
    assert_eq!(fs::read(path.with_extension("bak.2")).unwrap(), b"v3");
    assert_eq!(fs::read(path.with_extension("bak.3")).unwrap(), b"v2");
    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn read_with_backup_falls_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    assert!(read_with_backup(&path).is_none());

    persist_with_backup(&path, b"v1").unwrap();
    persist_with_backup(&path, b"v2").unwrap();
    fs::remove_file(&path).unwrap();

    assert_eq!(read_with_backup(&path).unwrap(), b"v1");
}
