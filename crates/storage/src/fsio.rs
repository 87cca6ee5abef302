// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file persistence helpers.
//!
//! Writers produce a uniquely-named temp sibling and rename it over the
//! target; the rename is the linearization point. Snapshot files keep
//! rotating backups so recovery loads either the current or a previous
//! version.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

const MAX_BAK_FILES: u32 = 3;

/// Write `bytes` to `path` atomically: temp sibling + rename.
///
/// Creates parent directories as needed. The temp name carries a random
/// token so concurrent writers never collide.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    fs::write(&tmp, bytes)?;
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Write `bytes` to `path` atomically, preserving the previous version as a
/// rotated `.bak`.
pub fn persist_with_backup(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if path.exists() {
        let bak = rotate_bak_path(path);
        if let Err(e) = fs::rename(path, &bak) {
            warn!(path = %path.display(), err = %e, "could not rotate backup");
        }
    }
    write_atomic(path, bytes)
}

/// Read `path`, falling back to the newest readable backup when the main
/// file is missing or unreadable. Returns `None` when nothing exists.
pub fn read_with_backup(path: &Path) -> Option<Vec<u8>> {
    if let Ok(bytes) = fs::read(path) {
        return Some(bytes);
    }
    for n in 1..=MAX_BAK_FILES {
        if let Ok(bytes) = fs::read(bak_path(path, n)) {
            warn!(path = %path.display(), generation = n, "loaded from backup");
            return Some(bytes);
        }
    }
    None
}

/// The main path followed by its backup generations, newest first.
/// Callers that need parse-level fallback walk these until one loads.
pub(crate) fn load_candidates(path: &Path) -> Vec<PathBuf> {
    let mut out = vec![path.to_path_buf()];
    out.extend((1..=MAX_BAK_FILES).map(|n| bak_path(path, n)));
    out
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    path.with_file_name(format!(".{}.{}.tmp", name, nanoid::nanoid!(8)))
}

fn bak_path(path: &Path, n: u32) -> PathBuf {
    if n == 1 {
        path.with_extension("bak")
    } else {
        path.with_extension(format!("bak.{n}"))
    }
}

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let oldest = bak_path(path, MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak_path(path, n);
        if src.exists() {
            let _ = fs::rename(&src, bak_path(path, n + 1));
        }
    }

    bak_path(path, 1)
}

#[cfg(test)]
#[path = "fsio_tests.rs"]
mod tests;
