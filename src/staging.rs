//! Idempotent filesystem primitives for publishing build outputs.
//!
//! Install directories are shared between tasks that may run at the same
//! time, so every helper here is safe to repeat and safe to race:
//! - optional deletes succeed whether or not the target exists
//! - [`copy_if_better`] writes through a temporary file in the destination
//!   directory and renames it into place, so a reader sees either the old
//!   file or the new one
//! - [`swap_with_backup`] only ever patches a file once

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{Error, IoContext, Result};
use crate::process::Encoding;

/// Delete a directory tree. Returns whether anything was deleted.
pub fn delete_directory_optional(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("deleted directory {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Delete a file. Returns whether anything was deleted.
pub fn delete_file_optional(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("deleted file {}", path.display());
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Whether `dst` should be replaced by `src`: it is missing, has a different
/// size, or is older.
pub fn is_better(src: &Path, dst: &Path) -> Result<bool> {
    let src_meta = fs::metadata(src).at(src)?;
    let dst_meta = match fs::metadata(dst) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(Error::io(dst, e)),
    };

    if src_meta.len() != dst_meta.len() {
        return Ok(true);
    }

    let src_time = src_meta.modified().at(src)?;
    let dst_time = dst_meta.modified().at(dst)?;
    Ok(dst_time < src_time)
}

/// Copy `src` into `dst_dir` unless the copy there is already up to date.
///
/// Creates `dst_dir` if needed. Returns whether a copy was made.
pub fn copy_if_better(src: &Path, dst_dir: &Path) -> Result<bool> {
    let file_name = src
        .file_name()
        .ok_or_else(|| Error::empty(format!("file name of '{}'", src.display())))?;
    let dst = dst_dir.join(file_name);

    if !is_better(src, &dst)? {
        debug!("{} is up to date", dst.display());
        return Ok(false);
    }

    fs::create_dir_all(dst_dir).at(dst_dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".depsmith-")
        .tempfile_in(dst_dir)
        .at(dst_dir)?;
    let mut reader = fs::File::open(src).at(src)?;
    std::io::copy(&mut reader, staged.as_file_mut()).at(src)?;
    staged.as_file_mut().flush().at(staged.path().to_path_buf())?;
    // staged files start out owner-only
    let permissions = reader.metadata().at(src)?.permissions();
    staged
        .as_file()
        .set_permissions(permissions)
        .at(staged.path().to_path_buf())?;
    staged
        .persist(&dst)
        .map_err(|e| Error::io(dst.clone(), e.error))?;

    debug!("copied {} to {}", src.display(), dst_dir.display());
    Ok(true)
}

/// [`copy_if_better`] for every file under `src_dir`, keeping relative
/// paths. Returns how many files were copied.
pub fn copy_tree_if_better(src_dir: &Path, dst_dir: &Path) -> Result<usize> {
    let mut copied = 0;

    for entry in WalkDir::new(src_dir) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src_dir.to_path_buf());
            Error::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .unwrap_or(entry.path());
        let target_dir = match rel.parent() {
            Some(parent) => dst_dir.join(parent),
            None => dst_dir.to_path_buf(),
        };

        if copy_if_better(entry.path(), &target_dir)? {
            copied += 1;
        }
    }

    Ok(copied)
}

/// Replace `original` with `replacement`, keeping the pristine file as
/// `backup`.
///
/// Does nothing if `backup` already exists, so a file is only ever patched
/// once. `original` stays readable throughout: the backup is made as a hard
/// link (or copy) first, then `replacement` is renamed over `original`.
/// Returns whether the swap happened.
pub fn swap_with_backup(original: &Path, replacement: &Path, backup: &Path) -> Result<bool> {
    if backup.exists() {
        debug!("{} exists, not swapping {}", backup.display(), original.display());
        return Ok(false);
    }

    if !replacement.exists() {
        return Err(Error::io(
            replacement,
            std::io::Error::new(ErrorKind::NotFound, "replacement file is missing"),
        ));
    }

    if fs::hard_link(original, backup).is_err() {
        fs::copy(original, backup).at(original)?;
    }

    if let Err(e) = fs::rename(replacement, original) {
        // a stale backup would mark the file as patched
        delete_file_optional(backup)?;
        return Err(Error::io(replacement, e));
    }

    debug!(
        "swapped {} into {}, backup at {}",
        replacement.display(),
        original.display(),
        backup.display()
    );
    Ok(true)
}

/// Read a whole file as text in `encoding`.
pub fn read_text_file(path: &Path, encoding: Encoding) -> Result<String> {
    let bytes = fs::read(path).at(path)?;
    Ok(encoding.decode(&bytes))
}

/// Write text in `encoding`, failing if a character cannot be represented.
pub fn write_text_file(path: &Path, encoding: Encoding, text: &str) -> Result<()> {
    let bytes = encoding.encode(text).ok_or_else(|| Error::Encoding {
        path: path.to_path_buf(),
        encoding: encoding.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).at(parent)?;
        }
    }
    fs::write(path, bytes).at(path)
}

/// `path` with `suffix` appended to its full file name, e.g. `x.py` -> `x.py.bak`.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
