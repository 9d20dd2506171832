//! Tree-walk helpers backing the move transform: the emptiness pre-check for
//! self-aliasing targets and the recursive move itself.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Fail if `dir` holds any entry at all, naming the first one found in
/// lexicographic order.
pub fn verify_dir_is_empty(dir: &Path) -> Result<()> {
    if let Some(entry) = WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .next()
    {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        return Err(Error::Validation(format!(
            "Cannot move into '{}' because it is not empty: found '{}'",
            dir.display(),
            entry.path().display()
        )));
    }
    Ok(())
}

/// Move `before` to `after`, preserving relative structure. `before` may be a
/// regular file, a symlink, or a directory tree.
///
/// The source is snapshotted up front and every path at or under `after` is
/// excluded, so entries relocated into a self-aliased target are never
/// re-visited. Any existing destination entry is a collision: the move stops
/// at the first one, with entries moved so far left in place.
pub fn move_entries(before: &Path, after: &Path) -> Result<()> {
    let meta = before
        .symlink_metadata()
        .map_err(|e| Error::io(before, e))?;
    if !meta.is_dir() {
        return move_single(before, after);
    }

    let mut files: Vec<PathBuf> = Vec::new();
    let mut dirs: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(before).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_error(before, e))?;
        let path = entry.path().to_path_buf();
        if path == after || path.starts_with(after) {
            continue;
        }
        if entry.file_type().is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }

    // Recreate the directory scaffolding first (parent-first order) so empty
    // directories survive the move.
    match fs::create_dir_all(after) {
        Ok(()) => {}
        // A file sitting where the target directory should go is a collision,
        // same as any other occupied destination entry.
        Err(e) if matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::NotADirectory) => {
            return Err(Error::Validation(format!(
                "Cannot move file to '{}' because it already exists",
                after.display()
            )));
        }
        Err(e) => return Err(Error::io(after, e)),
    }
    for dir in &dirs {
        let dest = after.join(relative_to(dir, before)?);
        if let Ok(m) = dest.symlink_metadata() {
            if !m.is_dir() {
                return Err(Error::Validation(format!(
                    "Cannot move file to '{}' because it already exists",
                    dest.display()
                )));
            }
        } else {
            fs::create_dir_all(&dest).map_err(|e| Error::io(&dest, e))?;
        }
    }

    for src in &files {
        let dest = after.join(relative_to(src, before)?);
        if dest.symlink_metadata().is_ok() {
            return Err(Error::Validation(format!(
                "Cannot move file to '{}' because it already exists",
                dest.display()
            )));
        }
        fs::rename(src, &dest).map_err(|e| Error::io(src, e))?;
    }

    // Drop the emptied source scaffolding, children before parents. Ancestors
    // of `after` must survive when the target lives inside the source.
    for dir in dirs.iter().rev() {
        if after.starts_with(dir) {
            continue;
        }
        match fs::remove_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(dir, e)),
        }
    }
    if !after.starts_with(before) {
        fs::remove_dir(before).map_err(|e| Error::io(before, e))?;
    }
    Ok(())
}

fn move_single(before: &Path, after: &Path) -> Result<()> {
    if after.symlink_metadata().is_ok() {
        return Err(Error::Validation(format!(
            "Cannot move file to '{}' because it already exists",
            after.display()
        )));
    }
    fs::rename(before, after).map_err(|e| Error::io(before, e))
}

fn relative_to<'a>(path: &'a Path, root: &Path) -> Result<&'a Path> {
    path.strip_prefix(root).map_err(|_| {
        Error::Validation(format!(
            "'{}' is not under '{}'",
            path.display(),
            root.display()
        ))
    })
}

fn walk_error(root: &Path, e: walkdir::Error) -> Error {
    let path = e
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    Error::io(path, e.into())
}
