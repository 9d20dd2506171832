//! Tree enumeration and file access shared by patch generation, apply, and
//! verification. Relative paths always use forward slashes so artifacts are
//! independent of host path-separator conventions.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use walkdir::WalkDir;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub relative_path: String,
    pub kind: EntryKind,
    pub full_path: PathBuf,
    /// File size in bytes (0 for directories and symlinks).
    pub size: u64,
    /// Unix permission bits; 0 on hosts without a mode concept.
    pub mode: u32,
}

/// Walk a directory tree and collect all entries, sorted by relative path.
/// Symlinks are never followed.
pub fn walk_tree(root: &Path) -> Result<Vec<TreeEntry>> {
    // A missing or unreadable root is an error, not an empty tree.
    root.symlink_metadata().map_err(|e| Error::io(root, e))?;

    let mut entries = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| root.to_path_buf());
            Error::io(path, e.into())
        })?;

        let full_path = entry.path().to_path_buf();
        let relative = full_path
            .strip_prefix(root)
            .map_err(|_| {
                Error::io(
                    &full_path,
                    std::io::Error::new(ErrorKind::InvalidData, "entry outside walk root"),
                )
            })?
            .to_path_buf();
        let relative_path = relative
            .to_str()
            .ok_or_else(|| {
                Error::io(
                    &full_path,
                    std::io::Error::new(ErrorKind::InvalidData, "non-UTF-8 path"),
                )
            })?
            .replace('\\', "/");

        let file_type = entry.file_type();
        let kind = if file_type.is_symlink() {
            EntryKind::Symlink
        } else if file_type.is_dir() {
            EntryKind::Dir
        } else {
            EntryKind::File
        };

        let meta = entry
            .metadata()
            .map_err(|e| Error::io(&full_path, e.into()))?;
        let size = if kind == EntryKind::File { meta.len() } else { 0 };
        let mode = permission_bits(&meta);

        entries.push(TreeEntry {
            relative_path,
            kind,
            full_path,
            size,
            mode,
        });
    }

    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(entries)
}

/// Index the regular files of a snapshot by relative path.
pub fn file_index(entries: &[TreeEntry]) -> BTreeMap<&str, &TreeEntry> {
    entries
        .iter()
        .filter(|e| e.kind == EntryKind::File)
        .map(|e| (e.relative_path.as_str(), e))
        .collect()
}

#[cfg(unix)]
fn permission_bits(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(_meta: &std::fs::Metadata) -> u32 {
    0
}

/// Read-only view of a file's bytes, memory-mapped when non-empty.
pub struct FileData(Option<Mmap>);

impl FileData {
    pub fn bytes(&self) -> &[u8] {
        match &self.0 {
            Some(mmap) => mmap,
            None => &[],
        }
    }
}

/// Memory-map a file for read-only access. Empty files get an empty view
/// since a zero-length mapping is an error on most platforms.
///
/// The mapping is read-only; callers must not concurrently truncate or
/// replace the underlying file while the view is live.
pub fn map_file(path: &Path) -> Result<FileData> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let len = file.metadata().map_err(|e| Error::io(path, e))?.len();
    if len == 0 {
        return Ok(FileData(None));
    }
    // SAFETY: read-only mapping; the trees under patch operations have a
    // single owner for the duration of the call.
    let mmap = unsafe { Mmap::map(&file) }.map_err(|e| Error::io(path, e))?;
    Ok(FileData(Some(mmap)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn walk_returns_sorted_relative_paths() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("b")).unwrap();
        fs::write(tmp.path().join("b/z.txt"), b"z").unwrap();
        fs::write(tmp.path().join("a.txt"), b"a").unwrap();
        let entries = walk_tree(tmp.path()).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b", "b/z.txt"]);
    }

    #[test]
    fn records_kind_and_size() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("f.bin"), vec![0u8; 128]).unwrap();
        let entries = walk_tree(tmp.path()).unwrap();
        assert_eq!(entries[0].kind, EntryKind::File);
        assert_eq!(entries[0].size, 128);
    }

    #[cfg(unix)]
    #[test]
    fn records_symlink_without_following() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("real.txt"), b"x").unwrap();
        std::os::unix::fs::symlink("real.txt", tmp.path().join("link")).unwrap();
        let entries = walk_tree(tmp.path()).unwrap();
        let link = entries
            .iter()
            .find(|e| e.relative_path == "link")
            .unwrap();
        assert_eq!(link.kind, EntryKind::Symlink);
    }

    #[test]
    fn maps_empty_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty");
        fs::write(&path, b"").unwrap();
        assert!(map_file(&path).unwrap().bytes().is_empty());
    }

    #[test]
    fn maps_file_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("f");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(map_file(&path).unwrap().bytes(), b"hello");
    }
}
