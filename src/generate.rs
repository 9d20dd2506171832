//! Single-patch generation: walks a destination tree against a baseline tree,
//! hashes every regular file, and records diffs, additions, deletions, and
//! permission/symlink metadata as one immutable artifact.

use std::collections::BTreeMap;
use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

use crate::error::Result;
use crate::patch_format::{
    ChangeRecord, HashAlgorithm, PatchSummary, SinglePatch, FORMAT_VERSION,
};
use crate::snapshot::{self, EntryKind, TreeEntry};
use crate::text_diff;

const BINARY_PROBE_LEN: usize = 8192;

/// A NUL byte in the probe window marks content as binary. Binary files are
/// stored whole instead of diffed.
fn is_binary(data: &[u8]) -> bool {
    data[..data.len().min(BINARY_PROBE_LEN)].contains(&0)
}

/// Mode recorded for a destination-only file only when it deviates from the
/// conventional default, so patches stay host-independent.
#[cfg(unix)]
const DEFAULT_FILE_MODE: u32 = 0o644;

struct FileWork<'a> {
    dest: &'a TreeEntry,
    base: Option<&'a TreeEntry>,
}

/// Compute the full delta between `destination` and `baseline`.
///
/// Per-file hashing and diffing run in parallel; results are merged into
/// canonically ordered maps, so the artifact is independent of scheduling.
/// Any unreadable file aborts the whole call; no partial artifact escapes.
pub fn generate_single_patch(
    destination: &Path,
    baseline: &Path,
    algo: HashAlgorithm,
    baseline_id: &str,
) -> Result<(SinglePatch, PatchSummary)> {
    let dest_entries = snapshot::walk_tree(destination)?;
    let base_entries = snapshot::walk_tree(baseline)?;
    let dest_files = snapshot::file_index(&dest_entries);
    let base_files = snapshot::file_index(&base_entries);
    debug!(
        destination_files = dest_files.len(),
        baseline_files = base_files.len(),
        "generating single patch"
    );

    let work: Vec<FileWork> = dest_files
        .values()
        .map(|&dest| FileWork {
            dest,
            base: base_files.get(dest.relative_path.as_str()).copied(),
        })
        .collect();

    // (path, digest, change-record-if-any), in canonical path order because
    // par_iter preserves input order on collect.
    let hashed: Vec<(String, [u8; 32], Option<ChangeRecord>)> = work
        .par_iter()
        .map(|item| -> Result<(String, [u8; 32], Option<ChangeRecord>)> {
            let path = item.dest.relative_path.clone();
            let dest_data = snapshot::map_file(&item.dest.full_path)?;
            let hash = algo.digest(dest_data.bytes());
            let record = match item.base {
                Some(base) => {
                    let base_data = snapshot::map_file(&base.full_path)?;
                    if algo.digest(base_data.bytes()) == hash {
                        None
                    } else if is_binary(base_data.bytes()) || is_binary(dest_data.bytes()) {
                        Some(ChangeRecord::Replace {
                            path: path.clone(),
                            data: dest_data.bytes().to_vec(),
                        })
                    } else {
                        Some(ChangeRecord::TextDiff {
                            path: path.clone(),
                            chunks: text_diff::compute_diff(
                                base_data.bytes(),
                                dest_data.bytes(),
                            ),
                        })
                    }
                }
                None => Some(ChangeRecord::Add {
                    path: path.clone(),
                    data: dest_data.bytes().to_vec(),
                }),
            };
            Ok((path, hash, record))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut file_hashes = BTreeMap::new();
    let mut adds = Vec::new();
    let mut modifications = Vec::new();
    let mut summary = PatchSummary::default();

    for (path, hash, record) in hashed {
        file_hashes.insert(path, hash);
        match record {
            Some(add @ ChangeRecord::Add { .. }) => {
                summary.files_added += 1;
                adds.push(add);
            }
            Some(diff @ ChangeRecord::TextDiff { .. }) => {
                summary.files_changed += 1;
                modifications.push(diff);
            }
            Some(replace @ ChangeRecord::Replace { .. }) => {
                summary.files_replaced += 1;
                modifications.push(replace);
            }
            _ => {}
        }
    }

    let mut deletes = Vec::new();
    for path in base_files.keys() {
        if !dest_files.contains_key(path) {
            summary.files_deleted += 1;
            deletes.push(ChangeRecord::Delete {
                path: (*path).to_string(),
            });
        }
    }

    // Additions first, then modifications, then deletions, each group in
    // canonical path order.
    let mut changes = adds;
    changes.append(&mut modifications);
    changes.append(&mut deletes);

    let modes = collect_modes(&dest_files, &base_files);
    let symlinks = collect_symlinks(&dest_entries)?;

    debug!(
        added = summary.files_added,
        changed = summary.files_changed,
        replaced = summary.files_replaced,
        deleted = summary.files_deleted,
        "single patch generated"
    );

    let patch = SinglePatch {
        version: FORMAT_VERSION,
        baseline: baseline_id.to_string(),
        algo,
        file_hashes,
        changes,
        modes,
        symlinks,
    };
    Ok((patch, summary))
}

#[cfg(unix)]
fn collect_modes(
    dest_files: &BTreeMap<&str, &TreeEntry>,
    base_files: &BTreeMap<&str, &TreeEntry>,
) -> BTreeMap<String, u32> {
    let mut modes = BTreeMap::new();
    for (path, dest) in dest_files {
        let changed = match base_files.get(path) {
            Some(base) => dest.mode != base.mode,
            None => dest.mode != DEFAULT_FILE_MODE,
        };
        if changed {
            modes.insert((*path).to_string(), dest.mode);
        }
    }
    modes
}

#[cfg(not(unix))]
fn collect_modes(
    _dest_files: &BTreeMap<&str, &TreeEntry>,
    _base_files: &BTreeMap<&str, &TreeEntry>,
) -> BTreeMap<String, u32> {
    BTreeMap::new()
}

fn collect_symlinks(dest_entries: &[TreeEntry]) -> Result<BTreeMap<String, String>> {
    let mut symlinks = BTreeMap::new();
    for entry in dest_entries {
        if entry.kind != EntryKind::Symlink {
            continue;
        }
        let target = std::fs::read_link(&entry.full_path)
            .map_err(|e| crate::error::Error::io(&entry.full_path, e))?;
        let target = target.to_string_lossy().replace('\\', "/");
        symlinks.insert(entry.relative_path.clone(), target);
    }
    Ok(symlinks)
}
