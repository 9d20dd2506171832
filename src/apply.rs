//! Single-patch apply and verify: reconstructs a tree from a baseline and a
//! patch, then checks every recomputed content hash against the recorded one.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::patch_format::{ChangeRecord, PatchSummary, SinglePatch};
use crate::snapshot::{self, EntryKind};
use crate::text_patch;

/// Reconstruct `result` from `baseline` and `patch`.
///
/// Baseline regular files without a change record are copied unchanged.
/// Text diffs are rebuilt from their baseline counterparts, additions and
/// replacements written verbatim, deleted paths skipped, and recorded modes
/// and symlink targets restored. The reconstruction is verified before
/// returning; a hash mismatch surfaces as [`Error::Integrity`].
pub fn apply_single_patch(
    baseline: &Path,
    patch: &SinglePatch,
    result: &Path,
) -> Result<PatchSummary> {
    fs::create_dir_all(result).map_err(|e| Error::io(result, e))?;

    let records: BTreeMap<&str, &ChangeRecord> =
        patch.changes.iter().map(|c| (c.path(), c)).collect();
    let base_entries = snapshot::walk_tree(baseline)?;

    // Unrecorded baseline files carry over unchanged. Recorded paths are
    // handled below; Delete paths simply never materialize.
    let mut summary = PatchSummary::default();
    for entry in &base_entries {
        if entry.kind != EntryKind::File || records.contains_key(entry.relative_path.as_str()) {
            continue;
        }
        let dest = result.join(&entry.relative_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        // Blame the destination: the baseline side was just walked, so a copy
        // failure is almost always an unwritable target.
        fs::copy(&entry.full_path, &dest).map_err(|e| Error::io(&dest, e))?;
    }

    for change in &patch.changes {
        match change {
            ChangeRecord::TextDiff { path, chunks } => {
                let base_data = snapshot::map_file(&baseline.join(path))?;
                let new_data = text_patch::apply_diff(base_data.bytes(), chunks)?;
                write_file(&result.join(path), &new_data)?;
                summary.files_changed += 1;
            }
            ChangeRecord::Replace { path, data } => {
                write_file(&result.join(path), data)?;
                summary.files_replaced += 1;
            }
            ChangeRecord::Add { path, data } => {
                write_file(&result.join(path), data)?;
                summary.files_added += 1;
            }
            ChangeRecord::Delete { .. } => {
                summary.files_deleted += 1;
            }
        }
    }

    restore_modes(patch, result)?;
    restore_symlinks(patch, result)?;

    debug!(
        added = summary.files_added,
        changed = summary.files_changed,
        replaced = summary.files_replaced,
        deleted = summary.files_deleted,
        "single patch applied, verifying"
    );
    verify_single_patch(result, patch)?;
    Ok(summary)
}

/// Recompute the hash of every regular file under `result` with the patch's
/// recorded algorithm and compare against the recorded mapping. The first
/// mismatching path (lexicographically) fails the verification, including
/// files that are missing or were never recorded.
pub fn verify_single_patch(result: &Path, patch: &SinglePatch) -> Result<()> {
    let entries = snapshot::walk_tree(result)?;
    let hashed: Vec<(String, [u8; 32])> = entries
        .par_iter()
        .filter(|e| e.kind == EntryKind::File)
        .map(|e| -> Result<(String, [u8; 32])> {
            let data = snapshot::map_file(&e.full_path)?;
            Ok((e.relative_path.clone(), patch.algo.digest(data.bytes())))
        })
        .collect::<Result<Vec<_>>>()?;
    let actual: BTreeMap<String, [u8; 32]> = hashed.into_iter().collect();

    let paths: BTreeSet<&str> = patch
        .file_hashes
        .keys()
        .map(String::as_str)
        .chain(actual.keys().map(String::as_str))
        .collect();
    for path in paths {
        let recorded = patch.file_hashes.get(path);
        let recomputed = actual.get(path);
        if recorded != recomputed {
            return Err(Error::Integrity {
                path: path.to_string(),
                expected: digest_or_absent(recorded),
                actual: digest_or_absent(recomputed),
            });
        }
    }
    Ok(())
}

fn digest_or_absent(digest: Option<&[u8; 32]>) -> String {
    digest.map(hex::encode).unwrap_or_else(|| "absent".to_string())
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, data).map_err(|e| Error::io(path, e))
}

#[cfg(unix)]
fn restore_modes(patch: &SinglePatch, result: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    for (path, mode) in &patch.modes {
        let full = result.join(path);
        fs::set_permissions(&full, fs::Permissions::from_mode(*mode))
            .map_err(|e| Error::io(&full, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_modes(_patch: &SinglePatch, _result: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn restore_symlinks(patch: &SinglePatch, result: &Path) -> Result<()> {
    for (path, target) in &patch.symlinks {
        let full = result.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        std::os::unix::fs::symlink(target, &full).map_err(|e| Error::io(&full, e))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn restore_symlinks(_patch: &SinglePatch, _result: &Path) -> Result<()> {
    Ok(())
}
