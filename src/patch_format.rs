//! The single-patch artifact: a content-addressed, self-contained description
//! of the full delta between a baseline tree and a destination tree. Produced
//! once by generation, never mutated, consumed by apply/verify.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::error::{Error, Result};

pub const MAGIC: &[u8; 8] = b"SPATCH01";
pub const FORMAT_VERSION: u32 = 1;

/// Content digest algorithm, recorded in the artifact so verification
/// recomputes with the same function. Both produce 32-byte digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Blake3,
    Sha256,
}

impl HashAlgorithm {
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        match self {
            HashAlgorithm::Blake3 => *blake3::hash(data).as_bytes(),
            HashAlgorithm::Sha256 => sha2::Sha256::digest(data).into(),
        }
    }
}

/// One recorded delta against the baseline. Paths are `/`-separated and
/// relative to the tree root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeRecord {
    /// Line-level diff for a text file present in both trees.
    TextDiff { path: String, chunks: Vec<DiffChunk> },
    /// Full-content replacement for a binary file present in both trees.
    Replace { path: String, data: Vec<u8> },
    /// Full content of a destination-only file.
    Add { path: String, data: Vec<u8> },
    /// A baseline-only path, absent from the destination.
    Delete { path: String },
}

impl ChangeRecord {
    pub fn path(&self) -> &str {
        match self {
            ChangeRecord::TextDiff { path, .. }
            | ChangeRecord::Replace { path, .. }
            | ChangeRecord::Add { path, .. }
            | ChangeRecord::Delete { path } => path,
        }
    }
}

/// One piece of a line-level text diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffChunk {
    /// Copy `count` lines starting at line index `start` of the baseline.
    Copy { start: u64, count: u64 },
    /// Insert raw bytes (complete lines) verbatim.
    Insert { data: Vec<u8> },
}

/// The immutable patch artifact. `file_hashes` maps every regular file of the
/// resulting tree to its content digest, in canonical lexicographic order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinglePatch {
    pub version: u32,
    /// Identifier of the baseline this patch was computed against.
    pub baseline: String,
    pub algo: HashAlgorithm,
    pub file_hashes: BTreeMap<String, [u8; 32]>,
    pub changes: Vec<ChangeRecord>,
    /// Unix permission bits to restore, keyed by path.
    pub modes: BTreeMap<String, u32>,
    /// Symlink targets of the resulting tree, keyed by link path. Symlinks
    /// are never hashed or diffed.
    pub symlinks: BTreeMap<String, String>,
}

impl SinglePatch {
    /// Serialize to the wire form: magic header, then a zstd-compressed
    /// bincode body. Re-serializing a decoded patch is byte-identical.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let encoded =
            bincode::serialize(self).map_err(|e| Error::Format(e.to_string()))?;
        let compressed =
            zstd::bulk::compress(&encoded, 3).map_err(|e| Error::Format(e.to_string()))?;
        let mut out = Vec::with_capacity(MAGIC.len() + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<SinglePatch> {
        if raw.len() < MAGIC.len() || &raw[..MAGIC.len()] != MAGIC {
            return Err(Error::Format("missing magic header".into()));
        }
        let decoder = zstd::Decoder::new(&raw[MAGIC.len()..])
            .map_err(|e| Error::Format(e.to_string()))?;
        let patch: SinglePatch =
            bincode::deserialize_from(decoder).map_err(|e| Error::Format(e.to_string()))?;
        if patch.version != FORMAT_VERSION {
            return Err(Error::Format(format!(
                "unsupported patch version: {} (expected {})",
                patch.version, FORMAT_VERSION
            )));
        }
        Ok(patch)
    }
}

/// Counts reported by generation and apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub files_added: usize,
    pub files_changed: usize,
    pub files_replaced: usize,
    pub files_deleted: usize,
}
