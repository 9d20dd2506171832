//! Reconstruction of a text file from its baseline and a line-level diff.

use crate::error::{Error, Result};
use crate::patch_format::DiffChunk;
use crate::text_diff::split_lines;

/// Rebuild the destination text from the baseline text and a sequence of
/// diff chunks. A Copy chunk referencing lines the baseline does not have
/// means the chunks were computed against a different baseline.
pub fn apply_diff(old: &[u8], chunks: &[DiffChunk]) -> Result<Vec<u8>> {
    let old_lines = split_lines(old);
    let mut result = Vec::new();
    for chunk in chunks {
        match chunk {
            DiffChunk::Copy { start, count } => {
                let start = *start as usize;
                let end = start
                    .checked_add(*count as usize)
                    .filter(|&e| e <= old_lines.len())
                    .ok_or_else(|| {
                        Error::Format(format!(
                            "copy chunk [{start}, +{count}) exceeds baseline of {} lines",
                            old_lines.len()
                        ))
                    })?;
                for line in &old_lines[start..end] {
                    result.extend_from_slice(line);
                }
            }
            DiffChunk::Insert { data } => result.extend_from_slice(data),
        }
    }
    Ok(result)
}
