//! Line-level diff between two text files.
//!
//! Uses a table-matching approach:
//! 1. Build a hash table from line content -> positions in the baseline
//! 2. Scan destination lines, anchoring each match at the first baseline
//!    position at or after the current cursor
//! 3. Extend every anchor to the longest common run
//! 4. Emit Copy chunks for matched runs, Insert chunks for everything else
//!
//! Output depends only on the two inputs, never on scheduling or host.

use std::collections::HashMap;

use crate::patch_format::DiffChunk;

/// Split into lines keeping terminators, so concatenating the pieces
/// reproduces the input byte-for-byte (including a missing final newline).
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Compute a line-level diff that rebuilds `new` from `old`.
pub fn compute_diff(old: &[u8], new: &[u8]) -> Vec<DiffChunk> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);

    if old_lines.is_empty() {
        if new.is_empty() {
            return vec![];
        }
        return vec![DiffChunk::Insert {
            data: new.to_vec(),
        }];
    }

    let mut table: HashMap<&[u8], Vec<usize>> = HashMap::with_capacity(old_lines.len());
    for (idx, line) in old_lines.iter().copied().enumerate() {
        table.entry(line).or_default().push(idx);
    }

    let mut chunks: Vec<DiffChunk> = Vec::new();
    let mut insert_buf: Vec<u8> = Vec::new();
    let mut pos = 0;
    // Preferred continuation point in the baseline, so consecutive unchanged
    // lines collapse into a single Copy.
    let mut cursor = 0;

    while pos < new_lines.len() {
        match table.get(new_lines[pos]).map(|c| pick_anchor(c, cursor)) {
            Some(start) => {
                let mut len = 1;
                while pos + len < new_lines.len()
                    && start + len < old_lines.len()
                    && new_lines[pos + len] == old_lines[start + len]
                {
                    len += 1;
                }
                if !insert_buf.is_empty() {
                    chunks.push(DiffChunk::Insert {
                        data: std::mem::take(&mut insert_buf),
                    });
                }
                chunks.push(DiffChunk::Copy {
                    start: start as u64,
                    count: len as u64,
                });
                pos += len;
                cursor = start + len;
            }
            None => {
                insert_buf.extend_from_slice(new_lines[pos]);
                pos += 1;
            }
        }
    }

    if !insert_buf.is_empty() {
        chunks.push(DiffChunk::Insert { data: insert_buf });
    }

    chunks
}

/// First baseline position at or after the cursor; otherwise the earliest
/// occurrence. Both choices are order-deterministic.
fn pick_anchor(candidates: &[usize], cursor: usize) -> usize {
    candidates
        .iter()
        .copied()
        .find(|&i| i >= cursor)
        .unwrap_or(candidates[0])
}
