//! Source-tree migration primitives.
//!
//! Two coupled subsystems:
//!
//! - Reversible, path-safe filesystem [`Transformation`]s over a working
//!   tree, with the move/rename variant implemented. Paths are validated
//!   against a virtual root before any transform is constructed.
//! - The [`SinglePatch`] engine, which captures the entire delta between two
//!   directory trees as a single deterministic, content-addressed artifact
//!   that can later be re-applied to a baseline and hash-verified.
//!
//! Transformation execution is single-threaded and strictly ordered; patch
//! generation parallelizes per-file hashing but always assembles its output
//! in canonical path order, so artifacts are bit-identical across hosts and
//! runs.

mod apply;
mod error;
mod generate;
mod patch_format;
mod path_check;
mod snapshot;
mod text_diff;
mod text_patch;
mod transform;
mod tree_walk;

pub use apply::{apply_single_patch, verify_single_patch};
pub use error::{Error, Location, Result};
pub use generate::generate_single_patch;
pub use patch_format::{
    ChangeRecord, DiffChunk, HashAlgorithm, PatchSummary, SinglePatch, FORMAT_VERSION,
};
pub use path_check::{validate_path, PathValidator, DEFAULT_VIRTUAL_ROOT};
pub use transform::{Console, LogConsole, Move, TransformOptions, Transformation};
