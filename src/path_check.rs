//! Pure string-level validation that a relative path stays inside a virtual
//! root. No filesystem access and no platform path resolution, so validation
//! behaves identically on every host.

use crate::error::{Error, Result};

/// Default anchor for validation when no explicit root is configured.
pub const DEFAULT_VIRTUAL_ROOT: &str = "/workdir";

/// Validates candidate paths against a synthetic root. The root only anchors
/// the string resolution; it is never touched on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathValidator {
    virtual_root: String,
}

impl Default for PathValidator {
    fn default() -> Self {
        Self::new(DEFAULT_VIRTUAL_ROOT)
    }
}

impl PathValidator {
    pub fn new(virtual_root: &str) -> Self {
        Self {
            virtual_root: virtual_root.trim_end_matches('/').to_string(),
        }
    }

    /// Accepts `raw` only if joining it onto the virtual root and collapsing
    /// `.`/`..` components changes nothing, and the result stays at or below
    /// the root. Traversal that appears to cancel out syntactically (for
    /// example `a/../b`) still alters the normalized form and is rejected.
    pub fn validate<'a>(&self, raw: &'a str) -> Result<&'a str> {
        if raw.is_empty() || raw.starts_with('/') {
            return Err(Error::PathSafety {
                path: raw.to_string(),
            });
        }
        let resolved = format!("{}/{}", self.virtual_root, raw);
        let normalized = normalize(&resolved);
        let inside = normalized == self.virtual_root
            || normalized.starts_with(&format!("{}/", self.virtual_root));
        if resolved != normalized || !inside {
            return Err(Error::PathSafety {
                path: raw.to_string(),
            });
        }
        Ok(raw)
    }
}

/// Collapse `.` and `..` components of an absolute `/`-separated path.
/// Popping past the root pins the result at `/`.
fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            seg => stack.push(seg),
        }
    }
    format!("/{}", stack.join("/"))
}

/// Validate against the default virtual root.
pub fn validate_path(raw: &str) -> Result<&str> {
    PathValidator::default().validate(raw)
}
