//! Reversible filesystem transformations applied in sequence over a working
//! tree. One variant is implemented: the move/rename transform. Reversal of a
//! whole sequence is a driver concern: run the reversed list with each
//! descriptor individually reversed.

use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Location, Result};
use crate::path_check::PathValidator;
use crate::tree_walk;

/// User-visible status sink. Messages never affect control flow.
pub trait Console {
    fn progress(&self, message: &str);
}

/// Routes progress messages onto the `tracing` pipeline.
#[derive(Debug, Default)]
pub struct LogConsole;

impl Console for LogConsole {
    fn progress(&self, message: &str) {
        info!("{message}");
    }
}

/// Shared transform policy. `treat_missing_as_error` escalates a missing
/// source path from a reported no-op to a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    pub treat_missing_as_error: bool,
}

impl TransformOptions {
    /// Policy hook for a missing-source condition: report and continue, or
    /// escalate under strict configuration.
    pub fn report_noop(&self, console: &dyn Console, message: &str) -> Result<()> {
        if self.treat_missing_as_error {
            return Err(Error::Noop(message.to_string()));
        }
        console.progress(message);
        Ok(())
    }
}

/// Closed set of transformation kinds. External drivers dispatch through this
/// enum without inspecting concrete kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformation {
    Move(Move),
}

impl Transformation {
    pub fn transform(&self, workdir: &Path, console: &dyn Console) -> Result<()> {
        match self {
            Transformation::Move(m) => m.transform(workdir, console),
        }
    }

    pub fn reverse(&self) -> Transformation {
        match self {
            Transformation::Move(m) => Transformation::Move(m.reverse()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Transformation::Move(m) => m.describe(),
        }
    }
}

/// Moves (renames) a single file or directory inside the workdir.
///
/// The descriptor fully determines the effect, which is why
/// [`Move::reverse`] can be a pure before/after swap rather than a record of
/// actual filesystem effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    before: String,
    after: String,
    options: TransformOptions,
}

impl Move {
    /// Builds a move from config input, validating both paths against the
    /// given validator. A rejected path surfaces as a config error carrying
    /// `location` for the config layer to report.
    pub fn from_config(
        validator: &PathValidator,
        before: &str,
        after: &str,
        options: TransformOptions,
        location: Location,
    ) -> Result<Move> {
        let before = checked(validator, before, &location)?;
        let after = checked(validator, after, &location)?;
        Ok(Move {
            before,
            after,
            options,
        })
    }

    pub fn before(&self) -> &str {
        &self.before
    }

    pub fn after(&self) -> &str {
        &self.after
    }

    /// Stateless over the descriptor and the external tree.
    pub fn transform(&self, workdir: &Path, console: &dyn Console) -> Result<()> {
        console.progress(&format!("Moving {}", self.before));
        let before = workdir.join(&self.before);
        if before.symlink_metadata().is_err() {
            return self.options.report_noop(
                console,
                &format!(
                    "Error moving '{}'. It doesn't exist in the workdir",
                    self.before
                ),
            );
        }
        let after = workdir.join(&self.after);
        if is_dir_no_follow(&after) && after.starts_with(&before) {
            // Moving a parent dir into its own subtree: a target that
            // already holds files is most likely a mistake and would lose
            // data to aliasing.
            tree_walk::verify_dir_is_empty(&after)?;
        }
        create_parent_dirs(&after)?;
        tree_walk::move_entries(&before, &after)
    }

    pub fn reverse(&self) -> Move {
        Move {
            before: self.after.clone(),
            after: self.before.clone(),
            options: self.options.clone(),
        }
    }

    pub fn describe(&self) -> String {
        format!("Moving {}", self.before)
    }
}

fn checked(validator: &PathValidator, raw: &str, location: &Location) -> Result<String> {
    match validator.validate(raw) {
        Ok(p) => Ok(p.to_string()),
        Err(e) => Err(Error::Config {
            message: e.to_string(),
            location: location.clone(),
        }),
    }
}

fn is_dir_no_follow(path: &Path) -> bool {
    path.symlink_metadata().map(|m| m.is_dir()).unwrap_or(false)
}

fn create_parent_dirs(after: &Path) -> Result<()> {
    let Some(parent) = after.parent() else {
        return Ok(());
    };
    match std::fs::create_dir_all(parent) {
        Ok(()) => Ok(()),
        // create_dir_all reports these kinds when an existing path segment is
        // a file; that is a descriptor problem, not an I/O fault.
        Err(e) if matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::NotADirectory) => {
            Err(Error::Validation(format!(
                "Cannot create '{}' because a path segment already exists and is not a directory",
                parent.display()
            )))
        }
        Err(e) => Err(Error::io(parent, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingConsole {
        messages: Mutex<Vec<String>>,
    }

    impl Console for RecordingConsole {
        fn progress(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    fn mv(before: &str, after: &str) -> Move {
        mv_opts(before, after, TransformOptions::default())
    }

    fn mv_opts(before: &str, after: &str, options: TransformOptions) -> Move {
        Move::from_config(
            &PathValidator::default(),
            before,
            after,
            options,
            Location {
                file: "copy.cfg".into(),
                line: 1,
            },
        )
        .unwrap()
    }

    fn tree(root: &Path, files: &[(&str, &[u8])]) {
        for (rel, content) in files {
            let full = root.join(rel);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, content).unwrap();
        }
    }

    #[test]
    fn rejects_traversing_path_with_location() {
        let err = Move::from_config(
            &PathValidator::default(),
            "../escape",
            "b",
            TransformOptions::default(),
            Location {
                file: "copy.cfg".into(),
                line: 7,
            },
        )
        .unwrap_err();
        match err {
            Error::Config { message, location } => {
                assert!(message.contains("../escape"));
                assert_eq!(location.line, 7);
                assert_eq!(location.file, "copy.cfg");
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn moves_a_file() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("one/file.txt", b"content")]);
        mv("one/file.txt", "two/file.txt")
            .transform(tmp.path(), &RecordingConsole::default())
            .unwrap();
        assert_eq!(fs::read(tmp.path().join("two/file.txt")).unwrap(), b"content");
        assert!(!tmp.path().join("one/file.txt").exists());
    }

    #[test]
    fn log_console_drives_a_transform() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("a.txt", b"x")]);
        mv("a.txt", "b.txt").transform(tmp.path(), &LogConsole).unwrap();
        assert!(tmp.path().join("b.txt").exists());
    }

    #[test]
    fn emits_progress_for_source_path() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("a.txt", b"x")]);
        let console = RecordingConsole::default();
        mv("a.txt", "b.txt").transform(tmp.path(), &console).unwrap();
        let messages = console.messages.lock().unwrap();
        assert_eq!(messages[0], "Moving a.txt");
    }

    #[test]
    fn reverse_twice_is_identity() {
        let m = mv("x", "y");
        assert_eq!(m.reverse().reverse(), m);
    }

    #[test]
    fn reverse_swaps_descriptor() {
        let m = mv("x", "y");
        let r = m.reverse();
        assert_eq!(r.before(), "y");
        assert_eq!(r.after(), "x");
    }

    #[test]
    fn move_then_reverse_restores_tree() {
        let tmp = TempDir::new().unwrap();
        tree(
            tmp.path(),
            &[("x/f", b"payload"), ("x/sub/g", b"more"), ("keep.txt", b"k")],
        );
        let console = RecordingConsole::default();
        let m = Transformation::Move(mv("x", "y"));
        m.transform(tmp.path(), &console).unwrap();
        assert!(!tmp.path().join("x").exists());
        assert_eq!(fs::read(tmp.path().join("y/f")).unwrap(), b"payload");
        m.reverse().transform(tmp.path(), &console).unwrap();
        assert!(!tmp.path().join("y").exists());
        assert_eq!(fs::read(tmp.path().join("x/f")).unwrap(), b"payload");
        assert_eq!(fs::read(tmp.path().join("x/sub/g")).unwrap(), b"more");
        assert_eq!(fs::read(tmp.path().join("keep.txt")).unwrap(), b"k");
    }

    #[test]
    fn missing_source_is_reported_noop() {
        let tmp = TempDir::new().unwrap();
        let console = RecordingConsole::default();
        mv("ghost", "dest").transform(tmp.path(), &console).unwrap();
        let messages = console.messages.lock().unwrap();
        assert!(messages
            .iter()
            .any(|m| m.contains("doesn't exist in the workdir")));
    }

    #[test]
    fn missing_source_fails_under_strict_policy() {
        let tmp = TempDir::new().unwrap();
        let strict = TransformOptions {
            treat_missing_as_error: true,
        };
        let err = mv_opts("ghost", "dest", strict)
            .transform(tmp.path(), &RecordingConsole::default())
            .unwrap_err();
        assert!(matches!(err, Error::Noop(_)));
    }

    #[test]
    fn destination_collision_fails() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("a.txt", b"new"), ("b.txt", b"old")]);
        let err = mv("a.txt", "b.txt")
            .transform(tmp.path(), &RecordingConsole::default())
            .unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("b.txt"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(fs::read(tmp.path().join("b.txt")).unwrap(), b"old");
    }

    #[test]
    fn moving_directory_onto_file_fails_as_collision() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("d/f.txt", b"inside"), ("target", b"occupied")]);
        let err = mv("d", "target")
            .transform(tmp.path(), &RecordingConsole::default())
            .unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("target"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(fs::read(tmp.path().join("target")).unwrap(), b"occupied");
    }

    #[test]
    fn parent_segment_that_is_a_file_fails_validation() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("a.txt", b"a"), ("blocker", b"file not dir")]);
        let err = mv("a.txt", "blocker/a.txt")
            .transform(tmp.path(), &RecordingConsole::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err:?}");
    }

    #[test]
    fn non_empty_self_aliasing_target_fails_unmodified() {
        let tmp = TempDir::new().unwrap();
        tree(
            tmp.path(),
            &[("x/f.txt", b"f"), ("x/sub/existing.txt", b"e")],
        );
        let err = mv("x", "x/sub")
            .transform(tmp.path(), &RecordingConsole::default())
            .unwrap_err();
        match err {
            Error::Validation(msg) => assert!(msg.contains("existing.txt"), "{msg}"),
            other => panic!("expected validation error, got {other:?}"),
        }
        // Pre-check fires before anything moves.
        assert_eq!(fs::read(tmp.path().join("x/f.txt")).unwrap(), b"f");
        assert_eq!(
            fs::read(tmp.path().join("x/sub/existing.txt")).unwrap(),
            b"e"
        );
    }

    #[test]
    fn moves_into_empty_self_aliasing_target() {
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("x/f.txt", b"f")]);
        fs::create_dir_all(tmp.path().join("x/sub")).unwrap();
        mv("x", "x/sub")
            .transform(tmp.path(), &RecordingConsole::default())
            .unwrap();
        assert_eq!(fs::read(tmp.path().join("x/sub/f.txt")).unwrap(), b"f");
        assert!(!tmp.path().join("x/f.txt").exists());
    }

    #[test]
    fn describe_names_the_source() {
        assert_eq!(mv("a/b", "c").describe(), "Moving a/b");
        assert_eq!(
            Transformation::Move(mv("a/b", "c")).describe(),
            "Moving a/b"
        );
    }

    #[test]
    fn sequence_reversal_restores_tree() {
        // Driver contract: reversed list, each descriptor reversed.
        let tmp = TempDir::new().unwrap();
        tree(tmp.path(), &[("a/f", b"1"), ("b/g", b"2")]);
        let console = RecordingConsole::default();
        let sequence = vec![
            Transformation::Move(mv("a", "staging")),
            Transformation::Move(mv("staging", "final")),
        ];
        for t in &sequence {
            t.transform(tmp.path(), &console).unwrap();
        }
        assert_eq!(fs::read(tmp.path().join("final/f")).unwrap(), b"1");
        for t in sequence.iter().rev() {
            t.reverse().transform(tmp.path(), &console).unwrap();
        }
        assert_eq!(fs::read(tmp.path().join("a/f")).unwrap(), b"1");
        assert_eq!(fs::read(tmp.path().join("b/g")).unwrap(), b"2");
        assert!(!tmp.path().join("final").exists());
    }
}
