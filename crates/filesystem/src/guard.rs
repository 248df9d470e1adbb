//! Path containment for the filesystem server.
//!
//! Every filesystem operation must pass its caller-supplied paths through
//! [`PathGuard::resolve`] before touching storage. Containment is decided on
//! the fully resolved path (symlinks followed, `.`/`..` collapsed), never on
//! the raw string, so traversal through symlinks or parent segments cannot
//! escape the sandbox.

use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Errors from path resolution.
#[derive(Error, Debug)]
pub enum GuardError {
    /// The resolved path is outside every allowed root.
    #[error("access denied: {} is outside the allowed directories", .0.display())]
    OutsideRoot(PathBuf),
    /// The path has no existing ancestor that resolves to a directory, or
    /// contains `..` segments below a segment that does not exist yet.
    #[error("unresolvable path: {}", .0.display())]
    Unresolvable(PathBuf),
    /// An I/O error occurred during path resolution.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// The sandbox boundary: a fixed set of canonical root directories.
///
/// The root set is built once at startup and never mutated. A path is
/// admitted iff its resolved form equals or descends from at least one root,
/// compared segment-wise — `/root2` is not inside a root of `/root`.
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: Vec<PathBuf>,
}

impl PathGuard {
    /// Build a guard from the configured root directories.
    ///
    /// Each root is canonicalized; roots that do not exist are skipped.
    /// Fails if no usable root remains.
    pub fn new(roots: Vec<PathBuf>) -> io::Result<Self> {
        let roots: Vec<PathBuf> = roots
            .into_iter()
            .filter_map(|dir| dir.canonicalize().ok())
            .collect();
        if roots.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "no usable root directory",
            ));
        }
        Ok(Self { roots })
    }

    /// The canonical roots of the sandbox.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a caller-supplied path and check sandbox containment.
    ///
    /// Existing paths are fully canonicalized. A path that does not exist
    /// yet (a file about to be created) is resolved through its deepest
    /// existing ancestor, with the remaining segments re-appended; `..`
    /// inside the non-existent tail is unresolvable, as is an intermediate
    /// segment that exists but is not a directory.
    pub fn resolve(&self, candidate: impl AsRef<Path>) -> Result<PathBuf, GuardError> {
        let abs = std::path::absolute(candidate.as_ref())?;

        // symlink_metadata also sees dangling symlinks, which a plain
        // exists() check would misreport as creatable new files.
        if abs.symlink_metadata().is_ok() {
            let canonical = abs
                .canonicalize()
                .map_err(|_| GuardError::Unresolvable(abs.clone()))?;
            return self.check(canonical);
        }

        let (ancestor, tail) = split_existing_ancestor(&abs)?;
        let canonical = ancestor
            .canonicalize()
            .map_err(|_| GuardError::Unresolvable(abs.clone()))?;
        if !canonical.is_dir() {
            return Err(GuardError::Unresolvable(abs));
        }
        self.check(canonical.join(tail))
    }

    fn check(&self, resolved: PathBuf) -> Result<PathBuf, GuardError> {
        if self.roots.iter().any(|root| resolved.starts_with(root)) {
            Ok(resolved)
        } else {
            Err(GuardError::OutsideRoot(resolved))
        }
    }
}

/// Split an absolute path into its deepest existing ancestor and the
/// non-existent remainder.
fn split_existing_ancestor(abs: &Path) -> Result<(&Path, PathBuf), GuardError> {
    for ancestor in abs.ancestors().skip(1) {
        if ancestor.symlink_metadata().is_err() {
            continue;
        }
        let rest = abs
            .strip_prefix(ancestor)
            .map_err(|_| GuardError::Unresolvable(abs.to_path_buf()))?;
        let mut tail = PathBuf::new();
        for component in rest.components() {
            match component {
                Component::Normal(segment) => tail.push(segment),
                Component::CurDir => {}
                // `..` below a segment that does not exist cannot be
                // resolved against the real filesystem.
                _ => return Err(GuardError::Unresolvable(abs.to_path_buf())),
            }
        }
        return Ok((ancestor, tail));
    }
    Err(GuardError::Unresolvable(abs.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::{GuardError, PathGuard};
    use std::fs;

    fn guard_for(dir: &std::path::Path) -> PathGuard {
        PathGuard::new(vec![dir.to_path_buf()]).expect("guard")
    }

    #[test]
    fn allows_existing_file_within_root() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "hello").unwrap();
        let guard = guard_for(tmp.path());
        let resolved = guard.resolve(&file).expect("inside");
        assert!(resolved.ends_with("a.txt"));
    }

    #[test]
    fn allows_nonexistent_file_within_root() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_for(tmp.path());
        let resolved = guard.resolve(tmp.path().join("new.txt")).expect("inside");
        assert!(resolved.ends_with("new.txt"));
    }

    #[test]
    fn rejects_path_outside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_for(tmp.path());
        let err = guard.resolve("/etc/passwd").unwrap_err();
        assert!(matches!(err, GuardError::OutsideRoot(_)));
    }

    #[test]
    fn rejects_dotdot_escape() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_for(tmp.path());
        let escape = tmp.path().join("..").join("..").join("etc").join("passwd");
        let err = guard.resolve(&escape).unwrap_err();
        assert!(matches!(
            err,
            GuardError::OutsideRoot(_) | GuardError::Unresolvable(_)
        ));
    }

    #[test]
    fn rejects_sibling_directory_with_root_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let sibling = tmp.path().join("root2");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&sibling).unwrap();
        fs::write(sibling.join("x.txt"), "x").unwrap();
        let guard = guard_for(&root);
        let err = guard.resolve(sibling.join("x.txt")).unwrap_err();
        assert!(matches!(err, GuardError::OutsideRoot(_)));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_pointing_outside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        let outside = tmp.path().join("outside");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&outside).unwrap();
        fs::write(outside.join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.join("secret.txt"), root.join("link")).unwrap();
        let guard = guard_for(&root);
        let err = guard.resolve(root.join("link")).unwrap_err();
        assert!(matches!(err, GuardError::OutsideRoot(_)));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_dangling_symlink() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_for(tmp.path());
        std::os::unix::fs::symlink("/nonexistent/target", tmp.path().join("dangling")).unwrap();
        let err = guard.resolve(tmp.path().join("dangling")).unwrap_err();
        assert!(matches!(err, GuardError::Unresolvable(_)));
    }

    #[test]
    fn resolves_new_file_through_deepest_existing_ancestor() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_for(tmp.path());
        let target = tmp.path().join("missing").join("deep").join("new.txt");
        let resolved = guard.resolve(&target).expect("inside");
        assert!(resolved.ends_with("missing/deep/new.txt"));
    }

    #[test]
    fn rejects_dotdot_below_nonexistent_segment() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = guard_for(tmp.path());
        let target = tmp.path().join("missing").join("..").join("..").join("x");
        let err = guard.resolve(&target).unwrap_err();
        assert!(matches!(
            err,
            GuardError::Unresolvable(_) | GuardError::OutsideRoot(_)
        ));
    }

    #[test]
    fn rejects_file_as_intermediate_segment() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        let guard = guard_for(tmp.path());
        let err = guard.resolve(file.join("below.txt")).unwrap_err();
        assert!(matches!(err, GuardError::Unresolvable(_)));
    }

    #[test]
    fn skips_missing_roots_and_fails_when_none_remain() {
        let tmp = tempfile::tempdir().unwrap();
        let guard = PathGuard::new(vec![
            tmp.path().join("nope"),
            tmp.path().to_path_buf(),
        ])
        .expect("one usable root");
        assert_eq!(guard.roots().len(), 1);
        assert!(PathGuard::new(vec![tmp.path().join("nope")]).is_err());
    }
}
