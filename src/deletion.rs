use jwalk::WalkDir;
use log::{info, trace, warn};
use serde::Serialize;
use std::cmp::Reverse;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Result of removing one selected path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

impl Outcome {
    fn removed(path: PathBuf) -> Self {
        Self {
            path,
            success: true,
            error: None,
        }
    }

    fn failed(path: PathBuf, error: String) -> Self {
        Self {
            path,
            success: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub succeeded: usize,
    pub failed: usize,
}

impl DeleteSummary {
    pub fn of(outcomes: &[Outcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.success).count();
        Self {
            succeeded,
            failed: outcomes.len() - succeeded,
        }
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Nesting depth of `path`; a trailing separator doesn't add a level.
fn path_depth(path: &Path) -> usize {
    path.components().count()
}

/// Deepest paths first, so descendants go before their ancestors.
/// Paths at equal depth keep their input order.
pub fn deletion_order(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut ordered = paths.to_vec();
    ordered.sort_by_key(|path| Reverse(path_depth(path)));
    ordered
}

/// Remove every path in `paths`, immediately and without undo.
///
/// Files are unlinked, directories removed with all their contents. A
/// failure is recorded in that path's [`Outcome`] and the batch carries on.
/// Outcomes are returned in processing order.
pub fn delete_many(paths: &[PathBuf]) -> Vec<Outcome> {
    let ordered = deletion_order(paths);
    let mut outcomes = Vec::with_capacity(ordered.len());

    for path in ordered {
        let outcome = match delete_path(&path) {
            Ok(()) => Outcome::removed(path),
            Err(err) => {
                let message = if err.kind() == io::ErrorKind::NotFound {
                    "path does not exist".to_string()
                } else {
                    err.to_string()
                };
                warn!("failed to delete {}: {}", path.display(), message);
                Outcome::failed(path, message)
            }
        };
        outcomes.push(outcome);
    }

    let summary = DeleteSummary::of(&outcomes);
    info!(
        "delete batch done: {} removed, {} failed",
        summary.succeeded, summary.failed
    );
    outcomes
}

fn delete_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.is_dir() {
        clear_readonly_tree(path);
        fs::remove_dir_all(path)
    } else {
        clear_readonly(path, &metadata);
        fs::remove_file(path)
    }
}

/// Best-effort: lift write protection on `path` and everything below it.
/// Directories are included since unlinking needs write access to the
/// containing directory.
fn clear_readonly_tree(path: &Path) {
    for entry in WalkDir::new(path)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::Serial)
        .into_iter()
        .flatten()
    {
        let entry_path = entry.path();
        if let Ok(metadata) = fs::symlink_metadata(&entry_path) {
            clear_readonly(&entry_path, &metadata);
        }
    }
}

fn clear_readonly(path: &Path, metadata: &fs::Metadata) {
    if metadata.file_type().is_symlink() {
        return;
    }

    let mut permissions = metadata.permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = permissions.mode();
        if mode & 0o200 != 0 {
            return;
        }
        permissions.set_mode(mode | 0o200);
    }

    #[cfg(not(unix))]
    {
        if !permissions.readonly() {
            return;
        }
        permissions.set_readonly(false);
    }

    if let Err(err) = fs::set_permissions(path, permissions) {
        trace!("cannot clear read-only flag on {}: {}", path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::MAIN_SEPARATOR;
    use tempfile::TempDir;

    fn write_bytes(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_deletion_order_deepest_first() {
        let paths = vec![
            PathBuf::from(format!("{0}r{0}A", MAIN_SEPARATOR)),
            PathBuf::from(format!("{0}r{0}A{0}inner{0}deep", MAIN_SEPARATOR)),
            PathBuf::from(format!("{0}r{0}B", MAIN_SEPARATOR)),
            PathBuf::from(format!("{0}r{0}A{0}inner", MAIN_SEPARATOR)),
        ];
        let ordered = deletion_order(&paths);
        assert_eq!(ordered, vec![paths[1].clone(), paths[3].clone(), paths[0].clone(), paths[2].clone()]);
    }

    #[test]
    fn test_delete_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("test.txt");
        write_bytes(&file, 12);

        let outcomes = delete_many(&[file.clone()]);
        assert_eq!(outcomes, vec![Outcome::removed(file.clone())]);
        assert!(!file.exists());
    }

    #[test]
    fn test_delete_folder_recursively() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("folder");
        write_bytes(&folder.join("a/b/c.bin"), 10);
        write_bytes(&folder.join("d.bin"), 10);

        let outcomes = delete_many(&[folder.clone()]);
        assert!(outcomes[0].success);
        assert!(!folder.exists());
    }

    #[test]
    fn test_descendant_processed_before_ancestor() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("A");
        let inner = folder.join("innerfile");
        write_bytes(&inner, 10);

        let outcomes = delete_many(&[folder.clone(), inner.clone()]);
        let order: Vec<_> = outcomes.iter().map(|o| o.path.clone()).collect();
        assert_eq!(order, vec![inner, folder.clone()]);
        assert!(outcomes.iter().all(|o| o.success));
        assert!(!folder.exists());
    }

    #[test]
    fn test_trailing_separator_does_not_change_order() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("A");
        let inner = folder.join("innerfile");
        write_bytes(&inner, 10);
        let folder_slash = PathBuf::from(format!("{}{}", folder.display(), MAIN_SEPARATOR));

        assert!(path_depth(&folder_slash) < path_depth(&inner));

        let outcomes = delete_many(&[folder_slash, inner.clone()]);
        assert_eq!(outcomes[0].path, inner);
        assert!(outcomes.iter().all(|o| o.success), "{:?}", outcomes);
        assert!(!folder.exists());
    }

    #[test]
    fn test_failure_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let keep_going = dir.path().join("ok.bin");
        let missing = dir.path().join("missing");
        let other = dir.path().join("dir");
        write_bytes(&keep_going, 1);
        write_bytes(&other.join("f"), 1);

        let outcomes = delete_many(&[missing.clone(), keep_going.clone(), other.clone()]);
        assert_eq!(outcomes.len(), 3);

        let failed = outcomes.iter().find(|o| o.path == missing).unwrap();
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("path does not exist"));

        assert!(!keep_going.exists());
        assert!(!other.exists());

        let summary = DeleteSummary::of(&outcomes);
        assert_eq!(summary, DeleteSummary { succeeded: 2, failed: 1 });
        assert!(summary.has_failures());
    }

    #[cfg(unix)]
    #[test]
    fn test_read_only_tree_is_removed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("locked");
        let file = folder.join("inner/f.bin");
        write_bytes(&file, 4);
        fs::set_permissions(&file, fs::Permissions::from_mode(0o444)).unwrap();
        fs::set_permissions(folder.join("inner"), fs::Permissions::from_mode(0o555)).unwrap();

        let outcomes = delete_many(&[folder.clone()]);
        assert!(outcomes[0].success, "{:?}", outcomes[0].error);
        assert!(!folder.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_failure_is_isolated() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        let stuck = locked.join("stuck.bin");
        let sibling = dir.path().join("sibling.bin");
        write_bytes(&stuck, 4);
        write_bytes(&sibling, 4);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits are not enforced for root.
        if fs::write(locked.join("canary"), b"x").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let outcomes = delete_many(&[stuck.clone(), sibling.clone()]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(outcomes.len(), 2);
        let failed = outcomes.iter().find(|o| o.path == stuck).unwrap();
        assert!(!failed.success);
        assert!(failed.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(stuck.exists());

        let removed = outcomes.iter().find(|o| o.path == sibling).unwrap();
        assert!(removed.success);
        assert!(!sibling.exists());
    }

    #[test]
    fn test_empty_batch() {
        assert!(delete_many(&[]).is_empty());
    }
}
