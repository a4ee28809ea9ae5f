use crate::error::ScanError;
use crate::node::{Node, NodeKind, ScanResult};
use crate::size::compute_size;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const PROGRESS_EMIT_INTERVAL_MS: u64 = 100;

/// How many directory levels below the root get listed as nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DepthRepr", into = "DepthRepr")]
pub enum Depth {
    Limited(NonZeroUsize),
    Unlimited,
}

impl Depth {
    pub fn levels(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Depth::Limited)
    }

    /// Whether nodes at `level` (0 = children of the root) are listed.
    pub fn lists_level(&self, level: usize) -> bool {
        match self {
            Depth::Limited(max) => level < max.get(),
            Depth::Unlimited => true,
        }
    }
}

impl Default for Depth {
    fn default() -> Self {
        Depth::Limited(NonZeroUsize::MIN)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Limited(n) => write!(f, "{}", n),
            Depth::Unlimited => f.write_str("unlimited"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DepthRepr {
    Levels(usize),
    Word(String),
}

impl TryFrom<DepthRepr> for Depth {
    type Error = String;

    fn try_from(repr: DepthRepr) -> Result<Self, Self::Error> {
        match repr {
            DepthRepr::Levels(n) => {
                Depth::levels(n).ok_or_else(|| "max_depth must be at least 1".to_string())
            }
            DepthRepr::Word(word) if word.eq_ignore_ascii_case("unlimited") => Ok(Depth::Unlimited),
            DepthRepr::Word(word) => Err(format!(
                "max_depth must be a positive integer or \"unlimited\", got {:?}",
                word
            )),
        }
    }
}

impl From<Depth> for DepthRepr {
    fn from(depth: Depth) -> Self {
        match depth {
            Depth::Limited(n) => DepthRepr::Levels(n.get()),
            Depth::Unlimited => DepthRepr::Word("unlimited".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub max_depth: Depth,
    pub include_files: bool,
}

#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub current_dir: PathBuf,
    pub visited_dirs: u64,
    pub emitted_nodes: u64,
}

pub type ProgressReporter = Arc<dyn Fn(ScanProgress) + Send + Sync>;

/// One immediate child of a directory being listed.
struct ListedEntry {
    path: PathBuf,
    name: String,
    kind: NodeKind,
    file_len: u64,
}

/// A directory still waiting to be listed.
struct PendingDir {
    path: PathBuf,
    /// Level assigned to this directory's children.
    child_level: usize,
    parent: Option<PathBuf>,
}

/// Breadth-first, depth-limited directory walker producing a flat node list.
pub struct TreeScanner {
    options: ScanOptions,
}

impl TreeScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    pub fn scan<P: AsRef<Path>>(&self, root: P) -> Result<ScanResult, ScanError> {
        self.scan_with_progress(root, None)
    }

    /// Walk `root` and list its entries down to the configured depth.
    ///
    /// Only problems with the root itself are returned as errors; a
    /// subdirectory that cannot be listed is left out together with its
    /// subtree.
    pub fn scan_with_progress<P: AsRef<Path>>(
        &self,
        root: P,
        reporter: Option<ProgressReporter>,
    ) -> Result<ScanResult, ScanError> {
        let root = root.as_ref().to_path_buf();
        let start = Instant::now();

        let metadata = fs::metadata(&root).map_err(|err| Self::root_error(&root, err))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root));
        }
        let root_listing = Self::list_dir(&root).map_err(|err| Self::root_error(&root, err))?;

        info!(
            "scan start: root={} depth={} include_files={}",
            root.display(),
            self.options.max_depth,
            self.options.include_files
        );

        let root_size = compute_size(&root);

        let mut nodes = Vec::new();
        let mut visited_dirs = 0u64;
        let mut last_emit = Instant::now();
        let mut queue = VecDeque::new();
        queue.push_back(PendingDir {
            path: root.clone(),
            child_level: 0,
            parent: None,
        });
        let mut root_listing = Some(root_listing);

        while let Some(dir) = queue.pop_front() {
            let listing = match root_listing.take() {
                Some(listing) => listing,
                None => match Self::list_dir(&dir.path) {
                    Ok(listing) => listing,
                    Err(err) => {
                        debug!("skipping unreadable directory {}: {}", dir.path.display(), err);
                        continue;
                    }
                },
            };
            visited_dirs += 1;

            let descend = self.options.max_depth.lists_level(dir.child_level + 1);

            for entry in listing.iter().filter(|e| e.kind == NodeKind::Directory) {
                nodes.push(Node {
                    path: entry.path.clone(),
                    name: entry.name.clone(),
                    size: compute_size(&entry.path),
                    kind: NodeKind::Directory,
                    level: dir.child_level,
                    parent: dir.parent.clone(),
                });
                if descend {
                    queue.push_back(PendingDir {
                        path: entry.path.clone(),
                        child_level: dir.child_level + 1,
                        parent: Some(entry.path.clone()),
                    });
                }
            }

            if self.options.include_files {
                for entry in listing.into_iter().filter(|e| e.kind == NodeKind::File) {
                    nodes.push(Node {
                        path: entry.path,
                        name: entry.name,
                        size: entry.file_len,
                        kind: NodeKind::File,
                        level: dir.child_level,
                        parent: dir.parent.clone(),
                    });
                }
            }

            if let Some(cb) = reporter.as_ref() {
                if last_emit.elapsed().as_millis() as u64 >= PROGRESS_EMIT_INTERVAL_MS {
                    last_emit = Instant::now();
                    cb(ScanProgress {
                        current_dir: dir.path,
                        visited_dirs,
                        emitted_nodes: nodes.len() as u64,
                    });
                }
            }
        }

        if let Some(cb) = reporter.as_ref() {
            cb(ScanProgress {
                current_dir: root.clone(),
                visited_dirs,
                emitted_nodes: nodes.len() as u64,
            });
        }

        let duration_ms = start.elapsed().as_millis();
        info!(
            "scan done: root={} nodes={} total={} bytes in {}ms",
            root.display(),
            nodes.len(),
            root_size,
            duration_ms
        );

        Ok(ScanResult {
            root,
            root_size,
            nodes,
            duration_ms,
        })
    }

    fn root_error(root: &Path, err: io::Error) -> ScanError {
        if err.kind() == io::ErrorKind::NotFound {
            ScanError::RootNotFound(root.to_path_buf())
        } else {
            ScanError::RootUnreadable {
                path: root.to_path_buf(),
                source: err,
            }
        }
    }

    /// Immediate subdirectories and files of `dir`, sorted by name.
    /// Directory symlinks and special files are left out.
    fn list_dir(dir: &Path) -> io::Result<Vec<ListedEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    trace!("cannot read entry in {}: {}", dir.display(), err);
                    continue;
                }
            };
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    trace!("cannot stat {}: {}", entry.path().display(), err);
                    continue;
                }
            };

            let (kind, file_len) = if file_type.is_dir() {
                (NodeKind::Directory, 0)
            } else if file_type.is_file() {
                match entry.metadata() {
                    Ok(metadata) => (NodeKind::File, metadata.len()),
                    Err(err) => {
                        trace!("cannot stat {}: {}", entry.path().display(), err);
                        continue;
                    }
                }
            } else if file_type.is_symlink() {
                // Linked files list with the target's length; linked
                // directories are not followed.
                match fs::metadata(entry.path()) {
                    Ok(target) if target.is_file() => (NodeKind::File, target.len()),
                    _ => continue,
                }
            } else {
                continue;
            };

            entries.push(ListedEntry {
                path: entry.path(),
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
                file_len,
            });
        }
        entries.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
        Ok(entries)
    }
}

/// Scan `root` with the given depth limit and file listing switch.
pub fn scan<P: AsRef<Path>>(
    root: P,
    max_depth: Depth,
    include_files: bool,
) -> Result<ScanResult, ScanError> {
    TreeScanner::new(ScanOptions {
        max_depth,
        include_files,
    })
    .scan(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write_bytes(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![1u8; len]).unwrap();
    }

    /// root/A/{a1 3000, a2 5000}, root/B/b1 2000
    fn sample_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("A/a1"), 3000);
        write_bytes(&dir.path().join("A/a2"), 5000);
        write_bytes(&dir.path().join("B/b1"), 2000);
        dir
    }

    fn depth(n: usize) -> Depth {
        Depth::levels(n).unwrap()
    }

    #[test]
    fn test_depth_one_lists_top_level_dirs() {
        let dir = sample_tree();
        let result = scan(dir.path(), depth(1), false).unwrap();

        assert_eq!(result.root_size, 10000);
        assert_eq!(result.nodes.len(), 2);

        let a = &result.nodes[0];
        assert_eq!(a.name, "A");
        assert_eq!(a.size, 8000);
        assert_eq!(a.level, 0);
        assert_eq!(a.parent, None);
        assert!(a.is_dir());

        let b = &result.nodes[1];
        assert_eq!(b.name, "B");
        assert_eq!(b.size, 2000);
        assert_eq!(b.parent, None);
    }

    #[test]
    fn test_include_files_lists_files_after_dirs() {
        let dir = sample_tree();
        write_bytes(&dir.path().join("top.txt"), 7);
        let result = scan(dir.path(), depth(2), true).unwrap();

        let names: Vec<_> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "top.txt", "a1", "a2", "b1"]);

        let a1 = result.get(&dir.path().join("A/a1")).unwrap();
        assert!(a1.is_file());
        assert_eq!(a1.level, 1);
        assert_eq!(a1.parent.as_deref(), Some(dir.path().join("A").as_path()));
        assert_eq!(a1.size, 3000);
        assert!(result.is_well_formed());
    }

    #[test]
    fn test_depth_limit_keeps_full_sizes() {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("a/b/c/d/deep.bin"), 400);
        write_bytes(&dir.path().join("a/shallow.bin"), 100);

        let result = scan(dir.path(), depth(2), false).unwrap();
        let levels: Vec<_> = result.nodes.iter().map(|n| (n.name.as_str(), n.level)).collect();
        assert_eq!(levels, vec![("a", 0), ("b", 1)]);

        let b = result.get(&dir.path().join("a/b")).unwrap();
        assert_eq!(b.size, 400);
        assert_eq!(result.root_size, 500);
    }

    #[test]
    fn test_unlimited_depth_walks_everything() {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("a/b/c/d/deep.bin"), 400);

        let result = scan(dir.path(), Depth::Unlimited, true).unwrap();
        let levels: Vec<_> = result.nodes.iter().map(|n| (n.name.as_str(), n.level)).collect();
        assert_eq!(
            levels,
            vec![("a", 0), ("b", 1), ("c", 2), ("d", 3), ("deep.bin", 4)]
        );
        assert!(result.nodes.iter().all(|n| n.size == 400));
        assert!(result.is_well_formed());
    }

    #[test]
    fn test_breadth_first_order() {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("a/a1/f"), 1);
        write_bytes(&dir.path().join("b/b1/f"), 1);

        let result = scan(dir.path(), depth(2), false).unwrap();
        let names: Vec<_> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "a1", "b1"]);
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = scan(dir.path().join("nope"), depth(1), false).unwrap_err();
        assert!(matches!(err, ScanError::RootNotFound(_)));
    }

    #[test]
    fn test_file_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f");
        write_bytes(&file, 3);
        let err = scan(&file, depth(1), false).unwrap_err();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("open/f"), 10);
        write_bytes(&dir.path().join("open/sub/g"), 20);
        let locked = dir.path().join("locked");
        write_bytes(&locked.join("h"), 30);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits are not enforced for root.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = scan(dir.path(), Depth::Unlimited, true);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        let result = result.unwrap();

        assert!(result.get(&locked).is_some_and(|node| node.is_dir()));
        assert!(!result.nodes.iter().any(|node| node.path.starts_with(&locked) && node.path != locked));

        for path in ["open", "open/f", "open/sub", "open/sub/g"] {
            assert!(result.get(&dir.path().join(path)).is_some(), "missing {}", path);
        }
        assert_eq!(result.get(&dir.path().join("open")).unwrap().size, 30);
        assert!(result.is_well_formed());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_symlink_listed_directory_symlink_skipped() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write_bytes(&outside.path().join("target.bin"), 100);
        write_bytes(&outside.path().join("sub/inner.bin"), 40);
        symlink(outside.path().join("target.bin"), dir.path().join("file_link")).unwrap();
        symlink(outside.path().join("sub"), dir.path().join("dir_link")).unwrap();

        let result = scan(dir.path(), Depth::Unlimited, true).unwrap();
        let names: Vec<_> = result.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["file_link"]);
        assert!(result.nodes[0].is_file());
        assert_eq!(result.nodes[0].size, 100);
        assert_eq!(result.root_size, 100);
    }

    #[test]
    fn test_empty_root() {
        let dir = TempDir::new().unwrap();
        let result = scan(dir.path(), Depth::Unlimited, true).unwrap();
        assert!(result.nodes.is_empty());
        assert_eq!(result.root_size, 0);
    }

    #[test]
    fn test_progress_reports_final_event() {
        let dir = sample_tree();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter: ProgressReporter = Arc::new(move |p: ScanProgress| {
            sink.lock().unwrap().push(p);
        });

        let scanner = TreeScanner::new(ScanOptions {
            max_depth: Depth::Unlimited,
            include_files: false,
        });
        scanner.scan_with_progress(dir.path(), Some(reporter)).unwrap();

        let events = events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.visited_dirs, 3);
        assert_eq!(last.emitted_nodes, 2);
    }

    #[test]
    fn test_depth_serde() {
        #[derive(Deserialize, Serialize)]
        struct Wrapper {
            depth: Depth,
        }

        let w: Wrapper = toml::from_str("depth = 2").unwrap();
        assert_eq!(w.depth, depth(2));
        let w: Wrapper = toml::from_str("depth = \"unlimited\"").unwrap();
        assert_eq!(w.depth, Depth::Unlimited);
        assert!(toml::from_str::<Wrapper>("depth = 0").is_err());
        assert!(toml::from_str::<Wrapper>("depth = \"deep\"").is_err());

        let text = toml::to_string(&Wrapper { depth: Depth::Unlimited }).unwrap();
        assert!(text.contains("unlimited"));
    }
}
