use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// One filesystem entry surfaced by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub path: PathBuf,
    pub name: String,
    /// Total bytes at scan time. For directories this is the full recursive
    /// size, even when the depth limit hides their children.
    pub size: u64,
    pub kind: NodeKind,
    /// Depth relative to the scan root; immediate children are level 0.
    pub level: usize,
    /// Containing directory, `None` for immediate children of the root.
    pub parent: Option<PathBuf>,
}

impl Node {
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Output of one scan. Built once, never patched in place.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub root: PathBuf,
    /// Full recursive size of the root, independent of the depth limit.
    pub root_size: u64,
    /// Nodes in discovery order.
    pub nodes: Vec<Node>,
    pub duration_ms: u128,
}

impl ScanResult {
    pub fn get(&self, path: &Path) -> Option<&Node> {
        self.nodes.iter().find(|node| node.path == path)
    }

    /// Every non-root-level parent must name a directory node in this result.
    pub fn is_well_formed(&self) -> bool {
        self.nodes.iter().all(|node| match node.parent.as_deref() {
            None => true,
            Some(parent) => {
                self.nodes
                    .iter()
                    .filter(|other| other.path == parent && other.is_dir())
                    .count()
                    == 1
            }
        })
    }
}
