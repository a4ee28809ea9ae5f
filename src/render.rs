use crate::model::Groups;
use crate::node::{Node, NodeKind};
use crate::size::percentage;
use indextree::{Arena, NodeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One row of the rendered hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRow {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub kind: NodeKind,
    /// Share of the root total, in percent.
    pub percentage: f64,
    /// Nesting below the root-level rows (root-level rows are 0).
    pub depth: usize,
}

impl DisplayRow {
    fn from_node(node: &Node, root_size: u64, depth: usize) -> Self {
        Self {
            path: node.path.clone(),
            name: node.name.clone(),
            size: node.size,
            kind: node.kind,
            percentage: percentage(node.size, root_size),
            depth,
        }
    }
}

/// Ordered display hierarchy stored in an arena.
///
/// The arena root is synthetic and never yielded by [`DisplayTree::rows`].
pub struct DisplayTree {
    arena: Arena<DisplayRow>,
    root: NodeId,
    path_to_node: HashMap<PathBuf, NodeId>,
    root_size: u64,
}

impl DisplayTree {
    fn new(root_size: u64) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(DisplayRow {
            path: PathBuf::new(),
            name: String::new(),
            size: root_size,
            kind: NodeKind::Directory,
            percentage: 100.0,
            depth: 0,
        });
        Self {
            arena,
            root,
            path_to_node: HashMap::new(),
            root_size,
        }
    }

    fn append(&mut self, parent: NodeId, row: DisplayRow) -> NodeId {
        let path = row.path.clone();
        let node_id = self.arena.new_node(row);
        parent.append(node_id, &mut self.arena);
        self.path_to_node.insert(path, node_id);
        node_id
    }

    fn insert_group(&mut self, groups: &Groups<'_>, parent_key: Option<&Path>, parent_id: NodeId, depth: usize) {
        let Some(group) = groups.get(&parent_key.map(Path::to_path_buf)) else {
            return;
        };

        for node in group {
            let row = DisplayRow::from_node(node, self.root_size, depth);
            let node_id = self.append(parent_id, row);
            if node.is_dir() {
                self.insert_group(groups, Some(node.path.as_path()), node_id, depth + 1);
            }
        }
    }

    /// Rows in pre-order: every parent precedes its children.
    pub fn rows(&self) -> impl Iterator<Item = &DisplayRow> + '_ {
        self.root
            .descendants(&self.arena)
            .skip(1)
            .filter_map(|id| self.arena.get(id).map(|n| n.get()))
    }

    pub fn len(&self) -> usize {
        self.path_to_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_node.is_empty()
    }

    pub fn root_size(&self) -> u64 {
        self.root_size
    }

    pub fn get(&self, path: &Path) -> Option<&DisplayRow> {
        let id = self.path_to_node.get(path)?;
        self.arena.get(*id).map(|n| n.get())
    }

    /// Direct children of `path` in display order; `None` gives the root-level rows.
    pub fn children_of(&self, path: Option<&Path>) -> Vec<&DisplayRow> {
        let parent = match path {
            None => Some(self.root),
            Some(path) => self.path_to_node.get(path).copied(),
        };
        parent
            .map(|id| {
                id.children(&self.arena)
                    .filter_map(|child| self.arena.get(child).map(|n| n.get()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Assemble the display hierarchy from already-sorted sibling groups,
/// starting at the root-level group and descending through directories.
/// A node whose parent has no row is unreachable and not shown.
pub fn render(groups: &Groups<'_>, root_size: u64) -> DisplayTree {
    let mut tree = DisplayTree::new(root_size);
    let root = tree.root;
    tree.insert_group(groups, None, root, 0);
    tree
}
