use crate::node::{Node, ScanResult};
use crate::render::{render, DisplayTree};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Name,
    #[default]
    Size,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub key: SortKey,
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            key: SortKey::Size,
            descending: true,
        }
    }
}

/// Sibling groups keyed by parent path; `None` holds the root-level nodes.
pub type Groups<'a> = HashMap<Option<PathBuf>, Vec<&'a Node>>;

/// Owns the current scan and the view settings applied to it.
#[derive(Debug, Default)]
pub struct ResultModel {
    current: Option<Arc<ScanResult>>,
    sort: SortSpec,
    min_size: u64,
}

impl ResultModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly built scan; the previous one is dropped whole.
    pub fn replace(&mut self, result: ScanResult) {
        self.current = Some(Arc::new(result));
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Snapshot handle; stays valid even if the model is replaced later.
    pub fn current(&self) -> Option<Arc<ScanResult>> {
        self.current.clone()
    }

    pub fn root_size(&self) -> u64 {
        self.current.as_ref().map(|r| r.root_size).unwrap_or(0)
    }

    pub fn sort_spec(&self) -> SortSpec {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortSpec) {
        self.sort = sort;
    }

    /// Same key flips the direction; a new key starts descending.
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.sort.key == key {
            self.sort.descending = !self.sort.descending;
        } else {
            self.sort = SortSpec {
                key,
                descending: true,
            };
        }
    }

    pub fn min_size(&self) -> u64 {
        self.min_size
    }

    pub fn set_min_size(&mut self, min_size: u64) {
        self.min_size = min_size;
    }

    /// Nodes of at least `min_bytes`, in discovery order.
    pub fn filter(&self, min_bytes: u64) -> Vec<&Node> {
        self.current
            .as_deref()
            .map(|result| filter_nodes(&result.nodes, min_bytes))
            .unwrap_or_default()
    }

    /// Filtered, grouped and sorted display tree for the current settings.
    pub fn view(&self) -> DisplayTree {
        let root_size = self.root_size();
        let filtered = self.filter(self.min_size);
        let mut groups = group_by_parent(&filtered);
        for group in groups.values_mut() {
            sort_group(group, self.sort.key, self.sort.descending, root_size);
        }
        render(&groups, root_size)
    }

    /// Nodes that pass the size filter and `keep`, sorted as a single flat
    /// list with no nesting.
    pub fn view_where<F: Fn(&Node) -> bool>(&self, keep: F) -> DisplayTree {
        let root_size = self.root_size();
        let mut matches: Vec<&Node> = self
            .filter(self.min_size)
            .into_iter()
            .filter(|node| keep(node))
            .collect();
        sort_group(&mut matches, self.sort.key, self.sort.descending, root_size);

        let mut groups = Groups::new();
        groups.insert(None, matches);
        render(&groups, root_size)
    }
}

pub fn filter_nodes(nodes: &[Node], min_bytes: u64) -> Vec<&Node> {
    nodes.iter().filter(|node| node.size >= min_bytes).collect()
}

/// Bucket nodes by their `parent` field, keeping discovery order in each bucket.
pub fn group_by_parent<'a>(nodes: &[&'a Node]) -> Groups<'a> {
    let mut groups: Groups<'a> = HashMap::new();
    for &node in nodes {
        groups.entry(node.parent.clone()).or_default().push(node);
    }
    groups
}

/// Sort one sibling group in place. The sort is stable: equal keys keep
/// their discovery order in both directions.
pub fn sort_group(nodes: &mut [&Node], key: SortKey, descending: bool, root_size: u64) {
    nodes.sort_by(|a, b| {
        let ordering = compare(a, b, key, root_size);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

fn compare(a: &Node, b: &Node, key: SortKey, root_size: u64) -> Ordering {
    match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Size => a.size.cmp(&b.size),
        SortKey::Percentage => share(a.size, root_size).total_cmp(&share(b.size, root_size)),
    }
}

fn share(size: u64, root_size: u64) -> f64 {
    if root_size == 0 {
        0.0
    } else {
        size as f64 / root_size as f64
    }
}
