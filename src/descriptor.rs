//! Sidecar descriptor files kept next to scanned directories.
//!
//! Descriptors only feed display metadata (a title, an external reference).
//! Sizes never depend on them.

use crate::node::{Node, NodeKind};
use dashmap::DashMap;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DESCRIPTOR_FILE: &str = "project.json";

const WORKSHOP_URL: &str = "https://steamcommunity.com/sharedfiles/filedetails/?id=";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Descriptor {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: ContentType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "workshopid", default, deserialize_with = "string_or_number")]
    pub workshop_id: String,
}

/// Kind of content a descriptor declares in its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum ContentType {
    Scene,
    Video,
    Web,
    Application,
    #[default]
    Unknown,
}

impl From<&str> for ContentType {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "scene" => ContentType::Scene,
            "video" => ContentType::Video,
            "web" => ContentType::Web,
            "application" | "app" => ContentType::Application,
            _ => ContentType::Unknown,
        }
    }
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl ContentType {
    pub fn icon(self) -> &'static str {
        match self {
            ContentType::Scene => "🖼️",
            ContentType::Video => "🎬",
            ContentType::Web => "🌐",
            ContentType::Application => "⚙️",
            ContentType::Unknown => "❓",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContentType::Scene => "scene",
            ContentType::Video => "video",
            ContentType::Web => "web",
            ContentType::Application => "application",
            ContentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_title() -> String {
    "Untitled".to_string()
}

/// Workshop ids show up both as JSON strings and as bare numbers.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(n) => n.to_string(),
    })
}

impl Descriptor {
    pub fn workshop_url(&self) -> Option<String> {
        if self.workshop_id.is_empty() {
            None
        } else {
            Some(workshop_url(&self.workshop_id))
        }
    }
}

pub fn workshop_url(id: &str) -> String {
    format!("{}{}", WORKSHOP_URL, id)
}

/// Read `dir/<file_name>`. Missing or malformed files give `None`.
pub fn read_descriptor_named(dir: &Path, file_name: &str) -> Option<Descriptor> {
    let path = dir.join(file_name);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(descriptor) => Some(descriptor),
        Err(err) => {
            debug!("ignoring malformed descriptor {}: {}", path.display(), err);
            None
        }
    }
}

pub fn read_descriptor(dir: &Path) -> Option<Descriptor> {
    read_descriptor_named(dir, DESCRIPTOR_FILE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Video,
    Gif,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub path: PathBuf,
    pub kind: PreviewKind,
}

/// First preview file present in `dir`, by priority.
pub fn find_preview(dir: &Path) -> Option<Preview> {
    const CANDIDATES: [(&str, PreviewKind); 5] = [
        ("preview.mp4", PreviewKind::Video),
        ("preview.gif", PreviewKind::Gif),
        ("preview.jpg", PreviewKind::Image),
        ("preview.png", PreviewKind::Image),
        ("preview.jpeg", PreviewKind::Image),
    ];

    CANDIDATES.iter().find_map(|(name, kind)| {
        let path = dir.join(name);
        path.is_file().then_some(Preview { path, kind: *kind })
    })
}

/// `"<name> - <title>"` for directories with a descriptor, the bare name otherwise.
pub fn display_name(name: &str, kind: NodeKind, descriptor: Option<&Descriptor>) -> String {
    match descriptor {
        Some(descriptor) if kind == NodeKind::Directory && !descriptor.title.is_empty() => {
            format!("{} - {}", name, descriptor.title)
        }
        _ => name.to_string(),
    }
}

/// Memoized descriptor lookups, safe to fill from several threads.
pub struct DescriptorCache {
    file_name: String,
    entries: DashMap<PathBuf, Option<Descriptor>>,
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new(DESCRIPTOR_FILE)
    }
}

impl DescriptorCache {
    pub fn new(file_name: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, dir: &Path) -> Option<Descriptor> {
        if let Some(entry) = self.entries.get(dir) {
            return entry.value().clone();
        }
        let descriptor = read_descriptor_named(dir, &self.file_name);
        self.entries.insert(dir.to_path_buf(), descriptor.clone());
        descriptor
    }

    /// Load descriptors for every directory node in parallel.
    pub fn prefetch(&self, nodes: &[Node]) {
        nodes
            .par_iter()
            .filter(|node| node.is_dir())
            .for_each(|node| {
                self.get(&node.path);
            });
    }

    /// Whether `node` is a directory whose descriptor declares `kind`.
    pub fn has_type(&self, node: &Node, kind: ContentType) -> bool {
        node.is_dir() && self.get(&node.path).is_some_and(|d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Directories whose descriptor declares `kind`, in input order. Files never match.
pub fn filter_by_type<'a>(nodes: &[&'a Node], kind: ContentType, cache: &DescriptorCache) -> Vec<&'a Node> {
    nodes
        .iter()
        .copied()
        .filter(|node| cache.has_type(node, kind))
        .collect()
}
