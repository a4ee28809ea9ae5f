//! Disk-usage aggregation engine: depth-limited scans with full recursive
//! sizes, sortable per-sibling views, and dependency-ordered bulk deletion.

pub mod config;
pub mod crawler;
pub mod deletion;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod model;
pub mod node;
pub mod render;
pub mod size;
pub mod worker;

pub use crawler::{scan, Depth, ScanOptions, TreeScanner};
pub use deletion::{delete_many, DeleteSummary, Outcome};
pub use error::ScanError;
pub use model::{ResultModel, SortKey, SortSpec};
pub use node::{Node, NodeKind, ScanResult};
pub use size::compute_size;
pub use worker::ScanWorker;
