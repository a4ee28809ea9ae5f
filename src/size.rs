use crate::error::SizeParseError;
use jwalk::WalkDir;
use log::trace;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Total byte size of `path`.
///
/// A regular file reports its own length; a directory reports the sum of every
/// file below it. Entries that cannot be stat'd count as zero and a path that
/// vanished before measurement yields 0.
///
/// A symlink to a file counts as the target's length. Symlinks to directories
/// are never descended into, so their contents add nothing and link cycles
/// cannot make the walk loop.
pub fn compute_size<P: AsRef<Path>>(path: P) -> u64 {
    let path = path.as_ref();
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) => {
            trace!("size: cannot stat {}: {}", path.display(), err);
            return 0;
        }
    };

    if metadata.is_file() {
        return metadata.len();
    }
    if metadata.file_type().is_symlink() {
        return linked_file_len(path);
    }
    if !metadata.is_dir() {
        return 0;
    }

    WalkDir::new(path)
        .skip_hidden(false)
        .follow_links(false)
        .parallelism(jwalk::Parallelism::Serial)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                trace!("size: skipping unreadable entry: {}", err);
                None
            }
        })
        .map(|entry| {
            let file_type = entry.file_type();
            if file_type.is_file() {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            } else if file_type.is_symlink() {
                linked_file_len(&entry.path())
            } else {
                0
            }
        })
        .sum()
}

/// Length of the file a symlink points to. Links to directories and
/// dangling links count as zero.
fn linked_file_len(path: &Path) -> u64 {
    match fs::metadata(path) {
        Ok(target) if target.is_file() => target.len(),
        _ => 0,
    }
}

/// Combined size of a selection, measured in parallel.
pub fn total_size(paths: &[PathBuf]) -> u64 {
    paths.par_iter().map(compute_size).sum()
}

/// Share of `root_total` taken by `size`, in percent. Zero when the total is zero.
pub fn percentage(size: u64, root_total: u64) -> f64 {
    if root_total == 0 {
        0.0
    } else {
        size as f64 / root_total as f64 * 100.0
    }
}

pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    if size == 0 {
        return "0 B".to_string();
    }
    let mut value = size as f64;
    let mut unit_index = 0;
    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }
    format!("{:.2} {}", value, UNITS[unit_index])
}

/// Parse human-readable sizes such as `"0"`, `"512"`, `"100MB"` or `"1.5 GB"`.
///
/// Units are binary and case-insensitive; a bare number is bytes.
pub fn parse_size(text: &str) -> Result<u64, SizeParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SizeParseError::Empty);
    }

    let num_end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let (num_str, unit_str) = text.split_at(num_end);
    let number: f64 = num_str
        .parse()
        .map_err(|_| SizeParseError::InvalidNumber(num_str.to_string()))?;

    let unit = unit_str.trim().to_uppercase();
    let multiplier: u64 = match unit.as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        "TB" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(SizeParseError::UnknownUnit(unit)),
    };

    Ok((number * multiplier as f64) as u64)
}
