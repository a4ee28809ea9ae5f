use crate::node::{Node, NodeKind};
use crate::render::{DisplayRow, DisplayTree};
use crate::size::format_size;
use std::fmt::Write as _;
use std::io;

const DIR_ICON: &str = "📁";
const FILE_ICON: &str = "📄";

fn icon(is_file: bool) -> &'static str {
    if is_file {
        FILE_ICON
    } else {
        DIR_ICON
    }
}

/// Tabular dump of `nodes` in the order given.
pub fn write_csv<W: io::Write>(writer: W, nodes: &[Node]) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["path", "name", "size_bytes", "size", "kind"])?;
    for node in nodes {
        let path = node.path.to_string_lossy();
        let size_bytes = node.size.to_string();
        let size = format_size(node.size);
        let kind = if node.is_file() { "file" } else { "dir" };
        out.write_record([&*path, node.name.as_str(), size_bytes.as_str(), size.as_str(), kind])?;
    }
    out.flush()?;
    Ok(())
}

/// One line per node, indented by scan level.
pub fn text_dump(nodes: &[Node]) -> String {
    let mut text = String::new();
    for node in nodes {
        let _ = writeln!(
            text,
            "{}{} {} - {}",
            "  ".repeat(node.level),
            icon(node.is_file()),
            node.name,
            format_size(node.size)
        );
    }
    text
}

/// The sorted, filtered view as an indented listing with size and share columns.
/// `label` supplies the text shown for each row's name.
pub fn render_text<F>(tree: &DisplayTree, mut label: F) -> String
where
    F: FnMut(&DisplayRow) -> String,
{
    let mut text = String::new();
    for row in tree.rows() {
        let name = format!(
            "{}{} {}",
            "  ".repeat(row.depth),
            icon(row.kind == NodeKind::File),
            label(row)
        );
        let _ = writeln!(
            text,
            "{:<60} {:>12} {:>6.1}%",
            name,
            format_size(row.size),
            row.percentage
        );
    }
    text
}
