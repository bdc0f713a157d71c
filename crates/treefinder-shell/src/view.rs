/// Flattened tree view.
///
/// The tree is rendered as a list of rows: every child of the root, and the
/// children of every expanded directory inline beneath it, one level of
/// indentation per depth.
use crate::format::format_cell;
use treefinder_core::model::{NodeIndex, ResourcePath, ResourceTree};
use treefinder_core::settings::ColumnSettings;

/// Maximum rows rendered for one listing.
///
/// A fully expanded large drive would otherwise print for minutes; collapse
/// directories to see deeper.
pub const MAX_VISIBLE_ROWS: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibleRow {
    /// Index into the tree arena.
    pub node_index: NodeIndex,
    /// Nesting depth (0 = directly under the root).
    pub depth: u16,
    /// Whether this directory is currently expanded (meaningless for files).
    pub is_expanded: bool,
}

/// Rows for the current expansion state, directories first at each level.
pub fn visible_rows(tree: &ResourceTree) -> Vec<VisibleRow> {
    let mut rows = Vec::new();
    for child in tree.sorted_children(tree.root()) {
        push_rows(tree, child, 0, &mut rows);
    }
    rows
}

fn push_rows(tree: &ResourceTree, index: NodeIndex, depth: u16, rows: &mut Vec<VisibleRow>) {
    if rows.len() >= MAX_VISIBLE_ROWS {
        return;
    }
    let Some(node) = tree.node(index) else {
        return;
    };
    let is_expanded = node.expanded && node.resource.is_dir();
    rows.push(VisibleRow {
        node_index: index,
        depth,
        is_expanded,
    });
    if is_expanded {
        for child in tree.sorted_children(index) {
            push_rows(tree, child, depth + 1, rows);
        }
    }
}

/// Render rows as text, one line each, with the visible columns.
///
/// Selected rows are marked with `*`. Directories show `▾` when expanded,
/// `▸` otherwise.
pub fn render(
    tree: &ResourceTree,
    rows: &[VisibleRow],
    columns: &ColumnSettings,
    selected: &[ResourcePath],
) -> String {
    let labels: Vec<String> = rows
        .iter()
        .filter_map(|row| {
            let resource = &tree.node(row.node_index)?.resource;
            let glyph = match (resource.is_dir(), row.is_expanded) {
                (true, true) => "▾ ",
                (true, false) => "▸ ",
                (false, _) => "  ",
            };
            let suffix = if resource.is_dir() { "/" } else { "" };
            Some(format!(
                "{}{}{}{}",
                "  ".repeat(row.depth as usize),
                glyph,
                resource.name(),
                suffix
            ))
        })
        .collect();
    let width = labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let visible = columns.visible();
    let mut out = String::new();
    if !visible.is_empty() {
        let header: Vec<String> = visible.iter().map(|c| format!("{:>16}", c.title())).collect();
        out.push_str(&format!("  {:<width$}{}\n", "Name", header.join("")));
    }

    for (row, label) in rows.iter().zip(labels) {
        let Some(node) = tree.node(row.node_index) else {
            continue;
        };
        let marker = if selected.contains(&node.resource.path) {
            '*'
        } else {
            ' '
        };
        let cells: String = visible
            .iter()
            .map(|&c| format!("{:>16}", format_cell(c, &node.resource)))
            .collect();
        let pad = width.saturating_sub(label.chars().count());
        out.push_str(&format!("{marker} {label}{}{cells}\n", " ".repeat(pad)));
    }
    if rows.len() >= MAX_VISIBLE_ROWS {
        out.push_str(&format!("… output capped at {MAX_VISIBLE_ROWS} rows\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use treefinder_core::model::{DriveId, Resource};
    use treefinder_core::settings::Column;

    fn tree() -> ResourceTree {
        let drive = DriveId::root();
        let mut tree = ResourceTree::new(drive.clone());
        tree.merge_children(
            &ResourcePath::root(),
            vec![
                Resource::file(drive.clone(), ResourcePath::parse("z.txt")),
                Resource::dir(drive.clone(), ResourcePath::parse("docs")),
            ],
        );
        tree.merge_children(
            &ResourcePath::parse("docs"),
            vec![Resource::file(drive, ResourcePath::parse("docs/a.md"))],
        );
        tree
    }

    #[test]
    fn test_collapsed_directories_hide_children() {
        let tree = tree();
        let rows = visible_rows(&tree);
        assert_eq!(rows.len(), 2);
        assert_eq!(tree.node(rows[0].node_index).unwrap().resource.name(), "docs");
        assert!(!rows[0].is_expanded);
    }

    #[test]
    fn test_expanded_directories_inline() {
        let mut tree = tree();
        tree.set_expanded(&ResourcePath::parse("docs"), true);
        let rows = visible_rows(&tree);
        let depths: Vec<u16> = rows.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 1, 0]);
    }

    #[test]
    fn test_render_marks_selection() {
        let mut tree = tree();
        tree.set_expanded(&ResourcePath::parse("docs"), true);
        let rows = visible_rows(&tree);
        let mut columns = ColumnSettings::default();
        columns.toggle(Column::Size);

        let text = render(&tree, &rows, &columns, &[ResourcePath::parse("docs/a.md")]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("  ▾ docs/"));
        assert!(lines[1].starts_with("*     a.md"));
        assert!(lines[2].starts_with("    z.txt"));
    }

    #[test]
    fn test_render_header_with_columns() {
        let tree = tree();
        let rows = visible_rows(&tree);
        let text = render(&tree, &rows, &ColumnSettings::default(), &[]);
        assert!(text.lines().next().unwrap().contains("Size"));
    }
}
