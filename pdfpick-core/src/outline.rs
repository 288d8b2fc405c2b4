use tracing::warn;

use crate::{DocumentBackend, OutlineEntry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub title: String,
    /// Target as reported by the document; may be out of range.
    pub target_page: i64,
    pub depth: usize,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    fn from_entry(entry: OutlineEntry, depth: usize) -> Self {
        Self {
            title: entry.title,
            target_page: entry.target_page,
            depth,
            children: entry
                .children
                .into_iter()
                .map(|child| OutlineNode::from_entry(child, depth + 1))
                .collect(),
        }
    }
}

/// Table of contents, read-only once built.
#[derive(Debug, Clone, Default)]
pub struct OutlineTree {
    roots: Vec<OutlineNode>,
    page_count: usize,
}

impl OutlineTree {
    /// An adapter failure yields an empty tree; a document without an
    /// outline is not an error either.
    pub fn build(backend: &dyn DocumentBackend) -> Self {
        let page_count = backend.info().page_count;
        let entries = match backend.outline() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    ?err,
                    path = %backend.info().path.display(),
                    "failed to read document outline"
                );
                Vec::new()
            }
        };
        Self::from_entries(entries, page_count)
    }

    pub fn from_entries(entries: Vec<OutlineEntry>, page_count: usize) -> Self {
        Self {
            roots: entries
                .into_iter()
                .map(|entry| OutlineNode::from_entry(entry, 0))
                .collect(),
            page_count,
        }
    }

    pub fn roots(&self) -> &[OutlineNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Clamps the node's target into `[0, page_count - 1]`.
    pub fn resolve_target(&self, node: &OutlineNode) -> usize {
        let last = self.page_count.saturating_sub(1) as i64;
        node.target_page.clamp(0, last) as usize
    }

    /// Depth-first listing of every node.
    pub fn flatten(&self) -> Vec<&OutlineNode> {
        let mut out = Vec::new();
        for root in &self.roots {
            collect(root, &mut out);
        }
        out
    }

    /// Rows for a navigation list: the outline when there is one, otherwise
    /// one `Page N` row per page.
    pub fn navigation_entries(&self) -> Vec<NavigationEntry> {
        if self.roots.is_empty() {
            return (0..self.page_count)
                .map(|page| NavigationEntry {
                    title: format!("Page {}", page + 1),
                    depth: 0,
                    page_index: page,
                })
                .collect();
        }
        self.flatten()
            .into_iter()
            .map(|node| NavigationEntry {
                title: node.title.clone(),
                depth: node.depth,
                page_index: self.resolve_target(node),
            })
            .collect()
    }
}

fn collect<'a>(node: &'a OutlineNode, out: &mut Vec<&'a OutlineNode>) {
    out.push(node);
    for child in &node.children {
        collect(child, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEntry {
    pub title: String,
    pub depth: usize,
    pub page_index: usize,
}
