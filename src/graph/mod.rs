//! Revision DAG construction and level assignment.
//!
//! Builds an arena-backed graph over the parsed rows: nodes hold indices,
//! never owning pointers. Declared parent change-ids resolve to existing
//! rows; unresolved parents (outside the fetched window) are dropped
//! silently. When the forest has several roots they are chained with
//! synthetic [`EdgeKind::Indirect`] edges, in list order, so one traversal
//! from the last root reaches every node — a rendering device, not an
//! ancestry claim.
//!
//! Traversal is deterministic: a node's outgoing edges order strictly as
//! `Direct` before `Indirect`, ties broken by target row index ascending.
//! The same input therefore always yields the same layout.

use crate::model::Row;
use std::collections::HashMap;

/// Edge classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Real parent -> child ancestry reported by the log.
    Direct,
    /// Synthetic root-chaining edge, rendering-only.
    Indirect,
}

/// A parent -> child edge. `to` is an arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Target node (= row) index.
    pub to: usize,
    /// Edge classification.
    pub kind: EdgeKind,
}

/// One node of the graph; `row` doubles as the arena index.
#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    /// Indices of resolved parent nodes (back-references, non-owning).
    pub parents: Vec<usize>,
    /// Outgoing edges toward children (and chained roots).
    pub edges: Vec<Edge>,
}

/// The revision DAG for one snapshot. Rebuilt from scratch on refresh.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<GraphNode>,
    root: Option<usize>,
    levels: Vec<usize>,
}

impl Graph {
    /// Build the graph for a row snapshot.
    ///
    /// Uses each row's declared `revision.parents`; the rows' positions
    /// are the node indices.
    pub fn build(rows: &[Row]) -> Graph {
        let mut nodes: Vec<GraphNode> = vec![GraphNode::default(); rows.len()];

        let lookup: HashMap<&str, usize> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.revision.change_id.as_str(), i))
            .collect();

        for (child, row) in rows.iter().enumerate() {
            for parent_id in &row.revision.parents {
                // Parents outside the fetched window resolve to nothing;
                // the edge is simply not created.
                if let Some(&parent) = lookup.get(parent_id.as_str()) {
                    nodes[parent].edges.push(Edge {
                        to: child,
                        kind: EdgeKind::Direct,
                    });
                    nodes[child].parents.push(parent);
                }
            }
        }

        let roots: Vec<usize> = (0..nodes.len())
            .filter(|&i| nodes[i].parents.is_empty())
            .collect();
        for pair in roots.windows(2) {
            let (earlier, later) = (pair[0], pair[1]);
            nodes[later].edges.push(Edge {
                to: earlier,
                kind: EdgeKind::Indirect,
            });
            nodes[earlier].parents.push(later);
        }

        for node in &mut nodes {
            node.edges
                .sort_by(|a, b| a.kind.cmp(&b.kind).then(a.to.cmp(&b.to)));
        }

        let root = roots.last().copied();
        let levels = assign_levels(&nodes, root);
        Graph {
            nodes,
            root,
            levels,
        }
    }

    /// Entry point of the traversal (the last root), if any rows exist.
    pub fn root(&self) -> Option<usize> {
        self.root
    }

    /// The nodes, indexed by row.
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Nesting level of a row for gutter rendering. Defaults to 0 for
    /// indices outside the snapshot.
    pub fn level(&self, row: usize) -> usize {
        self.levels.get(row).copied().unwrap_or(0)
    }

    /// All levels, indexed by row.
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    /// Number of edges of the given kind, summed over all nodes.
    pub fn edge_count(&self, kind: EdgeKind) -> usize {
        self.nodes
            .iter()
            .map(|n| n.edges.iter().filter(|e| e.kind == kind).count())
            .sum()
    }
}

/// Depth-first level assignment from the traversal root.
///
/// The child reached by a node's first outgoing edge inherits the node's
/// level ("first child stays on the same rail"); every other child gets
/// `level + 1`. The first, deterministic visit of a node wins, so
/// diamond-shaped ancestry terminates.
fn assign_levels(nodes: &[GraphNode], root: Option<usize>) -> Vec<usize> {
    let mut levels = vec![0usize; nodes.len()];
    let mut visited = vec![false; nodes.len()];
    let Some(root) = root else {
        return levels;
    };
    let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
    while let Some((node, level)) = stack.pop() {
        if visited[node] {
            continue;
        }
        visited[node] = true;
        levels[node] = level;
        // Reverse push order keeps the first edge on top of the stack,
        // matching recursive pre-order.
        for (i, edge) in nodes[node].edges.iter().enumerate().rev() {
            let next = if i == 0 { level } else { level + 1 };
            stack.push((edge.to, next));
        }
    }
    levels
}
