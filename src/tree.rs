//! Arena-backed model of the collapsible trial tree.
//!
//! Nodes are stored in a flat arena and refer to each other through
//! [`NodeId`]s, so collapsing or restoring a subtree never invalidates the
//! references held by edges or by the render state.

use std::collections::HashMap;

use tracing::warn;

use crate::geometry::{Endpoint, Point};
use crate::model::{NodeIndex, TrialEdgeData, TrialNodeData};

/// Stable arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Children of a node: either shown, or hidden but retained so expanding
/// restores exactly the same list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Children {
    Expanded(Vec<NodeId>),
    Collapsed(Vec<NodeId>),
}

impl Children {
    pub fn all(&self) -> &[NodeId] {
        match self {
            Children::Expanded(c) | Children::Collapsed(c) => c,
        }
    }

    pub fn visible(&self) -> &[NodeId] {
        match self {
            Children::Expanded(c) => c,
            Children::Collapsed(_) => &[],
        }
    }
}

/// A node of the visual tree.
#[derive(Debug, Clone)]
pub struct TrialNode {
    /// Node payload; its `children` list is emptied, the hierarchy lives in
    /// [`TrialNode::children`].
    pub data: TrialNodeData,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub children: Children,
    /// Current layout position.
    pub pos: Point,
    /// Position at the end of the previous render pass.
    pub prev: Point,
    /// Vertical offset separating single-trial nodes in a diff view.
    pub dy: f32,
}

impl TrialNode {
    pub fn is_collapsed(&self) -> bool {
        matches!(&self.children, Children::Collapsed(c) if !c.is_empty())
    }

    /// Where the glyph is drawn: layout position shifted by `dy`.
    pub fn center(&self) -> Point {
        Point::new(self.pos.x, self.pos.y + self.dy)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            pos: self.center(),
            parent_index: self.data.parent_index,
            children_index: self.data.children_index,
        }
    }
}

/// Edge whose endpoints are both visible, resolved to arena ids.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleTrialEdge {
    /// `"source-target"`.
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub data: TrialEdgeData,
}

#[derive(Debug, Clone)]
pub struct TrialTree {
    nodes: Vec<TrialNode>,
    root: NodeId,
    by_index: HashMap<NodeIndex, NodeId>,
}

impl TrialTree {
    /// Flatten a nested dataset into the arena. Every node starts expanded.
    pub fn build(root: TrialNodeData) -> Self {
        let mut tree = TrialTree {
            nodes: Vec::new(),
            root: NodeId(0),
            by_index: HashMap::new(),
        };
        tree.root = tree.insert(root, None, 0);
        tree
    }

    fn insert(&mut self, mut data: TrialNodeData, parent: Option<NodeId>, depth: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        let kids = std::mem::take(&mut data.children);
        if self.by_index.insert(data.index, id).is_some() {
            warn!(index = data.index, "duplicate node index; later node shadows earlier one");
        }
        self.nodes.push(TrialNode {
            data,
            parent,
            depth,
            children: Children::Expanded(Vec::new()),
            pos: Point::ZERO,
            prev: Point::ZERO,
            dy: 0.0,
        });
        let child_ids: Vec<NodeId> = kids
            .into_iter()
            .map(|k| self.insert(k, Some(id), depth + 1))
            .collect();
        self.nodes[id.0].children = Children::Expanded(child_ids);
        id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TrialNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TrialNode {
        &mut self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TrialNode> {
        self.nodes.get(id.0)
    }

    /// Look a node up by its dataset index.
    pub fn find(&self, index: NodeIndex) -> Option<NodeId> {
        self.by_index.get(&index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TrialNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Show the retained children of a collapsed node.
    pub fn expand(&mut self, id: NodeId) -> bool {
        let node = &mut self.nodes[id.0];
        match &mut node.children {
            Children::Collapsed(saved) => {
                let saved = std::mem::take(saved);
                node.children = Children::Expanded(saved);
                true
            }
            Children::Expanded(_) => false,
        }
    }

    /// Hide the children of an expanded node, retaining them for restoration.
    pub fn collapse(&mut self, id: NodeId) -> bool {
        let node = &mut self.nodes[id.0];
        match &mut node.children {
            Children::Expanded(kids) if !kids.is_empty() => {
                let kids = std::mem::take(kids);
                node.children = Children::Collapsed(kids);
                true
            }
            _ => false,
        }
    }

    /// Flip a node between expanded and collapsed. Leaves are unaffected.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        match self.nodes[id.0].children {
            Children::Expanded(_) => self.collapse(id),
            Children::Collapsed(_) => self.expand(id),
        }
    }

    /// Collapse every node deeper than `depth` that has children.
    pub fn collapse_below(&mut self, depth: usize) {
        for i in 0..self.nodes.len() {
            if self.nodes[i].depth >= depth {
                self.collapse(NodeId(i));
            }
        }
    }

    pub fn visible_children(&self, id: NodeId) -> &[NodeId] {
        self.nodes[id.0].children.visible()
    }

    /// Nodes not hidden behind a collapsed ancestor, in pre-order.
    pub fn visible(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &c in self.visible_children(id).iter().rev() {
                stack.push(c);
            }
        }
        out
    }

    /// Resolve the edges whose endpoints are both visible. Edges touching a
    /// hidden node are dropped.
    pub fn visible_edges(&self, visible: &[NodeId], edges: &[TrialEdgeData]) -> Vec<VisibleTrialEdge> {
        let valid: HashMap<NodeIndex, NodeId> = visible
            .iter()
            .map(|&id| (self.nodes[id.0].data.index, id))
            .collect();
        edges
            .iter()
            .filter_map(|e| {
                let source = *valid.get(&e.source)?;
                let target = *valid.get(&e.target)?;
                Some(VisibleTrialEdge {
                    id: e.id(),
                    source,
                    target,
                    data: e.clone(),
                })
            })
            .collect()
    }

    /// Assign layout positions to the visible nodes.
    pub fn apply_layout(&mut self, layout: &dyn TreeLayout) {
        for (id, p) in layout.layout(self) {
            self.nodes[id.0].pos = p;
        }
    }

    /// Remember the current positions for the next transition.
    pub fn store_previous(&mut self, ids: &[NodeId]) {
        for &id in ids {
            let n = &mut self.nodes[id.0];
            n.prev = n.pos;
        }
    }
}

/// Assigns positions to the visible part of a tree.
pub trait TreeLayout {
    fn layout(&self, tree: &TrialTree) -> Vec<(NodeId, Point)>;
}

/// Fixed node-size tidy layout: depth maps to `y`, leaves are spread along
/// `x` one node width apart (two between different parents) and parents sit
/// centered over their children. The root lands at `x = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TidyLayout {
    pub node_size: (f32, f32),
}

impl TidyLayout {
    pub fn new(node_size_x: f32, node_size_y: f32) -> Self {
        Self {
            node_size: (node_size_x, node_size_y),
        }
    }
}

struct LeafCursor {
    next_x: f32,
    last_parent: Option<Option<NodeId>>,
}

impl TidyLayout {
    fn place(&self, tree: &TrialTree, id: NodeId, cursor: &mut LeafCursor, out: &mut Vec<(NodeId, Point)>) -> f32 {
        let (sx, sy) = self.node_size;
        let node = tree.node(id);
        let kids = tree.visible_children(id);
        let x = if kids.is_empty() {
            if let Some(last) = cursor.last_parent {
                if last != node.parent {
                    cursor.next_x += sx;
                }
            }
            let x = cursor.next_x;
            cursor.next_x += sx;
            cursor.last_parent = Some(node.parent);
            x
        } else {
            let mut first: Option<f32> = None;
            let mut last = 0.0;
            for &k in kids {
                let kx = self.place(tree, k, cursor, out);
                first.get_or_insert(kx);
                last = kx;
            }
            (first.unwrap_or(last) + last) / 2.0
        };
        out.push((id, Point::new(x, node.depth as f32 * sy)));
        x
    }
}

impl TreeLayout for TidyLayout {
    fn layout(&self, tree: &TrialTree) -> Vec<(NodeId, Point)> {
        let mut out = Vec::new();
        let mut cursor = LeafCursor {
            next_x: 0.0,
            last_parent: None,
        };
        let root_x = self.place(tree, tree.root(), &mut cursor, &mut out);
        let root_depth = tree.node(tree.root()).depth as f32 * self.node_size.1;
        for (_, p) in out.iter_mut() {
            p.x -= root_x;
            p.y -= root_depth;
        }
        out
    }
}
