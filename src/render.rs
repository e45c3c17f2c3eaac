//! Incremental render reconciliation.
//!
//! A render pass compares the previously rendered state with the next frame
//! and partitions nodes, edges and edge labels into enter/update/exit sets.
//! Every element gets a timed transition:
//!
//! - entering elements start at the anchor's previous position,
//! - updated elements move from their last rendered geometry,
//! - exiting elements move to the anchor's current position and are then
//!   dropped from the state.

use indexmap::IndexMap;
use serde::Serialize;

use crate::color::{NodeFill, Rgb};
use crate::geometry::{ease_cubic_in_out, EdgePath, Point};
use crate::label::EdgeStyle;
use crate::model::{EdgeKind, NodeIndex};
use crate::tree::NodeId;

/// Per-instance render identity of a node, stable across passes.
pub type RenderId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    Enter,
    Update,
    Exit,
}

/// Text drawn under a node glyph.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeName {
    /// Word-wrapped single name.
    Wrapped(Vec<String>),
    /// Bold header plus a second line; never wrapped.
    Header { title: String, detail: String },
}

/// Visual description of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGlyph {
    pub index: NodeIndex,
    pub node: NodeId,
    pub name: NodeName,
    pub fill: NodeFill,
    pub stroke: Rgb,
    /// Collapsed nodes are drawn as squares.
    pub collapsed: bool,
    /// Two-trial nodes get a vertical divider.
    pub split: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedNode {
    pub glyph: NodeGlyph,
    /// Center of the glyph, `dy` included.
    pub pos: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEdge {
    /// `"source-target"`.
    pub id: String,
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: NodeId,
    pub path: EdgePath,
    pub style: EdgeStyle,
    pub label: String,
    /// Distance along the path at which the label is centered.
    pub label_offset: f32,
}

/// What is currently on screen.
#[derive(Debug, Clone, Default)]
pub struct RenderState {
    pub nodes: IndexMap<RenderId, RenderedNode>,
    pub edges: IndexMap<String, RenderedEdge>,
}

impl RenderState {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Next frame to reconcile against the current state.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub nodes: Vec<(RenderId, RenderedNode)>,
    pub edges: Vec<RenderedEdge>,
}

/// The node whose interaction triggered the pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    /// Position before this pass (`x0`, `y0`).
    pub previous: Point,
    /// Position after re-layout (`x`, `y`).
    pub current: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeTransition {
    pub id: RenderId,
    pub phase: Phase,
    pub from: Point,
    pub to: Point,
    pub node: RenderedNode,
}

impl NodeTransition {
    /// Position at normalized time `t` in `[0, 1]`.
    pub fn position_at(&self, t: f32) -> Point {
        self.from.lerp(self.to, ease_cubic_in_out(t))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTransition {
    pub id: String,
    pub phase: Phase,
    pub from: EdgePath,
    pub to: EdgePath,
    pub edge: RenderedEdge,
}

impl EdgeTransition {
    pub fn path_at(&self, t: f32) -> EdgePath {
        let e = ease_cubic_in_out(t);
        self.from.lerp(&self.to, e).unwrap_or_else(|| self.to.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelChange {
    pub id: String,
    pub phase: Phase,
    pub text: String,
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPlan {
    pub nodes: Vec<NodeTransition>,
    pub edges: Vec<EdgeTransition>,
    pub labels: Vec<LabelChange>,
    /// Transition duration in milliseconds.
    pub duration_ms: f32,
}

/// Counts per phase, mostly for logging and summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PhaseCounts {
    pub enter: usize,
    pub update: usize,
    pub exit: usize,
}

impl PhaseCounts {
    fn add(&mut self, phase: Phase) {
        match phase {
            Phase::Enter => self.enter += 1,
            Phase::Update => self.update += 1,
            Phase::Exit => self.exit += 1,
        }
    }
}

impl RenderPlan {
    pub fn node_counts(&self) -> PhaseCounts {
        let mut c = PhaseCounts::default();
        self.nodes.iter().for_each(|n| c.add(n.phase));
        c
    }

    pub fn edge_counts(&self) -> PhaseCounts {
        let mut c = PhaseCounts::default();
        self.edges.iter().for_each(|e| c.add(e.phase));
        c
    }

    pub fn node(&self, id: RenderId) -> Option<&NodeTransition> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeTransition> {
        self.edges.iter().find(|e| e.id == id)
    }
}

/// Reconcile `next` against `previous`, returning the transitions to play and
/// the state that will be on screen once they finish.
pub fn reconcile(previous: &RenderState, next: Frame, anchor: Anchor, duration_ms: f32) -> (RenderPlan, RenderState) {
    let mut plan = RenderPlan {
        duration_ms,
        ..Default::default()
    };
    let mut state = RenderState::default();

    for (id, node) in next.nodes {
        let (phase, from) = match previous.nodes.get(&id) {
            Some(old) => (Phase::Update, old.pos),
            None => (Phase::Enter, anchor.previous),
        };
        plan.nodes.push(NodeTransition {
            id,
            phase,
            from,
            to: node.pos,
            node: node.clone(),
        });
        state.nodes.insert(id, node);
    }
    for (id, old) in &previous.nodes {
        if !state.nodes.contains_key(id) {
            plan.nodes.push(NodeTransition {
                id: *id,
                phase: Phase::Exit,
                from: old.pos,
                to: anchor.current,
                node: old.clone(),
            });
        }
    }

    for edge in next.edges {
        match previous.edges.get(&edge.id) {
            Some(old) => {
                plan.edges.push(EdgeTransition {
                    id: edge.id.clone(),
                    phase: Phase::Update,
                    from: old.path.clone(),
                    to: edge.path.clone(),
                    edge: edge.clone(),
                });
                // Labels keep the text they entered with.
                plan.labels.push(LabelChange {
                    id: edge.id.clone(),
                    phase: Phase::Update,
                    text: old.label.clone(),
                });
                let mut edge = edge;
                edge.label = old.label.clone();
                state.edges.insert(edge.id.clone(), edge);
            }
            None => {
                plan.edges.push(EdgeTransition {
                    id: edge.id.clone(),
                    phase: Phase::Enter,
                    from: edge.path.collapsed_at(anchor.previous),
                    to: edge.path.clone(),
                    edge: edge.clone(),
                });
                plan.labels.push(LabelChange {
                    id: edge.id.clone(),
                    phase: Phase::Enter,
                    text: edge.label.clone(),
                });
                state.edges.insert(edge.id.clone(), edge);
            }
        }
    }
    for (id, old) in &previous.edges {
        if !state.edges.contains_key(id) {
            plan.edges.push(EdgeTransition {
                id: id.clone(),
                phase: Phase::Exit,
                from: old.path.clone(),
                to: old.path.collapsed_at(anchor.current),
                edge: old.clone(),
            });
            plan.labels.push(LabelChange {
                id: id.clone(),
                phase: Phase::Exit,
                text: old.label.clone(),
            });
        }
    }

    (plan, state)
}
