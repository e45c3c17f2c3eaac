//! A trial graph instance: dataset, visual tree, render state and the
//! interaction handlers of one view.
//!
//! All state is owned by the instance. Host interaction happens through
//! [`HostCallbacks`] and a [`Transport`] for backend requests whose
//! completions are fed back with [`TrialGraph::on_backend_response`].

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::color::{class_offset, node_fill, node_stroke};
use crate::config::{HostCallbacks, TrialConfig};
use crate::diff_flow::{DiffEvent, DiffFlow};
use crate::error::{DiffError, ExportError, TrialGraphError};
use crate::export;
use crate::geometry::{route_edge, Point, Transform};
use crate::http::{Completion, NullTransport, Ticket, Transport};
use crate::label::{edge_label, edge_style, label_offset, wrap_text, ApproxMeasurer};
use crate::model::{ActivationData, ColorClass, NodeIndex, TrialEdgeData, TrialGraphData, TrialId};
use crate::render::{
    reconcile, Anchor, Frame, NodeGlyph, NodeName, RenderId, RenderPlan, RenderState, RenderedEdge,
    RenderedNode,
};
use crate::tooltip::{
    activation_html, parse_tooltip_markers, ActivationCache, TooltipBlock, TooltipContent, TooltipMarker,
    TooltipState,
};
use crate::tree::{NodeId, TidyLayout, TrialTree, TreeLayout};

/// Side length of a node glyph.
pub const GLYPH_SIZE: f32 = 20.0;

/// Default file name of the SVG download.
pub const DEFAULT_DOWNLOAD_NAME: &str = "trial.svg";

/// What a click on a node did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interaction {
    Toggled,
    DiffStarted,
}

pub struct TrialGraph {
    graph_id: String,
    config: TrialConfig,
    callbacks: HostCallbacks,
    transport: Box<dyn Transport>,
    layout: Box<dyn TreeLayout>,

    t1: TrialId,
    t2: TrialId,
    min_duration: IndexMap<TrialId, f64>,
    max_duration: IndexMap<TrialId, f64>,
    total_duration: IndexMap<TrialId, f64>,
    max_total_duration: f64,
    colors: IndexMap<TrialId, ColorClass>,

    tree: Option<TrialTree>,
    edges: Vec<TrialEdgeData>,

    render_ids: HashMap<NodeIndex, RenderId>,
    last_render_id: RenderId,
    rendered: RenderState,
    plan: RenderPlan,

    transform: Transform,
    tooltip: TooltipState,
    cache: ActivationCache,
    diff: DiffFlow,
}

impl std::fmt::Debug for TrialGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrialGraph")
            .field("graph_id", &self.graph_id)
            .field("t1", &self.t1)
            .field("t2", &self.t2)
            .field("nodes", &self.rendered.nodes.len())
            .field("edges", &self.rendered.edges.len())
            .finish_non_exhaustive()
    }
}

fn initial_transform(config: &TrialConfig) -> Transform {
    Transform::translate(config.left + config.width / 2.0, config.top)
}

fn node_name(name: &str, max_width: f32, font_size: f32) -> NodeName {
    let mut parts = name.split("<br>");
    match (parts.next(), parts.next()) {
        (Some(title), Some(detail)) => NodeName::Header {
            title: title.to_string(),
            detail: detail.to_string(),
        },
        _ => NodeName::Wrapped(wrap_text(name, max_width, &ApproxMeasurer { font_size })),
    }
}

impl TrialGraph {
    pub fn new(graph_id: impl Into<String>, config: TrialConfig, callbacks: HostCallbacks) -> Self {
        let layout = TidyLayout::new(config.node_size_x, config.node_size_y);
        Self {
            graph_id: graph_id.into(),
            transform: initial_transform(&config),
            diff: DiffFlow::new(config.diff.clone()),
            config,
            callbacks,
            transport: Box::new(NullTransport),
            layout: Box::new(layout),
            t1: TrialId::new(),
            t2: TrialId::new(),
            min_duration: IndexMap::new(),
            max_duration: IndexMap::new(),
            total_duration: IndexMap::new(),
            max_total_duration: 0.0,
            colors: IndexMap::new(),
            tree: None,
            edges: Vec::new(),
            render_ids: HashMap::new(),
            last_render_id: 0,
            rendered: RenderState::default(),
            plan: RenderPlan::default(),
            tooltip: TooltipState::default(),
            cache: ActivationCache::default(),
        }
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    /// Replace the default tidy layout.
    pub fn with_layout(mut self, layout: impl TreeLayout + 'static) -> Self {
        self.layout = Box::new(layout);
        self
    }

    // ── accessors ───────────────────────────────────────────────────────────

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    pub fn trials(&self) -> (&TrialId, &TrialId) {
        (&self.t1, &self.t2)
    }

    pub fn tree(&self) -> Option<&TrialTree> {
        self.tree.as_ref()
    }

    pub fn edges(&self) -> &[TrialEdgeData] {
        &self.edges
    }

    pub fn rendered(&self) -> &RenderState {
        &self.rendered
    }

    /// Transitions of the last render pass.
    pub fn plan(&self) -> &RenderPlan {
        &self.plan
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn tooltip(&self) -> &TooltipState {
        &self.tooltip
    }

    pub fn cache(&self) -> &ActivationCache {
        &self.cache
    }

    pub fn diff(&self) -> &DiffFlow {
        &self.diff
    }

    pub fn min_duration(&self, trial: &str) -> Option<f64> {
        self.min_duration.get(trial).copied()
    }

    pub fn max_duration(&self, trial: &str) -> Option<f64> {
        self.max_duration.get(trial).copied()
    }

    pub fn total_duration(&self, trial: &str) -> Option<f64> {
        self.total_duration.get(trial).copied()
    }

    pub fn max_total_duration(&self) -> f64 {
        self.max_total_duration
    }

    pub fn color_class(&self, trial: &str) -> ColorClass {
        self.colors.get(trial).copied().unwrap_or_default()
    }

    /// Render identity of a node index, if it has been rendered before.
    pub fn render_id(&self, index: NodeIndex) -> Option<RenderId> {
        self.render_ids.get(&index).copied()
    }

    pub fn node_id(&self, index: NodeIndex) -> Result<NodeId, TrialGraphError> {
        let tree = self.tree.as_ref().ok_or(TrialGraphError::NotLoaded)?;
        tree.find(index).ok_or(TrialGraphError::UnknownNode(index))
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Install a dataset comparing trials `t1` and `t2` (equal for a single
    /// trial view) and render it.
    pub fn init(&mut self, data: TrialGraphData, t1: impl Into<TrialId>, t2: impl Into<TrialId>) -> Result<(), TrialGraphError> {
        self.t1 = t1.into();
        self.t2 = t2.into();
        self.min_duration = data.min_duration;
        self.max_duration = data.max_duration;
        self.total_duration = IndexMap::new();
        for t in [self.t1.clone(), self.t2.clone()] {
            let max = self.max_duration.get(&t).copied().unwrap_or(0.0);
            let min = self.min_duration.get(&t).copied().unwrap_or(0.0);
            self.total_duration.insert(t, max - min);
        }
        let total = |t: &TrialId| self.total_duration.get(t).copied().unwrap_or(0.0);
        self.max_total_duration = total(&self.t1).max(total(&self.t2));
        self.colors = data.colors;

        self.render_ids.clear();
        self.last_render_id = 0;
        self.rendered = RenderState::default();
        self.plan = RenderPlan::default();
        self.tooltip = TooltipState::default();
        self.diff.cancel();

        let Some(root) = data.root else {
            info!(graph = %self.graph_id, "dataset has no root; nothing to render");
            self.tree = None;
            self.edges = Vec::new();
            return Ok(());
        };
        let mut tree = TrialTree::build(root);
        let root = tree.root();
        tree.node_mut(root).prev = Point::new(0.0, self.config.width / 2.0);
        info!(
            graph = %self.graph_id,
            t1 = %self.t1,
            t2 = %self.t2,
            nodes = tree.len(),
            edges = data.edges.len(),
            "trial loaded"
        );
        self.tree = Some(tree);
        self.edges = data.edges;
        self.update(root)?;
        Ok(())
    }

    /// [`TrialGraph::init`] followed by [`TrialGraph::update_window`].
    pub fn load(&mut self, data: TrialGraphData, t1: impl Into<TrialId>, t2: impl Into<TrialId>) -> Result<(), TrialGraphError> {
        self.init(data, t1, t2)?;
        self.update_window();
        Ok(())
    }

    /// Ask the host for the view size.
    pub fn update_window(&mut self) {
        if let Some(size) = self.callbacks.custom_size.clone() {
            let (w, h) = size(&*self);
            self.config.width = w;
            self.config.height = h;
            debug!(width = w, height = h, "window resized");
        }
    }

    /// Reset pan/zoom to the initial placement.
    pub fn restore_position(&mut self) {
        self.rewrap();
        self.transform = initial_transform(&self.config);
    }

    // ── rendering ───────────────────────────────────────────────────────────

    fn assign_render_id(&mut self, index: NodeIndex) -> RenderId {
        let next = self.last_render_id + 1;
        let id = *self.render_ids.entry(index).or_insert(next);
        if id == next {
            self.last_render_id = next;
        }
        id
    }

    /// Re-layout the visible tree and reconcile it against what is on screen.
    /// `source` is the node whose interaction triggered the pass.
    pub fn update(&mut self, source: NodeId) -> Result<&RenderPlan, TrialGraphError> {
        let tree = self.tree.as_mut().ok_or(TrialGraphError::NotLoaded)?;
        let source = if tree.get(source).is_some() { source } else { tree.root() };
        tree.apply_layout(self.layout.as_ref());
        let visible = tree.visible();
        for &id in &visible {
            let class = tree
                .node(id)
                .data
                .primary_trial()
                .and_then(|t| self.colors.get(t))
                .copied()
                .unwrap_or_default();
            tree.node_mut(id).dy = class_offset(class, self.config.route.trial_offset);
        }
        let anchor = Anchor {
            previous: tree.node(source).prev,
            current: tree.node(source).pos,
        };

        let indices: Vec<NodeIndex> = visible.iter().map(|&id| tree.node(id).data.index).collect();
        let rids: Vec<RenderId> = indices.into_iter().map(|i| self.assign_render_id(i)).collect();

        let tree = self.tree.as_ref().ok_or(TrialGraphError::NotLoaded)?;
        let mut frame = Frame::default();
        for (&id, rid) in visible.iter().zip(rids) {
            let node = tree.node(id);
            let class = node
                .data
                .primary_trial()
                .map(|t| self.color_class(t))
                .unwrap_or_default();
            let glyph = NodeGlyph {
                index: node.data.index,
                node: id,
                name: node_name(&node.data.name, self.config.node_size_x, self.config.font_size),
                fill: node_fill(&node.data, &self.t1, &self.t2, self.max_total_duration),
                stroke: node_stroke(&node.data, class),
                collapsed: node.is_collapsed(),
                split: node.data.trial_ids.len() > 1,
            };
            frame.nodes.push((
                rid,
                RenderedNode {
                    glyph,
                    pos: node.center(),
                },
            ));
        }
        for edge in tree.visible_edges(&visible, &self.edges) {
            let (s, t) = (tree.node(edge.source), tree.node(edge.target));
            let kind = edge.data.kind;
            frame.edges.push(RenderedEdge {
                path: route_edge(kind, &s.endpoint(), &t.endpoint(), &self.config.route),
                style: edge_style(kind, &edge.data.count, &self.t1, &self.t2),
                label: edge_label(kind, &edge.data.count, &self.t1, &self.t2),
                label_offset: label_offset(s.center(), t.center()),
                id: edge.id,
                kind,
                source: edge.source,
                target: edge.target,
            });
        }

        let (plan, state) = reconcile(&self.rendered, frame, anchor, self.config.duration);
        let (n, e) = (plan.node_counts(), plan.edge_counts());
        debug!(
            graph = %self.graph_id,
            enter = n.enter,
            update = n.update,
            exit = n.exit,
            edges_enter = e.enter,
            edges_exit = e.exit,
            "render pass"
        );
        self.rendered = state;
        self.plan = plan;
        if let Some(tree) = self.tree.as_mut() {
            tree.store_previous(&visible);
        }
        Ok(&self.plan)
    }

    /// Recompute wrapped node names for the current font and node width.
    fn rewrap(&mut self) {
        let (width, font) = (self.config.node_size_x, self.config.font_size);
        let Some(tree) = self.tree.as_ref() else { return };
        for node in self.rendered.nodes.values_mut() {
            if let NodeName::Wrapped(_) = node.glyph.name {
                let name = &tree.node(node.glyph.node).data.name;
                node.glyph.name = node_name(name, width, font);
            }
        }
    }

    // ── interaction ─────────────────────────────────────────────────────────

    /// Expand or collapse a node and re-render.
    pub fn toggle(&mut self, index: NodeIndex) -> Result<&RenderPlan, TrialGraphError> {
        let id = self.node_id(index)?;
        if let Some(tree) = self.tree.as_mut() {
            let changed = tree.toggle(id);
            debug!(index, changed, collapsed = tree.node(id).is_collapsed(), "toggle");
        }
        self.update(id)
    }

    /// Handle a click on a node. With the diff modifier held, a node with
    /// activations in two trials starts a comparison instead of toggling.
    pub fn click(&mut self, index: NodeIndex, modifier: bool, now: Instant) -> Result<Interaction, TrialGraphError> {
        let id = self.node_id(index)?;
        let comparable = self
            .tree
            .as_ref()
            .is_some_and(|t| DiffFlow::is_comparable(&t.node(id).data));
        if modifier && comparable {
            self.start_diff(index, now)?;
            return Ok(Interaction::DiffStarted);
        }
        self.toggle(index)?;
        Ok(Interaction::Toggled)
    }

    /// Pointer entered a node. `local_x` is the pointer position relative to
    /// the glyph's left edge; `pointer` is the page position.
    pub fn hover(&mut self, index: NodeIndex, local_x: f32, pointer: Point) -> Result<(), TrialGraphError> {
        let id = self.node_id(index)?;
        let mut to_load: Vec<TooltipMarker> = Vec::new();
        if self.config.use_tooltip {
            self.tooltip.close();
            let trial = if local_x < GLYPH_SIZE / 2.0 { self.t1.clone() } else { self.t2.clone() };
            let tree = self.tree.as_ref().ok_or(TrialGraphError::NotLoaded)?;
            let html = tree.node(id).data.tooltip.get(&trial).cloned().unwrap_or_default();
            let content = if self.config.query_tooltip {
                let can_load = self.callbacks.custom_load_tooltip.is_some();
                let mut blocks = Vec::new();
                for marker in parse_tooltip_markers(&html) {
                    match self.cache.get(&marker.activation_id) {
                        Some(data) => blocks.push(TooltipBlock::Loaded(activation_html(data))),
                        None => {
                            if can_load && self.cache.mark_requested(&marker.activation_id) {
                                to_load.push(marker.clone());
                            }
                            blocks.push(TooltipBlock::Pending(marker));
                        }
                    }
                }
                TooltipContent::Blocks(blocks)
            } else {
                TooltipContent::Html(html)
            };
            self.tooltip.show(pointer, trial, content);
        }

        if let Some(load) = self.callbacks.custom_load_tooltip.clone() {
            for marker in &to_load {
                debug!(activation = %marker.activation_id, trial = %marker.trial_id, "loading activation");
                load(&*self, marker);
            }
        }
        if let (Some(over), Some(tree)) = (self.callbacks.custom_mouse_over.clone(), self.tree.as_ref()) {
            over(&*self, tree.node(id));
        }
        Ok(())
    }

    /// Pointer left a node.
    pub fn mouse_out(&mut self, index: NodeIndex) -> Result<(), TrialGraphError> {
        let id = self.node_id(index)?;
        if let (Some(out), Some(tree)) = (self.callbacks.custom_mouse_out.clone(), self.tree.as_ref()) {
            out(&*self, tree.node(id));
        }
        Ok(())
    }

    pub fn close_tooltip(&mut self) {
        self.tooltip.close();
    }

    /// Apply a pan/zoom transform. Any open tooltip is closed.
    pub fn zoom(&mut self, transform: Transform) {
        self.transform = transform;
        if self.tooltip.is_visible() {
            self.tooltip.close();
        }
    }

    /// Store activation details answered by the host loader.
    pub fn store_activation(&mut self, data: ActivationData) {
        debug!(activation = %data.id, "activation stored");
        self.cache.insert(data);
        if let Some(content) = self.tooltip.content.as_mut() {
            content.refresh(&self.cache);
        }
    }

    /// The host loader could not provide activation `id`. The next hover
    /// that misses the cache asks the loader again.
    pub fn activation_failed(&mut self, id: &str) {
        warn!(activation = %id, "activation load failed");
        self.cache.cancel_request(id);
    }

    /// Topmost rendered node whose glyph contains the world point `p`, with
    /// the pointer's x relative to the glyph's left edge.
    pub fn hit_test(&self, p: Point) -> Option<(NodeIndex, f32)> {
        let half = GLYPH_SIZE / 2.0;
        self.rendered.nodes.values().rev().find_map(|n| {
            let local = Point::new(p.x - (n.pos.x - half), p.y - (n.pos.y - half));
            let inside = (0.0..=GLYPH_SIZE).contains(&local.x) && (0.0..=GLYPH_SIZE).contains(&local.y);
            inside.then_some((n.glyph.index, local.x))
        })
    }

    // ── toolbar ─────────────────────────────────────────────────────────────

    pub fn set_use_tooltip(&mut self, enabled: bool) {
        self.tooltip.close();
        self.config.use_tooltip = enabled;
    }

    pub fn set_font_size(&mut self, size: f32) {
        self.config.font_size = size;
        self.rewrap();
    }

    pub fn set_label_font_size(&mut self, size: f32) {
        self.config.label_font_size = size;
    }

    /// Change node spacing and re-layout from the root.
    pub fn set_distances(&mut self, x: f32, y: f32) -> Result<(), TrialGraphError> {
        self.config.node_size_x = x;
        self.config.node_size_y = y;
        self.layout = Box::new(TidyLayout::new(x, y));
        let root = self.tree.as_ref().ok_or(TrialGraphError::NotLoaded)?.root();
        self.update(root)?;
        Ok(())
    }

    /// Standalone SVG document of the current rendering.
    pub fn export_svg(&self) -> Result<String, ExportError> {
        export::svg_document(self)
    }

    /// Write the SVG export to `path` (default `trial.svg`).
    pub fn download(&self, path: Option<&Utf8Path>) -> Result<Utf8PathBuf, ExportError> {
        let path = path
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DOWNLOAD_NAME));
        let svg = self.export_svg()?;
        std::fs::write(&path, svg).map_err(|source| ExportError::Io {
            path: path.to_string(),
            source,
        })?;
        info!(%path, "svg written");
        Ok(path)
    }

    // ── diff flow ───────────────────────────────────────────────────────────

    /// Start comparing the activations of node `index` across both trials.
    pub fn start_diff(&mut self, index: NodeIndex, now: Instant) -> Result<(), TrialGraphError> {
        let id = self.node_id(index)?;
        let tree = self.tree.as_ref().ok_or(TrialGraphError::NotLoaded)?;
        let events = self.diff.start(&tree.node(id).data, now)?;
        self.dispatch(events);
        Ok(())
    }

    pub fn select_activation(&mut self, slot: usize, activation: &str) -> Result<(), DiffError> {
        self.diff.select(slot, activation)
    }

    pub fn confirm_diff(&mut self, now: Instant) -> Result<(), DiffError> {
        let events = self.diff.confirm(now)?;
        self.dispatch(events);
        Ok(())
    }

    pub fn cancel_diff(&mut self) {
        self.diff.cancel();
    }

    pub fn take_diff_notice(&mut self) -> Option<DiffError> {
        self.diff.take_notice()
    }

    /// Feed a transport completion. Completions issued by another graph are
    /// ignored.
    pub fn on_backend_response(&mut self, completion: Completion) {
        if completion.ticket.graph_id != self.graph_id {
            debug!(
                graph = %self.graph_id,
                other = %completion.ticket.graph_id,
                "ignoring completion for another graph"
            );
            return;
        }
        let events = self.diff.on_response(completion.ticket.seq, completion.result);
        self.dispatch(events);
    }

    /// Advance timers. Returns `true` when an in-flight comparison timed out.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.diff.tick(now)
    }

    /// Hand flow events to the transport and the host. A request the
    /// transport cannot start is answered with its error right away.
    fn dispatch(&mut self, events: Vec<DiffEvent>) {
        let mut queue: VecDeque<DiffEvent> = events.into();
        while let Some(event) = queue.pop_front() {
            match event {
                DiffEvent::Send { seq, request } => {
                    let ticket = Ticket {
                        graph_id: self.graph_id.clone(),
                        seq,
                    };
                    if let Err(err) = self.transport.send(ticket, &request) {
                        queue.extend(self.diff.on_response(seq, Err(err)));
                    }
                }
                DiffEvent::Display { payload, label } => match &self.callbacks.show_diff {
                    Some(show) => show(&payload, &label),
                    None => info!(%label, "comparison ready; no display callback"),
                },
            }
        }
    }
}
