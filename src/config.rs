use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff_flow::DiffConfig;
use crate::geometry::RouteConfig;
use crate::graph::TrialGraph;
use crate::tooltip::TooltipMarker;
use crate::tree::TrialNode;

/// Display settings of a trial graph. Every field has a default, so partial
/// JSON/TOML documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Transition duration in milliseconds.
    pub duration: f32,

    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,

    pub width: f32,
    pub height: f32,

    pub use_tooltip: bool,
    pub font_size: f32,
    pub label_font_size: f32,

    pub node_size_x: f32,
    pub node_size_y: f32,

    /// Build tooltips from activation markers instead of the embedded HTML.
    pub query_tooltip: bool,

    pub route: RouteConfig,
    pub diff: DiffConfig,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            duration: 750.0,
            top: 50.0,
            right: 30.0,
            bottom: 80.0,
            left: 30.0,
            width: 900.0,
            height: 500.0,
            use_tooltip: false,
            font_size: 10.0,
            label_font_size: 10.0,
            node_size_x: 47.0,
            node_size_y: 100.0,
            query_tooltip: false,
            route: RouteConfig::default(),
            diff: DiffConfig::default(),
        }
    }
}

pub type SizeFn = Arc<dyn Fn(&TrialGraph) -> (f32, f32) + Send + Sync>;
pub type NodeHookFn = Arc<dyn Fn(&TrialGraph, &TrialNode) -> bool + Send + Sync>;
pub type LoadTooltipFn = Arc<dyn Fn(&TrialGraph, &TooltipMarker) + Send + Sync>;
pub type ShowDiffFn = Arc<dyn Fn(&Value, &str) + Send + Sync>;

/// Hooks supplied by the embedding application. Unset hooks fall back to
/// no-ops (and the configured width/height for sizing).
#[derive(Clone, Default)]
pub struct HostCallbacks {
    pub custom_size: Option<SizeFn>,
    pub custom_mouse_over: Option<NodeHookFn>,
    pub custom_mouse_out: Option<NodeHookFn>,
    /// Asked to load the details of an activation that is not cached yet.
    /// The host answers with [`TrialGraph::store_activation`], or with
    /// [`TrialGraph::activation_failed`] when the load fails.
    pub custom_load_tooltip: Option<LoadTooltipFn>,
    /// Receives the comparison payload and its window label.
    pub show_diff: Option<ShowDiffFn>,
}

impl std::fmt::Debug for HostCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCallbacks")
            .field("custom_size", &self.custom_size.is_some())
            .field("custom_mouse_over", &self.custom_mouse_over.is_some())
            .field("custom_mouse_out", &self.custom_mouse_out.is_some())
            .field("custom_load_tooltip", &self.custom_load_tooltip.is_some())
            .field("show_diff", &self.show_diff.is_some())
            .finish()
    }
}

impl HostCallbacks {
    pub fn with_size<F>(mut self, f: F) -> Self
    where
        F: Fn(&TrialGraph) -> (f32, f32) + Send + Sync + 'static,
    {
        self.custom_size = Some(Arc::new(f));
        self
    }

    pub fn with_mouse_over<F>(mut self, f: F) -> Self
    where
        F: Fn(&TrialGraph, &TrialNode) -> bool + Send + Sync + 'static,
    {
        self.custom_mouse_over = Some(Arc::new(f));
        self
    }

    pub fn with_mouse_out<F>(mut self, f: F) -> Self
    where
        F: Fn(&TrialGraph, &TrialNode) -> bool + Send + Sync + 'static,
    {
        self.custom_mouse_out = Some(Arc::new(f));
        self
    }

    pub fn with_load_tooltip<F>(mut self, f: F) -> Self
    where
        F: Fn(&TrialGraph, &TooltipMarker) + Send + Sync + 'static,
    {
        self.custom_load_tooltip = Some(Arc::new(f));
        self
    }

    pub fn with_show_diff<F>(mut self, f: F) -> Self
    where
        F: Fn(&Value, &str) + Send + Sync + 'static,
    {
        self.show_diff = Some(Arc::new(f));
        self
    }
}
