#![cfg(feature = "egui")]

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::Receiver;
use eframe::egui;
use serde_json::Value;
use tracing::debug;

use crate::config::{HostCallbacks, TrialConfig};
use crate::geometry::ease_cubic_in_out;
use crate::graph::TrialGraph;
use crate::http::{Completion, HttpTransport};
use crate::model::{NodeIndex, TrialGraphData, TrialId};

/// Extra toolbar content supplied by the embedding application.
pub type FormFn = Arc<dyn Fn(&mut TrialGraph, &mut egui::Ui) + Send + Sync>;

/// A window showing the payload of a finished comparison.
#[derive(Clone, Debug)]
pub struct DiffWindow {
    pub label: String,
    pub body: String,
    pub open: bool,
}

/// Interactive viewer of one trial graph.
pub struct TrialApp {
    pub graph: TrialGraph,
    completions: Option<Receiver<Completion>>,
    diffs: Receiver<(Value, String)>,
    pub diff_windows: Vec<DiffWindow>,
    /// Start of the transitions of the last render pass.
    pub pass_started: Instant,
    pub hovered: Option<NodeIndex>,
    pub show_fonts: bool,
    pub show_distances: bool,
    /// Status line shown in the toolbar.
    pub notice: Option<String>,
    pub custom_form: Option<FormFn>,
}

impl TrialApp {
    /// Load `data` into a new graph. Backend requests go to
    /// `config.diff.base_url` when it is set.
    pub fn new(
        graph_id: &str,
        data: TrialGraphData,
        t1: TrialId,
        t2: TrialId,
        config: TrialConfig,
    ) -> anyhow::Result<Self> {
        let (diff_tx, diffs) = crossbeam_channel::unbounded();
        let callbacks = HostCallbacks::default().with_show_diff(move |payload: &Value, label: &str| {
            let _ = diff_tx.send((payload.clone(), label.to_string()));
        });
        let mut graph = TrialGraph::new(graph_id, config.clone(), callbacks);
        let mut completions = None;
        if let Some(base) = &config.diff.base_url {
            let (transport, rx) = HttpTransport::new(base)?;
            graph = graph.with_transport(transport);
            completions = Some(rx);
        }
        graph.load(data, t1, t2)?;
        Ok(Self {
            graph,
            completions,
            diffs,
            diff_windows: Vec::new(),
            pass_started: Instant::now(),
            hovered: None,
            show_fonts: false,
            show_distances: false,
            notice: None,
            custom_form: None,
        })
    }

    pub fn with_custom_form<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut TrialGraph, &mut egui::Ui) + Send + Sync + 'static,
    {
        self.custom_form = Some(Arc::new(f));
        self
    }

    pub fn restart_animation(&mut self, now: Instant) {
        self.pass_started = now;
    }

    /// Eased progress of the current transitions in `[0, 1]`.
    pub fn animation_progress(&self, now: Instant) -> f32 {
        let duration = self.graph.plan().duration_ms;
        if duration <= 0.0 {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.pass_started).as_secs_f32() * 1000.0;
        (elapsed / duration).clamp(0.0, 1.0)
    }

    pub fn eased_progress(&self, now: Instant) -> f32 {
        ease_cubic_in_out(self.animation_progress(now))
    }

    /// Drain backend completions and finished comparisons, advance timers.
    pub fn poll(&mut self, now: Instant) {
        if let Some(rx) = &self.completions {
            for completion in rx.try_iter() {
                debug!(seq = completion.ticket.seq, "completion received");
                self.graph.on_backend_response(completion);
            }
        }
        self.graph.tick(now);
        for (payload, label) in self.diffs.try_iter() {
            let body = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            self.diff_windows.push(DiffWindow {
                label,
                body,
                open: true,
            });
        }
        if let Some(err) = self.graph.take_diff_notice() {
            self.notice = Some(err.to_string());
        }
    }
}

impl eframe::App for TrialApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        super::ui::update(self, ctx);
    }
}
