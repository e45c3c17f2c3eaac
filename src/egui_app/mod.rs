//! Egui-based interactive trial viewer (feature = "egui").
//!
//! [`TrialApp`] wraps a [`crate::graph::TrialGraph`] and drives it from egui
//! input: pan/zoom on the canvas, click to expand or collapse, Ctrl/Cmd+click
//! to diff a function across the two trials, hover tooltips and the toolbar.

#![cfg(feature = "egui")]

mod geometry;
mod state;
mod ui;

use eframe::egui;

use crate::config::TrialConfig;
use crate::model::{TrialGraphData, TrialId};

pub use geometry::{arrow_head, color32, half_disc, last_segment, to_screen, to_world};
pub use state::{DiffWindow, FormFn, TrialApp};

/// Open a native window showing `data`.
pub fn run_viewer(data: TrialGraphData, t1: TrialId, t2: TrialId, config: TrialConfig) -> anyhow::Result<()> {
    let app = TrialApp::new("trial", data, t1, t2, config)?;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_maximized(true),
        ..Default::default()
    };
    eframe::run_native(
        "trialgraph viewer",
        options,
        Box::new(|_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}
