//! Interactive trial graph.
//!
//! This crate renders the execution tree of a recorded program trial, or the
//! diff between two trials, as a collapsible node-link tree: nodes are
//! function activations, edges are call/return/sequence relations, and fill,
//! stroke and arrowheads encode duration and trial membership.
//!
//! [`graph::TrialGraph`] is the entry point. It lays the visible tree out,
//! routes edges, reconciles every pass against what is on screen and handles
//! hover tooltips and the activation diff flow. The binary `trialgraph`
//! loads a dataset, applies collapses and writes an SVG export.

pub mod color;
pub mod config;
pub mod diff_flow;
pub mod error;
pub mod export;
pub mod geometry;
pub mod graph;
pub mod http;
pub mod label;
pub mod model;
pub mod render;
pub mod tooltip;
pub mod tree;

// Optional interactive viewer, behind the `egui` feature flag.
#[cfg(feature = "egui")]
pub mod egui_app;
