use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::json;
use trialgraph::color::{NodeFill, Rgb};
use trialgraph::config::{HostCallbacks, TrialConfig};
use trialgraph::diff_flow::BackendRequest;
use trialgraph::error::{DiffError, FetchError, TrialGraphError};
use trialgraph::geometry::{Point, Transform};
use trialgraph::graph::{Interaction, TrialGraph};
use trialgraph::http::{Completion, Ticket, Transport};
use trialgraph::model::{ActivationData, TrialGraphData};
use trialgraph::render::Phase;
use trialgraph::tooltip::{activation_html, TooltipContent};

/// root(1) -> f(2) -> h(4), root(1) -> g(3), single trial "1".
fn single_trial() -> TrialGraphData {
    TrialGraphData::from_json_str(
        r#"{
            "root": {
                "index": 1, "name": "<module>", "trial_ids": [1],
                "duration": {"1": 100.0}, "activations": {"1": [1]},
                "parent_index": null, "children_index": 0,
                "children": [
                    {"index": 2, "name": "f", "trial_ids": [1], "duration": {"1": 50.0},
                     "parent_index": 1, "children_index": 0,
                     "children": [
                        {"index": 4, "name": "h", "trial_ids": [1], "parent_index": 2, "children_index": 0}
                     ]},
                    {"index": 3, "name": "g<br>line 3", "trial_ids": [1], "parent_index": 1, "children_index": 1}
                ]
            },
            "edges": [
                {"source": 1, "target": 1, "type": "initial", "count": {}},
                {"source": 1, "target": 2, "type": "call", "count": {"1": 1}},
                {"source": 2, "target": 4, "type": "call", "count": {"1": 2}},
                {"source": 2, "target": 3, "type": "sequence", "count": {"1": 1}}
            ],
            "min_duration": {"1": 0.0},
            "max_duration": {"1": 100.0},
            "colors": {"1": 0}
        }"#,
    )
    .unwrap()
}

/// Diff of trials "1" and "2": a shared root with repeated activations and a
/// child only present in the second trial.
fn two_trials() -> TrialGraphData {
    serde_json::from_value(json!({
        "root": {
            "index": 1, "name": "main", "trial_ids": ["1", "2"],
            "duration": {"1": 10.0, "2": 20.0},
            "activations": {"1": [5, 7], "2": [9]},
            "tooltip": {
                "1": "T1 - 5<br>Line 3<br>T1 - 7<br>Line 4<br>",
                "2": "<b>second</b>"
            },
            "children": [
                {"index": 2, "name": "extra", "trial_ids": ["2"], "duration": {"2": 5.0},
                 "activations": {"2": [11]}, "parent_index": 1, "children_index": 0}
            ]
        },
        "edges": [
            {"source": 1, "target": 2, "type": "call", "count": {"2": 1}}
        ],
        "min_duration": {"1": 0.0, "2": 0.0},
        "max_duration": {"1": 10.0, "2": 20.0},
        "colors": {"1": 0, "2": 2}
    }))
    .unwrap()
}

#[derive(Clone, Default)]
struct RecordingTransport {
    sent: Arc<Mutex<Vec<(Ticket, BackendRequest)>>>,
}

impl RecordingTransport {
    fn take(&self) -> Vec<(Ticket, BackendRequest)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Transport for RecordingTransport {
    fn send(&self, ticket: Ticket, request: &BackendRequest) -> Result<(), FetchError> {
        self.sent.lock().unwrap().push((ticket, request.clone()));
        Ok(())
    }
}

fn loaded() -> TrialGraph {
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), HostCallbacks::default());
    graph.load(single_trial(), "1", "1").unwrap();
    graph
}

fn rendered_pos(graph: &TrialGraph, index: i64) -> Point {
    let rid = graph.render_id(index).unwrap();
    graph.rendered().nodes[&rid].pos
}

#[test]
fn initial_render_shows_whole_tree() {
    let graph = loaded();
    let plan = graph.plan();
    assert_eq!(plan.node_counts().enter, 4);
    assert_eq!(plan.edge_counts().enter, 4);
    assert_eq!(plan.duration_ms, 750.0);

    let ids: Vec<&str> = graph.rendered().edges.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["1-1", "1-2", "2-4", "2-3"]);

    // Everything grows out of the root's starting position.
    let rid = graph.render_id(4).unwrap();
    assert_eq!(plan.node(rid).unwrap().from, Point::new(0.0, 450.0));

    assert_eq!(rendered_pos(&graph, 1), Point::new(0.0, 0.0));
    assert_eq!(rendered_pos(&graph, 2), Point::new(-47.0, 100.0));
    assert_eq!(rendered_pos(&graph, 4), Point::new(-47.0, 200.0));
    assert_eq!(rendered_pos(&graph, 3), Point::new(47.0, 100.0));
    assert_eq!(graph.transform(), Transform::translate(480.0, 50.0));
}

#[test]
fn render_ids_are_assigned_once_in_visit_order() {
    let mut graph = loaded();
    assert_eq!(graph.render_id(1), Some(1));
    assert_eq!(graph.render_id(2), Some(2));
    assert_eq!(graph.render_id(4), Some(3));
    assert_eq!(graph.render_id(3), Some(4));
    graph.toggle(2).unwrap();
    graph.toggle(2).unwrap();
    assert_eq!(graph.render_id(4), Some(3));
    assert_eq!(graph.render_id(99), None);
}

#[test]
fn durations_drive_fill_and_labels() {
    let graph = loaded();
    assert_eq!(graph.total_duration("1"), Some(100.0));
    assert_eq!(graph.max_total_duration(), 100.0);

    let root = &graph.rendered().nodes[&graph.render_id(1).unwrap()];
    assert_eq!(root.glyph.fill, NodeFill::Solid(Rgb(255, 0, 0)));
    let leaf = &graph.rendered().nodes[&graph.render_id(4).unwrap()];
    assert_eq!(leaf.glyph.fill, NodeFill::Solid(Rgb::WHITE));

    let edges = &graph.rendered().edges;
    assert_eq!(edges["2-4"].label, "2");
    assert_eq!(edges["1-1"].label, "");
    assert_eq!(edges["2-3"].path.end(), Some(Point::new(47.0 - 12.0, 100.0)));
}

#[test]
fn collapse_then_expand_restores_positions_and_edges() {
    let mut graph = loaded();
    let before: Vec<(u64, Point)> = graph.rendered().nodes.iter().map(|(k, n)| (*k, n.pos)).collect();
    let edges_before: Vec<String> = graph.rendered().edges.keys().cloned().collect();

    let plan = graph.toggle(2).unwrap();
    assert_eq!(plan.node_counts().exit, 1);
    let gone = plan.node(3).unwrap();
    assert_eq!(gone.phase, Phase::Exit);
    // Leaves 2 and 3 now share a parent and close up around the root.
    assert_eq!(gone.to, Point::new(-23.5, 100.0));
    assert_eq!(plan.edge("2-4").unwrap().phase, Phase::Exit);
    assert!(!graph.rendered().edges.contains_key("2-4"));
    assert!(graph.rendered().nodes[&2].glyph.collapsed);

    let plan = graph.toggle(2).unwrap();
    let back = plan.node(3).unwrap();
    assert_eq!(back.phase, Phase::Enter);
    assert_eq!(back.from, Point::new(-23.5, 100.0));

    let after: Vec<(u64, Point)> = graph.rendered().nodes.iter().map(|(k, n)| (*k, n.pos)).collect();
    let mut before_sorted = before.clone();
    let mut after_sorted = after.clone();
    before_sorted.sort_by_key(|(k, _)| *k);
    after_sorted.sort_by_key(|(k, _)| *k);
    assert_eq!(before_sorted, after_sorted);

    let mut edges_after: Vec<String> = graph.rendered().edges.keys().cloned().collect();
    let mut edges_before = edges_before;
    edges_before.sort();
    edges_after.sort();
    assert_eq!(edges_before, edges_after);
}

#[test]
fn header_names_are_not_wrapped() {
    use trialgraph::render::NodeName;
    let graph = loaded();
    let g = &graph.rendered().nodes[&graph.render_id(3).unwrap()];
    assert_eq!(
        g.glyph.name,
        NodeName::Header {
            title: "g".into(),
            detail: "line 3".into()
        }
    );
}

#[test]
fn unknown_nodes_and_empty_graphs_error() {
    let mut graph = loaded();
    assert!(matches!(graph.toggle(42), Err(TrialGraphError::UnknownNode(42))));

    let mut empty = TrialGraph::new("g2", TrialConfig::default(), HostCallbacks::default());
    assert!(matches!(empty.toggle(1), Err(TrialGraphError::NotLoaded)));
    empty.load(TrialGraphData::default(), "1", "1").unwrap();
    assert!(empty.rendered().is_empty());
}

#[test]
fn plain_click_toggles() {
    let mut graph = loaded();
    let now = Instant::now();
    assert_eq!(graph.click(2, false, now).unwrap(), Interaction::Toggled);
    // Not comparable in a single-trial view, so the modifier still toggles.
    assert_eq!(graph.click(2, true, now).unwrap(), Interaction::Toggled);
    assert!(!graph.rendered().nodes[&2].glyph.collapsed);
}

#[test]
fn custom_size_overrides_window() {
    let callbacks = HostCallbacks::default().with_size(|_| (1200.0, 800.0));
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), callbacks);
    graph.load(single_trial(), "1", "1").unwrap();
    assert_eq!(graph.config().width, 1200.0);
    assert_eq!(graph.config().height, 800.0);

    graph.zoom(Transform { x: 3.0, y: 4.0, k: 2.0 });
    graph.restore_position();
    assert_eq!(graph.transform(), Transform::translate(630.0, 50.0));
}

#[test]
fn set_distances_relayouts() {
    let mut graph = loaded();
    graph.set_distances(60.0, 80.0).unwrap();
    assert_eq!(rendered_pos(&graph, 4), Point::new(-60.0, 160.0));
    assert_eq!(graph.plan().node_counts().update, 4);
}

#[test]
fn diff_view_splits_and_offsets_nodes() {
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), HostCallbacks::default());
    graph.load(two_trials(), "1", "2").unwrap();
    assert_eq!(graph.max_total_duration(), 20.0);

    let root = &graph.rendered().nodes[&graph.render_id(1).unwrap()];
    assert!(root.glyph.split);
    assert_eq!(
        root.glyph.fill,
        NodeFill::Split {
            left: Rgb(255, 128, 128),
            right: Rgb(255, 0, 0),
        }
    );
    let extra = &graph.rendered().nodes[&graph.render_id(2).unwrap()];
    assert_eq!(extra.pos, Point::new(0.0, 140.0));
    assert_eq!(extra.glyph.stroke, Rgb::GREEN);
    assert_eq!(graph.rendered().edges["1-2"].style.marker, trialgraph::label::Marker::After);
}

#[test]
fn hover_picks_trial_by_glyph_half() {
    let config = TrialConfig {
        use_tooltip: true,
        ..Default::default()
    };
    let mut graph = TrialGraph::new("g1", config, HostCallbacks::default());
    graph.load(two_trials(), "1", "2").unwrap();

    graph.hover(1, 15.0, Point::new(100.0, 100.0)).unwrap();
    assert!(graph.tooltip().is_visible());
    assert_eq!(graph.tooltip().trial_id.as_deref(), Some("2"));
    assert_eq!(
        graph.tooltip().content,
        Some(TooltipContent::Html("<b>second</b>".into()))
    );

    graph.hover(1, 4.0, Point::new(100.0, 100.0)).unwrap();
    assert_eq!(graph.tooltip().trial_id.as_deref(), Some("1"));

    graph.zoom(Transform::default());
    assert!(!graph.tooltip().is_visible());
}

#[test]
fn hover_without_tooltips_still_notifies_host() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callbacks = HostCallbacks::default()
        .with_mouse_over(move |_, node| {
            sink.lock().unwrap().push(node.data.index);
            true
        });
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), callbacks);
    graph.load(single_trial(), "1", "1").unwrap();
    graph.hover(3, 5.0, Point::ZERO).unwrap();
    assert!(!graph.tooltip().is_visible());
    assert_eq!(*seen.lock().unwrap(), vec![3]);
}

#[test]
fn query_tooltip_loads_each_activation_once() {
    let loads = Arc::new(Mutex::new(Vec::new()));
    let sink = loads.clone();
    let callbacks = HostCallbacks::default().with_load_tooltip(move |_, marker| {
        sink.lock().unwrap().push(marker.activation_id.clone());
    });
    let config = TrialConfig {
        use_tooltip: true,
        query_tooltip: true,
        ..Default::default()
    };
    let mut graph = TrialGraph::new("g1", config, callbacks);
    graph.load(two_trials(), "1", "2").unwrap();

    graph.hover(1, 2.0, Point::ZERO).unwrap();
    graph.hover(1, 2.0, Point::ZERO).unwrap();
    assert_eq!(*loads.lock().unwrap(), vec!["5", "7"]);
    assert_eq!(graph.tooltip().content.as_ref().map(|c| c.html()), Some(String::new()));

    let data = ActivationData {
        id: "5".into(),
        name: "main".into(),
        hash: String::new(),
        line: 3,
        start: String::new(),
        finish: String::new(),
        duration: 10.0,
        return_value: "None".into(),
    };
    graph.store_activation(data.clone());
    assert_eq!(
        graph.tooltip().content.as_ref().map(|c| c.html()),
        Some(activation_html(&data))
    );
    assert!(graph.cache().contains("5"));
}

#[test]
fn hit_test_reports_local_offset() {
    let graph = loaded();
    // Node 3 is centered at (47, 100).
    let (index, local_x) = graph.hit_test(Point::new(50.0, 95.0)).unwrap();
    assert_eq!(index, 3);
    assert!((local_x - 13.0).abs() < 1e-4);
    assert!(graph.hit_test(Point::new(300.0, 300.0)).is_none());
}

#[test]
fn modifier_click_runs_the_diff_flow() {
    let transport = RecordingTransport::default();
    let shown = Arc::new(Mutex::new(Vec::new()));
    let sink = shown.clone();
    let callbacks = HostCallbacks::default().with_show_diff(move |payload, label| {
        sink.lock().unwrap().push((payload.clone(), label.to_string()));
    });
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), callbacks).with_transport(transport.clone());
    graph.load(two_trials(), "1", "2").unwrap();

    let now = Instant::now();
    assert_eq!(graph.click(1, true, now).unwrap(), Interaction::DiffStarted);
    let sent = transport.take();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|(t, _)| t.graph_id == "g1"));
    assert!(graph.diff().modal().is_some());

    // A completion addressed to another graph is ignored.
    graph.on_backend_response(Completion {
        ticket: Ticket {
            graph_id: "other".into(),
            seq: sent[0].0.seq,
        },
        result: Ok(json!({"function_params": ["x"]})),
    });
    assert_eq!(graph.diff().outstanding(), 3);

    for (ticket, _) in &sent {
        graph.on_backend_response(Completion {
            ticket: ticket.clone(),
            result: Ok(json!({"function_params": []})),
        });
    }
    let modal = graph.diff().modal().unwrap();
    assert_eq!(modal.choices[0].options.len(), 2);
    assert_eq!(modal.choices[1].options.len(), 1);

    graph.select_activation(0, "7").unwrap();
    graph.confirm_diff(now).unwrap();
    let sent = transport.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.path(), "commands/diff/1/7/2/9");

    graph.on_backend_response(Completion {
        ticket: sent[0].0.clone(),
        result: Ok(json!({"lines": 3})),
    });
    assert!(graph.diff().is_idle());
    let shown = shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].0, json!({"lines": 3}));
    assert_eq!(shown[0].1, "Diff trial 1 activation_id 7 trial 2 activation_id 9");
}

#[test]
fn second_diff_while_busy_is_rejected() {
    let transport = RecordingTransport::default();
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), HostCallbacks::default())
        .with_transport(transport.clone());
    graph.load(two_trials(), "1", "2").unwrap();
    let now = Instant::now();
    graph.start_diff(1, now).unwrap();
    assert!(matches!(
        graph.start_diff(1, now),
        Err(TrialGraphError::Diff(DiffError::Busy))
    ));
    graph.cancel_diff();
    assert!(graph.diff().is_idle());
}

fn query_config() -> TrialConfig {
    TrialConfig {
        use_tooltip: true,
        query_tooltip: true,
        ..Default::default()
    }
}

#[test]
fn failed_activation_load_is_retried() {
    let loads = Arc::new(Mutex::new(Vec::new()));
    let sink = loads.clone();
    let callbacks = HostCallbacks::default().with_load_tooltip(move |_, marker| {
        sink.lock().unwrap().push(marker.activation_id.clone());
    });
    let mut graph = TrialGraph::new("g1", query_config(), callbacks);
    graph.load(two_trials(), "1", "2").unwrap();

    graph.hover(1, 2.0, Point::ZERO).unwrap();
    assert_eq!(*loads.lock().unwrap(), vec!["5", "7"]);

    // The host never stores "5"; reporting the failure allows another load.
    graph.activation_failed("5");
    assert!(!graph.cache().is_pending("5"));
    assert!(graph.cache().is_pending("7"));
    graph.hover(1, 2.0, Point::ZERO).unwrap();
    assert_eq!(*loads.lock().unwrap(), vec!["5", "7", "5"]);
}

#[test]
fn query_tooltip_without_loader_requests_nothing() {
    let mut graph = TrialGraph::new("g1", query_config(), HostCallbacks::default());
    graph.load(two_trials(), "1", "2").unwrap();
    graph.hover(1, 2.0, Point::ZERO).unwrap();
    assert!(graph.tooltip().is_visible());
    assert!(!graph.cache().is_pending("5"));
    assert!(!graph.cache().is_pending("7"));

    // A loader installed later still gets asked.
    let loads = Arc::new(Mutex::new(Vec::new()));
    let sink = loads.clone();
    let callbacks = HostCallbacks::default().with_load_tooltip(move |_, marker| {
        sink.lock().unwrap().push(marker.activation_id.clone());
    });
    let mut graph = TrialGraph::new("g1", query_config(), callbacks);
    graph.load(two_trials(), "1", "2").unwrap();
    graph.hover(1, 2.0, Point::ZERO).unwrap();
    assert_eq!(loads.lock().unwrap().len(), 2);
}

#[test]
fn diff_without_transport_fails_visibly() {
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), HostCallbacks::default());
    graph.load(two_trials(), "1", "2").unwrap();
    let now = Instant::now();

    // Every argument lookup fails at once, so the modal is not left waiting.
    assert_eq!(graph.click(1, true, now).unwrap(), Interaction::DiffStarted);
    assert_eq!(graph.diff().outstanding(), 0);
    let modal = graph.diff().modal().unwrap();
    assert_eq!(modal.choices[0].failed.len(), 2);
    assert_eq!(modal.choices[1].failed.len(), 1);
    assert!(modal.choices.iter().all(|c| c.is_complete()));
    assert!(matches!(
        graph.take_diff_notice(),
        Some(DiffError::Fetch(FetchError::Network(_)))
    ));

    // Nothing was selectable, so confirming is refused and cancel returns to idle.
    assert!(matches!(graph.confirm_diff(now), Err(DiffError::NoSelection(_))));
    graph.cancel_diff();
    assert!(graph.diff().is_idle());
}

#[test]
fn direct_comparison_without_transport_returns_to_idle() {
    let mut data = two_trials();
    data.root.as_mut().unwrap().activations.insert("1".into(), vec!["5".into()]);
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), HostCallbacks::default());
    graph.load(data, "1", "2").unwrap();

    graph.start_diff(1, Instant::now()).unwrap();
    assert!(graph.diff().is_idle());
    assert!(matches!(
        graph.take_diff_notice(),
        Some(DiffError::Fetch(FetchError::Network(_)))
    ));
}

#[test]
fn default_trials_follow_dataset_order() {
    assert_eq!(two_trials().default_trials(), Some(("1".into(), "2".into())));
    assert_eq!(single_trial().default_trials(), Some(("1".into(), "1".into())));
    assert_eq!(TrialGraphData::default().default_trials(), None);
}

#[test]
fn fill_is_measured_from_zero_not_trial_start() {
    let mut data = single_trial();
    data.min_duration.insert("1".into(), 20.0);
    data.max_duration.insert("1".into(), 120.0);
    data.root.as_mut().unwrap().children[0].duration.insert("1".into(), 20.0);
    let mut graph = TrialGraph::new("g1", TrialConfig::default(), HostCallbacks::default());
    graph.load(data, "1", "1").unwrap();
    assert_eq!(graph.max_total_duration(), 100.0);

    // A duration equal to the trial start is not white; only zero is.
    let f = &graph.rendered().nodes[&graph.render_id(2).unwrap()];
    assert_eq!(f.glyph.fill, NodeFill::Solid(Rgb(255, 204, 204)));
    let h = &graph.rendered().nodes[&graph.render_id(4).unwrap()];
    assert_eq!(h.glyph.fill, NodeFill::Solid(Rgb::WHITE));
}
