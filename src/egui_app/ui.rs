#![cfg(feature = "egui")]

use std::time::Instant;

use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Shape, Stroke, Vec2};
use tracing::warn;

use super::geometry::{arrow_head, color32, half_disc, last_segment, to_screen, to_world};
use super::state::TrialApp;
use crate::color::NodeFill;
use crate::diff_flow::DiffState;
use crate::geometry::Point;
use crate::graph::{Interaction, GLYPH_SIZE};
use crate::label::{place_label, Measurer};
use crate::render::{NodeGlyph, NodeName, Phase};
use crate::tooltip::{html_to_text, SHOWN_OPACITY};

pub fn update(app: &mut TrialApp, ctx: &egui::Context) {
    let now = Instant::now();
    app.poll(now);
    toolbar(app, ctx, now);
    canvas(app, ctx, now);
    tooltip(app, ctx);
    selection_modal(app, ctx, now);
    diff_windows(app, ctx);
    if app.animation_progress(now) < 1.0 || !app.graph.diff().is_idle() {
        ctx.request_repaint();
    }
}

fn toolbar(app: &mut TrialApp, ctx: &egui::Context, now: Instant) {
    egui::TopBottomPanel::top("trial_toolbar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if let Some(form) = app.custom_form.clone() {
                form(&mut app.graph, ui);
                ui.separator();
            }
            if ui.button("Restore zoom").clicked() {
                app.graph.restore_position();
            }

            let mut tooltips = app.graph.config().use_tooltip;
            if ui
                .checkbox(&mut tooltips, "Tooltips")
                .on_hover_text("Show tooltips on mouse hover")
                .changed()
            {
                app.graph.set_use_tooltip(tooltips);
            }

            if ui.button("Download SVG").clicked() {
                app.notice = Some(match app.graph.download(None) {
                    Ok(path) => format!("Wrote {}", path),
                    Err(e) => e.to_string(),
                });
            }

            ui.checkbox(&mut app.show_fonts, "Font size");
            if app.show_fonts {
                let mut size = app.graph.config().font_size;
                if ui
                    .add(egui::DragValue::new(&mut size).range(4.0..=48.0))
                    .on_hover_text("Node font size")
                    .changed()
                {
                    app.graph.set_font_size(size);
                }
                let mut label_size = app.graph.config().label_font_size;
                if ui
                    .add(egui::DragValue::new(&mut label_size).range(4.0..=48.0))
                    .on_hover_text("Arrow font size")
                    .changed()
                {
                    app.graph.set_label_font_size(label_size);
                }
            }

            ui.checkbox(&mut app.show_distances, "Distances");
            if app.show_distances {
                let (mut x, mut y) = (app.graph.config().node_size_x, app.graph.config().node_size_y);
                let cx = ui
                    .add(egui::DragValue::new(&mut x).range(10.0..=500.0))
                    .on_hover_text("Node horizontal distance")
                    .changed();
                let cy = ui
                    .add(egui::DragValue::new(&mut y).range(10.0..=500.0))
                    .on_hover_text("Node vertical distance")
                    .changed();
                if cx || cy {
                    match app.graph.set_distances(x, y) {
                        Ok(()) => app.restart_animation(now),
                        Err(e) => app.notice = Some(e.to_string()),
                    }
                }
            }

            if let DiffState::RequestInFlight(flight) = app.graph.diff().state() {
                ui.separator();
                ui.spinner();
                ui.label(&flight.label);
            }
            if let Some(notice) = app.notice.clone() {
                ui.separator();
                ui.colored_label(Color32::YELLOW, notice);
                if ui.small_button("✕").clicked() {
                    app.notice = None;
                }
            }
        });
    });
}

struct EguiMeasurer<'a> {
    painter: &'a egui::Painter,
    font: FontId,
}

impl Measurer for EguiMeasurer<'_> {
    fn measure(&self, text: &str) -> (f32, f32) {
        let galley = self
            .painter
            .layout_no_wrap(text.to_string(), self.font.clone(), Color32::BLACK);
        let s = galley.size();
        (s.x, s.y)
    }
}

fn canvas(app: &mut TrialApp, ctx: &egui::Context, now: Instant) {
    egui::CentralPanel::default().show(ctx, |ui| {
        let rect = ui.available_rect_before_wrap();
        let origin = rect.min;
        let resp = ui.interact(rect, ui.id().with("trial_canvas"), Sense::click_and_drag());

        // Pan and zoom
        let mut transform = app.graph.transform();
        if resp.dragged() {
            let d = resp.drag_delta();
            transform.x += d.x;
            transform.y += d.y;
            app.graph.zoom(transform);
        }
        let scroll_y = ui.input(|i| i.raw_scroll_delta.y);
        if scroll_y.abs() > 0.0 && resp.hovered() {
            let factor = (1.0_f32 + scroll_y * 0.001).max(0.1);
            let k = (transform.k * factor).clamp(0.1, 10.0);
            if (k - transform.k).abs() > f32::EPSILON {
                let cursor = resp.hover_pos().unwrap_or(rect.center());
                let focus = Point::new(cursor.x - origin.x, cursor.y - origin.y);
                app.graph.zoom(transform.zoom_about(focus, k / transform.k));
            }
        }
        let transform = app.graph.transform();

        // Hover and click
        let hit = resp
            .hover_pos()
            .and_then(|p| app.graph.hit_test(to_world(origin, &transform, p)));
        match (hit, app.hovered) {
            (Some((index, local_x)), previous) if previous != Some(index) => {
                if let Some(prev) = previous {
                    if let Err(e) = app.graph.mouse_out(prev) {
                        warn!(error = %e, "mouse out");
                    }
                }
                let pointer = resp.hover_pos().unwrap_or(rect.center());
                if let Err(e) = app.graph.hover(index, local_x, Point::new(pointer.x, pointer.y)) {
                    warn!(error = %e, "hover");
                }
                app.hovered = Some(index);
            }
            (None, Some(prev)) => {
                if let Err(e) = app.graph.mouse_out(prev) {
                    warn!(error = %e, "mouse out");
                }
                app.hovered = None;
            }
            _ => {}
        }
        if resp.clicked() {
            if let Some((index, _)) = hit {
                let modifier = ui.input(|i| i.modifiers.command);
                match app.graph.click(index, modifier, now) {
                    Ok(Interaction::Toggled) => app.restart_animation(now),
                    Ok(Interaction::DiffStarted) => {}
                    Err(e) => app.notice = Some(e.to_string()),
                }
            }
        }

        // Drawing
        let painter = ui.painter_at(rect);
        let t = app.animation_progress(now);
        let grow = app.eased_progress(now);
        let k = transform.k;
        let config = app.graph.config();
        let plan = app.graph.plan();

        let label_font = FontId::proportional(config.label_font_size);
        let measurer = EguiMeasurer {
            painter: &painter,
            font: label_font,
        };
        let mut placed = Vec::new();
        for edge in &plan.edges {
            if edge.phase == Phase::Exit {
                continue;
            }
            let world = edge.path_at(t).flatten(16);
            let pts: Vec<Pos2> = world.iter().map(|p| to_screen(origin, &transform, *p)).collect();
            let style = &edge.edge.style;
            let stroke = Stroke::new(style.width * k, color32(style.stroke));
            match style.dash {
                Some((dash, gap)) => {
                    painter.extend(Shape::dashed_line(&pts, stroke, dash * k, gap * k));
                }
                None => {
                    painter.add(Shape::line(pts.clone(), stroke));
                }
            }
            if let Some(head) = last_segment(&pts).and_then(|(a, b)| arrow_head(a, b, 6.0 * k)) {
                painter.add(Shape::convex_polygon(
                    head.to_vec(),
                    color32(style.marker.fill()),
                    Stroke::NONE,
                ));
            }
            if let Some(label) = place_label(&world, &edge.edge.label, edge.edge.label_offset, &measurer, &placed) {
                placed.push(label.rect);
                painter.text(
                    to_screen(origin, &transform, label.rect.center()),
                    Align2::CENTER_CENTER,
                    &edge.edge.label,
                    FontId::proportional(config.label_font_size * k),
                    Color32::BLACK,
                );
            }
        }

        for node in &plan.nodes {
            let center = to_screen(origin, &transform, node.position_at(t));
            let (scale, alpha) = match node.phase {
                Phase::Enter => (grow, 1.0),
                Phase::Update => (1.0, 1.0),
                Phase::Exit => (1.0 - grow, 1.0 - grow),
            };
            draw_glyph(&painter, center, GLYPH_SIZE * k * scale, &node.node.glyph, k, alpha);
            draw_name(&painter, center, &node.node.glyph.name, config.font_size * k, k, alpha);
        }
    });
}

fn draw_glyph(painter: &egui::Painter, center: Pos2, size: f32, glyph: &NodeGlyph, k: f32, alpha: f32) {
    if size <= 0.0 {
        return;
    }
    let r = Rect::from_center_size(center, Vec2::splat(size));
    let radius = size / 2.0;
    let rounding = if glyph.collapsed { 0.0 } else { radius };
    match glyph.fill {
        NodeFill::Solid(c) => {
            painter.rect_filled(r, rounding, color32(c).gamma_multiply(alpha));
        }
        NodeFill::Split { left, right } => {
            let right = color32(right).gamma_multiply(alpha);
            painter.rect_filled(r, rounding, color32(left).gamma_multiply(alpha));
            if glyph.collapsed {
                let half = Rect::from_min_max(Pos2::new(center.x, r.top()), r.max);
                painter.rect_filled(half, 0.0, right);
            } else {
                painter.add(Shape::convex_polygon(half_disc(center, radius, 16), right, Stroke::NONE));
            }
        }
    }
    let stroke = Stroke::new(3.0 * k, color32(glyph.stroke).gamma_multiply(alpha));
    painter.rect_stroke(r, rounding, stroke, egui::StrokeKind::Middle);
    if glyph.split {
        painter.line_segment(
            [Pos2::new(center.x, r.top()), Pos2::new(center.x, r.bottom())],
            Stroke::new(k, Color32::BLACK.gamma_multiply(alpha)),
        );
    }
}

fn draw_name(painter: &egui::Painter, center: Pos2, name: &NodeName, font_size: f32, k: f32, alpha: f32) {
    let color = Color32::BLACK.gamma_multiply(alpha);
    let font = FontId::proportional(font_size);
    let mut y = center.y + 14.0 * k + font_size * 0.35;
    let lines: Vec<(&str, Color32)> = match name {
        NodeName::Header { title, detail } => vec![(title.as_str(), Color32::from_gray(20)), (detail.as_str(), color)],
        NodeName::Wrapped(lines) => lines.iter().map(|l| (l.as_str(), color)).collect(),
    };
    for (line, c) in lines {
        painter.text(Pos2::new(center.x, y), Align2::CENTER_CENTER, line, font.clone(), c);
        y += font_size * 1.1;
    }
}

fn tooltip(app: &mut TrialApp, ctx: &egui::Context) {
    let tip = app.graph.tooltip();
    if !tip.is_visible() {
        return;
    }
    let Some(content) = &tip.content else { return };
    let text = html_to_text(&content.html());
    if text.is_empty() {
        return;
    }
    egui::Area::new("trial_tooltip".into())
        .order(egui::Order::Tooltip)
        .fixed_pos(Pos2::new(tip.anchor.x, tip.anchor.y))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style())
                .multiply_with_opacity(SHOWN_OPACITY)
                .show(ui, |ui| {
                    ui.label(text);
                });
        });
}

fn selection_modal(app: &mut TrialApp, ctx: &egui::Context, now: Instant) {
    let Some(modal) = app.graph.diff().modal().cloned() else {
        return;
    };
    let mut open = true;
    let mut confirm = false;
    let mut selections: Vec<(usize, String)> = Vec::new();
    egui::Window::new("Select a function activation")
        .collapsible(false)
        .resizable(false)
        .open(&mut open)
        .show(ctx, |ui| {
            ui.label(
                RichText::new(
                    "This function was called multiple times. Select the activations you want to see their diff",
                )
                .strong(),
            );
            for (slot, choice) in modal.choices.iter().enumerate() {
                let which = if slot == 0 { "first" } else { "second" };
                ui.label(format!("Select the {} trial activation:", which));
                let selected_text = choice
                    .selected
                    .as_ref()
                    .and_then(|s| choice.options.iter().find(|o| &o.activation == s))
                    .map(|o| o.label.clone())
                    .unwrap_or_else(|| "loading…".to_string());
                egui::ComboBox::from_id_salt(("trial_diff_choice", slot))
                    .selected_text(selected_text)
                    .show_ui(ui, |ui| {
                        for option in &choice.options {
                            let is_selected = choice.selected.as_deref() == Some(option.activation.as_str());
                            if ui.selectable_label(is_selected, &option.label).clicked() {
                                selections.push((slot, option.activation.clone()));
                            }
                        }
                    });
                if !choice.failed.is_empty() {
                    ui.colored_label(
                        Color32::RED,
                        format!("{} activation(s) could not be loaded", choice.failed.len()),
                    );
                }
            }
            ui.separator();
            confirm = ui.button("Confirm").clicked();
        });

    for (slot, activation) in selections {
        if let Err(e) = app.graph.select_activation(slot, &activation) {
            warn!(error = %e, "activation selection rejected");
        }
    }
    if confirm {
        if let Err(e) = app.graph.confirm_diff(now) {
            app.notice = Some(e.to_string());
        }
    } else if !open {
        app.graph.cancel_diff();
    }
}

fn diff_windows(app: &mut TrialApp, ctx: &egui::Context) {
    for (i, w) in app.diff_windows.iter_mut().enumerate() {
        egui::Window::new(w.label.clone())
            .id(egui::Id::new(("trial_diff_window", i)))
            .open(&mut w.open)
            .resizable(true)
            .vscroll(true)
            .show(ctx, |ui| {
                ui.add(egui::Label::new(RichText::new(&w.body).monospace()).wrap());
            });
    }
    app.diff_windows.retain(|w| w.open);
}
