//! Edge styling, edge count labels and node name wrapping.
//!
//! Label placement follows the textPath convention of the SVG export: the
//! label is centered at a fixed distance along the routed path and lifted a
//! few units off it. When that spot collides with an already placed label we
//! slide along the path in a deterministic order (0, +step, -step, +2*step,
//! ...) and keep the first free position.

use indexmap::IndexMap;

use crate::color::Rgb;
use crate::geometry::Point;
use crate::model::{EdgeKind, TrialId};

/// Arrowhead marker of an edge, chosen by which trials contributed to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Single-trial view or an edge shared by both trials.
    Normal,
    /// Edge present only in the first trial.
    Before,
    /// Edge present only in the second trial.
    After,
}

impl Marker {
    pub const ALL: [Marker; 3] = [Marker::Normal, Marker::Before, Marker::After];

    /// Suffix of the marker element id.
    pub fn id_suffix(&self) -> &'static str {
        match self {
            Marker::Normal => "end",
            Marker::Before => "endbefore",
            Marker::After => "endafter",
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Marker::Normal => "enormal",
            Marker::Before => "ebefore",
            Marker::After => "eafter",
        }
    }

    pub fn fill(&self) -> Rgb {
        match self {
            Marker::Normal => Rgb::BLACK,
            Marker::Before => Rgb::RED,
            Marker::After => Rgb::GREEN,
        }
    }
}

pub fn edge_marker(count: &IndexMap<TrialId, u64>, t1: &TrialId, t2: &TrialId) -> Marker {
    let mut bits = 0;
    if count.contains_key(t1) {
        bits |= 1;
    }
    if count.contains_key(t2) {
        bits |= 2;
    }
    match bits {
        1 => Marker::Before,
        2 => Marker::After,
        _ => Marker::Normal,
    }
}

/// Stroke style of an edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStyle {
    pub stroke: Rgb,
    pub width: f32,
    /// Dash and gap lengths for dashed edges.
    pub dash: Option<(f32, f32)>,
    pub marker: Marker,
}

impl EdgeStyle {
    pub fn dasharray(&self) -> String {
        match self.dash {
            Some((a, b)) => format!("{},{}", a, b),
            None => "none".to_string(),
        }
    }
}

pub const SEQUENCE_STROKE: Rgb = Rgb(0x00, 0x77, 0xff);
pub const EDGE_STROKE: Rgb = Rgb(0x66, 0x66, 0x66);

pub fn edge_style(kind: EdgeKind, count: &IndexMap<TrialId, u64>, t1: &TrialId, t2: &TrialId) -> EdgeStyle {
    EdgeStyle {
        stroke: if kind == EdgeKind::Sequence { SEQUENCE_STROKE } else { EDGE_STROKE },
        width: 1.5,
        dash: (kind == EdgeKind::Return).then_some((10.0, 2.0)),
        marker: edge_marker(count, t1, t2),
    }
}

/// Count label of an edge. Zero counts are treated as absent.
pub fn edge_label(kind: EdgeKind, count: &IndexMap<TrialId, u64>, t1: &TrialId, t2: &TrialId) -> String {
    if kind == EdgeKind::Initial {
        return String::new();
    }
    let c1 = count.get(t1).copied().filter(|&c| c > 0);
    let c2 = count.get(t2).copied().filter(|&c| c > 0);
    match (c1, c2) {
        (c1, _) if t1 == t2 => c1.map(|c| c.to_string()).unwrap_or_default(),
        (Some(a), None) => a.to_string(),
        (None, Some(b)) => b.to_string(),
        (Some(a), Some(b)) => format!("{}, {}", a, b),
        (None, None) => String::new(),
    }
}

/// Distance along the path at which the label is centered.
pub fn label_offset(source: Point, target: Point) -> f32 {
    if source.x == target.x {
        29.0
    } else {
        ((source.x - target.x).abs() - 10.0) / 2.0
    }
}

/// Distance the label is lifted off the path.
pub const LABEL_LIFT: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn from_center_size(c: Point, w: f32, h: f32) -> Self {
        Self {
            min: Point::new(c.x - w / 2.0, c.y - h / 2.0),
            max: Point::new(c.x + w / 2.0, c.y + h / 2.0),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        self.min.lerp(self.max, 0.5)
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !(self.max.x <= other.min.x
            || other.max.x <= self.min.x
            || self.max.y <= other.min.y
            || other.max.y <= self.min.y)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

pub trait Measurer {
    /// Size (width, height) of the rendered text in layout units.
    fn measure(&self, text: &str) -> (f32, f32);
}

/// Monospace-ish estimate used where no font backend is available.
#[derive(Debug, Clone, Copy)]
pub struct ApproxMeasurer {
    pub font_size: f32,
}

impl Measurer for ApproxMeasurer {
    fn measure(&self, text: &str) -> (f32, f32) {
        (text.chars().count() as f32 * self.font_size * 0.6, self.font_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPlacement {
    pub rect: Rect,
    /// Direction of the path at the label, in radians.
    pub angle: f32,
}

/// Point and tangent angle at arc length `s` along a polyline.
pub fn point_along(poly: &[Point], s: f32) -> Option<(Point, f32)> {
    let first = *poly.first()?;
    if poly.len() < 2 {
        return Some((first, 0.0));
    }
    let mut remaining = s.max(0.0);
    let mut last = (first, 0.0);
    for w in poly.windows(2) {
        let len = w[0].distance(w[1]);
        if len <= f32::EPSILON {
            continue;
        }
        let angle = (w[1].y - w[0].y).atan2(w[1].x - w[0].x);
        if remaining <= len {
            return Some((w[0].lerp(w[1], remaining / len), angle));
        }
        remaining -= len;
        last = (w[1], angle);
    }
    Some(last)
}

/// Place an edge label along a flattened path, avoiding `placed` rects.
pub fn place_label(
    poly: &[Point],
    text: &str,
    offset: f32,
    measurer: &dyn Measurer,
    placed: &[Rect],
) -> Option<LabelPlacement> {
    if text.is_empty() {
        return None;
    }
    let (w, h) = measurer.measure(text);
    let total: f32 = poly.windows(2).map(|s| s[0].distance(s[1])).sum();
    let step = (w * 0.5).max(1.0);
    let mut fallback = None;
    for k in 0..12 {
        let shift = if k % 2 == 1 { (k / 2 + 1) as f32 * step } else { -((k / 2) as f32) * step };
        let s = (offset + shift).clamp(0.0, total.max(0.0));
        let Some((p, angle)) = point_along(poly, s) else { continue };
        // Lift perpendicular to the path, towards the side "above" it.
        let (sin, cos) = angle.sin_cos();
        let lift = LABEL_LIFT + h / 2.0;
        let c = Point::new(p.x + sin * lift, p.y - cos * lift);
        let rect = Rect::from_center_size(c, w, h);
        let candidate = LabelPlacement { rect, angle };
        if fallback.is_none() {
            fallback = Some(candidate);
        }
        if !placed.iter().any(|r| r.intersects(&rect)) {
            return Some(candidate);
        }
    }
    fallback
}

/// Greedy word wrap of a node name into lines no wider than `max_width`.
/// A single word longer than the width gets its own line.
pub fn wrap_text(text: &str, max_width: f32, measurer: &dyn Measurer) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        if cur.is_empty() {
            cur.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", cur, word);
        if measurer.measure(&candidate).0 > max_width {
            lines.push(std::mem::take(&mut cur));
            cur.push_str(word);
        } else {
            cur = candidate;
        }
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}
