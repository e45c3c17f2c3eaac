//! Edge routing between positioned tree nodes.
//!
//! Routes are produced as [`EdgePath`] descriptors made of SVG-like segments
//! so that the same geometry feeds the SVG export (via [`EdgePath::to_svg`])
//! and the interactive painter (via [`EdgePath::flatten`]).
//!
//! Coordinates follow the layout convention: `x` grows to the right and `y`
//! grows downwards with tree depth.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::model::{EdgeKind, NodeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }

    pub fn distance(self, other: Point) -> f32 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// Tunable routing constants. The defaults reproduce the reference look and
/// only affect aesthetics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Radius of a node glyph.
    pub node_radius: f32,
    /// Gap between a glyph and the start/end of an edge.
    pub marker_gap: f32,
    /// Distance of the synthetic entry point above-left of the root.
    pub initial_offset: f32,
    /// Extra shortening of vertical call/return edges so markers do not overlap.
    pub vertical_nudge: f32,
    /// Self-loop ellipse radii.
    pub loop_radii: (f32, f32),
    /// Self-loop ellipse rotation in degrees.
    pub loop_rotation: f32,
    /// Offset of the self-loop end point from its start point.
    pub loop_end: (f32, f32),
    /// Vertical separation applied to single-trial nodes in a diff view.
    pub trial_offset: f32,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            node_radius: 10.0,
            marker_gap: 2.0,
            initial_offset: 20.0,
            vertical_nudge: 20.0,
            loop_radii: (15.0, 20.0),
            loop_rotation: -45.0,
            loop_end: (5.0, 8.0),
            trial_offset: 40.0,
        }
    }
}

impl RouteConfig {
    /// Routing radius: glyph radius plus marker gap.
    pub fn radius(&self) -> f32 {
        self.node_radius + self.marker_gap
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(Point),
    LineTo(Point),
    CubicTo {
        c1: Point,
        c2: Point,
        to: Point,
    },
    ArcTo {
        radii: (f32, f32),
        rotation: f32,
        large_arc: bool,
        sweep: bool,
        to: Point,
    },
}

impl PathSegment {
    fn end(&self) -> Point {
        match *self {
            PathSegment::MoveTo(p) | PathSegment::LineTo(p) => p,
            PathSegment::CubicTo { to, .. } | PathSegment::ArcTo { to, .. } => to,
        }
    }

    fn map_points(&self, f: impl Fn(Point) -> Point) -> PathSegment {
        match *self {
            PathSegment::MoveTo(p) => PathSegment::MoveTo(f(p)),
            PathSegment::LineTo(p) => PathSegment::LineTo(f(p)),
            PathSegment::CubicTo { c1, c2, to } => PathSegment::CubicTo {
                c1: f(c1),
                c2: f(c2),
                to: f(to),
            },
            PathSegment::ArcTo {
                radii,
                rotation,
                large_arc,
                sweep,
                to,
            } => PathSegment::ArcTo {
                radii,
                rotation,
                large_arc,
                sweep,
                to: f(to),
            },
        }
    }
}

/// A routed edge: a path starting with a `MoveTo`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EdgePath {
    pub segments: Vec<PathSegment>,
}

impl EdgePath {
    pub fn line(from: Point, to: Point) -> Self {
        Self {
            segments: vec![PathSegment::MoveTo(from), PathSegment::LineTo(to)],
        }
    }

    pub fn cubic(from: Point, c1: Point, c2: Point, to: Point) -> Self {
        Self {
            segments: vec![PathSegment::MoveTo(from), PathSegment::CubicTo { c1, c2, to }],
        }
    }

    pub fn start(&self) -> Option<Point> {
        self.segments.first().map(|s| s.end())
    }

    pub fn end(&self) -> Option<Point> {
        self.segments.last().map(|s| s.end())
    }

    /// Same shape as `self`, with every point moved to `p`. Used as the
    /// starting state of entering edges.
    pub fn collapsed_at(&self, p: Point) -> EdgePath {
        EdgePath {
            segments: self.segments.iter().map(|s| s.map_points(|_| p)).collect(),
        }
    }

    /// Interpolate between two paths of identical structure. Returns `None`
    /// when the structures differ; callers then jump to the target path.
    pub fn lerp(&self, other: &EdgePath, t: f32) -> Option<EdgePath> {
        if self.segments.len() != other.segments.len() {
            return None;
        }
        let mut out = Vec::with_capacity(self.segments.len());
        for (a, b) in self.segments.iter().zip(&other.segments) {
            let seg = match (*a, *b) {
                (PathSegment::MoveTo(p), PathSegment::MoveTo(q)) => PathSegment::MoveTo(p.lerp(q, t)),
                (PathSegment::LineTo(p), PathSegment::LineTo(q)) => PathSegment::LineTo(p.lerp(q, t)),
                (
                    PathSegment::CubicTo { c1, c2, to },
                    PathSegment::CubicTo { c1: d1, c2: d2, to: dt },
                ) => PathSegment::CubicTo {
                    c1: c1.lerp(d1, t),
                    c2: c2.lerp(d2, t),
                    to: to.lerp(dt, t),
                },
                (
                    PathSegment::ArcTo {
                        radii,
                        rotation,
                        large_arc,
                        sweep,
                        to,
                    },
                    PathSegment::ArcTo { to: dt, .. },
                ) => PathSegment::ArcTo {
                    radii,
                    rotation,
                    large_arc,
                    sweep,
                    to: to.lerp(dt, t),
                },
                _ => return None,
            };
            out.push(seg);
        }
        Some(EdgePath { segments: out })
    }

    /// Serialize as SVG path data.
    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            if !out.is_empty() {
                out.push(' ');
            }
            // Writing into a String cannot fail.
            let _ = match *seg {
                PathSegment::MoveTo(p) => write!(out, "M {},{}", p.x, p.y),
                PathSegment::LineTo(p) => write!(out, "L {},{}", p.x, p.y),
                PathSegment::CubicTo { c1, c2, to } => write!(
                    out,
                    "C {} {}, {} {}, {} {}",
                    c1.x, c1.y, c2.x, c2.y, to.x, to.y
                ),
                PathSegment::ArcTo {
                    radii,
                    rotation,
                    large_arc,
                    sweep,
                    to,
                } => write!(
                    out,
                    "A {},{} {},{},{} {},{}",
                    radii.0, radii.1, rotation, large_arc as u8, sweep as u8, to.x, to.y
                ),
            };
        }
        out
    }

    /// Approximate the path with a polyline. `steps` is the number of
    /// subdivisions used for each curved segment.
    pub fn flatten(&self, steps: usize) -> Vec<Point> {
        let steps = steps.max(1);
        let mut pts: Vec<Point> = Vec::new();
        let mut cur = Point::ZERO;
        for seg in &self.segments {
            match *seg {
                PathSegment::MoveTo(p) => {
                    pts.push(p);
                    cur = p;
                }
                PathSegment::LineTo(p) => {
                    pts.push(p);
                    cur = p;
                }
                PathSegment::CubicTo { c1, c2, to } => {
                    for i in 1..=steps {
                        let t = i as f32 / steps as f32;
                        pts.push(cubic_point(cur, c1, c2, to, t));
                    }
                    cur = to;
                }
                PathSegment::ArcTo {
                    radii,
                    rotation,
                    large_arc,
                    sweep,
                    to,
                } => {
                    pts.extend(arc_points(cur, radii, rotation, large_arc, sweep, to, steps));
                    cur = to;
                }
            }
        }
        pts
    }

    /// Every explicit point of the path (control points included).
    pub fn points(&self) -> Vec<Point> {
        let mut out = Vec::new();
        for seg in &self.segments {
            match *seg {
                PathSegment::MoveTo(p) | PathSegment::LineTo(p) => out.push(p),
                PathSegment::CubicTo { c1, c2, to } => out.extend([c1, c2, to]),
                PathSegment::ArcTo { to, .. } => out.push(to),
            }
        }
        out
    }
}

fn cubic_point(p0: Point, p1: Point, p2: Point, p3: Point, t: f32) -> Point {
    let u = 1.0 - t;
    let a = u * u * u;
    let b = 3.0 * u * u * t;
    let c = 3.0 * u * t * t;
    let d = t * t * t;
    Point::new(
        a * p0.x + b * p1.x + c * p2.x + d * p3.x,
        a * p0.y + b * p1.y + c * p2.y + d * p3.y,
    )
}

/// Sample an SVG elliptical arc using the endpoint-to-center conversion of
/// the SVG implementation notes (F.6.5).
fn arc_points(
    from: Point,
    radii: (f32, f32),
    rotation_deg: f32,
    large_arc: bool,
    sweep: bool,
    to: Point,
    steps: usize,
) -> Vec<Point> {
    let (mut rx, mut ry) = (radii.0.abs(), radii.1.abs());
    if rx == 0.0 || ry == 0.0 || from == to {
        return vec![to];
    }
    let phi = rotation_deg.to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let dx2 = (from.x - to.x) / 2.0;
    let dy2 = (from.y - to.y) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
    if lambda > 1.0 {
        let s = lambda.sqrt();
        rx *= s;
        ry *= s;
    }
    let num = rx * rx * ry * ry - rx * rx * y1p * y1p - ry * ry * x1p * x1p;
    let den = rx * rx * y1p * y1p + ry * ry * x1p * x1p;
    let mut coef = if den == 0.0 { 0.0 } else { (num / den).max(0.0).sqrt() };
    if large_arc == sweep {
        coef = -coef;
    }
    let cxp = coef * rx * y1p / ry;
    let cyp = -coef * ry * x1p / rx;
    let cx = cos_phi * cxp - sin_phi * cyp + (from.x + to.x) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (from.y + to.y) / 2.0;

    let angle = |ux: f32, uy: f32, vx: f32, vy: f32| -> f32 {
        let dot = ux * vx + uy * vy;
        let len = (ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt();
        let mut a = (dot / len).clamp(-1.0, 1.0).acos();
        if ux * vy - uy * vx < 0.0 {
            a = -a;
        }
        a
    };
    let theta1 = angle(1.0, 0.0, (x1p - cxp) / rx, (y1p - cyp) / ry);
    let mut delta = angle(
        (x1p - cxp) / rx,
        (y1p - cyp) / ry,
        (-x1p - cxp) / rx,
        (-y1p - cyp) / ry,
    );
    let tau = std::f32::consts::TAU;
    if !sweep && delta > 0.0 {
        delta -= tau;
    } else if sweep && delta < 0.0 {
        delta += tau;
    }

    (1..=steps)
        .map(|i| {
            let th = theta1 + delta * (i as f32 / steps as f32);
            let (s, c) = th.sin_cos();
            Point::new(
                cx + rx * c * cos_phi - ry * s * sin_phi,
                cy + rx * c * sin_phi + ry * s * cos_phi,
            )
        })
        .collect()
}

/// A routed endpoint: the node's rendered center plus the sibling metadata
/// needed to recognise same-caller edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    pub pos: Point,
    pub parent_index: Option<NodeIndex>,
    pub children_index: i64,
}

/// Compute the path of an edge between two positioned nodes.
pub fn route_edge(kind: EdgeKind, source: &Endpoint, target: &Endpoint, cfg: &RouteConfig) -> EdgePath {
    let (mut x1, mut y1) = (source.pos.x, source.pos.y);
    let (mut x2, mut y2) = (target.pos.x, target.pos.y);
    let dx = x2 - x1;
    let dy = y2 - y1;
    let r = cfg.radius();
    // atan of ±inf is ±pi/2, matching a vertical or horizontal edge. Both
    // zero only happens for self edges, where no offset is applied.
    let (theta, phi) = if dx == 0.0 && dy == 0.0 {
        (0.0, 0.0)
    } else {
        ((dx / dy).atan(), (dy / dx).atan())
    };
    let (sin_theta, cos_theta) = (r * theta.sin(), r * theta.cos());
    let (sin_phi, cos_phi) = (r * phi.sin(), r * phi.cos());
    let m1 = if y2 > y1 { 1.0 } else { -1.0 };
    let m2 = if x2 > x1 { -1.0 } else { 1.0 };

    match kind {
        EdgeKind::Initial => {
            let o = cfg.initial_offset;
            return EdgePath::line(
                Point::new(x2 - o, y2 - o),
                Point::new(x2 - r / 2.0, y2 - r / 2.0),
            );
        }
        EdgeKind::Call | EdgeKind::Return if !(dx == 0.0 && dy == 0.0) => {
            x1 += m1 * sin_theta;
            y1 += m1 * cos_theta;
            x2 += m2 * cos_phi;
            y2 += m2 * sin_phi;
            if dx == 0.0 {
                if y1 > y2 {
                    y2 += cfg.vertical_nudge;
                } else {
                    y2 -= cfg.vertical_nudge;
                }
            }
            return EdgePath::line(Point::new(x1, y1), Point::new(x2, y2));
        }
        _ => {}
    }

    if dx == 0.0 && dy == 0.0 {
        return EdgePath {
            segments: vec![
                PathSegment::MoveTo(Point::new(x1, y1)),
                PathSegment::ArcTo {
                    radii: cfg.loop_radii,
                    rotation: cfg.loop_rotation,
                    large_arc: true,
                    sweep: true,
                    to: Point::new(x2 + cfg.loop_end.0, y2 + cfg.loop_end.1),
                },
            ],
        };
    }

    if source.parent_index == target.parent_index {
        if dy == 0.0 && source.children_index == target.children_index - 1 {
            // Immediate sequence
            return EdgePath::line(Point::new(x1, y1), Point::new(x2 + m2 * cos_phi, y2));
        }
        let sign;
        if y1 < y2 {
            x1 += m1 * sin_theta;
            y1 += m1 * cos_theta;
            y2 -= r;
            sign = -1.0;
        } else if y2 < y1 {
            x1 += m1 * sin_theta;
            y1 += m1 * cos_theta;
            y2 += r;
            sign = 1.0;
        } else if x1 >= x2 {
            y1 += r;
            y2 += r;
            sign = 2.0;
        } else {
            y1 -= r;
            y2 -= r;
            sign = -1.0;
        }
        let mx = (x1 + x2) / 2.0;
        return EdgePath::cubic(
            Point::new(x1, y1),
            Point::new(mx, y1 + r * sign),
            Point::new(mx, y2 + r * sign),
            Point::new(x2, y2),
        );
    }

    // Other caller
    x1 += m1 * sin_theta;
    y1 += m1 * cos_theta;
    x2 += m2 * cos_phi;
    y2 += m2 * sin_phi;
    let mx = (x1 + x2) / 2.0;
    EdgePath::cubic(
        Point::new(x1, y1),
        Point::new(mx, y1),
        Point::new(mx, y2),
        Point::new(x2, y2),
    )
}

/// d3's default transition easing (`easeCubicInOut`).
pub fn ease_cubic_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0) * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

/// Pan/zoom state of a graph view (`translate(x, y) scale(k)`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, k: 1.0 }
    }
}

impl Transform {
    pub fn translate(x: f32, y: f32) -> Self {
        Self { x, y, k: 1.0 }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.k + self.x, p.y * self.k + self.y)
    }

    pub fn invert(&self, p: Point) -> Point {
        Point::new((p.x - self.x) / self.k, (p.y - self.y) / self.k)
    }

    /// Zoom by `factor` keeping the screen point `focus` fixed.
    pub fn zoom_about(&self, focus: Point, factor: f32) -> Self {
        let k = self.k * factor;
        let world = self.invert(focus);
        Self {
            x: focus.x - world.x * k,
            y: focus.y - world.y * k,
            k,
        }
    }

    pub fn to_svg(&self) -> String {
        format!("translate({},{}) scale({})", self.x, self.y, self.k)
    }
}
