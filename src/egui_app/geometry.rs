#![cfg(feature = "egui")]

use eframe::egui::{Color32, Pos2, Vec2};

use crate::color::Rgb;
use crate::geometry::{Point, Transform};

pub fn color32(c: Rgb) -> Color32 {
    Color32::from_rgb(c.0, c.1, c.2)
}

/// Map a layout point to screen space. `origin` is the canvas' top-left.
pub fn to_screen(origin: Pos2, transform: &Transform, p: Point) -> Pos2 {
    let v = transform.apply(p);
    Pos2::new(origin.x + v.x, origin.y + v.y)
}

/// Inverse of [`to_screen`].
pub fn to_world(origin: Pos2, transform: &Transform, p: Pos2) -> Point {
    transform.invert(Point::new(p.x - origin.x, p.y - origin.y))
}

/// Last non-degenerate segment of a polyline.
pub fn last_segment(pts: &[Pos2]) -> Option<(Pos2, Pos2)> {
    let tip = *pts.last()?;
    pts.iter()
        .rev()
        .skip(1)
        .find(|p| (tip - **p).length() > 1e-3)
        .map(|&tail| (tail, tip))
}

/// Triangle of an arrowhead whose tip sits at `tip`, pointing away from
/// `tail`. `None` for a zero-length segment.
pub fn arrow_head(tail: Pos2, tip: Pos2, size: f32) -> Option<[Pos2; 3]> {
    let dir = Vec2::new(tip.x - tail.x, tip.y - tail.y);
    let len = dir.length();
    if len <= 1e-3 {
        return None;
    }
    let u = dir / len;
    let perp = Vec2::new(-u.y, u.x);
    let base = tip - u * size;
    Some([tip, base + perp * (size * 0.5), base - perp * (size * 0.5)])
}

/// Right half of a disc as a convex polygon, from top to bottom.
pub fn half_disc(center: Pos2, radius: f32, segments: usize) -> Vec<Pos2> {
    let segments = segments.max(2);
    (0..=segments)
        .map(|i| {
            let a = -std::f32::consts::FRAC_PI_2 + std::f32::consts::PI * i as f32 / segments as f32;
            Pos2::new(center.x + radius * a.cos(), center.y + radius * a.sin())
        })
        .collect()
}
