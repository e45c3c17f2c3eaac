//! Duration and trial-membership color encodings.
use serde::{Deserialize, Serialize};

use crate::model::{ColorClass, TrialId, TrialNodeData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 128, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// CSS functional notation, e.g. `rgb(255, 128, 128)`.
    pub fn to_css(&self) -> String {
        format!("rgb({}, {}, {})", self.0, self.1, self.2)
    }

    /// Hex notation, e.g. `#ff8080`.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Green/blue channel for a duration: 255 for no time spent, 0 at the
/// longest total duration of the compared trials.
pub fn duration_channel(duration: f64, max_total_duration: f64) -> u8 {
    if max_total_duration.is_nan() || max_total_duration <= 0.0 || !duration.is_finite() {
        return 255;
    }
    let p = (255.0 * (1.0 - duration / max_total_duration)).round();
    p.clamp(0.0, 255.0) as u8
}

/// Fill color of a node for one trial. Missing durations count as zero.
pub fn duration_color(node: &TrialNodeData, trial: &TrialId, max_total_duration: f64) -> Rgb {
    let d = node.duration.get(trial).copied().unwrap_or(0.0);
    let p = duration_channel(d, max_total_duration);
    Rgb(255, p, p)
}

/// Node fill: solid for single-trial nodes, split left/right for nodes
/// present in both compared trials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeFill {
    Solid(Rgb),
    Split { left: Rgb, right: Rgb },
}

pub fn node_fill(node: &TrialNodeData, t1: &TrialId, t2: &TrialId, max_total_duration: f64) -> NodeFill {
    if node.trial_ids.len() > 1 {
        NodeFill::Split {
            left: duration_color(node, t1, max_total_duration),
            right: duration_color(node, t2, max_total_duration),
        }
    } else {
        let trial = node.primary_trial().unwrap_or(t1);
        NodeFill::Solid(duration_color(node, trial, max_total_duration))
    }
}

/// Outline color: black for shared nodes, red for first-trial-only and green
/// for second-trial-only nodes.
pub fn node_stroke(node: &TrialNodeData, class: ColorClass) -> Rgb {
    if node.trial_ids.len() > 1 {
        return Rgb::BLACK;
    }
    match class {
        ColorClass::Neutral => Rgb::BLACK,
        ColorClass::First => Rgb::RED,
        ColorClass::Second => Rgb::GREEN,
    }
}

/// Vertical offset applied to a node glyph in a diff view.
pub fn class_offset(class: ColorClass, trial_offset: f32) -> f32 {
    match class {
        ColorClass::Neutral => 0.0,
        ColorClass::First => -trial_offset,
        ColorClass::Second => trial_offset,
    }
}
