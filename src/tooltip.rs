//! Hover tooltips and the activation detail cache.

use std::collections::{HashMap, HashSet};

use crate::geometry::Point;
use crate::model::{ActivationData, ActivationId, TrialId};

/// Activation details fetched on demand, scoped to one graph instance.
#[derive(Debug, Clone, Default)]
pub struct ActivationCache {
    entries: HashMap<ActivationId, ActivationData>,
    requested: HashSet<ActivationId>,
}

impl ActivationCache {
    pub fn get(&self, id: &str) -> Option<&ActivationData> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, data: ActivationData) {
        self.requested.remove(&data.id);
        self.entries.insert(data.id.clone(), data);
    }

    /// Record that a load was requested. Returns `false` if a load for this
    /// id is already outstanding.
    pub fn mark_requested(&mut self, id: &str) -> bool {
        self.requested.insert(id.to_string())
    }

    /// Forget an outstanding load so the id can be requested again.
    pub fn cancel_request(&mut self, id: &str) -> bool {
        self.requested.remove(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.requested.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.requested.clear();
    }
}

/// An activation reference embedded in a tooltip:
/// `T{trial} - {activation}<br>Line {line}<br>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipMarker {
    /// The full matched text.
    pub raw: String,
    pub trial_id: TrialId,
    pub activation_id: ActivationId,
    pub line: Option<u64>,
}

fn take_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

/// Try to read one marker from `s`, which starts right after a `T`.
/// Returns the marker fields and the number of bytes consumed.
fn parse_marker(s: &str) -> Option<(String, String, Option<u64>, usize)> {
    let sep = s.find(" - ")?;
    let trial = &s[..sep];
    if trial.is_empty() || trial.contains('\n') || trial.contains("<br>") {
        return None;
    }
    let rest = &s[sep + 3..];
    let (aid, rest) = take_digits(rest);
    if aid.is_empty() {
        return None;
    }
    let rest = rest.strip_prefix("<br>Line ")?;
    let (line, rest) = take_digits(rest);
    let rest = rest.strip_prefix("<br>")?;
    let consumed = s.len() - rest.len();
    Some((trial.to_string(), aid.to_string(), line.parse().ok(), consumed))
}

/// Extract every activation marker from a tooltip. Malformed segments are
/// skipped.
pub fn parse_tooltip_markers(text: &str) -> Vec<TooltipMarker> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(off) = text[pos..].find('T') {
        let start = pos + off;
        let after = start + 1;
        match parse_marker(&text[after..]) {
            Some((trial_id, activation_id, line, consumed)) => {
                let end = after + consumed;
                out.push(TooltipMarker {
                    raw: text[start..end].to_string(),
                    trial_id,
                    activation_id,
                    line,
                });
                pos = end;
            }
            None => pos = after,
        }
    }
    out
}

/// HTML detail block for a cached activation.
pub fn activation_html(data: &ActivationData) -> String {
    use html_escape::{encode_double_quoted_attribute, encode_text};
    let mut title = format!("{} - {}", encode_text(&data.id), encode_text(&data.name));
    if !data.hash.is_empty() {
        let href = format!("/trials/files/{}/{}", data.hash, data.name);
        title = format!(
            "<a href=\"{}\">{}</a>",
            encode_double_quoted_attribute(&href),
            title
        );
    }
    let row = |label: &str, class: &str, value: &str| {
        format!(
            "<span class=\"attr\"> <span style=\"font-weight: bold;\"> {}: </span> <span class=\"{}\">{}</span></span>",
            label, class, value
        )
    };
    let rows = [
        format!(
            "<span class=\"attr\"> <span style=\"font-weight: bold;\">{}</span></span>",
            title
        ),
        row("Line", "line", &data.line.to_string()),
        row("Start", "start", encode_text(&data.start).as_ref()),
        row("Finish", "finish", encode_text(&data.finish).as_ref()),
        row("Duration", "duration", &format!("{}ns", data.duration)),
        row("Return", "return", encode_text(&data.return_value).as_ref()),
    ];
    rows.join("<br>") + "<br><br>"
}

/// Plain-text rendering of tooltip HTML: `<br>` becomes a newline, other tags
/// are dropped and entities decoded.
pub fn html_to_text(html: &str) -> String {
    let html = html.replace("<br>", "\n").replace("<br/>", "\n").replace("<br />", "\n");
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = html_escape::decode_html_entities(&out).into_owned();
    decoded
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// One detail block of a query tooltip.
#[derive(Debug, Clone, PartialEq)]
pub enum TooltipBlock {
    Loaded(String),
    /// Waiting for the host loader; nothing is rendered for it yet.
    Pending(TooltipMarker),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TooltipContent {
    Html(String),
    Blocks(Vec<TooltipBlock>),
}

impl TooltipContent {
    /// HTML for everything currently renderable.
    pub fn html(&self) -> String {
        match self {
            TooltipContent::Html(h) => h.clone(),
            TooltipContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    TooltipBlock::Loaded(h) => Some(h.as_str()),
                    TooltipBlock::Pending(_) => None,
                })
                .collect(),
        }
    }

    /// Replace pending blocks that can now be rendered from the cache.
    pub fn refresh(&mut self, cache: &ActivationCache) {
        if let TooltipContent::Blocks(blocks) = self {
            for b in blocks.iter_mut() {
                if let TooltipBlock::Pending(m) = b {
                    if let Some(data) = cache.get(&m.activation_id) {
                        *b = TooltipBlock::Loaded(activation_html(data));
                    }
                }
            }
        }
    }
}

pub const SHOW_FADE_MS: f32 = 200.0;
pub const HIDE_FADE_MS: f32 = 500.0;
pub const SHOWN_OPACITY: f32 = 0.9;

/// Opacity animation target of the tooltip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fade {
    pub target: f32,
    pub duration_ms: f32,
}

/// The single tooltip of a graph instance.
#[derive(Debug, Clone, PartialEq)]
pub struct TooltipState {
    pub hidden: bool,
    pub fade: Fade,
    /// Page position the tooltip is attached to.
    pub anchor: Point,
    pub trial_id: Option<TrialId>,
    pub content: Option<TooltipContent>,
}

impl Default for TooltipState {
    fn default() -> Self {
        Self {
            hidden: true,
            fade: Fade {
                target: 0.0,
                duration_ms: 0.0,
            },
            anchor: Point::ZERO,
            trial_id: None,
            content: None,
        }
    }
}

impl TooltipState {
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }

    pub fn show(&mut self, pointer: Point, trial_id: TrialId, content: TooltipContent) {
        self.hidden = false;
        self.fade = Fade {
            target: SHOWN_OPACITY,
            duration_ms: SHOW_FADE_MS,
        };
        self.anchor = Point::new(pointer.x - 3.0, pointer.y - 28.0);
        self.trial_id = Some(trial_id);
        self.content = Some(content);
    }

    pub fn close(&mut self) {
        self.hidden = true;
        self.fade = Fade {
            target: 0.0,
            duration_ms: HIDE_FADE_MS,
        };
    }
}
