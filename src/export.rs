//! Standalone SVG export of the rendered graph.
//!
//! The document mirrors what is on screen once all transitions have
//! finished: arrowhead markers, split-fill gradients, edge paths with their
//! count labels and the node glyphs. Content is translated so its bounding
//! box starts at `(5, 5)` and the document is sized to the box plus a 5 unit
//! margin on each side.

use std::fmt::Write as _;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::color::NodeFill;
use crate::error::ExportError;
use crate::graph::{TrialGraph, GLYPH_SIZE};
use crate::label::{place_label, ApproxMeasurer, Marker, Measurer, Rect};
use crate::geometry::Point;
use crate::render::{NodeName, RenderedEdge, RenderedNode};

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const MARGIN: f32 = 5.0;
/// Line height of node names, in font sizes.
const LINE_HEIGHT: f32 = 1.1;

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn attr(s: &str) -> String {
    encode_double_quoted_attribute(s).into_owned()
}

fn text(s: &str) -> String {
    encode_text(s).into_owned()
}

/// Build the SVG document for `graph`.
pub fn svg_document(graph: &TrialGraph) -> Result<String, ExportError> {
    let state = graph.rendered();
    if state.is_empty() {
        return Err(ExportError::Empty);
    }
    let config = graph.config();
    let gid = graph.graph_id();
    let bbox = content_bounds(graph).ok_or(ExportError::Empty)?;

    let mut out = String::with_capacity(8192);
    let _ = writeln!(
        out,
        "<svg xmlns:xlink=\"{}\" xmlns=\"{}\" title=\"Trial\" version=\"1.1\" width=\"{}\" height=\"{}\">",
        XLINK_NS,
        SVG_NS,
        bbox.width() + 2.0 * MARGIN,
        bbox.height() + 2.0 * MARGIN
    );

    indent(&mut out, 1);
    out.push_str("<defs>\n");
    for marker in Marker::ALL {
        write_marker(&mut out, gid, marker, 2);
    }
    for node in state.nodes.values() {
        if let NodeFill::Split { left, right } = node.glyph.fill {
            // Drawn right to left so the first trial ends up on the left half.
            indent(&mut out, 2);
            let _ = writeln!(
                out,
                "<linearGradient id=\"grad-{}-{}\" x1=\"100%\" x2=\"0%\" y1=\"0%\" y2=\"0%\">",
                attr(gid),
                node.glyph.index
            );
            indent(&mut out, 3);
            let _ = writeln!(out, "<stop offset=\"50%\" stop-color=\"{}\"/>", right.to_css());
            indent(&mut out, 3);
            let _ = writeln!(out, "<stop offset=\"50%\" stop-color=\"{}\"/>", left.to_css());
            indent(&mut out, 2);
            out.push_str("</linearGradient>\n");
        }
    }
    indent(&mut out, 1);
    out.push_str("</defs>\n");

    indent(&mut out, 1);
    let _ = writeln!(
        out,
        "<g transform=\"translate({}, {})\">",
        -bbox.min.x + MARGIN,
        -bbox.min.y + MARGIN
    );
    for edge in state.edges.values() {
        write_edge(&mut out, gid, edge, 2);
    }
    for edge in state.edges.values() {
        write_edge_label(&mut out, gid, edge, config.label_font_size, 2);
    }
    for node in state.nodes.values() {
        write_node(&mut out, gid, node, config.font_size, 2);
    }
    indent(&mut out, 1);
    out.push_str("</g>\n");
    out.push_str("</svg>\n");
    Ok(out)
}

fn write_marker(out: &mut String, gid: &str, marker: Marker, level: usize) {
    indent(out, level);
    let _ = writeln!(
        out,
        "<marker id=\"{}-{}\" viewBox=\"0 -5 10 10\" refX=\"10\" refY=\"0\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto\">",
        attr(gid),
        marker.id_suffix()
    );
    indent(out, level + 1);
    let _ = writeln!(
        out,
        "<path class=\"{}\" fill=\"{}\" d=\"M0,-5L10,0L0,5\"/>",
        marker.class(),
        marker.fill().to_hex()
    );
    indent(out, level);
    out.push_str("</marker>\n");
}

fn write_edge(out: &mut String, gid: &str, edge: &RenderedEdge, level: usize) {
    indent(out, level);
    let _ = writeln!(
        out,
        "<path class=\"link\" id=\"pathId-{}-{}\" fill=\"none\" stroke-width=\"{}px\" stroke=\"{}\" stroke-dasharray=\"{}\" marker-end=\"url(#{}-{})\" d=\"{}\"/>",
        attr(gid),
        attr(&edge.id),
        edge.style.width,
        edge.style.stroke.to_hex(),
        edge.style.dasharray(),
        attr(gid),
        edge.style.marker.id_suffix(),
        edge.path.to_svg()
    );
}

fn write_edge_label(out: &mut String, gid: &str, edge: &RenderedEdge, font_size: f32, level: usize) {
    if edge.label.is_empty() {
        return;
    }
    indent(out, level);
    let _ = writeln!(
        out,
        "<text class=\"label_text\" id=\"pathlabel-{g}-{id}\" font-family=\"sans-serif\" font-size=\"{fs}px\" pointer-events=\"none\" fill=\"#000\" text-anchor=\"middle\" dx=\"{dx}\" dy=\"-3\"><textPath xlink:href=\"#pathId-{g}-{id}\">{label}</textPath></text>",
        g = attr(gid),
        id = attr(&edge.id),
        fs = font_size,
        dx = edge.label_offset,
        label = text(&edge.label)
    );
}

fn write_node(out: &mut String, gid: &str, node: &RenderedNode, font_size: f32, level: usize) {
    let glyph = &node.glyph;
    let half = GLYPH_SIZE / 2.0;
    indent(out, level);
    let _ = writeln!(
        out,
        "<g id=\"node-{}-{}\" class=\"node\" transform=\"translate({},{})\">",
        attr(gid),
        glyph.index,
        node.pos.x - half,
        node.pos.y - half
    );

    let fill = match glyph.fill {
        NodeFill::Solid(c) => c.to_css(),
        NodeFill::Split { .. } => format!("url(#grad-{}-{})", attr(gid), glyph.index),
    };
    let corner = if glyph.collapsed { 0.0 } else { GLYPH_SIZE };
    indent(out, level + 1);
    let _ = writeln!(
        out,
        "<rect class=\"node\" width=\"{s}\" height=\"{s}\" rx=\"{r}\" ry=\"{r}\" stroke=\"{stroke}\" stroke-width=\"3px\" fill=\"{fill}\"/>",
        s = GLYPH_SIZE,
        r = corner,
        stroke = glyph.stroke.to_hex(),
        fill = fill
    );

    let nowrap = matches!(glyph.name, NodeName::Header { .. });
    indent(out, level + 1);
    let _ = write!(
        out,
        "<text{} dy=\".35em\" font-family=\"sans-serif\" font-size=\"{}px\" pointer-events=\"none\" fill=\"#000\" y=\"24\" x=\"{}\" text-anchor=\"middle\">",
        if nowrap { " class=\"nowrap\"" } else { "" },
        font_size,
        half
    );
    match &glyph.name {
        NodeName::Header { title, detail } => {
            let _ = write!(
                out,
                "<tspan x=\"{h}\" dy=\".35em\" font-weight=\"bold\">{}</tspan><tspan x=\"{h}\" dy=\"1em\">{}</tspan>",
                text(title),
                text(detail),
                h = half
            );
        }
        NodeName::Wrapped(lines) => {
            for (i, line) in lines.iter().enumerate() {
                let dy = if i == 0 { 0.0 } else { LINE_HEIGHT };
                let _ = write!(out, "<tspan x=\"{}\" dy=\"{}em\">{}</tspan>", half, dy, text(line));
            }
        }
    }
    out.push_str("</text>\n");

    if glyph.split {
        indent(out, level + 1);
        let _ = writeln!(out, "<path stroke=\"#000\" d=\"M{h},0L{h},{s}\"/>", h = half, s = GLYPH_SIZE);
    }
    indent(out, level);
    out.push_str("</g>\n");
}

/// Extent of a node glyph and its name.
fn node_bounds(node: &RenderedNode, font_size: f32) -> Rect {
    let half = GLYPH_SIZE / 2.0;
    let mut rect = Rect::from_center_size(node.pos, GLYPH_SIZE, GLYPH_SIZE);
    let measurer = ApproxMeasurer { font_size };
    let lines: Vec<&str> = match &node.glyph.name {
        NodeName::Header { title, detail } => vec![title.as_str(), detail.as_str()],
        NodeName::Wrapped(lines) => lines.iter().map(String::as_str).collect(),
    };
    let width = lines.iter().map(|l| measurer.measure(l).0).fold(0.0, f32::max);
    if width > 0.0 {
        let top = node.pos.y - half + 24.0 - font_size / 2.0;
        let height = font_size * (1.0 + LINE_HEIGHT * (lines.len() as f32 - 1.0));
        rect = rect.union(&Rect {
            min: Point::new(node.pos.x - width / 2.0, top),
            max: Point::new(node.pos.x + width / 2.0, top + height),
        });
    }
    rect
}

/// Bounding box of everything in the export, in layout coordinates.
fn content_bounds(graph: &TrialGraph) -> Option<Rect> {
    let state = graph.rendered();
    let config = graph.config();
    let measurer = ApproxMeasurer {
        font_size: config.label_font_size,
    };
    let mut bounds: Option<Rect> = None;
    let mut grow = |r: Rect| {
        bounds = Some(match bounds {
            Some(b) => b.union(&r),
            None => r,
        });
    };
    for node in state.nodes.values() {
        grow(node_bounds(node, config.font_size));
    }
    let mut placed: Vec<Rect> = Vec::new();
    for edge in state.edges.values() {
        let poly = edge.path.flatten(16);
        for p in &poly {
            grow(Rect { min: *p, max: *p });
        }
        if let Some(label) = place_label(&poly, &edge.label, edge.label_offset, &measurer, &placed) {
            grow(label.rect);
            placed.push(label.rect);
        }
    }
    bounds
}
