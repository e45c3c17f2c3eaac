use indexmap::IndexMap;
use trialgraph::color::Rgb;
use trialgraph::geometry::Point;
use trialgraph::label::*;
use trialgraph::model::{EdgeKind, TrialId};

fn counts(pairs: &[(&str, u64)]) -> IndexMap<TrialId, u64> {
    pairs.iter().map(|&(t, c)| (t.to_string(), c)).collect()
}

fn t(id: &str) -> TrialId {
    id.to_string()
}

/// Fixed-width measurer: every char is 5 units wide, 10 high.
struct FixedMeasurer;

impl Measurer for FixedMeasurer {
    fn measure(&self, text: &str) -> (f32, f32) {
        (text.chars().count() as f32 * 5.0, 10.0)
    }
}

#[test]
fn label_for_single_trial_view() {
    let c = counts(&[("1", 3)]);
    assert_eq!(edge_label(EdgeKind::Call, &c, &t("1"), &t("1")), "3");
}

#[test]
fn label_for_diff_view() {
    let c = counts(&[("1", 2), ("2", 5)]);
    assert_eq!(edge_label(EdgeKind::Sequence, &c, &t("1"), &t("2")), "2, 5");
    let only_second = counts(&[("2", 4)]);
    assert_eq!(edge_label(EdgeKind::Return, &only_second, &t("1"), &t("2")), "4");
    let only_first = counts(&[("1", 7)]);
    assert_eq!(edge_label(EdgeKind::Return, &only_first, &t("1"), &t("2")), "7");
}

#[test]
fn zero_counts_and_initial_edges_are_unlabeled() {
    let c = counts(&[("1", 0), ("2", 6)]);
    assert_eq!(edge_label(EdgeKind::Call, &c, &t("1"), &t("2")), "6");
    assert_eq!(edge_label(EdgeKind::Call, &counts(&[]), &t("1"), &t("2")), "");
    assert_eq!(edge_label(EdgeKind::Initial, &counts(&[("1", 1)]), &t("1"), &t("1")), "");
}

#[test]
fn markers_follow_trial_membership() {
    assert_eq!(edge_marker(&counts(&[("1", 1)]), &t("1"), &t("2")), Marker::Before);
    assert_eq!(edge_marker(&counts(&[("2", 1)]), &t("1"), &t("2")), Marker::After);
    assert_eq!(edge_marker(&counts(&[("1", 1), ("2", 1)]), &t("1"), &t("2")), Marker::Normal);
    assert_eq!(edge_marker(&counts(&[("1", 1)]), &t("1"), &t("1")), Marker::Normal);
    assert_eq!(Marker::Before.id_suffix(), "endbefore");
    assert_eq!(Marker::After.fill(), Rgb::GREEN);
}

#[test]
fn return_edges_are_dashed() {
    let c = counts(&[("1", 1)]);
    let ret = edge_style(EdgeKind::Return, &c, &t("1"), &t("1"));
    assert_eq!(ret.dash, Some((10.0, 2.0)));
    assert_eq!(ret.dasharray(), "10,2");
    assert_eq!(ret.stroke, EDGE_STROKE);

    let seq = edge_style(EdgeKind::Sequence, &c, &t("1"), &t("1"));
    assert_eq!(seq.dash, None);
    assert_eq!(seq.dasharray(), "none");
    assert_eq!(seq.stroke, SEQUENCE_STROKE);
}

#[test]
fn label_offset_depends_on_horizontal_span() {
    assert_eq!(label_offset(Point::new(0.0, 0.0), Point::new(0.0, 100.0)), 29.0);
    assert_eq!(label_offset(Point::new(0.0, 0.0), Point::new(110.0, 0.0)), 50.0);
    assert_eq!(label_offset(Point::new(110.0, 0.0), Point::new(0.0, 50.0)), 50.0);
}

#[test]
fn label_sits_above_horizontal_path() {
    let poly = [Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
    let p = place_label(&poly, "12", 50.0, &FixedMeasurer, &[]).unwrap();
    // 10 wide, 10 high, centered at x=50 and lifted 3 + 5 units.
    assert_eq!(p.angle, 0.0);
    assert!((p.rect.center().x - 50.0).abs() < 1e-4);
    assert!((p.rect.center().y + 8.0).abs() < 1e-4);
    assert!((p.rect.width() - 10.0).abs() < 1e-4);
}

#[test]
fn label_slides_away_from_collisions() {
    let poly = [Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
    let first = place_label(&poly, "12", 50.0, &FixedMeasurer, &[]).unwrap();
    let second = place_label(&poly, "34", 50.0, &FixedMeasurer, &[first.rect]).unwrap();
    assert!(!second.rect.intersects(&first.rect));
    assert!(second.rect.center().x > first.rect.center().x);
}

#[test]
fn empty_label_is_not_placed() {
    let poly = [Point::new(0.0, 0.0), Point::new(100.0, 0.0)];
    assert!(place_label(&poly, "", 50.0, &FixedMeasurer, &[]).is_none());
}

#[test]
fn point_along_walks_segments() {
    let poly = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
    let (p, angle) = point_along(&poly, 15.0).unwrap();
    assert_eq!(p, Point::new(10.0, 5.0));
    assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    let (end, _) = point_along(&poly, 100.0).unwrap();
    assert_eq!(end, Point::new(10.0, 10.0));
}

#[test]
fn wrap_breaks_on_width() {
    let lines = wrap_text("alpha beta gamma", 50.0, &FixedMeasurer);
    assert_eq!(lines, vec!["alpha beta", "gamma"]);
    let long = wrap_text("supercalifragilistic x", 20.0, &FixedMeasurer);
    assert_eq!(long, vec!["supercalifragilistic", "x"]);
    assert!(wrap_text("   ", 20.0, &FixedMeasurer).is_empty());
}
