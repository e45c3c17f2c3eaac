use trialgraph::geometry::Point;
use trialgraph::model::{EdgeKind, TrialEdgeData, TrialNodeData};
use trialgraph::tree::{Children, TidyLayout, TrialTree};

fn node(index: i64, parent: Option<i64>, children_index: i64, children: Vec<TrialNodeData>) -> TrialNodeData {
    let mut n = TrialNodeData::new(index, format!("f{}", index), "1");
    n.parent_index = parent;
    n.children_index = children_index;
    n.children = children;
    n
}

/// root(1) -> a(2) -> c(4), root(1) -> b(3)
fn sample() -> TrialTree {
    let c = node(4, Some(2), 0, vec![]);
    let a = node(2, Some(1), 0, vec![c]);
    let b = node(3, Some(1), 1, vec![]);
    TrialTree::build(node(1, None, 0, vec![a, b]))
}

fn edge(source: i64, target: i64, kind: EdgeKind) -> TrialEdgeData {
    TrialEdgeData {
        source,
        target,
        kind,
        count: [("1".to_string(), 1)].into_iter().collect(),
    }
}

fn indices(tree: &TrialTree) -> Vec<i64> {
    tree.visible().iter().map(|&id| tree.node(id).data.index).collect()
}

#[test]
fn builds_arena_in_preorder() {
    let tree = sample();
    assert_eq!(tree.len(), 4);
    assert_eq!(indices(&tree), vec![1, 2, 4, 3]);
    let a = tree.find(2).unwrap();
    assert_eq!(tree.node(a).depth, 1);
    assert_eq!(tree.node(a).parent, Some(tree.root()));
    assert!(tree.node(a).data.children.is_empty(), "children moved into the arena");
}

#[test]
fn toggle_twice_restores_children() {
    let mut tree = sample();
    let root = tree.root();
    let before = tree.node(root).children.clone();

    assert!(tree.toggle(root));
    match &tree.node(root).children {
        Children::Collapsed(saved) => assert_eq!(saved.len(), 2),
        other => panic!("expected collapsed, got {:?}", other),
    }
    assert!(tree.node(root).is_collapsed());
    assert!(tree.visible_children(root).is_empty());
    assert_eq!(indices(&tree), vec![1]);

    assert!(tree.toggle(root));
    assert_eq!(tree.node(root).children, before);
    assert_eq!(indices(&tree), vec![1, 2, 4, 3]);
}

#[test]
fn leaves_do_not_toggle() {
    let mut tree = sample();
    let leaf = tree.find(3).unwrap();
    assert!(!tree.toggle(leaf));
    assert!(!tree.node(leaf).is_collapsed());
    assert_eq!(tree.node(leaf).children, Children::Expanded(vec![]));
}

#[test]
fn collapse_below_hides_deeper_levels() {
    let mut tree = sample();
    tree.collapse_below(1);
    assert_eq!(indices(&tree), vec![1, 2, 3]);
    assert!(tree.node(tree.find(2).unwrap()).is_collapsed());
    assert!(!tree.node(tree.root()).is_collapsed());
}

#[test]
fn edges_require_both_endpoints_visible() {
    let mut tree = sample();
    let edges = vec![
        edge(1, 1, EdgeKind::Initial),
        edge(1, 2, EdgeKind::Call),
        edge(2, 4, EdgeKind::Call),
        edge(4, 2, EdgeKind::Return),
        edge(2, 3, EdgeKind::Sequence),
        edge(9, 1, EdgeKind::Call),
    ];

    let visible = tree.visible();
    let ids: Vec<String> = tree.visible_edges(&visible, &edges).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["1-1", "1-2", "2-4", "4-2", "2-3"]);

    let a = tree.find(2).unwrap();
    tree.collapse(a);
    let visible = tree.visible();
    let ids: Vec<String> = tree.visible_edges(&visible, &edges).into_iter().map(|e| e.id).collect();
    assert_eq!(ids, vec!["1-1", "1-2", "2-3"]);

    tree.expand(a);
    let visible = tree.visible();
    let restored = tree.visible_edges(&visible, &edges);
    assert_eq!(restored.len(), 5);
    assert_eq!(restored[2].source, a);
    assert_eq!(restored[2].target, tree.find(4).unwrap());
}

#[test]
fn tidy_layout_centers_parents() {
    let mut tree = sample();
    tree.apply_layout(&TidyLayout::new(47.0, 100.0));
    let pos = |i| tree.node(tree.find(i).unwrap()).pos;
    assert_eq!(pos(1), Point::new(0.0, 0.0));
    // c is the only leaf under a; b sits one extra node width away.
    assert_eq!(pos(2), Point::new(-47.0, 100.0));
    assert_eq!(pos(4), Point::new(-47.0, 200.0));
    assert_eq!(pos(3), Point::new(47.0, 100.0));
}

#[test]
fn collapse_and_expand_restores_layout() {
    let mut tree = sample();
    let layout = TidyLayout::new(47.0, 100.0);
    tree.apply_layout(&layout);
    let before: Vec<Point> = tree.iter().map(|(_, n)| n.pos).collect();

    let root = tree.root();
    tree.collapse(root);
    tree.apply_layout(&layout);
    assert_eq!(tree.node(root).pos, Point::new(0.0, 0.0));

    tree.expand(root);
    tree.apply_layout(&layout);
    let after: Vec<Point> = tree.iter().map(|(_, n)| n.pos).collect();
    assert_eq!(before, after);
}

#[test]
fn store_previous_copies_positions() {
    let mut tree = sample();
    tree.apply_layout(&TidyLayout::new(47.0, 100.0));
    let visible = tree.visible();
    tree.store_previous(&visible);
    for (_, n) in tree.iter() {
        assert_eq!(n.prev, n.pos);
    }
}
