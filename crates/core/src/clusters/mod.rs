//! Flattening and clustering of interval trees.
//!
//! A source tree of arbitrary size is flattened once into a level-sorted list,
//! grouped into runs of visually identical siblings ([`MetaCluster`]) and then,
//! for a given zoom and visible window, fused into [`ClusterizedNode`]s: one
//! drawable rectangle per group of nodes that would otherwise be too small to
//! tell apart. Re-clustering on pan/zoom only touches existing clusters, so its
//! cost follows the cluster count rather than the tree size.

use std::{cmp::Ordering, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::{FlameCanvasError, Result};

/// Maximum pixel gap between two nodes that still lets them stick together.
pub const STICK_DISTANCE: f64 = 0.25;
/// Nodes narrower than this many pixels are candidates for fusion.
pub const MIN_BLOCK_SIZE: f64 = 1.0;

/// A node of the caller-supplied interval tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceNode {
    pub name: String,
    pub start: f64,
    pub duration: f64,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Rc<SourceNode>>,
}

impl SourceNode {
    pub fn new(name: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            name: name.into(),
            start,
            duration,
            node_type: None,
            color: None,
            pattern: None,
            badge: None,
            children: Vec::new(),
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn with_children(mut self, children: Vec<SourceNode>) -> Self {
        self.children = children.into_iter().map(Rc::new).collect();
        self
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A source node placed in the flattened, level-sorted list.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatTreeNode {
    pub source: Rc<SourceNode>,
    pub end: f64,
    /// Position of the parent inside the flattened list.
    pub parent: Option<usize>,
    /// Depth from the root, starting at zero.
    pub level: usize,
    /// Pre-order visiting counter, stable for a given input.
    pub index: usize,
}

/// Smallest start and largest end over a flattened tree.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

/// A maximal run of same-level nodes sharing a visual style.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetaCluster {
    pub nodes: Vec<FlatTreeNode>,
}

/// One drawable rectangle made of one or more time-adjacent nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterizedNode {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub node_type: Option<String>,
    pub color: Option<String>,
    pub pattern: Option<String>,
    pub badge: Option<String>,
    pub level: usize,
    pub nodes: Vec<FlatTreeNode>,
}

impl ClusterizedNode {
    fn from_nodes(nodes: Vec<FlatTreeNode>) -> Option<Self> {
        let first = nodes.first()?;
        let last = nodes.last()?;
        let start = first.source.start;
        let duration = last.end - start;
        let level = first.level;
        let source = Rc::clone(&first.source);
        let badge = nodes.iter().find_map(|node| node.source.badge.clone());

        Some(Self {
            start,
            end: start + duration,
            duration,
            node_type: source.node_type.clone(),
            color: source.color.clone(),
            pattern: source.pattern.clone(),
            badge,
            level,
            nodes,
        })
    }
}

/// Pixel thresholds driving node fusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterOptions {
    pub stick_distance: f64,
    pub min_block_size: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            stick_distance: STICK_DISTANCE,
            min_block_size: MIN_BLOCK_SIZE,
        }
    }
}

impl ClusterOptions {
    /// Clusters wider than this are split again on re-clusterization.
    pub fn min_cluster_size(&self) -> f64 {
        self.min_block_size * 2.0 + self.stick_distance
    }
}

fn walk<F>(nodes: &[Rc<SourceNode>], cb: &mut F, parent: Option<usize>, level: usize)
where
    F: FnMut(&Rc<SourceNode>, Option<usize>, usize) -> usize,
{
    for node in nodes {
        let id = cb(node, parent, level);
        if !node.children.is_empty() {
            walk(&node.children, cb, Some(id), level + 1);
        }
    }
}

/// Flattens the tree and sorts it by `(level, start)`.
///
/// The sort is stable, so siblings starting at the same time keep their tree
/// order.
pub fn flat_tree(roots: &[Rc<SourceNode>]) -> Vec<FlatTreeNode> {
    let mut result: Vec<FlatTreeNode> = Vec::new();

    walk(
        roots,
        &mut |source, parent, level| {
            let index = result.len();
            result.push(FlatTreeNode {
                source: Rc::clone(source),
                end: source.end(),
                parent,
                level,
                index,
            });
            index
        },
        None,
        0,
    );

    result.sort_by(|a, b| {
        a.level.cmp(&b.level).then_with(|| {
            a.source
                .start
                .partial_cmp(&b.source.start)
                .unwrap_or(Ordering::Equal)
        })
    });

    let mut positions = vec![0; result.len()];
    for (position, node) in result.iter().enumerate() {
        positions[node.index] = position;
    }
    for node in &mut result {
        node.parent = node.parent.map(|index| positions[index]);
    }

    result
}

pub fn flat_tree_min_max(flat_tree: &[FlatTreeNode]) -> MinMax {
    let mut nodes = flat_tree.iter();
    let Some(first) = nodes.next() else {
        return MinMax::default();
    };

    nodes.fold(
        MinMax {
            min: first.source.start,
            max: first.end,
        },
        |acc, node| MinMax {
            min: acc.min.min(node.source.start),
            max: acc.max.max(node.end),
        },
    )
}

/// Nodes of the same colour and type are fused by default.
pub fn default_clusterize_condition(prev: &FlatTreeNode, node: &FlatTreeNode) -> bool {
    prev.source.color == node.source.color && prev.source.node_type == node.source.node_type
}

pub fn meta_clusterize_flat_tree<F>(flat_tree: &[FlatTreeNode], condition: F) -> Vec<MetaCluster>
where
    F: Fn(&FlatTreeNode, &FlatTreeNode) -> bool,
{
    let mut result: Vec<MetaCluster> = Vec::new();

    for node in flat_tree {
        match result.last_mut() {
            Some(cluster)
                if cluster
                    .nodes
                    .last()
                    .is_some_and(|last| last.level == node.level && condition(last, node)) =>
            {
                cluster.nodes.push(node.clone());
            }
            _ => result.push(MetaCluster {
                nodes: vec![node.clone()],
            }),
        }
    }

    result
}

pub(crate) fn is_time_bound_nested(node_start: f64, node_end: f64, start: f64, end: f64) -> bool {
    (node_start < end && node_end > start) || (node_start > start && node_end < end)
}

fn clusterize_nodes(
    nodes: &[FlatTreeNode],
    zoom: f64,
    start: f64,
    end: f64,
    options: ClusterOptions,
    out: &mut Vec<ClusterizedNode>,
) {
    let mut current: Vec<FlatTreeNode> = Vec::new();
    let mut last: Option<&FlatTreeNode> = None;

    for node in nodes {
        if !is_time_bound_nested(node.source.start, node.end, start, end) {
            continue;
        }

        if let Some(prev) = last {
            let sticks = (node.source.start - prev.end) * zoom < options.stick_distance
                && node.source.duration * zoom < options.min_block_size
                && prev.source.duration * zoom < options.min_block_size;

            if !sticks {
                out.extend(ClusterizedNode::from_nodes(std::mem::take(&mut current)));
            }
        }

        current.push(node.clone());
        last = Some(node);
    }

    out.extend(ClusterizedNode::from_nodes(current));
}

/// Fuses the visible nodes of every meta cluster into drawable clusters.
///
/// Greedy and left-to-right: a closed cluster is never revisited.
pub fn clusterize_flat_tree(
    meta_clusters: &[MetaCluster],
    zoom: f64,
    start: f64,
    end: f64,
    options: ClusterOptions,
) -> Vec<ClusterizedNode> {
    let mut result = Vec::new();

    for cluster in meta_clusters {
        clusterize_nodes(&cluster.nodes, zoom, start, end, options, &mut result);
    }

    tracing::trace!(
        meta_clusters = meta_clusters.len(),
        clusters = result.len(),
        zoom,
        "clusterized flat tree"
    );
    result
}

/// Opens up clusters that became wide enough to show detail.
///
/// Clusters outside the window are dropped, narrow clusters are kept as they
/// are and wide ones are clusterized again from their own nodes.
pub fn reclusterize_clustered_flat_tree(
    clusters: &[ClusterizedNode],
    zoom: f64,
    start: f64,
    end: f64,
    options: ClusterOptions,
) -> Vec<ClusterizedNode> {
    let mut result = Vec::with_capacity(clusters.len());

    for cluster in clusters {
        if !is_time_bound_nested(cluster.start, cluster.end, start, end) {
            continue;
        }

        if cluster.duration * zoom <= options.min_cluster_size() {
            result.push(cluster.clone());
        } else {
            clusterize_nodes(&cluster.nodes, zoom, start, end, options, &mut result);
        }
    }

    tracing::trace!(
        input = clusters.len(),
        output = result.len(),
        zoom,
        "reclusterized"
    );
    result
}

/// Checks tree data at the ingestion boundary.
///
/// Trees built from owned children cannot contain cycles, so only the numeric
/// fields need checking.
pub fn validate_tree(roots: &[Rc<SourceNode>]) -> Result<()> {
    let mut stack: Vec<&SourceNode> = roots.iter().map(|node| node.as_ref()).collect();

    while let Some(node) = stack.pop() {
        let reason = if !node.start.is_finite() {
            Some("start must be a finite number")
        } else if !node.duration.is_finite() {
            Some("duration must be a finite number")
        } else if node.duration < 0.0 {
            Some("duration must not be negative")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(FlameCanvasError::InvalidNode {
                name: node.name.clone(),
                reason,
            });
        }

        stack.extend(node.children.iter().map(|child| child.as_ref()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn roots(nodes: Vec<SourceNode>) -> Vec<Rc<SourceNode>> {
        nodes.into_iter().map(Rc::new).collect()
    }

    fn sample_tree() -> Vec<Rc<SourceNode>> {
        roots(vec![SourceNode::new("root", 0.0, 10.0).with_children(vec![
            SourceNode::new("a", 0.0, 4.0),
            SourceNode::new("b", 5.0, 5.0),
        ])])
    }

    #[test]
    fn flattens_example_tree() {
        let flat = flat_tree(&sample_tree());

        assert_eq!(flat.len(), 3);
        let levels: Vec<usize> = flat.iter().map(|node| node.level).collect();
        assert_eq!(levels, vec![0, 1, 1]);
        assert_eq!(flat[1].parent, Some(0));
        assert_eq!(flat[2].parent, Some(0));
        assert_eq!(flat[2].end, 10.0);
        assert_eq!(flat_tree_min_max(&flat), MinMax { min: 0.0, max: 10.0 });
    }

    #[test]
    fn parent_positions_survive_sorting() {
        let tree = roots(vec![
            SourceNode::new("late", 50.0, 10.0)
                .with_children(vec![SourceNode::new("late-child", 52.0, 2.0)]),
            SourceNode::new("early", 0.0, 10.0)
                .with_children(vec![SourceNode::new("early-child", 1.0, 2.0)]),
        ]);
        let flat = flat_tree(&tree);

        for node in flat.iter().filter(|node| node.level > 0) {
            let parent = &flat[node.parent.expect("child has a parent")];
            assert!(node.source.name.starts_with(parent.source.name.as_str()));
        }
    }

    #[test]
    fn empty_tree_produces_empty_outputs() {
        let flat = flat_tree(&[]);
        assert!(flat.is_empty());
        assert_eq!(flat_tree_min_max(&flat), MinMax { min: 0.0, max: 0.0 });

        let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
        assert!(meta.is_empty());
        assert!(clusterize_flat_tree(&meta, 1.0, 0.0, 100.0, ClusterOptions::default()).is_empty());
    }

    #[test]
    fn meta_clusters_split_on_style_and_level() {
        let tree = roots(vec![
            SourceNode::new("a", 0.0, 1.0).with_color("red"),
            SourceNode::new("b", 2.0, 1.0).with_color("red"),
            SourceNode::new("c", 4.0, 1.0).with_color("blue"),
            SourceNode::new("d", 6.0, 1.0)
                .with_color("blue")
                .with_children(vec![SourceNode::new("e", 6.0, 1.0).with_color("blue")]),
        ]);
        let flat = flat_tree(&tree);
        let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);

        let sizes: Vec<usize> = meta.iter().map(|cluster| cluster.nodes.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn merges_tiny_neighbours() {
        let tree = roots(vec![
            SourceNode::new("a", 0.0, 10.0).with_color("red"),
            SourceNode::new("b", 10.1, 10.0).with_color("red"),
        ]);
        let flat = flat_tree(&tree);
        let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
        let clusters = clusterize_flat_tree(&meta, 0.01, 0.0, 100.0, ClusterOptions::default());

        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.nodes.len(), 2);
        assert_eq!(cluster.start, 0.0);
        assert!((cluster.duration - 20.1).abs() < 1e-9);
        assert_eq!(cluster.color.as_deref(), Some("red"));
    }

    #[test]
    fn keeps_wide_nodes_apart() {
        let tree = roots(vec![
            SourceNode::new("a", 0.0, 10.0),
            SourceNode::new("b", 10.1, 10.0),
        ]);
        let flat = flat_tree(&tree);
        let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
        let clusters = clusterize_flat_tree(&meta, 1.0, 0.0, 100.0, ClusterOptions::default());

        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn skips_nodes_outside_the_window() {
        let tree = roots(vec![
            SourceNode::new("a", 0.0, 10.0),
            SourceNode::new("b", 200.0, 10.0),
        ]);
        let flat = flat_tree(&tree);
        let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
        let clusters = clusterize_flat_tree(&meta, 1.0, 0.0, 100.0, ClusterOptions::default());

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].nodes[0].source.name, "a");
    }

    #[test]
    fn cluster_exposes_first_badge() {
        let tree = roots(vec![
            SourceNode::new("a", 0.0, 1.0),
            SourceNode::new("b", 1.0, 1.0).with_badge("#f00"),
        ]);
        let flat = flat_tree(&tree);
        let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
        let clusters = clusterize_flat_tree(&meta, 0.1, 0.0, 100.0, ClusterOptions::default());

        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].badge.as_deref(), Some("#f00"));
    }

    #[test]
    fn reclusterize_opens_up_wide_clusters() {
        let tree = roots(vec![
            SourceNode::new("a", 0.0, 10.0),
            SourceNode::new("b", 10.1, 10.0),
            SourceNode::new("c", 500.0, 1.0),
        ]);
        let flat = flat_tree(&tree);
        let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
        let clusters = clusterize_flat_tree(&meta, 0.01, 0.0, 1000.0, ClusterOptions::default());
        assert_eq!(clusters.len(), 2);

        let zoomed = reclusterize_clustered_flat_tree(&clusters, 1.0, 0.0, 100.0, ClusterOptions::default());
        assert_eq!(zoomed.len(), 2);
        assert!(zoomed.iter().all(|cluster| cluster.nodes.len() == 1));

        let narrow = reclusterize_clustered_flat_tree(&clusters, 0.05, 0.0, 1000.0, ClusterOptions::default());
        assert_eq!(narrow, clusters);
    }

    #[test]
    fn validation_names_the_offending_node() {
        let tree = roots(vec![SourceNode::new("root", 0.0, 10.0)
            .with_children(vec![SourceNode::new("broken", 1.0, -2.0)])]);

        let err = validate_tree(&tree).unwrap_err();
        assert!(format!("{err}").contains("broken"));
        assert!(validate_tree(&sample_tree()).is_ok());

        let nan = roots(vec![SourceNode::new("nan", f64::NAN, 1.0)]);
        assert!(validate_tree(&nan).is_err());
    }

    #[test]
    fn deserializes_source_nodes() {
        let json = r#"[{"name":"main","start":0,"duration":5,"type":"task","children":[{"name":"inner","start":1,"duration":2,"color":"red"}]}]"#;
        let tree: Vec<Rc<SourceNode>> = serde_json::from_str(json).unwrap();

        assert_eq!(tree[0].node_type.as_deref(), Some("task"));
        assert_eq!(tree[0].children[0].color.as_deref(), Some("red"));
    }

    const COLORS: [&str; 3] = ["red", "green", "blue"];

    fn arb_node() -> impl Strategy<Value = SourceNode> {
        let leaf = (0.0..1000.0f64, 0.0..50.0f64, 0..3usize).prop_map(|(start, duration, color)| {
            SourceNode::new("leaf", start, duration).with_color(COLORS[color])
        });

        leaf.prop_recursive(4, 64, 4, |inner| {
            (
                0.0..1000.0f64,
                0.0..50.0f64,
                0..3usize,
                prop::collection::vec(inner, 0..4),
            )
                .prop_map(|(start, duration, color, children)| {
                    SourceNode::new("node", start, duration)
                        .with_color(COLORS[color])
                        .with_children(children)
                })
        })
    }

    fn arb_tree() -> impl Strategy<Value = Vec<Rc<SourceNode>>> {
        prop::collection::vec(arb_node(), 0..5).prop_map(roots)
    }

    fn count(nodes: &[Rc<SourceNode>]) -> usize {
        nodes.iter().map(|node| 1 + count(&node.children)).sum()
    }

    proptest! {
        #[test]
        fn flat_tree_preserves_count_and_order(tree in arb_tree()) {
            let flat = flat_tree(&tree);

            prop_assert_eq!(flat.len(), count(&tree));
            for pair in flat.windows(2) {
                prop_assert!(
                    pair[0].level < pair[1].level
                        || (pair[0].level == pair[1].level && pair[0].source.start <= pair[1].source.start)
                );
            }
            for node in &flat {
                if let Some(parent) = node.parent {
                    prop_assert_eq!(flat[parent].level + 1, node.level);
                }
            }
        }

        #[test]
        fn meta_clusters_keep_every_node(tree in arb_tree()) {
            let flat = flat_tree(&tree);
            let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
            let unpacked: Vec<usize> = meta
                .iter()
                .flat_map(|cluster| cluster.nodes.iter().map(|node| node.index))
                .collect();
            let original: Vec<usize> = flat.iter().map(|node| node.index).collect();

            prop_assert_eq!(unpacked, original);
        }

        #[test]
        fn clusters_hold_every_visible_node(
            tree in arb_tree(),
            zoom in 0.001..10.0f64,
            start in 0.0..500.0f64,
            width in 1.0..1000.0f64,
        ) {
            let end = start + width;
            let flat = flat_tree(&tree);
            let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
            let clusters = clusterize_flat_tree(&meta, zoom, start, end, ClusterOptions::default());

            let clustered: usize = clusters.iter().map(|cluster| cluster.nodes.len()).sum();
            let visible = flat
                .iter()
                .filter(|node| is_time_bound_nested(node.source.start, node.end, start, end))
                .count();
            prop_assert_eq!(clustered, visible);

            for cluster in &clusters {
                let first = &cluster.nodes[0];
                let last = &cluster.nodes[cluster.nodes.len() - 1];
                prop_assert!((cluster.duration - (last.end - first.source.start)).abs() < 1e-9);
                prop_assert!(cluster.nodes.iter().all(|node| node.level == cluster.level));
            }
        }

        #[test]
        fn reclusterize_is_deterministic(
            tree in arb_tree(),
            zoom in 0.001..10.0f64,
            start in 0.0..500.0f64,
        ) {
            let end = start + 400.0;
            let flat = flat_tree(&tree);
            let meta = meta_clusterize_flat_tree(&flat, default_clusterize_condition);
            let clusters = clusterize_flat_tree(&meta, 0.01, 0.0, 2000.0, ClusterOptions::default());

            let first = reclusterize_clustered_flat_tree(&clusters, zoom, start, end, ClusterOptions::default());
            let second = reclusterize_clustered_flat_tree(&clusters, zoom, start, end, ClusterOptions::default());
            prop_assert_eq!(first, second);
        }
    }
}
