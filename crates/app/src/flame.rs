//! The panels the CLI renders with: a clustered flame chart and a time-grid
//! header.

use std::rc::Rc;

use flame_canvas_core::{
    clusters::{default_clusterize_condition, MIN_BLOCK_SIZE, STICK_DISTANCE},
    clusterize_flat_tree, flat_tree, flat_tree_min_max, meta_clusterize_flat_tree,
    reclusterize_clustered_flat_tree, Canvas, ChartEvent, ClusterOptions, ClusterizedNode,
    FlatTreeNode, HitRegion, InteractionEvent, MetaCluster, MinMax, OverlayContext,
    PanelContext, PanelHeight, Plugin, SourceNode, Surface, TooltipField,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{trace, warn};

const CLUSTER_REGION: &str = "cluster";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FlameStyles {
    pub default_color: String,
    pub selected_color: String,
    pub stick_distance: f64,
    pub min_block_size: f64,
}

impl Default for FlameStyles {
    fn default() -> Self {
        Self {
            default_color: "#d8c27a".to_string(),
            selected_color: "#f04a2a".to_string(),
            stick_distance: STICK_DISTANCE,
            min_block_size: MIN_BLOCK_SIZE,
        }
    }
}

impl FlameStyles {
    pub fn cluster_options(&self) -> ClusterOptions {
        ClusterOptions {
            stick_distance: self.stick_distance,
            min_block_size: self.min_block_size,
        }
    }
}

/// The view the current clusters were computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClusterView {
    zoom: f64,
    start: f64,
    end: f64,
}

/// Draws an interval tree as stacked rows of clustered blocks.
#[derive(Debug)]
pub struct FlamePlugin {
    name: String,
    styles: FlameStyles,
    flat: Vec<FlatTreeNode>,
    meta: Vec<MetaCluster>,
    min_max: Option<MinMax>,
    initial_zoom: Option<f64>,
    initial_clusters: Vec<ClusterizedNode>,
    clusters: Rc<[ClusterizedNode]>,
    /// Clusters the current hit regions were built from; region data indexes
    /// into this until the next rebuild.
    region_clusters: Rc<[ClusterizedNode]>,
    view: Option<ClusterView>,
    position_y: f64,
    hovered: Option<usize>,
    selected: Option<ClusterizedNode>,
}

impl FlamePlugin {
    pub fn new(name: impl Into<String>, roots: &[Rc<SourceNode>]) -> Self {
        let mut plugin = Self {
            name: name.into(),
            styles: FlameStyles::default(),
            flat: Vec::new(),
            meta: Vec::new(),
            min_max: None,
            initial_zoom: None,
            initial_clusters: Vec::new(),
            clusters: Vec::new().into(),
            region_clusters: Vec::new().into(),
            view: None,
            position_y: 0.0,
            hovered: None,
            selected: None,
        };
        plugin.set_data(roots);
        plugin
    }

    /// Replaces the tree. Clusters are rebuilt on the next render.
    pub fn set_data(&mut self, roots: &[Rc<SourceNode>]) {
        self.flat = flat_tree(roots);
        self.min_max = (!self.flat.is_empty()).then(|| flat_tree_min_max(&self.flat));
        self.meta = meta_clusterize_flat_tree(&self.flat, |prev, node| {
            default_clusterize_condition(prev, node) && prev.source.pattern == node.source.pattern
        });
        self.initial_zoom = None;
        self.initial_clusters.clear();
        self.clusters = Vec::new().into();
        self.region_clusters = Vec::new().into();
        self.view = None;
        self.hovered = None;
        self.selected = None;
    }

    pub fn clusters(&self) -> &[ClusterizedNode] {
        &self.clusters
    }

    /// Brings the visible clusters up to date with the panel's view.
    ///
    /// The whole domain is clusterized once per initial zoom; pans and zooms
    /// only re-split those clusters.
    fn update_clusters(&mut self, zoom: f64, initial_zoom: f64, start: f64, end: f64) {
        let Some(min_max) = self.min_max else {
            return;
        };

        if self.initial_zoom != Some(initial_zoom) {
            self.initial_clusters = clusterize_flat_tree(
                &self.meta,
                initial_zoom,
                min_max.min,
                min_max.max,
                self.styles.cluster_options(),
            );
            self.initial_zoom = Some(initial_zoom);
            self.view = None;
        }

        let view = ClusterView { zoom, start, end };
        if self.view == Some(view) {
            return;
        }

        self.clusters = reclusterize_clustered_flat_tree(
            &self.initial_clusters,
            zoom,
            start,
            end,
            self.styles.cluster_options(),
        )
        .into();
        self.view = Some(view);
        trace!(
            initial = self.initial_clusters.len(),
            visible = self.clusters.len(),
            "flame clusters updated"
        );
    }

    fn row_height<C: Canvas>(ctx: &PanelContext<'_, C>) -> f64 {
        ctx.surface.surface().styles().block_height + 1.0
    }

    fn content_height<C: Canvas>(&self, ctx: &PanelContext<'_, C>) -> f64 {
        let levels = self.flat.iter().map(|node| node.level + 1).max().unwrap_or(0);
        levels as f64 * Self::row_height(ctx)
    }

    fn cluster_label(cluster: &ClusterizedNode) -> String {
        let Some(first) = cluster.nodes.first() else {
            return String::new();
        };
        match cluster.nodes.len() {
            1 => first.source.name.clone(),
            count => format!("{} (+{})", first.source.name, count - 1),
        }
    }

    fn cluster_color(&self, cluster: &ClusterizedNode) -> String {
        cluster
            .color
            .clone()
            .unwrap_or_else(|| self.styles.default_color.clone())
    }

    fn cluster_payload(cluster: &ClusterizedNode) -> Value {
        let nodes: Vec<Value> = cluster
            .nodes
            .iter()
            .map(|node| {
                json!({
                    "name": node.source.name,
                    "start": node.source.start,
                    "duration": node.source.duration,
                    "level": node.level,
                })
            })
            .collect();

        json!({
            "start": cluster.start,
            "end": cluster.end,
            "level": cluster.level,
            "nodes": nodes,
        })
    }

    fn scroll_by<C: Canvas>(&mut self, delta_y: f64, ctx: &mut PanelContext<'_, C>) {
        let max_scroll = (self.content_height(ctx) - ctx.surface.height()).max(0.0);
        let position_y = (self.position_y + delta_y).clamp(0.0, max_scroll);
        if position_y != self.position_y {
            self.position_y = position_y;
            ctx.surface.request_render();
        }
    }
}

impl<C: Canvas> Plugin<C> for FlamePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn height(&self) -> PanelHeight {
        PanelHeight::Flexible
    }

    fn min(&self) -> Option<f64> {
        self.min_max.map(|min_max| min_max.min)
    }

    fn max(&self) -> Option<f64> {
        self.min_max.map(|min_max| min_max.max)
    }

    fn set_settings(&mut self, styles: &Value) {
        if styles.is_null() {
            return;
        }
        match serde_json::from_value::<FlameStyles>(styles.clone()) {
            Ok(styles) => {
                self.styles = styles;
                self.initial_zoom = None;
            }
            Err(err) => warn!(plugin = %self.name, %err, "ignoring invalid flame styles"),
        }
    }

    fn render(&mut self, ctx: &mut PanelContext<'_, C>) -> bool {
        let surface = ctx.surface.surface();
        let zoom = surface.zoom();
        let start = surface.position_x();
        let end = start + surface.real_view();
        let initial_zoom = surface.initial_zoom();
        self.update_clusters(zoom, initial_zoom, start, end);

        let row_height = Self::row_height(ctx);
        let height = ctx.surface.height();
        let block_height = row_height - 1.0;

        for cluster in self.clusters.iter() {
            let y = cluster.level as f64 * row_height - self.position_y;
            if y + block_height < 0.0 || y > height {
                continue;
            }

            let x = ctx.surface.time_to_position(cluster.start);
            let w = cluster.duration * zoom;
            let color = self.cluster_color(cluster);
            match &cluster.pattern {
                Some(pattern) => ctx
                    .surface
                    .surface_mut()
                    .add_pattern_rect_to_render_queue(pattern, &color, x, y, w),
                None => ctx.surface.add_rect_to_render_queue(&color, x, y, w),
            }
            ctx.surface
                .add_text_to_render_queue(&Self::cluster_label(cluster), x, y, w);
        }

        if let Some(selected) = &self.selected {
            let y = selected.level as f64 * row_height - self.position_y;
            let x = ctx.surface.time_to_position(selected.start);
            let w = selected.duration * zoom;
            ctx.surface.add_stroke_to_render_queue(
                &self.styles.selected_color,
                x,
                y,
                w,
                block_height,
            );
        }

        false
    }

    fn render_hit_regions(&mut self, ctx: &mut PanelContext<'_, C>) {
        let row_height = Self::row_height(ctx);
        let block_height = row_height - 1.0;
        let zoom = ctx.surface.surface().zoom();
        self.region_clusters = Rc::clone(&self.clusters);
        self.hovered = None;

        for (index, cluster) in self.region_clusters.iter().enumerate() {
            let x = ctx.surface.time_to_position(cluster.start);
            let y = cluster.level as f64 * row_height - self.position_y;
            ctx.interactions.add_hit_region(
                HitRegion::new(
                    CLUSTER_REGION,
                    index as u64,
                    x,
                    y,
                    cluster.duration * zoom,
                    block_height,
                )
                .with_cursor("pointer"),
            );
        }
    }

    fn render_tooltip(&mut self, ctx: &mut OverlayContext<'_, C>) -> bool {
        let Some(cluster) = self.hovered.and_then(|index| self.region_clusters.get(index)) else {
            return false;
        };

        let units = ctx.surface.time_units().to_string();
        let mut fields = vec![
            TooltipField::new(Self::cluster_label(cluster)),
            TooltipField::new(format!(
                "duration: {:.3}{units} (start {:.3}{units})",
                cluster.duration, cluster.start
            )),
        ];
        if cluster.nodes.len() > 1 {
            fields.push(TooltipField::new(format!("nodes: {}", cluster.nodes.len())));
        }
        if let Some(badge) = &cluster.badge {
            fields.push(TooltipField::new(format!("badge: {badge}")));
        }

        let mouse = ctx.interactions.global_mouse();
        ctx.surface.render_tooltip_from_data(&fields, mouse);
        true
    }

    fn on_interaction(&mut self, event: &InteractionEvent, ctx: &mut PanelContext<'_, C>) {
        let panel = ctx.surface.id();
        let own_cluster = |region: Option<&HitRegion>| {
            region
                .filter(|region| region.owner == Some(panel) && region.region_type == CLUSTER_REGION)
                .map(|region| region.data as usize)
        };

        match event {
            InteractionEvent::Hover { region, .. } => {
                self.hovered = own_cluster(region.as_ref());
            }
            InteractionEvent::Select { region, .. } => {
                let selected = own_cluster(region.as_ref())
                    .and_then(|index| self.region_clusters.get(index))
                    .cloned();
                if selected == self.selected {
                    return;
                }
                if let Some(cluster) = &selected {
                    ctx.events.push(ChartEvent::Plugin {
                        panel,
                        name: self.name.clone(),
                        payload: Self::cluster_payload(cluster),
                    });
                }
                self.selected = selected;
                ctx.surface.request_render();
            }
            InteractionEvent::ChangePosition {
                delta_x, delta_y, ..
            } => {
                ctx.interactions.set_cursor("grabbing");
                self.scroll_by(*delta_y, ctx);
                ctx.surface.try_to_change_position(*delta_x);
            }
            InteractionEvent::Up { .. } => ctx.interactions.clear_cursor(),
            _ => {}
        }
    }
}

/// Fixed-height strip with the time labels of the grid.
#[derive(Debug)]
pub struct TimeGridHeader {
    height: f64,
}

impl TimeGridHeader {
    pub fn new(height: f64) -> Self {
        Self { height }
    }
}

impl<C: Canvas> Plugin<C> for TimeGridHeader {
    fn name(&self) -> &str {
        "timeGridHeader"
    }

    fn height(&self) -> PanelHeight {
        PanelHeight::Fixed(self.height)
    }

    fn set_settings(&mut self, styles: &Value) {
        if let Some(height) = styles.get("height").and_then(Value::as_f64) {
            self.height = height;
        }
    }

    fn render(&mut self, ctx: &mut PanelContext<'_, C>) -> bool {
        ctx.surface.render_time_grid(ctx.time_grid);
        ctx.surface.render_time_grid_times(ctx.time_grid);
        true
    }
}
