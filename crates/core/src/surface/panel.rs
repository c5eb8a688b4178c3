use crate::{
    canvas::Canvas,
    config::{RenderOptions, RenderStyles},
    layout::{Layoutable, LayoutInput, PanelHeight, Placement, PlacementType},
    time_grid::TimeGrid,
    PanelId,
};

use super::{RenderSurface, Surface};

/// Work a panel hands up to the engine that owns it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelRequest {
    /// Re-render this panel on the next frame.
    Render,
    /// The panel changed its own height; recompute the stacking.
    RecalcLayout,
    /// Pan the shared time axis by a delta in time units.
    ChangePosition(f64),
    /// Reset the shared view to the full domain and re-render.
    ResetView,
    /// Recompute the shared domain from every plugin.
    RecalcMinMax,
}

/// One stacked panel: an offscreen surface later blitted into the main canvas.
#[derive(Debug)]
pub struct PanelSurface<C> {
    id: PanelId,
    surface: RenderSurface<C>,
    position: f64,
    flexible: bool,
    collapsed: bool,
    children: Vec<RenderSurface<C>>,
    requests: Vec<PanelRequest>,
}

impl<C: Canvas> Surface<C> for PanelSurface<C> {
    fn render_surface(&self) -> &RenderSurface<C> {
        &self.surface
    }

    fn render_surface_mut(&mut self) -> &mut RenderSurface<C> {
        &mut self.surface
    }
}

impl<C: Canvas> PanelSurface<C> {
    pub(crate) fn new(id: PanelId, surface: RenderSurface<C>) -> Self {
        Self {
            id,
            surface,
            position: 0.0,
            flexible: false,
            collapsed: false,
            children: Vec::new(),
            requests: Vec::new(),
        }
    }

    pub fn id(&self) -> PanelId {
        self.id
    }

    /// Top edge inside the main canvas.
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn surface(&self) -> &RenderSurface<C> {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut RenderSurface<C> {
        &mut self.surface
    }

    pub fn is_flexible(&self) -> bool {
        self.flexible
    }

    /// Lets the user resize the panel; its own height then wins over the
    /// plugin's preferred one.
    pub fn set_flexible(&mut self) {
        self.flexible = true;
    }

    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    pub fn collapse(&mut self) {
        self.collapsed = true;
        self.surface.clear();
        self.requests.push(PanelRequest::RecalcLayout);
    }

    pub fn expand(&mut self) {
        self.collapsed = false;
        self.requests.push(PanelRequest::RecalcLayout);
    }

    /// Applies a placement. Height changes that did not come from the layout
    /// pass itself ask the engine for a new layout.
    pub fn resize(&mut self, placement: &Placement, is_parent_call: bool) {
        let height_changed = self
            .surface
            .resize(Some(placement.width), Some(placement.height));
        if !is_parent_call && height_changed {
            self.requests.push(PanelRequest::RecalcLayout);
        }
        self.position = placement.position;

        for child in &mut self.children {
            child.resize(Some(placement.width), Some(placement.height));
        }
    }

    /// Changes the panel height on behalf of its plugin.
    pub fn request_height(&mut self, height: f64) {
        let placement = Placement {
            width: self.surface.width(),
            position: self.position,
            height,
            placement_type: PlacementType::FlexibleStatic,
            collapsed: self.collapsed,
        };
        self.resize(&placement, false);
    }

    /// Adds a nested surface with the same size and domain, e.g. a mini chart.
    pub fn make_child(&mut self) -> usize {
        let child = self
            .surface
            .offscreen_from(self.surface.width(), self.surface.height());
        self.children.push(child);
        self.children.len() - 1
    }

    pub fn child(&self, index: usize) -> Option<&RenderSurface<C>> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut RenderSurface<C>> {
        self.children.get_mut(index)
    }

    /// Blits a nested surface onto this panel.
    pub fn copy_child(&mut self, index: usize) {
        if let Some(child) = self.children.get(index) {
            self.surface.copy_from(child, 0.0);
        }
    }

    pub(crate) fn set_min_max(&mut self, min: f64, max: f64) {
        self.surface.set_min_max(min, max);
        for child in &mut self.children {
            child.set_min_max(min, max);
        }
    }

    pub(crate) fn set_zoom(&mut self, zoom: f64) {
        self.surface.set_zoom(zoom);
        for child in &mut self.children {
            child.set_zoom(zoom);
        }
    }

    pub(crate) fn set_position_x(&mut self, x: f64) {
        self.surface.set_position_x(x);
        for child in &mut self.children {
            child.set_position_x(x);
        }
    }

    pub(crate) fn set_settings(&mut self, styles: &RenderStyles, options: &RenderOptions) {
        self.surface.set_settings(styles.clone(), options.clone());
        for child in &mut self.children {
            child.set_settings(styles.clone(), options.clone());
        }
    }

    pub fn try_to_change_position(&mut self, delta: f64) {
        self.requests.push(PanelRequest::ChangePosition(delta));
    }

    pub fn reset_parent_view(&mut self) {
        self.requests.push(PanelRequest::ResetView);
    }

    pub fn recalc_min_max(&mut self) {
        self.requests.push(PanelRequest::RecalcMinMax);
    }

    pub fn request_render(&mut self) {
        self.requests.push(PanelRequest::Render);
    }

    pub(crate) fn drain_requests(&mut self) -> Vec<PanelRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn render_time_grid(&mut self, time_grid: &TimeGrid) {
        let height = self.surface.height();
        time_grid.render_lines(&mut self.surface, 0.0, height);
    }

    pub fn render_time_grid_times(&mut self, time_grid: &TimeGrid) {
        time_grid.render_times(&mut self.surface);
    }

    /// What the engine draws when a plugin does not take over rendering.
    pub fn standard_render(&mut self, time_grid: &TimeGrid) {
        self.surface.resolve_queue();
        self.render_time_grid(time_grid);
    }
}

impl<C: Canvas> Layoutable for PanelSurface<C> {
    fn layout_input(&self, preferred: PanelHeight) -> LayoutInput {
        let placement_type = match preferred {
            PanelHeight::Fixed(_) if self.flexible => PlacementType::FlexibleStatic,
            PanelHeight::Fixed(_) => PlacementType::Static,
            PanelHeight::Flexible => PlacementType::FlexibleGrowing,
        };
        let current = self.surface.height();
        let height = match (placement_type, preferred) {
            (PlacementType::Static, PanelHeight::Fixed(height)) => height,
            (PlacementType::FlexibleStatic, PanelHeight::Fixed(height)) if current <= 0.0 => height,
            _ => current,
        };

        LayoutInput {
            placement_type,
            height,
            collapsed: self.collapsed,
        }
    }

    fn apply_placement(&mut self, placement: &Placement) {
        self.resize(placement, true);
    }
}
