//! The top-level render engine: owns the visible canvas, one panel per plugin,
//! the shared time axis and the pending frame.

use std::{fmt, time::Duration};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    canvas::Canvas,
    config::ChartSettings,
    error::FlameCanvasError,
    ids::IdAllocator,
    interactions::{Envelope, HitRegion, InteractionsEngine},
    layout::{calc_children_layout, LayoutInput, Layoutable},
    plugin::{OverlayContext, PanelContext, Plugin},
    scheduler::{FrameFlush, FrameHandle, FrameScheduler, FrameSlot, FrameState, TimerHandle},
    surface::{PanelRequest, PanelSurface, RenderSurface},
    time_grid::{TimeGrid, MAX_ACCURACY},
    PanelId, Result,
};

/// Quiet period after a full render before hit regions are rebuilt.
pub const HIT_REGION_REBUILD_DELAY: Duration = Duration::from_millis(100);

/// Notifications for the code embedding the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ChartEvent {
    Select {
        panel: Option<PanelId>,
        region: Option<HitRegion>,
    },
    Hover {
        panel: Option<PanelId>,
        region: Option<HitRegion>,
        mouse: (f64, f64),
    },
    Click {
        panel: Option<PanelId>,
        region: Option<HitRegion>,
    },
    ChangePosition {
        delta_x: f64,
        delta_y: f64,
    },
    Resize {
        width: f64,
        height: f64,
    },
    MinMaxChange {
        min: f64,
        max: f64,
    },
    /// Raised by a plugin with its own payload, e.g. the node under a click.
    Plugin {
        panel: PanelId,
        name: String,
        payload: Value,
    },
}

pub struct RenderEngine<C, S> {
    surface: RenderSurface<C>,
    scheduler: S,
    settings: ChartSettings,
    time_grid: TimeGrid,
    panels: Vec<PanelSurface<C>>,
    plugins: Vec<Box<dyn Plugin<C>>>,
    ids: IdAllocator,
    frame: FrameSlot,
    hit_region_timer: Option<TimerHandle>,
    free_space: f64,
    events: Vec<ChartEvent>,
}

impl<C: fmt::Debug, S: fmt::Debug> fmt::Debug for RenderEngine<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderEngine")
            .field("surface", &self.surface)
            .field("scheduler", &self.scheduler)
            .field("panels", &self.panels.len())
            .field("frame", &self.frame)
            .field("free_space", &self.free_space)
            .finish_non_exhaustive()
    }
}

impl<C: Canvas, S: FrameScheduler> RenderEngine<C, S> {
    /// Wraps `canvas`. Panels are created by [`init`](Self::init).
    pub fn new(
        canvas: C,
        scheduler: S,
        settings: ChartSettings,
        plugins: Vec<Box<dyn Plugin<C>>>,
    ) -> Self {
        let pixel_ratio = canvas.pixel_ratio();
        let (width, height) = canvas.size();
        let surface = RenderSurface::new(
            canvas,
            width / pixel_ratio,
            height / pixel_ratio,
            settings.styles.main.clone(),
            settings.options.clone(),
        );

        Self {
            surface,
            scheduler,
            time_grid: TimeGrid::new(settings.styles.time_grid.clone()),
            settings,
            panels: Vec::new(),
            plugins,
            ids: IdAllocator::new(),
            frame: FrameSlot::new(),
            hit_region_timer: None,
            free_space: 0.0,
            events: Vec::new(),
        }
    }

    /// Creates a panel and an interaction instance per plugin, initialises the
    /// plugins, lays the panels out and schedules the first full render.
    pub fn init(&mut self, interactions: &mut InteractionsEngine) {
        let width = self.surface.width();
        for plugin in &mut self.plugins {
            let id = self.ids.allocate();
            let surface = self.surface.offscreen_from(width, 0.0);
            self.panels.push(PanelSurface::new(id, surface));
            interactions.make_instance(id);

            let styles = self.settings.plugin_styles(plugin.name());
            plugin.set_settings(&styles);
        }
        debug!(panels = self.panels.len(), "render engine initialised");

        self.calc_min_max();
        self.reset_view();

        for index in 0..self.panels.len() {
            self.with_panel(index, interactions, |plugin, ctx| plugin.init(ctx));
        }
        self.recalc_children_layout();
        for index in 0..self.panels.len() {
            self.with_panel(index, interactions, |plugin, ctx| plugin.post_init(ctx));
        }
        interactions.sync_geometry(&self.panel_geometries());

        self.process_panel_requests(interactions);
        self.render();
    }

    pub fn surface(&self) -> &RenderSurface<C> {
        &self.surface
    }

    pub fn canvas(&self) -> &C {
        self.surface.canvas()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn settings(&self) -> &ChartSettings {
        &self.settings
    }

    pub fn time_grid(&self) -> &TimeGrid {
        &self.time_grid
    }

    pub fn frame_state(&self) -> &FrameState {
        self.frame.state()
    }

    pub fn free_space(&self) -> f64 {
        self.free_space
    }

    pub fn panels(&self) -> &[PanelSurface<C>] {
        &self.panels
    }

    pub fn panel(&self, id: PanelId) -> Result<&PanelSurface<C>> {
        self.panels
            .iter()
            .find(|panel| panel.id() == id)
            .ok_or(FlameCanvasError::UnknownPanel(id))
    }

    pub fn panel_mut(&mut self, id: PanelId) -> Result<&mut PanelSurface<C>> {
        self.panels
            .iter_mut()
            .find(|panel| panel.id() == id)
            .ok_or(FlameCanvasError::UnknownPanel(id))
    }

    /// `(id, top, height)` of every panel; collapsed panels have no height.
    pub fn panel_geometries(&self) -> Vec<(PanelId, f64, f64)> {
        self.panels
            .iter()
            .map(|panel| {
                let height = if panel.is_collapsed() {
                    0.0
                } else {
                    panel.surface().height()
                };
                (panel.id(), panel.position(), height)
            })
            .collect()
    }

    pub fn width(&self) -> f64 {
        self.surface.width()
    }

    pub fn height(&self) -> f64 {
        self.surface.height()
    }

    pub fn zoom(&self) -> f64 {
        self.surface.zoom()
    }

    pub fn position_x(&self) -> f64 {
        self.surface.position_x()
    }

    pub fn min(&self) -> f64 {
        self.surface.min()
    }

    pub fn max(&self) -> f64 {
        self.surface.max()
    }

    pub fn real_view(&self) -> f64 {
        self.surface.real_view()
    }

    pub fn initial_zoom(&self) -> f64 {
        self.surface.initial_zoom()
    }

    pub fn emit(&mut self, event: ChartEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<ChartEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn set_settings(&mut self, settings: ChartSettings) {
        self.time_grid.set_styles(settings.styles.time_grid.clone());
        self.surface
            .set_settings(settings.styles.main.clone(), settings.options.clone());
        for panel in &mut self.panels {
            panel.set_settings(&settings.styles.main, &settings.options);
        }
        for plugin in &mut self.plugins {
            let styles = settings.plugin_styles(plugin.name());
            plugin.set_settings(&styles);
        }
        self.settings = settings;

        self.recalc_children_layout();
        self.render();
    }

    /// Merges the domain contributions of every plugin. Bounds nobody
    /// contributes keep their current value.
    pub fn calc_min_max(&mut self) {
        let min = self.plugins.iter().filter_map(|plugin| plugin.min()).reduce(f64::min);
        let max = self.plugins.iter().filter_map(|plugin| plugin.max()).reduce(f64::max);
        if min.is_none() && max.is_none() {
            return;
        }

        let min = min.unwrap_or(self.surface.min());
        let max = max.unwrap_or(self.surface.max());
        if self.set_min_max(min, max) {
            debug!(min, max, "time domain changed");
            self.emit(ChartEvent::MinMaxChange { min, max });
        }
    }

    fn set_min_max(&mut self, min: f64, max: f64) -> bool {
        let changed = self.surface.set_min_max(min, max);
        for panel in &mut self.panels {
            panel.set_min_max(min, max);
        }
        changed
    }

    /// Resizes the visible canvas, keeping the view centred.
    pub fn resize(&mut self, width: f64, height: f64) {
        let current_width = self.surface.width();
        if !self.surface.resize(Some(width), Some(height)) && width == current_width {
            return;
        }
        self.frame.cancel_partial(&mut self.scheduler);
        self.recalc_children_layout();

        if self.surface.initial_zoom() > self.surface.zoom() {
            self.reset_view();
        } else if self.surface.position_x() > self.surface.min() {
            let delta = -self.surface.pixel_to_time((width - current_width) / 2.0);
            self.try_to_change_position(delta);
        }

        debug!(width, height, "render engine resized");
        self.emit(ChartEvent::Resize { width, height });
        self.render();
    }

    pub fn recalc_children_layout(&mut self) {
        let inputs: Vec<LayoutInput> = self
            .panels
            .iter()
            .zip(&self.plugins)
            .map(|(panel, plugin)| panel.layout_input(plugin.height()))
            .collect();
        let layout = calc_children_layout(self.surface.width(), self.surface.height(), &inputs);

        for (panel, placement) in self.panels.iter_mut().zip(&layout.placements) {
            panel.apply_placement(placement);
        }
        self.free_space = layout.free_space;
        debug!(
            panels = self.panels.len(),
            free_space = self.free_space,
            "children layout recalculated"
        );
    }

    /// Changes the zoom of every surface at once. Zooming in is refused once
    /// the time grid reached its maximum accuracy; zooming out stops at the
    /// zoom showing the whole domain.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if self.time_grid.accuracy() >= MAX_ACCURACY && zoom > self.surface.zoom() {
            return false;
        }

        let zoom = zoom.max(self.surface.initial_zoom());
        self.surface.set_zoom(zoom);
        for panel in &mut self.panels {
            panel.set_zoom(zoom);
        }
        true
    }

    pub fn set_position_x(&mut self, x: f64) -> f64 {
        let delta = self.surface.set_position_x(x);
        for panel in &mut self.panels {
            panel.set_position_x(x);
        }
        delta
    }

    pub fn try_to_change_position(&mut self, delta: f64) {
        self.surface.try_to_change_position(delta);
        let x = self.surface.position_x();
        for panel in &mut self.panels {
            panel.set_position_x(x);
        }
    }

    pub fn reset_view(&mut self) {
        self.surface.reset_view();
        let zoom = self.surface.zoom();
        let x = self.surface.position_x();
        for panel in &mut self.panels {
            panel.set_zoom(zoom);
            panel.set_position_x(x);
        }
    }

    /// Re-renders `panel` (or only the overlay) on the next frame.
    pub fn partial_render(&mut self, panel: Option<PanelId>) {
        self.frame.request_partial(&mut self.scheduler, panel);
    }

    /// Re-renders everything on the next frame.
    pub fn render(&mut self) {
        self.frame.request_full(&mut self.scheduler);
    }

    /// Host callback for a frame requested through the scheduler.
    pub fn on_animation_frame(&mut self, handle: FrameHandle, interactions: &mut InteractionsEngine) {
        let Some(flush) = self.frame.take(handle) else {
            trace!(handle = handle.0, "ignoring stale frame");
            return;
        };

        match flush {
            FrameFlush::Full => {
                self.time_grid.recalc(&self.surface);
                for index in 0..self.panels.len() {
                    self.render_plugin(index, interactions);
                }
                self.shallow_render(interactions);
                self.schedule_hit_regions();
                debug!(panels = self.panels.len(), "full frame flushed");
            }
            FrameFlush::Partial(ids) => {
                for &id in &ids {
                    if let Some(index) = self.index_of(id) {
                        self.render_plugin(index, interactions);
                        self.rebuild_hit_regions(index, interactions);
                    }
                }
                self.shallow_render(interactions);
                debug!(panels = ids.len(), "partial frame flushed");
            }
        }

        self.process_panel_requests(interactions);
    }

    /// Host callback for a timer requested through the scheduler.
    pub fn on_timer(&mut self, handle: TimerHandle, interactions: &mut InteractionsEngine) {
        if self.hit_region_timer != Some(handle) {
            return;
        }
        self.hit_region_timer = None;

        for index in 0..self.panels.len() {
            self.rebuild_hit_regions(index, interactions);
        }
        trace!(panels = self.panels.len(), "hit regions rebuilt");
        self.process_panel_requests(interactions);
    }

    fn schedule_hit_regions(&mut self) {
        if let Some(timer) = self.hit_region_timer.take() {
            self.scheduler.cancel_timer(timer);
        }
        self.hit_region_timer = Some(self.scheduler.set_timer(HIT_REGION_REBUILD_DELAY));
    }

    fn index_of(&self, id: PanelId) -> Option<usize> {
        self.panels.iter().position(|panel| panel.id() == id)
    }

    fn with_panel<R>(
        &mut self,
        index: usize,
        interactions: &mut InteractionsEngine,
        f: impl FnOnce(&mut Box<dyn Plugin<C>>, &mut PanelContext<'_, C>) -> R,
    ) -> Option<R> {
        let panel = self.panels.get_mut(index)?;
        let plugin = self.plugins.get_mut(index)?;
        let instance = interactions.instance_mut(panel.id())?;

        let mut ctx = PanelContext {
            surface: panel,
            interactions: instance,
            time_grid: &self.time_grid,
            events: &mut self.events,
        };
        Some(f(plugin, &mut ctx))
    }

    fn render_plugin(&mut self, index: usize, interactions: &mut InteractionsEngine) {
        self.with_panel(index, interactions, |plugin, ctx| {
            if ctx.surface.is_collapsed() {
                return;
            }
            ctx.surface.surface_mut().clear();
            if !plugin.render(ctx) {
                ctx.surface.standard_render(ctx.time_grid);
            }
        });
    }

    fn rebuild_hit_regions(&mut self, index: usize, interactions: &mut InteractionsEngine) {
        self.with_panel(index, interactions, |plugin, ctx| {
            ctx.interactions.clear_hit_regions();
            if !ctx.surface.is_collapsed() {
                plugin.render_hit_regions(ctx);
            }
        });
    }

    /// Composites the panels into the visible canvas and draws overlays.
    fn shallow_render(&mut self, interactions: &InteractionsEngine) {
        self.surface.clear();

        if self.free_space > 0.0 {
            let top = self.surface.height() - self.free_space;
            self.time_grid
                .render_lines(&mut self.surface, top, self.free_space);
        }

        for panel in &self.panels {
            if !panel.is_collapsed() {
                self.surface.copy_from(panel.surface(), panel.position());
            }
        }

        for (plugin, panel) in self.plugins.iter_mut().zip(&self.panels) {
            let Some(instance) = interactions.instance(panel.id()) else {
                continue;
            };
            let mut ctx = OverlayContext {
                surface: &mut self.surface,
                panel,
                interactions: instance,
            };
            plugin.post_render(&mut ctx);
        }

        if !self.surface.options().tooltip {
            return;
        }
        for (plugin, panel) in self.plugins.iter_mut().zip(&self.panels) {
            let Some(instance) = interactions.instance(panel.id()) else {
                continue;
            };
            let mut ctx = OverlayContext {
                surface: &mut self.surface,
                panel,
                interactions: instance,
            };
            if plugin.render_tooltip(&mut ctx) {
                break;
            }
        }
    }

    /// Applies what panels asked for since the last call.
    pub fn process_panel_requests(&mut self, interactions: &mut InteractionsEngine) {
        let mut requests = Vec::new();
        for panel in &mut self.panels {
            let id = panel.id();
            requests.extend(panel.drain_requests().into_iter().map(|request| (id, request)));
        }
        if requests.is_empty() {
            return;
        }

        let mut relayout = false;
        let mut full_render = false;
        for (id, request) in requests {
            match request {
                PanelRequest::Render => self.partial_render(Some(id)),
                PanelRequest::RecalcLayout => relayout = true,
                PanelRequest::ChangePosition(delta) => {
                    let before = self.surface.position_x();
                    self.try_to_change_position(delta);
                    full_render |= before != self.surface.position_x();
                }
                PanelRequest::ResetView => {
                    self.reset_view();
                    full_render = true;
                }
                PanelRequest::RecalcMinMax => self.calc_min_max(),
            }
        }

        if relayout {
            self.recalc_children_layout();
            interactions.sync_geometry(&self.panel_geometries());
            full_render = true;
        }
        if full_render {
            self.render();
        }
    }

    /// Hands routed pointer events to the plugins whose panels accept them.
    pub fn deliver(&mut self, envelopes: Vec<Envelope>, interactions: &mut InteractionsEngine) {
        for envelope in &envelopes {
            for index in 0..self.panels.len() {
                self.with_panel(index, interactions, |plugin, ctx| {
                    if ctx.interactions.accepts(envelope) {
                        plugin.on_interaction(&envelope.event, ctx);
                    }
                });
            }
        }
        self.process_panel_requests(interactions);
    }
}
