//! The contract every visual panel implements.

use serde_json::Value;

use crate::{
    canvas::Canvas,
    engine::ChartEvent,
    interactions::{InteractionEvent, SeparatedInteractions},
    layout::PanelHeight,
    surface::{PanelSurface, RenderSurface},
    time_grid::TimeGrid,
};

/// What a plugin may touch while rendering or reacting to input.
pub struct PanelContext<'a, C> {
    pub surface: &'a mut PanelSurface<C>,
    pub interactions: &'a mut SeparatedInteractions,
    pub time_grid: &'a TimeGrid,
    pub events: &'a mut Vec<ChartEvent>,
}

/// Access to the composited main canvas, after every panel was blitted.
pub struct OverlayContext<'a, C> {
    pub surface: &'a mut RenderSurface<C>,
    pub panel: &'a PanelSurface<C>,
    pub interactions: &'a SeparatedInteractions,
}

pub trait Plugin<C: Canvas> {
    /// Key of the plugin's block in `styles.plugins`.
    fn name(&self) -> &str;

    fn height(&self) -> PanelHeight {
        PanelHeight::Flexible
    }

    /// Lower bound this plugin contributes to the shared time domain.
    fn min(&self) -> Option<f64> {
        None
    }

    fn max(&self) -> Option<f64> {
        None
    }

    /// Called once, right after the panel is created.
    fn init(&mut self, _ctx: &mut PanelContext<'_, C>) {}

    /// Called once every plugin was initialised and laid out.
    fn post_init(&mut self, _ctx: &mut PanelContext<'_, C>) {}

    /// Draws the panel. Returning `true` skips the standard queue flush and
    /// time grid.
    fn render(&mut self, _ctx: &mut PanelContext<'_, C>) -> bool {
        false
    }

    /// Rebuilds the panel's hit regions. Called after the regions were cleared.
    fn render_hit_regions(&mut self, _ctx: &mut PanelContext<'_, C>) {}

    fn set_settings(&mut self, _styles: &Value) {}

    /// Draws a tooltip on the main canvas. Returns `true` when one was drawn;
    /// later plugins are then not asked.
    fn render_tooltip(&mut self, _ctx: &mut OverlayContext<'_, C>) -> bool {
        false
    }

    fn post_render(&mut self, _ctx: &mut OverlayContext<'_, C>) {}

    /// Drags pan the shared time axis unless a plugin overrides this.
    fn on_interaction(&mut self, event: &InteractionEvent, ctx: &mut PanelContext<'_, C>) {
        match event {
            InteractionEvent::ChangePosition { delta_x, .. } => {
                ctx.interactions.set_cursor("grabbing");
                ctx.surface.try_to_change_position(*delta_x);
            }
            InteractionEvent::Up { .. } => ctx.interactions.clear_cursor(),
            _ => {}
        }
    }
}
