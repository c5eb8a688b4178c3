//! [`FlameCanvas`], the entry point hosts talk to.

use std::time::Duration;

use tracing::debug;

use crate::{
    canvas::Canvas,
    config::ChartSettings,
    engine::{ChartEvent, RenderEngine},
    interactions::{InteractionsEngine, PointerEvent},
    plugin::Plugin,
    scheduler::{FrameHandle, FrameScheduler, ManualScheduler, TimerHandle},
    PanelId, Result,
};

/// Frames a single [`FlameCanvas::run_frames`] call flushes at most.
const MAX_FRAMES_PER_RUN: usize = 64;

/// A chart: the render engine plus the pointer state that drives it.
#[derive(Debug)]
pub struct FlameCanvas<C, S> {
    engine: RenderEngine<C, S>,
    interactions: InteractionsEngine,
}

impl<C: Canvas, S: FrameScheduler> FlameCanvas<C, S> {
    pub fn new(
        canvas: C,
        scheduler: S,
        settings: ChartSettings,
        plugins: Vec<Box<dyn Plugin<C>>>,
    ) -> Self {
        let mut engine = RenderEngine::new(canvas, scheduler, settings, plugins);
        let mut interactions = InteractionsEngine::new();
        engine.init(&mut interactions);

        Self {
            engine,
            interactions,
        }
    }

    pub fn engine(&self) -> &RenderEngine<C, S> {
        &self.engine
    }

    pub fn interactions(&self) -> &InteractionsEngine {
        &self.interactions
    }

    pub fn canvas(&self) -> &C {
        self.engine.canvas()
    }

    /// The cursor the host should show over the canvas.
    pub fn cursor(&self) -> &str {
        self.interactions.cursor()
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) {
        self.interactions.handle_pointer(event, &mut self.engine);
        let envelopes = self.interactions.drain_outbox();
        self.engine.deliver(envelopes, &mut self.interactions);
    }

    pub fn on_animation_frame(&mut self, handle: FrameHandle) {
        self.engine.on_animation_frame(handle, &mut self.interactions);
    }

    pub fn on_timer(&mut self, handle: TimerHandle) {
        self.engine.on_timer(handle, &mut self.interactions);
    }

    pub fn render(&mut self) {
        self.engine.render();
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.engine.resize(width, height);
        self.interactions.sync_geometry(&self.engine.panel_geometries());
    }

    pub fn set_settings(&mut self, settings: ChartSettings) {
        self.engine.set_settings(settings);
        self.interactions.sync_geometry(&self.engine.panel_geometries());
    }

    /// Shows the `[start, end]` time window.
    pub fn set_zoom(&mut self, start: f64, end: f64) {
        let span = end - start;
        if span.is_nan() || span <= 0.0 {
            return;
        }
        let zoom = self.engine.width() / span;
        self.engine.set_position_x(start);
        self.engine.set_zoom(zoom);
        self.engine.try_to_change_position(0.0);
        self.engine.render();
    }

    pub fn reset_view(&mut self) {
        self.engine.reset_view();
        self.engine.render();
    }

    pub fn collapse_panel(&mut self, id: PanelId) -> Result<()> {
        self.engine.panel_mut(id)?.collapse();
        self.engine.process_panel_requests(&mut self.interactions);
        Ok(())
    }

    pub fn expand_panel(&mut self, id: PanelId) -> Result<()> {
        self.engine.panel_mut(id)?.expand();
        self.engine.process_panel_requests(&mut self.interactions);
        Ok(())
    }

    pub fn drain_events(&mut self) -> Vec<ChartEvent> {
        self.engine.drain_events()
    }
}

impl<C: Canvas> FlameCanvas<C, ManualScheduler> {
    /// Flushes pending frames until none is left. Returns how many ran.
    pub fn run_frames(&mut self) -> usize {
        let mut count = 0;
        while count < MAX_FRAMES_PER_RUN {
            let Some(handle) = self.engine.scheduler_mut().take_frame() else {
                break;
            };
            self.on_animation_frame(handle);
            count += 1;
        }
        debug!(frames = count, "manual frames flushed");
        count
    }

    /// Moves the manual clock and fires the timers that came due.
    pub fn advance_time(&mut self, by: Duration) {
        let fired = self.engine.scheduler_mut().advance(by);
        for timer in fired {
            self.on_timer(timer);
        }
    }
}
