//! Pointer handling, hit-testing and per-panel event routing.
//!
//! [`InteractionsEngine`] owns the single pointer listener of the chart. It
//! turns raw [`PointerEvent`]s into [`InteractionEvent`]s wrapped in an
//! [`Envelope`] naming their target. Each panel has a [`SeparatedInteractions`]
//! that decides which envelopes its plugin gets to see.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

use crate::{
    canvas::Canvas,
    engine::{ChartEvent, RenderEngine},
    scheduler::FrameScheduler,
    PanelId,
};

/// Opaque payload of a hit region; plugins usually store an index into their data.
pub type HitData = u64;

const DEFAULT_CURSOR: &str = "default";

/// A rectangle that reacts to the pointer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRegion {
    #[serde(rename = "type")]
    pub region_type: String,
    pub data: HitData,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub cursor: Option<String>,
    /// Panel that registered the region; `None` for chart-wide regions.
    #[serde(default)]
    pub owner: Option<PanelId>,
}

impl HitRegion {
    pub fn new(region_type: impl Into<String>, data: HitData, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            region_type: region_type.into(),
            data,
            x,
            y,
            w,
            h,
            cursor: None,
            owner: None,
        }
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.w, self.y + self.h)
    }

    /// Inclusive containment of `point`, with the region shifted down by `offset_y`.
    pub fn contains(&self, point: Point, offset_y: f64) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.w
            && point.y >= self.y + offset_y
            && point.y <= self.y + self.h + offset_y
    }
}

/// Raw input from the host, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Wheel {
        position: Point,
        delta_x: f64,
        delta_y: f64,
    },
    Down { position: Point },
    Up { position: Point },
    Move { position: Point },
    Leave,
}

/// What plugins are told about the pointer. `mouse` is in chart coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionEvent {
    Down {
        region: Option<HitRegion>,
        mouse: Point,
    },
    Up {
        region: Option<HitRegion>,
        mouse: Point,
        is_click: bool,
    },
    Move {
        region: Option<HitRegion>,
        mouse: Point,
    },
    Click {
        region: Option<HitRegion>,
        mouse: Point,
    },
    Select {
        region: Option<HitRegion>,
        mouse: Point,
    },
    Hover {
        region: Option<HitRegion>,
        mouse: Point,
    },
    /// A drag step: `delta_x` in time units, `delta_y` in pixels.
    ChangePosition {
        delta_x: f64,
        delta_y: f64,
        start: Point,
        end: Point,
    },
}

impl InteractionEvent {
    pub fn region(&self) -> Option<&HitRegion> {
        match self {
            Self::Down { region, .. }
            | Self::Up { region, .. }
            | Self::Move { region, .. }
            | Self::Click { region, .. }
            | Self::Select { region, .. }
            | Self::Hover { region, .. } => region.as_ref(),
            Self::ChangePosition { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    /// Every panel under the pointer.
    Broadcast,
    Panel(PanelId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub target: EventTarget,
    pub event: InteractionEvent,
}

impl Envelope {
    /// Routes by the owner of the event's region. Regions without an owner
    /// and events without a region go to everyone.
    fn routed(event: InteractionEvent) -> Self {
        let target = match event.region().and_then(|region| region.owner) {
            Some(owner) => EventTarget::Panel(owner),
            None => EventTarget::Broadcast,
        };
        Self { target, event }
    }
}

/// The view of the interaction engine a single panel gets.
#[derive(Debug, Clone)]
pub struct SeparatedInteractions {
    id: PanelId,
    position: f64,
    height: f64,
    mouse: Point,
    hit_regions: Vec<HitRegion>,
    cursor: Option<String>,
}

impl SeparatedInteractions {
    pub(crate) fn new(id: PanelId) -> Self {
        Self {
            id,
            position: 0.0,
            height: 0.0,
            mouse: Point::ZERO,
            hit_regions: Vec::new(),
            cursor: None,
        }
    }

    pub fn id(&self) -> PanelId {
        self.id
    }

    /// Pointer position relative to the top of the panel.
    pub fn mouse(&self) -> Point {
        Point::new(self.mouse.x, self.mouse.y - self.position)
    }

    pub fn global_mouse(&self) -> Point {
        self.mouse
    }

    pub fn hit_regions(&self) -> &[HitRegion] {
        &self.hit_regions
    }

    pub fn clear_hit_regions(&mut self) {
        self.hit_regions.clear();
    }

    /// Registers a panel-local region owned by this panel.
    pub fn add_hit_region(&mut self, mut region: HitRegion) {
        region.owner = Some(self.id);
        self.hit_regions.push(region);
    }

    /// Forces a cursor until [`clear_cursor`](Self::clear_cursor), e.g. while dragging.
    pub fn set_cursor(&mut self, cursor: impl Into<String>) {
        self.cursor = Some(cursor.into());
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub(crate) fn set_geometry(&mut self, position: f64, height: f64) {
        self.position = position;
        self.height = height;
    }

    fn set_mouse(&mut self, mouse: Point) {
        self.mouse = mouse;
    }

    fn contains_y(&self, y: f64) -> bool {
        self.position <= y && y <= self.position + self.height
    }

    /// Whether this panel's plugin should receive `envelope`.
    ///
    /// Hover and drag events are delivered wherever the pointer is, as is an
    /// `Up` addressed to the panel the press started in. The other pointer
    /// events only reach the panel under the pointer.
    pub fn accepts(&self, envelope: &Envelope) -> bool {
        let addressed = match envelope.target {
            EventTarget::Broadcast => true,
            EventTarget::Panel(id) => id == self.id,
        };
        if !addressed {
            return false;
        }

        let targeted = envelope.target == EventTarget::Panel(self.id);
        match envelope.event {
            InteractionEvent::Hover { .. } => true,
            InteractionEvent::ChangePosition { .. } => targeted,
            InteractionEvent::Up { .. } if targeted => true,
            _ => self.contains_y(self.mouse.y),
        }
    }
}

/// Pointer state of the whole chart.
#[derive(Debug, Default)]
pub struct InteractionsEngine {
    hit_regions: Vec<HitRegion>,
    instances: Vec<SeparatedInteractions>,
    mouse: Point,
    mouse_down: Option<Point>,
    mouse_down_instance: Option<PanelId>,
    hovered_region: Option<HitRegion>,
    hovered_instance: Option<PanelId>,
    move_active: bool,
    current_cursor: Option<String>,
    outbox: Vec<Envelope>,
}

impl InteractionsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn make_instance(&mut self, id: PanelId) {
        self.instances.push(SeparatedInteractions::new(id));
    }

    pub fn instance(&self, id: PanelId) -> Option<&SeparatedInteractions> {
        self.instances.iter().find(|instance| instance.id == id)
    }

    pub fn instance_mut(&mut self, id: PanelId) -> Option<&mut SeparatedInteractions> {
        self.instances.iter_mut().find(|instance| instance.id == id)
    }

    pub fn mouse(&self) -> Point {
        self.mouse
    }

    pub fn hovered_region(&self) -> Option<&HitRegion> {
        self.hovered_region.as_ref()
    }

    pub fn hovered_instance(&self) -> Option<PanelId> {
        self.hovered_instance
    }

    pub fn is_move_active(&self) -> bool {
        self.move_active
    }

    /// Chart-wide regions, checked before any panel's own.
    pub fn add_hit_region(&mut self, region: HitRegion) {
        self.hit_regions.push(region);
    }

    pub fn clear_hit_regions(&mut self) {
        self.hit_regions.clear();
    }

    pub fn set_cursor(&mut self, cursor: impl Into<String>) {
        self.current_cursor = Some(cursor.into());
    }

    pub fn clear_cursor(&mut self) {
        self.current_cursor = None;
    }

    /// The cursor the host should show.
    pub fn cursor(&self) -> &str {
        self.instances
            .iter()
            .find_map(SeparatedInteractions::cursor)
            .or(self.current_cursor.as_deref())
            .or_else(|| self.hovered_region.as_ref().and_then(|region| region.cursor.as_deref()))
            .unwrap_or(DEFAULT_CURSOR)
    }

    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbox)
    }

    pub(crate) fn sync_geometry(&mut self, geometries: &[(PanelId, f64, f64)]) {
        for &(id, position, height) in geometries {
            if let Some(instance) = self.instance_mut(id) {
                instance.set_geometry(position, height);
            }
        }
    }

    fn set_mouse(&mut self, mouse: Point) {
        self.mouse = mouse;
        for instance in &mut self.instances {
            instance.set_mouse(mouse);
        }
    }

    pub fn handle_pointer<C: Canvas, S: FrameScheduler>(
        &mut self,
        event: PointerEvent,
        engine: &mut RenderEngine<C, S>,
    ) {
        self.sync_geometry(&engine.panel_geometries());

        match event {
            PointerEvent::Wheel {
                position,
                delta_x,
                delta_y,
            } => self.handle_wheel(position, delta_x, delta_y, engine),
            PointerEvent::Down { position } => self.handle_down(position),
            PointerEvent::Up { position } => self.handle_up(position, engine),
            PointerEvent::Move { position } => self.handle_move(position, engine),
            PointerEvent::Leave => self.handle_leave(engine),
        }
    }

    /// Horizontal delta pans; vertical delta zooms around the pointer, never
    /// past the zoom that shows the whole domain.
    fn handle_wheel<C: Canvas, S: FrameScheduler>(
        &mut self,
        position: Point,
        delta_x: f64,
        delta_y: f64,
        engine: &mut RenderEngine<C, S>,
    ) {
        self.set_mouse(position);

        let real_view = engine.real_view();
        let initial_zoom = engine.initial_zoom();
        let start_position = engine.position_x();
        let start_zoom = engine.zoom();

        engine.try_to_change_position(delta_x / engine.zoom());

        let mut zoom_delta = delta_y / 1000.0 * engine.zoom();
        if engine.zoom() - zoom_delta < initial_zoom {
            zoom_delta = engine.zoom() - initial_zoom;
        }

        if zoom_delta != 0.0 && engine.set_zoom(engine.zoom() - zoom_delta) {
            let proportion = self.mouse.x / engine.width();
            let time_delta = real_view - engine.width() / engine.zoom();
            engine.try_to_change_position(time_delta * proportion);
        }

        self.check_region_hover(engine);

        if start_position != engine.position_x() || start_zoom != engine.zoom() {
            engine.render();
        }
    }

    fn handle_down(&mut self, position: Point) {
        self.set_mouse(position);
        self.move_active = true;
        self.mouse_down = Some(position);
        self.hovered_instance = self.instance_at(position.y);
        self.mouse_down_instance = self.hovered_instance;

        self.emit(InteractionEvent::Down {
            region: self.hovered_region.clone(),
            mouse: self.mouse,
        });
    }

    fn handle_up<C: Canvas, S: FrameScheduler>(
        &mut self,
        position: Point,
        engine: &mut RenderEngine<C, S>,
    ) {
        self.set_mouse(position);
        self.move_active = false;
        let is_click = self.mouse_down.take() == Some(position);
        let pressed = self.mouse_down_instance.take();

        if is_click {
            let selected = self.find_hovered_region();
            engine.emit(ChartEvent::Select {
                panel: selected.as_ref().and_then(|region| region.owner),
                region: selected.clone(),
            });
            self.emit(InteractionEvent::Select {
                region: selected,
                mouse: self.mouse,
            });
        }

        self.emit_up(is_click, pressed);

        if is_click {
            engine.emit(ChartEvent::Click {
                panel: self.hovered_region.as_ref().and_then(|region| region.owner),
                region: self.hovered_region.clone(),
            });
            self.emit(InteractionEvent::Click {
                region: self.hovered_region.clone(),
                mouse: self.mouse,
            });
        }
    }

    fn handle_move<C: Canvas, S: FrameScheduler>(
        &mut self,
        position: Point,
        engine: &mut RenderEngine<C, S>,
    ) {
        if self.move_active {
            let delta_y = self.mouse.y - position.y;
            let delta_x = (self.mouse.x - position.x) / engine.zoom();

            if delta_x != 0.0 || delta_y != 0.0 {
                if let Some(instance) = self.mouse_down_instance {
                    engine.emit(ChartEvent::ChangePosition { delta_x, delta_y });
                    self.outbox.push(Envelope {
                        target: EventTarget::Panel(instance),
                        event: InteractionEvent::ChangePosition {
                            delta_x,
                            delta_y,
                            start: self.mouse_down.unwrap_or(self.mouse),
                            end: position,
                        },
                    });
                }
            }
        }

        self.set_mouse(position);
        self.check_region_hover(engine);
        self.emit(InteractionEvent::Move {
            region: self.hovered_region.clone(),
            mouse: self.mouse,
        });
    }

    /// Leaving the canvas ends a press like a release that is never a click.
    fn handle_leave<C: Canvas, S: FrameScheduler>(&mut self, engine: &mut RenderEngine<C, S>) {
        self.move_active = false;
        let pressed = self.mouse_down_instance.take();
        if self.mouse_down.take().is_some() {
            self.emit_up(false, pressed);
        }
        self.hovered_instance = None;

        if self.hovered_region.take().is_some() {
            self.emit_hover(None, engine);
        }
    }

    fn check_region_hover<C: Canvas, S: FrameScheduler>(&mut self, engine: &mut RenderEngine<C, S>) {
        match self.find_hovered_region() {
            Some(region) => {
                self.hovered_region = Some(region.clone());
                self.emit_hover(Some(region), engine);
            }
            None if self.hovered_region.is_some() => {
                self.hovered_region = None;
                self.emit_hover(None, engine);
            }
            None => {}
        }
    }

    fn emit_hover<C: Canvas, S: FrameScheduler>(
        &mut self,
        region: Option<HitRegion>,
        engine: &mut RenderEngine<C, S>,
    ) {
        engine.emit(ChartEvent::Hover {
            panel: region.as_ref().and_then(|region| region.owner),
            region: region.clone(),
            mouse: (self.mouse.x, self.mouse.y),
        });
        self.emit(InteractionEvent::Hover {
            region,
            mouse: self.mouse,
        });
        engine.partial_render(None);
    }

    /// Chart-wide regions first, then the regions of the panel under the pointer.
    fn find_hovered_region(&mut self) -> Option<HitRegion> {
        let mouse = self.mouse;
        if let Some(region) = self.hit_regions.iter().find(|region| region.contains(mouse, 0.0)) {
            return Some(region.clone());
        }

        let instance = self
            .instances
            .iter()
            .find(|instance| instance.contains_y(mouse.y));
        self.hovered_instance = instance.map(|instance| instance.id);

        instance.and_then(|instance| {
            instance
                .hit_regions
                .iter()
                .find(|region| region.contains(mouse, instance.position))
                .cloned()
        })
    }

    fn instance_at(&self, y: f64) -> Option<PanelId> {
        self.instances
            .iter()
            .find(|instance| instance.contains_y(y))
            .map(|instance| instance.id)
    }

    /// Emits `Up` and makes sure the panel the press started in sees it,
    /// wherever the pointer was released.
    fn emit_up(&mut self, is_click: bool, pressed: Option<PanelId>) {
        let up = Envelope::routed(InteractionEvent::Up {
            region: self.hovered_region.clone(),
            mouse: self.mouse,
            is_click,
        });
        let missed = pressed.filter(|&id| {
            self.instance(id)
                .is_some_and(|instance| !instance.accepts(&up))
        });

        if let Some(id) = missed {
            self.outbox.push(Envelope {
                target: EventTarget::Panel(id),
                event: up.event.clone(),
            });
        }
        self.outbox.push(up);
    }

    fn emit(&mut self, event: InteractionEvent) {
        self.outbox.push(Envelope::routed(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_panels(panels: &[(u32, f64, f64)]) -> InteractionsEngine {
        let mut engine = InteractionsEngine::new();
        for &(id, _, _) in panels {
            engine.make_instance(PanelId(id));
        }
        let geometries: Vec<_> = panels
            .iter()
            .map(|&(id, position, height)| (PanelId(id), position, height))
            .collect();
        engine.sync_geometry(&geometries);
        engine
    }

    #[test]
    fn containment_is_inclusive() {
        let region = HitRegion::new("node", 1, 10.0, 10.0, 5.0, 5.0);

        assert!(region.contains(Point::new(10.0, 10.0), 0.0));
        assert!(region.contains(Point::new(15.0, 15.0), 0.0));
        assert!(!region.contains(Point::new(15.1, 15.0), 0.0));
        assert!(region.contains(Point::new(12.0, 42.0), 30.0));
        assert!(!region.contains(Point::new(12.0, 12.0), 30.0));
    }

    #[test]
    fn panel_regions_are_offset_by_panel_position() {
        let mut engine = engine_with_panels(&[(0, 0.0, 50.0), (1, 50.0, 100.0)]);
        engine
            .instance_mut(PanelId(1))
            .unwrap()
            .add_hit_region(HitRegion::new("node", 7, 0.0, 0.0, 20.0, 10.0));

        engine.set_mouse(Point::new(5.0, 55.0));
        let region = engine.find_hovered_region().expect("region under the pointer");
        assert_eq!(region.data, 7);
        assert_eq!(region.owner, Some(PanelId(1)));
        assert_eq!(engine.hovered_instance(), Some(PanelId(1)));

        engine.set_mouse(Point::new(5.0, 5.0));
        assert_eq!(engine.find_hovered_region(), None);
        assert_eq!(engine.hovered_instance(), Some(PanelId(0)));
    }

    #[test]
    fn global_regions_win() {
        let mut engine = engine_with_panels(&[(0, 0.0, 100.0)]);
        engine
            .instance_mut(PanelId(0))
            .unwrap()
            .add_hit_region(HitRegion::new("node", 1, 0.0, 0.0, 100.0, 100.0));
        engine.add_hit_region(HitRegion::new("selector", 2, 0.0, 0.0, 100.0, 20.0).with_cursor("ew-resize"));

        engine.set_mouse(Point::new(10.0, 10.0));
        assert_eq!(engine.find_hovered_region().map(|region| region.data), Some(2));

        engine.set_mouse(Point::new(10.0, 30.0));
        assert_eq!(engine.find_hovered_region().map(|region| region.data), Some(1));
    }

    #[test]
    fn instances_filter_by_owner_and_position() {
        let mut engine = engine_with_panels(&[(0, 0.0, 50.0), (1, 50.0, 50.0)]);
        engine.set_mouse(Point::new(10.0, 20.0));

        let own_region = HitRegion {
            owner: Some(PanelId(0)),
            ..HitRegion::new("node", 1, 0.0, 0.0, 10.0, 10.0)
        };
        let click = Envelope::routed(InteractionEvent::Click {
            region: Some(own_region.clone()),
            mouse: engine.mouse(),
        });
        assert_eq!(click.target, EventTarget::Panel(PanelId(0)));
        assert!(engine.instance(PanelId(0)).unwrap().accepts(&click));
        assert!(!engine.instance(PanelId(1)).unwrap().accepts(&click));

        let empty_click = Envelope::routed(InteractionEvent::Click {
            region: None,
            mouse: engine.mouse(),
        });
        assert!(engine.instance(PanelId(0)).unwrap().accepts(&empty_click));
        assert!(!engine.instance(PanelId(1)).unwrap().accepts(&empty_click));

        let hover = Envelope::routed(InteractionEvent::Hover {
            region: None,
            mouse: engine.mouse(),
        });
        assert!(engine.instance(PanelId(1)).unwrap().accepts(&hover));
    }

    #[test]
    fn drag_steps_only_reach_their_panel() {
        let engine = engine_with_panels(&[(0, 0.0, 50.0), (1, 50.0, 50.0)]);
        let drag = Envelope {
            target: EventTarget::Panel(PanelId(1)),
            event: InteractionEvent::ChangePosition {
                delta_x: 1.0,
                delta_y: 0.0,
                start: Point::ZERO,
                end: Point::ZERO,
            },
        };

        assert!(engine.instance(PanelId(1)).unwrap().accepts(&drag));
        assert!(!engine.instance(PanelId(0)).unwrap().accepts(&drag));
    }

    #[test]
    fn release_reaches_the_pressed_panel_anywhere() {
        let mut engine = engine_with_panels(&[(0, 0.0, 50.0), (1, 50.0, 50.0)]);
        engine.handle_down(Point::new(10.0, 80.0));
        engine.set_mouse(Point::new(10.0, 20.0));
        engine.drain_outbox();

        engine.emit_up(false, Some(PanelId(1)));
        let outbox = engine.drain_outbox();
        let reached: Vec<PanelId> = [PanelId(0), PanelId(1)]
            .into_iter()
            .filter(|&id| {
                let instance = engine.instance(id).unwrap();
                outbox.iter().any(|envelope| instance.accepts(envelope))
            })
            .collect();
        assert_eq!(reached, vec![PanelId(0), PanelId(1)]);
        assert_eq!(outbox.len(), 2);

        engine.emit_up(false, Some(PanelId(0)));
        assert_eq!(engine.drain_outbox().len(), 1);
    }

    #[test]
    fn local_mouse_is_relative_to_the_panel() {
        let mut engine = engine_with_panels(&[(3, 40.0, 60.0)]);
        engine.set_mouse(Point::new(12.0, 70.0));

        let instance = engine.instance(PanelId(3)).unwrap();
        assert_eq!(instance.mouse(), Point::new(12.0, 30.0));
        assert_eq!(instance.global_mouse(), Point::new(12.0, 70.0));
    }

    #[test]
    fn cursor_prefers_explicit_requests() {
        let mut engine = engine_with_panels(&[(0, 0.0, 100.0)]);
        assert_eq!(engine.cursor(), "default");

        engine.hovered_region = Some(HitRegion::new("node", 0, 0.0, 0.0, 1.0, 1.0).with_cursor("pointer"));
        assert_eq!(engine.cursor(), "pointer");

        engine.instance_mut(PanelId(0)).unwrap().set_cursor("grabbing");
        assert_eq!(engine.cursor(), "grabbing");
    }
}
