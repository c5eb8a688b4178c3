//! Render surfaces: a canvas plus the zoom/pan transform and batched draw queues.

mod panel;

use indexmap::IndexMap;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

use crate::{
    canvas::{Canvas, FillStyle},
    config::{RenderOptions, RenderStyles},
};

pub use panel::{PanelRequest, PanelSurface};

const ELLIPSIS: &str = "…";
const ALL_CHARS: &str =
    "qwertyuiopasdfghjklzxcvbnmQWERTYUIOPASDFGHJKLZXCVBNM1234567890_-+()[]{}\\/|'\";:.,?~";

/// Font-derived sizes, refreshed whenever the styles change.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FontMetrics {
    pub char_height: f64,
    pub placeholder_width: f64,
    pub avg_char_width: f64,
    pub min_text_width: f64,
    pub block_padding_top_bottom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriangleDirection {
    Top,
    Bottom,
    Left,
    Right,
}

/// One line of a tooltip box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TooltipField {
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl TooltipField {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RectKey {
    pattern: Option<String>,
    color: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueuedRect {
    x: f64,
    y: f64,
    w: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct QueuedText {
    text: String,
    x: f64,
    y: f64,
    text_max_width: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct QueuedStroke {
    color: String,
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

/// Draw-queue and coordinate operations shared by the top-level surface and
/// the stacked panels.
pub trait Surface<C: Canvas> {
    fn render_surface(&self) -> &RenderSurface<C>;
    fn render_surface_mut(&mut self) -> &mut RenderSurface<C>;

    fn width(&self) -> f64 {
        self.render_surface().width()
    }

    fn height(&self) -> f64 {
        self.render_surface().height()
    }

    fn time_to_position(&self, time: f64) -> f64 {
        self.render_surface().time_to_position(time)
    }

    fn pixel_to_time(&self, pixels: f64) -> f64 {
        self.render_surface().pixel_to_time(pixels)
    }

    fn add_rect_to_render_queue(&mut self, color: &str, x: f64, y: f64, w: f64) {
        self.render_surface_mut().add_rect_to_render_queue(color, x, y, w);
    }

    fn add_text_to_render_queue(&mut self, text: &str, x: f64, y: f64, w: f64) {
        self.render_surface_mut().add_text_to_render_queue(text, x, y, w);
    }

    fn add_stroke_to_render_queue(&mut self, color: &str, x: f64, y: f64, w: f64, h: f64) {
        self.render_surface_mut().add_stroke_to_render_queue(color, x, y, w, h);
    }

    fn resolve_queue(&mut self) {
        self.render_surface_mut().resolve_queue();
    }
}

/// A canvas with its own zoom/pan state and batched draw queues.
#[derive(Debug)]
pub struct RenderSurface<C> {
    canvas: C,
    width: f64,
    height: f64,
    pixel_ratio: f64,
    zoom: f64,
    position_x: f64,
    min: f64,
    max: f64,
    styles: RenderStyles,
    options: RenderOptions,
    metrics: FontMetrics,
    rect_queue: IndexMap<RectKey, Vec<QueuedRect>>,
    text_queue: Vec<QueuedText>,
    stroke_queue: Vec<QueuedStroke>,
    last_fill: Option<FillStyle>,
    last_stroke: Option<String>,
    last_font: Option<String>,
}

impl<C: Canvas> Surface<C> for RenderSurface<C> {
    fn render_surface(&self) -> &RenderSurface<C> {
        self
    }

    fn render_surface_mut(&mut self) -> &mut RenderSurface<C> {
        self
    }
}

impl<C: Canvas> RenderSurface<C> {
    pub fn new(
        canvas: C,
        width: f64,
        height: f64,
        styles: RenderStyles,
        options: RenderOptions,
    ) -> Self {
        let pixel_ratio = canvas.pixel_ratio();
        let mut surface = Self {
            canvas,
            width,
            height,
            pixel_ratio,
            zoom: 1.0,
            position_x: 0.0,
            min: 0.0,
            max: 0.0,
            styles,
            options,
            metrics: FontMetrics::default(),
            rect_queue: IndexMap::new(),
            text_queue: Vec::new(),
            stroke_queue: Vec::new(),
            last_fill: None,
            last_stroke: None,
            last_font: None,
        };
        surface.apply_canvas_size();
        surface.update_metrics();
        surface
    }

    /// Creates a surface backed by a fresh offscreen canvas of the same kind.
    pub fn offscreen_from(&self, width: f64, height: f64) -> Self {
        let canvas = self.canvas.create_offscreen(width, height);
        let mut surface = Self::new(canvas, width, height, self.styles.clone(), self.options.clone());
        surface.set_min_max(self.min, self.max);
        surface.reset_view();
        surface
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn position_x(&self) -> f64 {
        self.position_x
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn styles(&self) -> &RenderStyles {
        &self.styles
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    pub fn metrics(&self) -> &FontMetrics {
        &self.metrics
    }

    pub fn time_units(&self) -> &str {
        &self.options.time_units
    }

    pub fn set_settings(&mut self, styles: RenderStyles, options: RenderOptions) {
        self.styles = styles;
        self.options = options;
        self.update_metrics();
    }

    fn update_metrics(&mut self) {
        let font = self.styles.font.clone();
        self.set_font(&font);

        let all = self.canvas.measure_text(ALL_CHARS);
        let placeholder = self.canvas.measure_text(ELLIPSIS);
        let font_height = all.ascent + all.descent;
        let avg_char_width = all.width / ALL_CHARS.chars().count() as f64;

        self.metrics = FontMetrics {
            char_height: font_height + 1.0,
            placeholder_width: placeholder.width,
            avg_char_width,
            min_text_width: avg_char_width + placeholder.width,
            block_padding_top_bottom: ((self.styles.block_height - font_height) / 2.0).ceil(),
        };
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
    }

    /// Moves the left edge of the view and returns how far it moved.
    pub fn set_position_x(&mut self, x: f64) -> f64 {
        let delta = x - self.position_x;
        self.position_x = x;
        delta
    }

    /// Pans by `delta` time units, clamped to the `[min, max]` domain.
    pub fn try_to_change_position(&mut self, delta: f64) {
        let real_view = self.real_view();
        let target = self.position_x + delta;

        if target + real_view <= self.max && target >= self.min {
            self.set_position_x(target);
        } else if target <= self.min {
            self.set_position_x(self.min);
        } else if target + real_view >= self.max {
            self.set_position_x(self.max - real_view);
        }
    }

    /// Zoom at which the whole `[min, max]` domain fits the width.
    pub fn initial_zoom(&self) -> f64 {
        if self.max - self.min > 0.0 {
            self.width / (self.max - self.min)
        } else {
            1.0
        }
    }

    /// Visible time span.
    pub fn real_view(&self) -> f64 {
        self.width / self.zoom
    }

    pub fn reset_view(&mut self) {
        self.set_zoom(self.initial_zoom());
        self.set_position_x(self.min);
    }

    /// Returns `true` when the domain changed.
    pub fn set_min_max(&mut self, min: f64, max: f64) -> bool {
        let changed = min != self.min || max != self.max;
        self.min = min;
        self.max = max;
        changed
    }

    pub fn time_to_position(&self, time: f64) -> f64 {
        time * self.zoom - self.position_x * self.zoom
    }

    pub fn pixel_to_time(&self, pixels: f64) -> f64 {
        pixels / self.zoom
    }

    /// Resizes the backing canvas. Returns `true` when the height changed.
    pub fn resize(&mut self, width: Option<f64>, height: Option<f64>) -> bool {
        let width_changed = width.is_some_and(|width| width != self.width);
        let height_changed = height.is_some_and(|height| height != self.height);

        if width_changed || height_changed {
            self.width = width.unwrap_or(self.width);
            self.height = height.unwrap_or(self.height);
            self.apply_canvas_size();
        }

        height_changed
    }

    fn apply_canvas_size(&mut self) {
        self.canvas
            .set_size(self.width * self.pixel_ratio, self.height * self.pixel_ratio);
        self.canvas.set_scale(self.pixel_ratio);
        self.last_fill = None;
        self.last_stroke = None;
        self.last_font = None;
    }

    pub fn set_fill_color(&mut self, color: &str) {
        let style = FillStyle::Color(color.to_string());
        self.set_fill_style(style);
    }

    fn set_fill_style(&mut self, style: FillStyle) {
        if self.last_fill.as_ref() != Some(&style) {
            self.canvas.set_fill_style(&style);
            self.last_fill = Some(style);
        }
    }

    pub fn set_stroke_color(&mut self, color: &str) {
        if self.last_stroke.as_deref() != Some(color) {
            self.canvas.set_stroke_style(color);
            self.last_stroke = Some(color.to_string());
        }
    }

    pub fn set_font(&mut self, font: &str) {
        if self.last_font.as_deref() != Some(font) {
            self.canvas.set_font(font);
            self.last_font = Some(font.to_string());
        }
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.canvas.fill_rect(x, y, w, h);
    }

    pub fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.canvas.fill_text(text, x, y);
    }

    pub fn render_block(&mut self, color: &str, x: f64, y: f64, w: f64) {
        self.set_fill_color(color);
        self.canvas.fill_rect(x, y, w, self.styles.block_height);
    }

    pub fn render_stroke(&mut self, color: &str, x: f64, y: f64, w: f64, h: f64) {
        self.set_stroke_color(color);
        self.canvas.set_line_dash(&[]);
        self.canvas.stroke_rect(x, y, w, h);
    }

    /// Clears the whole surface to the background colour.
    pub fn clear(&mut self) {
        self.clear_area(0.0, 0.0, self.width, self.height);
    }

    pub fn clear_area(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.canvas.clear_rect(x, y, w, h);
        // keeps every cleared layer self-contained
        self.last_fill = None;
        let background = self.styles.background_color.clone();
        self.set_fill_color(&background);
        self.canvas.fill_rect(x, y, w, h);
    }

    pub fn add_rect_to_render_queue(&mut self, color: &str, x: f64, y: f64, w: f64) {
        self.enqueue_rect(None, color, x, y, w);
    }

    pub fn add_pattern_rect_to_render_queue(
        &mut self,
        pattern: &str,
        color: &str,
        x: f64,
        y: f64,
        w: f64,
    ) {
        self.enqueue_rect(Some(pattern), color, x, y, w);
    }

    fn enqueue_rect(&mut self, pattern: Option<&str>, color: &str, x: f64, y: f64, w: f64) {
        let key = RectKey {
            pattern: pattern.map(str::to_string),
            color: color.to_string(),
        };
        self.rect_queue.entry(key).or_default().push(QueuedRect { x, y, w });
    }

    /// Queues a label for a block starting at `x` and `w` pixels wide.
    pub fn add_text_to_render_queue(&mut self, text: &str, x: f64, y: f64, w: f64) {
        if text.is_empty() {
            return;
        }

        let overflow = if x < 0.0 { x } else { 0.0 };
        let text_max_width = w - (self.styles.block_padding_left_right * 2.0 - overflow);
        if text_max_width > 0.0 {
            self.text_queue.push(QueuedText {
                text: text.to_string(),
                x,
                y,
                text_max_width,
            });
        }
    }

    pub fn add_stroke_to_render_queue(&mut self, color: &str, x: f64, y: f64, w: f64, h: f64) {
        self.stroke_queue.push(QueuedStroke {
            color: color.to_string(),
            x,
            y,
            w,
            h,
        });
    }

    pub fn resolve_rect_render_queue(&mut self) {
        let queue = std::mem::take(&mut self.rect_queue);
        for (key, rects) in queue {
            let style = match key.pattern {
                Some(name) => FillStyle::Pattern {
                    name,
                    color: key.color,
                },
                None => FillStyle::Color(key.color),
            };
            self.set_fill_style(style);

            for QueuedRect { x, y, w } in rects {
                self.canvas.fill_rect(x, y, w, self.styles.block_height);
            }
        }
    }

    pub fn resolve_text_render_queue(&mut self) {
        let queue = std::mem::take(&mut self.text_queue);
        if queue.is_empty() {
            return;
        }

        let font = self.styles.font.clone();
        let font_color = self.styles.font_color.clone();
        self.set_font(&font);
        self.set_fill_color(&font_color);

        for QueuedText {
            text,
            x,
            y,
            text_max_width,
        } in queue
        {
            let text_width = self.canvas.measure_text(&text).width;
            let Some(fitted) = fit_text(
                &text,
                text_width,
                text_max_width,
                self.metrics.placeholder_width,
            ) else {
                continue;
            };

            self.canvas.fill_text(
                &fitted,
                x.max(0.0) + self.styles.block_padding_left_right,
                y + self.styles.block_height - self.metrics.block_padding_top_bottom,
            );
        }
    }

    pub fn resolve_stroke_render_queue(&mut self) {
        let queue = std::mem::take(&mut self.stroke_queue);
        for QueuedStroke { color, x, y, w, h } in queue {
            self.render_stroke(&color, x, y, w, h);
        }
    }

    /// Flushes rects, then texts, then strokes.
    pub fn resolve_queue(&mut self) {
        self.resolve_rect_render_queue();
        self.resolve_text_render_queue();
        self.resolve_stroke_render_queue();
    }

    pub fn render_shape(&mut self, color: &str, dots: &[Point], pos_x: f64, pos_y: f64) {
        self.set_fill_color(color);
        let points: Vec<Point> = dots
            .iter()
            .map(|dot| Point::new(dot.x + pos_x, dot.y + pos_y))
            .collect();
        self.canvas.fill_polygon(&points);
    }

    pub fn render_triangle(
        &mut self,
        color: &str,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        direction: TriangleDirection,
    ) {
        let half_width = width / 2.0;
        let half_height = height / 2.0;
        let dots = match direction {
            TriangleDirection::Top => [
                Point::new(-half_width, half_height),
                Point::new(half_width, half_height),
                Point::new(0.0, -half_height),
            ],
            TriangleDirection::Bottom => [
                Point::new(-half_width, -half_height),
                Point::new(half_width, -half_height),
                Point::new(0.0, half_height),
            ],
            TriangleDirection::Left => [
                Point::new(half_height, -half_width),
                Point::new(half_height, half_width),
                Point::new(-half_height, 0.0),
            ],
            TriangleDirection::Right => [
                Point::new(-half_height, -half_width),
                Point::new(-half_height, half_width),
                Point::new(half_height, 0.0),
            ],
        };

        self.render_shape(color, &dots, x, y);
    }

    pub fn render_circle(&mut self, color: &str, x: f64, y: f64, radius: f64) {
        self.set_fill_color(color);
        self.canvas.fill_circle(Point::new(x, y), radius);
    }

    /// Draws a shadowed tooltip box next to `mouse`, kept inside the surface.
    pub fn render_tooltip_from_data(&mut self, fields: &[TooltipField], mouse: Point) {
        if fields.is_empty() {
            return;
        }

        let font = self.styles.font.clone();
        self.set_font(&font);

        let padding = self.styles.block_padding_left_right;
        let line_height = self.metrics.char_height + 2.0;
        let max_width = fields
            .iter()
            .map(|field| self.canvas.measure_text(&field.text).width)
            .fold(0.0, f64::max);
        let box_width = max_width + padding * 2.0;
        let box_height = line_height * fields.len() as f64 + padding * 2.0;

        let mut bounds = Rect::from_origin_size((mouse.x + 10.0, mouse.y + 10.0), (box_width, box_height));
        if bounds.x1 > self.width {
            bounds = bounds + kurbo::Vec2::new((mouse.x - 10.0 - box_width) - bounds.x0, 0.0);
        }
        if bounds.y1 > self.height {
            bounds = bounds + kurbo::Vec2::new(0.0, (mouse.y - 10.0 - box_height) - bounds.y0);
        }
        let origin = Point::new(bounds.x0.max(0.0), bounds.y0.max(0.0));

        self.canvas
            .set_shadow(&self.styles.tooltip_shadow_color, self.styles.tooltip_shadow_blur);
        let background = self.styles.tooltip_background_color.clone();
        self.set_fill_color(&background);
        self.canvas.fill_rect(origin.x, origin.y, box_width, box_height);
        self.canvas.set_shadow("transparent", 0.0);

        for (index, field) in fields.iter().enumerate() {
            let color = match (&field.color, index) {
                (Some(color), _) => color.clone(),
                (None, 0) => self.styles.tooltip_header_font_color.clone(),
                (None, _) => self.styles.tooltip_body_font_color.clone(),
            };
            self.set_fill_color(&color);
            self.canvas.fill_text(
                &field.text,
                origin.x + padding,
                origin.y + self.styles.block_height - self.metrics.block_padding_top_bottom
                    + line_height * index as f64,
            );
        }
    }

    /// Blits `source` onto this surface with its top edge at `position`.
    pub fn copy_from(&mut self, source: &RenderSurface<C>, position: f64) {
        let (source_width, source_height) = source.canvas.size();
        if source_height <= 0.0 {
            return;
        }

        self.canvas.draw_image(
            &source.canvas,
            Rect::new(0.0, 0.0, source_width, source_height),
            Rect::from_origin_size((0.0, position), (source.width, source.height)),
        );
    }
}

/// Shortens `text` around a middle ellipsis so it fits `text_max_width`.
///
/// Returns `None` when not even one character per side would fit.
pub fn fit_text(
    text: &str,
    text_width: f64,
    text_max_width: f64,
    placeholder_width: f64,
) -> Option<String> {
    if text_width <= text_max_width {
        return Some(text.to_string());
    }

    let chars: Vec<char> = text.chars().collect();
    let avg_char_width = text_width / chars.len() as f64;
    let max_chars = ((text_max_width - placeholder_width) / avg_char_width).floor();
    let half_chars = (max_chars - 1.0) / 2.0;

    if half_chars <= 0.0 {
        return None;
    }

    let head = half_chars.ceil() as usize;
    let tail = half_chars.floor() as usize;
    let mut fitted: String = chars[..head.min(chars.len())].iter().collect();
    fitted.push_str(ELLIPSIS);
    fitted.extend(&chars[chars.len().saturating_sub(tail)..]);
    Some(fitted)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::canvas::{DrawCommand, RecordingCanvas};

    fn surface(width: f64, height: f64) -> RenderSurface<RecordingCanvas> {
        RenderSurface::new(
            RecordingCanvas::new(width, height),
            width,
            height,
            RenderStyles::default(),
            RenderOptions::default(),
        )
    }

    fn fills(surface: &RenderSurface<RecordingCanvas>) -> Vec<FillStyle> {
        surface
            .canvas()
            .commands()
            .iter()
            .filter_map(|command| match command {
                DrawCommand::FillStyle { style } => Some(style.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn maps_time_to_pixels() {
        let mut surface = surface(100.0, 50.0);
        surface.set_min_max(0.0, 1000.0);
        surface.reset_view();

        assert_eq!(surface.zoom(), 0.1);
        assert_eq!(surface.time_to_position(500.0), 50.0);

        surface.set_zoom(1.0);
        assert_eq!(surface.set_position_x(200.0), 200.0);
        assert_eq!(surface.time_to_position(250.0), 50.0);
        assert_eq!(surface.pixel_to_time(30.0), 30.0);
    }

    #[test]
    fn clamps_position_changes() {
        let mut surface = surface(100.0, 50.0);
        surface.set_min_max(0.0, 1000.0);
        surface.reset_view();
        surface.set_zoom(1.0);

        surface.try_to_change_position(300.0);
        assert_eq!(surface.position_x(), 300.0);

        surface.try_to_change_position(-1000.0);
        assert_eq!(surface.position_x(), 0.0);

        surface.try_to_change_position(5000.0);
        assert_eq!(surface.position_x(), 900.0);
    }

    #[test]
    fn initial_zoom_falls_back_for_empty_domain() {
        let surface = surface(100.0, 50.0);
        assert_eq!(surface.initial_zoom(), 1.0);
    }

    #[test]
    fn batches_rects_by_colour() {
        let mut surface = surface(100.0, 50.0);
        surface.canvas_mut().take_commands();

        surface.add_rect_to_render_queue("red", 0.0, 0.0, 10.0);
        surface.add_rect_to_render_queue("blue", 10.0, 0.0, 10.0);
        surface.add_rect_to_render_queue("red", 20.0, 0.0, 10.0);
        surface.add_pattern_rect_to_render_queue("stripes", "red", 30.0, 0.0, 10.0);
        surface.resolve_queue();

        assert_eq!(
            fills(&surface),
            vec![
                FillStyle::Color("red".into()),
                FillStyle::Color("blue".into()),
                FillStyle::Pattern {
                    name: "stripes".into(),
                    color: "red".into()
                },
            ]
        );
        let rects = surface
            .canvas()
            .commands()
            .iter()
            .filter(|command| matches!(command, DrawCommand::FillRect { .. }))
            .count();
        assert_eq!(rects, 4);
    }

    #[test]
    fn skips_redundant_colour_changes() {
        let mut surface = surface(100.0, 50.0);
        surface.canvas_mut().take_commands();

        surface.render_block("red", 0.0, 0.0, 5.0);
        surface.render_block("red", 5.0, 0.0, 5.0);
        surface.render_block("green", 10.0, 0.0, 5.0);

        assert_eq!(fills(&surface).len(), 2);
    }

    #[test]
    fn truncates_long_labels() {
        let mut surface = surface(200.0, 50.0);
        surface.canvas_mut().take_commands();

        surface.add_text_to_render_queue("abcdefghijklmnopqrstuvwxyz", 0.0, 0.0, 60.0);
        surface.add_text_to_render_queue("short", 0.0, 20.0, 100.0);
        surface.add_text_to_render_queue("hidden", 0.0, 40.0, 8.0);
        surface.resolve_text_render_queue();

        assert_eq!(
            surface.canvas().texts(),
            vec!["abc…xyz".to_string(), "short".to_string()]
        );
    }

    #[test]
    fn fit_text_drops_text_that_cannot_fit() {
        assert_eq!(fit_text("abcdef", 36.0, 40.0, 6.0).as_deref(), Some("abcdef"));
        assert_eq!(fit_text("abcdef", 36.0, 30.0, 6.0).as_deref(), Some("ab…f"));
        assert_eq!(fit_text("abcdef", 36.0, 12.0, 6.0), None);
    }

    #[test]
    fn resize_reports_height_changes_only() {
        let mut surface = surface(100.0, 50.0);

        assert!(!surface.resize(Some(120.0), None));
        assert_eq!(surface.width(), 120.0);
        assert!(surface.resize(None, Some(80.0)));
        assert!(!surface.resize(Some(120.0), Some(80.0)));
        assert_eq!(surface.canvas().size(), (120.0, 80.0));
    }

    #[test]
    fn tooltip_stays_inside_the_surface() {
        let mut surface = surface(100.0, 100.0);
        surface.canvas_mut().take_commands();

        surface.render_tooltip_from_data(
            &[TooltipField::new("header"), TooltipField::new("body")],
            Point::new(95.0, 95.0),
        );

        let rect = surface
            .canvas()
            .commands()
            .iter()
            .find_map(|command| match command {
                DrawCommand::FillRect { x, y, w, h } => Some((*x, *y, *w, *h)),
                _ => None,
            })
            .expect("tooltip background");
        assert!(rect.0 + rect.2 <= 100.0);
        assert!(rect.1 + rect.3 <= 100.0);
        assert_eq!(surface.canvas().texts(), vec!["header".to_string(), "body".to_string()]);
    }

    proptest! {
        #[test]
        fn pan_zoom_sequences_stay_clamped(
            steps in prop::collection::vec((-500.0..500.0f64, 1.0..20.0f64), 1..40),
        ) {
            let mut surface = surface(100.0, 50.0);
            surface.set_min_max(0.0, 1000.0);
            surface.reset_view();

            for (delta, zoom_factor) in steps {
                let zoom = (surface.initial_zoom() * zoom_factor).max(surface.initial_zoom());
                surface.set_zoom(zoom);
                surface.try_to_change_position(delta);

                prop_assert!(surface.zoom() >= surface.initial_zoom());
                prop_assert!(surface.position_x() >= surface.min() - 1e-9);
                prop_assert!(surface.position_x() <= surface.max() - surface.real_view() + 1e-9);
            }
        }
    }
}
