//! The 2D drawing context the surfaces render into.
//!
//! [`Canvas`] mirrors the subset of a browser-style 2D context the engine
//! needs. [`RecordingCanvas`] implements it by logging [`DrawCommand`]s, which
//! is what tests and the command line tool render into.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// How rectangles are filled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FillStyle {
    Color(String),
    /// A named pattern registered with the host, drawn over `color`.
    Pattern { name: String, color: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TextMetrics {
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
}

pub trait Canvas: std::fmt::Debug + Sized {
    /// Device pixels per logical pixel.
    fn pixel_ratio(&self) -> f64 {
        1.0
    }

    /// Creates a detached canvas of the same kind, used as a panel backing store.
    fn create_offscreen(&self, width: f64, height: f64) -> Self;

    /// Sets the backing size in device pixels. Resets the context state.
    fn set_size(&mut self, width: f64, height: f64);

    /// Backing size in device pixels.
    fn size(&self) -> (f64, f64);

    fn set_scale(&mut self, ratio: f64);
    fn set_fill_style(&mut self, style: &FillStyle);
    fn set_stroke_style(&mut self, color: &str);
    fn set_line_width(&mut self, width: f64);
    fn set_line_dash(&mut self, segments: &[f64]);
    fn set_font(&mut self, font: &str);
    fn set_shadow(&mut self, color: &str, blur: f64);

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn fill_text(&mut self, text: &str, x: f64, y: f64);
    fn measure_text(&self, text: &str) -> TextMetrics;
    fn fill_polygon(&mut self, points: &[Point]);
    fn fill_circle(&mut self, center: Point, radius: f64);

    /// Copies `source_rect` (device pixels of `source`) onto `dest_rect`.
    fn draw_image(&mut self, source: &Self, source_rect: Rect, dest_rect: Rect);
}

/// A single call made against a [`RecordingCanvas`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawCommand {
    Resize { width: f64, height: f64 },
    Scale { ratio: f64 },
    FillStyle { style: FillStyle },
    StrokeStyle { color: String },
    LineWidth { width: f64 },
    LineDash { segments: Vec<f64> },
    Font { font: String },
    Shadow { color: String, blur: f64 },
    FillRect { x: f64, y: f64, w: f64, h: f64 },
    StrokeRect { x: f64, y: f64, w: f64, h: f64 },
    ClearRect { x: f64, y: f64, w: f64, h: f64 },
    FillText { text: String, x: f64, y: f64 },
    FillPolygon { points: Vec<(f64, f64)> },
    FillCircle { x: f64, y: f64, radius: f64 },
    DrawImage {
        source: [f64; 4],
        dest: [f64; 4],
        layer: Vec<DrawCommand>,
    },
}

/// Canvas that records what would have been drawn.
///
/// Clearing the whole surface drops the commands recorded so far, the same way
/// a real canvas forgets its pixels.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: f64,
    height: f64,
    pixel_ratio: f64,
    scale: f64,
    font_size: f64,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(width: f64, height: f64) -> Self {
        Self::with_pixel_ratio(width, height, 1.0)
    }

    pub fn with_pixel_ratio(width: f64, height: f64, pixel_ratio: f64) -> Self {
        Self {
            width: width * pixel_ratio,
            height: height * pixel_ratio,
            pixel_ratio,
            scale: 1.0,
            font_size: 10.0,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Every text drawn, including text inside blitted layers.
    pub fn texts(&self) -> Vec<String> {
        fn collect(commands: &[DrawCommand], out: &mut Vec<String>) {
            for command in commands {
                match command {
                    DrawCommand::FillText { text, .. } => out.push(text.clone()),
                    DrawCommand::DrawImage { layer, .. } => collect(layer, out),
                    _ => {}
                }
            }
        }

        let mut out = Vec::new();
        collect(&self.commands, &mut out);
        out
    }

    fn char_width(&self) -> f64 {
        self.font_size * 0.6
    }

    fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }
}

fn parse_font_size(font: &str) -> Option<f64> {
    font.split_whitespace()
        .find_map(|part| part.strip_suffix("px"))
        .and_then(|size| size.parse().ok())
}

impl Canvas for RecordingCanvas {
    fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn create_offscreen(&self, width: f64, height: f64) -> Self {
        Self::with_pixel_ratio(width, height, self.pixel_ratio)
    }

    fn set_size(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
        self.scale = 1.0;
        self.commands.clear();
        self.push(DrawCommand::Resize { width, height });
    }

    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn set_scale(&mut self, ratio: f64) {
        self.scale = ratio;
        self.push(DrawCommand::Scale { ratio });
    }

    fn set_fill_style(&mut self, style: &FillStyle) {
        self.push(DrawCommand::FillStyle {
            style: style.clone(),
        });
    }

    fn set_stroke_style(&mut self, color: &str) {
        self.push(DrawCommand::StrokeStyle {
            color: color.to_string(),
        });
    }

    fn set_line_width(&mut self, width: f64) {
        self.push(DrawCommand::LineWidth { width });
    }

    fn set_line_dash(&mut self, segments: &[f64]) {
        self.push(DrawCommand::LineDash {
            segments: segments.to_vec(),
        });
    }

    fn set_font(&mut self, font: &str) {
        if let Some(size) = parse_font_size(font) {
            self.font_size = size;
        }
        self.push(DrawCommand::Font {
            font: font.to_string(),
        });
    }

    fn set_shadow(&mut self, color: &str, blur: f64) {
        self.push(DrawCommand::Shadow {
            color: color.to_string(),
            blur,
        });
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.push(DrawCommand::FillRect { x, y, w, h });
    }

    fn stroke_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.push(DrawCommand::StrokeRect { x, y, w, h });
    }

    fn clear_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let logical_width = self.width / self.scale;
        let logical_height = self.height / self.scale;
        if x <= 0.0 && y <= 0.0 && x + w >= logical_width && y + h >= logical_height {
            self.commands.clear();
        }
        self.push(DrawCommand::ClearRect { x, y, w, h });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64) {
        self.push(DrawCommand::FillText {
            text: text.to_string(),
            x,
            y,
        });
    }

    fn measure_text(&self, text: &str) -> TextMetrics {
        TextMetrics {
            width: text.chars().count() as f64 * self.char_width(),
            ascent: self.font_size * 0.8,
            descent: self.font_size * 0.2,
        }
    }

    fn fill_polygon(&mut self, points: &[Point]) {
        self.push(DrawCommand::FillPolygon {
            points: points.iter().map(|point| (point.x, point.y)).collect(),
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f64) {
        self.push(DrawCommand::FillCircle {
            x: center.x,
            y: center.y,
            radius,
        });
    }

    fn draw_image(&mut self, source: &Self, source_rect: Rect, dest_rect: Rect) {
        self.push(DrawCommand::DrawImage {
            source: [
                source_rect.x0,
                source_rect.y0,
                source_rect.width(),
                source_rect.height(),
            ],
            dest: [
                dest_rect.x0,
                dest_rect.y0,
                dest_rect.width(),
                dest_rect.height(),
            ],
            layer: source.commands.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_text_from_font_size() {
        let mut canvas = RecordingCanvas::new(100.0, 100.0);
        assert_eq!(canvas.measure_text("abcd").width, 24.0);

        canvas.set_font("bold 20px monospace");
        assert_eq!(canvas.measure_text("abcd").width, 48.0);
        assert_eq!(canvas.measure_text("…").width, 12.0);
    }

    #[test]
    fn full_clear_forgets_previous_drawing() {
        let mut canvas = RecordingCanvas::with_pixel_ratio(50.0, 20.0, 2.0);
        canvas.set_scale(2.0);
        canvas.fill_rect(0.0, 0.0, 10.0, 10.0);
        canvas.clear_rect(0.0, 0.0, 10.0, 10.0);
        assert_eq!(canvas.commands().len(), 3);

        canvas.clear_rect(0.0, 0.0, 50.0, 20.0);
        assert_eq!(
            canvas.commands(),
            &[DrawCommand::ClearRect {
                x: 0.0,
                y: 0.0,
                w: 50.0,
                h: 20.0
            }]
        );
    }

    #[test]
    fn draw_image_captures_the_source_layer() {
        let mut layer = RecordingCanvas::new(10.0, 10.0);
        layer.fill_text("inner", 1.0, 2.0);

        let mut canvas = RecordingCanvas::new(100.0, 100.0);
        canvas.draw_image(
            &layer,
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 40.0, 10.0, 50.0),
        );

        assert_eq!(canvas.texts(), vec!["inner".to_string()]);
    }
}
