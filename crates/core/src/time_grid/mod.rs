//! Vertical time grid shared by every panel.

use crate::{canvas::Canvas, config::TimeGridStyles, surface::RenderSurface};

/// Zooming in stops once labels would need more fractional digits than this.
pub const MAX_ACCURACY: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    styles: TimeGridStyles,
    min: f64,
    start: i64,
    end: i64,
    delta: f64,
    accuracy: usize,
}

impl TimeGrid {
    pub fn new(styles: TimeGridStyles) -> Self {
        Self {
            styles,
            min: 0.0,
            start: 0,
            end: -1,
            delta: 0.0,
            accuracy: 0,
        }
    }

    pub fn set_styles(&mut self, styles: TimeGridStyles) {
        self.styles = styles;
    }

    pub fn styles(&self) -> &TimeGridStyles {
        &self.styles
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn accuracy(&self) -> usize {
        self.accuracy
    }

    /// Recomputes line spacing from the view of `surface`.
    ///
    /// Spacing starts at roughly one line per `pixels_per_line` for the whole
    /// domain and halves every time the visible share of the domain halves.
    pub fn recalc<C: Canvas>(&mut self, surface: &RenderSurface<C>) {
        let time_width = surface.max() - surface.min();
        let lines_count = surface.width() / self.styles.pixels_per_line;
        let initial_delta = time_width / lines_count;
        let real_view = surface.real_view();
        let proportion = real_view / if time_width > 0.0 { time_width } else { 1.0 };

        self.min = surface.min();
        self.delta = initial_delta / 2f64.powf((1.0 / proportion).log2().floor());

        if !self.delta.is_finite() || self.delta <= 0.0 {
            self.start = 0;
            self.end = -1;
            self.accuracy = 0;
            return;
        }

        self.start = ((surface.position_x() - surface.min()) / self.delta).floor() as i64;
        self.end = (real_view / self.delta).ceil() as i64 + self.start;
        self.accuracy = calc_number_fix(self.delta);
    }

    /// Calls `f(pixel, time)` for every visible grid line.
    pub fn for_each_time<C: Canvas>(
        &self,
        surface: &RenderSurface<C>,
        mut f: impl FnMut(f64, f64),
    ) {
        for index in self.start..=self.end {
            let time = index as f64 * self.delta + self.min;
            let pixel = surface.time_to_position(round_to(time, self.accuracy));
            f(pixel, time);
        }
    }

    fn times<C: Canvas>(&self, surface: &RenderSurface<C>) -> Vec<(f64, f64)> {
        let mut times = Vec::new();
        self.for_each_time(surface, |pixel, time| times.push((pixel, time)));
        times
    }

    /// Draws one-pixel lines from `top` down `height` pixels.
    pub fn render_lines<C: Canvas>(&self, surface: &mut RenderSurface<C>, top: f64, height: f64) {
        surface.set_fill_color(&self.styles.color);
        for (pixel, _) in self.times(surface) {
            surface.fill_rect(pixel, top, 1.0, height);
        }
    }

    /// Draws a time label next to every line.
    pub fn render_times<C: Canvas>(&self, surface: &mut RenderSurface<C>) {
        surface.set_fill_color(&self.styles.font_color);
        surface.set_font(&self.styles.font);

        let padding = surface.styles().block_padding_left_right;
        let units = surface.time_units().to_string();
        for (pixel, time) in self.times(surface) {
            let label = format!("{:.*}{}", self.accuracy, time, units);
            surface.fill_text(&label, pixel + padding, self.styles.font_size);
        }
    }
}

/// Fractional digits needed to print half of `delta`.
fn calc_number_fix(delta: f64) -> usize {
    let half = (delta / 2.0).to_string();
    match half.find("0.") {
        Some(index) => {
            let zeros = half[index + 2..].chars().take_while(|&c| c == '0').count();
            zeros + 1
        }
        None => 0,
    }
}

fn round_to(value: f64, digits: usize) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        canvas::{DrawCommand, RecordingCanvas},
        config::{RenderOptions, RenderStyles},
    };

    fn surface(width: f64, min: f64, max: f64) -> RenderSurface<RecordingCanvas> {
        let mut surface = RenderSurface::new(
            RecordingCanvas::new(width, 50.0),
            width,
            50.0,
            RenderStyles::default(),
            RenderOptions::default(),
        );
        surface.set_min_max(min, max);
        surface.reset_view();
        surface
    }

    #[test]
    fn counts_fractional_digits() {
        assert_eq!(calc_number_fix(500.0), 0);
        assert_eq!(calc_number_fix(1.0), 1);
        assert_eq!(calc_number_fix(0.2), 1);
        assert_eq!(calc_number_fix(0.01), 3);
    }

    #[test]
    fn spaces_lines_by_pixels_per_line() {
        let surface = surface(1200.0, 0.0, 1200.0);
        let mut grid = TimeGrid::new(TimeGridStyles::default());
        grid.recalc(&surface);

        assert_eq!(grid.delta(), 120.0);
        assert_eq!(grid.accuracy(), 0);

        let mut pixels = Vec::new();
        grid.for_each_time(&surface, |pixel, _| pixels.push(pixel));
        assert_eq!(pixels.len(), 11);
        assert_eq!(pixels[1], 120.0);
    }

    #[test]
    fn halves_delta_when_zooming_in() {
        let mut surface = surface(1200.0, 0.0, 1200.0);
        let mut grid = TimeGrid::new(TimeGridStyles::default());

        surface.set_zoom(2.0);
        grid.recalc(&surface);
        assert_eq!(grid.delta(), 60.0);

        surface.set_zoom(3.0);
        grid.recalc(&surface);
        assert_eq!(grid.delta(), 60.0);

        surface.set_zoom(4.0);
        grid.recalc(&surface);
        assert_eq!(grid.delta(), 30.0);
    }

    #[test]
    fn empty_domain_has_no_lines() {
        let surface = surface(1200.0, 0.0, 0.0);
        let mut grid = TimeGrid::new(TimeGridStyles::default());
        grid.recalc(&surface);

        let mut count = 0;
        grid.for_each_time(&surface, |_, _| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn labels_carry_units() {
        let mut surface = surface(240.0, 0.0, 1.0);
        let mut grid = TimeGrid::new(TimeGridStyles::default());
        grid.recalc(&surface);
        surface.canvas_mut().take_commands();

        grid.render_times(&mut surface);
        let texts = surface.canvas().texts();
        assert_eq!(texts.first().map(String::as_str), Some("0.0ms"));
        assert_eq!(texts.get(1).map(String::as_str), Some("0.5ms"));
        assert_eq!(texts.len(), 3);

        grid.render_lines(&mut surface, 0.0, 50.0);
        let lines = surface
            .canvas()
            .commands()
            .iter()
            .filter(|command| matches!(command, DrawCommand::FillRect { w, .. } if *w == 1.0))
            .count();
        assert_eq!(lines, texts.len());
    }
}
