//! Two-series trend widget.
//!
//! Draws a [`Trend`] with braille line segments so the CPU and memory
//! polylines keep their shape in a few terminal cells. Coordinates come
//! straight from the trend box; only the y axis is flipped because the
//! canvas grows upwards.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line},
        Widget,
    },
};

use crate::ui::trend::{Trend, BAND, BASELINE_Y, TREND_WIDTH};

pub struct TrendSparkline<'a> {
    trend: &'a Trend,
    cpu_style: Style,
    mem_style: Style,
    baseline_style: Style,
}

impl<'a> TrendSparkline<'a> {
    pub fn new(trend: &'a Trend) -> Self {
        Self {
            trend,
            cpu_style: Style::default().fg(Color::Blue),
            mem_style: Style::default().fg(Color::Green),
            baseline_style: Style::default().fg(Color::DarkGray),
        }
    }

    pub fn cpu_style(mut self, style: Style) -> Self {
        self.cpu_style = style;
        self
    }

    pub fn mem_style(mut self, style: Style) -> Self {
        self.mem_style = style;
        self
    }

    pub fn baseline_style(mut self, style: Style) -> Self {
        self.baseline_style = style;
        self
    }
}

/// Canvas height above the baseline.
fn lift(y: f64) -> f64 {
    BASELINE_Y - y
}

fn segments(points: &[(f64, f64)], color: Color) -> Vec<Line> {
    points
        .windows(2)
        .map(|pair| Line {
            x1: pair[0].0,
            y1: lift(pair[0].1),
            x2: pair[1].0,
            y2: lift(pair[1].1),
            color,
        })
        .collect()
}

impl<'a> Widget for TrendSparkline<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 || area.width < 2 {
            return;
        }

        let baseline = Line {
            x1: 0.0,
            y1: 0.0,
            x2: TREND_WIDTH,
            y2: 0.0,
            color: self.baseline_style.fg.unwrap_or(Color::DarkGray),
        };
        let cpu = segments(&self.trend.cpu, self.cpu_style.fg.unwrap_or(Color::Blue));
        let mem = segments(&self.trend.mem, self.mem_style.fg.unwrap_or(Color::Green));

        Canvas::default()
            .marker(Marker::Braille)
            .x_bounds([0.0, TREND_WIDTH])
            .y_bounds([0.0, BAND])
            .paint(|ctx| {
                ctx.draw(&baseline);
                for line in cpu.iter().chain(mem.iter()) {
                    ctx.draw(line);
                }
            })
            .render(area, buf);
    }
}
