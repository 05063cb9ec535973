//! Horizontal progress bar.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};
use unicode_width::UnicodeWidthStr;

/// Filled/empty bar with an optional centered percentage.
pub struct ProgressBar {
    /// Fraction in `0.0..=1.0`.
    ratio: f64,
    style: Style,
    empty_style: Style,
    show_percentage: bool,
    /// Colour by completion instead of `style`.
    dynamic_style: bool,
}

impl ProgressBar {
    pub fn new(ratio: f64) -> Self {
        let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 0.0 };
        Self {
            ratio,
            style: Style::default().fg(Color::Cyan),
            empty_style: Style::default().fg(Color::DarkGray),
            show_percentage: false,
            dynamic_style: false,
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn show_percentage(mut self, show: bool) -> Self {
        self.show_percentage = show;
        self
    }

    pub fn dynamic_style(mut self, enabled: bool) -> Self {
        self.dynamic_style = enabled;
        self
    }

    fn fill_style(&self) -> Style {
        if !self.dynamic_style {
            return self.style;
        }
        match (self.ratio * 100.0) as u8 {
            0..=24 => Style::default().fg(Color::Red),
            25..=74 => Style::default().fg(Color::Yellow),
            _ => Style::default().fg(Color::Green),
        }
    }
}

impl Widget for ProgressBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 1 || area.width < 1 {
            return;
        }

        let filled = ((area.width as f64) * self.ratio).round() as u16;
        let style = self.fill_style();
        for x in area.left()..area.right() {
            let (symbol, cell_style) = if x < area.left() + filled {
                ("█", style)
            } else {
                ("░", self.empty_style)
            };
            buf.get_mut(x, area.top()).set_symbol(symbol).set_style(cell_style);
        }

        if !self.show_percentage {
            return;
        }
        let text = format!("{:.1}%", self.ratio * 100.0);
        let width = text.width() as u16;
        if width >= area.width {
            return;
        }
        let start = area.left() + (area.width - width) / 2;
        let text_style = Style::default()
            .fg(Color::White)
            .bg(Color::Black);
        buf.set_string(start, area.top(), &text, text_style);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(buf: &Buffer, width: u16) -> String {
        (0..width).map(|x| buf.get(x, 0).symbol().to_string()).collect()
    }

    #[test]
    fn fills_proportionally() {
        let area = Rect::new(0, 0, 10, 1);
        let mut buf = Buffer::empty(area);
        ProgressBar::new(0.3).render(area, &mut buf);
        assert_eq!(line(&buf, 10), "███░░░░░░░");
    }

    #[test]
    fn out_of_range_ratio_is_clamped() {
        let area = Rect::new(0, 0, 4, 1);
        let mut buf = Buffer::empty(area);
        ProgressBar::new(7.0).render(area, &mut buf);
        assert_eq!(line(&buf, 4), "████");
        let mut buf = Buffer::empty(area);
        ProgressBar::new(f64::NAN).render(area, &mut buf);
        assert_eq!(line(&buf, 4), "░░░░");
    }

    #[test]
    fn percentage_is_centered() {
        let area = Rect::new(0, 0, 12, 1);
        let mut buf = Buffer::empty(area);
        ProgressBar::new(0.5).show_percentage(true).render(area, &mut buf);
        assert!(line(&buf, 12).contains("50.0%"));
    }

    #[test]
    fn fixed_style_colors_the_filled_cells() {
        let area = Rect::new(0, 0, 4, 1);
        let mut buf = Buffer::empty(area);
        ProgressBar::new(0.5)
            .style(Style::default().fg(Color::Magenta))
            .render(area, &mut buf);
        assert_eq!(buf.get(0, 0).fg, Color::Magenta);
        assert_eq!(buf.get(3, 0).fg, Color::DarkGray);
    }
}
