//! CPU/memory trend rendering.
//!
//! A [`Trend`] is laid out in a fixed 120x22 box: the baseline sits at
//! y=18 and values occupy the 16 units above it. The same layout feeds the
//! terminal sparkline and the SVG used by snapshot exports.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::state::History;

pub const TREND_WIDTH: f64 = 120.0;
pub const TREND_HEIGHT: f64 = 22.0;
pub const BASELINE_Y: f64 = 18.0;
pub const BAND: f64 = 16.0;

const CPU_STROKE: &str = "#2b67dc";
const MEM_STROKE: &str = "#19a68a";
const BASELINE_STROKE: &str = "#cbd8f2";

/// Two polylines in trend-box coordinates, or the flat placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub cpu: Vec<(f64, f64)>,
    pub mem: Vec<(f64, f64)>,
}

impl Trend {
    /// Fewer than two points in both series.
    pub fn is_placeholder(&self) -> bool {
        self.cpu.is_empty() && self.mem.is_empty()
    }

    /// Inline SVG with the same geometry.
    pub fn to_svg(&self) -> String {
        let mut svg = format!("<svg class='spark' viewBox='0 0 {TREND_WIDTH} {TREND_HEIGHT}'>");
        if self.is_placeholder() {
            let _ = write!(
                svg,
                "<line x1='0' y1='{BASELINE_Y}' x2='{TREND_WIDTH}' y2='{BASELINE_Y}' stroke='{BASELINE_STROKE}'/>"
            );
        } else {
            for (points, stroke) in [(&self.cpu, CPU_STROKE), (&self.mem, MEM_STROKE)] {
                let _ = write!(
                    svg,
                    "<polyline fill='none' stroke='{stroke}' stroke-width='1.4' points='{}'/>",
                    format_points(points)
                );
            }
            let _ = write!(
                svg,
                "<line x1='0' y1='{BASELINE_Y}' x2='{TREND_WIDTH}' y2='{BASELINE_Y}' stroke='{BASELINE_STROKE}' stroke-width='0.8'/>"
            );
        }
        svg.push_str("</svg>");
        svg
    }
}

fn format_points(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .join(" ")
}

/// Stateless renderer from [`History`] to [`Trend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendRenderer;

impl TrendRenderer {
    pub fn render(history: &History) -> Trend {
        if history.cpu.len() < 2 && history.mem.len() < 2 {
            return Trend {
                cpu: Vec::new(),
                mem: Vec::new(),
            };
        }

        let n = history.len();
        let step = TREND_WIDTH / (n.saturating_sub(1).max(1)) as f64;
        let scale = history.scale();
        let project = |values: &std::collections::VecDeque<f64>| {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let height = (v / scale * BAND).clamp(0.0, BAND);
                    (i as f64 * step, BASELINE_Y - height)
                })
                .collect()
        };

        Trend {
            cpu: project(&history.cpu),
            mem: project(&history.mem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;

    fn history(cpu: &[f64], mem: &[f64]) -> History {
        History {
            cpu: VecDeque::from(cpu.to_vec()),
            mem: VecDeque::from(mem.to_vec()),
        }
    }

    #[test]
    fn short_history_renders_placeholder() {
        let trend = TrendRenderer::render(&history(&[5.0], &[]));
        assert!(trend.is_placeholder());
        assert_eq!(
            trend.to_svg(),
            "<svg class='spark' viewBox='0 0 120 22'><line x1='0' y1='18' x2='120' y2='18' stroke='#cbd8f2'/></svg>"
        );
    }

    #[test]
    fn points_are_scaled_and_inverted() {
        let trend = TrendRenderer::render(&history(&[0.0, 50.0, 100.0], &[25.0, 200.0]));
        assert_eq!(trend.cpu, vec![(0.0, 18.0), (60.0, 14.0), (120.0, 10.0)]);
        assert_eq!(trend.mem, vec![(0.0, 16.0), (60.0, 2.0)]);
    }

    #[test]
    fn small_values_use_unit_denominator() {
        let trend = TrendRenderer::render(&history(&[0.5, 0.25], &[0.0, 0.0]));
        assert_eq!(trend.cpu, vec![(0.0, 10.0), (120.0, 14.0)]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let h = history(&[1.0, 7.5, 3.25, 9.0], &[100.0, 120.0, 90.0, 140.0]);
        let a = TrendRenderer::render(&h);
        let b = TrendRenderer::render(&h);
        assert_eq!(a, b);
        assert_eq!(a.to_svg(), b.to_svg());
        assert!(a.to_svg().contains("points='0.0,"));
    }
}
