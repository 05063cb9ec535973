//! Custom widgets for the dashboard.

pub mod progress;
pub mod sparkline;

pub use progress::ProgressBar;
pub use sparkline::TrendSparkline;
