//! orch-dash - live dashboard for a multi-worker orchestration backend
//!
//! Polls the orchestrator's JSON API and shows tool availability, the PM
//! role, the run list and per-worker status in a terminal UI.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use color_eyre::Result;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use orch_dash::app::{export_once, App, AppConfig};
use orch_dash::event::EventHandler;

#[derive(Debug, Parser)]
#[command(name = "orch-dash", version, about)]
struct Args {
    /// Base URL of the dashboard API.
    #[arg(long, env = "ORCH_DASH_URL", default_value = "http://127.0.0.1:8787")]
    url: String,

    /// Poll interval in seconds (1-30).
    #[arg(long, default_value_t = 3)]
    interval: u64,

    /// Start with auto refresh off.
    #[arg(long)]
    no_auto: bool,

    /// Initial orchestrator id filter.
    #[arg(long, default_value = "")]
    orch: String,

    #[arg(long, default_value = orch_dash::state::config::DEFAULT_MODEL)]
    model: String,

    #[arg(long, default_value = orch_dash::state::config::DEFAULT_REASONING_EFFORT)]
    reasoning_effort: String,

    /// Workspace shown in the header and written with new configurations.
    #[arg(long, default_value = "")]
    workspace: String,

    /// Log file; the terminal belongs to the UI.
    #[arg(long, default_value = "orch-dash.log")]
    log_file: PathBuf,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run one poll cycle, write an HTML snapshot here and exit.
    #[arg(long, value_name = "PATH")]
    export_html: Option<PathBuf>,

    /// UI tick in milliseconds.
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

impl Args {
    fn app_config(&self) -> AppConfig {
        AppConfig {
            base_url: self.url.clone(),
            poll_seconds: self.interval,
            auto_refresh: !self.no_auto,
            orch: self.orch.clone(),
            model: self.model.clone(),
            reasoning_effort: self.reasoning_effort.clone(),
            workspace: self.workspace.clone(),
            tick_rate: Duration::from_millis(self.tick_ms.max(10)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(&args)?;

    let config = args.app_config();

    if let Some(path) = &args.export_html {
        let rows = export_once(&config, path).await?;
        println!("wrote {rows} rows to {}", path.display());
        return Ok(());
    }

    let (report_tx, report_rx) = mpsc::unbounded_channel();
    let mut app = App::new(&config, report_tx)?;

    setup_terminal()?;
    let mut event_handler = EventHandler::new(config.tick_rate, report_rx);
    let result = app.run_with_crossterm(&mut event_handler).await;
    restore_terminal()?;

    result
}

fn init_logging(args: &Args) -> Result<()> {
    let file = File::create(&args.log_file)
        .wrap_err_with(|| format!("cannot create log file {}", args.log_file.display()))?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .wrap_err("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn setup_terminal() -> Result<()> {
    crossterm::terminal::enable_raw_mode()?;
    crossterm::execute!(
        io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;

    // Leave the terminal usable if the UI panics.
    let hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_terminal();
        hook(info);
    }));
    Ok(())
}

fn restore_terminal() -> Result<()> {
    crossterm::execute!(
        io::stdout(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    crossterm::terminal::disable_raw_mode()?;
    Ok(())
}
