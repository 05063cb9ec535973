//! Detached read-only text surfaces.
//!
//! Commands open text through the [`ViewerPort`] capability and never see
//! how it is displayed. In the terminal, [`TerminalViewer`] hands each
//! surface to the [`ViewerHost`] owned by the UI, which draws it as a
//! scrollable overlay with a copy action.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{DashError, Result};
use crate::ui::escape::{sanitize_block, strip_control};
use crate::ui::Theme;

/// Smallest terminal that can host a viewer.
pub const MIN_VIEWER_COLS: u16 = 40;
pub const MIN_VIEWER_ROWS: u16 = 10;

/// Receipt for an opened surface. Closing is up to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerHandle {
    pub id: u64,
    pub title: String,
}

/// Capability to present read-only text outside the main view.
#[cfg_attr(test, mockall::automock)]
pub trait ViewerPort: Send {
    fn open(&mut self, title: &str, text: &str) -> Result<ViewerHandle>;
}

/// Last known terminal size, shared with the viewer port.
#[derive(Debug, Clone, Default)]
pub struct TerminalSize(Arc<AtomicU32>);

impl TerminalSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        let size = Self::default();
        size.set(cols, rows);
        size
    }

    pub fn set(&self, cols: u16, rows: u16) {
        self.0
            .store((u32::from(cols) << 16) | u32::from(rows), Ordering::Relaxed);
    }

    pub fn get(&self) -> (u16, u16) {
        let packed = self.0.load(Ordering::Relaxed);
        ((packed >> 16) as u16, (packed & 0xffff) as u16)
    }
}

/// One opened text surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSurface {
    pub handle: ViewerHandle,
    /// Sanitized display lines.
    pub lines: Vec<String>,
    /// Original text, used for copying.
    pub raw: String,
    pub scroll: usize,
}

/// [`ViewerPort`] backed by the terminal UI.
pub struct TerminalViewer {
    surfaces: mpsc::UnboundedSender<ViewerSurface>,
    size: TerminalSize,
    next_id: u64,
}

impl TerminalViewer {
    /// Creates the port together with the host that displays its surfaces.
    pub fn new(size: TerminalSize, clipboard: Box<dyn Clipboard>) -> (Self, ViewerHost) {
        let (tx, rx) = mpsc::unbounded_channel();
        let viewer = Self {
            surfaces: tx,
            size,
            next_id: 1,
        };
        let host = ViewerHost {
            incoming: rx,
            stack: Vec::new(),
            clipboard,
        };
        (viewer, host)
    }
}

impl ViewerPort for TerminalViewer {
    fn open(&mut self, title: &str, text: &str) -> Result<ViewerHandle> {
        let (cols, rows) = self.size.get();
        if cols < MIN_VIEWER_COLS || rows < MIN_VIEWER_ROWS {
            return Err(DashError::Environment(format!(
                "viewer blocked: terminal is {cols}x{rows}, need at least {MIN_VIEWER_COLS}x{MIN_VIEWER_ROWS}"
            )));
        }

        let handle = ViewerHandle {
            id: self.next_id,
            title: strip_control(if title.is_empty() { "View" } else { title }).into_owned(),
        };
        let lines = sanitize_block(text).lines().map(str::to_string).collect();
        let surface = ViewerSurface {
            handle: handle.clone(),
            lines,
            raw: text.to_string(),
            scroll: 0,
        };
        self.surfaces
            .send(surface)
            .map_err(|_| DashError::Environment("viewer blocked: display host is gone".into()))?;
        self.next_id += 1;
        debug!(id = handle.id, title = %handle.title, "viewer opened");
        Ok(handle)
    }
}

/// What a key press did to the viewer stack.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerAction {
    /// No viewer is open; the key belongs to the main view.
    Ignored,
    Handled,
    Closed,
    /// Copy finished; the message goes to the status line.
    Copied(String),
}

/// Owns open surfaces and draws the top one.
pub struct ViewerHost {
    incoming: mpsc::UnboundedReceiver<ViewerSurface>,
    stack: Vec<ViewerSurface>,
    clipboard: Box<dyn Clipboard>,
}

impl ViewerHost {
    /// Moves newly opened surfaces onto the stack.
    pub fn drain(&mut self) {
        while let Ok(surface) = self.incoming.try_recv() {
            self.stack.push(surface);
        }
    }

    pub fn is_active(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn top(&self) -> Option<&ViewerSurface> {
        self.stack.last()
    }

    pub fn handle_key(&mut self, key: KeyEvent, page: usize) -> ViewerAction {
        let Some(surface) = self.stack.last_mut() else {
            return ViewerAction::Ignored;
        };
        let max_scroll = surface.lines.len().saturating_sub(1);
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => {
                self.stack.pop();
                return ViewerAction::Closed;
            }
            KeyCode::Char('y') => {
                let raw = surface.raw.clone();
                return ViewerAction::Copied(copy_message(self.clipboard.copy(&raw)));
            }
            KeyCode::Down | KeyCode::Char('j') => surface.scroll = (surface.scroll + 1).min(max_scroll),
            KeyCode::Up | KeyCode::Char('k') => surface.scroll = surface.scroll.saturating_sub(1),
            KeyCode::PageDown | KeyCode::Char(' ') => {
                surface.scroll = (surface.scroll + page.max(1)).min(max_scroll)
            }
            KeyCode::PageUp => surface.scroll = surface.scroll.saturating_sub(page.max(1)),
            KeyCode::Home | KeyCode::Char('g') => surface.scroll = 0,
            KeyCode::End | KeyCode::Char('G') => surface.scroll = max_scroll,
            _ => {}
        }
        ViewerAction::Handled
    }

    /// Draws the top surface over `area`.
    pub fn render(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let Some(surface) = self.top() else {
            return;
        };
        let popup = centered(area, 90, 85);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(Span::styled(format!(" {} ", surface.handle.title), theme.title_style))
            .borders(Borders::ALL)
            .style(theme.block_style);
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let text: Vec<Line> = surface
            .lines
            .iter()
            .skip(surface.scroll)
            .take(chunks[0].height as usize)
            .map(|l| Line::from(l.as_str()))
            .collect();
        frame.render_widget(Paragraph::new(text).style(theme.normal_text), chunks[0]);

        let footer = Line::from(vec![
            Span::styled("y", theme.key_style),
            Span::raw(" copy  "),
            Span::styled("j/k PgUp/PgDn g/G", theme.key_style),
            Span::raw(" scroll  "),
            Span::styled("Esc", theme.key_style),
            Span::raw(format!(
                " close  [{}/{}]",
                (surface.scroll + 1).min(surface.lines.len().max(1)),
                surface.lines.len()
            )),
        ]);
        frame.render_widget(Paragraph::new(footer).style(theme.help_style), chunks[1]);
    }
}

fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn copy_message(outcome: Result<CopyOutcome>) -> String {
    match outcome {
        Ok(CopyOutcome::Clipboard(tool)) => format!("copied via {tool}"),
        Ok(CopyOutcome::File(path)) => {
            format!("clipboard unavailable, text saved to {}", path.display())
        }
        Err(err) => format!("copy failed: {err}"),
    }
}

/// Where copied text ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Clipboard(String),
    File(PathBuf),
}

#[cfg_attr(test, mockall::automock)]
pub trait Clipboard: Send {
    fn copy(&mut self, text: &str) -> Result<CopyOutcome>;
}

/// Longest a clipboard tool may hold the UI before it is killed.
pub const COPY_TIMEOUT: Duration = Duration::from_secs(2);

/// Pipes text into the first clipboard tool that accepts it, falling back
/// to a kept temp file.
#[derive(Debug, Clone)]
pub struct SystemClipboard {
    tools: Vec<(String, Vec<String>)>,
    timeout: Duration,
}

impl Default for SystemClipboard {
    fn default() -> Self {
        let tools: &[(&str, &[&str])] = &[
            ("pbcopy", &[]),
            ("wl-copy", &[]),
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
            ("clip", &[]),
        ];
        Self::with_tools(
            tools
                .iter()
                .map(|(cmd, args)| (cmd.to_string(), args.iter().map(|a| a.to_string()).collect()))
                .collect(),
        )
    }
}

impl SystemClipboard {
    pub fn with_tools(tools: Vec<(String, Vec<String>)>) -> Self {
        Self {
            tools,
            timeout: COPY_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs one tool. The child is always reaped, and killed when the
    /// write fails or it outlives `timeout`.
    fn pipe(cmd: &str, args: &[String], text: &str, timeout: Duration) -> std::io::Result<bool> {
        let mut child = Command::new(cmd)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        // Dropping stdin closes the pipe so the tool sees EOF.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()),
            None => Ok(()),
        };
        if let Err(err) = written {
            let _ = child.kill();
            child.wait()?;
            return Err(err);
        }
        wait_bounded(&mut child, timeout)
    }
}

fn wait_bounded(child: &mut Child, timeout: Duration) -> std::io::Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status.success());
        }
        if Instant::now() >= deadline {
            warn!(pid = child.id(), "clipboard tool timed out");
            let _ = child.kill();
            child.wait()?;
            return Ok(false);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

impl Clipboard for SystemClipboard {
    fn copy(&mut self, text: &str) -> Result<CopyOutcome> {
        for (cmd, args) in &self.tools {
            match Self::pipe(cmd, args, text, self.timeout) {
                Ok(true) => {
                    info!(tool = %cmd, bytes = text.len(), "copied to clipboard");
                    return Ok(CopyOutcome::Clipboard(cmd.clone()));
                }
                Ok(false) => debug!(tool = %cmd, "clipboard tool refused input"),
                Err(err) => debug!(tool = %cmd, error = %err, "clipboard tool unavailable"),
            }
        }
        warn!("no clipboard tool accepted the text, saving to a file");
        save_to_file(text).map(CopyOutcome::File)
    }
}

/// Writes `text` to a persistent temp file and returns its path.
pub fn save_to_file(text: &str) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("orch-dash-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    let (_, path) = file.keep().map_err(|err| DashError::Io(err.error))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn viewer(cols: u16, rows: u16, clipboard: MockClipboard) -> (TerminalViewer, ViewerHost) {
        TerminalViewer::new(TerminalSize::new(cols, rows), Box::new(clipboard))
    }

    #[test]
    fn small_terminal_blocks_the_viewer() {
        let (mut port, mut host) = viewer(30, 40, MockClipboard::new());
        let err = port.open("log", "text").unwrap_err();
        assert!(matches!(err, DashError::Environment(_)));
        host.drain();
        assert!(!host.is_active());
    }

    #[test]
    fn gone_host_blocks_the_viewer() {
        let (mut port, host) = viewer(120, 40, MockClipboard::new());
        drop(host);
        assert!(matches!(port.open("log", "x"), Err(DashError::Environment(_))));
    }

    #[test]
    fn opened_text_is_sanitized_and_scrollable() {
        let (mut port, mut host) = viewer(120, 40, MockClipboard::new());
        let handle = port.open("T1 \x1b[31mlog", "one\n\x1b[2Jtwo\nthree").unwrap();
        assert_eq!(handle.id, 1);
        assert_eq!(handle.title, "T1  [31mlog");

        host.drain();
        let top = host.top().unwrap();
        assert_eq!(top.lines, vec!["one", "[2Jtwo", "three"]);
        assert_eq!(top.raw, "one\n\x1b[2Jtwo\nthree");

        assert_eq!(host.handle_key(key(KeyCode::Char('G')), 10), ViewerAction::Handled);
        assert_eq!(host.top().unwrap().scroll, 2);
        host.handle_key(key(KeyCode::Down), 10);
        assert_eq!(host.top().unwrap().scroll, 2);
        host.handle_key(key(KeyCode::Char('g')), 10);
        assert_eq!(host.top().unwrap().scroll, 0);

        assert_eq!(host.handle_key(key(KeyCode::Esc), 10), ViewerAction::Closed);
        assert_eq!(host.handle_key(key(KeyCode::Esc), 10), ViewerAction::Ignored);
    }

    #[test]
    fn copy_reports_fallback_file() {
        let mut clipboard = MockClipboard::new();
        clipboard
            .expect_copy()
            .withf(|text| text == "full text")
            .times(1)
            .returning(|_| Ok(CopyOutcome::File(PathBuf::from("/tmp/orch-dash-x.txt"))));
        let (mut port, mut host) = viewer(80, 24, clipboard);
        port.open("doc", "full text").unwrap();
        host.drain();

        let action = host.handle_key(key(KeyCode::Char('y')), 10);
        assert_eq!(
            action,
            ViewerAction::Copied(
                "clipboard unavailable, text saved to /tmp/orch-dash-x.txt".to_string()
            )
        );
    }

    #[test]
    fn missing_tools_fall_back_to_a_file() {
        let mut clipboard = SystemClipboard::with_tools(vec![(
            "orch-dash-no-such-clipboard-tool".to_string(),
            Vec::new(),
        )]);
        let outcome = clipboard.copy("saved text").unwrap();
        let CopyOutcome::File(path) = outcome else {
            panic!("expected file fallback, got {outcome:?}");
        };
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "saved text");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn terminal_size_round_trips() {
        let size = TerminalSize::new(300, 75);
        assert_eq!(size.get(), (300, 75));
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_and_falls_back_to_a_file() {
        let mut clipboard =
            SystemClipboard::with_tools(vec![("sleep".to_string(), vec!["30".to_string()])])
                .timeout(Duration::from_millis(100));
        let started = Instant::now();
        let outcome = clipboard.copy("held text").unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        let CopyOutcome::File(path) = outcome else {
            panic!("expected file fallback, got {outcome:?}");
        };
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "held text");
        std::fs::remove_file(path).unwrap();
    }
}
