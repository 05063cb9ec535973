//! Standalone HTML snapshot of the status table.

use std::fmt::Write as _;
use std::path::Path;

use chrono::Local;
use tracing::info;

use crate::error::Result;
use crate::ui::escape::escape_markup;
use crate::ui::status_view::{Meter, StatusRow};

const STYLE: &str = "body{font-family:sans-serif;margin:16px}\
table{border-collapse:collapse;width:100%}\
th,td{border-bottom:1px solid #e3e8f2;padding:4px 6px;text-align:left;font-size:13px}\
.ok{color:#19a68a}.warn{color:#c98a00}.bad{color:#c23b3b}\
.bar{display:inline-block;height:6px;background:#2b67dc;margin-right:4px}\
.bar.mem{background:#19a68a}.na{color:#8a94a6}";

/// Renders `rows` as an HTML document. Every text cell is escaped.
pub fn export_html(rows: &[StatusRow], title: &str) -> String {
    let title = escape_markup(title);
    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html><html><head><meta charset='utf-8'><title>{title}</title>\
         <style>{STYLE}</style></head><body><h1>{title}</h1>\
         <p>generated {}</p><table><thead><tr>",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    for header in [
        "Task", "Owner", "Role", "Engine", "PID", "State", "CPU", "Mem", "Progress", "Activity",
        "Docs", "Trend",
    ] {
        let _ = write!(html, "<th>{header}</th>");
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str(&row_html(row));
    }
    html.push_str("</tbody></table></body></html>\n");
    html
}

fn row_html(row: &StatusRow) -> String {
    let state = if row.state_hint.is_empty() {
        escape_markup(&row.state).into_owned()
    } else {
        format!(
            "{} <small>({})</small>",
            escape_markup(&row.state),
            escape_markup(&row.state_hint)
        )
    };
    let docs = match row.tokens {
        Some(tokens) => format!("{} | {tokens:.0}t", row.docs),
        None => row.docs.to_string(),
    };
    let trend = row
        .trend
        .as_ref()
        .map_or_else(|| "<span class='na'>-</span>".to_string(), |t| t.to_svg());

    format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
         <td class='{}'>{state}</td><td>{}</td><td>{}</td><td>{:.1}%</td>\
         <td>{}</td><td>{docs}</td><td>{trend}</td></tr>",
        escape_markup(&row.task_id),
        escape_markup(&row.owner),
        escape_markup(&row.role),
        escape_markup(&row.engine),
        escape_markup(&row.pid),
        row.class.css(),
        meter_html(row.cpu.as_ref(), "cpu"),
        meter_html(row.mem.as_ref(), "mem"),
        row.progress,
        escape_markup(&row.activity),
    )
}

fn meter_html(meter: Option<&Meter>, kind: &str) -> String {
    match meter {
        Some(m) => format!(
            "<span class='bar {kind}' style='width:{:.0}px'></span>{}",
            m.percent.clamp(0.0, 100.0) * 0.6,
            escape_markup(&m.label)
        ),
        None => "<span class='na'>-</span>".to_string(),
    }
}

/// Writes the snapshot to `path`.
pub fn write_snapshot(path: &Path, rows: &[StatusRow], title: &str) -> Result<()> {
    std::fs::write(path, export_html(rows, title))?;
    info!(path = %path.display(), rows = rows.len(), "snapshot exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::status_view::StateClass;
    use crate::ui::trend::Trend;

    fn row(owner: &str) -> StatusRow {
        StatusRow {
            task_id: "DEMO-T1".into(),
            owner: owner.into(),
            role: "Worker".into(),
            engine: "codex".into(),
            pid: "42".into(),
            state: "BLOCKED".into(),
            class: StateClass::Warn,
            cpu: Some(Meter {
                percent: 10.0,
                label: "10.000%".into(),
            }),
            mem: None,
            progress: 50.0,
            activity: "editing <main.rs>".into(),
            state_hint: "waiting \"review\"".into(),
            docs: 2,
            tokens: Some(1234.0),
            is_pm: false,
            trend: Some(Trend {
                cpu: Vec::new(),
                mem: Vec::new(),
            }),
        }
    }

    #[test]
    fn operator_text_is_escaped_in_every_cell() {
        let html = export_html(&[row("<b>A&B</b>")], "run \"x\"");
        assert!(html.contains("&lt;b&gt;A&amp;B&lt;/b&gt;"));
        assert!(html.contains("editing &lt;main.rs&gt;"));
        assert!(html.contains("waiting &quot;review&quot;"));
        assert!(html.contains("<title>run &quot;x&quot;</title>"));
        assert!(!html.contains("<b>A"));
    }

    #[test]
    fn rows_carry_state_class_and_trend() {
        let html = export_html(&[row("Codex-A")], "snapshot");
        assert!(html.contains("<td class='warn'>BLOCKED"));
        assert!(html.contains("<svg class='spark'"));
        assert!(html.contains("<td>2 | 1234t</td>"));
        assert!(html.contains("<span class='na'>-</span>"));
    }

    #[test]
    fn snapshot_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.html");
        write_snapshot(&path, &[row("Codex-A")], "snap").unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("<!doctype html>"));
    }
}
