//! HTML score report.
//!
//! Produces a self-contained HTML file with all CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use cybergrade_core::model::ContentKind;
use cybergrade_core::report::{PivotColumn, PivotTable};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// CSS class for a cell: full marks, partial, zero or blank.
fn cell_class(cell: Option<u32>, column: &PivotColumn) -> &'static str {
    match cell {
        None => "blank",
        Some(0) => "fail",
        Some(v) if v >= column.max_score => "pass",
        Some(_) => "partial",
    }
}

/// Generate the HTML score report for a pivot.
pub fn generate_html(pivot: &PivotTable) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>cybergrade scores ({})</title>\n",
        html_escape(&pivot.version)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>cybergrade scores</h1>\n");
    let count = |kind: ContentKind| pivot.columns.iter().filter(|c| c.kind == kind).count();
    html.push_str(&format!(
        "<p class=\"meta\">Content version: <strong>{}</strong> | {} users | {} labs | {} quizzes | {} exams | {}</p>\n",
        html_escape(&pivot.version),
        pivot.rows.len(),
        count(ContentKind::Lab),
        count(ContentKind::Quiz),
        count(ContentKind::Exam),
        pivot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    html.push_str("<section class=\"scores\">\n");
    html.push_str("<table class=\"pivot\" id=\"scores\">\n<thead><tr>");
    for (i, header) in pivot.headers().iter().enumerate() {
        html.push_str(&format!(
            "<th onclick=\"sortTable({i})\">{}</th>",
            html_escape(header)
        ));
    }
    html.push_str("</tr></thead>\n<tbody>\n");

    for row in &pivot.rows {
        html.push_str("<tr>");
        html.push_str(&format!(
            "<td>{}</td><td>{}</td><td>{}</td>",
            html_escape(&row.identity.user_id),
            html_escape(row.identity.email.as_deref().unwrap_or("")),
            html_escape(row.identity.student_id.as_deref().unwrap_or("")),
        ));
        for (cell, column) in row.cells.iter().zip(&pivot.columns) {
            let text = cell.map(|v| v.to_string()).unwrap_or_default();
            html.push_str(&format!(
                "<td class=\"{}\">{}</td>",
                cell_class(*cell, column),
                text
            ));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");

    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(pivot)
            .unwrap_or_default()
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write the HTML score report to a file.
pub fn write_html_report(pivot: &PivotTable, path: &Path) -> Result<()> {
    let html = generate_html(pivot);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --partial: #fef9c3; --fail: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --partial: #713f12; --fail: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; white-space: nowrap; }
.pass { background: var(--pass); }
.partial { background: var(--partial); }
.fail { background: var(--fail); }
.blank { color: #9ca3af; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('scores');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    if (!isNaN(na) && !isNaN(nb)) return asc ? na - nb : nb - na;
    return asc ? va.localeCompare(vb) : vb.localeCompare(va);
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
