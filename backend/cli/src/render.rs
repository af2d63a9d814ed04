//! Terminal output: notes, the findings table, notification lines.

use assetlens_core::{Finding, Notification, Severity};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn paint(s: &str, style: &str) -> String {
    if supports_color() {
        format!("{style}{s}{RESET}")
    } else {
        s.to_string()
    }
}

// ---------------------------------------------------------------------------
// Formatted notes
// ---------------------------------------------------------------------------

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

pub struct Column {
    pub header: String,
    pub max_width: Option<usize>,
}

impl Column {
    pub fn new(header: impl Into<String>) -> Self {
        Self { header: header.into(), max_width: None }
    }

    pub fn max(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// Left-aligned table. Cells longer than a column's `max_width` wrap onto extra lines.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let visible = |s: &str| strip_ansi(s).chars().count();
    let mut widths: Vec<usize> = columns.iter().map(|c| visible(&c.header)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(columns.len()) {
            let w = visible(cell);
            widths[i] = widths[i].max(columns[i].max_width.map_or(w, |m| w.min(m)));
        }
    }

    let mut out = String::new();
    let header: Vec<String> = columns.iter().zip(&widths).map(|(c, w)| pad(&c.header, *w)).collect();
    out.push_str(&format!("  {}\n", paint(header.join("  ").trim_end(), BOLD)));
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}\n", sep.join("  ")));

    for row in rows {
        let wrapped: Vec<Vec<String>> = (0..columns.len())
            .map(|i| wrap(row.get(i).map(String::as_str).unwrap_or(""), widths[i]))
            .collect();
        let height = wrapped.iter().map(Vec::len).max().unwrap_or(1);
        for line in 0..height {
            let cells: Vec<String> = wrapped
                .iter()
                .zip(&widths)
                .map(|(lines, w)| pad(lines.get(line).map(String::as_str).unwrap_or(""), *w))
                .collect();
            out.push_str(&format!("  {}\n", cells.join("  ").trim_end()));
        }
    }
    out
}

fn pad(s: &str, width: usize) -> String {
    let len = strip_ansi(s).chars().count();
    format!("{s}{}", " ".repeat(width.saturating_sub(len)))
}

/// Word-wrap plain text to `width` columns. Cells carrying ANSI codes are not wrapped.
fn wrap(s: &str, width: usize) -> Vec<String> {
    if s.contains('\x1b') || s.chars().count() <= width {
        return vec![s.to_string()];
    }
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in s.split_whitespace() {
        let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
        if needed > width && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

// ---------------------------------------------------------------------------
// Domain rendering
// ---------------------------------------------------------------------------

fn severity_label(severity: Severity) -> String {
    match severity {
        Severity::Info => paint("info", DIM),
        Severity::Warning => paint("warning", YELLOW),
        Severity::Critical => paint("CRITICAL", RED),
    }
}

pub fn render_findings(findings: &[Finding]) -> String {
    let columns = [Column::new("Category"), Column::new("Severity"), Column::new("Finding").max(72)];
    let rows: Vec<Vec<String>> = findings
        .iter()
        .map(|f| vec![f.category.to_string(), severity_label(f.severity), f.text.clone()])
        .collect();
    render_table(&columns, &rows)
}

/// Print progress and failure notifications. Completions carry results the
/// caller prints itself.
pub fn print_notification(notification: &Notification) {
    match notification {
        Notification::RetryScheduled { .. } => note_warn(&notification.to_string()),
        Notification::AnalysisFailed { .. }
        | Notification::RequestFailed { .. }
        | Notification::SpeechFailed { .. } => note_error(&notification.to_string()),
        Notification::Analyzing => note_info(&notification.to_string()),
        Notification::AnalysisComplete { .. } | Notification::ReplyReceived { .. } => {}
    }
}
