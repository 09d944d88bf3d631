//! Terminal output: ANSI notes and the end-of-run summary table.

use imgscribe_pipeline::BatchReport;

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
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

/// Two-column label/value table, values right-aligned.
pub fn render_table(rows: &[(&str, String)]) -> String {
    let label_width = rows.iter().map(|(l, _)| strip_ansi(l).len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, v)| strip_ansi(v).len()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, value) in rows {
        let label_pad = label_width.saturating_sub(strip_ansi(label).len());
        let value_pad = value_width.saturating_sub(strip_ansi(value).len());
        out.push_str(&format!(
            "  {label}{}  {}{value}\n",
            " ".repeat(label_pad),
            " ".repeat(value_pad)
        ));
    }
    out
}

/// Summary rows for a finished batch.
pub fn summary_rows(report: &BatchReport) -> Vec<(&'static str, String)> {
    vec![
        ("Images", report.total_images.to_string()),
        ("Succeeded", report.succeeded.to_string()),
        ("Failed", report.failed.to_string()),
        ("Skipped", report.skipped.to_string()),
        ("Lines written", report.write.written.to_string()),
        ("Write failures", report.write.failures.to_string()),
        ("Total tokens", report.usage.total_tokens.to_string()),
        ("Processing time", format!("{:.2}s", report.elapsed.as_secs_f64())),
        ("Images/second", format!("{:.2}", report.images_per_sec())),
    ]
}
