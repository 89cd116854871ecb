//! Terminal rendering of diagnostics: source excerpts with caret underlines.

use crate::diagnostic::{Diagnostic, Severity};
use crate::style::Style;
use home_base::Span;

/// Maps a byte offset to a 1-based (line, column) pair and the full text of
/// that line, for excerpting.
fn locate(source: &str, offset: usize) -> (usize, usize, &str) {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut line_start = 0;
    for (i, b) in source.bytes().enumerate() {
        if i >= offset {
            break;
        }
        if b == b'\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    let line_end = source[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(source.len());
    let column = offset - line_start + 1;
    (line, column, &source[line_start..line_end])
}

fn severity_style(severity: Severity, text: &str) -> String {
    match severity {
        Severity::Bug | Severity::Error => Style::bold_red(text),
        Severity::Warning => Style::bold_yellow(text),
        Severity::Note => Style::bold(text),
    }
}

/// Renders one diagnostic against `source`/`filename` in the style of
/// `rustc`: a header line, a source excerpt with a caret underline, and an
/// optional suggestion footer.
pub fn render(diagnostic: &Diagnostic, filename: &str, source: &str) -> String {
    let (line, column, line_text) = locate(source, diagnostic.span.start);
    let mut out = String::new();

    out.push_str(&format!(
        "{}[{}]: {}\n",
        severity_style(diagnostic.severity, &diagnostic.severity.to_string()),
        diagnostic.code,
        diagnostic.message,
    ));
    out.push_str(&format!(
        "  {} {}:{}:{}\n",
        Style::blue("-->"),
        filename,
        line,
        column
    ));

    let gutter = format!("{line}");
    out.push_str(&format!("{} {}\n", " ".repeat(gutter.len()), Style::blue("|")));
    out.push_str(&format!("{} {} {}\n", Style::blue(&gutter), Style::blue("|"), line_text));

    let underline_len = diagnostic.span.len().max(1).min(line_text.len().saturating_sub(column - 1).max(1));
    let caret = severity_style(diagnostic.severity, &"^".repeat(underline_len));
    out.push_str(&format!(
        "{} {} {}{}\n",
        " ".repeat(gutter.len()),
        Style::blue("|"),
        " ".repeat(column - 1),
        caret
    ));

    for secondary in &diagnostic.secondary_spans {
        let (sline, scolumn, stext) = locate(source, secondary.span.start);
        out.push_str(&format!(
            "{} {} note: {} ({}:{}:{})\n",
            " ".repeat(gutter.len()),
            Style::cyan("="),
            secondary.label,
            filename,
            sline,
            scolumn,
        ));
        let _ = stext;
    }

    if let Some(suggestion) = &diagnostic.suggestion {
        out.push_str(&format!(
            "{} {} help: {}\n",
            " ".repeat(gutter.len()),
            Style::green("="),
            suggestion
        ));
    }

    out
}

/// Renders every diagnostic and joins them with a blank line, one
/// paragraph per diagnostic.
pub fn render_all(diagnostics: &[Diagnostic], filename: &str, source: &str) -> String {
    diagnostics
        .iter()
        .map(|d| render(d, filename, source))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn span_text<'a>(source: &'a str, span: Span) -> &'a str {
    &source[span.start.min(source.len())..span.end.min(source.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use home_base::Span;

    #[test]
    fn locates_line_and_column() {
        let source = "let x = 1\nlet y = 2\n";
        let (line, column, text) = locate(source, 14);
        assert_eq!(line, 2);
        assert_eq!(column, 5);
        assert_eq!(text, "let y = 2");
    }

    #[test]
    fn render_includes_code_and_message() {
        std::env::set_var("NO_COLOR", "1");
        let diagnostic = Diagnostic::error("H0001", "unexpected token", Span::new(4, 5), "parser");
        let rendered = render(&diagnostic, "main.home", "let @ = 1\n");
        assert!(rendered.contains("H0001"));
        assert!(rendered.contains("unexpected token"));
        assert!(rendered.contains("main.home:1:5"));
        std::env::remove_var("NO_COLOR");
    }
}
