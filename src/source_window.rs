//! Renders the window of source lines around a breakpoint hit: up to 5
//! lines before and 5 after the current line, inclusive, with the
//! current line prefixed `> ` and every other rendered line prefixed
//! with two spaces.

use crate::error::DebuggerError;
use std::io::BufRead;
use std::path::Path;

const LINES_AROUND: u64 = 5;

/// Opens `file` and prints the rendered window for `current_line` to
/// stdout. File-open errors become `SourceFileUnavailable`: the caller
/// treats this as non-fatal and leaves the session stopped.
pub fn print_source_window(file: &str, current_line: u64) -> Result<(), DebuggerError> {
    let text = render_source_window(file, current_line)?;
    print!("{}", text);
    Ok(())
}

fn render_source_window(file: &str, current_line: u64) -> Result<String, DebuggerError> {
    let f = std::fs::File::open(file).map_err(|source| DebuggerError::SourceFileUnavailable {
        path: Path::new(file).to_path_buf(),
        source,
    })?;
    let reader = std::io::BufReader::new(f);
    let lines: Vec<String> = reader
        .lines()
        .collect::<std::io::Result<_>>()
        .map_err(|source| DebuggerError::SourceFileUnavailable {
            path: Path::new(file).to_path_buf(),
            source,
        })?;
    Ok(render_lines(&lines, current_line))
}

/// The pure rendering step, factored out so it's testable without a file
/// on disk.
fn render_lines(lines: &[String], current_line: u64) -> String {
    let start_line = current_line.saturating_sub(LINES_AROUND).max(1);
    let end_line = current_line + LINES_AROUND;

    let mut out = String::new();
    for (idx, text) in lines.iter().enumerate() {
        let line_no = (idx + 1) as u64;
        if line_no < start_line {
            continue;
        }
        if line_no > end_line {
            break;
        }
        let prefix = if line_no == current_line { "> " } else { "  " };
        out.push_str(&format!("{}{} {}\n", prefix, line_no, text));
    }
    out
}
