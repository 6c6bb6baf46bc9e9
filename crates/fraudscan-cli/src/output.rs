//! Output formatting utilities
//!
//! Flagged records and statistics go to stdout; reports and warnings go to
//! stderr so stdout stays machine-readable.

use std::io::Write;

use serde::Serialize;

use crate::error::CliResult;

/// Write one value as a single JSON line
pub fn write_json_line<W: Write, T: Serialize>(out: &mut W, value: &T) -> CliResult<()> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Print a run report (pretty JSON) to stderr
pub fn print_report<T: Serialize>(report: &T) -> CliResult<()> {
    eprintln!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Print a warning to stderr
pub fn print_warning(message: &str) {
    eprintln!("warning: {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_line_is_newline_terminated() {
        let mut out = Vec::new();
        write_json_line(&mut out, &serde_json::json!({"key": "U1", "count": 3})).unwrap();
        write_json_line(&mut out, &serde_json::json!({"key": "U2", "count": 1})).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(text.ends_with('\n'));
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["key"], "U1");
    }
}
