//! JSON-lines I/O for the shell
//!
//! - Input: one JSON request per line, blank lines ignored
//! - Output: one JSON response per line
//! - UTF-8 only

use std::io::{BufRead, Write};

use serde_json::{json, Value};

use super::errors::CliResult;

/// Non-blank request lines from `input`
pub fn read_requests<R: BufRead>(input: R) -> impl Iterator<Item = CliResult<String>> {
    input.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Ok(line)),
        Err(e) => Some(Err(e.into())),
    })
}

/// Success envelope
pub fn ok_response(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

/// Error envelope
pub fn error_response(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write one response line and flush
pub fn write_response<W: Write>(out: &mut W, response: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, response)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_blank_lines_skipped() {
        let input = Cursor::new("{\"op\":\"stats\"}\n\n   \n{\"op\":\"get\"}\n");
        let lines: Vec<_> = read_requests(input).map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_response_is_one_line() {
        let mut out = Vec::new();
        write_response(&mut out, &ok_response(json!({"id": "a"}))).unwrap();
        write_response(&mut out, &error_response("DOCVAULT_NOT_FOUND", "gone")).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let err: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(err["code"], "DOCVAULT_NOT_FOUND");
    }
}
