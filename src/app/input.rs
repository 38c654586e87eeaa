//! Prompt and line reading for the REPL.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};

/// Print the `You: ` prompt and read one line from `reader`.
///
/// Returns `None` at end-of-input.
pub fn read_input<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut stdout = io::stdout().lock();
    queue!(
        stdout,
        SetAttribute(Attribute::Bold),
        Print("You: "),
        SetAttribute(Attribute::Reset)
    )?;
    stdout.flush()?;
    read_line(reader)
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    let read = reader.read_line(&mut line).context("read stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_lines_then_eof() {
        let mut input = Cursor::new("hello\r\n/exit\n");
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("hello"));
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("/exit"));
        assert_eq!(read_line(&mut input).unwrap(), None);
    }

    #[test]
    fn blank_line_is_not_eof() {
        let mut input = Cursor::new("\n");
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some(""));
    }
}
