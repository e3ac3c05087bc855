//! Line-based terminal I/O.

use crate::error::{DeckError, DeckResult};
use crossterm::style::{Color, Stylize};
use std::io::{BufRead, Write};

/// Prompt/response channel to the user.
///
/// Generic over reader and writer so command handlers can be driven by
/// scripted input in tests.
pub struct Console<R, W> {
    input: R,
    output: W,
    color: bool,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            color: true,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        let styled = text.with(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }

    fn write_line(&mut self, line: &str) -> DeckResult<()> {
        writeln!(self.output, "{}", line).map_err(DeckError::Console)
    }

    /// Print a plain line.
    pub fn say(&mut self, text: impl AsRef<str>) -> DeckResult<()> {
        self.write_line(text.as_ref())
    }

    pub fn blank(&mut self) -> DeckResult<()> {
        self.write_line("")
    }

    pub fn heading(&mut self, text: impl AsRef<str>) -> DeckResult<()> {
        let line = self.paint(text.as_ref(), Color::Cyan, true);
        self.write_line(&line)
    }

    pub fn success(&mut self, text: impl AsRef<str>) -> DeckResult<()> {
        let line = self.paint(text.as_ref(), Color::Green, false);
        self.write_line(&line)
    }

    pub fn warn(&mut self, text: impl AsRef<str>) -> DeckResult<()> {
        let line = self.paint(text.as_ref(), Color::Yellow, false);
        self.write_line(&line)
    }

    /// Report an error that aborted an operation.
    pub fn error(&mut self, err: &DeckError) -> DeckResult<()> {
        let line = self.paint(&format!("Error: {}", err), Color::Red, false);
        self.write_line(&line)
    }

    /// Show a labelled value, e.g. `Question: France?`.
    pub fn field(&mut self, label: &str, value: &str) -> DeckResult<()> {
        let label = self.paint(&format!("{}:", label), Color::Blue, true);
        self.write_line(&format!("{} {}", label, value))
    }

    /// Print `message` and read one line. `None` means end of input.
    pub fn prompt(&mut self, message: &str) -> DeckResult<Option<String>> {
        let message = self.paint(message, Color::Magenta, false);
        write!(self.output, "{} ", message).map_err(DeckError::Console)?;
        self.output.flush().map_err(DeckError::Console)?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(DeckError::Console)?;
        if read == 0 {
            // Keep the transcript on separate lines when input ends mid-prompt.
            self.write_line("")?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    /// Ask a yes/no question. End of input counts as "no".
    pub fn confirm(&mut self, message: &str) -> DeckResult<bool> {
        loop {
            let Some(answer) = self.prompt(&format!("{} (y/n):", message))? else {
                return Ok(false);
            };
            match answer.trim().to_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.warn("Please answer 'y' or 'n'.")?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
        Console::new(Cursor::new(input.as_bytes().to_vec()), Vec::new()).with_color(false)
    }

    fn transcript(console: &Console<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(console.output().clone()).unwrap()
    }

    #[test]
    fn test_prompt_reads_lines() {
        let mut c = console("first\r\nsecond\n");
        assert_eq!(c.prompt("?").unwrap().as_deref(), Some("first"));
        assert_eq!(c.prompt("?").unwrap().as_deref(), Some("second"));
        assert_eq!(c.prompt("?").unwrap(), None);
    }

    #[test]
    fn test_confirm_reprompts() {
        let mut c = console("maybe\nYES\n");
        assert!(c.confirm("Delete?").unwrap());
        assert!(transcript(&c).contains("Please answer 'y' or 'n'."));

        let mut c = console("");
        assert!(!c.confirm("Delete?").unwrap());
    }

    #[test]
    fn test_plain_output_has_no_escapes() {
        let mut c = console("");
        c.heading("Deck: capitals").unwrap();
        c.field("Question", "France?").unwrap();
        let out = transcript(&c);
        assert_eq!(out, "Deck: capitals\nQuestion: France?\n");
    }

    #[test]
    fn test_colored_output() {
        let mut c = Console::new(Cursor::new(Vec::new()), Vec::new());
        c.heading("done").unwrap();
        let out = String::from_utf8(c.output().clone()).unwrap();
        assert!(out.contains("\u{1b}["));
        assert!(out.contains("done"));
    }
}
