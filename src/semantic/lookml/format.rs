//! LookML text formatting: string escaping and indentation.

/// Escape a string for a double-quoted LookML value.
#[must_use]
pub fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' | '\r' => result.push(' '),
            c => result.push(c),
        }
    }
    result
}

/// Quote a string value with double quotes.
#[must_use]
pub fn quote_string(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

/// Writes lines at a tracked indentation level (two spaces per level).
pub struct IndentWriter {
    buffer: String,
    current_indent: usize,
}

impl IndentWriter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            current_indent: 0,
        }
    }

    pub fn indent(&mut self) {
        self.current_indent += 1;
    }

    pub fn dedent(&mut self) {
        self.current_indent = self.current_indent.saturating_sub(1);
    }

    pub fn write_line(&mut self, s: &str) {
        for _ in 0..self.current_indent {
            self.buffer.push_str("  ");
        }
        self.buffer.push_str(s);
        self.buffer.push('\n');
    }

    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
    }

    /// Open a `keyword: name {` block and indent.
    pub fn open(&mut self, keyword: &str, name: &str) {
        self.write_line(&format!("{}: {} {{", keyword, name));
        self.indent();
    }

    /// Dedent and close the current block.
    pub fn close(&mut self) {
        self.dedent();
        self.write_line("}");
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl Default for IndentWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("plain"), "plain");
        assert_eq!(escape_string("say \"hi\""), "say \\\"hi\\\"");
        assert_eq!(escape_string("two\nlines"), "two lines");
    }

    #[test]
    fn test_nested_blocks() {
        let mut w = IndentWriter::new();
        w.open("view", "orders");
        w.open("measure", "count");
        w.write_line("type: count");
        w.close();
        w.close();
        assert_eq!(
            w.into_string(),
            "view: orders {\n  measure: count {\n    type: count\n  }\n}\n"
        );
    }
}
