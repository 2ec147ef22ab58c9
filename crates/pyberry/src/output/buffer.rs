//! Indented line accumulator.

const INDENT: &str = "    ";

/// Ordered output lines with a current indentation level.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    lines: Vec<String>,
    indent: usize,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        let mut line = String::with_capacity(self.indent * INDENT.len() + text.len());
        for _ in 0..self.indent {
            line.push_str(INDENT);
        }
        line.push_str(text);
        self.lines.push(line);
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn level(&self) -> usize {
        self.indent
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Join all lines with `\n` and a single trailing newline.
    pub fn finish(self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut output = self.lines.join("\n");
        output.push('\n');
        output
    }
}
