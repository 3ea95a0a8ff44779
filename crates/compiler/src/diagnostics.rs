//! Semantic diagnostics
//!
//! Errors never abort a pass: they accumulate in a sink owned by the
//! traversal context, and the pipeline checks the count at each pass
//! boundary. When the source text has been preloaded, rendering reprints
//! the offending line with a caret under the column.

use crate::ast::Pos;

/// A single diagnostic record.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Accumulates diagnostics for one compilation unit.
#[derive(Debug)]
pub struct DiagnosticSink {
    filename: String,
    /// Source lines for highlighting; empty when no source was provided.
    source: Vec<String>,
    records: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new(filename: impl Into<String>) -> Self {
        DiagnosticSink {
            filename: filename.into(),
            source: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Preload the source text so rendered diagnostics can highlight the
    /// offending line.
    pub fn with_source(filename: impl Into<String>, source: &str) -> Self {
        DiagnosticSink {
            filename: filename.into(),
            source: source.lines().map(str::to_string).collect(),
            records: Vec::new(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Record an error at the given position.
    pub fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.records.push(Diagnostic {
            line: pos.line,
            column: pos.column,
            message: message.into(),
        });
    }

    pub fn error_count(&self) -> usize {
        self.records.len()
    }

    pub fn had_errors(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// The 1-based source line, when source was preloaded.
    fn source_at(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.source.get(line - 1).map(String::as_str)
    }

    /// Render all records as newline-terminated `file:line:col: error:`
    /// messages, each followed by a caret highlight when possible.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for rec in &self.records {
            out.push_str(&format!(
                "{}:{}:{}: error: {}\n",
                self.filename, rec.line, rec.column, rec.message
            ));
            if let Some(bad_line) = self.source_at(rec.line) {
                out.push_str(bad_line);
                out.push('\n');
                for _ in 1..rec.column {
                    out.push(' ');
                }
                out.push_str("^\n");
            }
        }
        out
    }
}
