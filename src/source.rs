//! Source buffer & diagnostics (C1).
//!
//! A [`SourceFile`] is the immutable input to one compilation: a path and
//! the raw SFC text. It owns a [`LineIndex`] so every later stage can turn a
//! byte offset into a human-readable `line:column` without re-scanning the
//! source.

use serde::{Deserialize, Serialize};

/// Byte-offset -> 1-based line lookup for a single source file.
///
/// Built once per [`SourceFile`]; recreated whenever the underlying code
/// changes (callers must not reuse a `LineIndex` across two different code
/// strings for the same path).
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line. `line_starts[0] == 0`.
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    pub fn new(code: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (offset, byte) in code.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((offset + 1) as u32);
            }
        }
        LineIndex {
            line_starts,
            len: code.len() as u32,
        }
    }

    /// 1-based line number containing `offset`.
    pub fn find_line(&self, offset: u32) -> u32 {
        let offset = offset.min(self.len);
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx as u32 + 1,
            Err(idx) => idx as u32, // idx is the count of starts <= offset
        }
    }

    /// 1-based column (character count from line start) for `offset`.
    pub fn find_column(&self, code: &str, offset: u32) -> u32 {
        let line = self.find_line(offset);
        let line_start = self.line_starts[(line - 1) as usize];
        code[line_start as usize..offset as usize].chars().count() as u32 + 1
    }

    /// The trimmed text of the line containing `offset`, used as a
    /// diagnostic highlight.
    pub fn line_text<'a>(&self, code: &'a str, offset: u32) -> &'a str {
        let line = self.find_line(offset);
        let start = self.line_starts[(line - 1) as usize] as usize;
        let end = self
            .line_starts
            .get(line as usize)
            .copied()
            .map(|o| o as usize)
            .unwrap_or(code.len());
        code[start..end].trim_end_matches(['\n', '\r']).trim()
    }
}

/// Immutable compilation input.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub code: String,
    pub lines: LineIndex,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, code: impl Into<String>) -> Self {
        let code = code.into();
        let lines = LineIndex::new(&code);
        SourceFile {
            path: path.into(),
            code,
            lines,
        }
    }

    pub fn highlight(&self, offset: u32) -> String {
        self.lines.line_text(&self.code, offset).to_string()
    }
}

/// One recorded error, position, and the source line it points at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub line: u32,
    pub highlight: String,
}

/// Kind of error, per spec.md §7. Only `Internal` is ever fatal; the driver
/// records `Syntax`/`Reference` diagnostics and keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Reference,
    Internal,
}

/// Append-only collector of non-fatal compile errors for one [`SourceFile`].
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: &SourceFile, kind: ErrorKind, offset: u32, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(kind = ?kind, %message, offset, "diagnostic recorded");
        self.entries.push(Diagnostic {
            message,
            line: file.lines.find_line(offset),
            highlight: file.highlight(offset),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }

    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_index_finds_lines() {
        let idx = LineIndex::new("aaa\nbbb\nccc");
        assert_eq!(idx.find_line(0), 1);
        assert_eq!(idx.find_line(4), 2);
        assert_eq!(idx.find_line(8), 3);
    }

    #[test]
    fn highlight_trims_line() {
        let file = SourceFile::new("x.sfc", "  let x = 1;  \n<div>{x}</div>");
        assert_eq!(file.highlight(2), "let x = 1;");
    }

    #[test]
    fn diagnostics_collect_in_order() {
        let file = SourceFile::new("x.sfc", "one\ntwo\nthree");
        let mut diags = Diagnostics::new();
        diags.push(&file, ErrorKind::Syntax, 0, "first");
        diags.push(&file, ErrorKind::Syntax, 4, "second");
        let entries = diags.into_vec();
        assert_eq!(entries[0].line, 1);
        assert_eq!(entries[1].line, 2);
    }
}
