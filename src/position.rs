//! Output assembly with position tracking.
//!
//! Edits are collected first and applied once, in source order, against the
//! untouched original text. Every output segment is either copied from a
//! source span (and keeps that span's original coordinates) or synthetic.

use crate::markup::{LineIndex, Span};
use sourcemap::{SourceMap, SourceMapBuilder};

/// The document being rewritten plus its line table.
#[derive(Debug, Clone)]
pub struct SourceFile<'a> {
    pub name: &'a str,
    pub text: &'a str,
    lines: LineIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    pub offset: usize,
    /// Zero-based.
    pub line: u32,
    /// Zero-based, in UTF-16 code units.
    pub column: u32,
}

impl<'a> SourceFile<'a> {
    pub fn new(name: &'a str, text: &'a str) -> Self {
        Self {
            name,
            text,
            lines: LineIndex::new(text),
        }
    }

    pub fn position(&self, offset: usize) -> SourcePosition {
        let (line, column) = self.lines.position(self.text, offset);
        SourcePosition {
            offset,
            line,
            column,
        }
    }

    /// One-based `(line, column)` for messages.
    pub fn location(&self, offset: usize) -> (u32, u32) {
        let position = self.position(offset);
        (position.line + 1, position.column + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Source(Span),
    Synthetic(String),
}

impl Piece {
    pub fn synthetic(text: impl Into<String>) -> Self {
        Piece::Synthetic(text.into())
    }
}

/// Removes `span` from the output and emits `insert` in its place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub insert: Vec<Piece>,
}

impl Edit {
    pub fn remove(span: Span) -> Self {
        Self {
            span,
            insert: Vec::new(),
        }
    }

    pub fn replace(span: Span, insert: Vec<Piece>) -> Self {
        Self { span, insert }
    }

    pub fn insert_at(offset: usize, insert: Vec<Piece>) -> Self {
        Self {
            span: Span::new(offset, offset),
            insert,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub output_offset: usize,
    /// `None` for synthetic text.
    pub origin: Option<SourcePosition>,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionMap {
    segments: Vec<Segment>,
    output_len: usize,
}

impl PositionMap {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn code(&self) -> String {
        let mut code = String::with_capacity(self.output_len);
        for segment in &self.segments {
            code.push_str(&segment.text);
        }
        code
    }

    fn push_source(&mut self, source: &SourceFile<'_>, span: Span) {
        if span.is_empty() {
            return;
        }
        self.push(Some(source.position(span.start)), span.text(source.text).to_string());
    }

    fn push_synthetic(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        self.push(None, text);
    }

    fn push(&mut self, origin: Option<SourcePosition>, text: String) {
        let output_offset = self.output_len;
        self.output_len += text.len();
        self.segments.push(Segment {
            output_offset,
            origin,
            text,
        });
    }

    /// Builds a standard source map with one mapping per segment start and per
    /// line start inside copied segments.
    pub fn to_source_map(&self, source: &SourceFile<'_>, file: Option<&str>) -> SourceMap {
        let mut builder = SourceMapBuilder::new(file);
        let source_id = builder.add_source(source.name);
        builder.set_source_contents(source_id, Some(source.text));

        let mut dst_line = 0u32;
        let mut dst_col = 0u32;
        for segment in &self.segments {
            match segment.origin {
                Some(origin) => {
                    builder.add_raw(
                        dst_line,
                        dst_col,
                        origin.line,
                        origin.column,
                        Some(source_id),
                        None,
                        false,
                    );
                    let mut src_line = origin.line;
                    for (idx, ch) in segment.text.char_indices() {
                        if ch == '\n' {
                            dst_line += 1;
                            dst_col = 0;
                            src_line += 1;
                            if idx + 1 < segment.text.len() {
                                builder.add_raw(dst_line, 0, src_line, 0, Some(source_id), None, false);
                            }
                        } else {
                            dst_col += ch.len_utf16() as u32;
                        }
                    }
                }
                None => {
                    builder.add_raw(dst_line, dst_col, 0, 0, None, None, false);
                    for ch in segment.text.chars() {
                        if ch == '\n' {
                            dst_line += 1;
                            dst_col = 0;
                        } else {
                            dst_col += ch.len_utf16() as u32;
                        }
                    }
                }
            }
        }

        builder.into_sourcemap()
    }
}

/// Applies non-overlapping edits to the original text in one forward pass.
pub fn apply_edits(source: &SourceFile<'_>, mut edits: Vec<Edit>) -> PositionMap {
    edits.sort_by_key(|edit| (edit.span.start, edit.span.end));
    let mut map = PositionMap::default();
    let mut cursor = 0usize;
    for edit in edits {
        let start = edit.span.start.max(cursor);
        map.push_source(source, Span::new(cursor, start));
        for piece in edit.insert {
            match piece {
                Piece::Source(span) => map.push_source(source, span),
                Piece::Synthetic(text) => map.push_synthetic(text),
            }
        }
        cursor = edit.span.end.max(start);
    }
    map.push_source(source, Span::new(cursor, source.text.len()));
    map
}
