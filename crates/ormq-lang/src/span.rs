//! Source locations for error reporting.

use std::ops::Range;

/// A byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A value tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    /// Create a new spanned value.
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    /// Map the inner value, keeping the span.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Spanned<U> {
        Spanned {
            value: f(self.value),
            span: self.span,
        }
    }
}

/// 1-based line and column of a byte offset.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;

    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Render `message` with the offending source line and a caret under `span`.
pub(crate) fn render(source: &str, span: Span, header: &str) -> String {
    let (line, col) = offset_to_line_col(source, span.start);
    let mut out = format!("{}\n  --> line {}:{}\n", header, line, col);

    if let Some(text) = source.lines().nth(line - 1) {
        out.push_str(&format!("   |\n{:3}| {}\n   | ", line, text));
        out.push_str(&" ".repeat(col - 1));
        out.push('^');

        let room = text.chars().count().saturating_sub(col);
        let width = span.len().saturating_sub(1).min(room);
        out.push_str(&"~".repeat(width));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let merged = Span::new(5, 10).merge(Span::new(8, 15));
        assert_eq!(merged, Span::new(5, 15));
        assert_eq!(merged.len(), 10);
    }

    #[test]
    fn test_line_col() {
        let source = "select m\nfrom Member m\nwhere";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 7), (1, 8));
        assert_eq!(offset_to_line_col(source, 9), (2, 1));
        assert_eq!(offset_to_line_col(source, 23), (3, 1));
    }

    #[test]
    fn test_render_caret() {
        let rendered = render("select m fron Member m", Span::new(9, 13), "error: oops");
        assert!(rendered.contains("line 1:10"));
        assert!(rendered.contains("         ^~~~"));
    }
}
