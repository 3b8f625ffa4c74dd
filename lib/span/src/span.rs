use std::fmt::{Display, Formatter};

/// 1-based source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line(pub usize);

impl Display for Line {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 1-based source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Col(pub usize);

impl Display for Col {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a token or error in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: Line,
    pub col: Col,
}

impl Span {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line: Line(line), col: Col(col) }
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}
