use std::fmt::{Display, Formatter};

use span::{Col, Line, Span};

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub lexeme: &'src str,
    pub span: Span,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, lexeme: &'src str, span: Span) -> Token<'src> {
        Self { kind, lexeme, span }
    }

    pub fn line(&self) -> Line {
        self.span.line
    }

    pub fn col(&self) -> Col {
        self.span.col
    }
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.kind == TokenKind::Eof {
            write!(f, "end of input")
        } else {
            write!(f, "`{}`", self.lexeme)
        }
    }
}

#[derive(Debug, Clone, PartialEq, strum_macros::Display)]
pub enum TokenKind {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Semicolon,
    Plus,
    Minus,
    Star,
    Slash,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,

    // Literals. String payloads are owned because escape sequences are
    // decoded during the scan, so the text may differ from the lexeme.
    Identifier,
    Str(String),
    Number(f64),

    // Keywords.
    And,
    Break,
    Continue,
    Else,
    False,
    Fn,
    If,
    Let,
    Nil,
    Or,
    Print,
    Return,
    True,
    While,

    Eof,
}

impl TokenKind {
    pub(crate) fn keyword(ident: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match ident {
            "and" => And,
            "break" => Break,
            "continue" => Continue,
            "else" => Else,
            "false" => False,
            "fn" => Fn,
            "if" => If,
            "let" => Let,
            "nil" => Nil,
            "or" => Or,
            "print" => Print,
            "return" => Return,
            "true" => True,
            "while" => While,
            _ => return None,
        })
    }
}
