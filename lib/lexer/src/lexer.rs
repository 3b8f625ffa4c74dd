use span::Span;

mod token;
pub use token::{Token, TokenKind};

use TokenKind::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind} at {span}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LexErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedCharacter(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("malformed number `{0}`")]
    MalformedNumber(String),
}

/// Scans `source` into tokens. The returned sequence always ends with a
/// single [`TokenKind::Eof`] token; the first lexical error aborts the scan.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(source).tokenize()
}

pub struct Lexer<'src> {
    source: &'src str,
    /// Byte offset of the token currently being scanned.
    start: usize,
    /// Byte offset of the next unconsumed character.
    current: usize,
    line: usize,
    col: usize,
    /// Position of the character at `start`.
    start_span: Span,
    tokens: Vec<Token<'src>>,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
            col: 1,
            start_span: Span::new(1, 1),
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token<'src>>, LexError> {
        while let Some(c) = self.begin_token() {
            match c {
                '(' => self.add_token(LeftParen),
                ')' => self.add_token(RightParen),
                '{' => self.add_token(LeftBrace),
                '}' => self.add_token(RightBrace),
                ',' => self.add_token(Comma),
                ';' => self.add_token(Semicolon),
                '+' => self.add_token(Plus),
                '-' => self.add_token(Minus),
                '*' => self.add_token(Star),

                // Maximal munch: the two-character operator wins.
                '!' => {
                    if self.consume_if_matches('=') {
                        self.add_token(BangEqual)
                    } else {
                        self.add_token(Bang)
                    }
                }
                '=' => {
                    if self.consume_if_matches('=') {
                        self.add_token(EqualEqual)
                    } else {
                        self.add_token(Equal)
                    }
                }
                '<' => {
                    if self.consume_if_matches('=') {
                        self.add_token(LessEqual)
                    } else {
                        self.add_token(Less)
                    }
                }
                '>' => {
                    if self.consume_if_matches('=') {
                        self.add_token(GreaterEqual)
                    } else {
                        self.add_token(Greater)
                    }
                }

                '/' => {
                    if self.consume_if_matches('/') {
                        // Comment, runs to end of line.
                        while !matches!(self.peek(), None | Some('\n')) {
                            self.advance();
                        }
                    } else {
                        self.add_token(Slash)
                    }
                }

                '"' => self.string()?,
                d if d.is_ascii_digit() => self.number()?,
                a if a.is_ascii_alphabetic() || a == '_' => self.identifier(),

                ' ' | '\t' | '\r' | '\n' => (),

                c => return Err(self.error(LexErrorKind::UnexpectedCharacter(c))),
            }
        }

        self.start = self.current;
        self.start_span = Span::new(self.line, self.col);
        self.add_token(Eof);
        Ok(self.tokens)
    }

    fn string(&mut self) -> Result<(), LexError> {
        // `start_span` points at the opening quote, which is where an
        // unterminated string is reported.
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => break,
                Some('\\') => {
                    let escape_span = Span::new(self.line, self.col);
                    match self.advance() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some('\\') => text.push('\\'),
                        Some('"') => text.push('"'),
                        Some(c) => {
                            return Err(LexError {
                                kind: LexErrorKind::UnexpectedCharacter(c),
                                span: escape_span,
                            })
                        }
                        None => return Err(self.error(LexErrorKind::UnterminatedString)),
                    }
                }
                Some('\n') | None => return Err(self.error(LexErrorKind::UnterminatedString)),
                Some(c) => text.push(c),
            }
        }
        self.add_token(Str(text));
        Ok(())
    }

    fn number(&mut self) -> Result<(), LexError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        if self.peek() == Some('.') {
            if !matches!(self.peek_next(), Some(c) if c.is_ascii_digit()) {
                self.advance();
                return Err(self.error(LexErrorKind::MalformedNumber(self.lexeme().to_string())));
            }
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let n = self
            .lexeme()
            .parse()
            .map_err(|_| self.error(LexErrorKind::MalformedNumber(self.lexeme().to_string())))?;
        self.add_token(Number(n));
        Ok(())
    }

    fn identifier(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        match TokenKind::keyword(self.lexeme()) {
            Some(keyword) => self.add_token(keyword),
            None => self.add_token(Identifier),
        }
    }
}

// Helpers
impl<'src> Lexer<'src> {
    /// Marks the start of the next token and consumes its first character.
    fn begin_token(&mut self) -> Option<char> {
        self.start = self.current;
        self.start_span = Span::new(self.line, self.col);
        self.advance()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.current += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.current..].chars().next()
    }

    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next()
    }

    fn consume_if_matches(&mut self, expected: char) -> bool {
        match self.peek() {
            Some(c) if c == expected => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn lexeme(&self) -> &'src str {
        &self.source[self.start..self.current]
    }

    fn add_token(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.lexeme(), self.start_span));
    }

    fn error(&self, kind: LexErrorKind) -> LexError {
        LexError { kind, span: self.start_span }
    }
}
