use lexer::{Token, TokenKind};
use span::Span;

mod expr;
mod stmt;
pub use expr::{Expr, LiteralValue};
pub use stmt::Stmt;

use TokenKind::*;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind} at {span}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error("expected {expected}, found {found}")]
    UnexpectedToken { expected: &'static str, found: String },
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    #[error("trailing input after end of program")]
    TrailingInput,
}

type Result<T> = std::result::Result<T, ParseError>;

/// Binding power of a binary operator, or `None` for non-operators.
/// Higher binds tighter; all binary operators are left-associative.
fn binding_power(kind: &TokenKind) -> Option<u8> {
    Some(match kind {
        Or => 1,
        And => 2,
        EqualEqual | BangEqual => 3,
        Less | LessEqual | Greater | GreaterEqual => 4,
        Plus | Minus => 5,
        Star | Slash => 6,
        _ => return None,
    })
}

#[derive(Debug)]
pub struct Parser<'t, 'src> {
    tokens: &'t [Token<'src>],
    current: usize,
}

impl<'t, 'src> Parser<'t, 'src> {
    /// `tokens` is expected to be a lexer-produced sequence, i.e. non-empty
    /// and containing a trailing `Eof`.
    pub fn new(tokens: &'t [Token<'src>]) -> Self {
        debug_assert!(tokens.iter().any(|t| t.kind == Eof));
        Self { tokens, current: 0 }
    }

    /// Parses the whole token sequence into the program's root block,
    /// failing fast on the first error.
    pub fn parse(mut self) -> Result<Vec<Stmt<'src>>> {
        let mut stmts = Vec::new();
        while !self.check(&Eof) {
            stmts.push(self.declaration()?);
        }

        // `check` stopped at the first Eof; anything after it was never
        // requested by any production.
        if self.current + 1 < self.tokens.len() {
            let extra = &self.tokens[self.current + 1];
            return Err(ParseError { kind: ParseErrorKind::TrailingInput, span: extra.span });
        }

        Ok(stmts)
    }

    fn declaration(&mut self) -> Result<Stmt<'src>> {
        if self.consume(&Let).is_some() {
            self.let_declaration()
        } else if self.consume(&Fn).is_some() {
            self.function_declaration()
        } else {
            self.statement()
        }
    }

    fn let_declaration(&mut self) -> Result<Stmt<'src>> {
        let name = self.consume_or_error(&Identifier, "variable name after `let`")?;

        let initializer = match self.consume(&Equal) {
            Some(_) => Some(self.expression()?),
            None => None,
        };

        self.consume_or_error(&Semicolon, "`;` after declaration")?;

        Ok(Stmt::Let { name, initializer })
    }

    fn function_declaration(&mut self) -> Result<Stmt<'src>> {
        let name = self.consume_or_error(&Identifier, "function name after `fn`")?;
        self.consume_or_error(&LeftParen, "`(` after function name")?;

        let mut params = Vec::new();
        if !self.check(&RightParen) {
            loop {
                params.push(self.consume_or_error(&Identifier, "parameter name")?);
                if self.consume(&Comma).is_none() {
                    break;
                }
            }
        }
        self.consume_or_error(&RightParen, "`)` after parameters")?;

        self.consume_or_error(&LeftBrace, "`{` before function body")?;
        let body = self.block_body()?;

        Ok(Stmt::Function { name, params, body })
    }

    fn statement(&mut self) -> Result<Stmt<'src>> {
        if let Some(keyword) = self.consume(&Print) {
            return self.print_statement(keyword);
        }

        if let Some(keyword) = self.consume(&Return) {
            let value = if self.check(&Semicolon) { None } else { Some(self.expression()?) };
            self.consume_or_error(&Semicolon, "`;` after return value")?;
            return Ok(Stmt::Return { keyword, value });
        }

        if let Some(token) = self.consume(&Break) {
            self.consume_or_error(&Semicolon, "`;` after `break`")?;
            return Ok(Stmt::Break(token));
        }

        if let Some(token) = self.consume(&Continue) {
            self.consume_or_error(&Semicolon, "`;` after `continue`")?;
            return Ok(Stmt::Continue(token));
        }

        if self.consume(&If).is_some() {
            return self.if_statement();
        }

        if self.consume(&While).is_some() {
            return self.while_statement();
        }

        if self.consume(&LeftBrace).is_some() {
            return Ok(Stmt::Block(self.block_body()?));
        }

        self.expression_statement()
    }

    fn print_statement(&mut self, keyword: Token<'src>) -> Result<Stmt<'src>> {
        let value = self.expression()?;
        self.consume_or_error(&Semicolon, "`;` after value")?;
        Ok(Stmt::Print { keyword, value })
    }

    fn if_statement(&mut self) -> Result<Stmt<'src>> {
        self.consume_or_error(&LeftParen, "`(` after `if`")?;
        let condition = self.expression()?;
        self.consume_or_error(&RightParen, "`)` after condition")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = match self.consume(&Else) {
            Some(_) => Some(Box::new(self.statement()?)),
            None => None,
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn while_statement(&mut self) -> Result<Stmt<'src>> {
        self.consume_or_error(&LeftParen, "`(` after `while`")?;
        let condition = self.expression()?;
        self.consume_or_error(&RightParen, "`)` after condition")?;

        let body = Box::new(self.statement()?);

        Ok(Stmt::While { condition, body })
    }

    /// Statements of a `{ ... }` block; the opening brace is already consumed.
    fn block_body(&mut self) -> Result<Vec<Stmt<'src>>> {
        let mut stmts = Vec::new();
        while !self.check(&RightBrace) && !self.check(&Eof) {
            stmts.push(self.declaration()?);
        }
        self.consume_or_error(&RightBrace, "`}` after block")?;
        Ok(stmts)
    }

    fn expression_statement(&mut self) -> Result<Stmt<'src>> {
        let value = self.expression()?;
        self.consume_or_error(&Semicolon, "`;` after expression")?;
        Ok(Stmt::Expression(value))
    }

    fn expression(&mut self) -> Result<Expr<'src>> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr<'src>> {
        let expr = self.binary_expr(0)?;

        if let Some(equal) = self.consume(&Equal) {
            // Right-associative, so recurse at the same level.
            let value = Box::new(self.assignment()?);

            if let Expr::Variable(name) = expr {
                return Ok(Expr::Assign { name, value });
            }

            return Err(ParseError {
                kind: ParseErrorKind::InvalidAssignmentTarget,
                span: equal.span,
            });
        }

        Ok(expr)
    }

    /// Precedence climbing: parse one unary operand, then keep consuming
    /// operators that bind at least as tightly as `min_power`, recursing
    /// with `power + 1` so equal-power operators associate to the left.
    fn binary_expr(&mut self, min_power: u8) -> Result<Expr<'src>> {
        let mut expr = self.unary()?;

        while let Some(power) = binding_power(&self.peek().kind) {
            if power < min_power {
                break;
            }
            let operator = self.advance();
            let right = Box::new(self.binary_expr(power + 1)?);
            expr = Expr::Binary { left: Box::new(expr), operator, right };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr<'src>> {
        if matches!(self.peek().kind, Minus | Bang) {
            let operator = self.advance();
            let right = Box::new(self.unary()?);
            return Ok(Expr::Unary { operator, right });
        }
        self.call()
    }

    fn call(&mut self) -> Result<Expr<'src>> {
        let mut expr = self.primary()?;

        while self.consume(&LeftParen).is_some() {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr<'src>) -> Result<Expr<'src>> {
        let mut arguments = Vec::new();

        if !self.check(&RightParen) {
            loop {
                arguments.push(self.expression()?);
                if self.consume(&Comma).is_none() {
                    break;
                }
            }
        }

        let closing_paren = self.consume_or_error(&RightParen, "`)` after arguments")?;

        Ok(Expr::Call { callee: Box::new(callee), closing_paren, arguments })
    }

    fn primary(&mut self) -> Result<Expr<'src>> {
        let token = self.advance();
        match token.kind {
            Number(n) => Ok(Expr::Literal(LiteralValue::Number(n))),
            Str(ref s) => Ok(Expr::Literal(LiteralValue::Str(s.clone()))),
            True => Ok(Expr::Literal(LiteralValue::Boolean(true))),
            False => Ok(Expr::Literal(LiteralValue::Boolean(false))),
            Nil => Ok(Expr::Literal(LiteralValue::Nil)),
            Identifier => Ok(Expr::Variable(token)),
            LeftParen => {
                // Parenthesized expressions reduce to the inner expression.
                let expr = self.expression()?;
                self.consume_or_error(&RightParen, "`)` after expression")?;
                Ok(expr)
            }
            _ => Err(Self::unexpected("expression", &token)),
        }
    }
}

// Helpers
impl<'t, 'src> Parser<'t, 'src> {
    fn peek(&self) -> &'t Token<'src> {
        // The parser never advances past Eof, so the clamp only matters for
        // malformed caller-built token sequences.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token<'src> {
        let token = self.peek().clone();
        if token.kind != Eof {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        debug_assert!(!matches!(kind, Number(_) | Str(_)));
        &self.peek().kind == kind
    }

    fn consume(&mut self, kind: &TokenKind) -> Option<Token<'src>> {
        self.check(kind).then(|| self.advance())
    }

    fn consume_or_error(&mut self, kind: &TokenKind, expected: &'static str) -> Result<Token<'src>> {
        self.consume(kind).ok_or_else(|| Self::unexpected(expected, self.peek()))
    }

    fn unexpected(expected: &'static str, found: &Token) -> ParseError {
        ParseError {
            kind: ParseErrorKind::UnexpectedToken { expected, found: found.to_string() },
            span: found.span,
        }
    }
}
