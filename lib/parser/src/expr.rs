use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use lexer::Token;

#[derive(Debug, Clone)]
pub enum Expr<'src> {
    Literal(LiteralValue),
    Variable(Token<'src>),
    Unary { operator: Token<'src>, right: Box<Expr<'src>> },
    Binary { left: Box<Expr<'src>>, operator: Token<'src>, right: Box<Expr<'src>> },
    Assign { name: Token<'src>, value: Box<Expr<'src>> },
    Call { callee: Box<Expr<'src>>, closing_paren: Token<'src>, arguments: Vec<Expr<'src>> },
}

impl Display for Expr<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(value) => write!(f, "{}", value),
            Expr::Variable(token) => write!(f, "{}", token.lexeme),
            Expr::Unary { operator, right } => write!(f, "({} {})", operator.lexeme, right),
            Expr::Binary { left, operator, right } => {
                write!(f, "({} {} {})", operator.lexeme, left, right)
            }
            Expr::Assign { name, value } => write!(f, "(assign {} {})", name.lexeme, value),
            Expr::Call { callee, arguments, .. } => {
                write!(f, "(call {} [{}])", callee, arguments.iter().join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    Str(String),
    Boolean(bool),
    Nil,
}

impl Display for LiteralValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Number(n) => write!(f, "{}", n),
            LiteralValue::Str(s) => write!(f, "{:?}", s),
            LiteralValue::Boolean(b) => write!(f, "{}", b),
            LiteralValue::Nil => write!(f, "nil"),
        }
    }
}
