use std::{cell::RefCell, fmt, rc::Rc};

use lexer::Token;
use parser::Stmt;

use crate::environment::Environment;

#[derive(Debug, Clone)]
pub enum Value<'src> {
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
    Function(Rc<Function<'src>>),
}

/// A user-declared function together with the environment it was declared
/// in. Free variables resolve through `closure`, not the caller's scope.
#[derive(Debug)]
pub struct Function<'src> {
    pub name: Token<'src>,
    pub params: Vec<Token<'src>>,
    pub body: Vec<Stmt<'src>>,
    pub closure: Rc<RefCell<Environment<'src>>>,
}

impl Value<'_> {
    /// `nil` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Str(_) => "Str",
            Value::Bool(_) => "Bool",
            Value::Nil => "Nil",
            Value::Function(_) => "Function",
        }
    }
}

impl PartialEq for Value<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(l), Value::Number(r)) => l == r,
            (Value::Str(l), Value::Str(r)) => l == r,
            (Value::Bool(l), Value::Bool(r)) => l == r,
            (Value::Nil, Value::Nil) => true,
            // Functions compare by identity.
            (Value::Function(l), Value::Function(r)) => Rc::ptr_eq(l, r),
            _ => false,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Nil => write!(f, "nil"),
            Value::Function(function) => write!(f, "<fn {}>", function.name.lexeme),
        }
    }
}

impl From<f64> for Value<'_> {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<String> for Value<'_> {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value<'_> {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<bool> for Value<'_> {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
