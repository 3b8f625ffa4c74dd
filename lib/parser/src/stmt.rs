use lexer::Token;

use crate::Expr;

#[derive(Debug, Clone)]
pub enum Stmt<'src> {
    Expression(Expr<'src>),
    Print { keyword: Token<'src>, value: Expr<'src> },
    Let { name: Token<'src>, initializer: Option<Expr<'src>> },
    Block(Vec<Stmt<'src>>),
    If {
        condition: Expr<'src>,
        then_branch: Box<Stmt<'src>>,
        else_branch: Option<Box<Stmt<'src>>>,
    },
    While { condition: Expr<'src>, body: Box<Stmt<'src>> },
    Function { name: Token<'src>, params: Vec<Token<'src>>, body: Vec<Stmt<'src>> },
    Return { keyword: Token<'src>, value: Option<Expr<'src>> },
    Break(Token<'src>),
    Continue(Token<'src>),
}
