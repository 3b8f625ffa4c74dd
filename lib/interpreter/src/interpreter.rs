use std::{cell::RefCell, io::Write, rc::Rc};

use itertools::Itertools;
use lexer::{Token, TokenKind};
use parser::{Expr, LiteralValue, Stmt};
use span::Span;

mod environment;
mod value;
pub use environment::Environment;
pub use value::{Function, Value};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind} at {span}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub span: Span,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    #[error("type mismatch: `{operator}` not supported on {operands}")]
    TypeMismatch { operator: String, operands: String },
    #[error("division by zero")]
    DivisionByZero,
    #[error("arity mismatch: expected {expected} argument(s), got {got}")]
    ArityMismatch { expected: usize, got: usize },
    #[error("`break` outside of a loop")]
    UnhandledBreak,
    #[error("`continue` outside of a loop")]
    UnhandledContinue,
    #[error("value of type {0} is not callable")]
    NotCallable(&'static str),
    #[error("could not write output: {0}")]
    Io(String),
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// Outcome of executing one statement. `return`/`break`/`continue` travel
/// as explicit signals through enclosing blocks and loops, never as errors
/// or unwinding. Break/Continue carry the position of their keyword so an
/// unhandled signal can be reported where it was raised.
#[derive(Debug)]
pub enum Signal<'src> {
    Normal,
    Return(Value<'src>),
    Break(Span),
    Continue(Span),
}

pub struct Interpreter<'src, 'out> {
    env: Rc<RefCell<Environment<'src>>>,
    output: &'out mut dyn Write,
}

impl<'src, 'out> Interpreter<'src, 'out> {
    /// An interpreter over a fresh root environment. `print` statements
    /// write to `output`.
    pub fn new(output: &'out mut dyn Write) -> Self {
        Self::with_env(Environment::new(), output)
    }

    /// An interpreter over a caller-supplied root environment, e.g. a REPL
    /// keeping bindings alive across inputs.
    pub fn with_env(env: Rc<RefCell<Environment<'src>>>, output: &'out mut dyn Write) -> Self {
        Self { env, output }
    }

    /// Executes the program's root block. Returns the value of the last
    /// top-level expression statement (`nil` if there was none), or the
    /// value of a top-level `return`.
    pub fn interpret(&mut self, stmts: &[Stmt<'src>]) -> Result<Value<'src>> {
        let mut last = Value::Nil;
        for stmt in stmts {
            if let Stmt::Expression(expr) = stmt {
                last = self.evaluate(expr)?;
                continue;
            }
            match self.execute(stmt)? {
                Signal::Normal => (),
                Signal::Return(value) => return Ok(value),
                Signal::Break(span) => {
                    return Err(RuntimeError { kind: RuntimeErrorKind::UnhandledBreak, span })
                }
                Signal::Continue(span) => {
                    return Err(RuntimeError { kind: RuntimeErrorKind::UnhandledContinue, span })
                }
            }
        }
        Ok(last)
    }

    fn execute(&mut self, stmt: &Stmt<'src>) -> Result<Signal<'src>> {
        log::trace!("execute: {:?}", stmt);
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Signal::Normal)
            }

            Stmt::Print { keyword, value } => {
                let value = self.evaluate(value)?;
                writeln!(self.output, "{}", value).map_err(|e| RuntimeError {
                    kind: RuntimeErrorKind::Io(e.to_string()),
                    span: keyword.span,
                })?;
                Ok(Signal::Normal)
            }

            Stmt::Let { name, initializer } => {
                let value = match initializer {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                self.env.borrow_mut().define(name.lexeme, value);
                Ok(Signal::Normal)
            }

            Stmt::Block(stmts) => {
                let scope = Environment::with_parent(self.env.clone());
                self.execute_block(stmts, scope)
            }

            Stmt::If { condition, then_branch, else_branch } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::Normal | Signal::Continue(_) => (),
                        Signal::Break(_) => break,
                        signal @ Signal::Return(_) => return Ok(signal),
                    }
                }
                Ok(Signal::Normal)
            }

            Stmt::Function { name, params, body } => {
                // The function is defined into its own closure scope, so
                // its name resolves during recursive calls.
                let function = Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    closure: self.env.clone(),
                };
                self.env.borrow_mut().define(name.lexeme, Value::Function(Rc::new(function)));
                Ok(Signal::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }

            Stmt::Break(token) => Ok(Signal::Break(token.span)),
            Stmt::Continue(token) => Ok(Signal::Continue(token.span)),
        }
    }

    /// Runs `stmts` with `scope` as the innermost environment, restoring
    /// the previous environment afterwards even on error.
    fn execute_block(
        &mut self,
        stmts: &[Stmt<'src>],
        scope: Rc<RefCell<Environment<'src>>>,
    ) -> Result<Signal<'src>> {
        let previous = std::mem::replace(&mut self.env, scope);
        let result = self.run_block(stmts);
        self.env = previous;
        result
    }

    fn run_block(&mut self, stmts: &[Stmt<'src>]) -> Result<Signal<'src>> {
        for stmt in stmts {
            match self.execute(stmt)? {
                Signal::Normal => (),
                signal => return Ok(signal),
            }
        }
        Ok(Signal::Normal)
    }

    fn evaluate(&mut self, expr: &Expr<'src>) -> Result<Value<'src>> {
        match expr {
            Expr::Literal(LiteralValue::Number(n)) => Ok((*n).into()),
            Expr::Literal(LiteralValue::Str(s)) => Ok(s.clone().into()),
            Expr::Literal(LiteralValue::Boolean(b)) => Ok((*b).into()),
            Expr::Literal(LiteralValue::Nil) => Ok(Value::Nil),

            Expr::Variable(token) => {
                self.env.borrow().get(token.lexeme).ok_or_else(|| RuntimeError {
                    kind: RuntimeErrorKind::UndefinedVariable(token.lexeme.to_string()),
                    span: token.span,
                })
            }

            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                if self.env.borrow_mut().assign(name.lexeme, value.clone()) {
                    Ok(value)
                } else {
                    Err(RuntimeError {
                        kind: RuntimeErrorKind::UndefinedVariable(name.lexeme.to_string()),
                        span: name.span,
                    })
                }
            }

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match (&operator.kind, right) {
                    (TokenKind::Minus, Value::Number(n)) => Ok((-n).into()),
                    (TokenKind::Minus, v) => Err(type_mismatch(operator, &[&v])),
                    (TokenKind::Bang, v) => Ok((!v.is_truthy()).into()),
                    _ => unreachable!("parser only emits `-` and `!` unary operators"),
                }
            }

            Expr::Binary { left, operator, right } => self.binary(left, operator, right),

            Expr::Call { callee, closing_paren, arguments } => {
                let callee = self.evaluate(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }
                self.call(callee, args, closing_paren)
            }
        }
    }

    fn binary(
        &mut self,
        left: &Expr<'src>,
        operator: &Token<'src>,
        right: &Expr<'src>,
    ) -> Result<Value<'src>> {
        use TokenKind::*;

        // `and`/`or` short-circuit, so the right operand must not be
        // evaluated eagerly.
        match operator.kind {
            And => {
                if !self.evaluate(left)?.is_truthy() {
                    return Ok(false.into());
                }
                return Ok(self.evaluate(right)?.is_truthy().into());
            }
            Or => {
                if self.evaluate(left)?.is_truthy() {
                    return Ok(true.into());
                }
                return Ok(self.evaluate(right)?.is_truthy().into());
            }
            _ => (),
        }

        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        match (&left, &right, &operator.kind) {
            (Value::Number(l), Value::Number(r), Plus) => Ok((l + r).into()),
            (Value::Str(l), Value::Str(r), Plus) => Ok(format!("{l}{r}").into()),
            (Value::Number(l), Value::Number(r), Minus) => Ok((l - r).into()),
            (Value::Number(l), Value::Number(r), Star) => Ok((l * r).into()),
            (Value::Number(l), Value::Number(r), Slash) => {
                if *r == 0.0 {
                    Err(RuntimeError {
                        kind: RuntimeErrorKind::DivisionByZero,
                        span: operator.span,
                    })
                } else {
                    Ok((l / r).into())
                }
            }

            (Value::Number(l), Value::Number(r), Less) => Ok((l < r).into()),
            (Value::Number(l), Value::Number(r), LessEqual) => Ok((l <= r).into()),
            (Value::Number(l), Value::Number(r), Greater) => Ok((l > r).into()),
            (Value::Number(l), Value::Number(r), GreaterEqual) => Ok((l >= r).into()),

            (_, _, EqualEqual) => Ok((left == right).into()),
            (_, _, BangEqual) => Ok((left != right).into()),

            (_, _, Plus | Minus | Star | Slash | Less | LessEqual | Greater | GreaterEqual) => {
                Err(type_mismatch(operator, &[&left, &right]))
            }

            _ => unreachable!("parser only emits binary operator tokens"),
        }
    }

    fn call(
        &mut self,
        callee: Value<'src>,
        args: Vec<Value<'src>>,
        closing_paren: &Token<'src>,
    ) -> Result<Value<'src>> {
        let function = match callee {
            Value::Function(function) => function,
            other => {
                return Err(RuntimeError {
                    kind: RuntimeErrorKind::NotCallable(other.type_name()),
                    span: closing_paren.span,
                })
            }
        };

        if args.len() != function.params.len() {
            return Err(RuntimeError {
                kind: RuntimeErrorKind::ArityMismatch {
                    expected: function.params.len(),
                    got: args.len(),
                },
                span: closing_paren.span,
            });
        }

        // Lexical scoping: the activation is parented to the scope the
        // function was declared in, not the caller's.
        let scope = Environment::with_parent(function.closure.clone());
        for (param, arg) in function.params.iter().zip(args) {
            scope.borrow_mut().define(param.lexeme, arg);
        }

        match self.execute_block(&function.body, scope)? {
            Signal::Normal => Ok(Value::Nil),
            Signal::Return(value) => Ok(value),
            Signal::Break(span) => {
                Err(RuntimeError { kind: RuntimeErrorKind::UnhandledBreak, span })
            }
            Signal::Continue(span) => {
                Err(RuntimeError { kind: RuntimeErrorKind::UnhandledContinue, span })
            }
        }
    }
}

fn type_mismatch(operator: &Token, operands: &[&Value]) -> RuntimeError {
    RuntimeError {
        kind: RuntimeErrorKind::TypeMismatch {
            operator: operator.lexeme.to_string(),
            operands: operands.iter().map(|v| v.type_name()).join(" and "),
        },
        span: operator.span,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// Runs the full pipeline and returns the final value plus everything
    /// `print` wrote.
    fn run(source: &str) -> std::result::Result<(Value<'_>, String), RuntimeError> {
        let tokens = lexer::tokenize(source).unwrap();
        let stmts = parser::Parser::new(&tokens).parse().unwrap();
        let mut output = Vec::new();
        let value = Interpreter::new(&mut output).interpret(&stmts)?;
        Ok((value, String::from_utf8(output).unwrap()))
    }

    fn value(source: &str) -> Value<'_> {
        run(source).unwrap().0
    }

    fn output(source: &str) -> String {
        run(source).unwrap().1
    }

    fn error(source: &str) -> RuntimeError {
        run(source).unwrap_err()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(value("1+2*3;"), Value::Number(7.0));
        assert_eq!(value("(1+2)*3;"), Value::Number(9.0));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let source = "let x = 2; fn sq(n) { return n * n; } sq(x) + sq(3);";
        assert_eq!(value(source), value(source));
        assert_eq!(value(source), Value::Number(13.0));
    }

    #[test]
    fn last_expression_value_is_returned() {
        assert_eq!(value("let a = 2; a * 3;"), Value::Number(6.0));
        assert_eq!(value("let a = 2;"), Value::Nil);
    }

    #[test]
    fn shadowing_does_not_leak() {
        assert_eq!(output("{ let x = 1; { let x = 2; } print x; }"), "1\n");
    }

    #[test]
    fn assignment_mutates_the_nearest_existing_binding() {
        assert_eq!(output("let x = 1; { x = 2; } print x;"), "2\n");
    }

    #[test]
    fn assignment_never_declares() {
        assert_eq!(error("x = 1;").kind, RuntimeErrorKind::UndefinedVariable("x".to_string()));
    }

    #[test]
    fn undefined_variable() {
        let error = error("print y;");
        assert_eq!(error.kind, RuntimeErrorKind::UndefinedVariable("y".to_string()));
        assert_eq!(error.span, Span::new(1, 7));
    }

    #[test]
    fn division_by_zero() {
        let error = error("1/0;");
        assert_eq!(error.kind, RuntimeErrorKind::DivisionByZero);
        assert_eq!(error.span, Span::new(1, 2));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(value(r#""foo" + "bar";"#), Value::from("foobar"));
        assert_eq!(
            error(r#"1 + "a";"#).kind,
            RuntimeErrorKind::TypeMismatch {
                operator: "+".to_string(),
                operands: "Number and Str".to_string(),
            }
        );
    }

    #[test]
    fn comparison_requires_numbers() {
        assert_eq!(value("1 < 2;"), Value::Bool(true));
        assert!(matches!(
            error(r#""a" < 1;"#).kind,
            RuntimeErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn equality_works_across_kinds() {
        assert_eq!(value("1 == 1;"), Value::Bool(true));
        assert_eq!(value(r#"1 == "1";"#), Value::Bool(false));
        assert_eq!(value("nil == nil;"), Value::Bool(true));
        assert_eq!(value("nil != false;"), Value::Bool(true));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(value("-(1+2);"), Value::Number(-3.0));
        assert_eq!(value("!nil;"), Value::Bool(true));
        assert!(matches!(error("-true;").kind, RuntimeErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn logical_operators_short_circuit() {
        // boom() would fail, so these only pass if it is never called.
        let prelude = "fn boom() { return 1/0; }";
        assert_eq!(value(&format!("{prelude} true or boom();")), Value::Bool(true));
        assert_eq!(value(&format!("{prelude} false and boom();")), Value::Bool(false));
        assert_eq!(value("1 and 2;"), Value::Bool(true));
    }

    #[test]
    fn while_with_break_and_continue() {
        let source = "
            let i = 0;
            let n = 0;
            while (true) {
                i = i + 1;
                if (i > 5) break;
                if (i == 3) continue;
                n = n + i;
            }
            print n;
        ";
        assert_eq!(output(source), "12\n");
    }

    #[test]
    fn unhandled_break_and_continue() {
        assert_eq!(error("break;").kind, RuntimeErrorKind::UnhandledBreak);
        assert_eq!(error("{ continue; }").kind, RuntimeErrorKind::UnhandledContinue);
        // A function body is not an enclosing loop.
        assert_eq!(
            error("while (true) { fn f() { break; } f(); }").kind,
            RuntimeErrorKind::UnhandledBreak
        );
    }

    #[test]
    fn recursion() {
        let source = "
            fn fib(n) {
                if (n <= 1) return n;
                return fib(n - 2) + fib(n - 1);
            }
            print fib(10);
        ";
        assert_eq!(output(source), "55\n");
    }

    #[test]
    fn return_unwinds_through_loops_and_blocks() {
        let source = "
            fn f() {
                while (true) {
                    { return 42; }
                }
            }
            print f();
        ";
        assert_eq!(output(source), "42\n");
    }

    #[test]
    fn function_without_return_yields_nil() {
        assert_eq!(value("fn f() {} f();"), Value::Nil);
    }

    #[test]
    fn top_level_return_ends_the_program() {
        assert_eq!(value("return 5; print 1;"), Value::Number(5.0));
    }

    #[test]
    fn closures_capture_their_defining_scope() {
        let source = "
            fn make_counter() {
                let count = 0;
                fn inc() {
                    count = count + 1;
                    return count;
                }
                return inc;
            }
            let c = make_counter();
            c();
            c();
            print c();
        ";
        assert_eq!(output(source), "3\n");
    }

    #[test]
    fn scoping_is_lexical_not_dynamic() {
        // `x` exists at the call site but not in the scope `f` was
        // declared in.
        let source = "
            fn f() { print x; }
            {
                let x = 1;
                f();
            }
        ";
        assert_eq!(error(source).kind, RuntimeErrorKind::UndefinedVariable("x".to_string()));
    }

    #[test]
    fn arity_mismatch() {
        assert_eq!(
            error("fn f(a) { return a; } f(1, 2);").kind,
            RuntimeErrorKind::ArityMismatch { expected: 1, got: 2 }
        );
    }

    #[test]
    fn calling_a_non_function() {
        assert_eq!(error("1();").kind, RuntimeErrorKind::NotCallable("Number"));
    }

    #[test]
    fn let_without_initializer_binds_nil() {
        assert_eq!(output("let x; print x;"), "nil\n");
    }

    #[test]
    fn repl_style_environment_reuse() {
        let first = lexer::tokenize("let x = 1;").unwrap();
        let second = lexer::tokenize("x + 1;").unwrap();
        let first = parser::Parser::new(&first).parse().unwrap();
        let second = parser::Parser::new(&second).parse().unwrap();

        let env = Environment::new();
        let mut output = Vec::new();
        Interpreter::with_env(env.clone(), &mut output).interpret(&first).unwrap();
        let value = Interpreter::with_env(env, &mut output).interpret(&second).unwrap();
        assert_eq!(value, Value::Number(2.0));
    }
}
