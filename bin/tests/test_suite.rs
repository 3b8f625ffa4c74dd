use interpreter::Interpreter;
use itertools::Itertools;
use lazy_regex::regex;
use pretty_assertions::assert_eq;

#[ctor::ctor]
fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Runs `code` and checks it against its own `// expect:`,
/// `// lex error:`, `// parse error:` and `// runtime error:` comment
/// annotations. Error annotations match the error kind's message, without
/// the position suffix.
fn simp_expect(code: &str) {
    let expect_re = regex!(r"// expect: (.*)");
    let lex_re = regex!(r"// lex error: (.*)");
    let parse_re = regex!(r"// parse error: (.*)");
    let runtime_re = regex!(r"// runtime error: (.*)");

    let mut expected_output = Vec::new();
    let mut expected_lex_error = None;
    let mut expected_parse_error = None;
    let mut expected_runtime_error = None;

    for line in code.lines() {
        if let Some(cap) = lex_re.captures(line) {
            expected_lex_error = Some(cap[1].to_string());
        } else if let Some(cap) = parse_re.captures(line) {
            expected_parse_error = Some(cap[1].to_string());
        } else if let Some(cap) = runtime_re.captures(line) {
            expected_runtime_error = Some(cap[1].to_string());
        } else if let Some(cap) = expect_re.captures(line) {
            expected_output.push(cap[1].to_string());
        }
    }

    let tokens = match lexer::tokenize(code) {
        Ok(tokens) => {
            assert_eq!(expected_lex_error, None, "expected a lex error but lexing succeeded");
            tokens
        }
        Err(e) => {
            assert_eq!(Some(e.kind.to_string()), expected_lex_error);
            return;
        }
    };

    let ast = match parser::Parser::new(&tokens).parse() {
        Ok(ast) => {
            assert_eq!(expected_parse_error, None, "expected a parse error but parsing succeeded");
            ast
        }
        Err(e) => {
            assert_eq!(Some(e.kind.to_string()), expected_parse_error);
            return;
        }
    };

    let mut output = Vec::new();
    match Interpreter::new(&mut output).interpret(&ast) {
        Ok(_) => {
            assert_eq!(expected_runtime_error, None, "expected a runtime error but none occurred");
        }
        Err(e) => {
            assert_eq!(Some(e.kind.to_string()), expected_runtime_error);
        }
    }

    assert_eq!(
        String::from_utf8(output).unwrap().lines().collect_vec(),
        expected_output,
        "actual output (left) does not match expected output (right)"
    );
}

#[test]
fn hello_world() {
    simp_expect(r#"
        print "hello world"; // expect: hello world
    "#);
}

#[test]
fn arithmetic_precedence() {
    simp_expect(r#"
        print 1 + 2 * 3;     // expect: 7
        print (1 + 2) * 3;   // expect: 9
        print 10 - 2 - 3;    // expect: 5
        print -2 * 3;        // expect: -6
        print 7 / 2;         // expect: 3.5
    "#);
}

#[test]
fn comparisons_and_logic() {
    simp_expect(r#"
        print 1 < 2;                 // expect: true
        print 2 <= 1;                // expect: false
        print 1 + 1 == 2;            // expect: true
        print "a" + "b" == "ab";     // expect: true
        print true and nil;          // expect: false
        print false or 1;            // expect: true
    "#);
}

#[test]
fn variables_and_shadowing() {
    simp_expect(r#"
        let x = 1;
        {
            let x = 2;
            print x;   // expect: 2
        }
        print x;       // expect: 1
        x = x + 41;
        print x;       // expect: 42
    "#);
}

#[test]
fn if_else() {
    simp_expect(r#"
        let x = 3;
        if (x > 2) print "big"; else print "small";   // expect: big
        if (x > 10) print "unreached";
        if (nil) print "unreached"; else print "nil is falsy"; // expect: nil is falsy
    "#);
}

#[test]
fn while_loop_with_break_and_continue() {
    simp_expect(r#"
        let i = 0;
        while (true) {
            i = i + 1;
            if (i == 2) continue;
            if (i > 3) break;
            print i;
        }
        // expect: 1
        // expect: 3
    "#);
}

#[test]
fn functions_and_closures() {
    simp_expect(r#"
        fn greet(name) {
            print "hi " + name;
        }
        greet("simp");   // expect: hi simp

        fn make_adder(n) {
            fn add(m) { return n + m; }
            return add;
        }
        let add2 = make_adder(2);
        print add2(40);  // expect: 42

        fn fib(n) {
            if (n <= 1) return n;
            return fib(n - 2) + fib(n - 1);
        }
        print fib(10);   // expect: 55
    "#);
}

#[test]
fn output_before_a_runtime_error_is_kept() {
    simp_expect(r#"
        print "before";   // expect: before
        print 1 / 0;      // runtime error: division by zero
        print "after";
    "#);
}

#[test]
fn undefined_variable() {
    simp_expect(r#"
        print y; // runtime error: undefined variable `y`
    "#);
}

#[test]
fn arity_mismatch() {
    simp_expect(r#"
        fn f(a, b) { return a; }
        f(1); // runtime error: arity mismatch: expected 2 argument(s), got 1
    "#);
}

#[test]
fn lexical_scoping() {
    simp_expect(r#"
        fn f() { print x; }
        {
            let x = 1;
            f(); // runtime error: undefined variable `x`
        }
    "#);
}

#[test]
fn unterminated_string() {
    // The string swallows the rest of the file, annotation included, so
    // the expectation is checked separately.
    let error = lexer::tokenize("print \"abc").unwrap_err();
    assert_eq!(error.kind.to_string(), "unterminated string");
    assert_eq!((error.span.line.0, error.span.col.0), (1, 7));
}

#[test]
fn lex_error() {
    simp_expect(r#"
        let a = 1 @ 2; // lex error: unexpected character '@'
    "#);
}

#[test]
fn parse_error() {
    simp_expect(r#"
        print 1 // parse error: expected `;` after value, found `}`
        }
    "#);
}

#[test]
fn driver_style_error_formatting() {
    // The CLI prefixes the stage and the error Display carries the
    // position, giving `<stage>: <message> at line L, column C`.
    let error = lexer::tokenize("let x = $;").unwrap_err();
    assert_eq!(
        format!("lex: {error}"),
        "lex: unexpected character '$' at line 1, column 9"
    );

    let tokens = lexer::tokenize("let x 1;").unwrap();
    let error = parser::Parser::new(&tokens).parse().unwrap_err();
    assert_eq!(
        format!("parse: {error}"),
        "parse: expected `;` after declaration, found `1` at line 1, column 7"
    );

    let tokens = lexer::tokenize("1/0;").unwrap();
    let ast = parser::Parser::new(&tokens).parse().unwrap();
    let mut output = Vec::new();
    let error = Interpreter::new(&mut output).interpret(&ast).unwrap_err();
    assert_eq!(format!("runtime: {error}"), "runtime: division by zero at line 1, column 2");
}
