use std::{
    cell::RefCell,
    io::{stdin, stdout, Write},
    path::PathBuf,
    process::ExitCode,
    rc::Rc,
};

use anyhow::anyhow;
use clap::Parser;

use interpreter::{Environment, Interpreter, Value};

#[derive(clap::Parser)]
struct Args {
    /// Script to run; a REPL is started when omitted.
    file: Option<PathBuf>,
}

fn run<'src>(
    source: &'src str,
    env: &Rc<RefCell<Environment<'src>>>,
) -> anyhow::Result<Value<'src>> {
    let tokens = lexer::tokenize(source).map_err(|e| anyhow!("lex: {e}"))?;
    let ast = parser::Parser::new(&tokens).parse().map_err(|e| anyhow!("parse: {e}"))?;

    let mut stdout = stdout();
    let value = Interpreter::with_env(env.clone(), &mut stdout)
        .interpret(&ast)
        .map_err(|e| anyhow!("runtime: {e}"))?;
    Ok(value)
}

fn run_file(path: PathBuf) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&path)?;
    run(&source, &Environment::new())?;
    Ok(())
}

fn run_prompt() -> anyhow::Result<()> {
    // One environment for the whole session. Closures entered on earlier
    // lines may stay reachable through it, so every line is kept alive.
    let env = Environment::new();
    loop {
        print!("> ");
        stdout().flush()?;

        let mut line = String::new();
        if stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let line: &'static str = Box::leak(line.into_boxed_str());

        match run(line, &env) {
            Ok(Value::Nil) => (),
            Ok(value) => println!("{}", value),
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = match args.file {
        Some(file) => run_file(file),
        None => run_prompt(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
