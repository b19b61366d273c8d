use std::{
    cell::RefCell,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    rc::Rc,
};

use bhilal::{
    tree_walk_interpreter::{Interpreter, InterpreterOptions},
    InterpretError,
};
use clap::{Args, Parser, Subcommand};

/// The evaluator grows its stack on demand but the parser does not, so
/// deeply nested source still runs on a large stack.
const INTERPRETER_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(name = "bhilal", version, about = "Interpréteur du langage Bhilal")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Script to run; starts the interactive prompt when absent.
    file: Option<PathBuf>,

    #[command(flatten)]
    options: GlobalOptions,
}

impl Cli {
    pub fn command(&self) -> Command {
        match (&self.command, &self.file) {
            (Some(command), _) => command.clone(),
            (None, Some(file)) => Command::Run(FileArgs { file: file.clone() }),
            (None, None) => Command::Repl,
        }
    }
}

#[derive(Debug, Args)]
struct GlobalOptions {
    /// Directory containing the native scanning tools.
    #[arg(long, env = "BHILAL_TOOLS_DIR", global = true)]
    tools_dir: Option<PathBuf>,

    /// Maximum nesting of function calls, method calls and includes.
    #[arg(long, default_value_t = 512, global = true)]
    max_call_depth: usize,
}

impl GlobalOptions {
    fn interpreter_options(&self) -> InterpreterOptions {
        let defaults = InterpreterOptions::default();
        InterpreterOptions {
            tools_dir: self.tools_dir.clone().unwrap_or(defaults.tools_dir),
            max_call_depth: self.max_call_depth,
            ..defaults
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run a script file.
    Run(FileArgs),
    /// Start the interactive prompt.
    Repl,
    /// Print the token stream of a file.
    Tokens(FileArgs),
    /// Print the parsed program of a file.
    Ast(FileArgs),
}

#[derive(Debug, Clone, Args)]
struct FileArgs {
    file: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let command = cli.command();
    let options = cli.options.interpreter_options();

    let worker = std::thread::Builder::new()
        .name("bhilal".to_string())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || match command {
            Command::Run(args) => run_command(&args, options),
            Command::Repl => repl_command(options),
            Command::Tokens(args) => tokens_command(&args),
            Command::Ast(args) => ast_command(&args),
        });

    match worker.map(|handle| handle.join()) {
        Ok(Ok(code)) => code,
        Ok(Err(_)) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Erreur: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(source) => Some(source),
        Err(e) => {
            eprintln!("Erreur: Impossible de lire '{}': {e}", path.display());
            None
        }
    }
}

fn run_command(args: &FileArgs, options: InterpreterOptions) -> ExitCode {
    let Some(source) = read_source(&args.file) else {
        return ExitCode::FAILURE;
    };

    let mut interpreter = Interpreter::with_options(
        Rc::new(RefCell::new(std::io::stdout())),
        Rc::new(RefCell::new(BufReader::new(std::io::stdin()))),
        options,
    );

    match interpreter.run_source(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Erreur: {e}");
            ExitCode::FAILURE
        }
    }
}

fn repl_command(options: InterpreterOptions) -> ExitCode {
    println!("--- Bhilal Interactive REPL ---");
    println!("Tapez 'quitter' pour sortir.");

    // Shared with `entre`, so prompt lines and script input come from one
    // buffered reader.
    let input = Rc::new(RefCell::new(BufReader::new(std::io::stdin())));
    let mut interpreter = Interpreter::with_options(
        Rc::new(RefCell::new(std::io::stdout())),
        input.clone(),
        options,
    );

    let mut line = String::new();
    loop {
        print!("Bhilal> ");
        if let Err(e) = std::io::stdout().flush() {
            eprintln!("Erreur: {e}");
            return ExitCode::FAILURE;
        }

        line.clear();
        match input.borrow_mut().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("Erreur: {e}");
                return ExitCode::FAILURE;
            }
        }

        let source = line.trim();
        if source.eq_ignore_ascii_case("quitter") {
            break;
        }
        if source.is_empty() {
            continue;
        }

        if let Err(e) = interpreter.run_source(source) {
            eprintln!("Erreur: {e}");
            if e.is_fatal() {
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn tokens_command(args: &FileArgs) -> ExitCode {
    let Some(source) = read_source(&args.file) else {
        return ExitCode::FAILURE;
    };

    let tokens = match bhilal::tokenizer::tokens(&source) {
        Ok(tokens) => tokens,
        Err(e) => return report(e.into()),
    };

    let mut line = 0;
    for token in tokens {
        if token.span.start_line != line {
            print!("{:4} ", token.span.start_line);
            line = token.span.start_line;
        } else {
            print!("   | ");
        }
        println!(
            "{:<4} {:<24} {}",
            token.span.start_column,
            format!("{:?}", token.token_type.kind()),
            token.token_type
        );
    }

    ExitCode::SUCCESS
}

fn ast_command(args: &FileArgs) -> ExitCode {
    let Some(source) = read_source(&args.file) else {
        return ExitCode::FAILURE;
    };

    let program = bhilal::tokenizer::tokens(&source)
        .map_err(InterpretError::from)
        .and_then(|tokens| bhilal::parser::program(&tokens).map_err(InterpretError::from));

    match program {
        Ok(program) => {
            println!("{program}");
            ExitCode::SUCCESS
        }
        Err(e) => report(e),
    }
}

fn report(e: InterpretError) -> ExitCode {
    eprintln!("Erreur: {e}");
    ExitCode::FAILURE
}
