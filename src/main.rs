use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::Parser;
use rox::scanner::Scanner;
use rox::{Config, Lox};

/// Exit code for lexical, syntax and resolution errors.
const EXIT_STATIC_ERROR: i32 = 65;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Nested calls allowed before a stack overflow is reported
    #[arg(long, global = true, default_value_t = Config::default().max_call_depth)]
    max_call_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print one JSON object per token
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse {
        filename: PathBuf,

        /// Print the syntax tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },

    /// Reads and runs one line at a time, sharing globals between lines
    Repl,
}

/// Reads the contents of a file into a String
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip the crate name from the module path
            let module = record.module_path().unwrap_or("<unnamed>");
            let module = module.strip_prefix("rox::").unwrap_or(module);
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn stdout_sink() -> Rc<RefCell<dyn Write>> {
    Rc::new(RefCell::new(io::stdout()))
}

fn report(errors: &[LoxError]) {
    for e in errors {
        debug!("Reporting: {:?}", e);
        eprintln!("{}", e);
    }
}

fn tokenize(filename: PathBuf, json: bool) -> Result<()> {
    let source = read_file(filename)?;
    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) if json => {
                println!("{}", serde_json::to_string(&token)?);
            }
            Ok(token) => println!("{}", token),
            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!(
            "Tokenization failed, exiting with code {}",
            EXIT_STATIC_ERROR
        );
        std::process::exit(EXIT_STATIC_ERROR);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(filename: PathBuf, json: bool) -> Result<()> {
    let source = read_file(filename)?;

    let tokens = rox::scanner::scan(&source).unwrap_or_else(|errors| {
        report(&errors);
        std::process::exit(EXIT_STATIC_ERROR);
    });

    match Parser::new(tokens).parse_expression() {
        Ok(expr) if json => println!("{}", serde_json::to_string_pretty(&expr)?),
        Ok(expr) => println!("{}", AstPrinter::print(&expr)),
        Err(errors) => {
            report(&errors);
            std::process::exit(EXIT_STATIC_ERROR);
        }
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn evaluate(filename: PathBuf, config: Config) -> Result<()> {
    let source = read_file(filename)?;

    let tokens = rox::scanner::scan(&source).unwrap_or_else(|errors| {
        report(&errors);
        std::process::exit(EXIT_STATIC_ERROR);
    });

    let expr = Parser::new(tokens)
        .parse_expression()
        .unwrap_or_else(|errors| {
            report(&errors);
            std::process::exit(EXIT_STATIC_ERROR);
        });

    let mut interpreter = Interpreter::with_config(stdout_sink(), config);
    match interpreter.evaluate(&expr) {
        Ok(value) => println!("{}", value),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(EXIT_RUNTIME_ERROR);
        }
    }

    info!("Evaluate subcommand completed");
    Ok(())
}

fn run(filename: PathBuf, config: Config) -> Result<()> {
    let source = read_file(filename)?;
    info!("Provided input:\n {}", source);

    let mut lox = Lox::with_config(stdout_sink(), config);
    let result = lox.run(&source);
    report(&result.errors);

    if result.had_error {
        std::process::exit(EXIT_STATIC_ERROR);
    }
    if result.had_runtime_error {
        std::process::exit(EXIT_RUNTIME_ERROR);
    }

    info!("Program executed successfully");
    Ok(())
}

fn repl(config: Config) -> Result<()> {
    let mut lox = Lox::with_config(stdout_sink(), config);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        // Errors are reported and the session carries on.
        let result = lox.run(&line);
        report(&result.errors);
    }

    info!("REPL session ended");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let config = Config {
        max_call_depth: args.max_call_depth,
    };

    match args.commands.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename, json } => tokenize(filename, json),
        Commands::Parse { filename, json } => parse(filename, json),
        Commands::Evaluate { filename } => evaluate(filename, config),
        Commands::Run { filename } => run(filename, config),
        Commands::Repl => repl(config),
    }
}
