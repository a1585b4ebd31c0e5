use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use salmon::ast_printer::AstPrinter;
use salmon::parser::Parser;
use salmon::scanner::Scanner;
use salmon::{Interpreter, RunError, SalmonError};

/// Exit code for a malformed command line.
const EXIT_USAGE: i32 = 64;

/// Exit code when scanning or parsing failed.
const EXIT_DATA_ERROR: i32 = 65;

#[derive(ClapParser, Debug)]
#[command(version, about = "Salmon language interpreter", long_about = None)]
pub struct Cli {
    /// Defaults to `repl` when omitted
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to salmon.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a file as a Salmon program
    Run { filename: PathBuf },

    /// Reads and runs one line at a time from stdin
    Repl,

    /// Tokenizes a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print tokens as JSON objects, one per line
        #[arg(long)]
        json: bool,
    },

    /// Parses a file and prints the syntax tree of each statement
    Parse { filename: PathBuf },
}

/// Maps `filename` read‑only and hands its bytes to `f`.
fn with_source<R>(filename: &Path, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .context(format!("Failed to stat file {:?}", filename))?
        .len();

    // Mapping a zero-length file fails on some platforms.
    if len == 0 {
        return Ok(f(&[]));
    }

    // SAFETY: the mapping is read-only and only lives for this call; the
    // script is not expected to be modified while it runs.
    let map = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    info!("Mapped {} bytes from {:?}", map.len(), filename);

    Ok(f(&map))
}

fn init_logger() -> Result<()> {
    let log_file = File::create("salmon.log").context("Failed to create salmon.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'salmon::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("salmon::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
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
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to salmon.log");
    Ok(())
}

fn report(errors: &[SalmonError]) {
    for e in errors {
        eprintln!("{}", e);
    }
}

fn exit(code: i32) -> ! {
    let _ = io::stdout().flush();
    std::process::exit(code);
}

fn run_file(filename: &Path) -> Result<()> {
    let mut interpreter = Interpreter::new();

    let outcome: std::result::Result<(), RunError> =
        with_source(filename, |source| salmon::run(source, &mut interpreter))?;

    if let Err(e) = outcome {
        debug!("Run failed with exit code {}", e.exit_code());
        report(e.errors());
        exit(e.exit_code());
    }

    info!("Program executed successfully");
    Ok(())
}

fn run_prompt() -> Result<()> {
    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read from stdin")?;

        // Each line is its own run; errors do not end the session.
        if let Err(e) = salmon::run(line.as_bytes(), &mut interpreter) {
            report(e.errors());
        }
    }

    println!();
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    let tokenized: bool = with_source(filename, |source| -> Result<bool> {
        let mut tokenized = true;

        for token in Scanner::new(source) {
            match token {
                Ok(token) if json => println!("{}", serde_json::to_string(&token)?),
                Ok(token) => println!("{}", token),
                Err(e) => {
                    tokenized = false;
                    eprintln!("{}", e);
                }
            }
        }

        Ok(tokenized)
    })??;

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        exit(EXIT_DATA_ERROR);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(filename: &Path) -> Result<()> {
    let (rendered, errors) = with_source(filename, |source| {
        let (tokens, mut errors) = Scanner::new(source).scan_all();

        let rendered: Vec<String> = match Parser::new(&tokens).parse() {
            Ok(stmts) => stmts.iter().map(AstPrinter::print_stmt).collect(),
            Err(parse_errors) => {
                errors.extend(parse_errors);
                Vec::new()
            }
        };

        (rendered, errors)
    })?;

    if !errors.is_empty() {
        report(&errors);
        exit(EXIT_DATA_ERROR);
    }

    for line in rendered {
        println!("{}", line);
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            exit(code);
        }
    };

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        // Initialize a minimal logger to avoid "no logger" errors
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands.unwrap_or(Commands::Repl) {
        Commands::Run { filename } => run_file(&filename),
        Commands::Repl => run_prompt(),
        Commands::Tokenize { filename, json } => tokenize(&filename, json),
        Commands::Parse { filename } => parse(&filename),
    }
}
