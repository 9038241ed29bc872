//! primer CLI
//!
//! Main entry point for the `primer` command.

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use primer::config::Config;
use primer::interp::{Interpreter, RandomSource};
use primer::SourceFile;

#[derive(Parser)]
#[command(name = "primer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A teaching REPL for optionals, records and random draws", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Seed random draws for reproducible output
    #[arg(long, global = true, value_name = "N")]
    seed: Option<u64>,

    /// Configuration file (defaults to ./primer.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate source text and print the value of its last statement
    Eval {
        #[arg(value_name = "SOURCE")]
        expression: String,
    },

    /// Execute a file of statements
    Run {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Start the interactive REPL
    Repl,

    /// Print the syntax tree of source text as JSON
    Parse {
        #[arg(value_name = "SOURCE")]
        expression: String,
    },

    /// Show version and built-in record types
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::discover(cli.config.as_deref())?;
    if let Some(seed) = cli.seed.or(config.seed) {
        tracing::debug!(seed, "seeding random source");
        RandomSource::init_shared(seed);
    }

    match cli.command {
        Commands::Eval { expression } => eval(&expression),
        Commands::Run { input } => run(&input),
        Commands::Repl => primer::repl::Repl::new(config).run(),
        Commands::Parse { expression } => parse(&expression),
        Commands::Info => info(),
    }
}

fn eval(source: &str) -> Result<()> {
    let file = SourceFile::new("<expression>", source);
    let mut interpreter = Interpreter::new();
    match interpreter.eval_source(source) {
        Ok(Some(value)) => {
            println!("{}", value);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(file.report(e)),
    }
}

fn run(input: &Path) -> Result<()> {
    tracing::info!("Running {:?}", input);

    let source = std::fs::read_to_string(input)
        .map_err(|e| miette::miette!("Failed to read input file: {}", e))?;
    let file = SourceFile::new(input.to_string_lossy(), source.clone());

    let mut interpreter = Interpreter::new();
    match interpreter.eval_source(&source) {
        Ok(Some(value)) => {
            println!("{}", value);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => Err(file.report(e)),
    }
}

fn parse(source: &str) -> Result<()> {
    let file = SourceFile::new("<expression>", source);
    let program = primer::parse(source).map_err(|e| file.report(e))?;
    let json = serde_json::to_string_pretty(&program)
        .map_err(|e| miette::miette!("Failed to serialize AST: {}", e))?;
    println!("{}", json);
    Ok(())
}

fn info() -> Result<()> {
    println!("primer v{}", primer::VERSION);
    println!();
    println!("Built-in record types:");
    let interpreter = Interpreter::new();
    for ty in interpreter.env().records.types() {
        println!("  {:?} {}", ty.kind, ty.name);
        for field in &ty.fields {
            let keyword = if field.mutable { "var" } else { "let" };
            match &field.default {
                Some(default) => println!("    {} {} = {:?}", keyword, field.name, default),
                None => println!("    {} {}", keyword, field.name),
            }
        }
    }
    println!();
    println!("Builtins: print, some, randomInt, randomFloat, Int.random(in:), Float.random(in:)");
    println!("Config keys (primer.toml): prompt, seed, history_file");
    Ok(())
}
