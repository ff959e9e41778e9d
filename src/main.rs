//! Zenplate CLI
//!
//! Usage:
//!   zenplate [OPTIONS] [FILE]
//!
//! Options:
//!   --vars <FILE>              Variables (TOML, or JSON with a .json extension)
//!   -c, --config <FILE>        Compiler configuration (TOML format)
//!   --left-delimiter <TEXT>    Override the left tag delimiter
//!   --right-delimiter <TEXT>   Override the right tag delimiter
//!   --emit-program             Print the compiled program as JSON
//!   -d, --debug                Verbose logging
//!   -h, --help                 Print help

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use zenplate::{compile_with_config, CompilerConfig, Context, Delimiters, Diagnostic};

#[derive(Parser)]
#[command(name = "zenplate")]
#[command(about = "Compile and render zenplate templates")]
struct Cli {
    /// Template file (reads from stdin if not provided)
    input: Option<PathBuf>,

    /// Variables file (TOML, or JSON when the extension is .json)
    #[arg(long)]
    vars: Option<PathBuf>,

    /// Compiler configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Left tag delimiter, overriding the configuration
    #[arg(long)]
    left_delimiter: Option<String>,

    /// Right tag delimiter, overriding the configuration
    #[arg(long)]
    right_delimiter: Option<String>,

    /// Print the compiled program as JSON instead of rendering it
    #[arg(long)]
    emit_program: bool,

    /// Verbose logging
    #[arg(short, long)]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(&cli);

    let (source, filename) = match &cli.input {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => (content, path.display().to_string()),
            Err(e) => {
                eprintln!("Error reading file '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buffer) {
                eprintln!("Error reading from stdin: {}", e);
                process::exit(1);
            }
            (buffer, "<stdin>".to_string())
        }
    };

    let program = match compile_with_config(&source, &config) {
        Ok(program) => program,
        Err(diagnostics) => {
            report(&diagnostics, &source, &filename);
            process::exit(1);
        }
    };
    report(&program.warnings, &source, &filename);

    if cli.emit_program {
        match program.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing program: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let context = match &cli.vars {
        Some(path) => load_vars(path),
        None => Context::new(),
    };
    print!("{}", program.evaluate(&context));
}

/// Log to stderr, honouring `RUST_LOG` when set
fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();
}

fn load_config(cli: &Cli) -> CompilerConfig {
    let config = match &cli.config {
        Some(path) => match CompilerConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => CompilerConfig::default(),
    };

    if cli.left_delimiter.is_none() && cli.right_delimiter.is_none() {
        return config;
    }
    let left = cli
        .left_delimiter
        .clone()
        .unwrap_or_else(|| config.delimiters.left().to_string());
    let right = cli
        .right_delimiter
        .clone()
        .unwrap_or_else(|| config.delimiters.right().to_string());
    match Delimiters::new(left, right) {
        Ok(delimiters) => config.with_delimiters(delimiters),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn load_vars(path: &Path) -> Context {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading variables '{}': {}", path.display(), e);
            process::exit(1);
        }
    };
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        Context::from_json_str(&content).map_err(|e| e.to_string())
    } else {
        Context::from_toml_str(&content).map_err(|e| e.to_string())
    };
    match parsed {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Error parsing variables '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn report(diagnostics: &[Diagnostic], source: &str, filename: &str) {
    for diagnostic in diagnostics {
        eprint!("{}", diagnostic.format(source, filename));
    }
}
