//! `ejson` CLI — convert between Extended JSON, Mongo shell syntax and
//! database commands from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Extended JSON to shell text (stdin → stdout)
//! echo '{"_id":{"$oid":"5f0c4c7e2f8fb814b56fa181"}}' | ejson encode
//!
//! # Compact single-line output, file to file
//! ejson encode --indent 0 -i doc.json -o doc.js
//!
//! # Shell text back to pretty-printed Extended JSON
//! echo '{ n: NumberLong("9007199254740993") }' | ejson decode
//!
//! # Shell command chain to a database command
//! echo 'db.users.find({ age: { $gt: 20 } }).limit(5)' | ejson command
//!
//! # ... rendered as shell text instead of JSON
//! echo 'db.users.find()' | ejson command --shell
//!
//! # Debug logging on stderr (or set RUST_LOG)
//! ejson --verbose decode -i doc.js
//! ```

use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ejson_core::{EncodeOptions, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(
    name = "ejson",
    version,
    about = "Mongo shell syntax ⇄ canonical Extended JSON"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log codec activity to stderr at debug level
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode canonical Extended JSON as shell text
    Encode {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Spaces per nesting level; 0 prints a single line
        #[arg(long, default_value_t = 2)]
        indent: usize,
    },
    /// Decode shell text to canonical Extended JSON
    Decode {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Translate a db.<collection>.<operation>(...) chain into a database command
    Command {
        /// Input file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
        /// Print the command as shell text instead of Extended JSON
        #[arg(long)]
        shell: bool,
        /// Spaces per nesting level for --shell output
        #[arg(long, default_value_t = 2)]
        indent: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Encode {
            input,
            output,
            indent,
        } => {
            let json = read_input(input.as_deref())?;
            let shell = ejson_core::encode_json(&json, EncodeOptions::pretty(indent))
                .context("Failed to encode Extended JSON as shell text")?;
            write_output(output.as_deref(), &shell)?;
        }
        Commands::Decode { input, output } => {
            let text = read_input(input.as_deref())?;
            let value = ejson_core::decode(&text).context("Failed to decode shell text")?;
            let pretty = serde_json::to_string_pretty(&value.to_extended_json())?;
            write_output(output.as_deref(), &pretty)?;
        }
        Commands::Command {
            input,
            output,
            shell,
            indent,
        } => {
            let text = read_input(input.as_deref())?;
            let command =
                ejson_core::parse_command(&text).context("Failed to interpret shell command")?;
            let rendered = if shell {
                ejson_core::encode_pretty(&Value::Document(command), indent)
            } else {
                serde_json::to_string_pretty(&command.to_extended_json())?
            };
            write_output(output.as_deref(), &rendered)?;
        }
    }
    Ok(())
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
