//! modelbind CLI
//!
//! Command-line tools for modelbind schema files and object documents.
//!
//! A schema file is a JSON array of object schemas:
//!
//! ```json
//! [{ "name": "Task",
//!    "properties": [
//!      { "name": "Id", "kind": "int", "primaryKey": true },
//!      { "name": "Tags", "kind": "string", "shape": "list" }
//!    ] }]
//! ```
//!
//! # Commands
//!
//! - `inspect` - Display the types and properties of a schema file
//! - `validate` - Check a schema file against the registration rules
//! - `encode` - Encode a JSON object as a CBOR document
//! - `decode` - Decode a CBOR document back to JSON

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// modelbind schema and document tools.
#[derive(Parser)]
#[command(name = "modelbind")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the schema file
    #[arg(global = true, short, long)]
    schema: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the types and properties of a schema file
    Inspect {
        /// Only show this type
        #[arg(short = 't', long = "type")]
        type_name: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check a schema file against the registration rules
    Validate,

    /// Encode a JSON object as a CBOR document
    Encode {
        /// Type of the object
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// JSON file holding the object
        input: PathBuf,

        /// Write raw CBOR here instead of printing hex
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a CBOR document back to JSON
    Decode {
        /// Type of the object
        #[arg(short = 't', long = "type")]
        type_name: String,

        /// File holding the raw CBOR document
        #[arg(conflicts_with = "hex")]
        input: Option<PathBuf>,

        /// Hex-encoded CBOR document
        #[arg(long)]
        hex: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { type_name, format } => {
            let schema = cli.schema.ok_or("Schema file required for inspect")?;
            commands::inspect::run(&schema, type_name.as_deref(), &format)?;
        }
        Commands::Validate => {
            let schema = cli.schema.ok_or("Schema file required for validate")?;
            commands::validate::run(&schema)?;
        }
        Commands::Encode {
            type_name,
            input,
            output,
        } => {
            let schema = cli.schema.ok_or("Schema file required for encode")?;
            commands::encode::run(&schema, &type_name, &input, output.as_deref())?;
        }
        Commands::Decode {
            type_name,
            input,
            hex,
        } => {
            let schema = cli.schema.ok_or("Schema file required for decode")?;
            let source = match (input, hex) {
                (Some(path), _) => commands::decode::Source::File(path),
                (None, Some(hex)) => commands::decode::Source::Hex(hex),
                (None, None) => return Err("Either an input file or --hex is required".into()),
            };
            commands::decode::run(&schema, &type_name, source)?;
        }
        Commands::Version => {
            println!("modelbind CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
