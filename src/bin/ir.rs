//! Schema IR CLI
//!
//! Builds IR documents from OpenAPI files and zod sources, and reports
//! lint findings and dependency order.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use schema_ir::config::{IrConfig, OutputFormat};
use schema_ir::zod::{self, Diagnostic};
use schema_ir::{openapi, Document};

#[derive(Parser)]
#[command(name = "schema-ir")]
#[command(about = "Build canonical schema IR from OpenAPI documents and zod sources")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print compact JSON
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build IR from an OpenAPI document (JSON or YAML)
    Build {
        file: PathBuf,
    },

    /// Parse zod sources into IR
    Parse {
        /// A source file or a directory of sources
        path: PathBuf,
    },

    /// Run the lint pass only; exits non-zero on findings
    Lint {
        path: PathBuf,
    },

    /// Print topological order and circular schemas
    Order {
        /// OpenAPI document, or a zod source file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.as_deref().map(|p| p.to_string_lossy().into_owned());
    let mut config = IrConfig::load_from(config_path.as_deref()).context("failed to load configuration")?;
    if cli.compact {
        config.output.format = OutputFormat::Compact;
    }

    match cli.command {
        Commands::Build { file } => {
            let doc = build_openapi(&file, &config)?;
            print_json(&doc, &config)?;
            Ok(0)
        }

        Commands::Parse { path } => {
            let parser = zod::Parser::new(config.parse.clone());
            let mut failed = false;
            let mut results = serde_json::Map::new();

            for file in sources(&path)? {
                let source = read(&file)?;
                let output = parser.parse(&source);
                report(&file, &output.diagnostics);
                report(&file, &output.advisories);
                failed |= output.has_errors();
                results.insert(file.display().to_string(), serde_json::to_value(&output)?);
            }

            print_json(&Value::Object(results), &config)?;
            Ok(if failed { 1 } else { 0 })
        }

        Commands::Lint { path } => {
            let parser = zod::Parser::new(config.parse.clone());
            let mut total = 0;

            for file in sources(&path)? {
                let findings = parser.lint(&read(&file)?);
                report(&file, &findings);
                total += findings.len();
            }

            if total == 0 {
                println!("✅ No lint findings");
                Ok(0)
            } else {
                println!("❌ {} lint finding(s)", total);
                Ok(1)
            }
        }

        Commands::Order { file } => {
            let doc = if is_source(&file) {
                let output = zod::Parser::new(config.parse.clone()).parse(&read(&file)?);
                report(&file, &output.diagnostics);
                output.ir
            } else {
                build_openapi(&file, &config)?
            };

            for (index, name) in doc.dependency_graph.topological_order.iter().enumerate() {
                let marker = if doc.dependency_graph.circular_references.contains(name) {
                    " ↻"
                } else {
                    ""
                };
                println!("{:>4}. {}{}", index + 1, name, marker);
            }
            if !doc.dependency_graph.circular_references.is_empty() {
                println!();
                println!("Circular: {}", doc.dependency_graph.circular_references.join(", "));
            }
            Ok(0)
        }
    }
}

fn build_openapi(file: &Path, config: &IrConfig) -> Result<Document> {
    let text = read(file)?;
    let value: Value = match file.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("invalid YAML in {}", file.display()))?,
        _ => serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", file.display()))?,
    };
    let doc = openapi::Builder::new(config.build.clone())
        .build(&value)
        .with_context(|| format!("failed to build {}", file.display()))?;
    Ok(doc)
}

fn read(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn is_source(file: &Path) -> bool {
    matches!(
        file.extension().and_then(|e| e.to_str()),
        Some("ts") | Some("tsx") | Some("mts") | Some("cts")
    )
}

/// A single file, or every TypeScript source below a directory
fn sources(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("{} does not exist", path.display());
    }
    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_source(e.path()))
        .filter(|e| !e.path().components().any(|c| c.as_os_str() == "node_modules"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    Ok(files)
}

fn report(file: &Path, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.location {
            Some(_) => eprintln!("{}:{}", file.display(), diagnostic),
            None => eprintln!("{}: {}", file.display(), diagnostic),
        }
    }
}

fn print_json<T: Serialize>(value: &T, config: &IrConfig) -> Result<()> {
    let text = match config.output.format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    };
    println!("{}", text);
    Ok(())
}
