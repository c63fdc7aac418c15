//! Schema Validator CLI
//!
//! Runs the consistency checks over an OASF schema corpus, and inspects
//! individual resolved entities.

use std::path::PathBuf;
use clap::{Parser, Subcommand};
use oasf_schemas::config::OutputFormat;
use oasf_schemas::proto::{MessageSource, ProtoFileSource};
use oasf_schemas::{compare, CheckConfig, EntityType, RunReport, SchemaChecker};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-validator")]
#[command(about = "Resolve inheritance and check consistency of an OASF schema corpus")]
struct Cli {
    /// Config file (defaults to oasf-schemas.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    /// Schema corpus root (overrides config)
    #[arg(short, long)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every check and report errors and warnings
    Check {
        /// Write the JSON report to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the JSON report instead of the text summary
        #[arg(long)]
        json: bool,
    },

    /// Print one entity with its inherited attributes merged
    Resolve {
        /// Entity type (object, skill, domain, module)
        entity_type: EntityType,
        /// Entity name
        name: String,
    },

    /// Compare one resolved entity with a .proto message
    Compare {
        entity_type: EntityType,
        name: String,
        /// Path to the .proto file
        proto: PathBuf,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default oasf-schemas.toml
    Init {
        #[arg(default_value = "oasf-schemas.toml")]
        path: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = CheckConfig::load_from(cli.config.as_deref())?;
    if let Some(root) = cli.root {
        config.corpus.root = root;
    }

    match cli.command {
        Commands::Check { output, json } => {
            if !json {
                println!("🔍 Checking schema corpus: {:?}", config.corpus_root());
            }
            let checker = SchemaChecker::open(config.clone())?;
            let report = checker.run()?;

            let summary = report.summary();
            let report_json = match config.report.output_format {
                OutputFormat::Pretty => serde_json::to_string_pretty(&summary)?,
                OutputFormat::Compact => serde_json::to_string(&summary)?,
            };

            if let Some(path) = output {
                std::fs::write(&path, &report_json)?;
                if !json {
                    println!("✅ Report written to {:?}", path);
                }
            }

            if json {
                println!("{}", report_json);
            } else {
                print_report(&report, config.report.show_warnings);
            }

            Ok(report.passed())
        }

        Commands::Resolve { entity_type, name } => {
            let checker = SchemaChecker::open(config)?;
            let entity = checker.resolve_entity(entity_type, &name)?;
            println!("{}", serde_json::to_string_pretty(&entity.to_document())?);
            Ok(true)
        }

        Commands::Compare { entity_type, name, proto } => {
            let checker = SchemaChecker::open(config)?;
            let entity = checker.resolve_entity(entity_type, &name)?;
            let message = ProtoFileSource::new()?.message(&proto)?;

            println!("🔍 Comparing {} '{}' with message {}", entity_type, name, message.name);
            let diags = compare::compare(entity, &message);
            if diags.is_empty() {
                println!("✅ In sync");
            } else {
                print!("{}", diags);
            }
            Ok(!diags.has_errors())
        }

        Commands::Config { action } => {
            match action {
                ConfigAction::Show => {
                    println!("{}", toml::to_string_pretty(&config)?);
                }
                ConfigAction::Init { path } => {
                    CheckConfig::default().save(&path)?;
                    println!("✅ Wrote default configuration to {}", path);
                }
            }
            Ok(true)
        }
    }
}

fn print_report(report: &RunReport, show_warnings: bool) {
    println!("   {} files, corpus {}", report.files, &report.corpus_hash[..12.min(report.corpus_hash.len())]);
    println!();

    for (kind, diags) in &report.checks {
        let errors = diags.error_count();
        let warnings = diags.warning_count();
        if errors > 0 {
            println!("❌ {} - {} error(s), {} warning(s)", kind, errors, warnings);
        } else if warnings > 0 {
            println!("⚠️  {} - {} warning(s)", kind, warnings);
        } else {
            println!("✅ {}", kind);
        }

        for item in diags.errors() {
            println!("   └─ {}", item);
        }
        if show_warnings {
            for item in diags.warnings() {
                println!("   └─ {}", item);
            }
        }
    }

    println!();
    if report.passed() {
        println!("✅ All checks passed ({} warning(s))", report.warning_count());
    } else {
        println!("❌ {} error(s), {} warning(s)", report.error_count(), report.warning_count());
    }
}
