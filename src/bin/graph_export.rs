//! Export the `extends` inheritance graph of one entity type to DOT/SVG

use std::path::PathBuf;
use anyhow::{bail, Context};
use clap::Parser;
use oasf_schemas::{CheckConfig, EntityType, SchemaChecker};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schema-graph-export")]
#[command(about = "Export the entity inheritance graph to DOT/SVG format")]
struct Cli {
    /// Schema corpus root (overrides config)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Entity type to export
    #[arg(short = 't', long = "type", default_value = "skill")]
    entity_type: EntityType,

    /// Output file (defaults to <type>s.dot)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format: dot or svg
    #[arg(short, long, default_value = "dot")]
    format: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = CheckConfig::load().context("loading configuration")?;
    if let Some(root) = cli.root {
        config.corpus.root = root;
    }

    println!("Loading schema corpus from: {:?}", config.corpus_root());
    let checker = SchemaChecker::open(config)?;
    let graph = checker.graph(cli.entity_type);

    println!(
        "Graph loaded: {} {} nodes, {} edges",
        graph.node_count(),
        cli.entity_type,
        graph.edge_count()
    );

    let dot_content = graph.to_dot();
    let stem = cli.entity_type.dir_name();

    match cli.format.as_str() {
        "dot" => {
            let output_path = cli.output.unwrap_or_else(|| PathBuf::from(format!("{}.dot", stem)));
            std::fs::write(&output_path, &dot_content)
                .with_context(|| format!("writing {:?}", output_path))?;
            println!("✅ Exported DOT to: {:?}", output_path);
        }
        "svg" => {
            let output_path = cli.output.unwrap_or_else(|| PathBuf::from(format!("{}.svg", stem)));

            // Write DOT to temp file, then convert to SVG
            let temp_dot = output_path.with_extension("temp.dot");
            std::fs::write(&temp_dot, &dot_content)?;

            let output = std::process::Command::new("dot")
                .arg("-Tsvg")
                .arg(&temp_dot)
                .arg("-o")
                .arg(&output_path)
                .output()
                .context("running graphviz `dot`")?;

            let _ = std::fs::remove_file(&temp_dot);

            if !output.status.success() {
                bail!("GraphViz conversion failed:\n{}", String::from_utf8_lossy(&output.stderr));
            }
            println!("✅ Exported SVG to: {:?}", output_path);
        }
        other => bail!("Invalid format '{}'. Use 'dot' or 'svg'", other),
    }

    Ok(())
}
