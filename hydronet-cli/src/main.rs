mod tracing;

use crate::tracing::setup_tracing;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hydronet_core::network::Network;
use hydronet_schema::ModelSchema;
use std::path::Path;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Turn debugging information on.
    #[arg(long, default_value_t = false, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a model, set up its network and check it for errors.
    Check {
        /// Path to model JSON.
        model: PathBuf,
    },
    /// List the scenario combinations a model will run.
    Scenarios {
        /// Path to model JSON.
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(command) = &cli.command {
        setup_tracing(cli.debug)?;

        match command {
            Commands::Check { model } => check(model)?,
            Commands::Scenarios { model } => scenarios(model)?,
        }
    }

    Ok(())
}

fn load_network(path: &Path) -> Result<Network> {
    let schema = ModelSchema::from_path(path).with_context(|| format!("Could not read model: `{}`", path.display()))?;
    let model = schema
        .build_model()
        .with_context(|| format!("Could not build model: `{}`", path.display()))?;

    let (_, mut network) = model.into_parts();
    network
        .setup()
        .with_context(|| format!("Could not set up network: `{}`", path.display()))?;
    Ok(network)
}

fn check(path: &Path) -> Result<()> {
    let network = load_network(path)?;
    network
        .check()
        .with_context(|| format!("Network failed its checks: `{}`", path.display()))?;

    println!("Model: {}", path.display());
    println!("  nodes: {}", network.nodes().len());
    for (node_type, count) in network.node_type_counts() {
        println!("    {node_type}: {count}");
    }
    println!("  edges: {}", network.edges().len());
    println!("  parameters: {}", network.parameters().len());
    println!("  scenario combinations: {}", network.scenarios().combinations().len());

    Ok(())
}

fn scenarios(path: &Path) -> Result<()> {
    let network = load_network(path)?;
    let scenarios = network.scenarios();

    let names: Vec<&str> = scenarios.scenarios().iter().map(|s| s.name()).collect();
    println!("global_id\t{}", names.join("\t"));

    for combination in scenarios.combinations() {
        let labels: Vec<String> = combination
            .indices()
            .iter()
            .zip(scenarios.labels(combination))
            .map(|(index, label)| format!("{index} ({label})"))
            .collect();
        println!("{}\t{}", combination.global_id(), labels.join("\t"));
    }

    Ok(())
}
