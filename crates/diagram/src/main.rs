use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use diagram_config::DiagramConfig;
use diagram_core::{Key, Model, ObjectData, Session};
use serde_json::json;

/// Inspect and exercise transactional diagram models.
#[derive(Parser, Debug)]
#[command(name = "diagram", version, about)]
struct Cli {
    /// Model configuration file (defaults to `diagram.json` next to the executable).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a serialized model and print its contents.
    Inspect {
        /// Serialized model file.
        file: PathBuf,
    },
    /// Build a small model, undo and redo it, and print the result.
    Demo,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = cli.config.unwrap_or_else(DiagramConfig::config_path);
    let config = DiagramConfig::load_or_create(&config_path);
    tracing::info!("Using config {}", config_path.display());

    match cli.command {
        Command::Inspect { file } => inspect(&config, &file),
        Command::Demo => demo(&config),
    }
}

fn inspect(config: &DiagramConfig, file: &Path) -> Result<()> {
    let mut model = Model::from_config(config);
    model.load_from_file(file)?;

    println!("class: {}", model.class());
    println!("nodes: {}", model.node_count());
    for id in model.node_ids() {
        let key = model.node_key(id).map(|k| k.to_string()).unwrap_or_default();
        match model.node_category(id) {
            Some(category) => println!("  {key} ({category})"),
            None => println!("  {key}"),
        }
    }
    if model.class().has_links() {
        println!("links: {}", model.link_count());
        for id in model.link_ids() {
            let show = |k: Option<Key>| k.map(|k| k.to_string()).unwrap_or_else(|| "?".into());
            println!(
                "  {}: {} -> {}",
                show(model.link_key(id)),
                show(model.link_from_key(id)),
                show(model.link_to_key(id))
            );
        }
    }
    Ok(())
}

fn demo(config: &DiagramConfig) -> Result<()> {
    let mut session = Session::from_config(config);
    session.model().add_changed_listener(|change| {
        tracing::info!("change: {change}");
    });

    let model = session.model_mut();
    model.add_node(data(json!({"id": "A", "text": "Alpha"})));
    model.add_node(data(json!({"id": "B", "text": "Beta"})));
    model.add_link(data(json!({"from": "A", "to": "B"})));
    report("after edits", session.model());

    session.undo();
    report("after undo", session.model());

    session.redo();
    report("after redo", session.model());

    println!("{}", session.model().serialize()?);
    Ok(())
}

fn report(stage: &str, model: &Model) {
    tracing::info!(
        nodes = model.node_count(),
        links = model.link_count(),
        "{stage}"
    );
}

fn data(value: serde_json::Value) -> ObjectData {
    match value {
        serde_json::Value::Object(map) => map,
        _ => ObjectData::new(),
    }
}
