//! Artifact Store CLI
//!
//! Thin command-line wrapper over [`ArtifactStore`]. Results are printed as
//! JSON on stdout; failures print `{"error": <kind>, "message": ...}` and
//! exit with status 1. Logs go to stderr, filtered by `RUST_LOG`.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use artifact_store::{ArtifactStore, ArtifactType, Status, StoreConfig, StoreError};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "artifact-store")]
#[command(about = "Query and edit identified markdown project artifacts")]
struct Cli {
    /// Config file (defaults to artifacts.toml lookup)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Override the tracked document root
    #[arg(long, global = true)]
    doc_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List artifacts by type
    SearchType {
        /// Types to include (all when omitted)
        #[arg(short = 't', long = "type", value_delimiter = ',')]
        types: Vec<ArtifactType>,
        #[arg(short, long)]
        status: Option<Status>,
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// Look up one artifact
    SearchId {
        id: String,
        /// Include the artifacts that reference it
        #[arg(long)]
        refs: bool,
    },

    /// Print the exact text of an artifact
    Get { id: String },

    /// Apply a status transition (and its cascades)
    SetStatus { id: String, status: Status },

    /// Replace an artifact's text (reads stdin without --file)
    Update {
        id: String,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Confirm a draft's provisional ids and move it into the document root
    Finalize {
        draft: PathBuf,
        /// File name suffix for file-level drafts
        #[arg(short, long)]
        suffix: Option<String>,
    },

    /// Check off a checklist step
    StepDone { id: String, step: String },

    /// Add a provisional section under a parent (reads stdin without --file)
    Add {
        parent: String,
        #[arg(value_name = "TYPE")]
        artifact_type: ArtifactType,
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Record REFERRER in TARGET's "Referenced by" list
    AddRef { target: String, referrer: String },

    /// Confirm provisional ids nested inside an artifact
    Register {
        id: String,
        #[arg(short = 't', long = "types", value_delimiter = ',', default_value = "UACC,SACC")]
        types: Vec<ArtifactType>,
    },

    /// Whether a parent may now be completed
    Eligible { id: String },

    /// Parse warnings across the document root
    Warnings,

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        let kind = e.downcast_ref::<StoreError>().map(|s| s.kind()).unwrap_or("Error");
        let body = serde_json::json!({ "error": kind, "message": format!("{:#}", e) });
        println!("{}", body);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = StoreConfig::load_from(cli.config.as_deref()).map_err(StoreError::from)?;
    if let Some(root) = cli.doc_root {
        config.store.doc_root = root;
    }

    if let Commands::Config = cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut store = ArtifactStore::open(config)?;

    match cli.command {
        Commands::SearchType { types, status, parent } => {
            emit(&store.search_by_type(&types, status, parent.as_deref())?)
        }
        Commands::SearchId { id, refs } => emit(&store.search_by_id(&id, refs)?),
        Commands::Get { id } => {
            print!("{}", store.get_artifact(&id)?);
            Ok(())
        }
        Commands::SetStatus { id, status } => emit(&store.update_status(&id, status)?),
        Commands::Update { id, file } => {
            let text = read_input(file)?;
            store.update_content(&id, &text)?;
            emit(&serde_json::json!({ "id": id, "updated": true }))
        }
        Commands::Finalize { draft, suffix } => emit(&store.finalize_draft(&draft, suffix.as_deref())?),
        Commands::StepDone { id, step } => emit(&store.mark_step_done(&id, &step)?),
        Commands::Add {
            parent,
            artifact_type,
            file,
        } => {
            let content = read_input(file)?;
            let id = store.add_artifact(&parent, artifact_type, &content)?;
            emit(&serde_json::json!({ "id": id }))
        }
        Commands::AddRef { target, referrer } => emit(&store.add_reference(&target, &referrer)?),
        Commands::Register { id, types } => emit(&store.register_provisional_ids(&id, &types)?),
        Commands::Eligible { id } => {
            let eligible = store.completion_eligible(&id)?;
            emit(&serde_json::json!({ "id": id, "eligible": eligible }))
        }
        Commands::Warnings => emit(&store.warnings()?),
        Commands::Config => Ok(()),
    }
}

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_input(file: Option<PathBuf>) -> anyhow::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
            Ok(text)
        }
    }
}
