//! ML Analysis Service - Command Line Entry Point
//!
//! Registry introspection and local analysis runs against the configured
//! SQLite store.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ml_analysis_core::{Category, Parameters};
use ml_analysis_service::storage::{AnalysisResultRow, ConfigService};
use ml_analysis_service::{AnalysisRequest, ServiceState};

#[derive(Parser)]
#[command(name = "ml-analysis-service")]
#[command(about = "Statistical and machine-learning analysis of tabular data")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ~/.ml-analysis/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available capabilities
    Capabilities {
        /// Only capabilities of this category (e.g. clustering)
        #[arg(long)]
        category: Option<String>,
        /// Only capabilities applicable to this industry
        #[arg(long)]
        industry: Option<String>,
    },

    /// Show the parameters of one capability
    Parameters {
        /// Capability id
        id: String,
    },

    /// Show complementary analyses of one capability
    Complementary {
        /// Capability id
        id: String,
        #[arg(long)]
        industry: Option<String>,
    },

    /// Run an analysis on a local Excel or JSON file and wait for it
    Analyze {
        /// Dataset file
        file: PathBuf,
        /// Capability id
        #[arg(short, long)]
        model: String,
        /// Industry tag (defaults to the configured one)
        #[arg(short, long)]
        industry: Option<String>,
        /// Parameters as a JSON object
        #[arg(short, long)]
        params: Option<String>,
    },

    /// Show the status and results of an uploaded file
    Status {
        /// Uploaded file id
        file_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_service = match &cli.config {
        Some(path) => ConfigService::with_path(path.clone()),
        None => ConfigService::new(),
    }
    .context("Failed to load configuration")?;

    let log_level = config_service.get_config().log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let state = ServiceState::new();
    state.initialize_with(config_service).await?;

    let output = match cli.command {
        Commands::Capabilities { category, industry } => {
            list_capabilities(&state, category.as_deref(), industry.as_deref()).await?
        }
        Commands::Parameters { id } => {
            let registry = state.registry().await?;
            json!(registry.parameter_metadata(&id)?)
        }
        Commands::Complementary { id, industry } => {
            let registry = state.registry().await?;
            let suggestions: Vec<Value> = registry
                .complementary(&id, industry.as_deref())
                .into_iter()
                .map(|d| json!({"id": d.id, "name": d.name, "category": d.category}))
                .collect();
            json!(suggestions)
        }
        Commands::Analyze {
            file,
            model,
            industry,
            params,
        } => analyze(&state, file, model, industry, params).await?,
        Commands::Status { file_id } => status(&state, &file_id).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn list_capabilities(
    state: &ServiceState,
    category: Option<&str>,
    industry: Option<&str>,
) -> anyhow::Result<Value> {
    let registry = state.registry().await?;

    let category = category
        .map(|c| Category::parse(c).ok_or_else(|| anyhow!("Unknown category: {}", c)))
        .transpose()?;

    let descriptors: Vec<Value> = registry
        .select(category, industry)
        .into_iter()
        .map(|d| {
            json!({
                "id": d.id,
                "name": d.name,
                "description": d.description,
                "category": d.category,
                "industries": d.industries,
            })
        })
        .collect();

    Ok(json!(descriptors))
}

async fn analyze(
    state: &ServiceState,
    file: PathBuf,
    model: String,
    industry: Option<String>,
    params: Option<String>,
) -> anyhow::Result<Value> {
    let path = file
        .canonicalize()
        .with_context(|| format!("Cannot open {}", file.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("Not a file: {}", path.display()))?;

    let parameters: Parameters = match params {
        Some(raw) => match serde_json::from_str(&raw)? {
            Value::Object(map) => map,
            _ => bail!("--params must be a JSON object"),
        },
        None => Parameters::new(),
    };
    let industry = match industry {
        Some(industry) => industry,
        None => state.get_config().await?.default_industry,
    };

    let file_id = Uuid::new_v4().to_string();
    let stored_path = path.to_string_lossy().into_owned();
    state
        .with_database(|db| db.register_file(&file_id, &file_name, &stored_path))
        .await?;

    let request = AnalysisRequest::new(&file_id, model, industry).with_parameters(parameters);
    let (acceptance, handle) = state.coordinator().await?.accept_from_storage(request);
    eprintln!("{} ({})", acceptance.message, acceptance.analysis_id);

    let run = handle.await.context("Analysis task panicked")?;
    let result = match run.result_id() {
        Some(id) => {
            let id = id.to_string();
            state
                .with_database(|db| db.get_analysis_result(&id))
                .await?
                .map(result_json)
                .transpose()?
        }
        None => None,
    };

    Ok(json!({
        "analysis_id": run.analysis_id,
        "file_id": run.file_id,
        "status": run.status(),
        "failure": run.failure(),
        "result": result,
    }))
}

async fn status(state: &ServiceState, file_id: &str) -> anyhow::Result<Value> {
    let (file, results) = state
        .with_database(|db| Ok((db.get_file(file_id)?, db.get_results_for_file(file_id)?)))
        .await?;
    let file = file.ok_or_else(|| anyhow!("Unknown file: {}", file_id))?;

    let results = results
        .into_iter()
        .map(result_json)
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(json!({
        "file_id": file.id,
        "file_name": file.file_name,
        "status": file.status,
        "result_id": file.result_id,
        "error_message": file.error_message,
        "results": results,
    }))
}

fn result_json(row: AnalysisResultRow) -> anyhow::Result<Value> {
    Ok(json!({
        "id": row.id,
        "analysis_id": row.analysis_id,
        "model_type": row.model_type,
        "industry": row.industry,
        "fallback": row.fallback,
        "created_at": row.created_at,
        "result": serde_json::from_str::<Value>(&row.result)?,
        "metrics": serde_json::from_str::<Value>(&row.metrics)?,
    }))
}
