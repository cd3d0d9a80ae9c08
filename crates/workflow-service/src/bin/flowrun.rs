//! Run or validate a saved workflow from the command line

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use workflow_service::{Result, ServiceConfig, WorkflowCoordinator};

/// Load a workflow document and run it with the built-in node types
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the workflow JSON file
    workflow: PathBuf,

    /// Directory holding config.json
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Only validate the workflow, print the report and exit
    #[arg(long)]
    validate_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the workflow was valid (and ran, unless validating only)
async fn run(args: &Args) -> Result<bool> {
    let config = ServiceConfig::load(&args.config_dir).await?;
    let coordinator = WorkflowCoordinator::from_config(&config);

    let dropped = coordinator.load_workflow_file(&args.workflow).await?;
    if dropped > 0 {
        log::warn!("{} dangling connections were dropped", dropped);
    }

    let report = coordinator.validate_workflow().await;
    if args.validate_only || !report.valid {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report.valid);
    }

    let results = coordinator.execute_workflow().await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    log::info!("Workflow '{}' finished", coordinator.workflow_name().await);
    Ok(true)
}
