mod cli;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use fileflow::{BatchSummary, FlowConfig, FlowState, OrganizeOutcome};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    fileflow::init_tracing();

    let args = Cli::parse();

    let config = match FlowConfig::load_or_default(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let Some(command) = args.command else {
        let _ = Cli::command().print_long_help();
        return;
    };

    if let Err(err) = run(command, config).await {
        error!("Error: {}", err);
        process::exit(1);
    }
}

async fn run(command: Commands, config: FlowConfig) -> fileflow::Result<()> {
    let state = FlowState::new(&config);

    match command {
        Commands::Organize { sources, dest } => {
            let summary = with_ctrl_c(&state, fileflow::organize_once(&state, &sources, dest.as_deref(), &config)).await?;
            print_summary(&summary);
        }
        Commands::Reorganize { dirs } => {
            let summary = with_ctrl_c(&state, fileflow::reorganize(&state, &dirs, &config)).await?;
            print_summary(&summary);
        }
        Commands::Single { path, dest } => {
            match fileflow::organize_single(&state, &path, dest.as_deref(), &config).await? {
                OrganizeOutcome::Moved { to, .. } => println!("{} -> {}", path.display(), to.display()),
                OrganizeOutcome::Skipped { reason, .. } => println!("Skipped {}: {}", path.display(), reason),
                OrganizeOutcome::Failed { reason, .. } => {
                    return Err(fileflow::FlowError::move_failed(path, reason));
                }
            }
        }
        Commands::Watch { sources } => {
            let mut moves = fileflow::subscribe_moves(&state);
            fileflow::start_watcher(&state, &sources, &config).await?;
            info!(paths = ?fileflow::get_watcher_status(&state).watching_paths, "Watching, press Ctrl-C to stop");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    event = moves.recv() => match event {
                        Ok(event) => println!("{} -> {}", event.path.display(), event.destination.display()),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            info!(missed, "Move notifications dropped");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                }
            }

            fileflow::stop_watcher(&state).await?;
        }
        Commands::PrintConfig => {
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| fileflow::FlowError::config(e.to_string()))?;
            println!("{}", json);
        }
    }

    Ok(())
}

/// Run a batch; the first Ctrl-C asks it to stop between files
async fn with_ctrl_c<F>(state: &FlowState, batch: F) -> fileflow::Result<BatchSummary>
where
    F: std::future::Future<Output = fileflow::Result<BatchSummary>>,
{
    tokio::pin!(batch);
    tokio::select! {
        result = &mut batch => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Cancelling after in-flight files...");
            fileflow::cancel_batch(state);
            batch.await
        }
    }
}

fn print_summary(summary: &BatchSummary) {
    println!(
        "{} moved ({} sensitive, {} renamed), {} skipped, {} failed{}",
        summary.succeeded,
        summary.sensitive,
        summary.renamed,
        summary.skipped,
        summary.failed.len(),
        if summary.cancelled { ", cancelled" } else { "" }
    );
    for failure in &summary.failed {
        println!("  failed {}: {}", failure.path.display(), failure.reason);
    }
}
