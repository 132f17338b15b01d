use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Result};
use clap::Parser;
use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;

use pagevitals::{
    init_logging, AnalysisStatus, AnalyzerConfig, AnalyzerEvent, PageTrace, ReplayConnector,
    ReplayPage, SessionCoordinator,
};

/// Replay a recorded page visit and print its performance report
#[derive(Parser, Debug)]
#[command(name = "pagevitals", version, long_about = None)]
struct Cli {
    /// Recorded page trace (JSON)
    #[arg(short, long)]
    trace: PathBuf,

    /// Analyzer configuration (JSON); missing keys take their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Session id the replayed page is attached to
    #[arg(short, long, default_value = "replay")]
    session: String,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };
    let trace = PageTrace::load(&cli.trace)?;
    info!("replaying {} as session {}", trace.url, cli.session);

    let connector = Arc::new(ReplayConnector::new());
    connector.insert(cli.session.clone(), Arc::new(ReplayPage::new(trace)));
    let coordinator = SessionCoordinator::new(connector, config);
    let mut events = coordinator.subscribe();

    coordinator.start(&cli.session).await?;

    loop {
        match events.recv().await {
            Ok(AnalyzerEvent::ProgressUpdate {
                progress, message, ..
            }) => info!("{progress:>3}% {message}"),
            Ok(AnalyzerEvent::AnalysisCompleted { .. } | AnalyzerEvent::AnalysisError { .. }) => {
                break
            }
            Err(RecvError::Lagged(skipped)) => warn!("skipped {skipped} progress updates"),
            Err(RecvError::Closed) => break,
        }
    }

    let status = coordinator.get_status(&cli.session);
    let report = if cli.pretty {
        serde_json::to_string_pretty(&status)?
    } else {
        serde_json::to_string(&status)?
    };
    println!("{report}");

    match status {
        AnalysisStatus::Error { message } => Err(anyhow!(message)),
        _ => Ok(()),
    }
}
