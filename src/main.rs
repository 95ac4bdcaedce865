use std::fs::{self, File};

use anyhow::{Context, Result};
use clap::Parser;
use finmodel::api::{
    Cli, Command, ModelDocument, ProjectArgs, build_inputs, build_project_response,
    run_http_server,
};
use finmodel::core::project;
use finmodel::io::{export_reports, read_historical_csv};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Command::Project(args) => run_project(&args),
        Command::Serve { port } => run_http_server(port)
            .await
            .with_context(|| format!("HTTP server on port {port} failed")),
    }
}

fn run_project(args: &ProjectArgs) -> Result<()> {
    let text = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read model file {}", args.input.display()))?;
    let mut document: ModelDocument = serde_json::from_str(&text)
        .with_context(|| format!("invalid model JSON in {}", args.input.display()))?;

    for path in &args.historical_csv {
        let file = File::open(path)
            .with_context(|| format!("failed to open historical CSV {}", path.display()))?;
        let table = read_historical_csv(file)
            .with_context(|| format!("failed to parse historical CSV {}", path.display()))?;
        table.apply_to(&mut document.historical);
    }

    let request = build_inputs(document, &args.options).map_err(anyhow::Error::msg)?;
    let outcome = project(&request.model)?;

    let response = build_project_response(&request, &outcome);
    println!("{}", serde_json::to_string_pretty(&response)?);

    if let Some(dir) = &args.export_dir {
        let written = export_reports(dir, &outcome.reports)
            .with_context(|| format!("failed to export reports to {}", dir.display()))?;
        tracing::info!(files = written.len(), dir = %dir.display(), "reports exported");
    }
    Ok(())
}
