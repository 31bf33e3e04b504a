use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::{fmt, fmt::writer::BoxMakeWriter, prelude::*, EnvFilter};

use tempo_trace_aggregation::{
    config::{config_path, Cli, Config, LogFormat},
    Driver,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error ({}): {}", config_path(&cli).display(), e);
            let _ = Cli::command().print_help();
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        graph = %config.graph.name,
        tempo = %config.tempo.url,
        nodegraph_provider = %config.nodegraph_provider.url,
        "tta - Tempo trace aggregation starting..."
    );

    let driver = match Driver::from_config(&config) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "Failed to initialize clients");
            return Err(e.into());
        }
    };

    driver.run().await;

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let writer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(writer))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_ansi(config.logging.file.is_none()).with_writer(writer))
                .init();
        }
    }
    Ok(())
}
