use std::sync::Arc;

use clap::Parser;
use tally_node::{
    build_runtime,
    cli::Args,
    console::run_console,
    setup::ensure_config,
};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Arguments and config
    let args = Args::parse();
    let config = ensure_config(&args.config_path)?;

    // 2. Logging. The guard must live until shutdown to flush the file layer.
    std::panic::set_hook(Box::new(|info| {
        let location = match info.location() {
            Some(l) => format!("at {}:{}:{}", l.file(), l.line(), l.column()),
            None => "unknown location".to_string(),
        };
        eprintln!("CRASH: {} {}", info, location);
    }));

    let log_filename = format!("{}/tally.log", config.log_dir);
    let file_appender = tracing_appender::rolling::never(".", log_filename);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let tally_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target() == "tally" || metadata.target().starts_with("tally_core")
        }));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tally_node=debug".into()),
        )
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| metadata.target() != "tally"));

    tracing_subscriber::registry()
        .with(tally_layer)
        .with(stdout_layer)
        .init();

    info!("--- STARTING TALLY NODE ---");
    info!("Config: {}", args.config_path);

    // 3. Runtime
    let runtime = match build_runtime(&config, args.name.as_deref()).await {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to start node: {}", e);
            return Err(e.into());
        }
    };
    println!("👤 {} ({})", runtime.account.name, runtime.account.id);

    // 4. Invite from the command line
    if let Some(invite) = &args.invite {
        match runtime.session.consume_invite(invite).await {
            Ok(report) => info!("Invite handled: {} command(s)", report.outcomes.len()),
            Err(e) => error!("Invite failed: {}", e),
        }
    }

    // 5. Console until quit or EOF
    let stdin = BufReader::new(tokio::io::stdin());
    run_console(Arc::clone(&runtime.session), stdin).await?;

    info!("Node stopped.");
    Ok(())
}
