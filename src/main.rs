//! Volatile Suite - run a catalog of Volatility modules against a memory dump
//!
//! Main entry point for the command line application.
//!
//! # Execution Flow
//!
//! 1. Parse arguments
//! 2. Initialize logging → logs/volatile_suite.<date>
//! 3. Load the suite configuration (volatile_suite.yaml, optional) and apply CLI overrides
//! 4. Create the tokio runtime
//! 5. Install the Ctrl-C / SIGTERM handler that flips the cancellation channel
//! 6. Run the suite and map the outcome to an exit code
//!
//! A first Ctrl-C (or SIGTERM) cancels the run: queued modules are skipped and
//! running ones are killed. A second one exits immediately.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use volatile_suite::cli::Cli;
use volatile_suite::logging::{LOG_PREFIX, setup_logging_with_console};
use volatile_suite::{APP_NAME, ConfigManager, RunMetrics, Suite, VERSION, exit_codes};

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            tracing::error!("Fatal error: {:#}", err);
            eprintln!("Error: {:#}", err);
            std::process::exit(exit_codes::FATAL);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    // Held for the lifetime of the process so buffered log lines get flushed
    let _guard = setup_logging_with_console(&cli.log_dir()?, LOG_PREFIX, cli.debug, cli.debug)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);
    println!("{} v{}", APP_NAME, VERSION);

    let config_manager = ConfigManager::new(cli.config_path()?);
    let mut suite_config = config_manager.load_suite_config()?;
    cli.apply_overrides(&mut suite_config);

    if cli.write_config {
        config_manager.save_suite_config(&suite_config)?;
        println!("Wrote configuration to {}", config_manager.config_path());
        return Ok(exit_codes::OK);
    }

    let run_config = cli.run_config()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("volatile-suite-worker")
        .build()
        .context("Failed to create tokio runtime")?;

    let suite = Suite::new(suite_config);
    let metrics = Arc::new(RunMetrics::new());

    let summary = runtime.block_on(async {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        tokio::spawn(watch_for_interrupt(cancel_tx));

        suite.run(&run_config, metrics, cancel_rx).await
    })?;

    // Killed children are reaped by kill_on_drop; don't wait on stragglers
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));

    if summary.cancelled {
        tracing::warn!("Run cancelled by user");
        Ok(exit_codes::CANCELLED)
    } else {
        tracing::info!("Run complete");
        Ok(exit_codes::OK)
    }
}

/// First Ctrl-C (or SIGTERM) requests cancellation, the second one exits.
async fn watch_for_interrupt(cancel_tx: watch::Sender<bool>) {
    let signal = match termination_signal().await {
        Ok(signal) => signal,
        Err(e) => {
            tracing::warn!("Failed to listen for termination signals: {}", e);
            // Keep the sender alive so the run is never seen as cancelled
            std::future::pending::<()>().await;
            return;
        }
    };

    eprintln!("Cancelling... (press Ctrl-C again to exit immediately)");
    tracing::warn!("{} received, cancelling remaining modules", signal);
    cancel_tx.send_replace(true);

    if let Ok(signal) = termination_signal().await {
        tracing::warn!("Second {} received, exiting", signal);
        std::process::exit(exit_codes::CANCELLED);
    }
    std::future::pending::<()>().await;
}

/// Resolves on Ctrl-C, or on SIGTERM on unix.
async fn termination_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|_| "Ctrl-C"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|_| "Ctrl-C")
    }
}
