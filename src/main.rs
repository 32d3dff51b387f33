//! kv2couch - Redis to CouchDB document migration
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use kv2couch::config::{usage_error, CliArgs, MigrateConfig};
use kv2couch::http::ReqwestTransport;
use kv2couch::migrate::MigrationCoordinator;
use kv2couch::progress::{print_header, print_summary, ProgressReporter};
use kv2couch::report::Reporter;
use kv2couch::store::RedisStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose);

    // Validate and create config; bad arguments exit with usage like clap's own errors
    let config = match MigrateConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => usage_error(&e).exit(),
    };

    let source = config.store.to_display_string();
    let destination = config.save_url.to_string();

    if config.show_progress {
        print_header(
            &source,
            &destination,
            config.worker_count,
            config.save_limit.get(),
        );
    }

    // Connect collaborators
    let store = RedisStore::connect(&config.store).context("Failed to connect to Redis")?;
    let transport =
        ReqwestTransport::new(config.request_timeout).context("Failed to create HTTP client")?;

    let mut reporter = Reporter::new(
        std::io::stdout().lock(),
        config.print_results,
        config.print_status,
        config.print_request,
    );

    let show_progress = config.show_progress;
    let mut coordinator = MigrationCoordinator::new(config, Arc::new(store), Arc::new(transport));
    if show_progress {
        let progress = ProgressReporter::new();
        progress.set_status("Enumerating keys...");
        coordinator = coordinator.with_progress(progress);
    }

    // Run the migration
    let result = coordinator.run(&mut reporter).context("Migration failed")?;

    if show_progress {
        print_summary(&result, &destination);
    }

    if result.errors() > 0 {
        info!(errors = result.errors(), "Migration completed with errors");
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("kv2couch=debug,warn")
    } else {
        EnvFilter::new("kv2couch=warn,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
