// src/lib.rs

pub mod cli;
pub mod config;
pub mod console;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::BufReader;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::model::Catalog;
use crate::config::{load_and_validate, load_or_empty};
use crate::console::Console;
use crate::engine::DispatchService;
use crate::exec::{Actuator, DashboardActuator, SimulatedActuator};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - catalog loading
/// - actuator (dashboard or simulated)
/// - dispatch service + worker
/// - operator console on stdin/stdout
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let catalog_path = PathBuf::from(&args.catalog);

    if args.dry_run {
        let catalog = load_and_validate(&catalog_path)?;
        print_dry_run(&catalog);
        return Ok(());
    }

    let catalog = load_or_empty(&catalog_path);

    let actuator: Arc<dyn Actuator> = if args.simulate {
        info!(
            run_ms = catalog.actuator.simulated_run_ms,
            "using simulated actuator"
        );
        Arc::new(SimulatedActuator::new(catalog.actuator.simulated_run()))
    } else {
        info!(
            host = %catalog.actuator.host,
            port = catalog.actuator.port,
            "using dashboard actuator"
        );
        Arc::new(DashboardActuator::new(catalog.actuator.clone()))
    };

    let service = DispatchService::new(&catalog, actuator);
    service.set_mode(args.mode.into());
    for program in &args.enqueue {
        service.enqueue(program)?;
    }
    if args.autostart {
        service.start_processing();
    }

    let worker = service.spawn_worker();

    // Ctrl-C → graceful shutdown.
    {
        let svc = service.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; shutting down");
            svc.shutdown();
        });
    }

    let console = Console::new(service.clone(), catalog_path);
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        res = console.run(stdin, tokio::io::stdout()) => {
            if let Err(err) = res {
                warn!(error = %err, "console failed");
            }
            service.shutdown();
        }
        _ = wait_for_shutdown(&service) => {}
    }

    // The worker only looks at the shutdown flag between tasks.
    let mut worker = worker;
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut worker).await {
        Ok(joined) => joined??,
        Err(_) => {
            warn!("worker still busy with a task; aborting it");
            worker.abort();
        }
    }
    info!("duodag exiting");
    Ok(())
}

async fn wait_for_shutdown(service: &DispatchService) {
    let poll = service.settings().idle_interval();
    while !service.is_shutdown() {
        tokio::time::sleep(poll).await;
    }
}

/// Simple dry-run output: print tasks, prerequisites, programs and groups.
fn print_dry_run(catalog: &Catalog) {
    println!("duodag dry-run");
    println!(
        "  dispatcher.stuck_timeout_secs = {}",
        catalog.dispatcher.stuck_timeout_secs
    );
    println!("  dispatcher.max_retries = {}", catalog.dispatcher.max_retries);
    println!();

    let records = catalog.records();
    println!("tasks ({}):", records.len());
    for record in &records {
        println!("  - {}", record.name);
        match &record.program {
            Some(program) if !record.human_only => {
                println!("      program: {program}");
                println!(
                    "      estimated: {}s",
                    record.estimated_duration.as_secs()
                );
            }
            _ => println!("      human only"),
        }
        if !record.prerequisites.is_empty() {
            println!("      after: {:?}", record.prerequisites);
        }
    }

    let groups = catalog.groups();
    if !groups.is_empty() {
        println!();
        println!("groups ({}):", groups.len());
        for (group, names) in &groups {
            println!("  - {group}: {}", names.join(", "));
        }
    }

    debug!("dry-run complete (no execution)");
}
