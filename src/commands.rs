//! The four fleet verbs: up, down, attack and report.
//!
//! Each verb takes the inventory and (where it talks to nodes) a remote
//! executor, so the same code runs against the real cloud and against the
//! in-memory doubles used in tests.

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::FleetError;
use crate::fleet::{Dispatcher, FleetPoller};
use crate::inventory::{Inventory, LaunchSpec};
use crate::metrics::{benchmark_from_outcome, summarize};
use crate::models::{
    AttackMetadata, AttackReport, FleetBenchmarkSummary, FleetSnapshot, NodeState, SetupResult,
    StateFilter, Tag, NAME_TAG,
};
use crate::remote::RemoteExecutor;
use crate::report;
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where to write the optional attack report.
#[derive(Debug, Clone)]
pub struct ReportTarget {
    pub path: PathBuf,
    pub format: OutputFormat,
}

/// A progress bar for fleet operations, hidden in quiet mode.
fn progress_bar(show: bool) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Launch `count` nodes, wait for them to boot and install the load
/// generator on each one.
pub async fn up(
    inventory: &dyn Inventory,
    executor: RemoteExecutor,
    config: &Config,
    count: usize,
    show_progress: bool,
) -> Result<Vec<SetupResult>> {
    if count == 0 {
        return Err(FleetError::Precondition(
            "You must declare a number of gophers greater than 0".to_string(),
        )
        .into());
    }

    println!("Adding {} gopher(s) to your army.", count);
    let spec = LaunchSpec::from_config(&config.fleet, count);
    info!(
        "Launching {} x {} from {} in {}",
        spec.count, spec.instance_type, spec.image, config.fleet.region
    );
    let ids = inventory
        .launch(&spec)
        .await
        .context("Failed to launch gophers")?;

    let marker = config.fleet.marker_tag();
    for id in &ids {
        inventory
            .tag(
                std::slice::from_ref(id),
                &[Tag::new(NAME_TAG, id), marker.clone()],
            )
            .await
            .with_context(|| format!("Failed to tag {}", id))?;
    }
    debug!("Tagged {} node(s) with {}={}", ids.len(), marker.key, marker.value);

    let boot = progress_bar(show_progress);
    boot.set_message("gophers awake");
    let ready = FleetPoller::new(inventory, marker)
        .with_progress(boot)
        .await_convergence(config.poller.interval(), config.poller.max_wait())
        .await
        .context("Gophers did not finish booting")?;

    println!("\nArming your gophers with grenades, stand back!");
    let setup_command = config.remote.setup_command.clone();
    let armed = progress_bar(show_progress);
    armed.set_message("gophers armed");
    let outcomes = Dispatcher::new(executor, config.dispatch.deadline())
        .with_progress(armed)
        .run_across_fleet(&ready, |_| setup_command.clone())
        .await;

    for outcome in outcomes.iter().filter(|o| !o.is_success()) {
        warn!("Setup failed on {}: {}", outcome.host, outcome.errors.join("; "));
    }
    print!("{}", report::console::setup_summary(&outcomes, ready.len()));

    Ok(outcomes)
}

/// Terminate every marker-tagged node. Returns how many were terminated.
pub async fn down(inventory: &dyn Inventory, config: &Config) -> Result<usize> {
    let nodes = inventory
        .list(&config.fleet.marker_tag(), StateFilter::Any)
        .await
        .context("Failed to list gophers")?;

    let ids: Vec<String> = nodes
        .into_iter()
        .filter(|n| !matches!(n.state, NodeState::Terminated | NodeState::ShuttingDown))
        .map(|n| n.id)
        .collect();

    if ids.is_empty() {
        println!("No gophers to nuke. Your army is already gone.");
        return Ok(0);
    }

    info!("Terminating {} node(s)", ids.len());
    inventory
        .terminate(&ids)
        .await
        .context("Failed to terminate gophers")?;

    println!("Your gopher army has been nuked from orbit.");
    Ok(ids.len())
}

/// Send every ready node after `url` and merge what they report.
pub async fn attack(
    inventory: &dyn Inventory,
    executor: RemoteExecutor,
    config: &Config,
    url: &str,
    output: Option<&ReportTarget>,
    show_progress: bool,
) -> Result<FleetBenchmarkSummary> {
    if url.trim().is_empty() {
        return Err(
            FleetError::Precondition("You must provide a url to start the attack".to_string())
                .into(),
        );
    }
    config.attack.validate()?;

    let ready = inventory
        .list(&config.fleet.marker_tag(), StateFilter::ready())
        .await
        .context("Failed to list gophers")?;

    if ready.is_empty() {
        println!("No gophers are ready to attack. Run `gophers up` first.");
        return Ok(FleetBenchmarkSummary::default());
    }

    println!("{} gophers are on the move!", ready.len());
    let started = Instant::now();
    let command = config.attack.command_for(url);
    info!("Attack command: {}", command);

    let progress = progress_bar(show_progress);
    progress.set_message("gophers reported");
    let outcomes = Dispatcher::new(executor, config.dispatch.deadline())
        .with_progress(progress)
        .run_across_fleet(&ready, |_| command.clone())
        .await;

    let results: Vec<_> = outcomes.into_iter().map(benchmark_from_outcome).collect();
    let summary = summarize(&results);
    print!("{}", report::console::attack_summary(&summary, &results));

    if let Some(target) = output {
        let attack_report = AttackReport {
            metadata: AttackMetadata {
                url: url.to_string(),
                attack_date: Utc::now(),
                command,
                requests_per_node: config.attack.requests,
                concurrency: config.attack.concurrent,
                duration_seconds: started.elapsed().as_secs_f64(),
            },
            summary: summary.clone(),
            results,
        };
        report::write_report(&attack_report, &target.path, target.format)?;
        println!("\nReport saved to: {}", target.path.display());
    }

    Ok(summary)
}

/// Print the status of every marker-tagged node.
pub async fn report(inventory: &dyn Inventory, config: &Config) -> Result<FleetSnapshot> {
    println!("Who knows where the gophers are?");
    let nodes = inventory
        .list(&config.fleet.marker_tag(), StateFilter::Any)
        .await
        .context("Failed to list gophers")?;

    print!("{}", report::console::fleet_status(&nodes));
    Ok(nodes)
}
