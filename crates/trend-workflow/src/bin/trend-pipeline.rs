//! Demo entrypoint for the trend analysis pipeline
//!
//! Runs one or more symbols through the full pipeline against the
//! simulated source and prints the resulting reports plus a monitoring
//! summary.

use std::sync::Arc;
use tracing::info;
use trend_memory::MemoryManager;
use trend_monitor::MonitoringSystem;
use trend_workflow::{Orchestrator, PipelineOutcome, SimulatedSource, WorkflowConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    trend_utils::init_tracing();

    let inputs: Vec<String> = std::env::args().skip(1).collect();
    let inputs = if inputs.is_empty() {
        vec!["AAPL".to_string()]
    } else {
        inputs
    };

    let config = WorkflowConfig::default();
    let memory = Arc::new(MemoryManager::new());
    let monitor = Arc::new(MonitoringSystem::with_thresholds(config.thresholds));
    let orchestrator = Orchestrator::new(
        Arc::new(SimulatedSource::new()),
        memory,
        monitor.clone(),
        config,
    )?;

    info!(count = inputs.len(), "starting analysis");
    let outcomes = orchestrator.run_batch(&inputs).await;

    for (input, outcome) in inputs.iter().zip(&outcomes) {
        match outcome {
            PipelineOutcome::Completed(report) | PipelineOutcome::Degraded(report) => {
                println!("{}", report.to_markdown());
            }
            PipelineOutcome::Rejected(rejected) => {
                println!("Request for {input:?} was rejected: {}", rejected.reason);
            }
        }
        println!();
    }

    let summary = monitor.summary();
    println!("--- Monitoring summary ({:?} uptime) ---", summary.uptime);
    for (participant, stats) in &summary.participants {
        println!(
            "{participant}: {} ops, {:.0}% success, mean {:.1} ms",
            stats.count,
            stats.success_rate * 100.0,
            stats.mean_latency_ms
        );
    }
    for alert in monitor.check_thresholds() {
        println!("ALERT: {alert}");
    }

    Ok(())
}
