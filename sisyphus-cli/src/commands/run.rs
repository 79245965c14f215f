//! Run command - sweep on a fixed interval until interrupted

use std::time::Duration;

use anyhow::{bail, Result};
use tokio::time::MissedTickBehavior;

use super::sweep::execute_sweep;
use super::{get_context, get_logger, log_event};
use crate::output;
use sisyphus_core::services::{EntryPoint, LogEvent};

pub async fn run(interval_secs: Option<u64>) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger(EntryPoint::Daemon);
    log_event(&logger, LogEvent::new("command_executed").with_command("run"));

    let service = ctx.sweep_service(None)?;
    let sweep = &ctx.config.sweep;
    let period = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| sweep.interval());
    if period.is_zero() {
        bail!("interval must be greater than zero");
    }

    output::info(&format!(
        "Sweeping every {}s (grace period {}h). Press Ctrl-C to stop.",
        period.as_secs(),
        sweep.grace_hours
    ));

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Created once so an interrupt during a sweep is seen on the next poll
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match execute_sweep(&service, &logger, sweep.grace_hours, sweep.timeout()).await {
                    Ok(report) => tracing::info!(
                        run_id = %report.run_id,
                        sealed = report.sealed,
                        failures = report.failures.len(),
                        "scheduled sweep finished"
                    ),
                    // A failed tick never stops the loop
                    Err(e) => tracing::error!(error = %e, "scheduled sweep failed"),
                }
            }
            _ = &mut shutdown => {
                output::info("Stopping scheduler");
                log_event(&logger, LogEvent::new("scheduler_stopped"));
                break;
            }
        }
    }

    Ok(())
}
