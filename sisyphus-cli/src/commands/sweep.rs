//! Sweep command - run one enforcement sweep

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use super::{get_context, get_logger, log_event};
use crate::output;
use sisyphus_core::services::{EntryPoint, LogEvent, LoggingService, SweepService};
use sisyphus_core::SweepReport;

pub struct SweepArgs {
    pub grace_hours: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub dry_run: bool,
    pub json: bool,
}

pub async fn run(args: SweepArgs) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger(EntryPoint::Cli);
    log_event(&logger, LogEvent::new("command_executed").with_command("sweep"));

    let service = ctx.sweep_service(args.dry_run.then_some(false))?;
    let grace_hours = args.grace_hours.unwrap_or(ctx.config.sweep.grace_hours);
    let timeout = args
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.sweep.timeout());

    let report = execute_sweep(&service, &logger, grace_hours, timeout).await?;

    if args.json {
        output::print_json(&report)?;
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Run a sweep evaluated at the current time and record it in the event log
pub async fn execute_sweep(
    service: &SweepService,
    logger: &Option<LoggingService>,
    grace_hours: u32,
    timeout: Duration,
) -> Result<SweepReport> {
    log_event(
        logger,
        LogEvent::new("sweep_started").with_detail(format!("grace_hours={}", grace_hours)),
    );

    match service.run_sweep(Utc::now(), grace_hours, timeout).await {
        Ok(report) => {
            if let Some(l) = logger {
                if let Err(e) = l.log_sweep_report(&report) {
                    tracing::warn!(error = %e, "failed to record sweep in event log");
                }
            }
            Ok(report)
        }
        Err(e) => {
            log_event(logger, LogEvent::new("sweep_failed").with_error(e.to_string()));
            Err(e.into())
        }
    }
}

pub fn print_report(report: &SweepReport) {
    println!("{} {}", "Sweep".bold(), report.run_id.to_string().dimmed());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Grace period", &format!("{}h", report.grace_hours)]);
    table.add_row(vec!["Active accounts scanned", &report.scanned.to_string()]);
    table.add_row(vec!["Overdue", &report.breached.to_string()]);
    table.add_row(vec!["Sealed", &report.sealed.to_string()]);
    if report.already_sealed > 0 {
        table.add_row(vec!["Already sealed", &report.already_sealed.to_string()]);
    }
    if report.skipped > 0 {
        table.add_row(vec!["Skipped (dry run)", &report.skipped.to_string()]);
    }
    table.add_row(vec![
        "Messages sent",
        &format!(
            "{} of {}",
            report.deliveries_attempted - report.deliveries_failed,
            report.deliveries_attempted
        ),
    ]);
    println!("{}", table);

    if !report.failures.is_empty() {
        println!();
        println!("{}", "Failures".red().bold());
        let mut failures = output::create_table();
        failures.set_header(vec!["Account", "State", "Kind", "Message"]);
        for failure in &report.failures {
            failures.add_row(vec![
                failure.account_id.to_string(),
                failure.state.as_str().to_string(),
                failure.kind.clone(),
                failure.message.clone(),
            ]);
        }
        println!("{}", failures);
    }

    if report.timed_out {
        println!();
        output::warning(&format!(
            "Sweep timed out; {} account(s) will be retried on the next run",
            report.incomplete.len()
        ));
        for pending in &report.incomplete {
            println!("  {} ({})", pending.account_id, pending.state.as_str());
        }
    }

    println!();
    if report.is_clean() {
        output::success("Sweep complete");
    } else {
        output::warning("Sweep complete with problems");
    }
}
