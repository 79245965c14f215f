//! Status command - show accounts and their deadlines

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use super::get_context;
use crate::output;

fn format_hours(hours: Option<f64>) -> String {
    hours.map(|h| format!("{:.1}h", h)).unwrap_or_else(|| "-".to_string())
}

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status(Utc::now())?;

    if json {
        output::print_json(&status)?;
        return Ok(());
    }

    println!("{}", "Sisyphus Status".bold());
    if ctx.config.demo_mode {
        output::warning("Demo mode is on");
    }
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Active", &status.active_accounts.to_string()]);
    table.add_row(vec!["Sealed", &status.sealed_accounts.to_string()]);
    table.add_row(vec!["Overdue", &status.overdue_accounts.to_string()]);
    table.add_row(vec!["Grace period", &format!("{}h", status.grace_hours)]);
    println!("{}", table);

    if status.accounts.is_empty() {
        return Ok(());
    }

    println!();
    let mut accounts = output::create_table();
    accounts.set_header(vec!["ID", "User", "State", "Day", "Since check-in", "Remaining", "Contacts"]);
    for account in &status.accounts {
        let state = if !account.active {
            "sealed".dimmed().to_string()
        } else if account.overdue {
            "overdue".red().to_string()
        } else {
            "active".green().to_string()
        };

        accounts.add_row(vec![
            account.id.to_string(),
            account.username.clone(),
            state,
            account.day.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
            format_hours(account.hours_since_check_in),
            format_hours(account.hours_remaining),
            account.contacts.to_string(),
        ]);
    }
    println!("{}", accounts);

    Ok(())
}
