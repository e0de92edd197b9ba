//! Status command - show the cache state of a command

use crate::cache::CacheState;
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::Config;
use crate::error::ShcacheResult;
use crate::ui::{self, UiContext};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct StatusReport {
    command: String,
    key: String,
    path: String,
    state: CacheState,
    update_in_progress: bool,
    modified: Option<DateTime<Utc>>,
    timeout_secs: u64,
}

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> ShcacheResult<()> {
    let db = super::open(&args.target.command, config);

    let report = StatusReport {
        command: db.command().to_string(),
        key: db.key().to_string(),
        path: db.path().display().to_string(),
        state: db.cache_state()?,
        update_in_progress: db.update_in_progress()?,
        modified: db.entry().modified()?,
        timeout_secs: db.cache_timeout().as_secs(),
    };

    match args.format {
        OutputFormat::Table => print_table(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => println!("{}", report.state),
    }

    Ok(())
}

fn print_table(report: &StatusReport) {
    let ctx = UiContext::detect();

    ui::section(&ctx, &report.command);
    ui::key_value(&ctx, "key", &report.key);
    ui::key_value(&ctx, "path", &report.path);

    // A fresh handle never has anything in memory, so reread means cached
    let cached = report.state != CacheState::NeedsUpdate;
    ui::key_value_status(&ctx, "state", &report.state.to_string(), cached);
    ui::key_value_status(
        &ctx,
        "update in progress",
        if report.update_in_progress { "yes" } else { "no" },
        !report.update_in_progress,
    );

    let modified = report
        .modified
        .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());
    ui::key_value(&ctx, "last run", &modified);
    ui::key_value(&ctx, "timeout", &format!("{}s", report.timeout_secs));
}
