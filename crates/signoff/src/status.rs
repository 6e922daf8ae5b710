// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `signoff status` command implementation.
//!
//! Reads the database directly: per-user counters, runs left without
//! `completed_at`, queue depth, and the next sign-off Sunday.

use std::io::IsTerminal;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use signoff_config::model::SignoffConfig;
use signoff_core::{RunStatus, SIGNOFF_QUEUE, SignoffError};
use signoff_cron::next_signoff_sunday;
use signoff_cron::schedule::today;
use signoff_storage::models::{TimecardRun, User};
use signoff_storage::queries::{queue, runs, users};

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub next_signoff: Option<NaiveDate>,
    pub users: Vec<UserStatus>,
    pub interrupted_runs: Vec<InterruptedRun>,
    pub queue: QueueStatus,
}

#[derive(Debug, Serialize)]
pub struct UserStatus {
    pub id: i64,
    pub email: String,
    pub needs_password: bool,
    pub auto_signed_off: i64,
    pub already_signed_off: i64,
    pub failed_login: i64,
    pub last_status: Option<RunStatus>,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_signoff_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserStatus {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            needs_password: user.needs_password,
            auto_signed_off: user.auto_signed_off_count,
            already_signed_off: user.already_signed_off_count,
            failed_login: user.failed_login_count,
            last_status: user.last_timecard_check_status,
            last_check_at: user.last_timecard_check_at,
            last_signoff_at: user.last_timecard_signoff_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InterruptedRun {
    pub run_id: String,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
}

impl From<&TimecardRun> for InterruptedRun {
    fn from(run: &TimecardRun) -> Self {
        Self {
            run_id: run.id.clone(),
            user_id: run.user_id,
            started_at: run.started_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
}

/// Collect the status report from the database.
pub async fn collect_status(
    config: &SignoffConfig,
    db: &signoff_storage::Database,
) -> Result<StatusReport, SignoffError> {
    let all_users = users::list_users(db).await?;
    let interrupted = runs::incomplete_runs(db).await?;
    let counts = queue::counts(db, SIGNOFF_QUEUE).await?;

    Ok(StatusReport {
        next_signoff: next_signoff_sunday(
            today(config.scheduler.use_utc),
            config.scheduler.anchor_date,
        ),
        users: all_users.iter().map(UserStatus::from).collect(),
        interrupted_runs: interrupted.iter().map(InterruptedRun::from).collect(),
        queue: QueueStatus {
            pending: counts.pending,
            processing: counts.processing,
            completed: counts.completed,
            failed: counts.failed,
        },
    })
}

/// Run the `signoff status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub async fn run_status(config: &SignoffConfig, json: bool, plain: bool) -> Result<(), SignoffError> {
    let db = crate::serve::open_database(config).await?;
    let report = collect_status(config, &db).await?;
    db.close().await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print!("{}", render_report(&report, use_color));
    }
    Ok(())
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn status_label(status: Option<RunStatus>, use_color: bool) -> String {
    let Some(status) = status else {
        return "-".to_string();
    };
    let label = status.to_string();
    if !use_color {
        return label;
    }
    use colored::Colorize;
    if status.is_success() {
        label.green().to_string()
    } else {
        label.red().to_string()
    }
}

fn render_report(report: &StatusReport, use_color: bool) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("  signoff status\n");
    out.push_str(&format!("  {}\n", "-".repeat(35)));
    match report.next_signoff {
        Some(date) => out.push_str(&format!("    Next sign-off: {date}\n")),
        None => out.push_str("    Next sign-off: none\n"),
    }
    out.push_str(&format!(
        "    Queue:         {} pending, {} processing, {} failed\n",
        report.queue.pending, report.queue.processing, report.queue.failed
    ));

    out.push_str(&format!("\n  Users ({})\n", report.users.len()));
    for user in &report.users {
        let flag = if user.needs_password {
            " [needs password]"
        } else {
            ""
        };
        out.push_str(&format!(
            "    {}{flag}\n      signed off {}, already signed {}, failed {}\n      last: {} at {}\n",
            user.email,
            user.auto_signed_off,
            user.already_signed_off,
            user.failed_login,
            status_label(user.last_status, use_color),
            format_time(user.last_check_at),
        ));
    }

    if !report.interrupted_runs.is_empty() {
        out.push_str(&format!(
            "\n  Interrupted runs ({})\n",
            report.interrupted_runs.len()
        ));
        for run in &report.interrupted_runs {
            out.push_str(&format!(
                "    {} user {} started {}\n",
                run.run_id,
                run.user_id,
                format_time(Some(run.started_at))
            ));
        }
    }
    out.push('\n');
    out
}
