use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::datetime::{date_key, date_key_string, parse_day_expr, project_timezone};
use crate::model::FocusSession;
use crate::store::Store;

use super::find_project;

#[instrument(skip(store, cfg, args, now))]
pub(super) fn cmd_focus(
    store: &mut Store,
    cfg: &Config,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let sub = args
        .first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("focus requires a subcommand: log/summary"))?;

    match sub {
        "log" => focus_log(store, cfg, &args[1..], now),
        "summary" => focus_summary(store, &args[1..], now),
        other => Err(anyhow!("unknown focus subcommand: {other}")),
    }
}

/// Records one finished focus session. Duration defaults to the configured
/// `focus.minutes` (25 unless overridden).
#[instrument(skip(store, cfg, args, now))]
fn focus_log(
    store: &mut Store,
    cfg: &Config,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command focus log");

    let default_minutes: u32 = cfg
        .get("focus.minutes")
        .unwrap_or_else(|| "25".to_string())
        .parse()
        .map_err(|_| anyhow!("invalid focus.minutes config value"))?;

    let mut minutes = default_minutes;
    let mut project = None;

    for arg in args {
        if let Some(value) = arg.strip_prefix("project:") {
            let projects = store.load_projects()?;
            let found = find_project(&projects, value)
                .ok_or_else(|| anyhow!("unknown project: {value}"))?;
            project = Some(found.uuid);
            continue;
        }
        minutes = arg
            .parse()
            .map_err(|_| anyhow!("invalid minutes value: {arg}"))?;
    }

    if minutes == 0 {
        return Err(anyhow!("session minutes must be positive"));
    }

    let mut sessions = store.load_sessions()?;
    sessions.push(FocusSession {
        uuid: Uuid::new_v4(),
        date: now,
        minutes,
        project,
        completed: true,
    });
    store.save_sessions(&sessions)?;

    println!("Logged a {minutes} minute focus session.");
    Ok(())
}

#[instrument(skip(store, args, now))]
fn focus_summary(store: &mut Store, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command focus summary");
    let tz = project_timezone();

    let day = match args.first() {
        Some(expr) => parse_day_expr(expr, now)?,
        None => date_key(now, tz),
    };

    let sessions = store.load_sessions()?;
    let on_day: Vec<_> = sessions
        .iter()
        .filter(|session| date_key(session.date, tz) == day)
        .collect();
    let total_minutes: u64 = on_day.iter().map(|session| session.minutes as u64).sum();

    println!(
        "{}: {} session(s), {} minute(s) of focus.",
        date_key_string(day),
        on_day.len(),
        total_minutes
    );
    Ok(())
}
