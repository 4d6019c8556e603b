use std::collections::BTreeSet;

use anyhow::anyhow;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use tracing::{info, instrument};

use crate::datetime::{date_key, parse_day_expr, project_timezone};
use crate::ledger::is_done_on;
use crate::model::Task;
use crate::render::Renderer;
use crate::schedule::is_on_date;
use crate::store::{COLLECTIONS, Store};

/// Day view: every task whose span covers the day, pending first.
#[instrument(skip(store, renderer, args, now))]
pub(super) fn cmd_day(
    store: &mut Store,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command day");
    let tz = project_timezone();

    let day = match args.first() {
        Some(expr) => parse_day_expr(expr, now)?,
        None => date_key(now, tz),
    };

    let projects = store.load_projects()?;
    let tasks = store.load_tasks()?;

    let mut on_day: Vec<Task> = tasks
        .into_iter()
        .filter(|task| is_on_date(task, day, tz))
        .collect();
    on_day.sort_by_key(|task| (is_done_on(task, day, tz), std::cmp::Reverse(task.priority)));

    renderer.print_day_list(day, &on_day, &projects, tz)?;
    Ok(())
}

/// Month calendar. A day is marked when at least one task covers it and is
/// not yet done for that day, matching the original's has-tasks dots.
#[instrument(skip(store, renderer, args, now))]
pub(super) fn cmd_calendar(
    store: &mut Store,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command calendar");
    let tz = project_timezone();
    let today = date_key(now, tz);

    let (year, month) = match args.first() {
        Some(raw) => parse_month(raw)?,
        None => (today.year(), today.month()),
    };

    let tasks = store.load_tasks()?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("invalid month: {year}-{month:02}"))?;

    let mut marked = BTreeSet::new();
    let mut cursor = first;
    while cursor.month() == month {
        if tasks
            .iter()
            .any(|task| is_on_date(task, cursor, tz) && !is_done_on(task, cursor, tz))
        {
            marked.insert(cursor);
        }
        cursor = cursor + chrono::Duration::days(1);
    }

    renderer.print_month_calendar(year, month, &marked, today)?;
    Ok(())
}

fn parse_month(raw: &str) -> anyhow::Result<(i32, u32)> {
    let (year_raw, month_raw) = raw
        .split_once('-')
        .ok_or_else(|| anyhow!("expected YYYY-MM, got: {raw}"))?;
    let year: i32 = year_raw
        .parse()
        .map_err(|_| anyhow!("invalid year in: {raw}"))?;
    let month: u32 = month_raw
        .parse()
        .map_err(|_| anyhow!("invalid month in: {raw}"))?;
    if !(1..=12).contains(&month) {
        return Err(anyhow!("month out of range in: {raw}"));
    }
    Ok((year, month))
}

/// Dumps a collection as a JSON array on stdout.
#[instrument(skip(store, args))]
pub(super) fn cmd_export(store: &mut Store, args: &[String]) -> anyhow::Result<()> {
    info!("command export");

    let collection = args
        .first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("export requires a collection: {}", COLLECTIONS.join("/")))?;

    let json = match collection {
        "projects" => serde_json::to_string_pretty(&store.load_projects()?)?,
        "tasks" => serde_json::to_string_pretty(&store.load_tasks()?)?,
        "budget" => serde_json::to_string_pretty(&store.load_budget()?)?,
        "notes" => serde_json::to_string_pretty(&store.load_notes()?)?,
        "sessions" => serde_json::to_string_pretty(&store.load_sessions()?)?,
        other => {
            return Err(anyhow!(
                "unknown collection: {other} (expected one of {})",
                COLLECTIONS.join("/")
            ));
        }
    };

    println!("{json}");
    Ok(())
}
