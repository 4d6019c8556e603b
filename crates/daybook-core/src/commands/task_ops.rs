use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::datetime::{date_key, date_key_string, day_start, parse_day_expr, project_timezone};
use crate::filter::Filter;
use crate::ledger;
use crate::model::{Status, Task};
use crate::render::Renderer;
use crate::schedule::{classify_drag, compute_retarget, task_span};
use crate::store::Store;

use super::{TaskMods, parse_task_mods};

#[instrument(skip(store, args, now))]
pub(super) fn cmd_add(store: &mut Store, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command add");
    let tz = project_timezone();

    let projects = store.load_projects()?;
    let mut tasks = store.load_tasks()?;

    let mods = parse_task_mods(args, &projects, now)?;
    let text = mods.text.join(" ").trim().to_string();
    if text.is_empty() {
        return Err(anyhow!("task text is required"));
    }
    let project = mods
        .project
        .ok_or_else(|| anyhow!("project:NAME is required"))?;

    let today = day_start(date_key(now, tz), tz)?;
    let start = mods.start.unwrap_or(today);
    let end = mods.end.unwrap_or(start);
    if date_key(end, tz) < date_key(start, tz) {
        return Err(anyhow!(
            "end date {} is before start date {}",
            date_key_string(date_key(end, tz)),
            date_key_string(date_key(start, tz))
        ));
    }

    let next_id = store.next_task_id(&tasks);
    let mut task = Task::new(text, start, end, project, now, next_id);
    if let Some(priority) = mods.priority {
        task.priority = priority;
    }
    if let Some(status) = mods.status {
        task.set_status(status);
    }

    tasks.push(task);
    store.save_tasks(&tasks)?;

    debug!(count = tasks.len(), "task added");
    println!("Created task {next_id}.");
    Ok(())
}

#[instrument(skip(store, renderer, filter_terms, now))]
pub(super) fn cmd_list(
    store: &mut Store,
    renderer: &mut Renderer,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");
    let tz = project_timezone();

    let projects = store.load_projects()?;
    let tasks = store.load_tasks()?;
    let filter = Filter::parse(filter_terms, &projects, now)?;

    let selected: Vec<Task> = tasks
        .into_iter()
        .filter(|task| filter.matches(task, tz))
        .collect();

    renderer.print_task_table(&selected, &projects, tz)?;
    Ok(())
}

#[instrument(skip(store, renderer, filter_terms, now))]
pub(super) fn cmd_info(
    store: &mut Store,
    renderer: &mut Renderer,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command info");
    let tz = project_timezone();

    let projects = store.load_projects()?;
    let tasks = store.load_tasks()?;
    let filter = Filter::parse(filter_terms, &projects, now)?;
    if filter.is_empty() {
        return Err(anyhow!("info requires a task selector"));
    }

    let mut found = false;
    for task in tasks.iter().filter(|task| filter.matches(task, tz)) {
        if found {
            println!();
        }
        renderer.print_task_info(task, &projects, tz)?;
        found = true;
    }

    if !found {
        return Err(anyhow!("no task matched the filter"));
    }
    Ok(())
}

#[instrument(skip(store, filter_terms, args, now))]
pub(super) fn cmd_modify(
    store: &mut Store,
    filter_terms: &[String],
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");
    let tz = project_timezone();

    let projects = store.load_projects()?;
    let mut tasks = store.load_tasks()?;
    let filter = Filter::parse(filter_terms, &projects, now)?;
    if filter.is_empty() {
        return Err(anyhow!("modify requires a filter; refusing to modify every task"));
    }

    let mods = parse_task_mods(args, &projects, now)?;

    let mut changed = 0_u64;
    for task in &mut tasks {
        if !filter.matches(task, tz) {
            continue;
        }
        apply_mods(task, &mods, now);
        if date_key(task.end, tz) < date_key(task.start, tz) {
            return Err(anyhow!(
                "end date {} is before start date {}",
                date_key_string(date_key(task.end, tz)),
                date_key_string(date_key(task.start, tz))
            ));
        }
        changed += 1;
    }

    if changed > 0 {
        store.save_tasks(&tasks)?;
    }

    println!("Modified {changed} task(s).");
    Ok(())
}

fn apply_mods(task: &mut Task, mods: &TaskMods, now: DateTime<Utc>) {
    if !mods.text.is_empty() {
        task.text = mods.text.join(" ").trim().to_string();
    }
    if let Some(start) = mods.start {
        task.start = start;
    }
    if let Some(end) = mods.end {
        task.end = end;
    }
    if let Some(project) = mods.project {
        task.project = Some(project);
    }
    if let Some(priority) = mods.priority {
        task.priority = priority;
    }
    if let Some(status) = mods.status {
        task.set_status(status);
    }
    task.modified = now;
}

#[instrument(skip(store, filter_terms, now))]
pub(super) fn cmd_done(
    store: &mut Store,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command done");
    let tz = project_timezone();

    let projects = store.load_projects()?;
    let mut tasks = store.load_tasks()?;
    let filter = Filter::parse(filter_terms, &projects, now)?;
    if filter.is_empty() {
        return Err(anyhow!("done requires a filter; refusing to complete every task"));
    }

    let mut changed = 0_u64;
    for task in &mut tasks {
        if filter.matches(task, tz) && task.effective_status() != Status::Completed {
            task.set_status(Status::Completed);
            task.modified = now;
            changed += 1;
        }
    }

    if changed > 0 {
        store.save_tasks(&tasks)?;
    }

    println!("Completed {changed} task(s).");
    Ok(())
}

#[instrument(skip(store, filter_terms, now))]
pub(super) fn cmd_delete(
    store: &mut Store,
    filter_terms: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command delete");
    let tz = project_timezone();

    let projects = store.load_projects()?;
    let tasks = store.load_tasks()?;
    let filter = Filter::parse(filter_terms, &projects, now)?;
    if filter.is_empty() {
        return Err(anyhow!("delete requires a filter; refusing to delete every task"));
    }

    let ids = tasks
        .iter()
        .filter(|task| filter.matches(task, tz))
        .map(|task| task.uuid)
        .collect();

    let removed = store.batch_delete_tasks(&ids)?;
    println!("Deleted {removed} task(s).");
    Ok(())
}

/// Flips the completion ledger for one day of one task. The ledger is
/// per-day and orthogonal to the task's terminal status.
#[instrument(skip(store, args, now))]
pub(super) fn cmd_toggle(
    store: &mut Store,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command toggle");
    let tz = project_timezone();

    let id: u64 = args
        .first()
        .ok_or_else(|| anyhow!("toggle requires a task id"))?
        .parse()
        .map_err(|_| anyhow!("toggle requires a numeric task id"))?;
    let day = match args.get(1) {
        Some(expr) => parse_day_expr(expr, now)?,
        None => date_key(now, tz),
    };

    let mut tasks = store.load_tasks()?;
    let task = tasks
        .iter_mut()
        .find(|task| task.id == Some(id))
        .ok_or_else(|| anyhow!("task not found: {id}"))?;

    task.completed_dates = ledger::toggle(&task.completed_dates, day);
    task.modified = now;
    let checked = ledger::is_completed_on(&task.completed_dates, day);

    store.save_tasks(&tasks)?;

    println!(
        "Task {id} {} for {}.",
        if checked { "checked off" } else { "unchecked" },
        date_key_string(day)
    );
    Ok(())
}

/// Drag-style retarget: classify which handle `GRAB_DATE` corresponds to,
/// compute the new span from `DROP_DATE`, persist it.
#[instrument(skip(store, args, now))]
pub(super) fn cmd_move(
    store: &mut Store,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command move");
    let tz = project_timezone();

    let id: u64 = args
        .first()
        .ok_or_else(|| anyhow!("move requires a task id"))?
        .parse()
        .map_err(|_| anyhow!("move requires a numeric task id"))?;
    let grab = parse_day_expr(
        args.get(1).ok_or_else(|| anyhow!("move requires a grab date"))?,
        now,
    )?;
    let drop = parse_day_expr(
        args.get(2).ok_or_else(|| anyhow!("move requires a drop date"))?,
        now,
    )?;

    let mut tasks = store.load_tasks()?;
    let task = tasks
        .iter_mut()
        .find(|task| task.id == Some(id))
        .ok_or_else(|| anyhow!("task not found: {id}"))?;

    let span = task_span(task, tz);
    if !span.contains(grab) {
        return Err(anyhow!(
            "grab date {} is outside the task span {}..{}",
            date_key_string(grab),
            date_key_string(span.start),
            date_key_string(span.end)
        ));
    }

    let kind = classify_drag(grab, span);
    let retargeted = compute_retarget(kind, span, drop);
    task.start = day_start(retargeted.start, tz)?;
    task.end = day_start(retargeted.end, tz)?;
    task.modified = now;

    debug!(?kind, ?retargeted, "retargeted span");
    store.save_tasks(&tasks)?;

    println!(
        "Task {id} now spans {}..{}.",
        date_key_string(retargeted.start),
        date_key_string(retargeted.end)
    );
    Ok(())
}
