use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::datetime::{parse_date_expr, project_timezone};
use crate::model::{Project, Task};
use crate::progress::project_progress;
use crate::render::Renderer;
use crate::store::Store;

use super::find_project;

#[instrument(skip(store, renderer, now))]
pub(super) fn cmd_projects(
    store: &mut Store,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command projects");
    let projects = store.load_projects()?;
    let tasks = store.load_tasks()?;
    renderer.print_project_table(&projects, &tasks, project_timezone(), now)?;
    Ok(())
}

#[instrument(skip(store, renderer, args, now))]
pub(super) fn cmd_project(
    store: &mut Store,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let sub = args
        .first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("project requires a subcommand: add/view/done/delete"))?;

    match sub {
        "add" => project_add(store, &args[1..], now),
        "view" => project_view(store, renderer, &args[1..]),
        "done" => project_done(store, &args[1..]),
        "delete" => project_delete(store, &args[1..]),
        other => Err(anyhow!("unknown project subcommand: {other}")),
    }
}

#[instrument(skip(store, args, now))]
fn project_add(store: &mut Store, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command project add");

    let mut due = None;
    let mut name_parts = Vec::new();
    for arg in args {
        if let Some(value) = arg.strip_prefix("due:") {
            due = Some(parse_date_expr(value, now)?);
            continue;
        }
        name_parts.push(arg.clone());
    }

    let name = name_parts.join(" ").trim().to_string();
    if name.is_empty() {
        return Err(anyhow!("project name is required"));
    }

    let mut projects = store.load_projects()?;
    if find_project(&projects, &name).is_some() {
        return Err(anyhow!("project already exists: {name}"));
    }

    let next_id = store.next_project_id(&projects);
    let mut project = Project::new(name.clone(), now, next_id);
    project.due = due;
    projects.push(project);
    store.save_projects(&projects)?;

    println!("Created project '{name}'.");
    Ok(())
}

#[instrument(skip(store, renderer, args))]
fn project_view(store: &mut Store, renderer: &mut Renderer, args: &[String]) -> anyhow::Result<()> {
    info!("command project view");

    let name = args.join(" ");
    let projects = store.load_projects()?;
    let project = find_project(&projects, name.trim())
        .ok_or_else(|| anyhow!("unknown project: {name}"))?;

    let tasks = store.load_tasks()?;
    let tz = project_timezone();
    let owned: Vec<Task> = tasks
        .into_iter()
        .filter(|t| t.project == Some(project.uuid))
        .collect();

    println!(
        "{}: {} task(s), {}% complete",
        project.name,
        owned.len(),
        project_progress(project.uuid, &owned, tz)
    );
    renderer.print_task_table(&owned, &projects, tz)?;
    Ok(())
}

#[instrument(skip(store, args))]
fn project_done(store: &mut Store, args: &[String]) -> anyhow::Result<()> {
    info!("command project done");

    let name = args.join(" ");
    let mut projects = store.load_projects()?;
    let project = projects
        .iter_mut()
        .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
        .ok_or_else(|| anyhow!("unknown project: {name}"))?;

    project.completed = Some(true);
    let label = project.name.clone();
    store.save_projects(&projects)?;

    println!("Marked project '{label}' completed.");
    Ok(())
}

/// Deletes the project and every task that references it, as one
/// all-or-nothing operation in the store.
#[instrument(skip(store, args))]
fn project_delete(store: &mut Store, args: &[String]) -> anyhow::Result<()> {
    info!("command project delete");

    let name = args.join(" ");
    let projects = store.load_projects()?;
    let project = find_project(&projects, name.trim())
        .ok_or_else(|| anyhow!("unknown project: {name}"))?;
    let label = project.name.clone();

    let removed_tasks = store.delete_project_cascade(project.uuid)?;
    println!("Deleted project '{label}' and {removed_tasks} task(s).");
    Ok(())
}

#[instrument(skip(store, renderer, args))]
pub(super) fn cmd_progress(
    store: &mut Store,
    renderer: &mut Renderer,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command progress");
    let tz = project_timezone();

    let projects = store.load_projects()?;
    let tasks = store.load_tasks()?;

    if args.is_empty() {
        renderer.print_progress_bars(&projects, &tasks, tz)?;
        return Ok(());
    }

    let name = args.join(" ");
    let project = find_project(&projects, name.trim())
        .ok_or_else(|| anyhow!("unknown project: {name}"))?;
    println!("{}%", project_progress(project.uuid, &tasks, tz));
    Ok(())
}
