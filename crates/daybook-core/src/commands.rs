mod budget_ops;
mod focus_ops;
mod note_ops;
mod project_ops;
mod task_ops;
mod views;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::parse_date_expr;
use crate::model::{Priority, Project, Status};
use crate::render::Renderer;
use crate::store::Store;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "list",
        "info",
        "modify",
        "done",
        "delete",
        "toggle",
        "move",
        "day",
        "calendar",
        "projects",
        "project",
        "progress",
        "budget",
        "note",
        "focus",
        "export",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(store, cfg, renderer, inv))]
pub fn dispatch(
    store: &mut Store,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    match command {
        "add" => task_ops::cmd_add(store, &inv.command_args, now),
        "list" => task_ops::cmd_list(store, renderer, &inv.filter_terms, now),
        "info" => task_ops::cmd_info(store, renderer, &inv.filter_terms, now),
        "modify" => task_ops::cmd_modify(store, &inv.filter_terms, &inv.command_args, now),
        "done" => task_ops::cmd_done(store, &inv.filter_terms, now),
        "delete" => task_ops::cmd_delete(store, &inv.filter_terms, now),
        "toggle" => task_ops::cmd_toggle(store, &inv.command_args, now),
        "move" => task_ops::cmd_move(store, &inv.command_args, now),
        "day" => views::cmd_day(store, renderer, &inv.command_args, now),
        "calendar" => views::cmd_calendar(store, renderer, &inv.command_args, now),
        "projects" => project_ops::cmd_projects(store, renderer, now),
        "project" => project_ops::cmd_project(store, renderer, &inv.command_args, now),
        "progress" => project_ops::cmd_progress(store, renderer, &inv.command_args),
        "budget" => budget_ops::cmd_budget(store, renderer, &inv.command_args, now),
        "note" => note_ops::cmd_note(store, renderer, &inv.command_args, now),
        "focus" => focus_ops::cmd_focus(store, cfg, &inv.command_args, now),
        "export" => views::cmd_export(store, &inv.command_args),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

fn cmd_help() -> anyhow::Result<()> {
    println!("usage: daybook [filter] <command> [args]");
    println!();
    println!("tasks:     add TEXT project:NAME [start: end: priority: status:]");
    println!("           [filter] list | [filter] modify MODS | [filter] done | [filter] delete");
    println!("           [filter] info | toggle ID [DATE] | move ID GRAB_DATE DROP_DATE");
    println!("views:     day [DATE] | calendar [YYYY-MM]");
    println!("projects:  projects | project add NAME [due:DATE] | project view NAME");
    println!("           project done NAME | project delete NAME | progress [NAME]");
    println!("budget:    budget add income|expense AMOUNT DESC [project: category: date:]");
    println!("           budget list | budget summary | budget delete ID");
    println!("notes:     note add TITLE [CONTENT] | note list | note edit ID [title:T] [CONTENT]");
    println!("           note delete ID");
    println!("focus:     focus log [MINUTES] [project:NAME] | focus summary [DATE]");
    println!("other:     export COLLECTION | help | version");
    Ok(())
}

pub(crate) fn find_project<'a>(projects: &'a [Project], name: &str) -> Option<&'a Project> {
    projects.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Field edits parsed from `key:value` terms; anything else is task text.
#[derive(Debug, Default)]
pub(crate) struct TaskMods {
    pub text: Vec<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub project: Option<uuid::Uuid>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
}

pub(crate) fn parse_task_mods(
    args: &[String],
    projects: &[Project],
    now: DateTime<Utc>,
) -> anyhow::Result<TaskMods> {
    let mut mods = TaskMods::default();

    for arg in args {
        if let Some((key, value)) = arg.split_once(':') {
            match key.to_ascii_lowercase().as_str() {
                "start" => {
                    mods.start = Some(parse_date_expr(value, now)?);
                    continue;
                }
                "end" => {
                    mods.end = Some(parse_date_expr(value, now)?);
                    continue;
                }
                "project" => {
                    let project = find_project(projects, value)
                        .ok_or_else(|| anyhow!("unknown project: {value}"))?;
                    mods.project = Some(project.uuid);
                    continue;
                }
                "priority" => {
                    mods.priority = Some(
                        Priority::parse(value)
                            .ok_or_else(|| anyhow!("unknown priority: {value}"))?,
                    );
                    continue;
                }
                "status" => {
                    mods.status = Some(
                        Status::parse(value).ok_or_else(|| anyhow!("unknown status: {value}"))?,
                    );
                    continue;
                }
                _ => {}
            }
        }

        mods.text.push(arg.clone());
    }

    Ok(mods)
}
