use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::datetime::parse_date_expr;
use crate::model::{BudgetItem, EntryKind};
use crate::render::Renderer;
use crate::store::Store;

use super::find_project;

#[instrument(skip(store, renderer, args, now))]
pub(super) fn cmd_budget(
    store: &mut Store,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let sub = args
        .first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("budget requires a subcommand: add/list/summary/delete"))?;

    match sub {
        "add" => budget_add(store, &args[1..], now),
        "list" => budget_list(store, renderer),
        "summary" => budget_summary(store, renderer),
        "delete" => budget_delete(store, &args[1..]),
        other => Err(anyhow!("unknown budget subcommand: {other}")),
    }
}

#[instrument(skip(store, args, now))]
fn budget_add(store: &mut Store, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command budget add");

    let kind_raw = args
        .first()
        .ok_or_else(|| anyhow!("budget add requires a type: income or expense"))?;
    let kind = EntryKind::parse(kind_raw)
        .ok_or_else(|| anyhow!("unknown budget type: {kind_raw} (expected income or expense)"))?;

    let amount_raw = args
        .get(1)
        .ok_or_else(|| anyhow!("budget add requires an amount"))?;
    let amount: f64 = amount_raw
        .parse()
        .map_err(|_| anyhow!("invalid amount: {amount_raw}"))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(anyhow!("amount must be a positive number, got: {amount_raw}"));
    }

    let projects = store.load_projects()?;
    let mut project: Option<Uuid> = None;
    let mut category = String::new();
    let mut date = now;
    let mut description_parts = Vec::new();

    for arg in &args[2..] {
        if let Some((key, value)) = arg.split_once(':') {
            match key.to_ascii_lowercase().as_str() {
                "project" => {
                    if value.eq_ignore_ascii_case("general") {
                        project = None;
                    } else {
                        let found = find_project(&projects, value)
                            .ok_or_else(|| anyhow!("unknown project: {value}"))?;
                        project = Some(found.uuid);
                    }
                    continue;
                }
                "category" => {
                    category = value.to_string();
                    continue;
                }
                "date" => {
                    date = parse_date_expr(value, now)?;
                    continue;
                }
                _ => {}
            }
        }
        description_parts.push(arg.clone());
    }

    let description = description_parts.join(" ").trim().to_string();
    if description.is_empty() {
        return Err(anyhow!("budget add requires a description"));
    }

    let mut items = store.load_budget()?;
    let next_id = store.next_budget_id(&items);
    items.push(BudgetItem {
        uuid: Uuid::new_v4(),
        id: Some(next_id),
        kind,
        amount,
        description,
        date,
        project,
        category,
        created: now,
    });
    store.save_budget(&items)?;

    println!("Recorded {} of {amount:.2}.", kind.label());
    Ok(())
}

#[instrument(skip(store, renderer))]
fn budget_list(store: &mut Store, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command budget list");

    let projects = store.load_projects()?;
    let mut items = store.load_budget()?;
    // newest first, like the original transaction list
    items.sort_by(|a, b| b.date.cmp(&a.date));

    renderer.print_budget_table(&items, &projects)?;
    Ok(())
}

#[instrument(skip(store, renderer))]
fn budget_summary(store: &mut Store, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command budget summary");

    let items = store.load_budget()?;
    let income: f64 = items
        .iter()
        .filter(|item| item.kind == EntryKind::Income)
        .map(|item| item.amount)
        .sum();
    let expenses: f64 = items
        .iter()
        .filter(|item| item.kind == EntryKind::Expense)
        .map(|item| item.amount)
        .sum();

    renderer.print_budget_summary(income, expenses)?;
    Ok(())
}

#[instrument(skip(store, args))]
fn budget_delete(store: &mut Store, args: &[String]) -> anyhow::Result<()> {
    info!("command budget delete");

    let id: u64 = args
        .first()
        .ok_or_else(|| anyhow!("budget delete requires an id"))?
        .parse()
        .map_err(|_| anyhow!("budget delete requires a numeric id"))?;

    let items = store.load_budget()?;
    let before = items.len();
    let kept: Vec<_> = items.into_iter().filter(|item| item.id != Some(id)).collect();
    if kept.len() == before {
        return Err(anyhow!("budget item not found: {id}"));
    }
    store.save_budget(&kept)?;

    println!("Deleted budget item {id}.");
    Ok(())
}
