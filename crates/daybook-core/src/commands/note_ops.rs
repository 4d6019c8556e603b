use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use crate::model::Note;
use crate::render::Renderer;
use crate::store::Store;

#[instrument(skip(store, renderer, args, now))]
pub(super) fn cmd_note(
    store: &mut Store,
    renderer: &mut Renderer,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let sub = args
        .first()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("note requires a subcommand: add/list/edit/delete"))?;

    match sub {
        "add" => note_add(store, &args[1..], now),
        "list" => note_list(store, renderer),
        "edit" => note_edit(store, &args[1..], now),
        "delete" => note_delete(store, &args[1..]),
        other => Err(anyhow!("unknown note subcommand: {other}")),
    }
}

#[instrument(skip(store, args, now))]
fn note_add(store: &mut Store, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command note add");

    let title = args
        .first()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("note add requires a title"))?;
    let content = args[1..].join(" ");

    let mut notes = store.load_notes()?;
    let next_id = store.next_note_id(&notes);
    notes.push(Note::new(title, content, now, next_id));
    store.save_notes(&notes)?;

    println!("Created note {next_id}.");
    Ok(())
}

#[instrument(skip(store, renderer))]
fn note_list(store: &mut Store, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command note list");

    let mut notes = store.load_notes()?;
    notes.sort_by(|a, b| b.modified.cmp(&a.modified));
    renderer.print_note_table(&notes)?;
    Ok(())
}

#[instrument(skip(store, args, now))]
fn note_edit(store: &mut Store, args: &[String], now: DateTime<Utc>) -> anyhow::Result<()> {
    info!("command note edit");

    let id: u64 = args
        .first()
        .ok_or_else(|| anyhow!("note edit requires an id"))?
        .parse()
        .map_err(|_| anyhow!("note edit requires a numeric id"))?;

    let mut title = None;
    let mut content_parts = Vec::new();
    for arg in &args[1..] {
        if let Some(value) = arg.strip_prefix("title:") {
            title = Some(value.to_string());
            continue;
        }
        content_parts.push(arg.clone());
    }

    if title.is_none() && content_parts.is_empty() {
        return Err(anyhow!("note edit requires a title: or new content"));
    }

    let mut notes = store.load_notes()?;
    let note = notes
        .iter_mut()
        .find(|note| note.id == Some(id))
        .ok_or_else(|| anyhow!("note not found: {id}"))?;

    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err(anyhow!("note title cannot be empty"));
        }
        note.title = title;
    }
    if !content_parts.is_empty() {
        note.content = content_parts.join(" ");
    }
    note.modified = now;

    store.save_notes(&notes)?;
    println!("Updated note {id}.");
    Ok(())
}

#[instrument(skip(store, args))]
fn note_delete(store: &mut Store, args: &[String]) -> anyhow::Result<()> {
    info!("command note delete");

    let id: u64 = args
        .first()
        .ok_or_else(|| anyhow!("note delete requires an id"))?
        .parse()
        .map_err(|_| anyhow!("note delete requires a numeric id"))?;

    let notes = store.load_notes()?;
    let before = notes.len();
    let kept: Vec<_> = notes.into_iter().filter(|note| note.id != Some(id)).collect();
    if kept.len() == before {
        return Err(anyhow!("note not found: {id}"));
    }
    store.save_notes(&kept)?;

    println!("Deleted note {id}.");
    Ok(())
}
