use std::collections::BTreeSet;
use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;
use uuid::Uuid;

use crate::config::Config;
use crate::datetime::date_key_string;
use crate::ledger::is_done_on;
use crate::model::{BudgetItem, Note, Project, Task};
use crate::progress::project_progress;
use crate::schedule::task_span;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks, projects, tz))]
    pub fn print_task_table(
        &mut self,
        tasks: &[Task],
        projects: &[Project],
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Project".to_string(),
            "Pri".to_string(),
            "Status".to_string(),
            "Description".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let span = task_span(task, tz);
            let id = task
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let id = self.paint(&id, "33");

            rows.push(vec![
                id,
                date_key_string(span.start),
                date_key_string(span.end),
                project_label(task.project, projects).to_string(),
                task.priority.label().to_string(),
                task.effective_status().label().to_string(),
                task.text.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// One line per task on a day: check state, priority, project, text.
    #[tracing::instrument(skip(self, tasks, projects, tz))]
    pub fn print_day_list(
        &mut self,
        day: NaiveDate,
        tasks: &[Task],
        projects: &[Project],
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Tasks for {}", date_key_string(day))?;

        if tasks.is_empty() {
            writeln!(out, "  (none)")?;
            return Ok(());
        }

        for task in tasks {
            let done = is_done_on(task, day, tz);
            let mark = if done { "[x]" } else { "[ ]" };
            let id = task
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let line = format!(
                "  {mark} {id:>3}  {:<6} {}  ({})",
                task.priority.label(),
                task.text,
                project_label(task.project, projects)
            );
            if done {
                writeln!(out, "{}", self.paint(&line, "2"))?;
            } else {
                writeln!(out, "{line}")?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, task, projects, tz))]
    pub fn print_task_info(
        &mut self,
        task: &Task,
        projects: &[Project],
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let span = task_span(task, tz);

        writeln!(
            out,
            "id        {}",
            task.id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        writeln!(out, "uuid      {}", task.uuid)?;
        writeln!(out, "text      {}", task.text)?;
        writeln!(out, "project   {}", project_label(task.project, projects))?;
        writeln!(out, "start     {}", date_key_string(span.start))?;
        writeln!(out, "end       {}", date_key_string(span.end))?;
        writeln!(out, "priority  {}", task.priority.label())?;
        writeln!(out, "status    {}", task.effective_status().label())?;
        writeln!(out, "entry     {}", task.entry.format("%Y%m%dT%H%M%SZ"))?;
        writeln!(out, "modified  {}", task.modified.format("%Y%m%dT%H%M%SZ"))?;

        if !task.completed_dates.is_empty() {
            let days: Vec<&str> = task.completed_dates.iter().map(String::as_str).collect();
            writeln!(out, "checked   {}", days.join(", "))?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, projects, tasks, tz, now))]
    pub fn print_project_table(
        &mut self,
        projects: &[Project],
        tasks: &[Task],
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Project".to_string(),
            "Tasks".to_string(),
            "Progress".to_string(),
            "Status".to_string(),
            "Created".to_string(),
        ];

        let mut rows = Vec::with_capacity(projects.len());
        for project in projects {
            let task_count = tasks
                .iter()
                .filter(|t| t.project == Some(project.uuid))
                .count();
            let progress = project_progress(project.uuid, tasks, tz);
            let id = project
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());

            let status = project.status_label(now);
            let status = match status {
                "Overdue" => self.paint(status, "31"),
                "Completed" => self.paint(status, "32"),
                other => other.to_string(),
            };

            rows.push(vec![
                self.paint(&id, "33"),
                project.name.clone(),
                task_count.to_string(),
                format!("{progress}%"),
                status,
                project.created.format("%Y-%m-%d").to_string(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    /// Text progress bars, one per project.
    #[tracing::instrument(skip(self, projects, tasks, tz))]
    pub fn print_progress_bars(
        &mut self,
        projects: &[Project],
        tasks: &[Task],
        tz: &Tz,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let name_width = projects
            .iter()
            .map(|p| UnicodeWidthStr::width(p.name.as_str()))
            .max()
            .unwrap_or(0);

        for project in projects {
            let progress = project_progress(project.uuid, tasks, tz) as usize;
            let filled = progress * 20 / 100;
            let bar = format!("{}{}", "#".repeat(filled), "-".repeat(20 - filled));
            let pad = name_width.saturating_sub(UnicodeWidthStr::width(project.name.as_str()));
            writeln!(
                out,
                "{}{} [{}] {:>3}%",
                project.name,
                " ".repeat(pad),
                self.paint(&bar, "36"),
                progress
            )?;
        }

        Ok(())
    }

    /// Month grid in the original's calendar layout: weekday header, leading
    /// blanks to the first day's weekday, task-bearing days marked.
    #[tracing::instrument(skip(self, marked, today))]
    pub fn print_month_calendar(
        &mut self,
        year: i32,
        month: u32,
        marked: &BTreeSet<NaiveDate>,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| anyhow!("invalid month: {year}-{month}"))?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| anyhow!("invalid month successor for {year}-{month}"))?;
        let last = next_month - Duration::days(1);

        let title = first.format("%B %Y").to_string();
        writeln!(out, "{title:^28}")?;
        writeln!(out, " Su  Mo  Tu  We  Th  Fr  Sa")?;

        let mut line = String::new();
        let leading = first.weekday().num_days_from_sunday();
        for _ in 0..leading {
            line.push_str("    ");
        }

        for day_num in 1..=last.day() {
            let date = NaiveDate::from_ymd_opt(year, month, day_num)
                .ok_or_else(|| anyhow!("invalid day {year}-{month}-{day_num}"))?;
            let mark = if marked.contains(&date) { '*' } else { ' ' };
            let mut cell = format!("{day_num:>3}{mark}");
            if date == today {
                cell = self.paint(&cell, "7");
            } else if marked.contains(&date) {
                cell = self.paint(&cell, "33");
            }
            line.push_str(&cell);

            if date.weekday().num_days_from_sunday() == 6 {
                writeln!(out, "{}", line.trim_end())?;
                line.clear();
            }
        }

        if !line.trim().is_empty() {
            writeln!(out, "{}", line.trim_end())?;
        }

        Ok(())
    }

    #[tracing::instrument(skip(self, items, projects))]
    pub fn print_budget_table(
        &mut self,
        items: &[BudgetItem],
        projects: &[Project],
    ) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Date".to_string(),
            "Type".to_string(),
            "Amount".to_string(),
            "Category".to_string(),
            "Project".to_string(),
            "Description".to_string(),
        ];

        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let id = item
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let signed = match item.kind {
                crate::model::EntryKind::Income => {
                    self.paint(&format!("+{:.2}", item.amount), "32")
                }
                crate::model::EntryKind::Expense => {
                    self.paint(&format!("-{:.2}", item.amount), "31")
                }
            };
            let project = match item.project {
                Some(uuid) => project_label(Some(uuid), projects).to_string(),
                None => "General".to_string(),
            };

            rows.push(vec![
                self.paint(&id, "33"),
                item.date.format("%Y-%m-%d").to_string(),
                item.kind.label().to_string(),
                signed,
                item.category.clone(),
                project,
                item.description.clone(),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn print_budget_summary(&mut self, income: f64, expenses: f64) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let remaining = income - expenses;
        let remaining_text = format!("{remaining:.2}");
        let remaining_text = if remaining >= 0.0 {
            self.paint(&remaining_text, "32")
        } else {
            self.paint(&remaining_text, "31")
        };

        writeln!(out, "Income     {income:.2}")?;
        writeln!(out, "Expenses   {expenses:.2}")?;
        writeln!(out, "Remaining  {remaining_text}")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, notes))]
    pub fn print_note_table(&mut self, notes: &[Note]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        let headers = vec![
            "ID".to_string(),
            "Modified".to_string(),
            "Title".to_string(),
            "Content".to_string(),
        ];

        let mut rows = Vec::with_capacity(notes.len());
        for note in notes {
            let id = note
                .id
                .map(|value| value.to_string())
                .unwrap_or_else(|| "-".to_string());
            let title = if note.title.trim().is_empty() {
                "Untitled Note".to_string()
            } else {
                note.title.clone()
            };

            rows.push(vec![
                self.paint(&id, "33"),
                note.modified.format("%Y-%m-%d %H:%M").to_string(),
                title,
                truncate(&note.content, 48),
            ]);
        }

        write_table(&mut out, headers, rows)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Falls back to "No Project" / "Unknown Project" instead of erroring on a
/// dangling reference.
pub fn project_label(project: Option<Uuid>, projects: &[Project]) -> &str {
    match project {
        None => "No Project",
        Some(uuid) => projects
            .iter()
            .find(|p| p.uuid == uuid)
            .map(|p| p.name.as_str())
            .unwrap_or("Unknown Project"),
    }
}

fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::project_label;
    use crate::model::Project;

    #[test]
    fn dangling_references_get_fallback_labels() {
        let projects = vec![Project::new("Home".into(), Utc::now(), 1)];
        assert_eq!(project_label(None, &projects), "No Project");
        assert_eq!(project_label(Some(Uuid::new_v4()), &projects), "Unknown Project");
        assert_eq!(project_label(Some(projects[0].uuid), &projects), "Home");
    }
}
