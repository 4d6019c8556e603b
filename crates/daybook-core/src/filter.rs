use chrono::{DateTime, NaiveDate, Utc};
use tracing::trace;
use uuid::Uuid;

use crate::datetime::parse_day_expr;
use crate::model::{Priority, Project, Status, Task};
use crate::schedule::is_on_date;

#[derive(Debug, Clone)]
pub enum Pred {
    Id(u64),
    Uuid(Uuid),
    ProjectEq(Uuid),
    StatusEq(Status),
    PriorityEq(Priority),
    OnDate(NaiveDate),
    TextContains(String),
}

/// AND-composed task predicates parsed from the terms in front of a command:
/// a display id, a uuid, `project:NAME`, `status:S`, `priority:P`, `on:DATE`,
/// or a bare substring of the task text.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    preds: Vec<Pred>,
}

impl Filter {
    #[tracing::instrument(skip(terms, projects, now))]
    pub fn parse(
        terms: &[String],
        projects: &[Project],
        now: DateTime<Utc>,
    ) -> anyhow::Result<Self> {
        let mut preds = Vec::with_capacity(terms.len());

        for term in terms {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }

            if let Ok(id) = term.parse::<u64>() {
                preds.push(Pred::Id(id));
                continue;
            }

            if let Ok(uuid) = term.parse::<Uuid>() {
                preds.push(Pred::Uuid(uuid));
                continue;
            }

            if let Some((key, value)) = term.split_once(':') {
                match key.to_ascii_lowercase().as_str() {
                    "project" => {
                        let project = projects
                            .iter()
                            .find(|p| p.name.eq_ignore_ascii_case(value))
                            .ok_or_else(|| anyhow::anyhow!("unknown project: {value}"))?;
                        preds.push(Pred::ProjectEq(project.uuid));
                        continue;
                    }
                    "status" => {
                        let status = Status::parse(value)
                            .ok_or_else(|| anyhow::anyhow!("unknown status: {value}"))?;
                        preds.push(Pred::StatusEq(status));
                        continue;
                    }
                    "priority" => {
                        let priority = Priority::parse(value)
                            .ok_or_else(|| anyhow::anyhow!("unknown priority: {value}"))?;
                        preds.push(Pred::PriorityEq(priority));
                        continue;
                    }
                    "on" => {
                        let day = parse_day_expr(value, now)?;
                        preds.push(Pred::OnDate(day));
                        continue;
                    }
                    _ => {}
                }
            }

            preds.push(Pred::TextContains(term.to_ascii_lowercase()));
        }

        trace!(count = preds.len(), "parsed filter predicates");
        Ok(Self { preds })
    }

    pub fn is_empty(&self) -> bool {
        self.preds.is_empty()
    }

    pub fn matches(&self, task: &Task, tz: &chrono_tz::Tz) -> bool {
        self.preds.iter().all(|pred| match pred {
            Pred::Id(id) => task.id == Some(*id),
            Pred::Uuid(uuid) => task.uuid == *uuid,
            Pred::ProjectEq(project) => task.project == Some(*project),
            Pred::StatusEq(status) => task.effective_status() == *status,
            Pred::PriorityEq(priority) => task.priority == *priority,
            Pred::OnDate(day) => is_on_date(task, *day, tz),
            Pred::TextContains(needle) => task.text.to_ascii_lowercase().contains(needle),
        })
    }
}
