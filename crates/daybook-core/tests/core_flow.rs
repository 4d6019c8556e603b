use std::collections::BTreeSet;

use chrono::{TimeZone, Utc};
use chrono_tz::UTC;
use daybook_core::datetime::date_key_string;
use daybook_core::filter::Filter;
use daybook_core::ledger;
use daybook_core::model::{Project, Status, Task};
use daybook_core::progress::project_progress;
use daybook_core::store::Store;
use tempfile::tempdir;

fn instant(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().expect("valid instant")
}

#[test]
fn store_roundtrip_and_filtering() {
    let temp = tempdir().expect("tempdir");
    let store = Store::open(temp.path()).expect("open store");

    let now = Utc::now();
    let project = Project::new("Garden".to_string(), now, 1);
    store.save_projects(&[project.clone()]).expect("save projects");

    let mut task = Task::new(
        "Plant tomatoes".to_string(),
        instant(2024, 6, 1),
        instant(2024, 6, 3),
        project.uuid,
        now,
        1,
    );
    task.set_status(Status::InProgress);
    store.save_tasks(&[task]).expect("save tasks");

    let projects = store.load_projects().expect("load projects");
    let tasks = store.load_tasks().expect("load tasks");
    assert_eq!(projects.len(), 1);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].text, "Plant tomatoes");
    assert_eq!(tasks[0].effective_status(), Status::InProgress);

    let filter = Filter::parse(&["project:garden".to_string()], &projects, now).expect("parse");
    assert!(filter.matches(&tasks[0], &UTC));

    let wrong = Filter::parse(&["tomatoes".to_string(), "status:completed".to_string()], &projects, now)
        .expect("parse");
    assert!(!wrong.matches(&tasks[0], &UTC));
}

#[test]
fn toggled_ledger_survives_a_roundtrip_and_feeds_progress() {
    let temp = tempdir().expect("tempdir");
    let store = Store::open(temp.path()).expect("open store");

    let now = Utc::now();
    let project = Project::new("Garden".to_string(), now, 1);
    let mut task = Task::new(
        "Water daily".to_string(),
        instant(2024, 6, 1),
        instant(2024, 6, 3),
        project.uuid,
        now,
        1,
    );
    task.set_status(Status::InProgress);

    let day = chrono::NaiveDate::from_ymd_opt(2024, 6, 2).expect("valid date");
    task.completed_dates = ledger::toggle(&task.completed_dates, day);

    store.save_projects(&[project.clone()]).expect("save projects");
    store.save_tasks(&[task]).expect("save tasks");

    let tasks = store.load_tasks().expect("load tasks");
    assert!(tasks[0].completed_dates.contains(&date_key_string(day)));

    // one of three days checked: round(100/3) = 33
    assert_eq!(project_progress(project.uuid, &tasks, &UTC), 33);
}

#[test]
fn batch_delete_removes_the_whole_batch() {
    let temp = tempdir().expect("tempdir");
    let store = Store::open(temp.path()).expect("open store");

    let now = Utc::now();
    let project = Project::new("Garden".to_string(), now, 1);
    let a = Task::new("a".into(), now, now, project.uuid, now, 1);
    let b = Task::new("b".into(), now, now, project.uuid, now, 2);
    let c = Task::new("c".into(), now, now, project.uuid, now, 3);
    store.save_tasks(&[a.clone(), b.clone(), c.clone()]).expect("save tasks");

    let ids: BTreeSet<_> = [a.uuid, c.uuid].into_iter().collect();
    let removed = store.batch_delete_tasks(&ids).expect("batch delete");
    assert_eq!(removed, 2);

    let left = store.load_tasks().expect("load tasks");
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].uuid, b.uuid);
}

#[test]
fn cascade_delete_removes_project_and_all_its_tasks() {
    let temp = tempdir().expect("tempdir");
    let store = Store::open(temp.path()).expect("open store");

    let now = Utc::now();
    let doomed = Project::new("Doomed".to_string(), now, 1);
    let kept = Project::new("Kept".to_string(), now, 2);
    store
        .save_projects(&[doomed.clone(), kept.clone()])
        .expect("save projects");

    let a = Task::new("a".into(), now, now, doomed.uuid, now, 1);
    let b = Task::new("b".into(), now, now, doomed.uuid, now, 2);
    let other = Task::new("other".into(), now, now, kept.uuid, now, 3);
    store
        .save_tasks(&[a, b, other.clone()])
        .expect("save tasks");

    let removed = store.delete_project_cascade(doomed.uuid).expect("cascade");
    assert_eq!(removed, 2);

    let projects = store.load_projects().expect("load projects");
    let tasks = store.load_tasks().expect("load tasks");
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].uuid, kept.uuid);
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].uuid, other.uuid);
}

#[test]
fn cascade_delete_of_unknown_project_changes_nothing() {
    let temp = tempdir().expect("tempdir");
    let store = Store::open(temp.path()).expect("open store");

    let now = Utc::now();
    let project = Project::new("Garden".to_string(), now, 1);
    let task = Task::new("a".into(), now, now, project.uuid, now, 1);
    store.save_projects(&[project.clone()]).expect("save projects");
    store.save_tasks(&[task]).expect("save tasks");

    let err = store.delete_project_cascade(uuid::Uuid::new_v4());
    assert!(err.is_err());

    // nothing was touched: never a mixed state
    assert_eq!(store.load_projects().expect("load projects").len(), 1);
    assert_eq!(store.load_tasks().expect("load tasks").len(), 1);
}

#[test]
fn legacy_documents_without_status_still_load() {
    let temp = tempdir().expect("tempdir");
    let store = Store::open(temp.path()).expect("open store");

    // shaped like a document written by the original web client
    let legacy = format!(
        "{{\"uuid\":\"{}\",\"text\":\"old task\",\"start\":\"20240601T120000Z\",\
         \"end\":\"20240603T120000Z\",\"priority\":\"Medium\",\"completed\":true,\
         \"entry\":\"20240601T120000Z\",\"modified\":\"20240601T120000Z\"}}\n",
        uuid::Uuid::new_v4()
    );
    std::fs::write(&store.tasks_path, legacy).expect("write legacy doc");

    let tasks = store.load_tasks().expect("load tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].effective_status(), Status::Completed);
    assert!(tasks[0].completed_dates.is_empty());
}
