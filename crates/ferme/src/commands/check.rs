//! Offline reminder preview.
//!
//! Reads the task store directly, so it works with or without a running server.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local};
use serde::Serialize;

use ferme::config::Config;
use ferme::notify::{NotificationPermission, PermissionGate};
use ferme::reminder::{compose, next_fire_after, partition};
use ferme::store::file::{FileDocumentStore, FilePermissionStore};
use ferme::task::{DueSoonWindow, Task, TaskRepository, days_until_due};
use ferme_notify_protocol::NotificationIntent;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    permission: NotificationPermission,
    due_soon_days: u32,
    overdue: Vec<Task>,
    due_soon: Vec<Task>,
    /// What the next reminder would carry, whatever the permission.
    intents: Vec<NotificationIntent>,
    next_fire_at: Option<DateTime<Local>>,
}

pub async fn run(config_path: &str, json: bool) -> Result<()> {
    let config = Config::load(config_path).await?;
    let paths = config.paths(Path::new(config_path));

    let tasks = TaskRepository::new(Arc::new(FileDocumentStore::new(&paths.documents)))
        .list()
        .await?;
    let permission = PermissionGate::load(
        Arc::new(FilePermissionStore::new(&paths.permission_file)),
        config.notifications.enabled,
    )
    .await?
    .current();

    let now = Local::now();
    let window = DueSoonWindow::new(config.reminders.due_soon_days);
    let buckets = partition(&tasks, &now, window);
    let intents = compose(&buckets, &now);
    let next_fire_at = config
        .reminders
        .enabled
        .then(|| config.reminders.fire_at())
        .transpose()?
        .map(|at| next_fire_after(&now, at));

    let report = CheckReport {
        permission,
        due_soon_days: window.days,
        overdue: buckets.overdue.into_iter().cloned().collect(),
        due_soon: buckets.due_soon.into_iter().cloned().collect(),
        intents,
        next_fire_at,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &now);
    }
    Ok(())
}

fn print_report(report: &CheckReport, now: &DateTime<Local>) {
    println!("Permission: {}", report.permission);

    print_bucket("En retard", &report.overdue, now);
    print_bucket(
        &format!("À venir ({} jours)", report.due_soon_days),
        &report.due_soon,
        now,
    );

    if report.intents.is_empty() {
        println!("\nNo reminder to send.");
    } else {
        println!("\nReminders:");
        for intent in &report.intents {
            println!("  [{}] {}: {}", intent.tag, intent.title, intent.body);
        }
        if report.permission != NotificationPermission::Granted {
            println!("  (not sent: permission is {})", report.permission);
        }
    }

    match report.next_fire_at {
        Some(at) => println!("\nNext reminder: {}", at.format("%Y-%m-%d %H:%M")),
        None => println!("\nDaily reminders disabled"),
    }
}

fn print_bucket(label: &str, tasks: &[Task], now: &DateTime<Local>) {
    println!("\n{} ({}):", label, tasks.len());
    for task in tasks {
        let days = days_until_due(task, now).unwrap_or_default();
        println!(
            "  {}  {}  {}  ({:+} j)",
            task.id,
            task.date_echeance.as_deref().unwrap_or("-"),
            task.titre,
            days
        );
    }
}
