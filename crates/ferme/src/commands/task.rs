//! `ferme task` subcommands.

use anyhow::{Context, Result};

use ferme::client::FermeClient;
use ferme::task::{Task, TaskForm, TaskPriority, TaskStatus};

pub async fn list(client: &FermeClient, statut: Option<TaskStatus>) -> Result<()> {
    let tasks = client.list_tasks(statut).await?;
    if tasks.is_empty() {
        println!("No tasks.");
        return Ok(());
    }
    for task in &tasks {
        print_task(task);
    }
    Ok(())
}

pub async fn add(
    client: &FermeClient,
    titre: String,
    due: Option<String>,
    priorite: TaskPriority,
    description: Option<String>,
    categorie: Option<String>,
) -> Result<()> {
    let form = TaskForm {
        date_echeance: due,
        priorite,
        description,
        categorie,
        ..TaskForm::new(titre)
    };
    let task = client.create_task(&form).await.context("Failed to add task")?;
    println!("Added {}", task.id);
    Ok(())
}

pub async fn done(client: &FermeClient, id: &str) -> Result<()> {
    let task = client.complete_task(id).await?;
    println!("Done: {}", task.titre);
    Ok(())
}

pub async fn reopen(client: &FermeClient, id: &str) -> Result<()> {
    let task = client.reopen_task(id).await?;
    println!("Reopened: {}", task.titre);
    Ok(())
}

pub async fn remove(client: &FermeClient, id: &str) -> Result<()> {
    client.delete_task(id).await?;
    println!("Deleted {}", id);
    Ok(())
}

fn print_task(task: &Task) {
    println!(
        "{}  {:<8}  {:<7}  {:<10}  {}",
        task.id,
        task.statut,
        task.priorite,
        task.date_echeance.as_deref().unwrap_or("-"),
        task.titre
    );
}
