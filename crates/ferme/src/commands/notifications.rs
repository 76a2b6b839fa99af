//! `ferme notifications` subcommands.

use anyhow::Result;

use ferme::client::FermeClient;
use ferme::notify::{FixedAnswer, NotificationPermission, PermissionPrompt, TerminalPrompt};

pub async fn status(client: &FermeClient) -> Result<()> {
    let reminders = client.reminders().await?;
    let displayed = client.notifications().await?;

    println!("Permission: {}", reminders.permission);
    println!("Scheduler:  {}", reminders.scheduler.state);
    if let Some(at) = reminders.scheduler.next_fire_at {
        println!("Next:       {}", at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(at) = reminders.scheduler.last_fired_at {
        println!("Last:       {}", at.format("%Y-%m-%d %H:%M"));
    }
    println!(
        "Tasks:      {} overdue, {} due within {} days",
        reminders.overdue.len(),
        reminders.due_soon.len(),
        reminders.due_soon_days
    );

    for notification in &displayed {
        println!(
            "  [{}] {}: {}",
            notification.tag, notification.title, notification.body
        );
    }
    Ok(())
}

/// Ask the user once, then report the answer to the server.
pub async fn enable(client: &FermeClient, yes: bool) -> Result<()> {
    let permission = match client.permission().await? {
        NotificationPermission::Default => {
            let prompt: Box<dyn PermissionPrompt> = if yes {
                Box::new(FixedAnswer(true))
            } else {
                Box::new(TerminalPrompt)
            };
            client.answer_permission(prompt.ask().await).await?
        }
        other => other,
    };

    match permission {
        NotificationPermission::Granted => println!("Reminders enabled."),
        NotificationPermission::Denied => {
            println!("Reminders are off. Run `ferme notifications reset` to be asked again.");
        }
        NotificationPermission::Unsupported => {
            println!("Notifications are disabled in the server configuration.");
        }
        NotificationPermission::Default => println!("Permission not decided."),
    }
    Ok(())
}

pub async fn disable(client: &FermeClient) -> Result<()> {
    let permission = client.revoke_permission().await?;
    println!("Permission: {}", permission);
    Ok(())
}

pub async fn reset(client: &FermeClient) -> Result<()> {
    let permission = client.reset_permission().await?;
    println!("Permission: {}", permission);
    Ok(())
}
