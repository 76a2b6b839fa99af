mod commands;

use std::net::IpAddr;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use ferme::config::DEFAULT_CONFIG_FILE;
use ferme::task::{TaskPriority, TaskStatus};

// ============================================================================
// CLI Types
// ============================================================================

/// Ferme - farm task tracking with daily due-date reminders
#[derive(Parser, Debug)]
#[command(version = ferme::build_info::VERSION, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server and the daily reminder scheduler
    Serve {
        #[command(subcommand)]
        action: Option<ServeAction>,

        /// Host to bind to (overrides config file)
        #[arg(long, global = true)]
        host: Option<IpAddr>,

        /// Port to listen on (overrides config file)
        #[arg(short, long, global = true)]
        port: Option<u16>,
    },

    /// Show what a reminder would say right now, without a server
    Check {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Manage tasks on a running server
    Task {
        #[command(subcommand)]
        action: TaskAction,

        /// Server URL (defaults to the configured host and port)
        #[arg(short, long, global = true)]
        server: Option<String>,
    },

    /// Manage notification permission on a running server
    Notifications {
        #[command(subcommand)]
        action: NotificationsAction,

        /// Server URL (defaults to the configured host and port)
        #[arg(short, long, global = true)]
        server: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ServeAction {
    /// Stop a running server
    Stop,
}

#[derive(Subcommand, Debug)]
enum TaskAction {
    /// List tasks
    List {
        /// Only tasks with this status (a_faire, en_cours, terminee)
        #[arg(long)]
        statut: Option<TaskStatus>,
    },

    /// Add a task
    Add {
        /// Task title
        titre: String,

        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<String>,

        /// Priority (haute, moyenne, basse)
        #[arg(long, default_value = "moyenne")]
        priorite: TaskPriority,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        categorie: Option<String>,
    },

    /// Mark a task as done
    Done { id: String },

    /// Put a done task back on the list
    Reopen { id: String },

    /// Delete a task
    Rm { id: String },
}

#[derive(Subcommand, Debug)]
enum NotificationsAction {
    /// Show permission, displayed notifications and next reminder
    Status,
    /// Ask for permission to send reminders
    Enable {
        /// Answer yes without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Turn reminders off
    Disable,
    /// Forget the decision so the question is asked again
    Reset,
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Serve { action, host, port } => match action {
            Some(ServeAction::Stop) => commands::serve::stop(&config, port).await,
            None => commands::serve::run(&config, host, port).await,
        },
        Commands::Check { json } => commands::check::run(&config, json).await,
        Commands::Task { action, server } => {
            let client = commands::connect(&config, server.as_deref()).await?;
            match action {
                TaskAction::List { statut } => commands::task::list(&client, statut).await,
                TaskAction::Add {
                    titre,
                    due,
                    priorite,
                    description,
                    categorie,
                } => {
                    commands::task::add(&client, titre, due, priorite, description, categorie)
                        .await
                }
                TaskAction::Done { id } => commands::task::done(&client, &id).await,
                TaskAction::Reopen { id } => commands::task::reopen(&client, &id).await,
                TaskAction::Rm { id } => commands::task::remove(&client, &id).await,
            }
        }
        Commands::Notifications { action, server } => {
            let client = commands::connect(&config, server.as_deref()).await?;
            match action {
                NotificationsAction::Status => commands::notifications::status(&client).await,
                NotificationsAction::Enable { yes } => {
                    commands::notifications::enable(&client, yes).await
                }
                NotificationsAction::Disable => commands::notifications::disable(&client).await,
                NotificationsAction::Reset => commands::notifications::reset(&client).await,
            }
        }
    }
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
