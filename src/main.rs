use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use helpdesk::actions::TicketActions;
use helpdesk::config::Config;
use helpdesk::logging;
use helpdesk::notifications::{LogNotifier, MemoryNotifier, NotificationLevel, Notifier};
use helpdesk::rest;
use helpdesk::service::{
    ActionRequest, HelpdeskService, HttpHelpdeskService, InMemoryHelpdeskService, TicketAction,
    TicketFilter,
};
use helpdesk::stepper::{resolve_steps_with, Stepper, StepperOptions};
use helpdesk::ticket::Ticket;

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(about = "Helpdesk ticket lifecycle stepper")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the stepper for a ticket snapshot (JSON or YAML file)
    Steps {
        file: PathBuf,

        /// Print the stepper as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a ticket from the ticket API and show its stepper
    Show {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// List tickets from the ticket API with their current step
    List {
        /// Only tickets in this status
        #[arg(short, long)]
        status: Option<String>,

        /// Only tickets assigned to this user
        #[arg(long)]
        assigned_to: Option<String>,
    },

    /// Perform an action (approve, reject, assign, progress, complete, confirm, close, reopen)
    Act {
        id: String,

        action: String,

        /// Acting user id
        #[arg(long)]
        actor: String,

        /// Free-text notes sent with the action
        #[arg(long)]
        notes: Option<String>,

        /// Assignee user id (required for `assign`)
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Start the REST API server
    Serve {
        /// Port to listen on (default: rest_api.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve tickets from a directory of JSON/YAML snapshots instead of the ticket API
        #[arg(long)]
        fixtures: Option<PathBuf>,
    },

    /// Print the JSON schema of a ticket snapshot
    Schema {
        /// Print the REST API's OpenAPI document instead
        #[arg(long)]
        openapi: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    let is_server_mode = matches!(cli.command, Commands::Serve { .. });
    let logging_handle = logging::init_logging(&config, is_server_mode, cli.debug)?;
    if let Some(ref path) = logging_handle.log_file_path {
        eprintln!("Logging to {}", path.display());
    }

    let options = StepperOptions::from(&config.stepper);

    match cli.command {
        Commands::Steps { file, json } => {
            let ticket = Ticket::from_file(&file)
                .with_context(|| format!("Failed to load ticket from {}", file.display()))?;
            print_stepper(&ticket, &options, json)?;
        }
        Commands::Show { id, json } => {
            let service = http_service(&config)?;
            let ticket = service.get_ticket(&id).await?;
            print_stepper(&ticket, &options, json)?;
        }
        Commands::List {
            status,
            assigned_to,
        } => {
            cmd_list(&config, &options, status, assigned_to).await?;
        }
        Commands::Act {
            id,
            action,
            actor,
            notes,
            assignee,
        } => {
            cmd_act(&config, &options, &id, &action, actor, notes, assignee).await?;
        }
        Commands::Serve { port, fixtures } => {
            cmd_serve(&config, port, fixtures).await?;
        }
        Commands::Schema { openapi } => {
            if openapi {
                println!("{}", rest::ApiDoc::json()?);
            } else {
                let schema = schemars::schema_for!(Ticket);
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
        }
    }

    Ok(())
}

fn http_service(config: &Config) -> Result<HttpHelpdeskService> {
    HttpHelpdeskService::from_config(&config.service).context("Ticket API unavailable")
}

fn print_stepper(ticket: &Ticket, options: &StepperOptions, json: bool) -> Result<()> {
    let stepper = Stepper::from_steps(resolve_steps_with(ticket, options));

    if json {
        println!("{}", serde_json::to_string_pretty(&stepper)?);
        return Ok(());
    }

    println!("Ticket {} ({})", ticket.display_id(), ticket.status());
    if let Some(ref title) = ticket.title {
        println!("  {}", title);
    }
    println!("{}", "─".repeat(60));
    for line in stepper.render_lines() {
        println!("{}", line);
    }

    Ok(())
}

async fn cmd_list(
    config: &Config,
    options: &StepperOptions,
    status: Option<String>,
    assigned_to: Option<String>,
) -> Result<()> {
    let service = http_service(config)?;
    let filter = TicketFilter {
        status,
        assigned_to,
        ..TicketFilter::default()
    };
    let tickets = service.list_tickets(&filter).await?;

    if tickets.is_empty() {
        println!("No tickets");
        return Ok(());
    }

    println!("Tickets ({})", tickets.len());
    println!("{}", "─".repeat(60));
    for ticket in &tickets {
        let stepper = Stepper::from_steps(resolve_steps_with(ticket, options));
        let current = stepper
            .active()
            .or(stepper.steps.last())
            .map(|step| format!("{} {}", step.status.glyph(), step.label))
            .unwrap_or_default();
        println!("{:<16} {:<32} {}", ticket.display_id(), ticket.status(), current);
    }

    Ok(())
}

async fn cmd_act(
    config: &Config,
    options: &StepperOptions,
    id: &str,
    action: &str,
    actor: String,
    notes: Option<String>,
    assignee: Option<String>,
) -> Result<()> {
    let action = TicketAction::parse(action, assignee.as_deref()).map_err(anyhow::Error::msg)?;
    let mut request = ActionRequest::new(action, actor);
    request.notes = notes;

    // Outcomes go both to the log and to the terminal
    let notifier = MemoryNotifier::new();
    let actions = TicketActions::new(http_service(config)?, notifier.clone());
    let result = actions.perform(id, &request).await;

    for notification in notifier.received() {
        LogNotifier.notify(notification.clone());
        match notification.level {
            NotificationLevel::Error => eprintln!("✗ {}", notification.message),
            NotificationLevel::Success | NotificationLevel::Info => {
                println!("✓ {}", notification.message)
            }
        }
    }

    let ticket = result?;
    println!();
    print_stepper(&ticket, options, false)
}

async fn cmd_serve(config: &Config, port: Option<u16>, fixtures: Option<PathBuf>) -> Result<()> {
    let port = port.unwrap_or(config.rest_api.port);

    let service: Option<Arc<dyn HelpdeskService>> = match fixtures {
        Some(dir) => {
            let service = InMemoryHelpdeskService::from_dir(&dir)?;
            tracing::info!(tickets = service.len(), dir = %dir.display(), "Loaded ticket fixtures");
            Some(Arc::new(service) as Arc<dyn HelpdeskService>)
        }
        None => match HttpHelpdeskService::from_config(&config.service) {
            Ok(service) => Some(Arc::new(service) as Arc<dyn HelpdeskService>),
            Err(e) => {
                tracing::warn!(error = %e, "Ticket API not configured, only POST /api/v1/stepper is available");
                None
            }
        },
    };

    println!("Starting REST API server...");
    println!("  Port: {}", port);
    println!("  Endpoints:");
    println!("    GET  /api/v1/health              Health check");
    println!("    POST /api/v1/stepper             Resolve a posted ticket");
    println!("    GET  /api/v1/tickets/:id/stepper Resolve a stored ticket");
    println!();

    let state = rest::ApiState::new(config.clone(), service);
    rest::serve(state, port).await?;

    Ok(())
}
