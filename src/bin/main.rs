use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use experiment_launcher::{
    Catalog, HttpJobSink, LogSink, PipelineTriggerAdapter, PipelineTriggerEvent,
    ScheduleTriggerEvent, ScheduledTriggerAdapter, create_launcher,
};

#[derive(Parser)]
#[command(name = "experiment-launcher")]
#[command(about = "Fault-injection experiment launcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one pipeline-stage trigger event and resolve the job
    HandlePipeline {
        /// Path to the trigger event JSON file
        #[arg(long)]
        event: PathBuf,
        /// Base URL of the experiment service
        #[arg(long, env = "EXPERIMENT_SERVICE_URL")]
        service_url: String,
        /// Base URL of the pipeline job-result callback
        #[arg(long, env = "PIPELINE_CALLBACK_URL")]
        callback_url: Option<String>,
        /// Report the outcome to the log instead of a callback endpoint
        #[arg(long, default_value_t = false)]
        log_only: bool,
    },
    /// Handle one scheduler trigger event (fire-and-forget)
    HandleSchedule {
        /// Path to the trigger event JSON file
        #[arg(long)]
        event: PathBuf,
        /// Base URL of the experiment service
        #[arg(long, env = "EXPERIMENT_SERVICE_URL")]
        service_url: String,
    },
    /// Load and validate the experiment catalog
    ValidateConfig,
    /// List the templates declared in the experiment catalog
    ListTemplates,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("experiment_launcher=info".parse()?),
        )
        .with_max_level(Level::INFO)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::HandlePipeline {
            event,
            service_url,
            callback_url,
            log_only,
        } => {
            let event: PipelineTriggerEvent = read_event(&event)?;
            info!(job_id = %event.job_id, "Handling pipeline trigger event");

            let launcher = create_launcher(&service_url)?;

            let correlation_id = if log_only {
                let adapter = PipelineTriggerAdapter::new(launcher, LogSink);
                adapter.handle(event).await?
            } else {
                let callback_url = callback_url
                    .context("--callback-url (or PIPELINE_CALLBACK_URL) required unless --log-only")?;
                let sink = HttpJobSink::new(&callback_url)?;
                let adapter = PipelineTriggerAdapter::new(launcher, sink);
                adapter.handle(event).await?
            };

            println!("Job resolved (correlation id {})", correlation_id);
        }
        Commands::HandleSchedule { event, service_url } => {
            let event: ScheduleTriggerEvent = read_event(&event)?;
            info!(event_id = %event.event_id, "Handling scheduled trigger event");

            let catalog = Catalog::load()?;
            let template_id = catalog
                .schedule_template()
                .context("No schedule template configured (set schedule.templateId or EXPERIMENT_TEMPLATE_ID)")?
                .clone();

            let launcher = create_launcher(&service_url)?;
            let adapter = ScheduledTriggerAdapter::new(launcher, template_id);
            adapter.handle(event).await;
        }
        Commands::ValidateConfig => {
            let catalog = Catalog::load()?;
            println!(
                "Catalog valid: {} template(s){}",
                catalog.len(),
                catalog
                    .schedule_template()
                    .map(|id| format!(", schedule launches {}", id))
                    .unwrap_or_default()
            );
        }
        Commands::ListTemplates => {
            let catalog = Catalog::load()?;
            if catalog.is_empty() {
                println!("No templates configured.");
                return Ok(());
            }
            for (id, template) in catalog.templates() {
                let description = template.description.as_deref().unwrap_or("-");
                println!("{:<32} {}", id, description);
                for (name, action) in &template.actions {
                    println!("    action {:<20} {}", name, action.action_id);
                }
            }
        }
    }

    Ok(())
}

fn read_event<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read event file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse event file {}", path.display()))
}
