// Core modules
mod client;
mod error;
mod launcher;
mod sink;
mod trigger;

pub mod config;
pub mod types;

// Re-export key types and functions
pub use client::{HttpExperimentClient, StartExperiment};
pub use config::Catalog;
pub use error::RemoteCallError;
pub use launcher::{ExperimentLauncher, Launch, LaunchOutcome};
pub use sink::{FailureDetails, HttpJobSink, LogSink, ResultSink};
pub use trigger::{
    PipelineTriggerAdapter, PipelineTriggerEvent, ScheduleTriggerEvent, ScheduledLaunchRecord,
    ScheduledTriggerAdapter,
};

/// Convenience function to create a launcher backed by the HTTP client.
pub fn create_launcher(service_url: &str) -> anyhow::Result<ExperimentLauncher<HttpExperimentClient>> {
    let client = HttpExperimentClient::new(service_url)?;
    Ok(ExperimentLauncher::new(client))
}
