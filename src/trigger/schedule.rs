//! Timer/schedule trigger: fire-and-forget launch of one fixed template.
//!
//! The scheduler has no channel for consuming a failure, so both outcomes
//! are swallowed into diagnostics and this adapter never returns an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::launcher::{Launch, LaunchOutcome};
use crate::types::{ExperimentId, ExperimentTemplateId, IdempotencyToken, TriggerEventId};

/// Inbound scheduler event. The event id doubles as the idempotency token,
/// so a redelivered timer tick does not start a second experiment.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleTriggerEvent {
    #[serde(rename = "eventId", alias = "id")]
    pub event_id: TriggerEventId,
}

/// Diagnostic record emitted once per scheduled invocation. This is the
/// only trace a scheduled launch leaves: there is no result sink.
#[derive(Debug, Serialize)]
pub struct ScheduledLaunchRecord {
    pub event_id: TriggerEventId,
    pub template_id: ExperimentTemplateId,
    pub experiment_id: Option<ExperimentId>,
    pub failure_reason: Option<String>,
    pub finished_at: DateTime<Utc>,
}

/// Adapts scheduler events into launch invocations of one statically
/// configured template.
pub struct ScheduledTriggerAdapter<L> {
    launcher: L,
    /// Set once per deployment, never taken from the event.
    template_id: ExperimentTemplateId,
}

impl<L: Launch + Sync> ScheduledTriggerAdapter<L> {
    pub fn new(launcher: L, template_id: ExperimentTemplateId) -> Self {
        Self {
            launcher,
            template_id,
        }
    }

    /// Handle one scheduler event. Infallible by contract: every outcome,
    /// including an unexpected launcher error, terminates in a log record.
    pub async fn handle(&self, event: ScheduleTriggerEvent) {
        let token = IdempotencyToken::new(event.event_id.as_str());

        info!(
            event_id = %event.event_id,
            template_id = %self.template_id,
            "Handling scheduled trigger"
        );

        let result = self.launcher.launch(&self.template_id, &token).await;

        let mut record = ScheduledLaunchRecord {
            event_id: event.event_id,
            template_id: self.template_id.clone(),
            experiment_id: None,
            failure_reason: None,
            finished_at: Utc::now(),
        };

        match result {
            Ok(LaunchOutcome::Started { experiment_id }) => {
                record.experiment_id = Some(experiment_id);
                info!(record = %render(&record), "Scheduled experiment started");
            }
            Ok(LaunchOutcome::Failed { reason }) => {
                record.failure_reason = Some(reason);
                warn!(record = %render(&record), "Scheduled experiment launch failed");
            }
            Err(unexpected) => {
                record.failure_reason = Some(format!("launcher error: {unexpected}"));
                error!(record = %render(&record), "Scheduled launch raised unexpectedly");
            }
        }
    }
}

fn render(record: &ScheduledLaunchRecord) -> String {
    serde_json::to_string(record).unwrap_or_else(|_| format!("{record:?}"))
}
