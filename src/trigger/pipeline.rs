//! Pipeline-stage trigger: launch an experiment and resolve the stage.
//!
//! The stage blocks until exactly one of success/failure is reported, so
//! this adapter treats "resolve the sink" as its hard obligation: whatever
//! the launcher does, a report is attempted before the adapter returns.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{error, info};

use crate::launcher::{Launch, LaunchOutcome};
use crate::sink::{FailureDetails, ResultSink};
use crate::types::{CorrelationId, ExperimentTemplateId, IdempotencyToken, PipelineJobId};

/// Output variable under which the started experiment's id is exposed to
/// downstream stages.
pub const OUTPUT_EXPERIMENT_ID: &str = "experimentId";

/// Inbound pipeline-stage event.
///
/// The job id doubles as the idempotency token: a redelivered stage run
/// carries the same job id, and the remote service deduplicates on it.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineTriggerEvent {
    #[serde(rename = "jobId")]
    pub job_id: PipelineJobId,
    /// Free-form configuration string naming the experiment template.
    #[serde(rename = "config")]
    pub config: String,
}

/// Adapts pipeline-stage events into launch invocations.
pub struct PipelineTriggerAdapter<L, S> {
    launcher: L,
    sink: S,
}

impl<L: Launch + Sync, S: ResultSink + Sync> PipelineTriggerAdapter<L, S> {
    pub fn new(launcher: L, sink: S) -> Self {
        Self { launcher, sink }
    }

    /// Handle one pipeline-stage event.
    ///
    /// Returns the correlation id assigned to the invocation. The error
    /// path is reached only when even the failure report could not be
    /// delivered; the stage is then left to the pipeline's own stuck-job
    /// handling, which is the one case this adapter cannot paper over.
    pub async fn handle(&self, event: PipelineTriggerEvent) -> anyhow::Result<CorrelationId> {
        let correlation_id = CorrelationId::generate();
        let token = IdempotencyToken::new(event.job_id.as_str());
        let template_id = ExperimentTemplateId::new(event.config);

        info!(
            job_id = %event.job_id,
            template_id = %template_id,
            correlation_id = %correlation_id,
            "Handling pipeline trigger"
        );

        let outcome = self.launcher.launch(&template_id, &token).await;

        match outcome {
            Ok(LaunchOutcome::Started { experiment_id }) => {
                let mut outputs = BTreeMap::new();
                outputs.insert(
                    OUTPUT_EXPERIMENT_ID.to_string(),
                    experiment_id.into_inner(),
                );

                if let Err(report_err) = self.sink.report_success(&event.job_id, outputs).await {
                    error!(
                        job_id = %event.job_id,
                        error = %report_err,
                        "Success report failed, falling back to failure report"
                    );
                    self.report_failure_best_effort(
                        &event.job_id,
                        format!("experiment started but success report failed: {report_err}"),
                        correlation_id.clone(),
                    )
                    .await?;
                }
            }
            Ok(LaunchOutcome::Failed { reason }) => {
                self.report_failure_best_effort(&event.job_id, reason, correlation_id.clone())
                    .await?;
            }
            Err(unexpected) => {
                self.report_failure_best_effort(
                    &event.job_id,
                    format!("launcher error: {unexpected}"),
                    correlation_id.clone(),
                )
                .await?;
            }
        }

        Ok(correlation_id)
    }

    async fn report_failure_best_effort(
        &self,
        job_id: &PipelineJobId,
        message: String,
        correlation_id: CorrelationId,
    ) -> anyhow::Result<()> {
        let details = FailureDetails::job_failed(message, correlation_id);
        self.sink
            .report_failure(job_id, details)
            .await
            .inspect_err(|e| {
                error!(job_id = %job_id, error = %e, "Failure report could not be delivered");
            })
    }
}
