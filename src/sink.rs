//! Result sinks: where a triggered invocation reports its outcome.
//!
//! A pipeline stage blocks until its job is resolved, so the pipeline sink
//! must be called exactly once per invocation. The log sink exists for
//! trigger types with no caller to report back to.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{error, info};
use url::Url;

use crate::types::{CorrelationId, PipelineJobId};

/// Fixed failure classification attached to every failure report.
pub const FAILURE_TYPE_JOB_FAILED: &str = "JobFailed";

/// What a failure report carries back to the pipeline operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    pub message: String,
    #[serde(rename = "type")]
    pub failure_type: String,
    /// Correlation id of the invocation that produced the failure.
    pub external_execution_id: CorrelationId,
}

impl FailureDetails {
    pub fn job_failed(message: impl Into<String>, correlation_id: CorrelationId) -> Self {
        Self {
            message: message.into(),
            failure_type: FAILURE_TYPE_JOB_FAILED.to_string(),
            external_execution_id: correlation_id,
        }
    }
}

/// Destination for the outcome of one pipeline-triggered invocation.
pub trait ResultSink {
    /// Resolve the job as succeeded, attaching output values downstream
    /// stages can reference.
    fn report_success(
        &self,
        job_id: &PipelineJobId,
        outputs: BTreeMap<String, String>,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;

    /// Resolve the job as failed.
    fn report_failure(
        &self,
        job_id: &PipelineJobId,
        failure: FailureDetails,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessResultBody {
    output_variables: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureResultBody {
    failure_details: FailureDetails,
}

/// Reports job results to the pipeline's HTTP callback endpoint.
pub struct HttpJobSink {
    http: reqwest::Client,
    base: Url,
}

impl HttpJobSink {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            http: reqwest::Client::new(),
            base: Url::parse(base_url)?,
        })
    }

    fn job_url(&self, job_id: &PipelineJobId, resolution: &str) -> anyhow::Result<Url> {
        Ok(self
            .base
            .join(&format!("jobs/{}/{}", job_id, resolution))?)
    }

    async fn put_result<B: Serialize + Sync>(&self, url: Url, body: &B) -> anyhow::Result<()> {
        let response = self.http.put(url).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let payload = response.text().await.unwrap_or_default();
            anyhow::bail!("job result rejected with status {}: {}", status, payload);
        }
        Ok(())
    }
}

impl ResultSink for HttpJobSink {
    async fn report_success(
        &self,
        job_id: &PipelineJobId,
        outputs: BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        let url = self.job_url(job_id, "success")?;
        let body = SuccessResultBody {
            output_variables: outputs,
        };
        self.put_result(url, &body).await?;
        info!(job_id = %job_id, "Reported job success");
        Ok(())
    }

    async fn report_failure(
        &self,
        job_id: &PipelineJobId,
        failure: FailureDetails,
    ) -> anyhow::Result<()> {
        let url = self.job_url(job_id, "failure")?;
        let body = FailureResultBody {
            failure_details: failure,
        };
        self.put_result(url, &body).await?;
        info!(job_id = %job_id, "Reported job failure");
        Ok(())
    }
}

/// Sink that only emits diagnostics. Used where no pipeline callback exists.
pub struct LogSink;

impl ResultSink for LogSink {
    async fn report_success(
        &self,
        job_id: &PipelineJobId,
        outputs: BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        info!(job_id = %job_id, ?outputs, "Job succeeded");
        Ok(())
    }

    async fn report_failure(
        &self,
        job_id: &PipelineJobId,
        failure: FailureDetails,
    ) -> anyhow::Result<()> {
        error!(
            job_id = %job_id,
            message = %failure.message,
            correlation_id = %failure.external_execution_id,
            "Job failed"
        );
        Ok(())
    }
}
