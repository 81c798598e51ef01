//! Remote experiment-service client.
//!
//! One operation exists at this boundary: ask the service to start an
//! experiment from a pre-registered template. The service deduplicates on
//! the caller's idempotency token, so a redelivered trigger that reuses its
//! token does not start a second experiment.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::RemoteCallError;
use crate::types::{ExperimentId, ExperimentTemplateId, IdempotencyToken};

/// Capability to start an experiment on the remote service.
///
/// The launcher holds this as an injected handle so tests can substitute a
/// stub without any process-wide state.
pub trait StartExperiment {
    fn start_experiment(
        &self,
        template_id: &ExperimentTemplateId,
        token: &IdempotencyToken,
    ) -> impl std::future::Future<Output = Result<ExperimentId, RemoteCallError>> + Send;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartExperimentRequest<'a> {
    client_token: &'a str,
    experiment_template_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct StartExperimentResponse {
    experiment: ExperimentBody,
}

#[derive(Debug, Deserialize)]
struct ExperimentBody {
    id: ExperimentId,
}

/// HTTP client for the experiment service.
///
/// Sends `POST {base_url}/experiments` with the template id and idempotency
/// token; a success response carries `{"experiment": {"id": ...}}`. No retry
/// and no client-side timeout: the hosting environment owns redelivery, and
/// a silent retry here would reuse the token with changed semantics.
pub struct HttpExperimentClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpExperimentClient {
    /// Build a client for the service at `base_url`.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)?;
        let endpoint = base.join("experiments")?;
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
        })
    }
}

impl StartExperiment for HttpExperimentClient {
    async fn start_experiment(
        &self,
        template_id: &ExperimentTemplateId,
        token: &IdempotencyToken,
    ) -> Result<ExperimentId, RemoteCallError> {
        let request = StartExperimentRequest {
            client_token: token.as_str(),
            experiment_template_id: template_id.as_str(),
        };

        debug!(
            template_id = %template_id,
            endpoint = %self.endpoint,
            "Sending start-experiment request"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // Preserve the serialized error body for the failure report.
            let payload = response.text().await.unwrap_or_default();
            return Err(RemoteCallError::Service {
                status: status.as_u16(),
                payload,
            });
        }

        let body: StartExperimentResponse = response
            .json()
            .await
            .map_err(|e| RemoteCallError::InvalidResponse(e.to_string()))?;

        Ok(body.experiment.id)
    }
}
