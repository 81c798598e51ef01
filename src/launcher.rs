//! Core launch primitive: start one experiment, classify the result.
//!
//! One invocation performs at most one remote call and produces exactly one
//! [`LaunchOutcome`]. Nothing is cached, nothing is retried, no state
//! survives the invocation; duplicate suppression across redeliveries is the
//! remote service's contract via the idempotency token.

use tracing::{info, warn};

use crate::client::StartExperiment;
use crate::types::{ExperimentId, ExperimentTemplateId, IdempotencyToken};

/// The single terminal outcome of one launch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The remote service accepted the request and created an experiment.
    Started { experiment_id: ExperimentId },
    /// The request was rejected or never reached the service. `reason`
    /// carries the serialized error for diagnosis.
    Failed { reason: String },
}

/// Capability to run one launch invocation.
///
/// [`ExperimentLauncher`] is the production implementation and always
/// returns `Ok`; the fallible signature exists so trigger adapters are
/// forced to survive an unexpected launcher failure as well.
pub trait Launch {
    fn launch(
        &self,
        template_id: &ExperimentTemplateId,
        token: &IdempotencyToken,
    ) -> impl std::future::Future<Output = anyhow::Result<LaunchOutcome>> + Send;
}

/// Starts experiments through an injected remote-client handle.
pub struct ExperimentLauncher<C> {
    client: C,
}

impl<C: StartExperiment + Sync> ExperimentLauncher<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Perform exactly one start-experiment request and classify the result.
    ///
    /// Every remote error becomes `Failed`; this function never raises past
    /// its boundary. Empty identifiers are rejected up front without a
    /// remote call, since the service would reject them anyway and the
    /// failure reads better when caught here.
    pub async fn launch(
        &self,
        template_id: &ExperimentTemplateId,
        token: &IdempotencyToken,
    ) -> LaunchOutcome {
        if template_id.is_empty() {
            return LaunchOutcome::Failed {
                reason: "experiment template id is empty".to_string(),
            };
        }
        if token.is_empty() {
            return LaunchOutcome::Failed {
                reason: "idempotency token is empty".to_string(),
            };
        }

        match self.client.start_experiment(template_id, token).await {
            Ok(experiment_id) => {
                info!(
                    template_id = %template_id,
                    experiment_id = %experiment_id,
                    "Experiment started"
                );
                LaunchOutcome::Started { experiment_id }
            }
            Err(err) => {
                warn!(
                    template_id = %template_id,
                    error = %err,
                    "Experiment launch failed"
                );
                LaunchOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

impl<C: StartExperiment + Sync> Launch for ExperimentLauncher<C> {
    async fn launch(
        &self,
        template_id: &ExperimentTemplateId,
        token: &IdempotencyToken,
    ) -> anyhow::Result<LaunchOutcome> {
        Ok(ExperimentLauncher::launch(self, template_id, token).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteCallError;
    use std::sync::Mutex;

    /// Stub client that records calls and returns a canned result.
    struct StubClient {
        result: Result<ExperimentId, RemoteCallError>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StubClient {
        fn new(result: Result<ExperimentId, RemoteCallError>) -> Self {
            Self {
                result,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl StartExperiment for StubClient {
        async fn start_experiment(
            &self,
            template_id: &ExperimentTemplateId,
            token: &IdempotencyToken,
        ) -> Result<ExperimentId, RemoteCallError> {
            self.calls
                .lock()
                .unwrap()
                .push((template_id.to_string(), token.to_string()));
            self.result.clone()
        }
    }

    #[tokio::test]
    async fn test_successful_remote_call_yields_started() {
        let launcher = ExperimentLauncher::new(StubClient::new(Ok(ExperimentId::new("exp-999"))));

        let outcome = launcher
            .launch(&"tmpl-123".into(), &IdempotencyToken::new("job-1"))
            .await;

        assert_eq!(
            outcome,
            LaunchOutcome::Started {
                experiment_id: ExperimentId::new("exp-999")
            }
        );
    }

    #[tokio::test]
    async fn test_remote_error_yields_failed_with_serialized_payload() {
        let err = RemoteCallError::Service {
            status: 400,
            payload: r#"{"message":"template does not exist"}"#.to_string(),
        };
        let launcher = ExperimentLauncher::new(StubClient::new(Err(err)));

        let outcome = launcher
            .launch(&"tmpl-123".into(), &IdempotencyToken::new("job-1"))
            .await;

        match outcome {
            LaunchOutcome::Failed { reason } => {
                assert!(reason.contains("template does not exist"));
                assert!(reason.contains("400"));
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_is_passed_through_unchanged() {
        let client = StubClient::new(Ok(ExperimentId::new("exp-1")));
        let launcher = ExperimentLauncher::new(client);

        launcher
            .launch(&"tmpl-123".into(), &IdempotencyToken::new("job-42"))
            .await;

        let calls = launcher.client.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[("tmpl-123".into(), "job-42".into())]);
    }

    #[tokio::test]
    async fn test_empty_template_id_fails_without_remote_call() {
        let client = StubClient::new(Ok(ExperimentId::new("exp-1")));
        let launcher = ExperimentLauncher::new(client);

        let outcome = launcher
            .launch(&"".into(), &IdempotencyToken::new("job-1"))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Failed { .. }));
        assert!(launcher.client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_token_fails_without_remote_call() {
        let client = StubClient::new(Ok(ExperimentId::new("exp-1")));
        let launcher = ExperimentLauncher::new(client);

        let outcome = launcher
            .launch(&"tmpl-123".into(), &IdempotencyToken::new(""))
            .await;

        assert!(matches!(outcome, LaunchOutcome::Failed { .. }));
        assert!(launcher.client.calls.lock().unwrap().is_empty());
    }
}
