//! NewType wrappers for strong typing throughout the launcher.
//!
//! These types prevent accidental mixing of semantically different strings
//! (e.g., passing an experiment id where a template id is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the inner value is the empty string.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Identifier of a pre-registered experiment template
    /// (e.g., "tmpl-stop-instance").
    ///
    /// Templates are declared in external configuration and referenced by
    /// id only; the launcher never interprets their contents.
    ExperimentTemplateId
);

newtype_string!(
    /// Identifier of a running (started) experiment, assigned by the
    /// remote experiment service when a launch succeeds.
    ExperimentId
);

newtype_string!(
    /// Caller-supplied token the remote service deduplicates on.
    ///
    /// Must be unique per logical invocation; a redelivered trigger reuses
    /// the same token so the remote service can recognize the duplicate.
    /// The launcher passes it through unchanged.
    IdempotencyToken
);

newtype_string!(
    /// Identifier of a pipeline job (one stage execution).
    ///
    /// Doubles as the idempotency token for pipeline-triggered launches:
    /// the pipeline redelivers the same job id when it retries a stage.
    PipelineJobId
);

newtype_string!(
    /// Identifier of a scheduler event delivery.
    ///
    /// Doubles as the idempotency token for scheduled launches.
    TriggerEventId
);

newtype_string!(
    /// Per-invocation request correlation id, attached to failure reports
    /// so operators can trace a failed stage back to its invocation.
    CorrelationId
);

impl CorrelationId {
    /// Generate a fresh random correlation id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}
