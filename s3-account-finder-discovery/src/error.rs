//! Error types for account discovery.

use std::time::Duration;
use thiserror::Error;

use crate::aws::AwsError;
use crate::types::AccessOutcome;

/// Fatal conditions that stop a discovery run.
///
/// Classification results (`Match` / `NoMatch`) are never errors; everything
/// here aborts the run and, where one exists, carries the confirmed prefix.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The user-supplied bucket path could not be parsed.
    #[error("Invalid target '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },

    /// A prefix set was empty or contained a non-numeric or over-long prefix.
    #[error("Invalid account prefix set: {0}")]
    InvalidPrefix(String),

    /// Credential, configuration or transport failure talking to AWS.
    #[error(transparent)]
    Aws(#[from] AwsError),

    /// The role cannot reach the target even without a restricting policy.
    #[error("{role_arn} cannot access {bucket} (baseline probe returned {outcome})")]
    NoBaselineAccess {
        role_arn: String,
        bucket: String,
        outcome: AccessOutcome,
    },

    /// A probe came back with an error that is neither a denial nor a not-found.
    #[error(
        "Unexpected response while probing digit {position} (confirmed prefix '{prefix}'): {outcome}"
    )]
    Indeterminate {
        position: usize,
        prefix: String,
        outcome: AccessOutcome,
    },

    /// None of the ten candidate digits matched.
    #[error("Could not find digit at position {position} (confirmed prefix '{prefix}')")]
    DigitNotFound { position: usize, prefix: String },

    /// A probe exceeded the configured deadline.
    #[error("Probe for digit {position} timed out after {timeout:?} (confirmed prefix '{prefix}')")]
    ProbeTimeout {
        position: usize,
        prefix: String,
        timeout: Duration,
    },

    /// A probe task panicked or was cancelled outside of round early-exit.
    #[error("Probe task failed at position {position} (confirmed prefix '{prefix}'): {reason}")]
    TaskFailed {
        position: usize,
        prefix: String,
        reason: String,
    },
}

impl DiscoveryError {
    pub(crate) fn invalid_target(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Confirmed account prefix at the point of failure, if the run got that far.
    pub fn partial_account_id(&self) -> Option<&str> {
        match self {
            Self::Indeterminate { prefix, .. }
            | Self::DigitNotFound { prefix, .. }
            | Self::ProbeTimeout { prefix, .. }
            | Self::TaskFailed { prefix, .. } => Some(prefix),
            Self::InvalidTarget { .. }
            | Self::InvalidPrefix(_)
            | Self::Aws(_)
            | Self::NoBaselineAccess { .. } => None,
        }
    }

    /// Whether the role was rejected outright by the baseline probe.
    pub fn is_no_access(&self) -> bool {
        matches!(self, Self::NoBaselineAccess { .. })
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_account_id_on_digit_not_found() {
        let err = DiscoveryError::DigitNotFound {
            position: 4,
            prefix: "0123".to_string(),
        };
        assert_eq!(err.partial_account_id(), Some("0123"));
        assert!(err.to_string().contains("position 4"));
        assert!(!err.is_no_access());
    }

    #[test]
    fn test_no_baseline_access_has_no_partial() {
        let err = DiscoveryError::NoBaselineAccess {
            role_arn: "arn:aws:iam::111122223333:role/Prober".to_string(),
            bucket: "demo".to_string(),
            outcome: AccessOutcome::NoMatch,
        };
        assert!(err.is_no_access());
        assert_eq!(err.partial_account_id(), None);
        assert!(err.to_string().contains("cannot access demo"));
    }
}
