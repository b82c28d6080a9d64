//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Publishing is a single
//! attempt unless a run opts into retries.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::publish::{OutcomeReason, PublishError};

/// Backoff for publish retries.
///
/// - Min delay: 250ms
/// - Max delay: 5s
/// - Max attempts: `retries`
/// - Jitter enabled
pub fn publish_backoff(retries: usize) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(250))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(retries)
        .with_jitter()
}

/// Determines if a failed publish is worth another attempt.
///
/// Retryable:
/// - `Timeout`: relays may just be slow
/// - `Rejected` where some relay failed at the transport or answered
///   `rate-limited:` / `error:`
///
/// Non-retryable: rejections for content (`invalid:`, `pow:`, `blocked:`,
/// `restricted:`) and publishing to an empty relay set.
pub fn is_retryable(err: &PublishError) -> bool {
    match err {
        PublishError::Timeout { .. } => true,
        PublishError::Rejected { outcomes, .. } => outcomes.iter().any(|o| match &o.reason {
            Some(OutcomeReason::Failed(_)) => true,
            Some(reason @ OutcomeReason::Rejected(_)) => {
                matches!(reason.key().as_str(), "rejected:rate-limited" | "rejected:error")
            }
            _ => false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::RelayOutcome;

    fn rejected(reason: OutcomeReason) -> PublishError {
        PublishError::Rejected {
            note_id: "n".to_string(),
            outcomes: vec![RelayOutcome {
                relay: "sim://r".to_string(),
                accepted: false,
                reason: Some(reason),
            }],
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&PublishError::Timeout {
            note_id: "n".to_string(),
            timeout: Duration::from_secs(1),
            outcomes: vec![],
        }));
        assert!(is_retryable(&rejected(OutcomeReason::Rejected(
            "rate-limited: slow down".to_string()
        ))));
        assert!(is_retryable(&rejected(OutcomeReason::Failed(
            "reset".to_string()
        ))));
        assert!(!is_retryable(&rejected(OutcomeReason::Rejected(
            "invalid: bad signature".to_string()
        ))));
        assert!(!is_retryable(&rejected(OutcomeReason::Rejected(
            "blocked: spam".to_string()
        ))));
        assert!(!is_retryable(&PublishError::Rejected {
            note_id: "n".to_string(),
            outcomes: vec![],
        }));
    }
}
