use std::time::Instant as StdInstant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::event::{build_note, NoteDraft, TagSet};
use crate::identity::Identity;
use crate::relay::{RelayBehavior, SimulatedRelay};

fn note(content: &str) -> Note {
    let identity = Identity::generate("publisher", &mut StdRng::seed_from_u64(21));
    build_note(
        NoteDraft::text(identity.public_key(), content, 2_000),
        TagSet::new(),
        &identity,
    )
    .unwrap()
}

async fn relays(behaviors: Vec<(&str, RelayBehavior)>) -> Vec<Arc<dyn RelayConnection>> {
    let mut out: Vec<Arc<dyn RelayConnection>> = Vec::new();
    for (url, behavior) in behaviors {
        let relay = SimulatedRelay::new(url, behavior);
        relay.connect().await.unwrap();
        out.push(Arc::new(relay));
    }
    out
}

const SHORT: Duration = Duration::from_millis(100);

#[tokio::test]
async fn test_one_of_three_confirms() {
    let relays = relays(vec![
        ("sim://a", RelayBehavior::Reject("blocked: no".to_string())),
        ("sim://b", RelayBehavior::Accept),
        ("sim://c", RelayBehavior::Reject("pow: difficulty 30".to_string())),
    ])
    .await;

    let receipt = publish(&note("hi"), &relays, SHORT, SettlePolicy::AllSettled)
        .await
        .unwrap();

    assert_eq!(receipt.confirmed_by.len(), 1);
    assert!(receipt.confirmed_by.contains("sim://b"));
    assert_eq!(receipt.outcomes.len(), 3);
    assert_eq!(receipt.outcomes[0].relay, "sim://a");
    assert_eq!(
        receipt.outcomes[2].reason,
        Some(OutcomeReason::Rejected("pow: difficulty 30".to_string()))
    );
}

#[tokio::test]
async fn test_all_rejecting_fails_rejected() {
    let relays = relays(vec![
        ("sim://a", RelayBehavior::Reject("rate-limited: slow".to_string())),
        ("sim://b", RelayBehavior::Reject("blocked: no".to_string())),
    ])
    .await;

    let err = publish(&note("x"), &relays, SHORT, SettlePolicy::FirstConfirmation)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Rejected { .. }));
    assert_eq!(err.outcomes().len(), 2);
    assert_eq!(err.reason_key(), "rejected:rate-limited");
}

#[tokio::test]
async fn test_silent_relays_fail_timeout() {
    let relays = relays(vec![
        ("sim://a", RelayBehavior::Hang),
        ("sim://b", RelayBehavior::Hang),
    ])
    .await;

    let started = StdInstant::now();
    let err = publish(&note("x"), &relays, SHORT, SettlePolicy::FirstConfirmation)
        .await
        .unwrap_err();

    assert!(started.elapsed() >= SHORT);
    assert!(matches!(err, PublishError::Timeout { .. }));
    assert_eq!(err.reason_key(), "timeout");
    assert!(err
        .outcomes()
        .iter()
        .all(|o| o.reason == Some(OutcomeReason::TimedOut)));
}

#[tokio::test]
async fn test_rejection_plus_silence_is_timeout() {
    let relays = relays(vec![
        ("sim://a", RelayBehavior::Reject("blocked: no".to_string())),
        ("sim://b", RelayBehavior::Hang),
    ])
    .await;

    let err = publish(&note("x"), &relays, SHORT, SettlePolicy::FirstConfirmation)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Timeout { .. }));
    assert_eq!(
        err.outcomes()[0].reason,
        Some(OutcomeReason::Rejected("blocked: no".to_string()))
    );
    assert_eq!(err.outcomes()[1].reason, Some(OutcomeReason::TimedOut));
}

#[tokio::test]
async fn test_first_confirmation_cancels_slow_relays() {
    let relays = relays(vec![
        ("sim://hang", RelayBehavior::Hang),
        ("sim://ok", RelayBehavior::Accept),
    ])
    .await;

    let started = StdInstant::now();
    let receipt = publish(
        &note("x"),
        &relays,
        Duration::from_secs(10),
        SettlePolicy::FirstConfirmation,
    )
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(receipt.confirmed_by.len(), 1);
    assert_eq!(receipt.outcomes[0].reason, Some(OutcomeReason::Cancelled));
}

#[tokio::test]
async fn test_all_settled_waits_for_deadline() {
    let relays = relays(vec![
        ("sim://ok", RelayBehavior::Accept),
        ("sim://hang", RelayBehavior::Hang),
    ])
    .await;

    let receipt = publish(&note("x"), &relays, SHORT, SettlePolicy::AllSettled)
        .await
        .unwrap();

    assert_eq!(receipt.confirmed_by.len(), 1);
    assert_eq!(receipt.outcomes[1].reason, Some(OutcomeReason::TimedOut));
}

#[tokio::test]
async fn test_empty_relay_set_is_rejected() {
    let err = publish(&note("x"), &[], SHORT, SettlePolicy::FirstConfirmation)
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::Rejected { .. }));
    assert_eq!(err.reason_key(), "rejected:no-relays");
}

#[tokio::test]
async fn test_unconnected_relay_counts_as_connection_failure() {
    let relay: Arc<dyn RelayConnection> =
        Arc::new(SimulatedRelay::new("sim://cold", RelayBehavior::Accept));

    let err = publish(&note("x"), &[relay], SHORT, SettlePolicy::FirstConfirmation)
        .await
        .unwrap_err();

    assert_eq!(err.reason_key(), "rejected:connection");
}

#[tokio::test]
async fn test_publisher_retries_lossy_relay() {
    let relays = relays(vec![(
        "sim://lossy",
        RelayBehavior::Lossy {
            accept_rate: 0.5,
            seed: 3,
        },
    )])
    .await;
    let publisher = Publisher::new(SHORT).with_retries(8);

    let receipt = publisher.publish(&note("x"), &relays).await.unwrap();

    assert!(receipt.confirmed_by.contains("sim://lossy"));
}

#[tokio::test]
async fn test_publisher_does_not_retry_content_rejection() {
    let relays = relays(vec![("sim://a", RelayBehavior::Reject("invalid: no".to_string()))]).await;
    let publisher = Publisher::new(SHORT).with_retries(3);

    let started = StdInstant::now();
    let err = publisher.publish(&note("x"), &relays).await.unwrap_err();

    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(err.reason_key(), "rejected:invalid");
}

#[test]
fn test_classify_rejection() {
    assert_eq!(classify_rejection("duplicate: have it"), "duplicate");
    assert_eq!(classify_rejection("pow: difficulty 25<30"), "pow");
    assert_eq!(classify_rejection("Rate-Limited: slow down"), "rate-limited");
    assert_eq!(classify_rejection("restricted: members only"), "restricted");
    assert_eq!(classify_rejection("something broke"), "other");
    assert_eq!(classify_rejection(""), "other");
}
