use cns_telemetry::{metrics, new_session_id, record_poll_attempt, record_poll_failure};

#[test]
fn session_ids_are_unique() {
    let first = new_session_id();
    let second = new_session_id();
    assert!(!first.is_empty());
    assert_ne!(first, second);
}

#[test]
fn poll_counters_accumulate() {
    let before = metrics().snapshot();
    record_poll_attempt();
    record_poll_attempt();
    record_poll_failure();
    let after = metrics().snapshot();
    assert!(after.poll_attempts >= before.poll_attempts + 2);
    assert!(after.poll_failures > before.poll_failures);
}
