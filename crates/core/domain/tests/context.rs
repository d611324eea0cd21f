use domain::{Context, OnboardingPayload, PayloadError};
use serde_json::json;

#[test]
fn payload_extracts_credentials() {
    let payload = OnboardingPayload::from_value(json!({
        "padiThing": "thing-1",
        "padiToken": "tok-1",
        "extra": 42
    }))
    .expect("payload");

    let credentials = payload.extract().expect("credentials");
    assert_eq!(credentials.thing_id, "thing-1");
    assert_eq!(credentials.token, "tok-1");
    assert_eq!(credentials.into_context(), Context::new("thing-1", "tok-1"));
}

#[test]
fn payload_missing_thing_is_rejected() {
    let payload = OnboardingPayload::from_value(json!({ "padiToken": "tok-1" })).expect("payload");
    assert_eq!(payload.extract(), Err(PayloadError::MissingField("padiThing")));
}

#[test]
fn payload_missing_token_is_rejected() {
    let payload = OnboardingPayload::from_slice(br#"{"padiThing":"thing-1"}"#).expect("payload");
    assert_eq!(payload.extract(), Err(PayloadError::MissingField("padiToken")));
}

#[test]
fn payload_null_field_counts_as_missing() {
    let payload = OnboardingPayload::from_value(json!({
        "padiThing": null,
        "padiToken": "tok-1"
    }))
    .expect("payload");
    assert!(payload.extract().is_err());
}

#[test]
fn payload_rejects_non_object() {
    let err = OnboardingPayload::from_value(json!(["thing-1", "tok-1"])).unwrap_err();
    assert!(matches!(err, PayloadError::Malformed(_)));
}

#[test]
fn payload_rejects_invalid_json() {
    let err = OnboardingPayload::from_slice(b"{not json").unwrap_err();
    assert!(matches!(err, PayloadError::Malformed(_)));
}

#[test]
fn credentials_debug_hides_token() {
    let credentials = OnboardingPayload::from_value(json!({
        "padiThing": "thing-1",
        "padiToken": "secret-token"
    }))
    .expect("payload")
    .extract()
    .expect("credentials");
    let printed = format!("{:?}", credentials);
    assert!(printed.contains("thing-1"));
    assert!(!printed.contains("secret-token"));
}

#[test]
fn payload_accepts_scalar_fields() {
    let credentials = OnboardingPayload::from_value(json!({
        "padiThing": 42,
        "padiToken": true
    }))
    .expect("payload")
    .extract()
    .expect("credentials");
    assert_eq!(credentials.thing_id, "42");
    assert_eq!(credentials.token, "true");
}

#[test]
fn payload_rejects_nested_field() {
    let err = OnboardingPayload::from_value(json!({
        "padiThing": { "id": "thing-1" },
        "padiToken": "tok-1"
    }))
    .unwrap_err();
    assert!(matches!(err, PayloadError::Malformed(_)));
}
