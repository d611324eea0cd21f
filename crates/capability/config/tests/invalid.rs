use cns_config::{AppConfig, ConfigError};

#[test]
fn invalid_poll_interval_is_reported() {
    unsafe {
        std::env::set_var("CNS_PADI_POLL", "five-seconds");
    }

    let err = AppConfig::from_env().expect_err("invalid poll interval");
    assert!(matches!(
        err,
        ConfigError::Invalid(ref key, ref value) if key == "CNS_PADI_POLL" && value == "five-seconds"
    ));
}
