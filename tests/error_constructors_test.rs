use forecourt::error::ForecourtError;

#[test]
fn error_constructors_hardware() {
    assert!(matches!(
        ForecourtError::config("x"),
        ForecourtError::Config { .. }
    ));
    assert!(matches!(ForecourtError::gpio("x"), ForecourtError::Gpio { .. }));
    assert!(matches!(ForecourtError::rfid("x"), ForecourtError::Rfid { .. }));
    assert!(matches!(ForecourtError::web("x"), ForecourtError::Web { .. }));
}

#[test]
fn error_constructors_general() {
    assert!(matches!(ForecourtError::io("x"), ForecourtError::Io { .. }));
    assert!(matches!(
        ForecourtError::validation("f", String::from("m")),
        ForecourtError::Validation { .. }
    ));
    assert!(matches!(
        ForecourtError::timeout("x"),
        ForecourtError::Timeout { .. }
    ));
    assert!(matches!(
        ForecourtError::generic("x"),
        ForecourtError::Generic { .. }
    ));
}

#[test]
fn io_and_yaml_errors_convert() {
    let io: ForecourtError = std::io::Error::other("disk").into();
    assert!(matches!(io, ForecourtError::Io { .. }));

    let yaml = serde_yaml::from_str::<forecourt::Config>("pump: [1, 2").unwrap_err();
    let err: ForecourtError = yaml.into();
    assert!(matches!(err, ForecourtError::Serialization { .. }));
}

#[test]
fn display_messages() {
    let e = ForecourtError::validation("pump.increment_rate", "Must be positive");
    let s = format!("{}", e);
    assert!(s.contains("Validation error"));
    assert!(s.contains("pump.increment_rate"));
}
