//! Unit tests for the harness error taxonomy.

use proxy_harness::HarnessError;

#[test]
fn display_prefixes_identify_the_category() {
    let cases = [
        (HarnessError::Config("bad field".into()), "config: bad field"),
        (HarnessError::Spawn("no such file".into()), "spawn: no such file"),
        (
            HarnessError::SupervisionInvariant("still running".into()),
            "supervision invariant: still running",
        ),
        (HarnessError::Http("bad proxy".into()), "http: bad proxy"),
        (HarnessError::Io("pipe closed".into()), "io: pipe closed"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
    let err: HarnessError = io.into();
    assert!(matches!(err, HarnessError::Io(_)), "got: {err}");
}

#[test]
fn toml_errors_convert_to_config() {
    let toml_err = toml::from_str::<proxy_harness::config::HarnessConfig>("timing = 3")
        .expect_err("invalid toml");
    let err: HarnessError = toml_err.into();
    assert!(matches!(err, HarnessError::Config(_)), "got: {err}");
}

#[test]
fn errors_implement_std_error() {
    let err = HarnessError::Spawn("boom".into());
    let dynamic: &dyn std::error::Error = &err;
    assert!(dynamic.source().is_none());
}
