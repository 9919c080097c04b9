use agent_bridge::AppError;

#[test]
fn config_message_is_passed_through() {
    let err = AppError::Config("No authentication configured.".into());
    assert_eq!(err.client_message(), "No authentication configured.");
}

#[test]
fn spawn_failure_message() {
    let err = AppError::Spawn("claude: No such file or directory".into());
    assert_eq!(
        err.client_message(),
        "Failed to start agent: claude: No such file or directory"
    );
}

#[test]
fn exit_status_message() {
    let err = AppError::ProcessExit { code: Some(1) };
    assert_eq!(
        err.client_message(),
        "Agent exited with status 1. Check logs for details."
    );
}

#[test]
fn signal_exit_message() {
    let err = AppError::ProcessExit { code: None };
    assert!(err.client_message().contains("signal"));
}

#[test]
fn other_failures_are_prefixed() {
    let err = AppError::Io("broken pipe".into());
    assert_eq!(err.client_message(), "Error: io: broken pipe");
}

#[test]
fn io_error_converts() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
    assert!(matches!(err, AppError::Io(msg) if msg.contains("boom")));
}

#[test]
fn display_includes_kind() {
    assert_eq!(AppError::Db("locked".into()).to_string(), "db: locked");
    assert_eq!(
        AppError::ProcessExit { code: Some(2) }.to_string(),
        "process exit: status 2"
    );
}
