use agent_bridge::models::session::Session;

#[test]
fn new_session_is_idle() {
    let session = Session::new("s1");
    assert_eq!(session.id(), "s1");
    assert!(!session.is_busy());
    assert!(session.descriptor_path().is_none());
}

#[test]
fn second_begin_is_refused_while_in_flight() {
    let session = Session::new("s1");

    let flight = session.try_begin().expect("idle session");
    assert!(session.is_busy());
    assert!(session.try_begin().is_none());

    drop(flight);
    assert!(!session.is_busy());
    assert!(session.try_begin().is_some());
}

/// Releasing the guard removes the descriptor it carried.
#[test]
fn release_discards_descriptor() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("mcp_config_s1.json");
    std::fs::write(&path, "{}").expect("write");

    let session = Session::new("s1");
    {
        let flight = session.try_begin().expect("idle session");
        flight.attach_descriptor(path.clone());
        assert_eq!(session.descriptor_path().as_deref(), Some(path.as_path()));
    }

    assert!(!path.exists());
    assert!(session.descriptor_path().is_none());
    assert!(!session.is_busy());
}

#[test]
fn release_tolerates_already_removed_descriptor() {
    let temp = tempfile::tempdir().expect("tempdir");
    let session = Session::new("s1");
    {
        let flight = session.try_begin().expect("idle session");
        flight.attach_descriptor(temp.path().join("gone.json"));
    }
    assert!(!session.is_busy());
}

#[test]
fn release_happens_on_panic() {
    let session = Session::new("s1");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _flight = session.try_begin().expect("idle session");
        panic!("query blew up");
    }));

    assert!(result.is_err());
    assert!(!session.is_busy());
}

#[test]
fn close_is_safe_on_idle_session() {
    let session = Session::new("s1");
    session.close();
    assert!(!session.is_busy());
}
