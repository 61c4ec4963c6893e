//! End-to-end lifecycle of the preview session against the in-memory fakes

mod common;

use std::time::{Duration, Instant};

use common::{eventually, Harness, WAIT};
use crabpreview::invariants::{
    clear_checked, contract_test, CLOSE_RETURNS_IDLE, OPEN_STARTS_WITHOUT_DEVICE,
};
use crabpreview::testing::{ConfigureBehavior, OpenBehavior};
use crabpreview::{
    ControlMode, ErrorKind, OpenOutcome, PreviewDimensions, RequestTemplate, SessionPhase,
};

#[test]
fn test_resume_surface_pause_cycle() {
    let h = Harness::new();
    let pipeline = h.pipeline();

    assert!(pipeline.on_resume().unwrap().is_none());
    let surface = h.target.make_available();
    let outcome = pipeline.on_surface_available(1280, 720).unwrap();
    match outcome {
        Some(OpenOutcome::Opening { device_id, .. }) => assert_eq!(device_id.as_str(), "cam1"),
        other => panic!("expected an open, got {:?}", other),
    }

    assert!(pipeline.session().wait_for_phase(SessionPhase::Streaming, WAIT));
    assert_eq!(
        pipeline.session().preview_dimensions(),
        Some(PreviewDimensions::new(1920, 1080))
    );
    assert_eq!(h.target.buffer_size(), Some(PreviewDimensions::new(1920, 1080)));

    let session = h.backend.session();
    assert!(eventually(WAIT, || !session.submitted().is_empty()));
    let request = &session.submitted()[0];
    assert_eq!(request.template, RequestTemplate::Preview);
    assert_eq!(request.target, surface);
    assert_eq!(request.control_mode, ControlMode::Auto);
    assert!(session
        .submit_threads()
        .iter()
        .all(|name| name.starts_with("crabpreview-stream-")));

    pipeline.on_pause().unwrap();
    assert_eq!(pipeline.phase(), SessionPhase::Idle);
    assert!(!pipeline.session().has_device());
    assert_eq!(h.backend.live_devices(), 0);
    assert_eq!(h.backend.closed_devices(), 1);
    assert_eq!(h.backend.leaked_devices(), 0);
    assert!(h.sink.failures().is_empty());
}

#[test]
fn test_resume_with_live_surface_opens_immediately() {
    let h = Harness::new();
    let pipeline = h.pipeline();

    h.target.make_available();
    assert!(pipeline.on_surface_available(1280, 720).unwrap().is_none());
    assert!(matches!(
        pipeline.on_resume().unwrap(),
        Some(OpenOutcome::Opening { .. })
    ));
    assert!(pipeline.session().wait_for_phase(SessionPhase::Streaming, WAIT));

    pipeline.on_pause().unwrap();
    assert!(matches!(
        pipeline.on_resume().unwrap(),
        Some(OpenOutcome::Opening { .. })
    ));
    assert!(pipeline.session().wait_for_phase(SessionPhase::Streaming, WAIT));
    assert_eq!(h.backend.max_live_devices(), 1);
}

#[test]
fn test_close_is_idempotent() {
    let h = Harness::new();
    let session = h.session();
    session.close().unwrap();
    session.close().unwrap();
    assert_eq!(session.phase(), SessionPhase::Idle);

    h.target.make_available();
    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));

    session.close().unwrap();
    let generation = session.generation();
    session.close().unwrap();
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(session.generation(), generation);
    assert_eq!(h.backend.closed_devices(), 1);
}

#[test]
fn test_second_open_while_active_is_ignored() {
    let h = Harness::new();
    h.backend.set_open_behavior(OpenBehavior::Defer);
    let session = h.session();

    session.request_open().unwrap();
    assert!(matches!(
        session.request_open().unwrap(),
        OpenOutcome::AlreadyActive(SessionPhase::Opening)
    ));
    assert_eq!(h.backend.open_requests(), 1);

    h.backend.release_pending_open();
    assert!(session.wait_for_phase(SessionPhase::Opened, WAIT));
    session.close().unwrap();
}

#[test]
fn test_missing_surface_holds_device_until_reopen() {
    let h = Harness::new();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Opened, WAIT));
    assert!(session.has_device());
    assert_eq!(h.backend.sessions_requested(), 0);
    assert!(h.sink.failures().is_empty());

    h.target.make_available();
    assert!(matches!(
        session.request_open().unwrap(),
        OpenOutcome::Reconfiguring
    ));
    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));
    assert_eq!(h.backend.open_requests(), 1);
}

#[test]
fn test_surface_destroyed_during_configuration_returns_to_opened() {
    let h = Harness::new();
    h.backend.set_configure_behavior(ConfigureBehavior::Defer);
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Configuring, WAIT));

    h.target.destroy();
    assert!(h.backend.release_pending_configure());
    assert!(session.wait_for_phase(SessionPhase::Opened, WAIT));
    assert!(h.backend.session().submitted().is_empty());

    h.backend.set_configure_behavior(ConfigureBehavior::Succeed);
    let surface = h.target.make_available();
    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));
    let streamed = h.backend.session();
    assert!(eventually(WAIT, || !streamed.submitted().is_empty()));
    assert_eq!(streamed.submitted()[0].target, surface);
}

#[test]
fn test_new_surface_while_streaming_rebinds_stream() {
    let h = Harness::new();
    let pipeline = h.pipeline();
    pipeline.on_resume().unwrap();
    let first = h.target.make_available();
    pipeline.on_surface_available(1280, 720).unwrap();
    assert!(pipeline.session().wait_for_phase(SessionPhase::Streaming, WAIT));

    h.target.destroy();
    assert!(pipeline.on_surface_destroyed());
    let second = h.target.make_available();
    assert!(matches!(
        pipeline.on_surface_available(1280, 720).unwrap(),
        Some(OpenOutcome::Reconfiguring)
    ));
    assert!(pipeline.session().wait_for_phase(SessionPhase::Streaming, WAIT));

    let session = h.backend.session();
    assert!(eventually(WAIT, || session
        .submitted()
        .iter()
        .any(|request| request.target == second)));
    assert_eq!(session.submitted()[0].target, first);
    assert_eq!(h.backend.open_requests(), 1);
    assert_eq!(h.backend.max_live_devices(), 1);
    assert!(h.sink.failures().is_empty());
}

#[test]
fn test_open_request_on_current_stream_is_ignored() {
    let h = Harness::new();
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));
    assert!(matches!(
        session.request_open().unwrap(),
        OpenOutcome::AlreadyActive(SessionPhase::Streaming)
    ));
    assert_eq!(h.backend.sessions_requested(), 1);
}

#[test]
fn test_surface_replaced_during_configuration_binds_new_surface() {
    let h = Harness::new();
    h.backend.set_configure_behavior(ConfigureBehavior::Defer);
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Configuring, WAIT));

    h.target.destroy();
    let second = h.target.make_available();
    h.backend.set_configure_behavior(ConfigureBehavior::Succeed);
    assert!(h.backend.release_pending_configure());

    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));
    let streamed = h.backend.session();
    assert!(eventually(WAIT, || !streamed.submitted().is_empty()));
    assert_eq!(streamed.submitted()[0].target, second);
    assert_eq!(h.backend.sessions_requested(), 2);
}

#[test]
fn test_pause_after_surface_destroyed_while_streaming() {
    let h = Harness::new();
    let pipeline = h.pipeline();
    pipeline.on_resume().unwrap();
    h.target.make_available();
    pipeline.on_surface_available(1280, 720).unwrap();
    assert!(pipeline.session().wait_for_phase(SessionPhase::Streaming, WAIT));

    h.target.destroy();
    assert!(pipeline.on_surface_destroyed());

    let started = Instant::now();
    pipeline.on_pause().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(pipeline.phase(), SessionPhase::Idle);
    assert_eq!(h.backend.live_devices(), 0);
    assert_eq!(h.backend.closed_devices(), 1);
}

#[test]
fn test_configuration_failure_closes_device() {
    let h = Harness::new();
    h.backend.set_configure_behavior(ConfigureBehavior::Fail);
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Error, WAIT));
    assert!(!session.has_device());
    assert_eq!(h.backend.live_devices(), 0);
    assert_eq!(h.backend.leaked_devices(), 0);

    let failures = h.sink.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), ErrorKind::DeviceAccess);
    assert_eq!(session.error(), Some(failures[0].clone()));
}

#[test]
fn test_rejected_configuration_is_reported_once() {
    let h = Harness::new();
    h.backend.set_configure_behavior(ConfigureBehavior::Reject);
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Error, WAIT));
    assert_eq!(h.sink.failures().len(), 1);
    assert_eq!(h.backend.live_devices(), 0);
}

#[test]
fn test_rejected_open_enters_error_and_can_retry() {
    let h = Harness::new();
    h.backend.set_open_behavior(OpenBehavior::Reject);
    h.target.make_available();
    let session = h.session();

    let err = session.request_open().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceAccess);
    assert_eq!(session.phase(), SessionPhase::Error);
    assert_eq!(h.sink.failures(), vec![err]);

    h.backend.set_open_behavior(OpenBehavior::Succeed);
    assert!(matches!(
        session.request_open().unwrap(),
        OpenOutcome::Opening { .. }
    ));
    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));
}

#[test]
fn test_open_error_callback_enters_error() {
    let h = Harness::new();
    h.backend.set_open_behavior(OpenBehavior::Error(3));
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Error, WAIT));
    let failures = h.sink.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].to_string().contains("camera device error 3"));
    assert_eq!(h.backend.live_devices(), 0);
}

#[test]
fn test_disconnect_while_streaming_releases_device() {
    let h = Harness::new();
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));

    assert!(h.backend.disconnect());
    assert!(session.wait_for_phase(SessionPhase::Error, WAIT));
    assert!(!session.has_device());
    assert_eq!(h.backend.live_devices(), 0);
    assert_eq!(h.backend.closed_devices(), 1);
    assert_eq!(h.sink.failures().len(), 1);

    session.close().unwrap();
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(h.backend.closed_devices(), 1);
}

#[test]
fn test_stream_failure_enters_error() {
    let h = Harness::new();
    h.backend.session().fail_requests(true);
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Error, WAIT));
    assert_eq!(h.backend.live_devices(), 0);
    assert!(h.sink.failures()[0]
        .to_string()
        .contains("repeating request failed"));
}

#[test]
fn test_back_camera_missing_reports_without_error_state() {
    let h = Harness::new();
    h.backend.fail_device_ids("camera service unavailable");
    let session = h.session();

    let err = session.request_open().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DeviceAccess);
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(h.sink.failures().len(), 1);
    assert_eq!(h.backend.open_requests(), 0);

    // the lock was released with the failed lookup
    session.close().unwrap();
}

#[test]
fn test_session_drop_closes_device() {
    let h = Harness::new();
    h.target.make_available();
    {
        let session = h.session();
        session.request_open().unwrap();
        assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));
    }
    assert_eq!(h.backend.live_devices(), 0);
    assert_eq!(h.backend.leaked_devices(), 0);
}

#[test]
fn test_lifecycle_contract() {
    clear_checked();
    let h = Harness::new();
    h.target.make_available();
    let session = h.session();

    session.request_open().unwrap();
    assert!(session.wait_for_phase(SessionPhase::Streaming, WAIT));
    session.close().unwrap();

    contract_test(
        "open then close",
        &[OPEN_STARTS_WITHOUT_DEVICE, CLOSE_RETURNS_IDLE],
    );
    assert!(eventually(Duration::from_millis(200), || h
        .backend
        .live_devices()
        == 0));
}
