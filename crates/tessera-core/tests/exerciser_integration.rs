//! Integration tests for the field exerciser.
//!
//! Runs against an in-memory `FakeApp`, and against the same fake served over
//! TCP through `AgentDriver`.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{agent_that_hangs_up, serve_fake_app, FakeApp, FakeField};

use tessera_core::action::{ActionResult, ActionType};
use tessera_core::agent_driver::AgentDriver;
use tessera_core::driver::AutomationDriver;
use tessera_core::exerciser::{ExerciseConfig, ExerciseError, FieldExerciser};

fn exerciser(app: &Arc<FakeApp>) -> FieldExerciser {
    FieldExerciser::new(app.clone(), ExerciseConfig::default())
}

// ---------------------------------------------------------------------------
// 1. Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_all_fields_receive_text() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_2", "t_3"]));

    let report = exerciser(&app).run().await.unwrap();

    assert_eq!(report.fields, vec!["t_1", "t_2", "t_3"]);
    for id in ["t_1", "t_2", "t_3"] {
        assert_eq!(app.value(id).as_deref(), Some("test"), "field {id}");
    }
}

#[tokio::test]
async fn test_steps_run_in_field_order() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_2", "t_3"]));

    exerciser(&app).run().await.unwrap();

    assert_eq!(
        app.calls(),
        vec![
            "find(t_1)", "tap(t_1)", "type(test)",
            "find(t_2)", "tap(t_2)", "type(test)",
            "find(t_3)", "tap(t_3)", "type(test)",
        ]
    );
}

#[tokio::test]
async fn test_report_logs_every_step() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_2", "t_3"]));

    let report = exerciser(&app).run().await.unwrap();

    assert_eq!(report.actions.len(), 9);
    assert!(report.actions.iter().all(|a| a.result.is_success()));
    assert!(matches!(report.actions[0].action, ActionType::WaitFor { .. }));
    assert!(matches!(report.actions[1].action, ActionType::Tap { .. }));
    assert_eq!(report.actions[2].action, ActionType::SendKeys { text: "test".into() });
}

#[tokio::test]
async fn test_existing_contents_are_appended_to() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_2", "t_3"]));
    app.set_field("t_2", FakeField { value: "pre-".into(), ..Default::default() });

    exerciser(&app).run().await.unwrap();

    // The run does not assert contents, so prefilled text survives.
    assert_eq!(app.value("t_2").as_deref(), Some("pre-test"));
}

// ---------------------------------------------------------------------------
// 2. Implicit wait
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_late_field_is_found_within_wait() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_3"]));
    app.set_field("t_2", FakeField { hidden_for: 5, ..Default::default() });

    exerciser(&app).run().await.unwrap();

    assert_eq!(app.value("t_2").as_deref(), Some("test"));
    let lookups = app.calls().iter().filter(|c| *c == "find(t_2)").count();
    assert_eq!(lookups, 6);
}

#[tokio::test(start_paused = true)]
async fn test_missing_field_halts_run() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_3"]));

    let mut log = Vec::new();
    let err = exerciser(&app).run_with_log(&mut log).await.unwrap_err();

    match &err {
        ExerciseError::ElementNotFound { identifier, waited_ms } => {
            assert_eq!(identifier, "t_2");
            assert!(*waited_ms >= 5000, "waited {waited_ms}ms");
        }
        other => panic!("expected ElementNotFound, got {other:?}"),
    }

    assert_eq!(app.value("t_1").as_deref(), Some("test"));
    assert_eq!(app.value("t_3").as_deref(), Some(""));
    assert!(!app.calls().iter().any(|c| c == "find(t_3)"));

    let last = log.last().unwrap();
    assert!(matches!(last.action, ActionType::WaitFor { .. }));
    assert!(!last.result.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_wait_respects_configured_timeout() {
    let app = Arc::new(FakeApp::with_fields(&[]));
    let config = ExerciseConfig {
        implicit_wait: Duration::from_millis(300),
        ..Default::default()
    };

    let start = tokio::time::Instant::now();
    let err = FieldExerciser::new(app.clone(), config).run().await.unwrap_err();

    assert_eq!(err.identifier(), Some("t_1"));
    let waited = start.elapsed();
    assert!(waited >= Duration::from_millis(300));
    assert!(waited < Duration::from_millis(1000));
}

// ---------------------------------------------------------------------------
// 3. Non-interactable fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_not_hittable_field_is_interaction_error() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_3"]));
    app.set_field("t_2", FakeField { hittable: false, ..Default::default() });

    let err = exerciser(&app).run().await.unwrap_err();

    match err {
        ExerciseError::InteractionError { identifier, reason } => {
            assert_eq!(identifier, "t_2");
            assert!(reason.contains("hittable"));
        }
        other => panic!("expected InteractionError, got {other:?}"),
    }
    assert!(!app.calls().iter().any(|c| c == "tap(t_2)"));
    assert_eq!(app.value("t_3").as_deref(), Some(""));
}

#[tokio::test]
async fn test_disabled_field_is_interaction_error() {
    let app = Arc::new(FakeApp::with_fields(&["t_2", "t_3"]));
    app.set_field("t_1", FakeField { enabled: false, ..Default::default() });

    let err = exerciser(&app).run().await.unwrap_err();

    assert!(matches!(err, ExerciseError::InteractionError { .. }));
    assert_eq!(err.identifier(), Some("t_1"));
    assert_eq!(app.value("t_2").as_deref(), Some(""));
}

// ---------------------------------------------------------------------------
// 4. Through the TCP agent
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_run_through_agent_driver() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_2", "t_3"]));
    let addr = serve_fake_app(app.clone()).await;

    let mut driver = AgentDriver::direct(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();
    driver.set_target("com.example.Example").await.unwrap();

    let report = FieldExerciser::new(Arc::new(driver), ExerciseConfig::default())
        .run()
        .await
        .unwrap();

    assert_eq!(report.fields.len(), 3);
    assert_eq!(app.target().as_deref(), Some("com.example.Example"));
    for id in ["t_1", "t_2", "t_3"] {
        assert_eq!(app.value(id).as_deref(), Some("test"));
    }
}

#[tokio::test]
async fn test_values_read_back_through_agent_driver() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_2", "t_3"]));
    let addr = serve_fake_app(app.clone()).await;

    let mut driver = AgentDriver::direct(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();
    let driver = Arc::new(driver);

    FieldExerciser::new(driver.clone(), ExerciseConfig::default())
        .run()
        .await
        .unwrap();

    for id in ["t_1", "t_2", "t_3"] {
        assert_eq!(driver.get_element_value(id).await.unwrap().as_deref(), Some("test"));
    }
    assert_eq!(driver.get_element_value("t_9").await.unwrap(), None);
}

#[tokio::test]
async fn test_not_hittable_through_agent_driver() {
    let app = Arc::new(FakeApp::with_fields(&["t_1", "t_2", "t_3"]));
    app.set_field("t_1", FakeField { hittable: false, ..Default::default() });
    let addr = serve_fake_app(app.clone()).await;

    let mut driver = AgentDriver::direct(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();

    let err = FieldExerciser::new(Arc::new(driver), ExerciseConfig::default())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, ExerciseError::InteractionError { .. }));
    assert_eq!(app.value("t_1").as_deref(), Some(""));
}

#[tokio::test]
async fn test_lost_agent_is_driver_error() {
    let addr = agent_that_hangs_up().await;

    let mut driver = AgentDriver::direct(addr.ip().to_string(), addr.port());
    driver.connect().await.unwrap();

    let mut log = Vec::new();
    let err = FieldExerciser::new(Arc::new(driver), ExerciseConfig::default())
        .run_with_log(&mut log)
        .await
        .unwrap_err();

    assert!(matches!(err, ExerciseError::Driver(_)), "got {err:?}");
    assert_eq!(log.len(), 1);
    assert!(matches!(log[0].result, ActionResult::Failure(_)));
}
