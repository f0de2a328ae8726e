//! Integration tests for the controller driving a real sandbox.
//!
//! Each test boots its own sandbox thread and talks to it only through the
//! controller, the way an editing session does.

use std::time::Duration;

use codeplayer_core::sandbox::ParsedDocument;
use codeplayer_core::{
    ControllerConfig, ExecutionController, ExecutionId, LogKind, RenderedPreview, RunOutcome, RunPhase,
    SandboxConfig, SourceBuffers, SourceKind,
};
use tokio::sync::watch;

fn controller() -> ExecutionController {
    let config = ControllerConfig {
        run_delay: Duration::from_millis(5),
        settle_delay: Duration::from_millis(50),
        not_ready_retry_delay: Duration::from_millis(10),
        error_retry_delay: Duration::from_millis(10),
        max_render_attempts: 200,
        ..ControllerConfig::default()
    };
    ExecutionController::with_sandbox(config, SandboxConfig::default()).unwrap()
}

async fn wait_for_preview(
    preview: &mut watch::Receiver<Option<RenderedPreview>>,
    execution_id: ExecutionId,
    capture: bool,
) -> RenderedPreview {
    let rendered = tokio::time::timeout(
        Duration::from_secs(10),
        preview.wait_for(|p| {
            p.as_ref()
                .is_some_and(|p| p.execution_id == execution_id && p.capture == capture)
        }),
    )
    .await
    .expect("preview timed out")
    .expect("sandbox gone");
    rendered.clone().unwrap()
}

async fn wait_idle(controller: &ExecutionController) {
    for _ in 0..500 {
        if controller.phase() == RunPhase::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("controller never settled");
}

/// A script-only document renders an empty page and logs once.
#[tokio::test]
async fn test_script_only_run() {
    let controller = controller();
    let mut preview = controller.subscribe_preview().unwrap();

    controller.set_sources(SourceBuffers::new("", "", "console.log(\"hi\")"));
    assert_eq!(controller.run(), RunOutcome::Started(ExecutionId::new(1)));

    let rendered = wait_for_preview(&mut preview, ExecutionId::new(1), true).await;
    assert!(rendered.errors.is_empty());
    let parsed = ParsedDocument::parse(&rendered.document);
    assert_eq!(parsed.visible_body().trim(), "");

    wait_idle(&controller).await;
    let logs = controller.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, LogKind::Log);
    assert_eq!(logs[0].message, "hi");
    assert_eq!(logs[0].execution_id, ExecutionId::new(1));
}

/// Edits refresh the preview without touching the console.
#[tokio::test]
async fn test_silent_run_captures_nothing() {
    let controller = controller();
    let mut preview = controller.subscribe_preview().unwrap();

    controller.set_source(SourceKind::Html, "<h1>Hello</h1>");
    controller.set_source(SourceKind::Js, "console.warn('edited')");

    let rendered = wait_for_preview(&mut preview, ExecutionId::new(0), false).await;
    assert!(rendered.body.contains("<h1>Hello</h1>"));

    wait_idle(&controller).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(controller.logs().is_empty());
}

/// A second run appends below the first run's output.
#[tokio::test]
async fn test_second_run_appends() {
    let controller = controller();
    let mut preview = controller.subscribe_preview().unwrap();
    controller.set_source(SourceKind::Js, "console.log('tick'); console.error('tock')");

    controller.run();
    wait_for_preview(&mut preview, ExecutionId::new(1), true).await;
    wait_idle(&controller).await;

    assert_eq!(controller.run(), RunOutcome::Started(ExecutionId::new(2)));
    wait_for_preview(&mut preview, ExecutionId::new(2), true).await;
    wait_idle(&controller).await;

    let logs: Vec<_> = controller
        .logs()
        .into_iter()
        .map(|r| (r.execution_id.get(), r.kind, r.message))
        .collect();
    assert_eq!(
        logs,
        vec![
            (1, LogKind::Log, "tick".to_string()),
            (1, LogKind::Error, "tock".to_string()),
            (2, LogKind::Log, "tick".to_string()),
            (2, LogKind::Error, "tock".to_string()),
        ]
    );
}

/// Uncaught errors surface as error records and do not stop later scripts.
#[tokio::test]
async fn test_uncaught_error_is_captured() {
    let controller = controller();
    let mut preview = controller.subscribe_preview().unwrap();
    controller.set_sources(SourceBuffers::new(
        "<script>missing()</script>",
        "",
        "console.log('after')",
    ));

    controller.run();
    let rendered = wait_for_preview(&mut preview, ExecutionId::new(1), true).await;
    assert_eq!(rendered.errors.len(), 1);
    wait_idle(&controller).await;

    let logs = controller.logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].kind, LogKind::Error);
    assert!(logs[0].message.starts_with("Uncaught"));
    assert_eq!(logs[1].message, "after");
}

/// Clearing while output is in flight leaves the console empty.
#[tokio::test]
async fn test_clear_drops_output_of_cleared_run() {
    let controller = controller();
    controller.set_source(SourceKind::Js, "setTimeout(function () { console.log('late') }, 10)");

    controller.run();
    controller.clear();
    wait_idle(&controller).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(controller.logs().is_empty());
    assert_eq!(controller.execution_id(), ExecutionId::new(2));
}
