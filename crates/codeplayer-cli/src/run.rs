//! Run command implementation for the Code Player CLI.
//!
//! Loads a project's buffers, performs one capturing run in the sandbox and
//! prints the console.

use std::time::{Duration, Instant};

use codeplayer_core::{ControllerConfig, ExecutionController, ExecutionId, RunOutcome, RunPhase, SandboxConfig};

use crate::colors;
use crate::console::print_logs;
use crate::project::ProjectFiles;

/// Longest wait for the sandbox to finish a render.
const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute a project once.
pub async fn execute(files: &ProjectFiles, wait: Duration) -> anyhow::Result<()> {
    let start = Instant::now();
    print_header("Running", files);

    let controller = ExecutionController::with_sandbox(ControllerConfig::default(), SandboxConfig::default())?;
    controller.set_sources(files.load()?);

    let execution_id = capture_run(&controller, wait).await?;

    println!("\n{}Console:{}", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(50));
    let logs = controller.logs();
    print_logs(&logs);

    println!("\n{}", "─".repeat(50));
    println!(
        "{}Completed{} run {} with {} console records in {:.2}s",
        colors::GREEN,
        colors::RESET,
        execution_id,
        logs.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Start a capturing run and wait until its output has been collected.
///
/// Waits out a previous capturing run first. Returns once the sandbox has
/// rendered the run and `wait` has passed for relayed records to land.
pub async fn capture_run(controller: &ExecutionController, wait: Duration) -> anyhow::Result<ExecutionId> {
    let Some(mut preview) = controller.subscribe_preview() else {
        anyhow::bail!("Execution host does not publish previews");
    };

    let deadline = Instant::now() + RENDER_TIMEOUT;
    while controller.phase() == RunPhase::CapturingRunPending {
        if Instant::now() >= deadline {
            anyhow::bail!("Previous run never settled");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let execution_id = match controller.run() {
        RunOutcome::Started(id) => id,
        RunOutcome::Ignored => anyhow::bail!("A run is already in progress"),
    };

    let rendered = tokio::time::timeout(
        RENDER_TIMEOUT,
        preview.wait_for(|p| {
            p.as_ref()
                .is_some_and(|p| p.capture && p.execution_id == execution_id)
        }),
    )
    .await
    .map(|waited| waited.map(drop));
    match rendered {
        Ok(Ok(())) => {}
        Ok(Err(_)) => anyhow::bail!("Sandbox stopped before rendering run {}", execution_id),
        Err(_) => anyhow::bail!(
            "Sandbox did not finish run {} within {}s",
            execution_id,
            RENDER_TIMEOUT.as_secs()
        ),
    }

    tokio::time::sleep(wait).await;
    Ok(execution_id)
}

pub fn print_header(action: &str, files: &ProjectFiles) {
    println!(
        "\n{}Code Player{} - {} {}{}{}",
        colors::BOLD,
        colors::RESET,
        action,
        colors::CYAN,
        files.dir.display(),
        colors::RESET
    );
    println!("{}", "─".repeat(50));
}
