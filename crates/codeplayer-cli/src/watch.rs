//! Watch command implementation for the Code Player CLI.
//!
//! Watches a project directory and re-runs on every source change.

use std::time::Duration;

use codeplayer_core::{ControllerConfig, ExecutionController, SandboxConfig};
use codeplayer_server::{FileEvent, FileWatcher};

use crate::colors;
use crate::console::print_logs;
use crate::project::ProjectFiles;
use crate::run::{capture_run, print_header};

/// Execute the watch command.
pub async fn execute(files: &ProjectFiles, wait: Duration, clear_screen: bool) -> anyhow::Result<()> {
    let controller = ExecutionController::with_sandbox(ControllerConfig::default(), SandboxConfig::default())?;

    if clear_screen {
        clear_terminal();
    }
    print_header("Watching", files);
    controller.set_sources(files.load()?);
    run_once(&controller, wait).await;

    let mut watcher = FileWatcher::new(&files.dir)
        .map_err(|e| anyhow::anyhow!("Failed to create file watcher: {}", e))?;

    while let Some(event) = watcher.recv().await {
        if !files.contains(event.path()) {
            continue;
        }
        if let FileEvent::Removed(path) = &event {
            eprintln!(
                "\n{}Warning:{} Source file removed: {}",
                colors::YELLOW,
                colors::RESET,
                path.display()
            );
        }

        let sources = match files.load() {
            Ok(sources) => sources,
            Err(e) => {
                eprintln!("{}Error:{} {}", colors::RED, colors::RESET, e);
                continue;
            }
        };

        if clear_screen {
            clear_terminal();
        }
        print_header("Re-running", files);

        // Silent run for the new buffers, then a fresh console for the capturing one.
        controller.set_sources(sources);
        controller.clear();
        run_once(&controller, wait).await;
    }

    Ok(())
}

async fn run_once(controller: &ExecutionController, wait: Duration) {
    match capture_run(controller, wait).await {
        Ok(_) => print_logs(&controller.logs()),
        Err(e) => eprintln!("{}Error:{} {}", colors::RED, colors::RESET, e),
    }
    println!(
        "\n{}Watching for changes... (Ctrl+C to stop){}",
        colors::DIM,
        colors::RESET
    );
}

/// Clear the terminal screen.
fn clear_terminal() {
    print!("\x1B[2J\x1B[1;1H");
    colors::flush_stdout();
}
