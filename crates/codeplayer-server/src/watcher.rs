//! File watcher for detecting source changes.
//!
//! Watches a project directory and reports changes to `.html`, `.css` and
//! `.js` files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use codeplayer_core::SourceKind;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer, notify::RecursiveMode};
use tokio::sync::mpsc;

use crate::error::{ServerError, ServerResult};

/// File change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was created or modified.
    Modified(PathBuf),
    /// File was removed.
    Removed(PathBuf),
}

impl FileEvent {
    pub fn path(&self) -> &Path {
        match self {
            FileEvent::Modified(path) | FileEvent::Removed(path) => path,
        }
    }
}

/// Buffer a source file feeds, by extension.
pub fn source_kind_of(path: &Path) -> Option<SourceKind> {
    match path.extension()?.to_str()? {
        "html" | "htm" => Some(SourceKind::Html),
        "css" => Some(SourceKind::Css),
        "js" => Some(SourceKind::Js),
        _ => None,
    }
}

/// File watcher handle.
pub struct FileWatcher {
    /// Debouncer handle (kept alive to maintain watcher).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
    /// Receiver for file events.
    rx: mpsc::UnboundedReceiver<FileEvent>,
}

impl FileWatcher {
    /// Watch `dir` (non-recursively).
    pub fn new(dir: impl AsRef<Path>) -> ServerResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ServerError::Watch(format!("Not a directory: {}", dir.display())));
        }

        let (tx, rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(Duration::from_millis(200), move |result: DebounceEventResult| {
            let events = match result {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!("File watch error: {}", e);
                    return;
                }
            };
            for event in events {
                if source_kind_of(&event.path).is_none() {
                    continue;
                }
                let file_event = if event.path.exists() {
                    FileEvent::Modified(event.path)
                } else {
                    FileEvent::Removed(event.path)
                };
                let _ = tx.send(file_event);
            }
        })
        .map_err(|e| ServerError::Watch(e.to_string()))?;

        debouncer
            .watcher()
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| ServerError::Watch(e.to_string()))?;

        Ok(Self {
            _debouncer: debouncer,
            rx,
        })
    }

    /// Receive the next file event.
    pub async fn recv(&mut self) -> Option<FileEvent> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_source_kind_of() {
        assert_eq!(source_kind_of(Path::new("index.html")), Some(SourceKind::Html));
        assert_eq!(source_kind_of(Path::new("a/style.css")), Some(SourceKind::Css));
        assert_eq!(source_kind_of(Path::new("script.js")), Some(SourceKind::Js));
        assert_eq!(source_kind_of(Path::new("notes.md")), None);
        assert_eq!(source_kind_of(Path::new("Makefile")), None);
    }

    #[tokio::test]
    async fn test_watcher_creation() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<p></p>").unwrap();

        assert!(FileWatcher::new(temp.path()).is_ok());
        assert!(FileWatcher::new(temp.path().join("index.html")).is_err());
    }

    #[tokio::test]
    async fn test_reports_source_changes() {
        let temp = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(temp.path()).unwrap();

        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();
        fs::write(temp.path().join("script.js"), "console.log(1)").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), watcher.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.path().file_name().unwrap(), "script.js");
    }
}
