//! Export command implementation for the Code Player CLI.
//!
//! Writes a project as a single HTML document.

use std::fs;
use std::path::Path;

use codeplayer_core::{ComposeOptions, ExecutionId, SourceBuffers, compose, compose_static};

use crate::colors;
use crate::project::ProjectFiles;

/// Render `sources` as one document.
///
/// The static form is the plain preview (no console capture) also used for
/// emailed snippets; otherwise the document is exactly what a silent run
/// renders.
pub fn render(sources: &SourceBuffers, static_preview: bool) -> String {
    if static_preview {
        compose_static(sources)
    } else {
        compose(sources, ComposeOptions::silent(ExecutionId::default())).as_str().to_string()
    }
}

/// Execute the export command. Without `output` the document goes to stdout.
pub fn execute(files: &ProjectFiles, output: Option<&str>, static_preview: bool) -> anyhow::Result<()> {
    let document = render(&files.load()?, static_preview);

    let Some(output) = output else {
        print!("{}", document);
        return Ok(());
    };

    let path = Path::new(output);
    fs::write(path, &document)
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;

    eprintln!(
        "{}Exported{} {} ({} bytes)",
        colors::GREEN,
        colors::RESET,
        path.display(),
        document.len()
    );
    Ok(())
}
