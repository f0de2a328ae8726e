//! Loading editor buffers from a project directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use codeplayer_core::{SourceBuffers, SourceKind};

/// Where the three buffers of a project live on disk.
#[derive(Debug, Clone)]
pub struct ProjectFiles {
    pub dir: PathBuf,
    pub html: PathBuf,
    pub css: PathBuf,
    pub js: PathBuf,
}

impl ProjectFiles {
    /// Files in `dir`, using `index.html`, `style.css` and `script.js` unless
    /// overridden. Overrides are relative to `dir`.
    pub fn new(
        dir: impl AsRef<Path>,
        html: Option<&str>,
        css: Option<&str>,
        js: Option<&str>,
    ) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            anyhow::bail!("Project directory not found: {}", dir.display());
        }
        let pick = |kind: SourceKind, name: Option<&str>| dir.join(name.unwrap_or(kind.default_file_name()));
        Ok(Self {
            dir: dir.to_path_buf(),
            html: pick(SourceKind::Html, html),
            css: pick(SourceKind::Css, css),
            js: pick(SourceKind::Js, js),
        })
    }

    pub fn path(&self, kind: SourceKind) -> &Path {
        match kind {
            SourceKind::Html => &self.html,
            SourceKind::Css => &self.css,
            SourceKind::Js => &self.js,
        }
    }

    /// Whether `path` is one of the project's source files.
    pub fn contains(&self, path: &Path) -> bool {
        SourceKind::ALL
            .iter()
            .any(|kind| same_file(self.path(*kind), path))
    }

    /// Read all three buffers. A missing file is an empty buffer.
    pub fn load(&self) -> anyhow::Result<SourceBuffers> {
        let mut sources = SourceBuffers::default();
        for kind in SourceKind::ALL {
            let path = self.path(kind);
            match fs::read_to_string(path) {
                Ok(text) => {
                    sources.set(kind, text);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!("No {} source at {}", kind, path.display());
                }
                Err(e) => {
                    return Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), e));
                }
            }
        }
        Ok(sources)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a.file_name() == b.file_name(),
    }
}
