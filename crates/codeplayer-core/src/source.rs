//! Editor source buffers and run identity.

use serde::{Deserialize, Serialize};

/// Which of the three editors a buffer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Markup placed in the document body.
    Html,
    /// Styles placed in the document head.
    Css,
    /// Script run after the markup.
    Js,
}

impl SourceKind {
    /// All kinds in editor order.
    pub const ALL: [SourceKind; 3] = [SourceKind::Html, SourceKind::Css, SourceKind::Js];

    /// Conventional file name for this buffer inside a project directory.
    pub fn default_file_name(self) -> &'static str {
        match self {
            SourceKind::Html => "index.html",
            SourceKind::Css => "style.css",
            SourceKind::Js => "script.js",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::Html => "html",
            SourceKind::Css => "css",
            SourceKind::Js => "js",
        };
        f.write_str(name)
    }
}

/// The three buffers of an editing session.
///
/// Empty buffers are valid content, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBuffers {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub css: String,
    #[serde(default)]
    pub js: String,
}

impl SourceBuffers {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
        }
    }

    pub fn get(&self, kind: SourceKind) -> &str {
        match kind {
            SourceKind::Html => &self.html,
            SourceKind::Css => &self.css,
            SourceKind::Js => &self.js,
        }
    }

    /// Replace one buffer. Returns `true` if its content changed.
    pub fn set(&mut self, kind: SourceKind, text: impl Into<String>) -> bool {
        let text = text.into();
        let slot = match kind {
            SourceKind::Html => &mut self.html,
            SourceKind::Css => &mut self.css,
            SourceKind::Js => &mut self.js,
        };
        if *slot == text {
            return false;
        }
        *slot = text;
        true
    }

    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.js.is_empty()
    }
}

/// Identity of one run, threaded through every relayed console message.
///
/// Incremented by explicit runs and by clearing the console; a record is only
/// accepted when it carries the controller's current id.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ExecutionId(u64);

impl ExecutionId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_reports_change() {
        let mut sources = SourceBuffers::default();
        assert!(sources.is_empty());
        assert!(sources.set(SourceKind::Js, "console.log(1)"));
        assert!(!sources.set(SourceKind::Js, "console.log(1)"));
        assert_eq!(sources.get(SourceKind::Js), "console.log(1)");
        assert!(!sources.is_empty());
    }

    #[test]
    fn test_execution_id_serializes_as_integer() {
        let id = ExecutionId::new(41).next();
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn test_missing_buffers_deserialize_empty() {
        let sources: SourceBuffers = serde_json::from_str(r#"{"js":"1"}"#).unwrap();
        assert_eq!(sources, SourceBuffers::new("", "", "1"));
    }
}
