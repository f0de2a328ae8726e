//! Document composition.
//!
//! Serializes the three editor buffers plus the console shim into one
//! self-contained document. Malformed markup, styles or script are never an
//! error here; the sandbox surfaces script errors as console records.

use std::sync::Arc;

use crate::shim::console_shim;
use crate::source::{ExecutionId, SourceBuffers};

/// Per-run parameters baked into the shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeOptions {
    /// Whether the shim relays console calls to the host.
    pub capture: bool,
    /// Execution id the shim tags relayed records with.
    pub execution_id: ExecutionId,
}

impl ComposeOptions {
    /// Options for an automatic re-render after an edit.
    pub fn silent(execution_id: ExecutionId) -> Self {
        Self {
            capture: false,
            execution_id,
        }
    }

    /// Options for an explicit run.
    pub fn capturing(execution_id: ExecutionId) -> Self {
        Self {
            capture: true,
            execution_id,
        }
    }
}

/// A complete document ready to be rendered by an execution host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedDocument {
    pub execution_id: ExecutionId,
    pub capture: bool,
    html: Arc<str>,
}

impl ComposedDocument {
    pub fn as_str(&self) -> &str {
        &self.html
    }

    /// Shared handle to the document text.
    pub fn html(&self) -> Arc<str> {
        Arc::clone(&self.html)
    }
}

/// Compose the live-preview document for one run.
///
/// Styles and the shim go into the head; the user script follows the markup
/// so that element lookups in it see the body.
pub fn compose(sources: &SourceBuffers, options: ComposeOptions) -> ComposedDocument {
    let shim = console_shim(options.capture, options.execution_id.get());
    let html = format!(
        "<!DOCTYPE html>\n\
         <html>\n\
         <head>\n\
         <style>{css}</style>\n\
         <script>{shim}</script>\n\
         </head>\n\
         <body>\n\
         {markup}\n\
         <script>{js}</script>\n\
         </body>\n\
         </html>\n",
        css = sources.css,
        shim = shim,
        markup = sources.html,
        js = sources.js,
    );

    ComposedDocument {
        execution_id: options.execution_id,
        capture: options.capture,
        html: html.into(),
    }
}

/// Compose the static preview embedded in outbound email.
///
/// No shim and no relay: the output is never executed by the sandbox.
pub fn compose_static(sources: &SourceBuffers) -> String {
    let css = if sources.css.is_empty() { "/* No CSS */" } else { &sources.css };
    let markup = if sources.html.is_empty() { "<!-- No HTML -->" } else { &sources.html };
    let js = if sources.js.is_empty() { "// No JavaScript" } else { &sources.js };

    format!("<style>\n{css}\n</style>\n{markup}\n<script>\n{js}\n</script>\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SourceBuffers {
        SourceBuffers::new(
            "<h1 id=\"title\">Hello</h1>",
            "h1 { color: red; }",
            "console.log(document.title)",
        )
    }

    #[test]
    fn test_layout_order() {
        let doc = compose(&sample(), ComposeOptions::capturing(ExecutionId::new(3)));
        let html = doc.as_str();

        let style = html.find("h1 { color: red; }").unwrap();
        let shim = html.find("var shouldCapture = true;").unwrap();
        let body = html.find("<body>").unwrap();
        let markup = html.find("<h1 id=\"title\">").unwrap();
        let script = html.find("console.log(document.title)").unwrap();

        assert!(style < shim, "styles precede the shim in the head");
        assert!(shim < body, "shim lives in the head");
        assert!(markup < script, "user script follows the markup");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("var executionId = 3;"));
    }

    #[test]
    fn test_same_sources_differ_only_in_execution_id() {
        let first = compose(&sample(), ComposeOptions::capturing(ExecutionId::new(1)));
        let second = compose(&sample(), ComposeOptions::capturing(ExecutionId::new(2)));
        let again = compose(&sample(), ComposeOptions::capturing(ExecutionId::new(1)));

        assert_eq!(first.as_str(), again.as_str());
        assert_ne!(first.as_str(), second.as_str());
        assert_eq!(
            first.as_str().replace("var executionId = 1;", "var executionId = 2;"),
            second.as_str()
        );
    }

    #[test]
    fn test_empty_buffers_compose() {
        let doc = compose(&SourceBuffers::default(), ComposeOptions::silent(ExecutionId::default()));
        assert!(doc.as_str().contains("<style></style>"));
        assert!(doc.as_str().contains("<script></script>"));
        assert!(!doc.capture);
    }

    #[test]
    fn test_static_preview_has_no_shim() {
        let html = compose_static(&sample());
        assert!(html.contains("h1 { color: red; }"));
        assert!(html.contains("<h1 id=\"title\">Hello</h1>"));
        assert!(!html.contains("postMessage"));
    }

    #[test]
    fn test_static_preview_placeholders() {
        let html = compose_static(&SourceBuffers::default());
        assert!(html.contains("/* No CSS */"));
        assert!(html.contains("<!-- No HTML -->"));
        assert!(html.contains("// No JavaScript"));
    }
}
