//! Lenient splitting of a composed document.
//!
//! This is not an HTML parser. It finds the pieces the sandbox needs the way a
//! browser's tokenizer would for them: `<style>` and `<script>` contents end at
//! the first matching close tag, and anything else is passed through untouched.

/// A composed document split into the parts the sandbox executes or shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Contents of every `<style>` element, in document order.
    pub styles: Vec<String>,
    /// Inner markup of `<body>`, or the whole input if there is no body.
    pub body: String,
    /// Contents of every inline `<script>` element, in document order.
    pub scripts: Vec<String>,
}

impl ParsedDocument {
    pub fn parse(html: &str) -> Self {
        let body = element_inner(html, "body").unwrap_or(html).to_string();

        let styles = raw_text_elements(html, "style")
            .into_iter()
            .map(|(_, content)| content.to_string())
            .collect();

        let scripts = raw_text_elements(html, "script")
            .into_iter()
            .filter_map(|(open_tag, content)| {
                if has_attribute(open_tag, "src") {
                    tracing::debug!("Skipping external script: {}", open_tag);
                    None
                } else {
                    Some(content.to_string())
                }
            })
            .collect();

        Self {
            styles,
            body,
            scripts,
        }
    }

    /// Body markup with every `<script>` element removed.
    pub fn visible_body(&self) -> String {
        let mut out = String::with_capacity(self.body.len());
        let mut rest = self.body.as_str();
        while let Some(start) = find_open_tag(rest, "script") {
            out.push_str(&rest[..start]);
            match close_of_element(&rest[start..], "script") {
                Some(end) => rest = &rest[start + end..],
                None => {
                    rest = "";
                    break;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

/// Byte offset of the next `<name` open tag, case-insensitive.
fn find_open_tag(haystack: &str, name: &str) -> Option<usize> {
    let lower = haystack.to_ascii_lowercase();
    let needle = format!("<{name}");
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let at = from + pos;
        // Tags inside `<!-- ... -->` are not markup. An unclosed comment hides
        // the rest of the document.
        if let Some(comment) = lower[from..at].find("<!--") {
            let body = from + comment + 4;
            from = body + lower[body..].find("-->")? + 3;
            continue;
        }
        let after = at + needle.len();
        match lower.as_bytes().get(after) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(at),
            None => return Some(at),
            _ => from = after,
        }
    }
    None
}

/// Length of the element starting at `element` (open tag through close tag).
fn close_of_element(element: &str, name: &str) -> Option<usize> {
    let open_end = element.find('>')? + 1;
    let lower = element[open_end..].to_ascii_lowercase();
    let close = lower.find(&format!("</{name}"))?;
    let after_close = open_end + close;
    let gt = element[after_close..].find('>')?;
    Some(after_close + gt + 1)
}

/// `(open_tag, content)` for every raw-text element of the given name.
fn raw_text_elements<'a>(html: &'a str, name: &str) -> Vec<(&'a str, &'a str)> {
    let mut found = Vec::new();
    let mut offset = 0;
    while let Some(pos) = find_open_tag(&html[offset..], name) {
        let start = offset + pos;
        let Some(gt) = html[start..].find('>') else {
            break;
        };
        let content_start = start + gt + 1;
        let open_tag = &html[start..content_start];
        let lower = html[content_start..].to_ascii_lowercase();
        match lower.find(&format!("</{name}")) {
            Some(close) => {
                found.push((open_tag, &html[content_start..content_start + close]));
                offset = content_start + close;
            }
            None => {
                // Unterminated raw text runs to the end of the document.
                found.push((open_tag, &html[content_start..]));
                break;
            }
        }
    }
    found
}

fn element_inner<'a>(html: &'a str, name: &str) -> Option<&'a str> {
    let start = find_open_tag(html, name)?;
    let content_start = start + html[start..].find('>')? + 1;
    let lower = html.to_ascii_lowercase();
    let end = lower
        .rfind(&format!("</{name}"))
        .filter(|end| *end >= content_start)
        .unwrap_or(html.len());
    Some(&html[content_start..end])
}

fn has_attribute(open_tag: &str, attribute: &str) -> bool {
    let lower = open_tag.to_ascii_lowercase();
    lower
        .match_indices(attribute)
        .any(|(at, _)| {
            let before_ok = lower[..at].ends_with(|c: char| c.is_ascii_whitespace());
            let after = lower[at + attribute.len()..].trim_start();
            before_ok && after.starts_with('=')
        })
}
