//! Content region extraction
//!
//! Pulls the element with a configured id out of a fetched page and turns its
//! markup into plain text that can be diffed line by line.

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::error::{WatchError, Result};

/// Elements whose text never counts as content
const SKIPPED: &[&str] = &["script", "style", "head", "noscript", "template", "iframe", "svg"];

/// Elements set off by a blank line
const PARAGRAPHS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre", "table", "ul", "ol", "dl", "hr",
];

/// Elements that start on a fresh line
const LINES: &[&str] = &[
    "div", "tr", "section", "article", "header", "footer", "nav", "main", "aside", "dt",
    "dd", "form", "figure", "figcaption", "address", "caption", "tbody", "thead", "tfoot",
];

/// The content region of one observation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Serialized inner markup of the region
    pub markup: String,

    /// Readable text rendering of `markup`
    pub text: String,
}

impl ExtractedContent {
    pub fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }
}

pub struct ContentExtractor {
    region_id: String,
    inline_whitespace: Regex,
}

impl ContentExtractor {
    pub fn new(region_id: &str) -> Result<Self> {
        let region_id = region_id.trim();
        if region_id.is_empty() || region_id.contains(char::is_whitespace) {
            return Err(WatchError::Config(format!(
                "content region id must be a single non-empty token, got {:?}",
                region_id
            )));
        }

        Ok(Self {
            region_id: region_id.to_string(),
            inline_whitespace: Regex::new(r"[ \t\x{a0}]+").expect("Invalid whitespace regex"),
        })
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    /// Extract the content region from raw page bytes. Malformed input or a
    /// missing region yields empty content, never an error.
    pub fn extract(&self, raw: &[u8]) -> ExtractedContent {
        let source = String::from_utf8_lossy(raw);
        let document = Html::parse_document(&source);

        let region = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|element| element.value().id() == Some(self.region_id.as_str()));

        match region {
            Some(element) => {
                let markup = element.inner_html();
                let text = self.html_to_text(&markup);
                ExtractedContent { markup, text }
            }
            None => ExtractedContent::default(),
        }
    }

    /// Convert a markup fragment to readable text
    pub fn html_to_text(&self, markup: &str) -> String {
        let fragment = Html::parse_fragment(markup);
        let mut buffer = String::new();
        render_children(fragment.root_element(), &mut buffer);
        self.normalize(&buffer)
    }

    /// Trim every line, squeeze inline whitespace and keep at most one blank
    /// line between blocks
    fn normalize(&self, buffer: &str) -> String {
        let mut lines: Vec<String> = Vec::new();
        for line in buffer.lines() {
            let line = self.inline_whitespace.replace_all(line, " ").trim().to_string();
            if line.is_empty() && lines.last().map_or(true, |last| last.is_empty()) {
                continue;
            }
            lines.push(line);
        }
        while lines.last().is_some_and(|last| last.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}

fn render_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => push_collapsed(text, out),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn render_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();

    if SKIPPED.contains(&name) {
        return;
    }

    match name {
        "br" => out.push('\n'),
        "pre" => {
            out.push_str("\n\n");
            out.extend(element.text());
            out.push_str("\n\n");
        }
        "li" => {
            ensure_line_start(out);
            out.push_str("* ");
            render_children(element, out);
            ensure_line_start(out);
        }
        "td" | "th" => {
            render_children(element, out);
            out.push(' ');
        }
        "a" => {
            let start = out.len();
            render_children(element, out);
            let label = out[start..].trim().to_string();
            if let Some(href) = element.value().attr("href").map(str::trim) {
                if !href.is_empty()
                    && href != label
                    && !href.starts_with('#')
                    && !href.starts_with("javascript:")
                {
                    out.push_str(&format!(" ( {} )", href));
                }
            }
        }
        _ if PARAGRAPHS.contains(&name) => {
            out.push_str("\n\n");
            render_children(element, out);
            out.push_str("\n\n");
        }
        _ if LINES.contains(&name) => {
            ensure_line_start(out);
            render_children(element, out);
            ensure_line_start(out);
        }
        _ => render_children(element, out),
    }
}

fn ensure_line_start(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

/// Append a text node with HTML whitespace rules: any run of whitespace,
/// including newlines, reads as a single space
fn push_collapsed(text: &str, out: &mut String) {
    if text.starts_with(char::is_whitespace) {
        push_space(out);
    }
    let mut words = text.split_whitespace().peekable();
    let has_words = words.peek().is_some();
    while let Some(word) = words.next() {
        out.push_str(word);
        if words.peek().is_some() {
            out.push(' ');
        }
    }
    if has_words && text.ends_with(char::is_whitespace) {
        push_space(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Faculty</title><style>p { color: red }</style></head>
<body>
  <div id="header">Last updated: 12:00</div>
  <div id="content">
    <h1>Announcements</h1>
    <p>Exam   dates are
       published.</p>
    <ul>
      <li>Monday</li>
      <li>Friday</li>
    </ul>
    <p>See <a href="https://example.org/exams">the list</a>.<br>Good luck</p>
    <script>var tracking = 1;</script>
  </div>
</body>
</html>"#;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new("content").unwrap()
    }

    #[test]
    fn test_extracts_region_as_text() {
        let content = extractor().extract(PAGE.as_bytes());
        assert_eq!(
            content.text,
            "Announcements\n\nExam dates are published.\n\n* Monday\n* Friday\n\nSee the list ( https://example.org/exams ).\nGood luck"
        );
        assert!(content.markup.contains("<h1>Announcements</h1>"));
        assert!(!content.text.contains("Last updated"));
        assert!(!content.text.contains("tracking"));
    }

    #[test]
    fn test_outside_change_keeps_markup() {
        let changed = PAGE.replace("12:00", "13:30");
        let before = extractor().extract(PAGE.as_bytes());
        let after = extractor().extract(changed.as_bytes());
        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_region_is_empty() {
        let content = extractor().extract(b"<html><body><p id=\"other\">hi</p></body></html>");
        assert!(content.is_empty());
        assert_eq!(content.text, "");
    }

    #[test]
    fn test_garbage_input_never_fails() {
        let inputs: [&[u8]; 5] = [
            b"",
            b"\xff\xfe\x00garbage\x80",
            b"<div id=\"content\"><p>unclosed <b>bold",
            b"not markup at all",
            b"<<<>>> id=content </div></div>",
        ];
        for input in inputs {
            let _ = extractor().extract(input);
        }

        let unclosed = extractor().extract(b"<div id=\"content\"><p>unclosed <b>bold");
        assert_eq!(unclosed.text, "unclosed bold");
    }

    #[test]
    fn test_link_text_equal_to_href_is_not_repeated() {
        let text = extractor().html_to_text(r##"<a href="https://a.example">https://a.example</a> <a href="#top">top</a>"##);
        assert_eq!(text, "https://a.example top");
    }

    #[test]
    fn test_table_rows_become_lines() {
        let text = extractor().html_to_text("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>");
        assert_eq!(text, "a b\nc d");
    }

    #[test]
    fn test_invalid_region_id_is_rejected() {
        assert!(ContentExtractor::new("").is_err());
        assert!(ContentExtractor::new("two words").is_err());
        assert_eq!(ContentExtractor::new(" main ").unwrap().region_id(), "main");
    }
}
