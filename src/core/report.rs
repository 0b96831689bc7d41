use tera::{Context, Tera};

use crate::error::Result;
use super::differ::DiffRecord;

const HEADER: &str = "The watched page at the following URL has changed:";
const OVERVIEW: &str = "Below is an overview of the changes:";

const TEXT_TEMPLATE: &str = "{{ header }}\n{{ url }}\n{{ overview }}\n\n\
{% for record in records %}\
{% if record.kind == \"added\" %}+{% elif record.kind == \"removed\" %}-{% endif %}{{ record.line }}\n\
{% endfor %}";

const HTML_TEMPLATE: &str = r#"<p>{{ header }}</p>
<p><a href="{{ url }}">{{ url }}</a></p>
<p>{{ overview }}</p>
{% for record in records %}{% if record.kind == "added" %}<p style="color: green">{{ record.line }}</p>{% elif record.kind == "removed" %}<p style="color: red">{{ record.line }}</p>{% else %}<p>{{ record.line }}</p>{% endif %}
{% endfor %}"#;

/// Both renderings of one detected change
#[derive(Debug, Clone)]
pub struct Report {
    pub url: String,
    pub text: String,
    pub html: String,
}

/// Turns a diff into the plain text and HTML bodies of a change report
pub struct ReportRenderer {
    tera: Tera,
}

impl ReportRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        // The .html name turns on autoescaping for the HTML body only
        tera.add_raw_templates(vec![
            ("report.txt", TEXT_TEMPLATE),
            ("report.html", HTML_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    pub fn render_text(&self, diff: &[DiffRecord], url: &str) -> Result<String> {
        Ok(self.tera.render("report.txt", &Self::context(diff, url))?)
    }

    pub fn render_html(&self, diff: &[DiffRecord], url: &str) -> Result<String> {
        Ok(self.tera.render("report.html", &Self::context(diff, url))?)
    }

    pub fn render(&self, diff: &[DiffRecord], url: &str) -> Result<Report> {
        Ok(Report {
            url: url.to_string(),
            text: self.render_text(diff, url)?,
            html: self.render_html(diff, url)?,
        })
    }

    fn context(diff: &[DiffRecord], url: &str) -> Context {
        let mut context = Context::new();
        context.insert("header", HEADER);
        context.insert("overview", OVERVIEW);
        context.insert("url", url);
        context.insert("records", diff);
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::differ::{DiffStrategy, LcsDiffer};

    fn sample() -> Vec<DiffRecord> {
        LcsDiffer.diff(&["A", "B", "C"], &["A", "X", "C"])
    }

    #[test]
    fn test_text_report_marks_lines() {
        let renderer = ReportRenderer::new().unwrap();
        let text = renderer.render_text(&sample(), "https://uni.example/news").unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "https://uni.example/news");
        assert_eq!(lines[2], OVERVIEW);
        assert_eq!(&lines[4..], &["A", "-B", "+X", "C"]);
        assert!(text.ends_with("C\n"));
    }

    #[test]
    fn test_html_report_styles_and_escapes() {
        let renderer = ReportRenderer::new().unwrap();
        let diff = vec![
            DiffRecord::Unchanged("kept".into()),
            DiffRecord::Removed("old <b>line</b>".into()),
            DiffRecord::Added("new & shiny".into()),
        ];
        let html = renderer.render_html(&diff, "https://uni.example").unwrap();

        assert!(html.starts_with(&format!("<p>{}</p>", HEADER)));
        assert!(html.contains("<p>kept</p>"));
        assert!(html.contains(r#"<p style="color: red">old &lt;b&gt;line&lt;&#x2F;b&gt;</p>"#));
        assert!(html.contains(r#"<p style="color: green">new &amp; shiny</p>"#));

        let kept = html.find("kept").unwrap();
        let removed = html.find("color: red").unwrap();
        let added = html.find("color: green").unwrap();
        assert!(kept < removed && removed < added);
    }

    #[test]
    fn test_text_report_is_not_escaped() {
        let renderer = ReportRenderer::new().unwrap();
        let diff = vec![DiffRecord::Added("a < b & c".into())];
        let report = renderer.render(&diff, "https://uni.example/?a=1&b=2").unwrap();

        assert!(report.text.contains("+a < b & c\n"));
        assert!(report.text.contains("https://uni.example/?a=1&b=2\n"));
        assert_eq!(report.url, "https://uni.example/?a=1&b=2");
        assert!(report.html.contains("a &lt; b &amp; c"));
    }
}
