//! HTML page to plain text.
//!
//! Picks the main content container when the page has one, converts it to
//! Markdown with `htmd` (dropping scripts, styles, navigation and embeds),
//! then normalizes whitespace. Markdown keeps headings and lists legible
//! both to the embedding model and in cited context.

use scraper::{Html, Selector};

const CONTENT_SELECTORS: &[&str] = &[
    "article .markdown",
    "[role=\"main\"]",
    "article",
    "main",
    ".content",
    "body",
];

const SKIP_TAGS: &[&str] = &[
    "script", "style", "nav", "iframe", "noscript", "svg", "header", "footer",
];

/// Extract readable text from an HTML document.
pub fn html_to_text(html: &str) -> String {
    let content = content_html(html);
    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(SKIP_TAGS.to_vec())
        .build();

    let markdown = match converter.convert(&content) {
        Ok(md) => md,
        Err(e) => {
            tracing::debug!(error = %e, "htmd conversion failed, falling back to raw text");
            Html::parse_fragment(&content)
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ")
        }
    };
    normalize_whitespace(&markdown)
}

/// The page's `<title>`, or its first `<h1>`.
pub fn page_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    ["title", "h1"].iter().find_map(|sel| {
        let selector = Selector::parse(sel).ok()?;
        let text = doc
            .select(&selector)
            .next()?
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        (!text.is_empty()).then_some(text)
    })
}

fn content_html(html: &str) -> String {
    let doc = Html::parse_document(html);
    for sel in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(sel) {
            if let Some(el) = doc.select(&selector).next() {
                return el.inner_html();
            }
        }
    }
    html.to_string()
}

/// Trim trailing spaces and collapse runs of blank lines to one.
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        blank_run = 0;
        out.push_str(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title> Rust
        Guide </title><style>body{color:red}</style></head>
        <body>
          <nav><a href="/">Home</a></nav>
          <main>
            <h1>Ownership</h1>
            <p>Each value has a single owner.</p>
            <script>track()</script>
            <p>Borrowing lends access.</p>
          </main>
          <footer>copyright</footer>
        </body></html>"#;

    #[test]
    fn test_extracts_main_content() {
        let text = html_to_text(PAGE);
        assert!(text.contains("Ownership"));
        assert!(text.contains("Each value has a single owner."));
        assert!(text.contains("Borrowing lends access."));
        assert!(!text.contains("track()"));
        assert!(!text.contains("Home"));
        assert!(!text.contains("copyright"));
    }

    #[test]
    fn test_page_title() {
        assert_eq!(page_title(PAGE).as_deref(), Some("Rust Guide"));
        assert_eq!(
            page_title("<body><h1>Only heading</h1></body>").as_deref(),
            Some("Only heading")
        );
        assert_eq!(page_title("<p>nothing</p>"), None);
    }

    #[test]
    fn test_normalize_collapses_blank_lines() {
        assert_eq!(normalize_whitespace("a  \n\n\n\nb\nc"), "a\n\nb\nc");
        assert_eq!(normalize_whitespace("\n\n  \n"), "");
    }
}
