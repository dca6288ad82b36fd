use scraper::{Html, Node, Selector};

use crate::text::collapse_whitespace;

const READER_SKIPPED: &[&str] = &["script", "style"];
const EXPORT_SKIPPED: &[&str] = &["script", "style", "noscript"];

/// Title of a chapter document.
///
/// Prefers `<title>`, then the first `h1`–`h3` heading, then `fallback`.
pub fn chapter_title(html: &str, fallback: &str) -> String {
    let document = Html::parse_document(html);

    for selector in ["title", "h1, h2, h3"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let title = collapse_whitespace(&element.text().collect::<String>());
            if !title.is_empty() {
                return title;
            }
        }
    }

    if fallback.is_empty() {
        "Untitled".to_string()
    } else {
        fallback.to_string()
    }
}

/// Readable text of a chapter: one trimmed line per source line, without
/// scripts, styles or blank lines.
pub fn chapter_text(html: &str) -> String {
    text_lines(html, READER_SKIPPED)
        .into_iter()
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like [`chapter_text`], but also drops `noscript` and collapses
/// whitespace inside each line. Used for plain-text export.
pub fn clean_chapter_text(html: &str) -> String {
    text_lines(html, EXPORT_SKIPPED)
        .iter()
        .map(|line| collapse_whitespace(line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn text_lines(html: &str, skipped: &[&str]) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let inside_skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| skipped.contains(&el.name()))
        });
        if inside_skipped {
            continue;
        }
        // text nodes are separated like separate lines
        let content: &str = text;
        lines.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }

    lines
}
