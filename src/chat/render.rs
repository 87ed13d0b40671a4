//! Turning transcript text and saved records into something to show.
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

const PREVIEW_CHARS: usize = 60;

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("Invalid bold regex"));
static EM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*(.*?)\*").expect("Invalid emphasis regex"));
static CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`(.*?)`").expect("Invalid code regex"));

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Minimal markdown to HTML: line breaks, `**bold**`, `*emphasis*`
/// and `` `code` ``. Everything else is escaped.
pub fn format_message(text: &str) -> String {
    let html = escape_html(text)
        .replace("\n\n", "<br><br>")
        .replace('\n', "<br>");
    let html = BOLD_RE.replace_all(&html, "<strong>$1</strong>");
    let html = EM_RE.replace_all(&html, "<em>$1</em>");
    let html = CODE_RE.replace_all(&html, "<code>$1</code>");
    html.into_owned()
}

/// Short form of a prompt for the saved prompts list.
pub fn prompt_preview(prompt: &str) -> String {
    if prompt.chars().count() > PREVIEW_CHARS {
        let head: String = prompt.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", head)
    } else {
        prompt.to_string()
    }
}

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}
