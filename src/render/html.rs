//! HTML emission for parsed blocks.

use std::borrow::Cow;

use super::types::{Block, Inline};

/// Href substituted for link targets with a script-capable scheme.
const BLOCKED_HREF: &str = "#";

const BLOCKED_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<style>
body {
    font-family: -apple-system, system-ui, sans-serif;
    font-size: 14px;
    line-height: 1.6;
    color: #111;
    padding: 16px;
    max-width: 820px;
    margin: 0 auto;
}
h1 { font-size: 28px; margin: 24px 0 16px; }
h2 { font-size: 24px; margin: 20px 0 12px; }
h3 { font-size: 20px; margin: 16px 0 8px; }
code {
    background: #F8F8F8;
    border: 1px solid #EEEEEE;
    border-radius: 4px;
    padding: 2px 6px;
    font-family: ui-monospace, Menlo, Consolas, monospace;
    font-size: 13px;
}
a {
    color: #007AFF;
    text-decoration: none;
}
</style>
</head>
<body>
"#;

const PAGE_TAIL: &str = "\n</body>\n</html>\n";

/// Wrap a body fragment in the standalone page shell.
pub fn wrap_page(body: &str) -> String {
    let mut page = String::with_capacity(PAGE_HEAD.len() + body.len() + PAGE_TAIL.len());
    page.push_str(PAGE_HEAD);
    page.push_str(body);
    page.push_str(PAGE_TAIL);
    page
}

/// Render blocks to a body fragment, one `<br>` per source newline.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (index, block) in blocks.iter().enumerate() {
        if index > 0 {
            out.push_str("<br>\n");
        }
        match block {
            Block::Heading { level, content } => {
                out.push_str(&format!("<h{level}>"));
                push_inlines(&mut out, content);
                out.push_str(&format!("</h{level}>"));
            }
            Block::Text(content) => push_inlines(&mut out, content),
        }
    }
    out
}

fn push_inlines(out: &mut String, inlines: &[Inline]) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => escape_into(out, text),
            Inline::Strong(children) => {
                out.push_str("<strong>");
                push_inlines(out, children);
                out.push_str("</strong>");
            }
            Inline::Emphasis(children) => {
                out.push_str("<em>");
                push_inlines(out, children);
                out.push_str("</em>");
            }
            Inline::Code(code) => {
                out.push_str("<code>");
                escape_into(out, code);
                out.push_str("</code>");
            }
            Inline::Link { label, href } => {
                out.push_str("<a href=\"");
                escape_into(out, &safe_href(href));
                out.push_str("\">");
                push_inlines(out, label);
                out.push_str("</a>");
            }
        }
    }
}

/// Append `text` with every markup-significant character entity-escaped.
///
/// The same escaping is valid for element content and double-quoted
/// attribute values.
pub fn escape_into(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}

/// Neutralise link targets that would run script when followed.
///
/// Browsers ignore ASCII whitespace and control characters inside a scheme,
/// so those are dropped before comparing. A target only has a scheme when a
/// `:` comes before any `/`, `?` or `#`.
fn safe_href(href: &str) -> Cow<'_, str> {
    let cleaned: String = href
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_ascii_control())
        .collect();
    let Some(colon) = cleaned.find([':', '/', '?', '#']) else {
        return Cow::Borrowed(href);
    };
    if !cleaned[colon..].starts_with(':') {
        return Cow::Borrowed(href);
    }
    let scheme = cleaned[..=colon].to_ascii_lowercase();
    if BLOCKED_SCHEMES.contains(&scheme.as_str()) {
        Cow::Borrowed(BLOCKED_HREF)
    } else {
        Cow::Borrowed(href)
    }
}
