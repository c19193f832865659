//! Renderer behaviour on whole documents and arbitrary input.

use marksync::render::{parse, render, render_body};
use proptest::prelude::*;

/// Walk the emitted tags and check every open tag is closed in order.
fn assert_well_nested(body: &str) {
    let mut stack: Vec<&str> = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find('<') {
        let end = rest[start..].find('>').expect("unterminated tag") + start;
        let tag = &rest[start + 1..end];
        rest = &rest[end + 1..];
        if tag == "br" {
            continue;
        }
        if let Some(name) = tag.strip_prefix('/') {
            assert_eq!(stack.pop(), Some(name), "crossed tags in {body:?}");
        } else {
            let name = tag.split(' ').next().unwrap_or(tag);
            assert!(
                matches!(
                    name,
                    "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "strong" | "em" | "code" | "a"
                ),
                "unexpected tag {name:?} in {body:?}"
            );
            stack.push(name);
        }
    }
    assert!(stack.is_empty(), "unclosed tags {stack:?} in {body:?}");
}

fn markdownish() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("*"),
            Just("**"),
            Just("`"),
            Just("["),
            Just("]"),
            Just("]("),
            Just(")"),
            Just("# "),
            Just("### "),
            Just("\n"),
            Just("<script>"),
            Just("&"),
            Just("\""),
            Just("javascript:"),
            Just("word"),
            Just(" "),
        ],
        0..48,
    )
    .prop_map(|parts| parts.concat())
}

#[test]
fn test_reference_document() {
    let md = include_str!("fixtures/notes.md");
    let body = render_body(md);

    assert!(body.starts_with("<h1>Release notes</h1><br>\n<br>\n<h2>Highlights</h2>"));
    assert!(body.contains("<strong>debounced</strong>"));
    assert!(body.contains("<em>single</em>"));
    assert!(body.contains("<a href=\"https://example.com/changelog\">the changelog</a>"));
    assert!(body.contains("<h3>Preview</h3>"));
    assert!(body.contains("<code>render()</code>"));
    assert!(body.contains("<strong>bold with <em>emphasis</em> inside</strong>"));
    assert!(body.contains(
        "<a href=\"https://example.com/a?b=1&amp;c=2\">links with <strong>strong</strong> labels</a>"
    ));
    assert!(body.contains("An unterminated **marker stays literal, and so does a lone `tick."));
    assert!(body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
    assert!(body.contains("escaped &amp; so are &quot;quotes&quot;."));
    assert!(body.contains("<h6>Smallest heading</h6>"));
    assert!(body.contains("####### not a heading"));
    assert_eq!(body.matches("<br>").count(), md.matches('\n').count());
    assert_well_nested(&body);
}

#[test]
fn test_empty_input_renders_empty_page() {
    let page = render("");
    assert!(page.html().starts_with("<!DOCTYPE html>"));
    assert_eq!(render_body(""), "");
    assert_eq!(parse("").len(), 1);
}

#[test]
fn test_adjacent_strong_spans_do_not_merge() {
    assert_eq!(
        render_body("**a** and **b**"),
        "<strong>a</strong> and <strong>b</strong>"
    );
}

#[test]
fn test_deeply_nested_input_does_not_overflow() {
    let md = "*[**`".repeat(2_000);
    let body = render_body(&md);
    assert!(!body.is_empty());
}

proptest! {
    #[test]
    fn render_is_total_and_deterministic(s in any::<String>()) {
        let first = render(&s);
        let second = render(&s);
        prop_assert_eq!(first.html(), second.html());
        prop_assert!(first.html().starts_with("<!DOCTYPE html>"));
    }

    #[test]
    fn plain_text_is_passed_through(s in "[a-zA-Z0-9 ,.!?\n]{0,64}") {
        prop_assert_eq!(render_body(&s), s.replace('\n', "<br>\n"));
    }

    #[test]
    fn emitted_markup_is_well_nested_and_escaped(s in markdownish()) {
        let body = render_body(&s);
        prop_assert!(!body.contains("<script"));
        prop_assert!(!body.contains("href=\"javascript:"));
        assert_well_nested(&body);
    }

    #[test]
    fn one_block_per_line(s in markdownish()) {
        prop_assert_eq!(parse(&s).len(), s.split('\n').count());
    }
}
