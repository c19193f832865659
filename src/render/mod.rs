//! Markdown to HTML rendering.
//!
//! This module handles:
//! - Scanning a fixed markdown subset into a small block/inline tree
//!   (headings, strong, emphasis, code spans, links, line breaks)
//! - Emitting escaped HTML for that tree
//! - Wrapping the result in a static standalone page
//!
//! Rendering is a total, deterministic function of the input: malformed or
//! unterminated syntax degrades to literal text and never fails.

mod html;
mod parser;
mod types;

pub use html::{escape, wrap_page};
pub use parser::parse;
pub use types::{Block, Inline, RenderedOutput};

/// Render markdown to a standalone HTML page.
///
/// # Example
///
/// ```
/// use marksync::render::render;
///
/// let page = render("# Hello\n\n**World**");
/// assert!(page.html().contains("<h1>Hello</h1>"));
/// assert!(page.html().contains("<strong>World</strong>"));
/// ```
pub fn render(markdown: &str) -> RenderedOutput {
    let _scope = crate::perf::scope("render.total");
    RenderedOutput::new(wrap_page(&render_body(markdown)))
}

/// Render markdown to the body fragment only, without the page shell.
pub fn render_body(markdown: &str) -> String {
    html::render_blocks(&parse(markdown))
}
