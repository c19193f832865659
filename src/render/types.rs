//! Core render types.

/// A single source line after block classification.
///
/// Every source line produces exactly one block, including blank lines,
/// so the number of blocks is always one more than the number of newlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Heading with level (1-6)
    Heading { level: u8, content: Vec<Inline> },
    /// Any other line
    Text(Vec<Inline>),
}

impl Block {
    /// Inline content of the block.
    pub fn content(&self) -> &[Inline] {
        match self {
            Self::Heading { content, .. } | Self::Text(content) => content,
        }
    }

    /// Heading level, if this block is a heading.
    pub const fn heading_level(&self) -> Option<u8> {
        match self {
            Self::Heading { level, .. } => Some(*level),
            Self::Text(_) => None,
        }
    }

    /// Visible text with all markup stripped.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        collect_text(self.content(), &mut text);
        text
    }
}

/// A styled inline span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    /// Literal text, emitted escaped
    Text(String),
    /// `**strong**`
    Strong(Vec<Inline>),
    /// `*emphasis*`
    Emphasis(Vec<Inline>),
    /// `` `code` ``, interior kept verbatim
    Code(String),
    /// `[label](href)`
    Link { label: Vec<Inline>, href: String },
}

fn collect_text(inlines: &[Inline], text: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(s) | Inline::Code(s) => text.push_str(s),
            Inline::Strong(children) | Inline::Emphasis(children) => collect_text(children, text),
            Inline::Link { label, .. } => collect_text(label, text),
        }
    }
}

/// A rendered, standalone HTML page.
///
/// Always recomputed from the current content; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    html: String,
}

impl RenderedOutput {
    pub(crate) const fn new(html: String) -> Self {
        Self { html }
    }

    /// The full HTML document.
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }
}
