//! Single-pass lexical scan from markdown source to a block/inline tree.
//!
//! Each line is classified once (heading or text), then its inline content
//! is scanned left to right. At every delimiter the scanner looks for the
//! shortest valid closing delimiter; the leftmost opener wins. Anything
//! that cannot be closed is kept as literal text, so the scan is total.

use super::types::{Block, Inline};

/// Delimiter nesting beyond this depth is kept as literal text.
const MAX_NESTING: usize = 32;

const MAX_HEADING_LEVEL: usize = 6;

/// Parse markdown source into one block per line.
///
/// # Example
///
/// ```
/// use marksync::render::{parse, Block};
///
/// let blocks = parse("# Hello\n\nWorld");
/// assert_eq!(blocks.len(), 3);
/// assert_eq!(blocks[0].heading_level(), Some(1));
/// ```
pub fn parse(source: &str) -> Vec<Block> {
    source
        .split('\n')
        .map(|line| parse_line(line.strip_suffix('\r').unwrap_or(line)))
        .collect()
}

fn parse_line(line: &str) -> Block {
    let scanner = Scanner::new(line);
    if let Some((level, start, end)) = heading(line) {
        return Block::Heading {
            level,
            content: scanner.inlines(start, end, 0),
        };
    }
    Block::Text(scanner.inlines(0, line.len(), 0))
}

/// Heading level and trimmed text range, if `line` is a heading.
///
/// The whole `#` run is counted before deciding, so `###### x` can never be
/// read as a level-one heading followed by literal `#####`.
fn heading(line: &str) -> Option<(u8, usize, usize)> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > MAX_HEADING_LEVEL {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(is_heading_space) {
        return None;
    }
    let text = rest.trim();
    if text.is_empty() {
        return None;
    }
    let start = hashes + (rest.len() - rest.trim_start().len());
    let level = u8::try_from(hashes).ok()?;
    Some((level, start, start + text.len()))
}

const fn is_heading_space(c: char) -> bool {
    c == ' ' || c == '\t'
}

const fn is_delimiter(b: u8) -> bool {
    matches!(b, b'`' | b'*' | b'[')
}

/// Inline scanner over one line.
///
/// Spans are addressed as byte ranges into the line so the next-occurrence
/// tables can be shared by every nesting level. Delimiters are ASCII, so
/// every range boundary produced here falls on a char boundary.
struct Scanner<'a> {
    text: &'a str,
    next_backtick: Vec<usize>,
    next_bracket: Vec<usize>,
    next_paren: Vec<usize>,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        let bytes = text.as_bytes();
        Self {
            text,
            next_backtick: next_occurrence(bytes, b'`'),
            next_bracket: next_occurrence(bytes, b']'),
            next_paren: next_occurrence(bytes, b')'),
        }
    }

    fn bytes(&self) -> &'a [u8] {
        self.text.as_bytes()
    }

    fn inlines(&self, start: usize, end: usize, depth: usize) -> Vec<Inline> {
        let bytes = self.bytes();
        let mut out = Vec::new();
        let mut literal = String::new();
        let mut i = start;

        while i < end {
            if let Some((inline, next)) = self.span_at(i, end, depth) {
                if !literal.is_empty() {
                    out.push(Inline::Text(std::mem::take(&mut literal)));
                }
                out.push(inline);
                i = next;
                continue;
            }
            let step = if is_delimiter(bytes[i]) {
                1
            } else {
                bytes[i..end]
                    .iter()
                    .position(|&b| is_delimiter(b))
                    .unwrap_or(end - i)
            };
            literal.push_str(&self.text[i..i + step]);
            i += step;
        }

        if !literal.is_empty() {
            out.push(Inline::Text(literal));
        }
        out
    }

    fn span_at(&self, i: usize, end: usize, depth: usize) -> Option<(Inline, usize)> {
        let bytes = self.bytes();
        match bytes[i] {
            b'`' => {
                let close = self.code_end(i, end)?;
                Some((Inline::Code(self.text[i + 1..close - 1].to_string()), close))
            }
            b'*' if depth < MAX_NESTING => {
                if bytes.get(i + 1) == Some(&b'*')
                    && let Some(close) = self.strong_end(i, end)
                {
                    let children = self.inlines(i + 2, close - 2, depth + 1);
                    return Some((Inline::Strong(children), close));
                }
                let close = self.emphasis_end(i, end)?;
                let children = self.inlines(i + 1, close - 1, depth + 1);
                Some((Inline::Emphasis(children), close))
            }
            b'[' if depth < MAX_NESTING => self.link_at(i, end, depth),
            _ => None,
        }
    }

    /// End (exclusive) of a code span opened at `open`.
    fn code_end(&self, open: usize, end: usize) -> Option<usize> {
        find(&self.next_backtick, open + 2, end).map(|close| close + 1)
    }

    /// End (exclusive) of a strong span opened at `open`.
    ///
    /// Takes the first `**` after a non-empty interior. Complete code spans
    /// are opaque to the search.
    fn strong_end(&self, open: usize, end: usize) -> Option<usize> {
        let bytes = self.bytes();
        let mut j = open + 2;
        while j + 1 < end {
            match bytes[j] {
                b'`' => {
                    if let Some(close) = self.code_end(j, end) {
                        j = close;
                        continue;
                    }
                }
                b'*' if j > open + 2 && bytes[j + 1] == b'*' => return Some(j + 2),
                _ => {}
            }
            j += 1;
        }
        None
    }

    /// End (exclusive) of an emphasis span opened at `open`.
    ///
    /// Complete strong spans and code spans are opaque to the search, which
    /// is what makes `**` bind before `*`.
    fn emphasis_end(&self, open: usize, end: usize) -> Option<usize> {
        let bytes = self.bytes();
        let mut j = open + 1;
        while j < end {
            match bytes[j] {
                b'`' => {
                    if let Some(close) = self.code_end(j, end) {
                        j = close;
                        continue;
                    }
                }
                b'*' => {
                    if j + 1 < end
                        && bytes[j + 1] == b'*'
                        && let Some(close) = self.strong_end(j, end)
                    {
                        j = close;
                        continue;
                    }
                    if j > open + 1 {
                        return Some(j + 1);
                    }
                }
                _ => {}
            }
            j += 1;
        }
        None
    }

    fn link_at(&self, open: usize, end: usize, depth: usize) -> Option<(Inline, usize)> {
        let bytes = self.bytes();
        let label_end = find(&self.next_bracket, open + 1, end)?;
        if label_end == open + 1 || bytes.get(label_end + 1) != Some(&b'(') {
            return None;
        }
        let target_start = label_end + 2;
        let target_end = find(&self.next_paren, target_start, end)?;
        if target_end == target_start {
            return None;
        }
        let label = self.inlines(open + 1, label_end, depth + 1);
        let href = self.text[target_start..target_end].to_string();
        Some((Inline::Link { label, href }, target_end + 1))
    }
}

/// `table[i]` is the first index `>= i` holding `needle`, or `bytes.len()`.
fn next_occurrence(bytes: &[u8], needle: u8) -> Vec<usize> {
    let mut table = vec![bytes.len(); bytes.len() + 1];
    for i in (0..bytes.len()).rev() {
        table[i] = if bytes[i] == needle { i } else { table[i + 1] };
    }
    table
}

fn find(table: &[usize], from: usize, end: usize) -> Option<usize> {
    table.get(from).copied().filter(|&k| k < end)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    fn line(source: &str) -> Vec<Inline> {
        let blocks = parse(source);
        assert_eq!(blocks.len(), 1, "expected a single line: {source:?}");
        blocks[0].content().to_vec()
    }

    #[test]
    fn test_parse_empty_source_is_one_empty_line() {
        assert_eq!(parse(""), vec![Block::Text(Vec::new())]);
    }

    #[test]
    fn test_parse_one_block_per_line() {
        let blocks = parse("a\n\nb\n");
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[1], Block::Text(Vec::new()));
    }

    #[test]
    fn test_parse_strips_carriage_returns() {
        let blocks = parse("# Title\r\nbody\r\n");
        assert_eq!(blocks[0].plain_text(), "Title");
        assert_eq!(blocks[1].plain_text(), "body");
    }

    #[test]
    fn test_heading_levels() {
        for level in 1..=6u8 {
            let source = format!("{} Title", "#".repeat(level as usize));
            let blocks = parse(&source);
            assert_eq!(blocks[0].heading_level(), Some(level));
            assert_eq!(blocks[0].plain_text(), "Title");
        }
    }

    #[test]
    fn test_six_hashes_never_split_into_level_one() {
        let blocks = parse("###### x");
        assert_eq!(blocks[0].heading_level(), Some(6));
        assert_eq!(blocks[0].content(), &[text("x")]);
    }

    #[test]
    fn test_seven_hashes_is_literal() {
        let blocks = parse("####### x");
        assert_eq!(blocks[0].heading_level(), None);
        assert_eq!(blocks[0].plain_text(), "####### x");
    }

    #[test]
    fn test_hash_without_space_is_literal() {
        let blocks = parse("#tag");
        assert_eq!(blocks[0].heading_level(), None);
        assert_eq!(blocks[0].plain_text(), "#tag");
    }

    #[test]
    fn test_hash_with_only_whitespace_is_literal() {
        assert_eq!(parse("#   ")[0].heading_level(), None);
        assert_eq!(parse("#")[0].heading_level(), None);
    }

    #[test]
    fn test_heading_text_is_trimmed_and_scanned() {
        let blocks = parse("##\t  a **b**   ");
        assert_eq!(blocks[0].heading_level(), Some(2));
        assert_eq!(
            blocks[0].content(),
            &[text("a "), Inline::Strong(vec![text("b")])]
        );
    }

    #[test]
    fn test_adjacent_strong_spans_do_not_merge() {
        assert_eq!(
            line("**a** and **b**"),
            vec![
                Inline::Strong(vec![text("a")]),
                text(" and "),
                Inline::Strong(vec![text("b")]),
            ]
        );
    }

    #[test]
    fn test_emphasis_after_strong() {
        assert_eq!(
            line("**a** *b*"),
            vec![
                Inline::Strong(vec![text("a")]),
                text(" "),
                Inline::Emphasis(vec![text("b")]),
            ]
        );
    }

    #[test]
    fn test_strong_inside_emphasis() {
        assert_eq!(
            line("*a **b** c*"),
            vec![Inline::Emphasis(vec![
                text("a "),
                Inline::Strong(vec![text("b")]),
                text(" c"),
            ])]
        );
    }

    #[test]
    fn test_triple_asterisks_resolve_strong_first() {
        // Strong takes the shortest `**` pair; the stray asterisks stay literal.
        assert_eq!(
            line("***x***"),
            vec![Inline::Strong(vec![text("*x")]), text("*")]
        );
    }

    #[test]
    fn test_unclosed_strong_falls_back_to_emphasis() {
        assert_eq!(line("**a*"), vec![Inline::Emphasis(vec![text("*a")])]);
    }

    #[test]
    fn test_empty_delimiters_are_literal() {
        assert_eq!(line("**"), vec![text("**")]);
        assert_eq!(line("``"), vec![text("``")]);
        assert_eq!(line("*"), vec![text("*")]);
    }

    #[test]
    fn test_four_asterisks_are_emphasis_of_an_asterisk() {
        assert_eq!(
            line("****"),
            vec![Inline::Emphasis(vec![text("*")]), text("*")]
        );
    }

    #[test]
    fn test_code_interior_is_not_rescanned() {
        assert_eq!(
            line("`**x** [a](b)`"),
            vec![Inline::Code("**x** [a](b)".to_string())]
        );
    }

    #[test]
    fn test_code_span_hides_asterisk_from_emphasis() {
        assert_eq!(
            line("*a `*` b*"),
            vec![Inline::Emphasis(vec![
                text("a "),
                Inline::Code("*".to_string()),
                text(" b"),
            ])]
        );
    }

    #[test]
    fn test_unterminated_code_is_literal() {
        assert_eq!(line("`open"), vec![text("`open")]);
    }

    #[test]
    fn test_link() {
        assert_eq!(
            line("[label](http://x)"),
            vec![Inline::Link {
                label: vec![text("label")],
                href: "http://x".to_string(),
            }]
        );
    }

    #[test]
    fn test_link_label_is_scanned() {
        assert_eq!(
            line("[**a**](u)"),
            vec![Inline::Link {
                label: vec![Inline::Strong(vec![text("a")])],
                href: "u".to_string(),
            }]
        );
    }

    #[test]
    fn test_first_bracket_closes_label() {
        assert_eq!(
            line("[a] b [c](d)"),
            vec![
                text("[a] b "),
                Inline::Link {
                    label: vec![text("c")],
                    href: "d".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_first_paren_closes_target() {
        assert_eq!(
            line("[a](b)c)"),
            vec![
                Inline::Link {
                    label: vec![text("a")],
                    href: "b".to_string(),
                },
                text("c)"),
            ]
        );
    }

    #[test]
    fn test_incomplete_links_are_literal() {
        assert_eq!(line("[]()"), vec![text("[]()")]);
        assert_eq!(line("[a]()"), vec![text("[a]()")]);
        assert_eq!(line("[a](b"), vec![text("[a](b")]);
        assert_eq!(line("[a"), vec![text("[a")]);
    }

    #[test]
    fn test_spans_do_not_cross_lines() {
        let blocks = parse("**a\nb**");
        assert_eq!(blocks[0].content(), &[text("**a")]);
        assert_eq!(blocks[1].content(), &[text("b**")]);
    }

    #[test]
    fn test_multibyte_text_survives_scan() {
        assert_eq!(
            line("日本 *語* ✓"),
            vec![
                text("日本 "),
                Inline::Emphasis(vec![text("語")]),
                text(" ✓"),
            ]
        );
    }

    #[test]
    fn test_bracket_flood_stays_literal() {
        let source = format!("{}x{}", "[".repeat(10_000), "](y)".repeat(10_000));
        let blocks = parse(&source);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].plain_text().contains('x'));
    }

    #[test]
    fn test_next_occurrence_table() {
        assert_eq!(next_occurrence(b"a]b]", b']'), vec![1, 1, 3, 3, 4]);
    }
}
