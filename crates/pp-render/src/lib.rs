//! Plain-text rendering of a styled document.
//!
//! The renderer walks the tree depth first, lays words out greedily against a
//! column budget, breaks lines around block elements and annotates safe links
//! with their targets.

use log::debug;
use pp_css::StyleSheet;
use pp_dom::Document;
use pp_dom::Element;
use pp_dom::NodeData;
use pp_dom::NodeId;
use pp_net::url::is_safe_target;

/// Column budget used when the caller does not pick one.
pub const DEFAULT_WRAP_WIDTH: usize = 80;

const LIST_MARKER: &str = "- ";
const MAX_ENTITY_LEN: usize = 9;

/// Hyperlink found in a page: visible label plus the raw, trimmed target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub label: String,
    pub href: String,
}

/// Renders documents as word-wrapped plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextRenderer {
    wrap_width: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WRAP_WIDTH)
    }
}

impl TextRenderer {
    /// Creates a renderer; a zero width is clamped to one column.
    pub fn new(wrap_width: usize) -> Self {
        Self {
            wrap_width: wrap_width.max(1),
        }
    }

    pub fn wrap_width(&self) -> usize {
        self.wrap_width
    }

    pub fn render(&self, document: &Document, stylesheet: &StyleSheet) -> String {
        let mut walker = RenderWalk {
            document,
            stylesheet,
            out: LineWriter::new(self.wrap_width),
        };
        walker.run(document.root());

        let text = walker.out.finish();
        debug!(
            "rendered {} nodes into {} lines at width {}",
            document.node_count(),
            text.lines().count(),
            self.wrap_width
        );
        text
    }
}

/// Pending work for the depth-first walk. An element's `Exit` is pushed
/// beneath its children so it runs once they are all emitted.
#[derive(Debug, Clone, Copy)]
enum Frame {
    Enter(NodeId),
    Exit(NodeId),
}

struct RenderWalk<'a> {
    document: &'a Document,
    stylesheet: &'a StyleSheet,
    out: LineWriter,
}

impl RenderWalk<'_> {
    fn run(&mut self, root: NodeId) {
        let mut stack = vec![Frame::Enter(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => self.enter(id, &mut stack),
                Frame::Exit(id) => self.exit(id),
            }
        }
    }

    fn enter(&mut self, id: NodeId, stack: &mut Vec<Frame>) {
        let document = self.document;
        let Some(node) = document.node(id) else {
            return;
        };

        let element = match &node.data {
            NodeData::Text(text) => {
                for word in decode_entities(text).split_whitespace() {
                    self.out.push_word(word);
                }
                return;
            }
            NodeData::Element(element) => element,
        };

        let tag = element.tag.as_str();
        if is_non_rendering_tag(tag) || self.is_hidden(id, element) {
            return;
        }

        if tag == "br" {
            self.out.newline();
        }
        if is_block_tag(tag) {
            self.out.break_line();
        }
        if tag == "li" {
            self.out.list_marker();
        }

        stack.push(Frame::Exit(id));
        stack.extend(element.children().iter().rev().map(|child| Frame::Enter(*child)));
    }

    fn exit(&mut self, id: NodeId) {
        let Some(element) = self.document.element(id) else {
            return;
        };

        if element.tag == "a" {
            if let Some(href) = navigable_href(element) {
                self.out.push_word(&format!("({href})"));
            }
        }

        if is_block_tag(&element.tag) {
            self.out.break_line();
        }
    }

    fn is_hidden(&self, id: NodeId, element: &Element) -> bool {
        inline_style_hides(element)
            || self
                .stylesheet
                .compute_style(self.document, id)
                .is_display_none()
    }
}

/// Output buffer tracking the length of the current line in characters.
struct LineWriter {
    out: String,
    line_len: usize,
    width: usize,
    after_marker: bool,
}

impl LineWriter {
    fn new(width: usize) -> Self {
        Self {
            out: String::new(),
            line_len: 0,
            width,
            after_marker: false,
        }
    }

    fn newline(&mut self) {
        if self.after_marker {
            // A marker with nothing after it keeps no trailing space.
            self.out.pop();
        }
        self.out.push('\n');
        self.line_len = 0;
        self.after_marker = false;
    }

    fn break_line(&mut self) {
        if self.line_len > 0 {
            self.newline();
        }
    }

    fn list_marker(&mut self) {
        self.break_line();
        self.out.push_str(LIST_MARKER);
        self.line_len = LIST_MARKER.len();
        self.after_marker = true;
    }

    /// Places `word`, breaking first when a separating space would push the
    /// line past the width. Words longer than the width are placed whole, and
    /// the first word after a list marker always stays on the marker's line.
    fn push_word(&mut self, word: &str) {
        let word_len = word.chars().count();
        if self.line_len > 0 && !self.after_marker {
            if self.line_len + 1 + word_len > self.width {
                self.newline();
            } else {
                self.out.push(' ');
                self.line_len += 1;
            }
        }

        self.out.push_str(word);
        self.line_len += word_len;
        self.after_marker = false;
    }

    fn finish(self) -> String {
        collapse_blank_lines(&self.out).trim().to_owned()
    }
}

fn is_block_tag(tag: &str) -> bool {
    matches!(
        tag,
        "html"
            | "body"
            | "main"
            | "article"
            | "section"
            | "header"
            | "footer"
            | "nav"
            | "aside"
            | "div"
            | "p"
            | "pre"
            | "blockquote"
            | "ul"
            | "ol"
            | "li"
            | "dl"
            | "dt"
            | "dd"
            | "table"
            | "thead"
            | "tbody"
            | "tfoot"
            | "tr"
            | "td"
            | "th"
            | "caption"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "form"
            | "fieldset"
            | "legend"
            | "figure"
            | "figcaption"
            | "address"
            | "hr"
    )
}

fn is_non_rendering_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "noscript" | "meta" | "link" | "head")
}

fn inline_style_hides(element: &Element) -> bool {
    element
        .attr("style")
        .is_some_and(|style| style.to_ascii_lowercase().contains("display:none"))
}

fn navigable_href(element: &Element) -> Option<&str> {
    let href = element.attr("href")?.trim();
    (!href.is_empty() && is_safe_target(href)).then_some(href)
}

fn collapse_blank_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut newlines = 0_usize;
    for ch in input.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(ch);
    }
    out
}

/// Decodes the small entity table used for rendered text.
///
/// Named `amp`, `lt`, `gt`, `quot`, `apos` and `nbsp` (as a plain space) are
/// recognized along with decimal and hex character references. Numeric
/// references outside the printable single-byte range are dropped. Unknown
/// names, references that fail to parse and `&` without a nearby `;` are kept
/// verbatim.
pub fn decode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0_usize;

    while let Some(rel_amp) = input[cursor..].find('&') {
        let amp = cursor + rel_amp;
        out.push_str(&input[cursor..amp]);

        let rest = &input[amp + 1..];
        let Some(rel_semi) = rest.find(';').filter(|rel| *rel <= MAX_ENTITY_LEN) else {
            out.push('&');
            cursor = amp + 1;
            continue;
        };

        let entity = &rest[..rel_semi];
        match decode_entity(entity) {
            Some(Some(ch)) => out.push(ch),
            Some(None) => {}
            None => {
                out.push('&');
                out.push_str(entity);
                out.push(';');
            }
        }
        cursor = amp + 1 + rel_semi + 1;
    }

    out.push_str(&input[cursor..]);
    out
}

/// `None` leaves the entity verbatim; `Some(None)` drops it.
fn decode_entity(entity: &str) -> Option<Option<char>> {
    let ch = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" | "#39" => '\'',
        "nbsp" => ' ',
        _ => {
            let digits = entity.strip_prefix('#')?;
            let value = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse::<u32>().ok()?,
            };
            return Some(printable_byte(value));
        }
    };
    Some(Some(ch))
}

fn printable_byte(value: u32) -> Option<char> {
    match value {
        0x20..=0x7E | 0xA0..=0xFF => char::from_u32(value),
        _ => None,
    }
}

/// Greedily re-wraps `text` to `width` columns, keeping existing line breaks.
/// Whitespace inside a line collapses to single spaces, over-long words stay
/// whole and a line-leading `-` keeps the following word, matching the list
/// markers of rendered text. Wrapping already-wrapped text is a no-op.
pub fn wrap_text(text: &str, width: usize) -> String {
    let width = width.max(1);
    let mut wrapped = Vec::new();

    for line in text.split('\n') {
        let mut current = String::new();
        let mut current_len = 0_usize;
        for word in line.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 {
                let after_marker = current == LIST_MARKER.trim_end();
                if !after_marker && current_len + 1 + word_len > width {
                    wrapped.push(core::mem::take(&mut current));
                    current_len = 0;
                } else {
                    current.push(' ');
                    current_len += 1;
                }
            }
            current.push_str(word);
            current_len += word_len;
        }
        wrapped.push(current);
    }

    wrapped.join("\n")
}

/// Safe hyperlinks with a non-empty label, in document order. Content of
/// non-rendering elements is ignored.
pub fn extract_links(document: &Document) -> Vec<PageLink> {
    let mut links = Vec::new();
    let mut stack = vec![document.root()];

    while let Some(id) = stack.pop() {
        let Some(element) = document.element(id) else {
            continue;
        };
        if is_non_rendering_tag(&element.tag) {
            continue;
        }

        if element.tag != "a" {
            stack.extend(element.children().iter().rev().copied());
            continue;
        }

        let label = decode_entities(&document.text_content(id))
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(href) = navigable_href(element) {
            if !label.is_empty() {
                links.push(PageLink {
                    label,
                    href: href.to_owned(),
                });
            }
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::PageLink;
    use super::TextRenderer;
    use super::decode_entities;
    use super::extract_links;
    use super::wrap_text;
    use pp_css::CssParser;
    use pp_css::StyleSheet;
    use pp_html::HtmlParser;

    fn render(html: &str, width: usize) -> String {
        render_with_css(html, "", width)
    }

    fn render_with_css(html: &str, css: &str, width: usize) -> String {
        let document = HtmlParser.parse(html);
        let stylesheet = if css.is_empty() {
            StyleSheet::empty()
        } else {
            CssParser.parse(css)
        };
        TextRenderer::new(width).render(&document, &stylesheet)
    }

    #[test]
    fn renders_blocks_links_and_skips_hidden_spans() {
        let html = "<html><body><h1>Hello</h1><p>World <a href='https://x'>link</a></p>\
                    <span style='display:none'>hidden</span></body></html>";
        let text = render(html, 80);

        assert_eq!(text, "Hello\nWorld link (https://x)");
        assert!(!text.contains("hidden"));
    }

    #[test]
    fn wraps_words_at_width() {
        assert_eq!(render("<p>aaa bbb ccc</p>", 7), "aaa bbb\nccc");
        assert_eq!(render("<p>a supercalifragilistic b</p>", 5), "a\nsupercalifragilistic\nb");
    }

    #[test]
    fn zero_width_is_clamped() {
        let renderer = TextRenderer::new(0);
        assert_eq!(renderer.wrap_width(), 1);
        assert_eq!(render("<p>a b</p>", 0), "a\nb");
    }

    #[test]
    fn list_items_get_markers() {
        let html = "<ul><li>One</li><li>Two <b>bold</b></li></ul>";
        assert_eq!(render(html, 80), "- One\n- Two bold");
    }

    #[test]
    fn line_breaks_and_blank_line_collapse() {
        assert_eq!(render("<p>one<br>two</p>", 80), "one\ntwo");
        assert_eq!(render("<p>a</p><br><br><br><p>b</p>", 80), "a\n\nb");
    }

    #[test]
    fn skips_non_rendering_subtrees_and_inline_display_none() {
        let html = "<head><title>T</title><style>p{}</style></head>\
                    <body><noscript>n</noscript><link rel=x><meta name=y>\
                    <p STYLE=\"color:red;DISPLAY:NONE\">x</p><p>shown</p></body>";
        assert_eq!(render(html, 80), "shown");
    }

    #[test]
    fn only_literal_display_none_hides_inline() {
        assert_eq!(render("<p hidden>x</p>", 80), "x");
        assert_eq!(render("<p style='display: none'>y</p>", 80), "y");
        assert_eq!(render("<template>t</template>", 80), "t");
    }

    #[test]
    fn stylesheet_display_none_hides_elements() {
        let html = "<div class=\"ad\">buy <b>now</b></div><div>keep</div>";
        assert_eq!(render_with_css(html, ".ad { display: none }", 80), "keep");
        assert_eq!(render_with_css(html, "", 80), "buy now\nkeep");
    }

    #[test]
    fn annotates_only_safe_links() {
        let html = "<p>see <a href=\" /docs \">docs</a> or <a href=\"javascript:x\">this</a></p>";
        assert_eq!(render(html, 80), "see docs (/docs) or this");
    }

    #[test]
    fn decodes_entities_before_collapsing() {
        assert_eq!(render("<p>fish &amp;&nbsp;chips &lt;3</p>", 80), "fish & chips <3");
    }

    #[test]
    fn decodes_entity_table() {
        assert_eq!(decode_entities("fish &amp; chips"), "fish & chips");
        assert_eq!(decode_entities("&lt;b&gt;"), "<b>");
        assert_eq!(decode_entities("&quot;&apos;&#39;"), "\"''");
        assert_eq!(decode_entities("&#65;&#x42;&#X43;"), "ABC");
        assert_eq!(decode_entities("caf&#233;"), "caf\u{e9}");
        assert_eq!(decode_entities("a&nbsp;b"), "a b");
    }

    #[test]
    fn drops_unprintable_and_keeps_unknown_entities() {
        assert_eq!(decode_entities("x&#1234;y&#7;z"), "xyz");
        assert_eq!(decode_entities("&copy; &bogus"), "&copy; &bogus");
        assert_eq!(decode_entities("&#zz;"), "&#zz;");
        assert_eq!(decode_entities("&averylongentity;"), "&averylongentity;");
    }

    #[test]
    fn rewrapping_rendered_text_is_idempotent() {
        let html = "<h2>Notes</h2><p>The quick brown fox jumps over the lazy dog while \
                    the five boxing wizards jump quickly.</p><ul><li>alpha beta</li></ul>";
        let text = render(html, 20);

        assert_eq!(wrap_text(&text, 20), text);

        let list = render("<ul><li>abcd</li><li><li>x</li></li></ul>", 5);
        assert_eq!(list, "- abcd\n-\n- x");
        assert_eq!(wrap_text(&list, 5), list);
        assert_eq!(wrap_text("aaa - bbbbbb", 3), "aaa\n- bbbbbb");

        let once = wrap_text("one two  three four\n\nfive six seven", 9);
        assert_eq!(once, "one two\nthree\nfour\n\nfive six\nseven");
        assert_eq!(wrap_text(&once, 9), once);
    }

    #[test]
    fn extracts_safe_labelled_links() {
        let html = "<nav><a href=\"/a\">First &amp; best</a><a href=\"data:x\">bad</a>\
                    <a href=\"/empty\"> </a></nav><head><a href=\"/meta\">m</a></head>\
                    <p><a href=\" https://example.com/b \">Second\n link</a></p>";
        let document = HtmlParser.parse(html);

        assert_eq!(
            extract_links(&document),
            vec![
                PageLink {
                    label: "First & best".to_owned(),
                    href: "/a".to_owned(),
                },
                PageLink {
                    label: "Second link".to_owned(),
                    href: "https://example.com/b".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn survives_very_deep_nesting() {
        let unclosed = format!("{}x", "<p>".repeat(100_000));
        assert_eq!(render(&unclosed, 80), "x");

        let html = format!("{}<a href=\"/deep\">deep</a>", "<span>".repeat(100_000));
        let document = HtmlParser.parse(&html);
        assert_eq!(render(&html, 80), "deep (/deep)");
        assert_eq!(
            extract_links(&document),
            vec![PageLink {
                label: "deep".to_owned(),
                href: "/deep".to_owned(),
            }]
        );
    }
}
