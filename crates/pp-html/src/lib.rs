//! HTML tokenization and tree construction.
//!
//! The parser is a single forgiving left-to-right scan over the markup with a
//! stack of open elements. Malformed input never fails: unknown constructs are
//! skipped and an unterminated tag simply ends the parse with whatever tree
//! was built so far.

use log::debug;
use log::trace;
use pp_dom::Document;
use pp_dom::Element;
use pp_dom::NodeId;

/// Parses raw HTML into a DOM document.
#[derive(Debug, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn parse(&self, input: &str) -> Document {
        let mut document = Document::new();
        build_tree(input, &mut document);
        debug!(
            "parsed {} bytes of html into {} nodes",
            input.len(),
            document.node_count()
        );
        document
    }

    /// Decodes response bytes as UTF-8 (lossy) and parses them.
    pub fn parse_bytes(&self, input: &[u8]) -> Document {
        self.parse(&String::from_utf8_lossy(input))
    }
}

fn build_tree(input: &str, document: &mut Document) {
    let bytes = input.as_bytes();
    let root = document.root();
    let mut stack: Vec<NodeId> = vec![root];
    let mut idx = 0_usize;

    while idx < bytes.len() {
        let parent = stack.last().copied().unwrap_or(root);

        if !starts_markup(bytes, idx) {
            let next = find_markup_start(bytes, idx.saturating_add(1));
            let text = &input[idx..next];
            if !text.trim().is_empty() {
                document.append_text(parent, text);
            }
            idx = next;
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            idx = skip_comment(bytes, idx);
            continue;
        }

        let Some(gt) = find_byte(bytes, idx.saturating_add(1), b'>') else {
            trace!("unterminated tag at byte {idx}; stopping parse");
            break;
        };
        let raw = &input[idx + 1..gt];
        idx = gt.saturating_add(1);

        if raw.starts_with('!') || raw.starts_with('?') {
            continue;
        }

        if raw.starts_with('/') {
            if stack.len() > 1 {
                stack.pop();
            }
            continue;
        }

        let (raw, self_closing) = match raw.strip_suffix('/') {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };
        let name_end = raw
            .find(|ch: char| ch.is_ascii_whitespace())
            .unwrap_or(raw.len());
        let tag = raw[..name_end].to_ascii_lowercase();

        let Some(element_id) = document.append_element(parent, &tag) else {
            break;
        };
        if let Some(element) = document.element_mut(element_id) {
            parse_attributes(&raw[name_end..], element);
        }

        if is_raw_text_tag(&tag) && !self_closing {
            let (raw_text, after) = read_raw_text_until_end_tag(input, idx, &tag);
            if !raw_text.is_empty() {
                document.append_text(element_id, raw_text);
            }
            idx = after;
            continue;
        }

        if !self_closing && !is_void_tag(&tag) {
            stack.push(element_id);
        }
    }
}

fn parse_attributes(src: &str, element: &mut Element) {
    let bytes = src.as_bytes();
    let mut idx = 0_usize;

    loop {
        idx = skip_spaces(bytes, idx);
        if idx >= bytes.len() {
            break;
        }

        let name_start = idx;
        while idx < bytes.len() && !bytes[idx].is_ascii_whitespace() && bytes[idx] != b'=' {
            idx = idx.saturating_add(1);
        }
        let name = &src[name_start..idx];

        idx = skip_spaces(bytes, idx);
        if bytes.get(idx).copied() != Some(b'=') {
            if !name.is_empty() {
                element.set_attr(name, "true");
            }
            continue;
        }

        idx = skip_spaces(bytes, idx.saturating_add(1));
        if idx >= bytes.len() {
            break;
        }

        let value = match bytes[idx] {
            quote @ (b'"' | b'\'') => {
                let start = idx.saturating_add(1);
                let end = find_byte(bytes, start, quote).unwrap_or(bytes.len());
                idx = end.saturating_add(1);
                &src[start..end]
            }
            _ => {
                let start = idx;
                while idx < bytes.len() && !bytes[idx].is_ascii_whitespace() {
                    idx = idx.saturating_add(1);
                }
                &src[start..idx]
            }
        };

        if !name.is_empty() {
            element.set_attr(name, value);
        }
    }
}

fn read_raw_text_until_end_tag<'a>(
    input: &'a str,
    start: usize,
    tag_name: &str,
) -> (&'a str, usize) {
    let bytes = input.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while idx < bytes.len() {
        if bytes[idx] == b'<'
            && bytes.get(idx.saturating_add(1)).copied() == Some(b'/')
            && starts_with_ignore_ascii_case(bytes, idx.saturating_add(2), tag_bytes)
            && tag_name_boundary(bytes, idx.saturating_add(2 + tag_bytes.len()))
        {
            let after = find_byte(bytes, idx, b'>')
                .map(|gt| gt.saturating_add(1))
                .unwrap_or(bytes.len());
            return (&input[start..idx], after);
        }

        idx = idx.saturating_add(1);
    }

    trace!("unterminated <{tag_name}> block; capturing to end of input");
    (&input[start.min(bytes.len())..], bytes.len())
}

/// True when the `<` at `idx` opens a tag, end tag, comment or declaration.
fn starts_markup(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx).copied() == Some(b'<')
        && bytes
            .get(idx.saturating_add(1))
            .copied()
            .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, b'/' | b'!' | b'?'))
}

fn find_markup_start(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() {
        if starts_markup(bytes, idx) {
            return idx;
        }
        idx = idx.saturating_add(1);
    }
    bytes.len()
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    find_subslice(bytes, start.saturating_add(4), b"-->")
        .map(|end| end.saturating_add(3))
        .unwrap_or(bytes.len())
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    if end > bytes.len() {
        return false;
    }

    bytes[idx..end]
        .iter()
        .zip(pattern.iter())
        .all(|(left, right)| left.eq_ignore_ascii_case(right))
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}
