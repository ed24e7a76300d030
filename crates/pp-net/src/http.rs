//! HTTP response contracts shared with the fetch collaborator.

use encoding_rs::Encoding;
use encoding_rs::UTF_8;

/// Case-insensitive header mapping. Names are stored lowercased and a
/// repeated name replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.trim().to_ascii_lowercase();
        let value: String = value.into();
        let value = value.trim().to_owned();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name.trim()))
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses `Name: value` lines (as found after an HTTP status line),
    /// skipping anything without a colon.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut headers = Self::new();
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                if !name.trim().is_empty() {
                    headers.insert(name, value);
                }
            }
        }
        headers
    }
}

/// Raw response handed back by a fetch collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status_line: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status_line: impl Into<String>, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status_line: status_line.into(),
            headers,
            body,
        }
    }

    /// Numeric status from a line like `HTTP/1.1 301 Moved Permanently`.
    pub fn status_code(&self) -> Option<u16> {
        self.status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status_code(), Some(301 | 302 | 303 | 307 | 308))
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").filter(|value| !value.is_empty())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Charset label declared by the `Content-Type` header, if any.
    pub fn declared_charset(&self) -> Option<&str> {
        self.content_type().and_then(parse_charset_from_content_type)
    }

    /// Decodes the body using the declared charset. A byte-order mark takes
    /// precedence; undeclared or unknown labels fall back to UTF-8.
    pub fn body_text(&self) -> String {
        let encoding = self
            .declared_charset()
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        let (decoded, _, _) = encoding.decode(&self.body);
        decoded.into_owned()
    }
}

fn parse_charset_from_content_type(content_type: &str) -> Option<&str> {
    for part in content_type.split(';').skip(1) {
        let Some((name, value)) = part.split_once('=') else {
            continue;
        };
        if !name.trim().eq_ignore_ascii_case("charset") {
            continue;
        }

        let label = value.trim().trim_matches('"').trim_matches('\'');
        if !label.is_empty() {
            return Some(label);
        }
    }

    None
}
