//! URL parsing, navigation safety and relative link resolution.

use core::fmt;
use pp_core::PapyrusError;
use pp_core::PapyrusResult;
use url::Url;

const UNSAFE_SCHEME_PREFIXES: &[&str] = &["javascript:", "data:", "file:", "vbscript:"];

/// Supported application-level URL schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }

    pub fn is_secure(self) -> bool {
        matches!(self, Self::Https)
    }

    pub fn default_port(self) -> u16 {
        match self {
            Self::Http => 80,
            Self::Https => 443,
        }
    }
}

/// Components of an absolute `scheme://host[:port][/path]` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlParts {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: Option<String>,
}

impl UrlParts {
    pub fn parse(input: &str) -> PapyrusResult<Self> {
        let input = input.trim();
        let Some((scheme_raw, _)) = input.split_once("://") else {
            return Err(PapyrusError::new(
                "net.url.missing_scheme",
                format!("URL `{input}` must have the form scheme://host[:port][/path]"),
            ));
        };

        let scheme = match scheme_raw.to_ascii_lowercase().as_str() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => {
                return Err(PapyrusError::new(
                    "net.url.scheme_unsupported",
                    format!("unsupported scheme `{other}`"),
                ));
            }
        };

        let parsed = Url::parse(input).map_err(|error| {
            PapyrusError::new(
                "net.url.invalid",
                format!("failed to parse URL `{input}`: {error}"),
            )
        })?;

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(PapyrusError::new(
                "net.url.credentials_disallowed",
                "URL userinfo (`username:password@`) is not allowed",
            ));
        }

        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| PapyrusError::new("net.url.host_missing", "URL must include a host"))?
            .to_ascii_lowercase();

        let port = parsed
            .port_or_known_default()
            .unwrap_or_else(|| scheme.default_port());

        let path = match parsed.path() {
            "" => "/".to_owned(),
            path => path.to_owned(),
        };

        Ok(Self {
            scheme,
            host,
            port,
            path,
            query: parsed.query().map(str::to_owned),
        })
    }

    pub fn is_secure(&self) -> bool {
        self.scheme.is_secure()
    }

    /// `host[:port]`, omitting the port when it is the scheme default.
    pub fn authority(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.authority())
    }

    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// Path up to and including its last `/`.
    pub fn directory(&self) -> &str {
        match self.path.rfind('/') {
            Some(slash) => &self.path[..=slash],
            None => "/",
        }
    }
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.origin(), self.path_and_query())
    }
}

/// Navigation gate: false for `javascript:`, `data:`, `file:` and
/// `vbscript:` targets (case-insensitive, surrounding whitespace and embedded
/// tab/newline characters ignored).
pub fn is_safe_target(href: &str) -> bool {
    let cleaned = href
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '\t' | '\n' | '\r'))
        .collect::<String>()
        .to_ascii_lowercase();

    !UNSAFE_SCHEME_PREFIXES
        .iter()
        .any(|prefix| cleaned.starts_with(prefix))
}

/// Resolves `href` against `base_url`, returning an empty string when the
/// target is unsafe, unsupported or the base cannot be parsed.
pub fn resolve(base_url: &str, href: &str) -> String {
    try_resolve(base_url, href)
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Resolves `href` against `base_url`.
///
/// `Ok(None)` means the href itself is empty, unsafe or names a scheme other
/// than http(s). `Err` is reserved for caller misuse: a base URL that does
/// not parse.
pub fn try_resolve(base_url: &str, href: &str) -> PapyrusResult<Option<String>> {
    let href = href.trim();
    if href.is_empty() || !is_safe_target(href) {
        return Ok(None);
    }

    if is_absolute_http(href) {
        return Ok(Some(href.to_owned()));
    }

    if has_explicit_scheme(href) {
        return Ok(None);
    }

    let base = UrlParts::parse(base_url)?;

    if href.starts_with('#') {
        return Ok(Some(base_url.trim().to_owned()));
    }

    if href.starts_with("//") {
        return Ok(Some(format!("{}:{href}", base.scheme.as_str())));
    }

    if href.starts_with('/') {
        return Ok(Some(format!("{}{}", base.origin(), normalize_path(href))));
    }

    let joined = format!("{}{href}", base.directory());
    Ok(Some(format!("{}{}", base.origin(), normalize_path(&joined))))
}

/// Collapses `.` and `..` segments. `..` at the root is a no-op, so the
/// result always starts with `/`. A `?query` or `#fragment` suffix is carried
/// through untouched.
pub fn normalize_path(path: &str) -> String {
    let (path_part, suffix) = match path.find(['?', '#']) {
        Some(idx) => (&path[..idx], &path[idx..]),
        None => (path, ""),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in path_part.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut out = String::with_capacity(path.len().max(1));
    out.push('/');
    out.push_str(&segments.join("/"));
    if path_part.ends_with('/') && !segments.is_empty() {
        out.push('/');
    }
    out.push_str(suffix);
    out
}

fn is_absolute_http(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn has_explicit_scheme(href: &str) -> bool {
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    let mut chars = scheme.chars();

    chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
}
