//! Shared primitives used across Papyrus crates.

use core::fmt;

/// Result alias used across the workspace.
pub type PapyrusResult<T> = Result<T, PapyrusError>;

/// Error carrying a stable dotted code (`net.url.invalid`, ...) and a
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PapyrusError {
    pub code: &'static str,
    pub message: String,
}

impl PapyrusError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns true when the code belongs to the given dotted namespace,
    /// e.g. `err.is_kind("net.url")` for any URL failure.
    pub fn is_kind(&self, prefix: &str) -> bool {
        self.code == prefix
            || self
                .code
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl fmt::Display for PapyrusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PapyrusError {}

#[cfg(test)]
mod tests {
    use super::PapyrusError;

    #[test]
    fn displays_code_and_message() {
        let error = PapyrusError::new("net.url.invalid", "bad url");
        assert_eq!(error.to_string(), "net.url.invalid: bad url");
    }

    #[test]
    fn matches_dotted_namespaces() {
        let error = PapyrusError::new("net.url.scheme_unsupported", "ftp");
        assert!(error.is_kind("net"));
        assert!(error.is_kind("net.url"));
        assert!(error.is_kind("net.url.scheme_unsupported"));
        assert!(!error.is_kind("net.ur"));
        assert!(!error.is_kind("net.fetch"));
    }
}
