use core::fmt;

/// Structured error for FB2 loading.
///
/// Structural problems are fatal: no book is produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fb2Error {
    /// Document element is not `FictionBook`.
    RootMismatch { found: Box<str> },
    /// Document contains no element at all.
    MissingRoot,
    /// Closing tag without a matching open element.
    UnbalancedClose { name: Box<str>, offset: usize },
    /// Tokenizer or decoding failure.
    Tokenize {
        code: &'static str,
        message: Box<str>,
        source: &'static str,
        offset: usize,
    },
}

impl Fb2Error {
    pub(crate) fn tokenize(
        code: &'static str,
        message: impl Into<String>,
        source: &'static str,
        offset: usize,
    ) -> Self {
        Self::Tokenize {
            code,
            message: message.into().into_boxed_str(),
            source,
            offset,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RootMismatch { .. } => "FB2_ROOT_MISMATCH",
            Self::MissingRoot => "FB2_MISSING_ROOT",
            Self::UnbalancedClose { .. } => "FB2_UNBALANCED_CLOSE",
            Self::Tokenize { code, .. } => code,
        }
    }

    /// Byte offset in the input where the error was detected, if known.
    pub fn token_offset(&self) -> Option<usize> {
        match self {
            Self::UnbalancedClose { offset, .. } | Self::Tokenize { offset, .. } => Some(*offset),
            Self::RootMismatch { .. } | Self::MissingRoot => None,
        }
    }
}

impl fmt::Display for Fb2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootMismatch { found } => write!(
                f,
                "{}: root element must be FictionBook, found {}",
                self.code(),
                found
            ),
            Self::MissingRoot => write!(f, "{}: document has no root element", self.code()),
            Self::UnbalancedClose { name, offset } => write!(
                f,
                "{}: unexpected closing tag {} [offset={}]",
                self.code(),
                name,
                offset
            ),
            Self::Tokenize {
                code,
                message,
                source,
                offset,
            } => write!(
                f,
                "{}: {} [source={} offset={}]",
                code, message, source, offset
            ),
        }
    }
}

impl std::error::Error for Fb2Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_context() {
        let err = Fb2Error::tokenize("FB2_TOKENIZE_ERROR", "bad", "xml tokenizer", 12);
        let msg = err.to_string();
        assert!(msg.contains("FB2_TOKENIZE_ERROR"));
        assert!(msg.contains("source=xml tokenizer"));
        assert!(msg.contains("offset=12"));
        assert_eq!(err.token_offset(), Some(12));
    }

    #[test]
    fn root_mismatch_names_found_element() {
        let err = Fb2Error::RootMismatch {
            found: "html".into(),
        };
        assert_eq!(err.code(), "FB2_ROOT_MISMATCH");
        assert!(err.to_string().contains("found html"));
        assert_eq!(err.token_offset(), None);
    }
}
