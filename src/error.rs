use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WrapError>;

#[derive(Debug, Error)]
pub enum WrapError {
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Macro {name} redefined: `{existing}` vs `{new}`")]
    MacroRedefinition {
        name: String,
        existing: String,
        new: String,
    },

    #[error("Header included twice: {0}")]
    DuplicateInclude(String),

    #[error("{header} requires `{symbol}` to be declared before it")]
    OrderingViolation { header: String, symbol: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported directive on line {line}: {text}")]
    UnsupportedDirective { line: usize, text: String },

    #[error("Unbalanced conditional on line {line}")]
    UnbalancedConditional { line: usize },

    #[error("Circular dependency detected with module {0}")]
    CircularDependency(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Unresolved symbol `{symbol}`: {diagnostic}")]
    UnresolvedSymbol { symbol: String, diagnostic: String },

    #[error("Vendor header {header} not found (searched: {searched:?})")]
    MissingVendorHeader {
        header: String,
        searched: Vec<PathBuf>,
    },

    #[error("Binding generation failed for {module}: {message}")]
    Generation { module: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WrapError {
    /// Prefix the message of message-carrying variants with `context`.
    pub fn with_context(self, context: &str) -> Self {
        match self {
            Self::InvalidConfig(msg) => Self::InvalidConfig(format!("{}: {}", context, msg)),
            Self::Generation { module, message } => Self::Generation {
                module,
                message: format!("{}: {}", context, message),
            },
            Self::UnresolvedSymbol { symbol, diagnostic } => Self::UnresolvedSymbol {
                symbol,
                diagnostic: format!("{}: {}", context, diagnostic),
            },
            other => other,
        }
    }

    /// Whether adding a shim or forward declaration could fix this error.
    pub fn is_shimmable(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedSymbol { .. } | Self::OrderingViolation { .. }
        )
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

pub(crate) fn check_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(WrapError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("__builtin_amdgcn_ds_bpermute"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
        assert!(check_identifier("bad name").is_err());
    }

    #[test]
    fn context_is_prefixed() {
        let err = WrapError::Generation {
            module: "rocwmma".into(),
            message: "clang failed".into(),
        }
        .with_context("include/rocwmma.h");
        assert_eq!(
            err.to_string(),
            "Binding generation failed for rocwmma: include/rocwmma.h: clang failed"
        );
    }

    #[test]
    fn shimmable_errors() {
        let unresolved = WrapError::UnresolvedSymbol {
            symbol: "__builtin_amdgcn_readfirstlane".into(),
            diagnostic: "use of undeclared identifier".into(),
        };
        assert!(unresolved.is_shimmable());
        assert!(!WrapError::UnknownModule("x".into()).is_shimmable());
    }
}
