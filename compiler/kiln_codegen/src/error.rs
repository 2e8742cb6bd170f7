//! Backend errors.
//!
//! All three conditions are fatal: the session owner stops compilation when
//! it sees one. `PolicyViolation` is a legitimate configuration outcome and
//! is reported to the user like any other error. The other two mean the
//! compiler is internally inconsistent.

use std::fmt;

use kiln_diagnostic::{Diagnostic, ErrorCode};
use kiln_ir::Span;
use thiserror::Error;

/// What kind of runtime symbol a lookup was for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Function,
    Global,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => f.write_str("function"),
            SymbolKind::Global => f.write_str("global"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    /// An implicit runtime dependency was introduced while runtime calls
    /// are disabled.
    #[error(
        "no implicit runtime calls allowed with runtime calls disabled: `{symbol}`{}",
        construct_suffix(.construct.as_deref())
    )]
    PolicyViolation {
        symbol: String,
        /// The language construct that needed the routine, when known.
        construct: Option<&'static str>,
        span: Option<Span>,
    },

    /// A call site asked for a routine or global the catalogue lacks.
    #[error("runtime {kind} `{name}` was not found")]
    RuntimeSymbolMissing { name: String, kind: SymbolKind },

    /// A type reached descriptor construction with no generator for its kind.
    #[error("no type descriptor generator for `{ty}` ({kind} type)")]
    DescriptorKindUnsupported { ty: String, kind: &'static str },
}

fn construct_suffix(construct: Option<&str>) -> String {
    construct.map(|c| format!(" (needed by {c})")).unwrap_or_default()
}

impl BackendError {
    /// True for compiler bugs, false for user-facing failures.
    pub fn is_internal(&self) -> bool {
        self.code().is_internal()
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BackendError::PolicyViolation { .. } => ErrorCode::E5001,
            BackendError::RuntimeSymbolMissing { .. } => ErrorCode::E9003,
            BackendError::DescriptorKindUnsupported { .. } => ErrorCode::E9004,
        }
    }

    /// Attach the triggering construct and location to a policy violation.
    /// Other errors pass through unchanged.
    #[must_use]
    pub fn at_construct(self, what: &'static str, at: Span) -> Self {
        match self {
            BackendError::PolicyViolation { symbol, .. } => BackendError::PolicyViolation {
                symbol,
                construct: Some(what),
                span: Some(at),
            },
            other => other,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.code()).with_message(self.to_string());
        match self {
            BackendError::PolicyViolation {
                construct, span, ..
            } => {
                let diag = match (construct, span) {
                    (Some(c), Some(s)) => {
                        diag.with_label(*s, format!("{c} requires the runtime library"))
                    }
                    (None, Some(s)) => diag.with_label(*s, "requires the runtime library"),
                    (_, None) => diag,
                };
                diag.with_note("remove the construct or compile with runtime calls enabled")
            }
            BackendError::RuntimeSymbolMissing { .. }
            | BackendError::DescriptorKindUnsupported { .. } => {
                diag.with_note("this is a compiler bug")
            }
        }
    }
}
