//! Error type shared by the tokenizer, loop machine, acknowledgment generator
//! and reader.

use std::collections::BTreeMap;
use std::io;

use edi_toolchain_diagnostics::{Diagnostic, codes};
use edi_toolchain_plans::PlanError;

use crate::tokenizer::Cursor;

/// What kind of structural problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum StructuralKind {
    /// A loop's required parent path did not match the open loops.
    LoopNesting,
    /// The interchange header is unrecognized or too short for its layout.
    EnvelopeHeader,
    /// Input ended inside a segment or an envelope, or an envelope ended or
    /// a sibling began before the one nested in it was closed.
    Unterminated,
}

/// Errors raised while reading EDI input or generating acknowledgments.
///
/// End of input is not an error; it is reported as an
/// [`EndOfInput`](crate::syntax::CharClass::EndOfInput) token.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum EdiError {
    /// The input does not have the structure it claims.
    #[error("{segment}: expected {expected}, found {actual}")]
    Structural {
        /// Category used to pick a diagnostic code.
        kind: StructuralKind,
        /// Segment (or envelope identifier) at which the problem was detected.
        segment: String,
        /// What the context should have been.
        expected: String,
        /// What it actually was.
        actual: String,
        /// Tokenizer position when the problem was detected, if known.
        position: Option<Cursor>,
    },

    /// Syntax characters or other settings are missing or inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A buffer request exceeds the tokenizer's fixed capacity.
    #[error("configuration error: {what} of {requested} characters exceeds buffer capacity {capacity}")]
    Capacity {
        /// What was requested (`"pre-read"` or `"lookahead"`).
        what: &'static str,
        /// Number of characters requested.
        requested: usize,
        /// Capacity of the buffer.
        capacity: usize,
    },

    /// Reading the source or writing the sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A loop plan could not be loaded.
    #[error(transparent)]
    Plan(#[from] PlanError),
}

impl EdiError {
    pub(crate) fn structural(
        kind: StructuralKind,
        segment: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        EdiError::Structural {
            kind,
            segment: segment.into(),
            expected: expected.into(),
            actual: actual.into(),
            position: None,
        }
    }

    /// Attach a tokenizer position to a structural error that has none.
    pub fn at(self, cursor: Cursor) -> Self {
        match self {
            EdiError::Structural {
                kind,
                segment,
                expected,
                actual,
                position: None,
            } => EdiError::Structural {
                kind,
                segment,
                expected,
                actual,
                position: Some(cursor),
            },
            other => other,
        }
    }

    /// Whether this is a configuration problem rather than a problem with
    /// the input.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EdiError::Configuration(_) | EdiError::Capacity { .. }
        )
    }

    /// Convert to a [`Diagnostic`] carrying the matching code.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let message = self.to_string();
        match self {
            EdiError::Structural {
                kind,
                segment,
                expected,
                actual,
                position,
            } => {
                let code = match kind {
                    StructuralKind::LoopNesting => codes::LOOP_NESTING,
                    StructuralKind::EnvelopeHeader => codes::ENVELOPE_HEADER,
                    StructuralKind::Unterminated => codes::UNTERMINATED_INTERCHANGE,
                };
                let span = position.map(|c| c.segment_span());
                Diagnostic::error(code, message, span).with_context(BTreeMap::from([
                    ("segment".into(), segment.clone()),
                    ("expected".into(), expected.clone()),
                    ("actual".into(), actual.clone()),
                ]))
            }
            EdiError::Configuration(_) => {
                Diagnostic::error(codes::SYNTAX_UNRESOLVED, message, None)
            }
            EdiError::Capacity { .. } => Diagnostic::error(codes::BUFFER_CAPACITY, message, None),
            EdiError::Io(_) => Diagnostic::error(codes::IO_FAILURE, message, None),
            EdiError::Plan(_) => Diagnostic::error(codes::PLAN_INVALID, message, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_toolchain_diagnostics::{Severity, Span};

    #[test]
    fn structural_maps_kind_to_code() {
        let err = EdiError::structural(StructuralKind::LoopNesting, "AK3", "/AK2", "/");
        let d = err.to_diagnostic();
        assert_eq!(d.id, codes::LOOP_NESTING);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "AK3: expected /AK2, found /");
        let ctx = d.context.unwrap();
        assert_eq!(ctx["expected"], "/AK2");
        assert!(d.span.is_none());
    }

    #[test]
    fn at_attaches_position_once() {
        let first = Cursor {
            chars: 50,
            segment_chars: 4,
            ..Cursor::default()
        };
        let err = EdiError::structural(StructuralKind::Unterminated, "N1", "~", "end of input")
            .at(first)
            .at(Cursor::default());
        let d = err.to_diagnostic();
        assert_eq!(d.span, Some(Span::new(46, 50)));
        assert_eq!(d.id, codes::UNTERMINATED_INTERCHANGE);
    }

    #[test]
    fn capacity_is_configuration() {
        let err = EdiError::Capacity {
            what: "pre-read",
            requested: 2000,
            capacity: 1000,
        };
        assert!(err.is_configuration());
        assert_eq!(err.to_diagnostic().id, codes::BUFFER_CAPACITY);
        assert!(!EdiError::Io(io::Error::other("x")).is_configuration());
    }
}
