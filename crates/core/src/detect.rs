//! Syntax detection from the interchange header.
//!
//! X12 declares its syntax characters at fixed positions of the ISA segment;
//! EDIFACT declares them in the optional UNA service string advice, or uses
//! the defaults when the interchange starts directly with UNB.

use edi_toolchain_plans::Standard;
use tracing::debug;

use crate::error::{EdiError, StructuralKind};
use crate::syntax::SyntaxConfig;

/// How many characters the reader looks ahead to detect the syntax.
pub const DETECTION_WINDOW: usize = 128;

/// Length of an ISA segment up to and including its terminator.
pub const ISA_LENGTH: usize = 106;

/// Length of the UNA service string advice.
pub const UNA_LENGTH: usize = 9;

const ISA_REPETITION: usize = 82;
const ISA_VERSION: std::ops::Range<usize> = 84..89;
const ISA_SUB_DELIMITER: usize = 104;
const ISA_TERMINATOR: usize = 105;

/// First X12 version whose ISA11 is a repetition separator.
const REPETITION_SINCE: &str = "00402";

/// Result of [`detect_syntax`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    /// Standard family of the interchange.
    pub standard: Standard,
    /// Syntax characters declared by the header.
    pub syntax: SyntaxConfig,
    /// Whitespace characters preceding the header.
    pub offset: usize,
    /// Length of a header that must be consumed without classification
    /// (the ISA segment, the UNA advice), or 0.
    pub raw_header_len: usize,
}

/// Work out the syntax of an interchange from its first characters.
///
/// `window` should hold the next [`DETECTION_WINDOW`] characters of input
/// (fewer at end of input), without padding.
pub fn detect_syntax(window: &[char]) -> Result<Detected, EdiError> {
    let offset = window
        .iter()
        .take_while(|c| c.is_ascii_whitespace())
        .count();
    let w = &window[offset..];
    let tag: String = w.iter().take(3).collect();

    let detected = match tag.as_str() {
        "ISA" => detect_isa(w, offset)?,
        "UNA" => detect_una(w, offset)?,
        "UNB" => Detected {
            standard: Standard::Edifact,
            syntax: SyntaxConfig {
                terminator_suffix: suffix_after(w, edifact_terminator_end(w)),
                ..SyntaxConfig::edifact()
            },
            offset,
            raw_header_len: 0,
        },
        _ => {
            return Err(EdiError::structural(
                StructuralKind::EnvelopeHeader,
                if tag.is_empty() { "(empty)" } else { tag.as_str() },
                "ISA, UNA or UNB",
                format!("'{tag}'"),
            ));
        }
    };
    debug!(standard = %detected.standard, syntax = ?detected.syntax, "detected interchange syntax");
    Ok(detected)
}

fn detect_isa(w: &[char], offset: usize) -> Result<Detected, EdiError> {
    if w.len() < ISA_LENGTH {
        return Err(EdiError::structural(
            StructuralKind::EnvelopeHeader,
            "ISA",
            format!("{ISA_LENGTH} characters"),
            format!("{} characters", w.len()),
        ));
    }
    let delimiter = w[3];
    let version: String = w[ISA_VERSION].iter().collect();
    let candidate = w[ISA_REPETITION];
    let repetition_separator = (version.as_str() >= REPETITION_SINCE
        && !candidate.is_ascii_alphanumeric()
        && candidate != delimiter)
        .then_some(candidate);
    Ok(Detected {
        standard: Standard::AnsiX12,
        syntax: SyntaxConfig {
            delimiter: Some(delimiter),
            sub_delimiter: Some(w[ISA_SUB_DELIMITER]),
            release: None,
            terminator: Some(w[ISA_TERMINATOR]),
            repetition_separator,
            terminator_suffix: suffix_after(w, ISA_LENGTH),
        },
        offset,
        raw_header_len: ISA_LENGTH,
    })
}

fn detect_una(w: &[char], offset: usize) -> Result<Detected, EdiError> {
    if w.len() < UNA_LENGTH {
        return Err(EdiError::structural(
            StructuralKind::EnvelopeHeader,
            "UNA",
            format!("{UNA_LENGTH} characters"),
            format!("{} characters", w.len()),
        ));
    }
    let optional = |c: char| (c != ' ').then_some(c);
    Ok(Detected {
        standard: Standard::Edifact,
        syntax: SyntaxConfig {
            sub_delimiter: Some(w[3]),
            delimiter: Some(w[4]),
            release: optional(w[6]),
            repetition_separator: optional(w[7]),
            terminator: Some(w[8]),
            terminator_suffix: suffix_after(w, UNA_LENGTH),
        },
        offset,
        raw_header_len: UNA_LENGTH,
    })
}

/// Position just past the first default EDIFACT terminator, or the window
/// length when there is none.
fn edifact_terminator_end(w: &[char]) -> usize {
    w.iter()
        .position(|&c| c == '\'')
        .map_or(w.len(), |i| i + 1)
}

fn suffix_after(w: &[char], at: usize) -> Option<String> {
    let suffix: String = w
        .iter()
        .skip(at)
        .take_while(|&&c| c == '\r' || c == '\n')
        .collect();
    (!suffix.is_empty()).then_some(suffix)
}
