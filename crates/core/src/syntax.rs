//! Syntax characters and character classification.

use serde::{Deserialize, Serialize};

use crate::error::EdiError;

/// Classification of a single input character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharClass {
    /// Element delimiter (X12 `*`, EDIFACT `+`).
    Delimiter,
    /// Component (sub-element) delimiter (X12 ISA16, EDIFACT `:`).
    SubDelimiter,
    /// Release (escape) character; makes the next character literal.
    Release,
    /// Segment terminator (X12 `~`, EDIFACT `'`).
    Terminator,
    /// Repetition separator (X12 ISA11 from 00402 on).
    RepeatDelimiter,
    /// Any other character.
    Data,
    /// The source is exhausted.
    EndOfInput,
}

/// The set of syntax characters used to read an interchange.
///
/// Every field is optional: `None` means "not set here" and is filled from a
/// fallback with [`SyntaxConfig::or`]. Delimiter and terminator must be
/// resolved before tokenizing starts; see [`SyntaxConfig::ensure_resolved`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyntaxConfig {
    /// Element delimiter.
    pub delimiter: Option<char>,
    /// Component delimiter.
    pub sub_delimiter: Option<char>,
    /// Release character.
    pub release: Option<char>,
    /// Segment terminator.
    pub terminator: Option<char>,
    /// Repetition separator.
    pub repetition_separator: Option<char>,
    /// Characters that customarily follow the terminator (e.g. `"\r\n"`).
    pub terminator_suffix: Option<String>,
}

impl SyntaxConfig {
    /// Conventional X12 characters: `*` `>` `~` with no release or repetition.
    pub fn x12() -> Self {
        Self {
            delimiter: Some('*'),
            sub_delimiter: Some('>'),
            release: None,
            terminator: Some('~'),
            repetition_separator: None,
            terminator_suffix: None,
        }
    }

    /// EDIFACT service string defaults (`UNA:+.? '`).
    pub fn edifact() -> Self {
        Self {
            delimiter: Some('+'),
            sub_delimiter: Some(':'),
            release: Some('?'),
            terminator: Some('\''),
            repetition_separator: None,
            terminator_suffix: None,
        }
    }

    /// Classify `c`. Checks run in a fixed order (delimiter, sub-delimiter,
    /// release, terminator, repetition separator) and the first match wins.
    pub fn classify(&self, c: char) -> CharClass {
        let is = |slot: Option<char>| slot == Some(c);
        if is(self.delimiter) {
            CharClass::Delimiter
        } else if is(self.sub_delimiter) {
            CharClass::SubDelimiter
        } else if is(self.release) {
            CharClass::Release
        } else if is(self.terminator) {
            CharClass::Terminator
        } else if is(self.repetition_separator) {
            CharClass::RepeatDelimiter
        } else {
            CharClass::Data
        }
    }

    /// Fill every unset field from `fallback`.
    pub fn or(&self, fallback: &SyntaxConfig) -> SyntaxConfig {
        SyntaxConfig {
            delimiter: self.delimiter.or(fallback.delimiter),
            sub_delimiter: self.sub_delimiter.or(fallback.sub_delimiter),
            release: self.release.or(fallback.release),
            terminator: self.terminator.or(fallback.terminator),
            repetition_separator: self.repetition_separator.or(fallback.repetition_separator),
            terminator_suffix: self
                .terminator_suffix
                .clone()
                .or_else(|| fallback.terminator_suffix.clone()),
        }
    }

    /// Return `(delimiter, terminator)` or a configuration error naming the
    /// first unset one.
    pub fn ensure_resolved(&self) -> Result<(char, char), EdiError> {
        let Some(delimiter) = self.delimiter else {
            return Err(EdiError::Configuration(
                "element delimiter is not set".into(),
            ));
        };
        let Some(terminator) = self.terminator else {
            return Err(EdiError::Configuration(
                "segment terminator is not set".into(),
            ));
        };
        Ok((delimiter, terminator))
    }

    /// The terminator followed by its suffix, if any.
    pub fn terminator_with_suffix(&self) -> String {
        let mut s = String::new();
        if let Some(t) = self.terminator {
            s.push(t);
        }
        if let Some(suffix) = &self.terminator_suffix {
            s.push_str(suffix);
        }
        s
    }
}

/// The syntax characters used when *generating* output (acknowledgments).
///
/// Unset fields fall back to the syntax of the interchange being acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyntaxDescriptor {
    /// Element delimiter.
    pub delimiter: Option<char>,
    /// Segment terminator.
    pub terminator: Option<char>,
    /// Characters written after each terminator.
    pub terminator_suffix: Option<String>,
}

impl SyntaxDescriptor {
    /// Overlay this descriptor on `input`, keeping the input's characters
    /// wherever this descriptor is unset.
    pub fn resolve_against(&self, input: &SyntaxConfig) -> SyntaxConfig {
        SyntaxConfig {
            delimiter: self.delimiter,
            terminator: self.terminator,
            terminator_suffix: self.terminator_suffix.clone(),
            ..SyntaxConfig::default()
        }
        .or(input)
    }
}
