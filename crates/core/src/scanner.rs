//! Assembles tokenizer characters into segments.

use edi_toolchain_diagnostics::Span;
use serde::Serialize;

use crate::error::{EdiError, StructuralKind};
use crate::syntax::CharClass;
use crate::tokenizer::{CharSource, Tokenizer};

/// One element of a segment: its repetitions, each split into components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Element {
    /// Repetitions of the element; each holds at least one component.
    pub repetitions: Vec<Vec<String>>,
}

impl Element {
    /// Simple value of the element: the first component of the first
    /// repetition, or `""`.
    pub fn value(&self) -> &str {
        self.components().first().map_or("", String::as_str)
    }

    /// Components of the first repetition.
    pub fn components(&self) -> &[String] {
        self.repetitions.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the element carries no data at all.
    pub fn is_empty(&self) -> bool {
        self.repetitions
            .iter()
            .flatten()
            .all(|component| component.is_empty())
    }
}

/// A segment: its name and elements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    /// Segment identifier (e.g. `"ST"`, `"N1"`).
    pub name: String,
    /// Elements following the name.
    pub elements: Vec<Element>,
    /// Characters covered, from the first name character through the
    /// terminator.
    pub span: Span,
}

impl Segment {
    /// Element by EDI reference number: `element(1)` is `ST01`.
    pub fn element(&self, number: usize) -> Option<&Element> {
        number.checked_sub(1).and_then(|i| self.elements.get(i))
    }

    /// Simple value of element `number` (1-based), or `""` when absent.
    pub fn value(&self, number: usize) -> &str {
        self.element(number).map_or("", Element::value)
    }
}

/// Reads segments from a tokenizer.
///
/// Whitespace between segments (line breaks and spaces after a terminator) is
/// skipped. A release character makes the next character literal data.
#[derive(Debug, Default)]
pub struct SegmentScanner {
    segments_read: usize,
}

#[derive(Default)]
struct Builder {
    name: Option<String>,
    text: String,
    repetition: Vec<String>,
    repetitions: Vec<Vec<String>>,
    elements: Vec<Element>,
}

impl Builder {
    fn in_name(&self) -> bool {
        self.name.is_none()
    }

    fn end_component(&mut self) {
        self.repetition.push(std::mem::take(&mut self.text));
    }

    fn end_repetition(&mut self) {
        self.end_component();
        self.repetitions.push(std::mem::take(&mut self.repetition));
    }

    fn end_field(&mut self) {
        if self.in_name() {
            self.name = Some(std::mem::take(&mut self.text));
        } else {
            self.end_repetition();
            self.elements.push(Element {
                repetitions: std::mem::take(&mut self.repetitions),
            });
        }
    }
}

impl SegmentScanner {
    /// A new scanner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of segments returned so far.
    pub fn segments_read(&self) -> usize {
        self.segments_read
    }

    /// Read the next segment, or `None` at end of input.
    ///
    /// End of input after a segment has started is an error.
    pub fn next_segment<S: CharSource>(
        &mut self,
        tokenizer: &mut Tokenizer<'_, S>,
    ) -> Result<Option<Segment>, EdiError> {
        loop {
            let tok = tokenizer.next_char()?;
            match tok.class {
                CharClass::EndOfInput => return Ok(None),
                CharClass::Data if tok.value.is_ascii_whitespace() => continue,
                _ => {
                    tokenizer.push_back();
                    break;
                }
            }
        }

        tokenizer.begin_segment();
        let start = tokenizer.cursor().chars;
        let mut b = Builder::default();

        loop {
            let tok = tokenizer.next_char()?;
            match tok.class {
                CharClass::Terminator => {
                    b.end_field();
                    tokenizer.count_token();
                    break;
                }
                CharClass::Delimiter => {
                    b.end_field();
                    tokenizer.count_token();
                }
                CharClass::SubDelimiter if !b.in_name() => b.end_component(),
                CharClass::RepeatDelimiter if !b.in_name() => b.end_repetition(),
                CharClass::Release => {
                    let escaped = tokenizer.next_char()?;
                    if escaped.is_eof() {
                        return Err(unterminated(&b, tokenizer));
                    }
                    b.text.push(escaped.value);
                }
                CharClass::EndOfInput => return Err(unterminated(&b, tokenizer)),
                _ => b.text.push(tok.value),
            }
        }

        self.segments_read += 1;
        Ok(Some(Segment {
            name: b.name.unwrap_or_default(),
            elements: b.elements,
            span: Span::new(start, tokenizer.cursor().chars),
        }))
    }
}

fn unterminated<S: CharSource>(b: &Builder, tokenizer: &Tokenizer<'_, S>) -> EdiError {
    let name = b.name.clone().unwrap_or_else(|| b.text.clone());
    let terminator = tokenizer
        .syntax()
        .terminator
        .map_or_else(|| "terminator".to_string(), |t| format!("terminator '{t}'"));
    EdiError::structural(StructuralKind::Unterminated, name, terminator, "end of input")
        .at(tokenizer.cursor())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxConfig;
    use crate::tokenizer::StrSource;

    fn scan_all(text: &str, syntax: SyntaxConfig) -> Vec<Segment> {
        let mut t = Tokenizer::new(StrSource::new(text));
        t.set_syntax(syntax);
        let mut s = SegmentScanner::new();
        let mut out = Vec::new();
        while let Some(seg) = s.next_segment(&mut t).unwrap() {
            out.push(seg);
        }
        out
    }

    #[test]
    fn splits_elements_and_components() {
        let segs = scan_all("N1*ST*ACME>WEST~\r\nN4**OH~", SyntaxConfig::x12());
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].name, "N1");
        assert_eq!(segs[0].value(1), "ST");
        assert_eq!(segs[0].element(2).unwrap().components(), ["ACME", "WEST"]);
        assert_eq!(segs[1].value(1), "");
        assert!(segs[1].element(1).unwrap().is_empty());
        assert_eq!(segs[1].value(2), "OH");
        assert_eq!(segs[1].value(9), "");
        assert!(segs[1].element(0).is_none());
    }

    #[test]
    fn span_covers_name_through_terminator() {
        let segs = scan_all("ST*850~\nSE*2~", SyntaxConfig::x12());
        assert_eq!(segs[0].span, Span::new(0, 7));
        assert_eq!(segs[1].span, Span::new(8, 13));
    }

    #[test]
    fn release_character_makes_delimiters_literal() {
        let segs = scan_all("FTX+AAI+++Price?+tax?'s:ok'", SyntaxConfig::edifact());
        assert_eq!(segs.len(), 1);
        assert_eq!(
            segs[0].element(4).unwrap().components(),
            ["Price+tax's", "ok"]
        );
    }

    #[test]
    fn repetitions_split() {
        let syntax = SyntaxConfig {
            repetition_separator: Some('^'),
            ..SyntaxConfig::x12()
        };
        let segs = scan_all("REF*A^B>C~", syntax);
        let reps = &segs[0].element(1).unwrap().repetitions;
        assert_eq!(reps.len(), 2);
        assert_eq!(reps[1], ["B", "C"]);
    }

    #[test]
    fn segment_without_elements() {
        let segs = scan_all("UNS~", SyntaxConfig::x12());
        assert_eq!(segs[0].name, "UNS");
        assert!(segs[0].elements.is_empty());
    }

    #[test]
    fn eof_inside_segment_is_unterminated() {
        let mut t = Tokenizer::new(StrSource::new("ST*997~SE*4"));
        t.set_syntax(SyntaxConfig::x12());
        let mut s = SegmentScanner::new();
        assert!(s.next_segment(&mut t).unwrap().is_some());
        let err = s.next_segment(&mut t).unwrap_err();
        match err {
            EdiError::Structural {
                kind: StructuralKind::Unterminated,
                segment,
                position: Some(pos),
                ..
            } => {
                assert_eq!(segment, "SE");
                assert_eq!(pos.segments, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(s.segments_read(), 1);
    }

    #[test]
    fn trailing_whitespace_is_clean_eof() {
        let segs = scan_all("ST*997~\r\n  \n", SyntaxConfig::x12());
        assert_eq!(segs.len(), 1);
    }

    #[test]
    fn counts_tokens_on_cursor() {
        let mut t = Tokenizer::new(StrSource::new("AK1*PO*1~"));
        t.set_syntax(SyntaxConfig::x12());
        SegmentScanner::new().next_segment(&mut t).unwrap();
        let c = t.cursor();
        assert_eq!(c.segment_tokens, 3);
        assert_eq!(c.segment_chars, 9);
        assert_eq!(c.segments, 1);
    }
}
