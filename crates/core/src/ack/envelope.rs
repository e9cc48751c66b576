use std::ops::Range;

use crate::error::{EdiError, StructuralKind};

/// Fixed field offsets of an interchange header, by syntax identifier.
///
/// Offsets are character positions into the header text, which runs from the
/// first character of the identifier through the segment terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeLayout {
    /// Segment identifier (`"ISA"`).
    pub identifier: &'static str,
    /// Everything before the sender qualifier.
    pub prefix: Range<usize>,
    /// Sender qualifier, sender id and the delimiter after it.
    pub sender: Range<usize>,
    /// Receiver qualifier, receiver id and the delimiter after it.
    pub receiver: Range<usize>,
    /// Interchange date.
    pub date: Range<usize>,
    /// Interchange time.
    pub time: Range<usize>,
    /// Fields after the time, up to the terminator.
    pub trailer: Range<usize>,
    /// Interchange control number.
    pub control_number: Range<usize>,
    /// Acknowledgment-requested flag.
    pub ack_requested: usize,
    /// Shortest acceptable header.
    pub min_len: usize,
}

const LAYOUTS: &[EnvelopeLayout] = &[EnvelopeLayout {
    identifier: "ISA",
    prefix: 0..32,
    sender: 32..51,
    receiver: 51..70,
    date: 70..76,
    time: 77..81,
    trailer: 81..105,
    control_number: 90..99,
    ack_requested: 100,
    min_len: 105,
}];

impl EnvelopeLayout {
    /// Layout for a syntax identifier, if one is known.
    pub fn for_identifier(identifier: &str) -> Option<&'static EnvelopeLayout> {
        LAYOUTS.iter().find(|l| l.identifier == identifier)
    }
}

/// Fields of an interchange header cut out at the layout's offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    /// Text before the sender.
    pub prefix: String,
    /// Sender qualifier and id, with trailing delimiter.
    pub sender: String,
    /// Receiver qualifier and id, with trailing delimiter.
    pub receiver: String,
    /// Date as sent.
    pub date: String,
    /// Time as sent.
    pub time: String,
    /// Fields after the time, without the terminator.
    pub trailer: String,
    /// Interchange control number.
    pub control_number: String,
    /// Whether an interchange acknowledgment (TA1) was requested.
    pub ack_requested: bool,
}

impl EnvelopeHeader {
    /// Cut `text` into fields.
    ///
    /// Fails when `text` has fewer characters than the layout allows.
    pub fn parse(text: &str, layout: &EnvelopeLayout) -> Result<Self, EdiError> {
        let chars: Vec<char> = text.chars().collect();
        if chars.len() < layout.min_len {
            return Err(EdiError::structural(
                StructuralKind::EnvelopeHeader,
                layout.identifier,
                format!("at least {} characters", layout.min_len),
                format!("{} characters", chars.len()),
            ));
        }
        let field = |r: &Range<usize>| chars[r.clone()].iter().collect::<String>();
        Ok(Self {
            prefix: field(&layout.prefix),
            sender: field(&layout.sender),
            receiver: field(&layout.receiver),
            date: field(&layout.date),
            time: field(&layout.time),
            trailer: field(&layout.trailer),
            control_number: field(&layout.control_number),
            ack_requested: chars.get(layout.ack_requested) == Some(&'1'),
        })
    }

    /// Header for the reply interchange: sender and receiver swapped, fresh
    /// date and time, remaining fields copied.
    ///
    /// Occurrences of `input_delimiter` are replaced with `delimiter` when the
    /// two differ.
    pub fn reply_header(
        &self,
        input_delimiter: char,
        delimiter: char,
        date: &str,
        time: &str,
    ) -> String {
        let header = format!(
            "{}{}{}{date}{input_delimiter}{time}{}",
            self.prefix, self.receiver, self.sender, self.trailer
        );
        if input_delimiter == delimiter {
            header
        } else {
            header.replace(input_delimiter, delimiter.encode_utf8(&mut [0u8; 4]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *230101*1253*U*00401*000000905*1*T*>~";

    #[test]
    fn parses_isa_fields() {
        let layout = EnvelopeLayout::for_identifier("ISA").unwrap();
        let h = EnvelopeHeader::parse(ISA, layout).unwrap();
        assert_eq!(h.sender, "ZZ*SENDER         *");
        assert_eq!(h.receiver, "ZZ*RECEIVER       *");
        assert_eq!(h.date, "230101");
        assert_eq!(h.time, "1253");
        assert_eq!(h.trailer, "*U*00401*000000905*1*T*>");
        assert_eq!(h.control_number, "000000905");
        assert!(h.ack_requested);
    }

    #[test]
    fn reply_header_swaps_parties() {
        let layout = EnvelopeLayout::for_identifier("ISA").unwrap();
        let h = EnvelopeHeader::parse(ISA, layout).unwrap();
        let reply = h.reply_header('*', '*', "240229", "0930");
        assert_eq!(
            reply,
            "ISA*00*          *00*          *ZZ*RECEIVER       *ZZ*SENDER         *240229*0930*U*00401*000000905*1*T*>"
        );
        let piped = h.reply_header('*', '|', "240229", "0930");
        assert!(piped.starts_with("ISA|00|"));
        assert!(!piped.contains('*'));
    }

    #[test]
    fn short_header_is_structural() {
        let layout = EnvelopeLayout::for_identifier("ISA").unwrap();
        let err = EnvelopeHeader::parse(&ISA[..60], layout).unwrap_err();
        assert!(matches!(
            err,
            EdiError::Structural {
                kind: StructuralKind::EnvelopeHeader,
                ..
            }
        ));
    }

    #[test]
    fn fields_are_cut_by_character() {
        let layout = EnvelopeLayout::for_identifier("ISA").unwrap();
        let text = ISA.replace("SENDER", "SEND\u{c9}R");
        assert_eq!(text.chars().count(), ISA.chars().count());
        let h = EnvelopeHeader::parse(&text, layout).unwrap();
        assert_eq!(h.sender, "ZZ*SEND\u{c9}R         *");
        assert_eq!(h.date, "230101");
        assert_eq!(h.control_number, "000000905");
        assert!(h.ack_requested);
    }

    #[test]
    fn unknown_identifier_has_no_layout() {
        assert!(EnvelopeLayout::for_identifier("UNB").is_none());
    }
}
