//! Tokenizer and segment scanner tests over the public API.
//!
//! Covers push-back, lookahead, the mirror and recording side channels,
//! Latin-1 decoding and the scanner on top of it.

use edi_toolchain_core::{
    CharClass, EdiError, Latin1Source, SegmentScanner, StrSource, SyntaxConfig, Tokenizer,
};

fn x12<'m>(text: &str) -> Tokenizer<'m, StrSource<'_>> {
    let mut t = Tokenizer::new(StrSource::new(text));
    t.set_syntax(SyntaxConfig::x12());
    t
}

fn drain(t: &mut Tokenizer<'_, StrSource<'_>>) -> String {
    let mut out = String::new();
    loop {
        let tok = t.next_char().unwrap();
        if tok.is_eof() {
            return out;
        }
        out.push(tok.value);
    }
}

// ─── Push-back and lookahead ─────────────────────────────────────────────────

#[test]
fn push_back_redelivers_the_same_token() {
    let mut t = x12("ST*850~");
    for _ in 0..3 {
        let first = t.next_char().unwrap();
        t.push_back();
        let again = t.next_char().unwrap();
        assert_eq!(first, again);
    }
    assert_eq!(t.cursor().chars, 3);
    assert_eq!(drain(&mut t), "850~");
}

#[test]
fn push_back_at_end_of_input_repeats_eof() {
    let mut t = x12("~");
    assert_eq!(t.next_char().unwrap().class, CharClass::Terminator);
    assert!(t.next_char().unwrap().is_eof());
    t.push_back();
    assert!(t.next_char().unwrap().is_eof());
    assert!(t.is_eof());
}

#[test]
fn lookahead_does_not_consume() {
    let text = "GS*PO*A*B~ST*850*0001~";
    let mut t = x12(text);
    t.next_char().unwrap();
    let peek = t.lookahead(5).unwrap();
    assert_eq!(peek.iter().collect::<String>(), "S*PO*");
    assert_eq!(t.cursor().chars, 1);
    assert_eq!(drain(&mut t), &text[1..]);
}

#[test]
fn lookahead_past_end_is_padded() {
    let mut t = x12("AB");
    let peek = t.lookahead(4).unwrap();
    assert_eq!(peek, vec!['A', 'B', '?', '?']);
    assert_eq!(drain(&mut t), "AB");
}

#[test]
fn lookahead_beyond_capacity_fails() {
    let mut t = Tokenizer::with_capacity(StrSource::new("ABCDEFGH"), 4, &[]).unwrap();
    let err = t.lookahead(5).unwrap_err();
    assert!(
        matches!(err, EdiError::Capacity { requested: 5, capacity: 4, .. }),
        "{err:?}"
    );
    assert_eq!(t.lookahead(4).unwrap().len(), 4);
}

#[test]
fn small_buffer_streams_long_input() {
    let text = "N1*ST*SHIP TO~".repeat(50);
    let mut t = Tokenizer::with_capacity(StrSource::new(&text), 8, &[]).unwrap();
    t.set_syntax(SyntaxConfig::x12());
    assert_eq!(drain(&mut t), text);
}

#[test]
fn pre_read_characters_come_first() {
    let mut t = Tokenizer::with_pre_read(StrSource::new("*850~"), &['S', 'T']).unwrap();
    t.set_syntax(SyntaxConfig::x12());
    assert_eq!(drain(&mut t), "ST*850~");
}

// ─── Side channels ───────────────────────────────────────────────────────────

#[test]
fn mirror_copies_each_character_once() {
    let text = "ST*850~SE*2~";
    let mut out = Vec::new();
    {
        let mut t = x12(text);
        t.attach_mirror(Box::new(&mut out));
        for _ in 0..4 {
            t.next_char().unwrap();
            t.push_back();
            t.next_char().unwrap();
        }
        drain(&mut t);
        t.detach_mirror().unwrap();
    }
    assert_eq!(String::from_utf8(out).unwrap(), text);
}

/// Mirror output and the two halves of a recording restarted at the tenth
/// read, calling `lookahead(peek)` before every read when `peek` is nonzero.
fn read_with_side_channels(text: &str, peek: usize) -> (String, String, String) {
    let mut out = Vec::new();
    let (head, tail);
    {
        let mut t = Tokenizer::with_capacity(StrSource::new(text), 6, &[]).unwrap();
        t.set_syntax(SyntaxConfig::x12());
        t.attach_mirror(Box::new(&mut out));
        t.start_recording();
        let mut consumed = 0;
        let mut first = String::new();
        loop {
            if peek > 0 {
                t.lookahead(peek).unwrap();
            }
            if t.next_char().unwrap().is_eof() {
                break;
            }
            consumed += 1;
            if consumed == 10 {
                first = t.stop_recording();
                t.start_recording();
            }
        }
        head = first;
        tail = t.stop_recording();
        t.detach_mirror().unwrap();
    }
    (String::from_utf8(out).unwrap(), head, tail)
}

#[test]
fn lookahead_leaves_side_channels_untouched() {
    let text = "ST*850*0001~BEG*00*SA~SE*3*0001~";
    let plain = read_with_side_channels(text, 0);
    assert_eq!(plain.0, text);
    // Both channels lag one character behind the read position.
    assert_eq!(plain.1, &text[..9]);
    assert_eq!(plain.2, &text[9..]);
    for peek in [1, 3, 6] {
        assert_eq!(read_with_side_channels(text, peek), plain, "lookahead({peek})");
    }
}

#[test]
fn suspended_mirror_skips_characters() {
    let mut out = Vec::new();
    {
        let mut t = x12("ABCD");
        t.attach_mirror(Box::new(&mut out));
        t.next_char().unwrap();
        t.suspend_mirror(true);
        t.next_char().unwrap();
        t.next_char().unwrap();
        t.suspend_mirror(false);
        drain(&mut t);
        t.detach_mirror().unwrap();
    }
    // 'A' and 'B' leave while suspended.
    assert_eq!(String::from_utf8(out).unwrap(), "CD");
}

#[test]
fn recording_captures_consumed_text() {
    let mut t = x12("ISA*00~GS*PO~");
    t.start_recording();
    for _ in 0..8 {
        t.next_char().unwrap();
    }
    assert!(t.is_recording());
    assert_eq!(t.stop_recording(), "ISA*00~");
    assert!(!t.is_recording());
}

// ─── Sources ─────────────────────────────────────────────────────────────────

#[test]
fn latin1_source_decodes_every_byte() {
    let bytes: &[u8] = b"N1*M\xdcLLER~";
    let mut t = Tokenizer::new(Latin1Source::new(bytes));
    t.set_syntax(SyntaxConfig::x12());
    let mut scanner = SegmentScanner::new();
    let seg = scanner.next_segment(&mut t).unwrap().unwrap();
    assert_eq!(seg.value(1), "M\u{dc}LLER");
}

// ─── Scanner ─────────────────────────────────────────────────────────────────

#[test]
fn scanner_handles_repetitions_and_release() {
    let syntax = SyntaxConfig {
        repetition_separator: Some('^'),
        ..SyntaxConfig::x12()
    };
    let mut t = x12("REF*A^B*X>Y~");
    t.set_syntax(syntax);
    let mut scanner = SegmentScanner::new();
    let seg = scanner.next_segment(&mut t).unwrap().unwrap();
    assert_eq!(seg.element(1).unwrap().repetitions, vec![vec!["A"], vec!["B"]]);
    assert_eq!(seg.element(2).unwrap().components(), ["X", "Y"]);

    let mut t = Tokenizer::new(StrSource::new("FTX+AAA+++TEXT ?+ MORE?''"));
    t.set_syntax(SyntaxConfig::edifact());
    let seg = scanner.next_segment(&mut t).unwrap().unwrap();
    assert_eq!(seg.value(4), "TEXT + MORE'");
    assert_eq!(scanner.segments_read(), 2);
}

#[test]
fn scanner_reports_unterminated_segment() {
    let mut t = x12("ST*850~SE*2");
    let mut scanner = SegmentScanner::new();
    assert!(scanner.next_segment(&mut t).unwrap().is_some());
    let err = scanner.next_segment(&mut t).unwrap_err();
    let diag = err.to_diagnostic();
    assert_eq!(diag.id, edi_toolchain_core::codes::UNTERMINATED_INTERCHANGE);
    assert!(err.to_string().starts_with("SE:"), "{err}");
}
