//! Interchange reader: turns a character stream into structural events.
//!
//! The reader detects the syntax of each interchange, scans its segments,
//! tracks envelopes (interchange, group, transaction), drives a loop state
//! machine per transaction and, for X12 input, drives a 997 acknowledgment
//! generator alongside.

mod events;

pub use events::{
    Event, EventHandler, EventRecorder, Group, Interchange, NullHandler, Transaction,
};

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::NaiveDateTime;
use edi_toolchain_diagnostics::{Diagnostic, Span, codes};
use edi_toolchain_plans::{PlanRegistry, Standard};
use serde::Serialize;
use tracing::{debug, warn};

use crate::ack::{AckGenerator, GroupHeader, InterchangeContext, WritePath};
use crate::config::ReaderConfig;
use crate::detect::{DETECTION_WINDOW, detect_syntax};
use crate::error::{EdiError, StructuralKind};
use crate::loops::LoopStateMachine;
use crate::scanner::{Element, Segment, SegmentScanner};
use crate::syntax::SyntaxConfig;
use crate::tokenizer::{CharSource, Tokenizer};

/// Shorthand for building a `BTreeMap<String, String>` context from key-value pairs.
macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        BTreeMap::from([$(($k.into(), $v.into())),+])
    };
}

/// Envelope segment names of one standard.
#[derive(Debug)]
struct EnvelopeTags {
    interchange_trailer: &'static str,
    group_header: &'static str,
    group_trailer: &'static str,
    transaction_header: &'static str,
    transaction_trailer: &'static str,
}

const X12_TAGS: EnvelopeTags = EnvelopeTags {
    interchange_trailer: "IEA",
    group_header: "GS",
    group_trailer: "GE",
    transaction_header: "ST",
    transaction_trailer: "SE",
};

const EDIFACT_TAGS: EnvelopeTags = EnvelopeTags {
    interchange_trailer: "UNZ",
    group_header: "UNG",
    group_trailer: "UNE",
    transaction_header: "UNH",
    transaction_trailer: "UNT",
};

fn tags_for(standard: Standard) -> &'static EnvelopeTags {
    match standard {
        Standard::AnsiX12 => &X12_TAGS,
        Standard::Edifact => &EDIFACT_TAGS,
    }
}

/// Trailer of the innermost open envelope: the transaction, or with
/// `include_group` also the functional group.
fn open_trailer(
    state: &InterchangeState,
    tags: &EnvelopeTags,
    include_group: bool,
) -> Option<&'static str> {
    if state.transaction.is_some() {
        Some(tags.transaction_trailer)
    } else if include_group && state.group.is_some() {
        Some(tags.group_trailer)
    } else {
        None
    }
}

/// Totals for a completed [`InterchangeReader::read`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSummary {
    /// Interchanges read.
    pub interchanges: usize,
    /// Functional groups read.
    pub groups: usize,
    /// Transaction sets read.
    pub transactions: usize,
    /// Segments read, envelopes included.
    pub segments: usize,
    /// Outcome of each generated acknowledgment, in interchange order.
    pub acknowledgments: Vec<WritePath>,
    /// Warnings and notes produced while reading.
    pub diagnostics: Vec<Diagnostic>,
}

struct OpenGroup {
    group: Group,
    transactions: usize,
}

struct OpenTransaction {
    transaction: Transaction,
    segments: usize,
    machine: LoopStateMachine,
}

/// State of the interchange being read.
struct InterchangeState {
    standard: Standard,
    interchange: Interchange,
    ack_ctx: Option<InterchangeContext>,
    group: Option<OpenGroup>,
    transaction: Option<OpenTransaction>,
    groups: usize,
    transactions: usize,
}

/// Reads every interchange in a character stream.
///
/// ```
/// use edi_toolchain_core::{EventRecorder, InterchangeReader, ReaderConfig, StrSource};
/// use edi_toolchain_plans::PlanRegistry;
///
/// let text = "UNB+UNOA:1+SENDER+RECEIVER+200101:1200+7'\
///             UNH+1+ORDERS:D:96A:UN'NAD+BY+1'UNT+3+1'UNZ+1+7'";
/// let registry = PlanRegistry::builtin();
/// let mut reader =
///     InterchangeReader::new(StrSource::new(text), ReaderConfig::default(), &registry).unwrap();
/// let mut events = EventRecorder::new();
/// let summary = reader.read(&mut events).unwrap();
/// assert_eq!(summary.transactions, 1);
/// ```
pub struct InterchangeReader<'r, S, W = io::Sink> {
    tokenizer: Tokenizer<'static, S>,
    scanner: SegmentScanner,
    config: ReaderConfig,
    registry: &'r PlanRegistry,
    ack_sink: Option<W>,
    ack_timestamp: Option<NaiveDateTime>,
    summary: ReadSummary,
}

impl<S, W> std::fmt::Debug for InterchangeReader<'_, S, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterchangeReader")
            .field("tokenizer", &self.tokenizer)
            .field("config", &self.config)
            .field("acknowledging", &self.ack_sink.is_some())
            .finish_non_exhaustive()
    }
}

impl<'r, S: CharSource> InterchangeReader<'r, S, io::Sink> {
    /// Reader over `source` resolving loop plans through `registry`.
    pub fn new(
        source: S,
        config: ReaderConfig,
        registry: &'r PlanRegistry,
    ) -> Result<Self, EdiError> {
        config.validate()?;
        let mut tokenizer = Tokenizer::with_capacity(source, config.buffer_capacity, &[])?;
        tokenizer.set_syntax(config.syntax.or(&SyntaxConfig::x12()));
        Ok(Self {
            tokenizer,
            scanner: SegmentScanner::new(),
            config,
            registry,
            ack_sink: None,
            ack_timestamp: None,
            summary: ReadSummary::default(),
        })
    }
}

impl<'r, S: CharSource, W: Write> InterchangeReader<'r, S, W> {
    /// Write a 997 acknowledgment for every X12 interchange to `sink`.
    pub fn with_acknowledgment<W2: Write>(self, sink: W2) -> InterchangeReader<'r, S, W2> {
        InterchangeReader {
            tokenizer: self.tokenizer,
            scanner: self.scanner,
            config: self.config,
            registry: self.registry,
            ack_sink: Some(sink),
            ack_timestamp: self.ack_timestamp,
            summary: self.summary,
        }
    }

    /// Stamp acknowledgments with a fixed date and time (builder pattern).
    pub fn with_ack_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.ack_timestamp = Some(timestamp);
        self
    }

    /// Diagnostics produced so far, including those of a failed read.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.summary.diagnostics
    }

    /// Totals so far. After a failed read this covers everything before the
    /// failure, including the rejected acknowledgment.
    pub fn summary(&self) -> &ReadSummary {
        &self.summary
    }

    /// Recover the acknowledgment sink.
    pub fn into_ack_sink(self) -> Option<W> {
        self.ack_sink
    }

    /// Read every interchange to the end of input.
    ///
    /// Envelope inconsistencies become warnings in the summary. A structural
    /// or I/O error stops reading; the pending acknowledgment is turned into
    /// a rejection before the error is returned.
    pub fn read(&mut self, handler: &mut dyn EventHandler) -> Result<ReadSummary, EdiError> {
        while let Some(state) = self.begin_interchange(handler)? {
            let mut ack = AckGenerator::new(self.ack_sink.take(), self.config.ack_syntax.clone());
            if let Some(at) = self.ack_timestamp {
                ack = ack.with_timestamp(at);
            }
            let outcome = self.read_interchange(state, &mut ack, handler);
            if let Err(err) = &outcome {
                debug!(error = %err, "interchange failed");
                if let Err(secondary) = ack.force_negative_acknowledgment() {
                    warn!(error = %secondary, "could not complete negative acknowledgment");
                }
            }
            if let Some(path) = ack.committed_path() {
                self.summary.acknowledgments.push(path);
            }
            self.ack_sink = ack.into_sink();
            outcome?;
            self.summary.interchanges += 1;
        }
        Ok(self.summary.clone())
    }

    // ── Interchange header ──────────────────────────────────────────────

    fn begin_interchange(
        &mut self,
        handler: &mut dyn EventHandler,
    ) -> Result<Option<InterchangeState>, EdiError> {
        let window = loop {
            self.tokenizer.lookahead(DETECTION_WINDOW)?;
            let window: Vec<char> = self
                .tokenizer
                .buffered_input()
                .chars()
                .take(DETECTION_WINDOW)
                .collect();
            if window.is_empty() {
                return Ok(None);
            }
            if !window.iter().all(char::is_ascii_whitespace) {
                break window;
            }
            for _ in 0..window.len() {
                self.tokenizer.next_char()?;
            }
        };

        let detected = detect_syntax(&window).map_err(|e| e.at(self.tokenizer.cursor()))?;
        let syntax = detected.syntax.or(&self.config.syntax);
        self.tokenizer.set_syntax(syntax.clone());
        for _ in 0..detected.offset {
            self.tokenizer.next_char()?;
        }

        let raw = self.take_raw(detected.raw_header_len)?;
        let state = match detected.standard {
            Standard::AnsiX12 => {
                let isa = raw_segment(&raw, &syntax, self.raw_span_start(&raw));
                let interchange = Interchange {
                    standard: Standard::AnsiX12,
                    sender: isa.value(6).trim().to_string(),
                    receiver: isa.value(8).trim().to_string(),
                    control_number: isa.value(13).to_string(),
                    version: isa.value(12).to_string(),
                    ack_requested: isa.value(14) == "1",
                };
                self.count_segment();
                handler.start_interchange(&interchange);
                handler.segment(&isa, 0);
                InterchangeState {
                    standard: Standard::AnsiX12,
                    ack_ctx: Some(InterchangeContext {
                        syntax: syntax.clone(),
                        interchange_ack: interchange.ack_requested,
                        envelope: raw,
                    }),
                    interchange,
                    group: None,
                    transaction: None,
                    groups: 0,
                    transactions: 0,
                }
            }
            Standard::Edifact => {
                let unb = self.next_segment()?.ok_or_else(|| {
                    EdiError::structural(
                        StructuralKind::Unterminated,
                        "UNA",
                        "UNB",
                        "end of input",
                    )
                })?;
                if unb.name != "UNB" {
                    return Err(EdiError::structural(
                        StructuralKind::EnvelopeHeader,
                        unb.name,
                        "UNB",
                        "another segment",
                    )
                    .at(self.tokenizer.cursor()));
                }
                let interchange = Interchange {
                    standard: Standard::Edifact,
                    sender: unb.value(2).to_string(),
                    receiver: unb.value(3).to_string(),
                    control_number: unb.value(5).to_string(),
                    version: component(&unb, 1, 1).to_string(),
                    ack_requested: unb.value(9) == "1",
                };
                handler.start_interchange(&interchange);
                handler.segment(&unb, 0);
                InterchangeState {
                    standard: Standard::Edifact,
                    interchange,
                    ack_ctx: None,
                    group: None,
                    transaction: None,
                    groups: 0,
                    transactions: 0,
                }
            }
        };
        debug!(
            standard = %state.standard,
            control = %state.interchange.control_number,
            "start interchange"
        );
        Ok(Some(state))
    }

    /// Consume `n` characters without segment scanning.
    fn take_raw(&mut self, n: usize) -> Result<String, EdiError> {
        if n > 0 {
            self.tokenizer.begin_segment();
        }
        let mut raw = String::with_capacity(n);
        for _ in 0..n {
            let tok = self.tokenizer.next_char()?;
            if tok.is_eof() {
                return Err(EdiError::structural(
                    StructuralKind::EnvelopeHeader,
                    raw.chars().take(3).collect::<String>(),
                    format!("{n} characters"),
                    format!("{} characters", raw.chars().count()),
                )
                .at(self.tokenizer.cursor()));
            }
            raw.push(tok.value);
        }
        Ok(raw)
    }

    fn raw_span_start(&self, raw: &str) -> usize {
        self.tokenizer.cursor().chars - raw.chars().count()
    }

    // ── Segments ────────────────────────────────────────────────────────

    fn next_segment(&mut self) -> Result<Option<Segment>, EdiError> {
        let segment = self.scanner.next_segment(&mut self.tokenizer)?;
        if segment.is_some() {
            self.count_segment();
        }
        Ok(segment)
    }

    fn count_segment(&mut self) {
        self.summary.segments += 1;
    }

    fn read_interchange(
        &mut self,
        mut state: InterchangeState,
        ack: &mut AckGenerator<W>,
        handler: &mut dyn EventHandler,
    ) -> Result<(), EdiError> {
        let tags = tags_for(state.standard);
        loop {
            let Some(segment) = self.next_segment()? else {
                let open = open_trailer(&state, tags, true).unwrap_or(tags.interchange_trailer);
                return Err(self.unterminated(&state, open, "end of input"));
            };

            let name = segment.name.as_str();
            let nested_group = name == tags.group_header || name == tags.interchange_trailer;
            let envelope = nested_group
                || name == tags.transaction_header
                || name == tags.group_trailer;
            if envelope && let Some(open) = open_trailer(&state, tags, nested_group) {
                return Err(self.unterminated(&state, open, name));
            }

            if let Some(tx) = state.transaction.as_mut() {
                tx.segments += 1;
            }

            if name == tags.group_header {
                self.start_group(&mut state, &segment, ack, handler)?;
            } else if name == tags.transaction_header {
                self.start_transaction(&mut state, &segment, handler);
            } else if name == tags.transaction_trailer {
                self.end_transaction(&mut state, &segment, ack, handler);
            } else if name == tags.group_trailer {
                self.end_group(&mut state, &segment, ack, handler);
            } else if name == tags.interchange_trailer {
                self.end_interchange(&state, &segment, handler);
                ack.finish(true)?;
                return Ok(());
            } else if let Some(tx) = state.transaction.as_mut() {
                let t = tx
                    .machine
                    .transition(name)
                    .map_err(|e| e.at(self.tokenizer.cursor()))?;
                for closed in &t.closed {
                    handler.end_loop(closed);
                }
                if let Some(entered) = &t.loop_entered {
                    let level = tx.machine.open_loops().last().map_or(0, |l| l.level);
                    handler.start_loop(entered, level);
                }
                handler.segment(&segment, t.nesting_level);
            } else {
                self.diagnose(
                    Diagnostic::from_code(
                        codes::UNEXPECTED_SEGMENT,
                        format!("segment {name} outside of any transaction set"),
                        Some(segment.span),
                    )
                    .with_context(ctx!("segment" => name)),
                );
                handler.segment(&segment, 0);
            }
        }
    }

    fn unterminated(&self, state: &InterchangeState, expected: &str, found: &str) -> EdiError {
        EdiError::structural(
            StructuralKind::Unterminated,
            state.interchange.control_number.clone(),
            expected,
            found,
        )
        .at(self.tokenizer.cursor())
    }

    // ── Envelopes ───────────────────────────────────────────────────────

    fn start_group(
        &mut self,
        state: &mut InterchangeState,
        segment: &Segment,
        ack: &mut AckGenerator<W>,
        handler: &mut dyn EventHandler,
    ) -> Result<(), EdiError> {
        let group = match state.standard {
            Standard::AnsiX12 => Group {
                function_code: segment.value(1).to_string(),
                sender: segment.value(2).to_string(),
                receiver: segment.value(3).to_string(),
                control_number: segment.value(6).to_string(),
                version: segment.value(8).to_string(),
            },
            Standard::Edifact => Group {
                function_code: segment.value(1).to_string(),
                sender: segment.value(2).to_string(),
                receiver: segment.value(3).to_string(),
                control_number: segment.value(5).to_string(),
                version: segment
                    .element(7)
                    .map(|e| e.components().join(":"))
                    .unwrap_or_default(),
            },
        };
        debug!(code = %group.function_code, control = %group.control_number, "start group");

        if let Some(ctx) = &state.ack_ctx {
            if ack.is_active() && group.function_code == crate::ack::ACK_FUNCTION_CODE {
                self.diagnose(Diagnostic::from_code(
                    codes::ACK_SUPPRESSED,
                    format!(
                        "group {} is a functional acknowledgment; no 997 generated for it",
                        group.control_number
                    ),
                    Some(segment.span),
                ));
            }
            let header = GroupHeader {
                sender: group.sender.clone(),
                receiver: group.receiver.clone(),
                date_len: segment.value(4).chars().count(),
                version: group.version.clone(),
                function_code: group.function_code.clone(),
                control_number: group.control_number.clone(),
            };
            ack.begin_group_acknowledgment(ctx, &header)
                .map_err(|e| e.at(self.tokenizer.cursor()))?;
        }

        handler.start_group(&group);
        handler.segment(segment, 0);
        state.groups += 1;
        state.group = Some(OpenGroup {
            group,
            transactions: 0,
        });
        self.summary.groups += 1;
        Ok(())
    }

    fn start_transaction(
        &mut self,
        state: &mut InterchangeState,
        segment: &Segment,
        handler: &mut dyn EventHandler,
    ) {
        let transaction = match state.standard {
            Standard::AnsiX12 => {
                let version = state
                    .group
                    .as_ref()
                    .map(|g| g.group.version.clone())
                    .filter(|v| !v.is_empty())
                    .or_else(|| Some(segment.value(3).to_string()).filter(|v| !v.is_empty()));
                Transaction {
                    document_type: segment.value(1).to_string(),
                    control_number: segment.value(2).to_string(),
                    version,
                    release: None,
                }
            }
            Standard::Edifact => {
                let parts = segment.element(2).map(Element::components).unwrap_or(&[]);
                let part = |i: usize| parts.get(i).filter(|s| !s.is_empty()).cloned();
                Transaction {
                    document_type: part(0).unwrap_or_default(),
                    control_number: segment.value(1).to_string(),
                    version: part(1),
                    release: part(2),
                }
            }
        };

        let plan = self.registry.lookup(
            state.standard,
            &transaction.document_type,
            transaction.version.as_deref(),
            transaction.release.as_deref(),
        );
        let machine = match plan {
            Some(plan) => LoopStateMachine::new(plan),
            None => {
                self.diagnose(
                    Diagnostic::from_code(
                        codes::NO_LOOP_PLAN,
                        format!(
                            "no loop plan for {} {}; segments reported without loops",
                            state.standard, transaction.document_type
                        ),
                        Some(segment.span),
                    )
                    .with_context(ctx!("documentType" => transaction.document_type.as_str())),
                );
                LoopStateMachine::disabled()
            }
        };
        debug!(
            doc = %transaction.document_type,
            control = %transaction.control_number,
            plan = machine.is_enabled(),
            "start transaction"
        );

        handler.start_transaction(&transaction);
        handler.segment(segment, 0);
        state.transaction = Some(OpenTransaction {
            transaction,
            segments: 1,
            machine,
        });
    }

    fn end_transaction(
        &mut self,
        state: &mut InterchangeState,
        segment: &Segment,
        ack: &mut AckGenerator<W>,
        handler: &mut dyn EventHandler,
    ) {
        let Some(mut tx) = state.transaction.take() else {
            self.diagnose(
                Diagnostic::from_code(
                    codes::UNEXPECTED_SEGMENT,
                    format!("{} without a matching header", segment.name),
                    Some(segment.span),
                )
                .with_context(ctx!("segment" => segment.name.as_str())),
            );
            handler.segment(segment, 0);
            return;
        };
        for closed in tx.machine.close_all() {
            handler.end_loop(&closed);
        }
        handler.segment(segment, 0);

        self.check_count(segment, 1, tx.segments, "segments");
        self.check_control(segment, 2, &tx.transaction.control_number);

        if state.standard == Standard::AnsiX12 {
            ack.acknowledge_transaction(
                &tx.transaction.document_type,
                &tx.transaction.control_number,
            );
        }
        handler.end_transaction(&tx.transaction);
        state.transactions += 1;
        if let Some(g) = state.group.as_mut() {
            g.transactions += 1;
        }
        self.summary.transactions += 1;
    }

    fn end_group(
        &mut self,
        state: &mut InterchangeState,
        segment: &Segment,
        ack: &mut AckGenerator<W>,
        handler: &mut dyn EventHandler,
    ) {
        handler.segment(segment, 0);
        let Some(group) = state.group.take() else {
            self.diagnose(
                Diagnostic::from_code(
                    codes::UNEXPECTED_SEGMENT,
                    format!("{} without a matching header", segment.name),
                    Some(segment.span),
                )
                .with_context(ctx!("segment" => segment.name.as_str())),
            );
            return;
        };
        self.check_count(segment, 1, group.transactions, "transaction sets");
        self.check_control(segment, 2, &group.group.control_number);
        ack.end_group_acknowledgment(group.transactions);
        handler.end_group(&group.group);
    }

    fn end_interchange(
        &mut self,
        state: &InterchangeState,
        segment: &Segment,
        handler: &mut dyn EventHandler,
    ) {
        handler.segment(segment, 0);
        let (declared, what) = if state.standard == Standard::Edifact && state.groups == 0 {
            (state.transactions, "messages")
        } else {
            (state.groups, "groups")
        };
        self.check_count(segment, 1, declared, what);
        self.check_control(segment, 2, &state.interchange.control_number);
        debug!(control = %state.interchange.control_number, "end interchange");
        handler.end_interchange(&state.interchange);
    }

    // ── Envelope checks ─────────────────────────────────────────────────

    fn check_count(&mut self, segment: &Segment, element: usize, actual: usize, what: &str) {
        if !self.config.check_envelopes {
            return;
        }
        let declared = segment.value(element);
        if declared.trim().parse::<usize>().ok() == Some(actual) {
            return;
        }
        warn!(segment = %segment.name, declared, actual, "count mismatch");
        self.diagnose(
            Diagnostic::from_code(
                codes::COUNT_MISMATCH,
                format!(
                    "{}{element:02} declares {declared} {what}, but {actual} were read",
                    segment.name
                ),
                Some(segment.span),
            )
            .with_context(ctx!(
                "segment" => segment.name.as_str(),
                "expected" => actual.to_string(),
                "actual" => declared,
            )),
        );
    }

    fn check_control(&mut self, segment: &Segment, element: usize, header: &str) {
        if !self.config.check_envelopes {
            return;
        }
        let trailer = segment.value(element);
        if trailer.trim() == header.trim() {
            return;
        }
        warn!(segment = %segment.name, trailer, header, "control number mismatch");
        self.diagnose(
            Diagnostic::from_code(
                codes::CONTROL_NUMBER_MISMATCH,
                format!(
                    "{}{element:02} is '{trailer}' but the header says '{header}'",
                    segment.name
                ),
                Some(segment.span),
            )
            .with_context(ctx!(
                "segment" => segment.name.as_str(),
                "expected" => header,
                "actual" => trailer,
            )),
        );
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        self.summary.diagnostics.push(diagnostic);
    }
}

/// Value of component `component` (0-based) of element `element` (1-based).
fn component(segment: &Segment, element: usize, component: usize) -> &str {
    segment
        .element(element)
        .and_then(|e| e.components().get(component))
        .map_or("", String::as_str)
}

/// Build a segment from raw header text, splitting on the element delimiter
/// only. The terminator is dropped.
fn raw_segment(raw: &str, syntax: &SyntaxConfig, start: usize) -> Segment {
    let body = match syntax.terminator {
        Some(t) => raw.strip_suffix(t).unwrap_or(raw),
        None => raw,
    };
    let mut fields = match syntax.delimiter {
        Some(d) => body.split(d).map(str::to_string).collect::<Vec<_>>(),
        None => vec![body.to_string()],
    }
    .into_iter();
    let name = fields.next().unwrap_or_default();
    Segment {
        name,
        elements: fields
            .map(|f| Element {
                repetitions: vec![vec![f]],
            })
            .collect(),
        span: Span::new(start, start + raw.chars().count()),
    }
}
