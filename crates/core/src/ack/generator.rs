use std::io::Write;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use super::envelope::{EnvelopeHeader, EnvelopeLayout};
use super::writer::{BranchingWriter, WritePath};
use crate::error::{EdiError, StructuralKind};
use crate::syntax::{SyntaxConfig, SyntaxDescriptor};

/// Group control number used in every generated GS/GE.
pub const GROUP_CONTROL_NUMBER: &str = "12345";

/// Transaction set control number used in every generated ST/SE.
pub const TRANSACTION_CONTROL_NUMBER: &str = "0001";

/// Function code of a functional acknowledgment group.
pub const ACK_FUNCTION_CODE: &str = "FA";

/// Facts about the interchange being acknowledged.
#[derive(Debug, Clone)]
pub struct InterchangeContext {
    /// Syntax the interchange was read with.
    pub syntax: SyntaxConfig,
    /// Whether the sender asked for an interchange acknowledgment (TA1).
    pub interchange_ack: bool,
    /// First segment of the interchange, verbatim through its terminator.
    pub envelope: String,
}

/// Facts about one functional group header.
#[derive(Debug, Clone, Default)]
pub struct GroupHeader {
    /// Application sender code (GS02).
    pub sender: String,
    /// Application receiver code (GS03).
    pub receiver: String,
    /// Length of the group date (GS04); 8 means CCYYMMDD.
    pub date_len: usize,
    /// Version / release code (GS08).
    pub version: String,
    /// Functional identifier code (GS01).
    pub function_code: String,
    /// Group control number (GS06).
    pub control_number: String,
}

/// Lifecycle phase of an [`AckGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AckPhase {
    /// Nothing written yet.
    Idle,
    /// Envelope headers written.
    PreambleGenerated,
    /// ST/AK1 written for the current group.
    HeaderGenerated,
    /// AK9/SE written for the current group.
    TrailerGenerated,
    /// GE/IEA written and a continuation committed.
    Finalized,
    /// The current group is itself an acknowledgment.
    Suppressed,
}

/// Progress of an [`AckGenerator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckState {
    /// ISA/TA1/GS written.
    pub preamble_generated: bool,
    /// At least one ST/AK1 written.
    pub header_generated: bool,
    /// The current group's AK9/SE written.
    pub group_trailer_generated: bool,
    /// The current group has function code FA.
    pub skip_self: bool,
    /// GE/IEA written and committed.
    pub finalized: bool,
    /// Number of ST segments written.
    pub document_count: usize,
    /// Control number written to GS/GE.
    pub group_control_number: String,
    /// Envelope text of the acknowledged interchange.
    pub referenced_envelope: Option<String>,
    /// Syntax used for the generated output.
    pub resolved_syntax: Option<SyntaxConfig>,
    /// Interchange control number copied into IEA02.
    #[serde(skip)]
    control_number: String,
}

impl AckState {
    /// Current lifecycle phase.
    pub fn phase(&self) -> AckPhase {
        if self.finalized {
            AckPhase::Finalized
        } else if self.skip_self {
            AckPhase::Suppressed
        } else if self.group_trailer_generated {
            AckPhase::TrailerGenerated
        } else if self.header_generated {
            AckPhase::HeaderGenerated
        } else if self.preamble_generated {
            AckPhase::PreambleGenerated
        } else {
            AckPhase::Idle
        }
    }
}

/// Generates a 997 functional acknowledgment for one interchange.
///
/// Output is written speculatively: segments that differ between acceptance
/// and rejection go to the two continuations of a [`BranchingWriter`], and
/// [`finish`](Self::finish) or
/// [`force_negative_acknowledgment`](Self::force_negative_acknowledgment)
/// commits one of them. Without a sink every operation is a no-op.
#[derive(Debug)]
pub struct AckGenerator<W> {
    writer: Option<BranchingWriter<W>>,
    ack_syntax: Option<SyntaxDescriptor>,
    timestamp: Option<NaiveDateTime>,
    state: AckState,
    delimiter: char,
    terminator: String,
}

impl<W: Write> AckGenerator<W> {
    /// Generator writing to `sink`, using `ack_syntax` (where set) instead of
    /// the input's syntax characters.
    pub fn new(sink: Option<W>, ack_syntax: Option<SyntaxDescriptor>) -> Self {
        Self {
            writer: sink.map(BranchingWriter::new),
            ack_syntax,
            timestamp: None,
            state: AckState {
                group_control_number: GROUP_CONTROL_NUMBER.to_string(),
                ..AckState::default()
            },
            delimiter: '*',
            terminator: String::new(),
        }
    }

    /// Use a fixed date and time instead of the local clock (builder pattern).
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Read-only view of the generator's progress.
    pub fn state(&self) -> &AckState {
        &self.state
    }

    /// Whether a sink is attached.
    pub fn is_active(&self) -> bool {
        self.writer.is_some()
    }

    /// The continuation committed by `finish`, if any.
    pub fn committed_path(&self) -> Option<WritePath> {
        self.writer.as_ref().and_then(BranchingWriter::committed_path)
    }

    /// Recover the sink.
    pub fn into_sink(self) -> Option<W> {
        self.writer.map(BranchingWriter::into_inner)
    }

    /// Start acknowledging a functional group.
    ///
    /// The first call writes the reply envelope (ISA, optional TA1, GS). Every
    /// call writes ST and AK1. A group whose function code is `FA` is itself
    /// an acknowledgment and produces nothing.
    pub fn begin_group_acknowledgment(
        &mut self,
        ctx: &InterchangeContext,
        group: &GroupHeader,
    ) -> Result<(), EdiError> {
        if self.writer.is_none() || self.state.finalized {
            return Ok(());
        }
        if group.function_code == ACK_FUNCTION_CODE {
            debug!(control = %group.control_number, "not acknowledging an acknowledgment");
            self.state.skip_self = true;
            return Ok(());
        }
        self.state.skip_self = false;
        self.generate_preamble(ctx, group)?;

        debug!(code = %group.function_code, control = %group.control_number, "generating 997 header");
        self.state.document_count += 1;
        let st = self.segment(&["ST", "997", TRANSACTION_CONTROL_NUMBER]);
        let ak1 = self.segment(&["AK1", &group.function_code, &group.control_number]);
        let Some(w) = self.writer.as_mut() else {
            return Ok(());
        };
        w.write_common(&st);
        w.write_common(&ak1);
        self.state.header_generated = true;
        self.state.group_trailer_generated = false;
        Ok(())
    }

    /// Acknowledge one transaction set as accepted (AK2, AK5).
    pub fn acknowledge_transaction(&mut self, code: &str, control_number: &str) {
        if !self.accepting_group_segments() {
            return;
        }
        let ak2 = self.segment(&["AK2", code, control_number]);
        let ak5 = self.segment(&["AK5", "A"]);
        let Some(w) = self.writer.as_mut() else {
            return;
        };
        w.write_trunk(&ak2);
        w.write_trunk(&ak5);
    }

    /// Close the current group's acknowledgment (AK9, SE) for a group of
    /// `transaction_count` transaction sets.
    pub fn end_group_acknowledgment(&mut self, transaction_count: usize) {
        if !self.accepting_group_segments() {
            return;
        }
        self.write_group_trailer(transaction_count);
    }

    /// Turn the acknowledgment into a rejection and finish it.
    ///
    /// Writes a zero-transaction trailer first if the current group has none.
    /// Does nothing before a header has been written or after finishing.
    pub fn force_negative_acknowledgment(&mut self) -> Result<(), EdiError> {
        if self.writer.is_none()
            || self.state.skip_self
            || !self.state.header_generated
            || self.state.finalized
        {
            return Ok(());
        }
        debug!("recasting 997 as negative");
        if !self.state.group_trailer_generated {
            self.write_group_trailer(0);
        }
        self.finish(false)
    }

    /// Write GE and IEA and commit the accept (`positive`) or reject
    /// continuation. Only the first call after the preamble has any effect,
    /// and none while the current group is suppressed.
    pub fn finish(&mut self, positive: bool) -> Result<(), EdiError> {
        if self.writer.is_none()
            || self.state.skip_self
            || !self.state.preamble_generated
            || self.state.finalized
        {
            return Ok(());
        }
        debug!(positive, documents = self.state.document_count, "finishing 997");
        let ge = self.segment(&[
            "GE",
            &self.state.document_count.to_string(),
            &self.state.group_control_number,
        ]);
        let iea = self.segment(&["IEA", "1", &self.state.control_number]);
        let Some(w) = self.writer.as_mut() else {
            return Ok(());
        };
        w.write_common(&ge);
        w.write_common(&iea);
        w.commit(if positive {
            WritePath::Trunk
        } else {
            WritePath::Branch
        })?;
        self.state.finalized = true;
        Ok(())
    }

    fn accepting_group_segments(&self) -> bool {
        self.writer.is_some()
            && !self.state.skip_self
            && !self.state.finalized
            && self.state.header_generated
    }

    fn write_group_trailer(&mut self, n: usize) {
        let count = n.to_string();
        let accept = self.join(&["AK9", "A", &count, &count, &count]);
        let reject = self.join(&["AK9", "R", &count, &count, "0"]);
        let se_accept = self.join(&["SE", &(4 + 2 * n).to_string(), TRANSACTION_CONTROL_NUMBER]);
        let se_reject = self.join(&["SE", "4", TRANSACTION_CONTROL_NUMBER]);
        let terminator = self.terminator.clone();
        let Some(w) = self.writer.as_mut() else {
            return;
        };
        w.write_trunk(&accept);
        w.write_branch(&reject);
        w.write_common(&terminator);
        w.write_trunk(&se_accept);
        w.write_branch(&se_reject);
        w.write_common(&terminator);
        self.state.group_trailer_generated = true;
    }

    fn generate_preamble(
        &mut self,
        ctx: &InterchangeContext,
        group: &GroupHeader,
    ) -> Result<(), EdiError> {
        if self.state.preamble_generated {
            return Ok(());
        }
        let syntax = match &self.ack_syntax {
            Some(d) => d.resolve_against(&ctx.syntax),
            None => ctx.syntax.clone(),
        };
        let (delimiter, _) = syntax.ensure_resolved()?;
        self.delimiter = delimiter;
        self.terminator = syntax.terminator_with_suffix();

        let identifier: String = ctx.envelope.chars().take(3).collect();
        let layout = EnvelopeLayout::for_identifier(&identifier).ok_or_else(|| {
            EdiError::structural(
                StructuralKind::EnvelopeHeader,
                identifier.clone(),
                "an envelope with a known layout (ISA)",
                identifier.clone(),
            )
        })?;
        let header = EnvelopeHeader::parse(&ctx.envelope, layout)?;
        let input_delimiter = ctx
            .syntax
            .delimiter
            .or_else(|| ctx.envelope.chars().nth(3))
            .unwrap_or(delimiter);

        let now = self
            .timestamp
            .unwrap_or_else(|| Local::now().naive_local());
        let isa = header.reply_header(
            input_delimiter,
            delimiter,
            &now.format("%y%m%d").to_string(),
            &now.format("%H%M").to_string(),
        );
        let group_date = if group.date_len == 8 {
            now.format("%Y%m%d")
        } else {
            now.format("%y%m%d")
        }
        .to_string();

        debug!(control = %header.control_number, "generating 997 envelope");
        let terminator = self.terminator.clone();
        let ta1 = ctx.interchange_ack.then(|| {
            let mut s = self.join(&["TA1", &header.control_number, &header.date, &header.time]);
            s.push(delimiter);
            s
        });
        let gs = self.segment(&[
            "GS",
            ACK_FUNCTION_CODE,
            &group.receiver,
            &group.sender,
            &group_date,
            &now.format("%H%M").to_string(),
            GROUP_CONTROL_NUMBER,
            "X",
            &group.version,
        ]);
        let accept = self.join(&["A", "000"]);
        let reject = self.join(&["R", "022"]);

        let Some(w) = self.writer.as_mut() else {
            return Ok(());
        };
        w.write_common(&isa);
        w.write_common(&terminator);
        if let Some(ta1) = ta1 {
            w.write_common(&ta1);
            w.write_trunk(&accept);
            w.write_branch(&reject);
            w.write_common(&terminator);
        }
        w.write_common(&gs);

        self.state.control_number = header.control_number;
        self.state.referenced_envelope = Some(ctx.envelope.clone());
        self.state.resolved_syntax = Some(syntax);
        self.state.preamble_generated = true;
        Ok(())
    }

    fn join(&self, fields: &[&str]) -> String {
        let mut s = String::new();
        for (i, f) in fields.iter().enumerate() {
            if i > 0 {
                s.push(self.delimiter);
            }
            s.push_str(f);
        }
        s
    }

    fn segment(&self, fields: &[&str]) -> String {
        let mut s = self.join(fields);
        s.push_str(&self.terminator);
        s
    }
}
