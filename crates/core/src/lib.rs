//! EDI toolchain core library.
//!
//! Streams ANSI X12 and EDIFACT interchanges one character at a time. The
//! main entry point is [`InterchangeReader`], which detects the syntax of
//! each interchange, reports its structure (envelopes, loops, segments) to an
//! [`EventHandler`] and, for X12, writes a 997 functional acknowledgment as
//! it goes. The building blocks ([`Tokenizer`], [`SegmentScanner`],
//! [`LoopStateMachine`], [`AckGenerator`]) are usable on their own.

#![warn(missing_docs)]

/// 997 acknowledgment generation and the dual-path writer.
pub mod ack;
/// Reader configuration.
pub mod config;
/// Syntax detection from interchange headers.
pub mod detect;
/// Error type shared by every component.
pub mod error;
/// Loop state machine.
pub mod loops;
/// Interchange reader and structural events.
pub mod reader;
/// Segment assembly.
pub mod scanner;
/// Syntax characters and character classes.
pub mod syntax;
/// Character tokenizer and sources.
pub mod tokenizer;

// ── Convenience re-exports ──────────────────────────────────────────────────

// Reader
pub use reader::{Event, EventHandler, EventRecorder, InterchangeReader, NullHandler, ReadSummary};

// Configuration
pub use config::{ReaderConfig, load_config_from_str};

// Errors
pub use error::{EdiError, StructuralKind};

// Tokenizer
pub use syntax::{CharClass, SyntaxConfig, SyntaxDescriptor};
pub use tokenizer::{CharSource, Cursor, Latin1Source, StrSource, Token, Tokenizer};

// Segments and loops
pub use loops::{LoopStateMachine, Transition};
pub use scanner::{Element, Segment, SegmentScanner};

// Acknowledgments
pub use ack::{AckGenerator, BranchingWriter, WritePath};

// Diagnostics (re-exported from the diagnostics crate)
pub use edi_toolchain_diagnostics::{Diagnostic, Severity, Span, codes};
