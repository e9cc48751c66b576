use edi_toolchain_plans::Standard;
use serde::Serialize;

use crate::scanner::Segment;

/// Interchange header facts passed to [`EventHandler::start_interchange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interchange {
    /// Standard family.
    pub standard: Standard,
    /// Interchange sender id (ISA06 / UNB02).
    pub sender: String,
    /// Interchange receiver id (ISA08 / UNB03).
    pub receiver: String,
    /// Interchange control number (ISA13 / UNB05).
    pub control_number: String,
    /// Syntax version (ISA12 / UNB01).
    pub version: String,
    /// Whether an interchange acknowledgment was requested (ISA14).
    pub ack_requested: bool,
}

/// Functional group header facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Functional identifier code (GS01 / UNG01).
    pub function_code: String,
    /// Application sender (GS02 / UNG02).
    pub sender: String,
    /// Application receiver (GS03 / UNG03).
    pub receiver: String,
    /// Group control number (GS06 / UNG05).
    pub control_number: String,
    /// Version (GS08 / UNG07).
    pub version: String,
}

/// Transaction set (message) header facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Document type (ST01 / UNH02 message type).
    pub document_type: String,
    /// Control number (ST02 / UNH01).
    pub control_number: String,
    /// Version used for plan lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Release used for plan lookup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

/// Receives the structure of an interchange as it is read.
///
/// Every method has an empty default, so handlers implement only what they
/// need. Calls are strictly nested: a group starts and ends inside an
/// interchange, a loop inside a transaction.
pub trait EventHandler {
    /// An interchange header was read.
    fn start_interchange(&mut self, _interchange: &Interchange) {}
    /// The interchange trailer was read.
    fn end_interchange(&mut self, _interchange: &Interchange) {}
    /// A functional group header was read.
    fn start_group(&mut self, _group: &Group) {}
    /// The functional group trailer was read.
    fn end_group(&mut self, _group: &Group) {}
    /// A transaction set header was read.
    fn start_transaction(&mut self, _transaction: &Transaction) {}
    /// The transaction set trailer was read.
    fn end_transaction(&mut self, _transaction: &Transaction) {}
    /// A loop was opened at `level`.
    fn start_loop(&mut self, _name: &str, _level: usize) {}
    /// A loop was closed.
    fn end_loop(&mut self, _name: &str) {}
    /// A segment was read; `depth` is the number of open loops.
    fn segment(&mut self, _segment: &Segment, _depth: usize) {}
}

/// Handler that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl EventHandler for NullHandler {}

/// A structural event, as recorded by [`EventRecorder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    /// See [`EventHandler::start_interchange`].
    StartInterchange {
        /// Header facts.
        interchange: Interchange,
    },
    /// See [`EventHandler::end_interchange`].
    EndInterchange {
        /// Control number of the closed interchange.
        control_number: String,
    },
    /// See [`EventHandler::start_group`].
    StartGroup {
        /// Header facts.
        group: Group,
    },
    /// See [`EventHandler::end_group`].
    EndGroup {
        /// Control number of the closed group.
        control_number: String,
    },
    /// See [`EventHandler::start_transaction`].
    StartTransaction {
        /// Header facts.
        transaction: Transaction,
    },
    /// See [`EventHandler::end_transaction`].
    EndTransaction {
        /// Control number of the closed transaction.
        control_number: String,
    },
    /// See [`EventHandler::start_loop`].
    StartLoop {
        /// Loop name.
        name: String,
        /// Declared level.
        level: usize,
    },
    /// See [`EventHandler::end_loop`].
    EndLoop {
        /// Loop name.
        name: String,
    },
    /// See [`EventHandler::segment`].
    Segment {
        /// Segment name.
        name: String,
        /// Open loops when the segment was read.
        depth: usize,
    },
}

/// Handler that records every event in order.
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    /// Events received so far.
    pub events: Vec<Event>,
}

impl EventRecorder {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventHandler for EventRecorder {
    fn start_interchange(&mut self, interchange: &Interchange) {
        self.events.push(Event::StartInterchange {
            interchange: interchange.clone(),
        });
    }

    fn end_interchange(&mut self, interchange: &Interchange) {
        self.events.push(Event::EndInterchange {
            control_number: interchange.control_number.clone(),
        });
    }

    fn start_group(&mut self, group: &Group) {
        self.events.push(Event::StartGroup {
            group: group.clone(),
        });
    }

    fn end_group(&mut self, group: &Group) {
        self.events.push(Event::EndGroup {
            control_number: group.control_number.clone(),
        });
    }

    fn start_transaction(&mut self, transaction: &Transaction) {
        self.events.push(Event::StartTransaction {
            transaction: transaction.clone(),
        });
    }

    fn end_transaction(&mut self, transaction: &Transaction) {
        self.events.push(Event::EndTransaction {
            control_number: transaction.control_number.clone(),
        });
    }

    fn start_loop(&mut self, name: &str, level: usize) {
        self.events.push(Event::StartLoop {
            name: name.to_string(),
            level,
        });
    }

    fn end_loop(&mut self, name: &str) {
        self.events.push(Event::EndLoop {
            name: name.to_string(),
        });
    }

    fn segment(&mut self, segment: &Segment, depth: usize) {
        self.events.push(Event::Segment {
            name: segment.name.clone(),
            depth,
        });
    }
}
