//! Shared test helpers for `edi_toolchain_core` integration tests.

#![allow(unreachable_pub)]

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime};
use edi_toolchain_core::{
    Diagnostic, EdiError, EventRecorder, InterchangeReader, ReadSummary, ReaderConfig, StrSource,
};
use edi_toolchain_plans::PlanRegistry;

/// Builtin plans, built once per test binary.
#[allow(dead_code)]
pub static REGISTRY: LazyLock<PlanRegistry> = LazyLock::new(PlanRegistry::builtin);

/// Fixed acknowledgment timestamp: 2024-02-29 09:30.
#[allow(dead_code)]
pub fn ack_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 2, 29)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap()
}

// ─── Sample interchanges ─────────────────────────────────────────────────────

/// ISA with no interchange acknowledgment requested.
#[allow(dead_code)]
pub const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *230101*1253*U*00401*000000905*0*T*>~";

/// ISA asking for a TA1.
#[allow(dead_code)]
pub const ISA_TA1: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *230101*1253*U*00401*000000905*1*T*>~";

/// Two 850 purchase orders in one group, without the ISA.
#[allow(dead_code)]
pub const PO_BODY: &str = concat!(
    "GS*PO*SENDERGS*RECEIVERGS*20230101*1253*1*X*004010~\n",
    "ST*850*0001~\n",
    "BEG*00*SA*PO1**20230101~\n",
    "N1*ST*SHIP TO~\n",
    "N3*1 MAIN ST~\n",
    "PO1*1*10*EA*2.5**VP*ABC~\n",
    "PID*F****WIDGET~\n",
    "CTT*1~\n",
    "SE*8*0001~\n",
    "ST*850*0002~\n",
    "BEG*00*SA*PO2**20230101~\n",
    "PO1*1*1*EA*1**VP*XYZ~\n",
    "CTT*1~\n",
    "SE*5*0002~\n",
    "GE*2*1~\n",
    "IEA*1*000000905~\n",
);

/// A complete two-transaction X12 interchange.
#[allow(dead_code)]
pub fn purchase_orders() -> String {
    format!("{ISA}\n{PO_BODY}")
}

/// The 997 expected for [`purchase_orders`] at [`ack_time`]. The input's
/// line break after the ISA terminator carries over to every segment.
#[allow(dead_code)]
pub const PO_ACK: &str = concat!(
    "ISA*00*          *00*          *ZZ*RECEIVER       *ZZ*SENDER         *240229*0930*U*00401*000000905*0*T*>~\n",
    "GS*FA*RECEIVERGS*SENDERGS*20240229*0930*12345*X*004010~\n",
    "ST*997*0001~\n",
    "AK1*PO*1~\n",
    "AK2*850*0001~\n",
    "AK5*A~\n",
    "AK2*850*0002~\n",
    "AK5*A~\n",
    "AK9*A*2*2*2~\n",
    "SE*8*0001~\n",
    "GE*1*12345~\n",
    "IEA*1*000000905~\n",
);

/// An EDIFACT ORDERS interchange with a UNA advice.
#[allow(dead_code)]
pub const ORDERS: &str = concat!(
    "UNA:+.? '",
    "UNB+UNOA:2+BUYER+SELLER+200101:1200+42'",
    "UNH+1+ORDERS:D:96A:UN'",
    "BGM+220+PO?+77+9'",
    "NAD+BY+5412345000013::9'",
    "CTA+PD+:JOHN'",
    "NAD+SU+4012345500004::9'",
    "LIN+1++4000862141404:SRS'",
    "QTY+21:48'",
    "UNS+S'",
    "CNT+2:1'",
    "UNT+10+1'",
    "UNZ+1+42'",
);

// ─── Reader helpers ──────────────────────────────────────────────────────────

/// Read `text` with the builtin plans and record every event.
#[allow(dead_code)]
pub fn read_events(text: &str) -> (Result<ReadSummary, EdiError>, EventRecorder) {
    read_events_with(text, ReaderConfig::default())
}

/// Like [`read_events`] with a custom configuration.
#[allow(dead_code)]
pub fn read_events_with(
    text: &str,
    config: ReaderConfig,
) -> (Result<ReadSummary, EdiError>, EventRecorder) {
    let mut reader = InterchangeReader::new(StrSource::new(text), config, &REGISTRY).unwrap();
    let mut recorder = EventRecorder::new();
    let result = reader.read(&mut recorder);
    (result, recorder)
}

/// Read `text` with acknowledgments enabled and return the result and the
/// acknowledgment text.
#[allow(dead_code)]
pub fn read_with_ack(text: &str) -> (Result<ReadSummary, EdiError>, String) {
    let mut reader =
        InterchangeReader::new(StrSource::new(text), ReaderConfig::default(), &REGISTRY)
            .unwrap()
            .with_acknowledgment(Vec::new())
            .with_ack_timestamp(ack_time());
    let result = reader.read(&mut edi_toolchain_core::NullHandler);
    let ack = String::from_utf8(reader.into_ack_sink().unwrap()).unwrap();
    (result, ack)
}

/// Diagnostic ids, in order.
#[allow(dead_code)]
pub fn diag_ids(diagnostics: &[Diagnostic]) -> Vec<&str> {
    diagnostics.iter().map(|d| d.id.as_ref()).collect()
}
