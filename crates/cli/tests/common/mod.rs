//! Shared helpers for `edi` CLI tests.

#![allow(unreachable_pub)]

use std::fs;
use std::process::{Command, Output};

use assert_cmd::cargo;

/// ISA with no interchange acknowledgment requested.
#[allow(dead_code)]
pub const ISA: &str = "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *230101*1253*U*00401*000000905*0*T*>~";

/// Two 850 purchase orders in one group.
#[allow(dead_code)]
pub const PURCHASE_ORDERS: &str = concat!(
    "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *230101*1253*U*00401*000000905*0*T*>~\n",
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

/// `edi` binary under test.
#[allow(dead_code)]
pub fn edi_cmd() -> Command {
    Command::new(cargo::cargo_bin!("edi"))
}

/// Run `edi` with `args` followed by `--output json`.
#[allow(dead_code)]
pub fn run_json(args: &[&str]) -> (Output, serde_json::Value) {
    let output = edi_cmd()
        .args(args)
        .args(["--output", "json"])
        .output()
        .expect("run edi");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("invalid json ({e}): {stdout}"));
    (output, json)
}

/// Write `content` to `name` inside a fresh temp dir.
#[allow(dead_code)]
pub fn write_temp(name: &str, content: &str) -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join(name);
    fs::write(&path, content).expect("write temp file");
    (dir, path.to_string_lossy().to_string())
}
