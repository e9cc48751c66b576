//! CLI tests for `edi ack`.

use std::fs;

mod common;

use common::{ISA, PURCHASE_ORDERS, edi_cmd, run_json, write_temp};

#[test]
fn ack_writes_positive_997_to_file() {
    let (dir, path) = write_temp("po.x12", PURCHASE_ORDERS);
    let out = dir.path().join("po.997");
    let out = out.to_string_lossy();
    let (output, json) = run_json(&["ack", &path, "--out", &out]);

    assert!(output.status.success());
    assert_eq!(json["ok"], true);
    assert_eq!(json["acknowledgments"], serde_json::json!(["trunk"]));
    assert_eq!(json["out"], out.as_ref());

    let ack = fs::read_to_string(out.as_ref()).expect("read ack");
    assert!(
        ack.starts_with("ISA*00*          *00*          *ZZ*RECEIVER       *ZZ*SENDER         *"),
        "{ack}"
    );
    assert!(ack.contains("AK1*PO*1~"), "{ack}");
    assert!(ack.contains("AK9*A*2*2*2~"), "{ack}");
    assert!(ack.contains("IEA*1*000000905~"), "{ack}");
}

#[test]
fn ack_text_is_embedded_in_json_without_out() {
    let (_dir, path) = write_temp("po.x12", PURCHASE_ORDERS);
    let (output, json) = run_json(&["ack", &path]);

    assert!(output.status.success());
    let ack = json["acknowledgment"].as_str().expect("acknowledgment text");
    assert!(ack.contains("ST*997*0001~"), "{ack}");
}

#[test]
fn latin1_input_gets_latin1_ack() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("po.x12");
    let mut bytes = PURCHASE_ORDERS.replacen("SENDER", "SEND\u{c9}R", 1).into_bytes();
    // Swap the UTF-8 encoding of 'É' for its single Latin-1 byte.
    let at = bytes
        .windows(2)
        .position(|w| w == [0xC3, 0x89])
        .expect("utf-8 E acute");
    bytes[at] = 0xC9;
    bytes.remove(at + 1);
    fs::write(&path, &bytes).expect("write input");
    let out = dir.path().join("po.997");
    let output = edi_cmd()
        .arg("ack")
        .arg(&path)
        .arg("--out")
        .arg(&out)
        .args(["--output", "json"])
        .output()
        .expect("run ack");

    assert!(output.status.success());
    let ack = fs::read(&out).expect("read ack");
    assert!(ack.windows(11).any(|w| w == b"ZZ*SEND\xC9R  "), "{ack:?}");
    assert!(!ack.windows(2).any(|w| w == [0xC3, 0x89]));
}

#[test]
fn structural_error_writes_negative_ack_and_fails() {
    let text = format!(
        "{ISA}GS*PO*S*R*20230101*1253*1*X*004010~ST*850*0001~N1*ST*X~PID*F****W~SE*4*0001~GE*1*1~IEA*1*000000905~"
    );
    let (dir, path) = write_temp("bad.x12", &text);
    let out = dir.path().join("bad.997");
    let out = out.to_string_lossy();
    let (output, json) = run_json(&["ack", &path, "--out", &out]);

    assert!(!output.status.success());
    assert_eq!(json["ok"], false);
    assert_eq!(json["acknowledgments"], serde_json::json!(["branch"]));
    let diags = json["diagnostics"].as_array().expect("diagnostics");
    assert!(diags.iter().any(|d| d["id"] == "EDI2001"), "{diags:?}");

    let ack = fs::read_to_string(out.as_ref()).expect("read ack");
    assert!(ack.contains("AK9*R*0*0*0~"), "{ack}");
    assert!(!ack.contains("AK2"), "{ack}");
}

#[test]
fn syntax_flags_shape_the_acknowledgment() {
    let (_dir, path) = write_temp("po.x12", PURCHASE_ORDERS);
    let (output, json) = run_json(&[
        "ack",
        &path,
        "--delimiter",
        "|",
        "--terminator",
        "!",
        "--suffix",
        r"\r\n",
    ]);

    assert!(output.status.success());
    let ack = json["acknowledgment"].as_str().expect("acknowledgment text");
    assert!(ack.contains("AK9|A|2|2|2!\r\n"), "{ack}");
    assert!(!ack.contains('*'), "{ack}");
}

#[test]
fn functional_acknowledgment_input_gets_no_ack() {
    let text = format!(
        "{ISA}GS*FA*S*R*20230101*1253*9*X*004010~ST*997*0001~AK1*PO*1~AK9*A*1*1*1~SE*4*0001~GE*1*9~IEA*1*000000905~"
    );
    let (_dir, path) = write_temp("fa.x12", &text);
    let output = edi_cmd()
        .args(["ack", &path, "--output", "pretty"])
        .output()
        .expect("run ack");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no acknowledgment generated"), "{stderr}");
}
