//! CLI tests for the `edi explain` subcommand.

mod common;

use common::{edi_cmd, run_json};

#[test]
fn explain_known_code_json_returns_explanation() {
    let (output, json) = run_json(&["explain", "EDI2001"]);
    assert!(output.status.success());
    assert_eq!(json["id"], "EDI2001");
    assert!(json["explanation"].is_string());
    assert_eq!(json["severity"], "error");
}

#[test]
fn explain_unknown_code_json_returns_null_explanation() {
    let (output, json) = run_json(&["explain", "EDI9999"]);
    assert!(output.status.success());
    assert_eq!(json["id"], "EDI9999");
    assert!(json["explanation"].is_null());
}

#[test]
fn explain_pretty_shows_human_readable_text() {
    let output = edi_cmd()
        .args(["explain", "EDI3001", "--output", "pretty"])
        .output()
        .expect("run explain command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("EDI3001") && stdout.contains(':'),
        "unexpected output: {stdout}"
    );
}
