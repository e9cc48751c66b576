//! CLI tests for `edi plans`.

mod common;

use common::{run_json, write_temp};

#[test]
fn plans_lists_builtin_documents() {
    let (output, json) = run_json(&["plans"]);

    assert!(output.status.success());
    let plans = json.as_array().expect("plan array");
    assert!(
        plans
            .iter()
            .any(|p| p["standard"] == "ansi-x12" && p["documentType"] == "997")
    );
    assert!(plans.iter().all(|p| p["loops"].as_u64() > Some(0)));
}

#[test]
fn plan_files_are_listed_with_builtins() {
    let (_dir, plan) = write_temp(
        "invoic.json",
        r#"{
            "document": "INVOIC",
            "description": "Invoice",
            "loops": [ { "triggerSegment": "LIN", "loopName": "SG26", "level": 1 } ]
        }"#,
    );
    let (output, json) = run_json(&["plans", "--plan", &plan]);

    assert!(output.status.success());
    let invoic = json
        .as_array()
        .expect("plan array")
        .iter()
        .find(|p| p["documentType"] == "INVOIC")
        .cloned()
        .expect("INVOIC listed");
    assert_eq!(invoic["standard"], "edifact");
    assert_eq!(invoic["description"], "Invoice");
    assert_eq!(invoic["loops"], 1);
}
