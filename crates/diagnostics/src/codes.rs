//! Diagnostic ID constants.
//!
//! Auto-generated from `spec/diagnostics.json` at build time.
//! Use these instead of string literals to get compile-time typo detection
//! and IDE autocomplete.

include!(concat!(env!("OUT_DIR"), "/generated_codes.rs"));
