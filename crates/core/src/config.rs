//! Reader configuration.

use serde::Deserialize;

use crate::error::EdiError;
use crate::syntax::{SyntaxConfig, SyntaxDescriptor};
use crate::tokenizer::DEFAULT_BUFFER_CAPACITY;

/// Settings for an [`InterchangeReader`](crate::reader::InterchangeReader).
///
/// Every field has a default, so a JSON document only needs the keys it
/// changes:
///
/// ```
/// let cfg = edi_toolchain_core::load_config_from_str(
///     r#"{ "bufferCapacity": 4096, "ackSyntax": { "terminatorSuffix": "\n" } }"#,
/// ).unwrap();
/// assert_eq!(cfg.buffer_capacity, 4096);
/// assert!(cfg.check_envelopes);
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Tokenizer buffer capacity in characters.
    pub buffer_capacity: usize,
    /// Syntax characters used where the interchange header leaves one unset.
    pub syntax: SyntaxConfig,
    /// Syntax characters for generated acknowledgments; unset fields follow
    /// the input.
    pub ack_syntax: Option<SyntaxDescriptor>,
    /// Compare trailer counts and control numbers with their headers.
    pub check_envelopes: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            syntax: SyntaxConfig::default(),
            ack_syntax: None,
            check_envelopes: true,
        }
    }
}

impl ReaderConfig {
    /// Set the acknowledgment syntax (builder pattern).
    pub fn with_ack_syntax(mut self, ack_syntax: SyntaxDescriptor) -> Self {
        self.ack_syntax = Some(ack_syntax);
        self
    }

    /// Set the buffer capacity (builder pattern).
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Enable or disable envelope checks (builder pattern).
    pub fn with_envelope_checks(mut self, enabled: bool) -> Self {
        self.check_envelopes = enabled;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), EdiError> {
        if self.buffer_capacity < crate::detect::DETECTION_WINDOW {
            return Err(EdiError::Configuration(format!(
                "bufferCapacity must be at least {} (got {})",
                crate::detect::DETECTION_WINDOW,
                self.buffer_capacity
            )));
        }
        Ok(())
    }
}

/// Parse and validate a reader configuration from JSON.
pub fn load_config_from_str(json: &str) -> Result<ReaderConfig, EdiError> {
    let config: ReaderConfig = serde_json::from_str(json)
        .map_err(|e| EdiError::Configuration(format!("invalid reader config JSON: {e}")))?;
    config.validate()?;
    Ok(config)
}
