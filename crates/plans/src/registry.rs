//! Lookup of loop plans by standard, document type, version and release.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::LoopPlan;

/// EDI standard family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Standard {
    /// ANSI ASC X12.
    AnsiX12,
    /// UN/EDIFACT.
    Edifact,
}

impl std::fmt::Display for Standard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Standard::AnsiX12 => write!(f, "X12"),
            Standard::Edifact => write!(f, "EDIFACT"),
        }
    }
}

/// Key under which a plan is registered.
///
/// `version` and `release` are optional: a key without them matches every
/// version of the document type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanKey {
    /// Standard family.
    pub standard: Standard,
    /// Document type (X12 ST01, EDIFACT UNH02 message type).
    pub document_type: String,
    /// Version (X12 GS08 / EDIFACT UNH02 version), if the plan is version specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Release (EDIFACT UNH02 release), if the plan is release specific.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
}

impl PlanKey {
    /// Key matching every version of `document_type`.
    pub fn new(standard: Standard, document_type: &str) -> Self {
        Self {
            standard,
            document_type: document_type.to_string(),
            version: None,
            release: None,
        }
    }

    /// Narrow the key to a version (builder pattern).
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Narrow the key to a release (builder pattern).
    pub fn with_release(mut self, release: &str) -> Self {
        self.release = Some(release.to_string());
        self
    }
}

impl std::fmt::Display for PlanKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.standard, self.document_type)?;
        if let Some(v) = &self.version {
            write!(f, " {v}")?;
        }
        if let Some(r) = &self.release {
            write!(f, " {r}")?;
        }
        Ok(())
    }
}

/// Registry of loop plans.
///
/// Plans are shared as `Arc<LoopPlan>` so a loop machine can hold one while
/// the registry stays borrowed by other readers.
#[derive(Debug, Clone, Default)]
pub struct PlanRegistry {
    plans: HashMap<PlanKey, Arc<LoopPlan>>,
}

impl PlanRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the plans shipped with the toolchain.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (key, plan) in crate::builtin::plans() {
            registry.register(key, plan);
        }
        registry
    }

    /// Register (or replace) the plan for `key`.
    pub fn register(&mut self, key: PlanKey, plan: LoopPlan) {
        self.plans.insert(key, Arc::new(plan));
    }

    /// Find the most specific plan for a document.
    ///
    /// Tries `(version, release)`, then `(version)`, then the bare document
    /// type.
    pub fn lookup(
        &self,
        standard: Standard,
        document_type: &str,
        version: Option<&str>,
        release: Option<&str>,
    ) -> Option<Arc<LoopPlan>> {
        let base = PlanKey::new(standard, document_type);
        let mut attempts = Vec::with_capacity(3);
        if let (Some(v), Some(r)) = (version, release) {
            attempts.push(base.clone().with_version(v).with_release(r));
        }
        if let Some(v) = version {
            attempts.push(base.clone().with_version(v));
        }
        attempts.push(base);
        attempts
            .iter()
            .find_map(|key| self.plans.get(key))
            .map(Arc::clone)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&PlanKey> {
        let mut keys: Vec<_> = self.plans.keys().collect();
        keys.sort();
        keys
    }

    /// Plan registered under exactly `key`.
    pub fn get(&self, key: &PlanKey) -> Option<&Arc<LoopPlan>> {
        self.plans.get(key)
    }

    /// Number of registered plans.
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// Whether the registry holds no plans.
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoopDescriptor;

    fn plan(name: &str) -> LoopPlan {
        LoopPlan::new(name, name, vec![LoopDescriptor::enter("N1", "N1", 1)])
    }

    #[test]
    fn lookup_prefers_most_specific_key() {
        let mut r = PlanRegistry::new();
        r.register(PlanKey::new(Standard::AnsiX12, "850"), plan("generic"));
        r.register(
            PlanKey::new(Standard::AnsiX12, "850").with_version("004010"),
            plan("v4010"),
        );
        let hit = r
            .lookup(Standard::AnsiX12, "850", Some("004010"), None)
            .unwrap();
        assert_eq!(hit.document, "v4010");
        let hit = r
            .lookup(Standard::AnsiX12, "850", Some("005010"), None)
            .unwrap();
        assert_eq!(hit.document, "generic");
    }

    #[test]
    fn lookup_separates_standards() {
        let mut r = PlanRegistry::new();
        r.register(PlanKey::new(Standard::Edifact, "ORDERS"), plan("orders"));
        assert!(r.lookup(Standard::AnsiX12, "ORDERS", None, None).is_none());
        assert!(r.lookup(Standard::Edifact, "ORDERS", None, None).is_some());
    }

    #[test]
    fn key_display() {
        let key = PlanKey::new(Standard::Edifact, "ORDERS")
            .with_version("D")
            .with_release("96A");
        assert_eq!(key.to_string(), "EDIFACT ORDERS D 96A");
    }
}
