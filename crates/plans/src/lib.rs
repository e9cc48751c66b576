//! Loop plans for the EDI toolchain.
//!
//! A [`LoopPlan`] is an ordered table of [`LoopDescriptor`]s for one document
//! type (for example the X12 997 or the EDIFACT ORDERS message). Each
//! descriptor says which segment opens which loop, at which nesting level, and
//! in which enclosing context the rule applies. The loop state machine in the
//! core crate consumes these tables; it never needs a grammar.
//!
//! Plans are plain data: they can be built in code, looked up from the
//! built-in [`PlanRegistry`], or loaded from JSON with [`load_plan_from_str`].

#![warn(missing_docs)]

mod builtin;
mod registry;

pub use registry::{PlanKey, PlanRegistry, Standard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel for "the top level of the document, outside every loop".
///
/// Used both as a parent context (the rule applies only at the top level) and
/// as a loop name (the segment resumes the enclosing loop instead of opening a
/// new one).
pub const INITIAL_CONTEXT: &str = "/";

/// Sentinel parent context meaning "whatever loop is currently open".
pub const ANY_CONTEXT: &str = "*";

/// Errors that can occur when loading or validating a loop plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// JSON deserialization failed.
    #[error("invalid plan JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A descriptor in the plan is not usable.
    #[error("invalid loop descriptor #{index}: {reason}")]
    InvalidDescriptor {
        /// Zero-based position of the descriptor in the plan.
        index: usize,
        /// A human-readable explanation of what is wrong.
        reason: String,
    },
}

/// The loop context in which a descriptor applies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ParentContext {
    /// Applies regardless of which loop is open (`"*"`).
    #[default]
    Any,
    /// Applies only at the top level, when no loop is open (`"/"`).
    Initial,
    /// Applies only while the named loop is the innermost open loop.
    Loop(String),
}

impl ParentContext {
    /// Whether a descriptor with this context may fire when `current` is the
    /// innermost open loop (`None` at the top level).
    pub fn accepts(&self, current: Option<&str>) -> bool {
        match self {
            ParentContext::Any => true,
            ParentContext::Initial => current.is_none(),
            ParentContext::Loop(name) => current == Some(name.as_str()),
        }
    }
}

impl From<String> for ParentContext {
    fn from(s: String) -> Self {
        match s.as_str() {
            ANY_CONTEXT | "" => ParentContext::Any,
            INITIAL_CONTEXT => ParentContext::Initial,
            _ => ParentContext::Loop(s),
        }
    }
}

impl From<ParentContext> for String {
    fn from(c: ParentContext) -> Self {
        match c {
            ParentContext::Any => ANY_CONTEXT.to_string(),
            ParentContext::Initial => INITIAL_CONTEXT.to_string(),
            ParentContext::Loop(name) => name,
        }
    }
}

impl std::fmt::Display for ParentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParentContext::Any => write!(f, "{ANY_CONTEXT}"),
            ParentContext::Initial => write!(f, "{INITIAL_CONTEXT}"),
            ParentContext::Loop(name) => write!(f, "{name}"),
        }
    }
}

/// What happens when a descriptor fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LoopTarget {
    /// Open a new loop with this name.
    Enter(String),
    /// Return to the loop already open at the descriptor's level, closing
    /// everything nested inside it. Level 0 returns to the top level.
    Resume,
}

impl LoopTarget {
    /// Name of the loop entered, if this target opens one.
    pub fn loop_name(&self) -> Option<&str> {
        match self {
            LoopTarget::Enter(name) => Some(name),
            LoopTarget::Resume => None,
        }
    }
}

impl From<String> for LoopTarget {
    fn from(s: String) -> Self {
        if s == INITIAL_CONTEXT {
            LoopTarget::Resume
        } else {
            LoopTarget::Enter(s)
        }
    }
}

impl From<LoopTarget> for String {
    fn from(t: LoopTarget) -> Self {
        match t {
            LoopTarget::Enter(name) => name,
            LoopTarget::Resume => INITIAL_CONTEXT.to_string(),
        }
    }
}

/// A single loop rule: "segment `trigger_segment`, seen while in
/// `parent_context`, enters `target` at `level`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopDescriptor {
    /// Context in which this rule applies. Defaults to any context.
    #[serde(default)]
    pub parent_context: ParentContext,
    /// Segment name that fires this rule (e.g. `"N1"`).
    pub trigger_segment: String,
    /// Loop opened (or resumed) by the rule.
    #[serde(rename = "loopName")]
    pub target: LoopTarget,
    /// Nesting level of the loop; 1 is the outermost loop level.
    pub level: usize,
    /// Path of loops that must be open around the new loop, e.g. `"/AK2"`.
    /// A mismatch is a structural error in the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_parent_path: Option<String>,
}

impl LoopDescriptor {
    /// Rule that opens `loop_name` at `level` whenever `trigger` is seen.
    pub fn enter(trigger: &str, loop_name: &str, level: usize) -> Self {
        Self {
            parent_context: ParentContext::Any,
            trigger_segment: trigger.to_string(),
            target: LoopTarget::Enter(loop_name.to_string()),
            level,
            required_parent_path: None,
        }
    }

    /// Rule that returns to the loop open at `level` whenever `trigger` is seen.
    pub fn resume(trigger: &str, level: usize) -> Self {
        Self {
            parent_context: ParentContext::Any,
            trigger_segment: trigger.to_string(),
            target: LoopTarget::Resume,
            level,
            required_parent_path: None,
        }
    }

    /// Restrict the rule to a parent context (builder pattern).
    pub fn within(mut self, context: ParentContext) -> Self {
        self.parent_context = context;
        self
    }

    /// Require a parent path around the loop (builder pattern).
    pub fn requiring(mut self, path: &str) -> Self {
        self.required_parent_path = Some(path.to_string());
        self
    }

    fn check(&self, index: usize) -> Result<(), PlanError> {
        let invalid = |reason: String| PlanError::InvalidDescriptor { index, reason };
        if self.trigger_segment.trim().is_empty() {
            return Err(invalid("trigger segment is empty".into()));
        }
        if let LoopTarget::Enter(name) = &self.target {
            if name.trim().is_empty() {
                return Err(invalid("loop name is empty".into()));
            }
            if self.level == 0 {
                return Err(invalid(format!(
                    "loop {name} cannot be entered at level 0 (the top level)"
                )));
            }
        }
        if let Some(path) = &self.required_parent_path
            && !path.starts_with(INITIAL_CONTEXT)
        {
            return Err(invalid(format!(
                "required parent path '{path}' must start with '{INITIAL_CONTEXT}'"
            )));
        }
        Ok(())
    }
}

/// An ordered table of loop descriptors for one document type.
///
/// Order matters: the first matching descriptor wins, so rules restricted to
/// a specific parent context must precede a generic rule for the same
/// trigger segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopPlan {
    /// Document identifier (e.g. `"997"`, `"ORDERS"`).
    pub document: String,
    /// Human-readable document name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Loop descriptors, in priority order.
    pub loops: Vec<LoopDescriptor>,
}

impl LoopPlan {
    /// Create a plan from its parts.
    pub fn new(document: &str, description: &str, loops: Vec<LoopDescriptor>) -> Self {
        Self {
            document: document.to_string(),
            description: Some(description.to_string()),
            loops,
        }
    }

    /// Check every descriptor, reporting the first invalid one.
    pub fn validate(&self) -> Result<(), PlanError> {
        self.loops
            .iter()
            .enumerate()
            .try_for_each(|(i, d)| d.check(i))
    }

    /// Descriptors that fire on `segment`, in priority order.
    pub fn candidates<'a, 's>(
        &'a self,
        segment: &'s str,
    ) -> impl Iterator<Item = &'a LoopDescriptor> + use<'a, 's> {
        self.loops
            .iter()
            .filter(move |d| d.trigger_segment == segment)
    }
}

/// Parse and validate a loop plan from a JSON string.
///
/// # Example
/// ```
/// let plan = edi_toolchain_plans::load_plan_from_str(r#"{
///     "document": "997",
///     "loops": [
///         { "triggerSegment": "AK2", "loopName": "AK2", "level": 1 },
///         { "triggerSegment": "AK9", "loopName": "/", "level": 0 }
///     ]
/// }"#).unwrap();
/// assert_eq!(plan.loops.len(), 2);
/// ```
pub fn load_plan_from_str(json: &str) -> Result<LoopPlan, PlanError> {
    let plan: LoopPlan = serde_json::from_str(json)?;
    plan.validate()?;
    Ok(plan)
}
