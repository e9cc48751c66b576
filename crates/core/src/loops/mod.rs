//! Loop state machine.
//!
//! Segment names drive a stack of open loops. A [`LoopPlan`] declares which
//! segment opens which loop at which level; the machine needs no grammar
//! beyond that table. Levels on the stack strictly increase from bottom to
//! top, and the implicit top level is never on the stack.

mod strategy;

pub use strategy::{DescriptorFilter, MaxNesting, TransitionValidator};

use std::sync::Arc;

use edi_toolchain_plans::{INITIAL_CONTEXT, LoopDescriptor, LoopPlan, LoopTarget};
use serde::Serialize;
use tracing::trace;

use crate::error::{EdiError, StructuralKind};

/// A loop currently open on the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenLoop {
    /// Loop name from the descriptor that opened it.
    pub name: String,
    /// Nesting level declared by that descriptor.
    pub level: usize,
}

/// Structural effect of one segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Loop opened by the segment, if any.
    pub loop_entered: Option<String>,
    /// Number of loops closed by the segment.
    pub closed_count: usize,
    /// Stack depth after the segment (0 = top level).
    pub nesting_level: usize,
    /// Whether the segment resumed an enclosing loop by closing nested ones.
    pub resumed: bool,
    /// Names of the closed loops, innermost first.
    pub closed: Vec<String>,
}

impl Transition {
    fn unchanged(depth: usize) -> Self {
        Self {
            nesting_level: depth,
            ..Self::default()
        }
    }

    /// Whether the segment changed the loop structure at all.
    pub fn is_structural(&self) -> bool {
        self.loop_entered.is_some() || self.closed_count > 0
    }
}

/// Computes loop transitions for one document from its plan.
pub struct LoopStateMachine {
    plan: Option<Arc<LoopPlan>>,
    stack: Vec<OpenLoop>,
    last: Option<Transition>,
    pushes: usize,
    pops: usize,
    validator: Option<Box<dyn TransitionValidator>>,
    filter: Option<Box<dyn DescriptorFilter>>,
}

impl std::fmt::Debug for LoopStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopStateMachine")
            .field("document", &self.document_name())
            .field("stack", &self.stack)
            .field("pushes", &self.pushes)
            .field("pops", &self.pops)
            .finish_non_exhaustive()
    }
}

impl LoopStateMachine {
    /// Machine driven by `plan`.
    pub fn new(plan: Arc<LoopPlan>) -> Self {
        Self {
            plan: Some(plan),
            ..Self::disabled()
        }
    }

    /// Pass-through machine: every segment leaves the structure unchanged.
    pub fn disabled() -> Self {
        Self {
            plan: None,
            stack: Vec::new(),
            last: None,
            pushes: 0,
            pops: 0,
            validator: None,
            filter: None,
        }
    }

    /// Run `validator` before every transition (builder pattern).
    pub fn with_validator(mut self, validator: impl TransitionValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Consider only descriptors accepted by `filter` (builder pattern).
    pub fn with_filter(mut self, filter: impl DescriptorFilter + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Feed one segment name and apply its transition.
    ///
    /// The first descriptor (in plan order) whose trigger is `segment` and
    /// whose parent context accepts the innermost open loop wins. Entering a
    /// loop at level L first closes every open loop at level L or deeper;
    /// resuming level L closes every loop deeper than L.
    ///
    /// A required parent path that does not match the loops left open is a
    /// structural error, and the stack is left as it was.
    pub fn transition(&mut self, segment: &str) -> Result<Transition, EdiError> {
        let Some(descriptor) = self.find_descriptor(segment).cloned() else {
            let t = Transition::unchanged(self.stack.len());
            self.last = Some(t.clone());
            return Ok(t);
        };

        let keep = match descriptor.target {
            LoopTarget::Enter(_) => self.stack.partition_point(|l| l.level < descriptor.level),
            LoopTarget::Resume => self.stack.partition_point(|l| l.level <= descriptor.level),
        };

        if let Some(required) = &descriptor.required_parent_path {
            let actual = path_of(&self.stack[..keep]);
            if *required != actual {
                return Err(EdiError::structural(
                    StructuralKind::LoopNesting,
                    segment,
                    required.clone(),
                    actual,
                ));
            }
        }
        if let Some(v) = &self.validator {
            v.validate(segment, &descriptor, &self.stack[..keep])?;
        }

        let closed: Vec<String> = self.stack.drain(keep..).rev().map(|l| l.name).collect();
        self.pops += closed.len();

        let loop_entered = match descriptor.target {
            LoopTarget::Enter(name) => {
                self.stack.push(OpenLoop {
                    name: name.clone(),
                    level: descriptor.level,
                });
                self.pushes += 1;
                Some(name)
            }
            LoopTarget::Resume => None,
        };

        let t = Transition {
            resumed: loop_entered.is_none() && !closed.is_empty(),
            loop_entered,
            closed_count: closed.len(),
            nesting_level: self.stack.len(),
            closed,
        };
        trace!(
            segment,
            entered = ?t.loop_entered,
            closed = t.closed_count,
            depth = t.nesting_level,
            "loop transition"
        );
        self.last = Some(t.clone());
        Ok(t)
    }

    /// Close every open loop, innermost first, and return their names.
    pub fn close_all(&mut self) -> Vec<String> {
        let closed: Vec<String> = self.stack.drain(..).rev().map(|l| l.name).collect();
        self.pops += closed.len();
        closed
    }

    fn find_descriptor(&self, segment: &str) -> Option<&LoopDescriptor> {
        let plan = self.plan.as_deref()?;
        let current = self.stack.last().map(|l| l.name.as_str());
        plan.candidates(segment)
            .filter(|d| self.filter.as_ref().is_none_or(|f| f.accept(d, current)))
            .find(|d| d.parent_context.accepts(current))
    }

    /// Depth of the loop stack (0 = top level).
    pub fn nesting_level(&self) -> usize {
        self.stack.len()
    }

    /// Open loops, outermost first.
    pub fn open_loops(&self) -> &[OpenLoop] {
        &self.stack
    }

    /// Path of open loops, e.g. `"/PO1/PID"`; `"/"` at the top level.
    pub fn current_path(&self) -> String {
        path_of(&self.stack)
    }

    /// The most recent transition, if any segment has been fed.
    pub fn last_transition(&self) -> Option<&Transition> {
        self.last.as_ref()
    }

    /// Loops opened since creation or the last [`reset`](Self::reset).
    pub fn total_pushes(&self) -> usize {
        self.pushes
    }

    /// Loops closed since creation or the last [`reset`](Self::reset).
    pub fn total_pops(&self) -> usize {
        self.pops
    }

    /// Document identifier of the plan, if the machine is enabled.
    pub fn document_name(&self) -> Option<&str> {
        self.plan.as_deref().map(|p| p.document.as_str())
    }

    /// Whether the machine has a plan.
    pub fn is_enabled(&self) -> bool {
        self.plan.is_some()
    }

    /// Return to the top level and clear the counters.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.last = None;
        self.pushes = 0;
        self.pops = 0;
    }
}

fn path_of(stack: &[OpenLoop]) -> String {
    if stack.is_empty() {
        return INITIAL_CONTEXT.to_string();
    }
    stack.iter().fold(String::new(), |mut path, l| {
        path.push('/');
        path.push_str(&l.name);
        path
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_toolchain_plans::{ParentContext, PlanRegistry, Standard};

    fn machine(doc: &str) -> LoopStateMachine {
        let plan = PlanRegistry::builtin()
            .lookup(Standard::AnsiX12, doc, None, None)
            .unwrap();
        LoopStateMachine::new(plan)
    }

    #[test]
    fn ack_loops_nest_and_resume() {
        let mut m = machine("997");
        assert_eq!(m.transition("AK1").unwrap(), Transition::unchanged(0));

        let t = m.transition("AK2").unwrap();
        assert_eq!(t.loop_entered.as_deref(), Some("AK2"));
        assert_eq!(t.nesting_level, 1);

        let t = m.transition("AK3").unwrap();
        assert_eq!(t.loop_entered.as_deref(), Some("AK3"));
        assert_eq!(m.current_path(), "/AK2/AK3");

        let t = m.transition("AK5").unwrap();
        assert!(t.resumed);
        assert_eq!(t.closed, ["AK3"]);
        assert_eq!(t.nesting_level, 1);

        let t = m.transition("AK9").unwrap();
        assert!(t.resumed);
        assert_eq!(t.closed_count, 1);
        assert_eq!(m.nesting_level(), 0);
        assert_eq!(m.total_pushes(), m.total_pops());
    }

    #[test]
    fn entering_same_level_closes_sibling() {
        let mut m = machine("997");
        m.transition("AK2").unwrap();
        let t = m.transition("AK2").unwrap();
        assert_eq!(t.closed, ["AK2"]);
        assert_eq!(t.loop_entered.as_deref(), Some("AK2"));
        assert!(!t.resumed);
        assert_eq!(m.nesting_level(), 1);
    }

    #[test]
    fn required_path_mismatch_leaves_stack_untouched() {
        let mut m = machine("850");
        m.transition("N1").unwrap();
        let err = m.transition("PID").unwrap_err();
        match err {
            EdiError::Structural {
                segment,
                expected,
                actual,
                ..
            } => {
                assert_eq!(segment, "PID");
                assert_eq!(expected, "/PO1");
                assert_eq!(actual, "/N1");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(m.current_path(), "/N1");
    }

    #[test]
    fn resume_with_nothing_open_is_not_resumed() {
        let mut m = machine("997");
        let t = m.transition("AK9").unwrap();
        assert!(!t.resumed);
        assert_eq!(t.closed_count, 0);
    }

    #[test]
    fn parent_context_selects_descriptor() {
        let mut m = machine("810");
        m.transition("IT1").unwrap();
        // SAC inside IT1 nests at level 2.
        let t = m.transition("SAC").unwrap();
        assert_eq!(t.nesting_level, 2);
        assert_eq!(m.current_path(), "/IT1/SAC");
        // TDS returns to the top level; SAC there is a summary loop.
        m.transition("TDS").unwrap();
        let t = m.transition("SAC").unwrap();
        assert_eq!(t.nesting_level, 1);
        assert_eq!(m.current_path(), "/SAC");
    }

    #[test]
    fn unknown_segments_change_nothing() {
        let mut m = machine("850");
        m.transition("PO1").unwrap();
        let t = m.transition("REF").unwrap();
        assert!(!t.is_structural());
        assert_eq!(t.nesting_level, 1);
        assert_eq!(m.last_transition(), Some(&t));
    }

    #[test]
    fn disabled_machine_passes_through() {
        let mut m = LoopStateMachine::disabled();
        assert!(!m.is_enabled());
        assert_eq!(m.document_name(), None);
        for seg in ["N1", "PO1", "PID"] {
            assert!(!m.transition(seg).unwrap().is_structural());
        }
    }

    #[test]
    fn filter_removes_candidates() {
        let mut m = machine("850")
            .with_filter(|d: &LoopDescriptor, _: Option<&str>| d.trigger_segment != "N1");
        assert!(!m.transition("N1").unwrap().is_structural());
        assert!(m.transition("PO1").unwrap().is_structural());
    }

    #[test]
    fn validator_can_veto() {
        let mut m = machine("850").with_validator(MaxNesting(1));
        m.transition("PO1").unwrap();
        assert!(m.transition("PID").is_err());
        assert_eq!(m.current_path(), "/PO1");
    }

    #[test]
    fn initial_context_applies_only_at_top_level() {
        let plan = LoopPlan::new(
            "T",
            "test",
            vec![
                LoopDescriptor::enter("HL", "HL-top", 1).within(ParentContext::Initial),
                LoopDescriptor::enter("HL", "HL-nested", 2),
            ],
        );
        let mut m = LoopStateMachine::new(Arc::new(plan));
        assert_eq!(m.transition("HL").unwrap().loop_entered.as_deref(), Some("HL-top"));
        assert_eq!(
            m.transition("HL").unwrap().loop_entered.as_deref(),
            Some("HL-nested")
        );
    }

    #[test]
    fn close_all_and_reset() {
        let mut m = machine("850");
        m.transition("PO1").unwrap();
        m.transition("PID").unwrap();
        assert_eq!(m.close_all(), ["PID", "PO1"]);
        assert_eq!(m.total_pops(), 2);
        m.reset();
        assert_eq!(m.total_pushes(), 0);
        assert!(m.last_transition().is_none());
        assert_eq!(m.current_path(), "/");
    }
}
