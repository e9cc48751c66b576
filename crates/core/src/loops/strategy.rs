use edi_toolchain_plans::LoopDescriptor;

use crate::error::{EdiError, StructuralKind};

use super::OpenLoop;

/// Extra validation run after a descriptor has matched and before the
/// transition is applied. Returning an error leaves the machine unchanged.
pub trait TransitionValidator {
    /// `enclosing` holds the loops that stay open around the new position.
    fn validate(
        &self,
        segment: &str,
        descriptor: &LoopDescriptor,
        enclosing: &[OpenLoop],
    ) -> Result<(), EdiError>;
}

/// Narrows the descriptors considered for a segment before matching.
pub trait DescriptorFilter {
    /// Whether `descriptor` may be matched while `current` is the innermost
    /// open loop (`None` at the top level).
    fn accept(&self, descriptor: &LoopDescriptor, current: Option<&str>) -> bool;
}

impl<F> DescriptorFilter for F
where
    F: Fn(&LoopDescriptor, Option<&str>) -> bool,
{
    fn accept(&self, descriptor: &LoopDescriptor, current: Option<&str>) -> bool {
        self(descriptor, current)
    }
}

/// Rejects loops nested deeper than a fixed limit.
#[derive(Debug, Clone, Copy)]
pub struct MaxNesting(pub usize);

impl TransitionValidator for MaxNesting {
    fn validate(
        &self,
        segment: &str,
        descriptor: &LoopDescriptor,
        enclosing: &[OpenLoop],
    ) -> Result<(), EdiError> {
        let depth = enclosing.len() + usize::from(descriptor.target.loop_name().is_some());
        if depth > self.0 {
            return Err(EdiError::structural(
                StructuralKind::LoopNesting,
                segment,
                format!("at most {} nested loops", self.0),
                format!("{depth} nested loops"),
            ));
        }
        Ok(())
    }
}
