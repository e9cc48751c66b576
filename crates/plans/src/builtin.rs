//! Loop plans shipped with the toolchain.

use crate::registry::{PlanKey, Standard};
use crate::{LoopDescriptor, LoopPlan, ParentContext};

fn within(name: &str) -> ParentContext {
    ParentContext::Loop(name.to_string())
}

/// X12 997 Functional Acknowledgment.
fn ansi_997() -> LoopPlan {
    LoopPlan::new(
        "997",
        "Functional Acknowledgment",
        vec![
            LoopDescriptor::enter("AK2", "AK2", 1),
            LoopDescriptor::enter("AK3", "AK3", 2).requiring("/AK2"),
            LoopDescriptor::resume("AK5", 1),
            LoopDescriptor::resume("AK9", 0),
        ],
    )
}

/// X12 850 Purchase Order.
fn ansi_850() -> LoopPlan {
    LoopPlan::new(
        "850",
        "Purchase Order",
        vec![
            LoopDescriptor::enter("N1", "N1", 1),
            LoopDescriptor::enter("PO1", "PO1", 1),
            LoopDescriptor::enter("PID", "PID", 2).requiring("/PO1"),
            LoopDescriptor::enter("CTT", "CTT", 1),
        ],
    )
}

/// X12 810 Invoice.
fn ansi_810() -> LoopPlan {
    LoopPlan::new(
        "810",
        "Invoice",
        vec![
            LoopDescriptor::enter("N1", "N1", 1),
            LoopDescriptor::enter("IT1", "IT1", 1),
            LoopDescriptor::enter("PID", "PID", 2).requiring("/IT1"),
            LoopDescriptor::enter("SAC", "SAC", 2).within(within("IT1")),
            LoopDescriptor::enter("SAC", "SAC", 2).within(within("PID")),
            LoopDescriptor::resume("TDS", 0),
            LoopDescriptor::enter("SAC", "SAC", 1),
            LoopDescriptor::enter("ISS", "ISS", 1),
            LoopDescriptor::enter("CTT", "CTT", 1),
        ],
    )
}

/// EDIFACT ORDERS Purchase order message.
fn edifact_orders() -> LoopPlan {
    LoopPlan::new(
        "ORDERS",
        "Purchase order message",
        vec![
            LoopDescriptor::enter("NAD", "NAD", 1),
            LoopDescriptor::enter("CTA", "CTA", 2).within(within("NAD")),
            LoopDescriptor::enter("CTA", "CTA", 2).within(within("CTA")),
            LoopDescriptor::enter("LIN", "LIN", 1),
            LoopDescriptor::resume("UNS", 0),
        ],
    )
}

pub(crate) fn plans() -> Vec<(PlanKey, LoopPlan)> {
    vec![
        (PlanKey::new(Standard::AnsiX12, "997"), ansi_997()),
        (PlanKey::new(Standard::AnsiX12, "850"), ansi_850()),
        (PlanKey::new(Standard::AnsiX12, "810"), ansi_810()),
        (PlanKey::new(Standard::Edifact, "ORDERS"), edifact_orders()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_plan_validates() {
        for (key, plan) in plans() {
            plan.validate()
                .unwrap_or_else(|e| panic!("builtin plan {key} is invalid: {e}"));
            assert_eq!(plan.document, key.document_type);
        }
    }
}
