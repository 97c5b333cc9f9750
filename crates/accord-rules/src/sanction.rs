//! Penalty amounts from real-valued rules.
//!
//! A sanction rule pairs guard rows (the sanction applies) with one
//! real-valued row (the amount). Any failure yields an amount of zero, so a
//! caller can charge the result without inspecting errors.

use tracing::trace;

use accord_types::VariableSnapshot;

use crate::RuleMatrix;

/// The sanction amount `rule` assigns to `snapshot`.
///
/// Returns `0.0` when the rule's variables are missing or mis-sized, when
/// any guard row fails, or when the rule has no real-valued row.
pub fn evaluate_sanction(rule: &RuleMatrix, snapshot: &VariableSnapshot) -> f64 {
    let Ok(formal) = rule
        .formal_vector(snapshot)
        .inspect_err(|error| trace!(rule = rule.name(), %error, "sanction not applicable"))
    else {
        return 0.0;
    };

    let mut amount = 0.0;
    for ((value, scale), operator) in rule.row_values(&formal).into_iter().zip(rule.operators()) {
        if operator.is_real_valued() {
            amount = value;
        } else if !operator.holds(value, scale) {
            return 0.0;
        }
    }
    amount
}
