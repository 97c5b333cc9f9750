//! Greedy single-pass compliance repair.
//!
//! The recommender walks a rule's rows in order. For each violated row it
//! picks the first free coordinate (per the [`ChangeablePolicy`]) with a
//! non-zero coefficient and solves the row for that coordinate, holding
//! every other coordinate at its current, possibly already adjusted, value.
//!
//! With `calc = result - old * coefficient`, the replacement value is:
//!
//! | Operator | New value |
//! |----------|-----------|
//! | `Equal` | `-calc / coefficient` |
//! | `Greater` | `(-2 * calc + 1) / coefficient` |
//! | `GreaterEqual` | `-calc / coefficient` |
//! | `NotEqual` | `(calc + 1) / coefficient` |
//! | `RealValued` | `calc / coefficient` |
//!
//! Earlier rows are not re-checked after later rows move a shared
//! coordinate, so a "successful" recommendation can still violate the rule.
//! Use [`Recommendation::verify`] to detect that, or the projection solver
//! for a repair that is checked against the whole rule.

use serde::Serialize;
use tracing::trace;

use accord_types::{ChangeablePolicy, VariableSnapshot};

use crate::layout::FlatPoint;
use crate::rule::affine;
use crate::{Operator, RuleError, RuleMatrix, compliance_check};

/// The result of a recommendation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// The input snapshot with adjusted values written back.
    pub snapshot: VariableSnapshot,
    /// `false` if some violated row had no free coordinate to adjust.
    pub succeeded: bool,
}

impl Recommendation {
    /// Re-evaluate `rule` against the adjusted snapshot.
    pub fn verify(&self, rule: &RuleMatrix) -> bool {
        compliance_check(rule, &self.snapshot)
    }
}

/// Propose a single-pass adjustment that repairs violated rows of `rule`.
///
/// Rows are visited in order. A row with no adjustable coordinate stops the
/// pass: earlier adjustments are kept, later rows are not attempted, and
/// [`Recommendation::succeeded`] is `false`.
///
/// # Errors
///
/// Returns [`RuleError::MissingVariables`] or
/// [`RuleError::DimensionMismatch`] if the rule cannot be applied to the
/// snapshot.
pub fn recommend<P>(
    rule: &RuleMatrix,
    snapshot: &VariableSnapshot,
    policy: &P,
) -> Result<Recommendation, RuleError>
where
    P: ChangeablePolicy + ?Sized,
{
    let point = FlatPoint::gather(rule, snapshot)?;
    let fixed = point.fixed_mask(policy);
    let mut values = point.values.clone();

    for (index, (row, operator)) in rule.coefficients().iter().zip(rule.operators()).enumerate() {
        let (result, scale) = affine(row, &values);
        if operator.holds(result, scale) {
            continue;
        }

        let free_slot = row
            .iter()
            .zip(&fixed)
            .position(|(coefficient, is_fixed)| !is_fixed && *coefficient != 0.0);
        let Some((slot, coefficient)) =
            free_slot.and_then(|slot| row.get(slot).map(|c| (slot, *c)))
        else {
            trace!(rule = rule.name(), row = index, "no adjustable coordinate, giving up");
            return Ok(Recommendation {
                snapshot: point.scatter(&values, snapshot),
                succeeded: false,
            });
        };

        if let Some(value) = values.get_mut(slot) {
            let calc = (-*value).mul_add(coefficient, result);
            let adjusted = solve_for_slot(*operator, calc, coefficient);
            trace!(rule = rule.name(), row = index, slot, from = *value, to = adjusted, "adjusting");
            *value = adjusted;
        }
    }

    Ok(Recommendation {
        snapshot: point.scatter(&values, snapshot),
        succeeded: true,
    })
}

/// Replacement value for the chosen coordinate of a violated row.
fn solve_for_slot(operator: Operator, calc: f64, coefficient: f64) -> f64 {
    match operator {
        Operator::Equal | Operator::GreaterEqual => -calc / coefficient,
        Operator::Greater => (-2.0_f64).mul_add(calc, 1.0) / coefficient,
        Operator::NotEqual => (calc + 1.0) / coefficient,
        Operator::RealValued => calc / coefficient,
    }
}
