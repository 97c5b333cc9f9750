//! Rule evaluation.
//!
//! Evaluation multiplies the rule matrix by the formal vector and judges
//! each row's scalar with its [`Operator`](crate::Operator):
//!
//! - A rule without a real-valued row passes iff every row holds.
//! - A rule with one real-valued row passes iff every *other* row holds,
//!   and additionally reports that row's scalar as
//!   [`Evaluation::real_value`].
//!
//! Linked rules ([`LinkType::ParentFailAutoPass`]) first evaluate their own
//! rows as the parent. A failing parent passes the whole rule outright; a
//! passing parent defers to the child, which is evaluated the same way
//! (including its own link) from the same catalog.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;

use accord_types::VariableSnapshot;

use crate::rule::affine;
use crate::{LinkType, RuleCatalog, RuleError, RuleMatrix};

/// The outcome of evaluating a rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    /// Whether the rule's constraint rows all hold.
    pub passes: bool,
    /// The real-valued row's scalar, for real-valued rules.
    pub real_value: Option<f64>,
}

impl Evaluation {
    /// The outcome of a linked rule whose parent rows failed.
    const AUTO_PASS: Self = Self {
        passes: true,
        real_value: None,
    };

    /// Whether this evaluation carries a real value.
    pub const fn is_real_valued(&self) -> bool {
        self.real_value.is_some()
    }
}

/// Evaluate a rule by name, following links within `catalog`.
///
/// # Errors
///
/// Returns [`RuleError::RuleNotFound`] if `rule_name` is not in the
/// catalog, [`RuleError::ChildRuleNotFound`] if a passing parent links to
/// an absent child, [`RuleError::LinkCycle`] if a link chain revisits a
/// rule, and any error from [`evaluate_rule`].
pub fn evaluate(
    rule_name: &str,
    catalog: &RuleCatalog,
    snapshot: &VariableSnapshot,
) -> Result<Evaluation, RuleError> {
    let mut current = catalog
        .get(rule_name)
        .ok_or_else(|| RuleError::RuleNotFound(rule_name.to_owned()))?;
    let mut visited = BTreeSet::new();

    loop {
        if !visited.insert(current.name()) {
            return Err(RuleError::LinkCycle(current.name().to_owned()));
        }

        let own = evaluate_rule(current, snapshot)?;
        let Some(link) = current.link() else {
            return Ok(own);
        };

        match link.link_type {
            LinkType::ParentFailAutoPass => {
                if !own.passes {
                    trace!(rule = current.name(), "parent rows failed, linked rule auto-passes");
                    return Ok(Evaluation::AUTO_PASS);
                }
                current = catalog.get(&link.child).ok_or_else(|| {
                    RuleError::ChildRuleNotFound {
                        rule: current.name().to_owned(),
                        child: link.child.clone(),
                    }
                })?;
            }
        }
    }
}

/// Evaluate a rule's own rows, ignoring any link.
///
/// # Errors
///
/// Returns [`RuleError::MissingVariables`] or
/// [`RuleError::DimensionMismatch`] if the formal vector cannot be built.
pub fn evaluate_rule(
    rule: &RuleMatrix,
    snapshot: &VariableSnapshot,
) -> Result<Evaluation, RuleError> {
    let formal = rule.formal_vector(snapshot)?;
    let mut passes = true;
    let mut real_value = None;

    for ((value, scale), operator) in rule.row_values(&formal).into_iter().zip(rule.operators()) {
        if operator.is_real_valued() {
            real_value = Some(value);
        } else if !operator.holds(value, scale) {
            passes = false;
        }
    }

    Ok(Evaluation { passes, real_value })
}

/// Return whether a rule's own rows pass against `snapshot`.
///
/// Any evaluation error counts as non-compliance.
pub fn compliance_check(rule: &RuleMatrix, snapshot: &VariableSnapshot) -> bool {
    evaluate_rule(rule, snapshot).is_ok_and(|evaluation| evaluation.passes)
}

/// Return whether every constraint row holds at `point`, where `point` is
/// the formal vector without its trailing constant.
pub(crate) fn rows_hold(rule: &RuleMatrix, point: &[f64]) -> bool {
    rule.coefficients()
        .iter()
        .zip(rule.operators())
        .all(|(row, operator)| {
            let (value, scale) = affine(row, point);
            operator.holds(value, scale)
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Operator;
    use accord_types::VariableName;

    /// `ballots_cast == 6` and `islands_alive >= 2`.
    fn quorum_rule(name: &str) -> RuleMatrix {
        RuleMatrix::new(
            name,
            vec![VariableName::NumberOfBallotsCast, VariableName::NumberOfIslandsAlive],
            vec![vec![1.0, 0.0, -6.0], vec![0.0, 1.0, -2.0]],
            vec![Operator::Equal, Operator::GreaterEqual],
            false,
        )
        .unwrap()
    }

    fn snapshot(ballots: f64, alive: f64) -> VariableSnapshot {
        VariableSnapshot::new()
            .with(VariableName::NumberOfBallotsCast, vec![ballots])
            .with(VariableName::NumberOfIslandsAlive, vec![alive])
    }

    fn catalog(rules: impl IntoIterator<Item = RuleMatrix>) -> RuleCatalog {
        rules.into_iter().collect()
    }

    #[test]
    fn all_rows_hold_passes() {
        let rules = catalog([quorum_rule("quorum")]);
        let result = evaluate("quorum", &rules, &snapshot(6.0, 3.0));
        assert_eq!(
            result,
            Ok(Evaluation {
                passes: true,
                real_value: None,
            }),
        );
    }

    #[test]
    fn any_failing_row_fails() {
        let rules = catalog([quorum_rule("quorum")]);
        assert_eq!(evaluate("quorum", &rules, &snapshot(5.0, 3.0)).map(|e| e.passes), Ok(false));
        assert_eq!(evaluate("quorum", &rules, &snapshot(6.0, 1.0)).map(|e| e.passes), Ok(false));
    }

    #[test]
    fn unknown_rule_is_not_found() {
        let rules = catalog([quorum_rule("quorum")]);
        assert_eq!(
            evaluate("missing", &rules, &snapshot(6.0, 3.0)),
            Err(RuleError::RuleNotFound("missing".to_owned())),
        );
    }

    #[test]
    fn missing_variable_reported() {
        let rules = catalog([quorum_rule("quorum")]);
        let partial = VariableSnapshot::new().with(VariableName::NumberOfBallotsCast, vec![6.0]);
        assert_eq!(
            evaluate("quorum", &rules, &partial),
            Err(RuleError::MissingVariables {
                rule: "quorum".to_owned(),
                missing: vec![VariableName::NumberOfIslandsAlive],
            }),
        );
    }

    #[test]
    fn real_valued_row_reports_scalar_and_is_excluded_from_and() {
        let rule = RuleMatrix::new(
            "payout",
            vec![VariableName::NumberOfIslandsAlive],
            vec![vec![1.0, -1.0], vec![10.0, 5.0]],
            vec![Operator::Greater, Operator::RealValued],
            false,
        )
        .unwrap();
        let rules = catalog([rule]);

        let passing = evaluate("payout", &rules, &snapshot(0.0, 3.0));
        assert_eq!(
            passing,
            Ok(Evaluation {
                passes: true,
                real_value: Some(35.0),
            }),
        );

        let failing = evaluate("payout", &rules, &snapshot(0.0, 1.0));
        assert_eq!(
            failing,
            Ok(Evaluation {
                passes: false,
                real_value: Some(15.0),
            }),
        );
        assert!(failing.is_ok_and(|e| e.is_real_valued()));
    }

    #[test]
    fn linked_parent_failure_auto_passes() {
        // Parent: a vote was called. Child: quorum.
        let parent = RuleMatrix::new(
            "vote_requires_quorum",
            vec![VariableName::VoteCalled],
            vec![vec![1.0, -1.0]],
            vec![Operator::Equal],
            false,
        )
        .unwrap()
        .with_link("quorum", LinkType::ParentFailAutoPass);
        let rules = catalog([parent, quorum_rule("quorum")]);

        let no_vote = snapshot(0.0, 0.0).with(VariableName::VoteCalled, vec![0.0]);
        assert_eq!(
            evaluate("vote_requires_quorum", &rules, &no_vote).map(|e| e.passes),
            Ok(true),
        );

        let vote_without_quorum = snapshot(0.0, 0.0).with(VariableName::VoteCalled, vec![1.0]);
        assert_eq!(
            evaluate("vote_requires_quorum", &rules, &vote_without_quorum).map(|e| e.passes),
            Ok(false),
        );

        let vote_with_quorum = snapshot(6.0, 4.0).with(VariableName::VoteCalled, vec![1.0]);
        assert_eq!(
            evaluate("vote_requires_quorum", &rules, &vote_with_quorum).map(|e| e.passes),
            Ok(true),
        );
    }

    #[test]
    fn missing_child_only_matters_when_parent_passes() {
        let parent = RuleMatrix::new(
            "orphan",
            vec![VariableName::VoteCalled],
            vec![vec![1.0, -1.0]],
            vec![Operator::Equal],
            false,
        )
        .unwrap()
        .with_link("nowhere", LinkType::ParentFailAutoPass);
        let rules = catalog([parent]);

        let parent_fails = VariableSnapshot::new().with(VariableName::VoteCalled, vec![0.0]);
        assert_eq!(evaluate("orphan", &rules, &parent_fails).map(|e| e.passes), Ok(true));

        let parent_passes = VariableSnapshot::new().with(VariableName::VoteCalled, vec![1.0]);
        assert_eq!(
            evaluate("orphan", &rules, &parent_passes),
            Err(RuleError::ChildRuleNotFound {
                rule: "orphan".to_owned(),
                child: "nowhere".to_owned(),
            }),
        );
    }

    #[test]
    fn link_cycle_detected() {
        let make = |name: &str, child: &str| {
            RuleMatrix::new(
                name,
                vec![VariableName::VoteCalled],
                vec![vec![1.0, -1.0]],
                vec![Operator::Equal],
                false,
            )
            .unwrap()
            .with_link(child, LinkType::ParentFailAutoPass)
        };
        let rules = catalog([make("a", "b"), make("b", "a")]);
        let vote = VariableSnapshot::new().with(VariableName::VoteCalled, vec![1.0]);
        assert_eq!(evaluate("a", &rules, &vote), Err(RuleError::LinkCycle("a".to_owned())));
    }

    #[test]
    fn compliance_check_treats_errors_as_failure() {
        let rule = quorum_rule("quorum");
        assert!(compliance_check(&rule, &snapshot(6.0, 2.0)));
        assert!(!compliance_check(&rule, &VariableSnapshot::new()));
    }

    #[test]
    fn rows_hold_matches_evaluation() {
        let rule = quorum_rule("quorum");
        assert!(rows_hold(&rule, &[6.0, 2.0]));
        assert!(!rows_hold(&rule, &[6.0, 1.0]));
    }

    #[test]
    fn small_nonzero_row_value_is_not_zero() {
        // x - 5e-10 at x = 0.
        let row = |operator| {
            RuleMatrix::new(
                "tiny",
                vec![VariableName::SpeakerSalary],
                vec![vec![1.0, -5e-10]],
                vec![operator],
                false,
            )
            .unwrap()
        };
        let at_zero = VariableSnapshot::new().with(VariableName::SpeakerSalary, vec![0.0]);

        assert!(!evaluate_rule(&row(Operator::Equal), &at_zero).unwrap().passes);
        assert!(!evaluate_rule(&row(Operator::GreaterEqual), &at_zero).unwrap().passes);
        assert!(evaluate_rule(&row(Operator::NotEqual), &at_zero).unwrap().passes);
        assert!(!rows_hold(&row(Operator::Equal), &[0.0]));
    }

    #[test]
    fn rounding_at_large_magnitude_counts_as_zero() {
        // 0.1 * x - 1e6 at x = 1e7 leaves a rounding residual.
        let rule = RuleMatrix::new(
            "large",
            vec![VariableName::SpeakerSalary],
            vec![vec![0.1, -1e6]],
            vec![Operator::Equal],
            false,
        )
        .unwrap();
        let snapshot = VariableSnapshot::new().with(VariableName::SpeakerSalary, vec![1e7]);
        assert!(evaluate_rule(&rule, &snapshot).unwrap().passes);
    }
}
