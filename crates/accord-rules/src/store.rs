//! The rule store: Available and `InPlay` catalogs.
//!
//! Every rule ever registered lives in *Available*. The subset currently
//! enforced lives in *`InPlay`*. The surrounding simulation populates the
//! store at setup, then reads it concurrently from many agents each turn
//! while occasionally registering, activating, or modifying rules.
//!
//! # Concurrency
//!
//! Each catalog sits behind its own [`RwLock`]. Writers that touch both
//! catalogs always lock Available before `InPlay`, so lock order is fixed.
//! Share a store between threads via `Arc<RuleStore>`.
//!
//! # Lifecycle
//!
//! | Operation | Fails with |
//! |-----------|------------|
//! | [`register`](RuleStore::register) | `TriedToReRegisterRule` |
//! | [`pull_into_play`](RuleStore::pull_into_play) | `RuleNotFound`, `RuleIsAlreadyInPlay` |
//! | [`pull_out_of_play`](RuleStore::pull_out_of_play) | `RuleIsNotInPlay` |
//! | [`modify`](RuleStore::modify) | `RuleNotFound`, `RuleRequestedForModificationWasImmutable`, `ModifiedRuleMatrixDimensionMismatch`, `AuxVectorDimensionMismatch` |
//!
//! A failed operation leaves both catalogs unchanged.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use accord_types::{ChangeablePolicy, VariableName, VariableSnapshot};

use crate::projection::{RuleSpaceDistance, distance_from_rule_space};
use crate::{Evaluation, Operator, RuleCatalog, RuleError, RuleMatrix, evaluate, evaluate_sanction};

/// Thread-safe store of available and in-play rules.
#[derive(Debug, Default)]
pub struct RuleStore {
    /// Every registered rule.
    available: RwLock<RuleCatalog>,
    /// Rules currently enforced.
    in_play: RwLock<RuleCatalog>,
}

impl RuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Lifecycle (writers)
    // -----------------------------------------------------------------------

    /// Register a new rule in Available.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::TriedToReRegisterRule`] if the name exists.
    pub fn register(&self, rule: RuleMatrix) -> Result<(), RuleError> {
        let mut available = write(&self.available)?;
        if available.contains(rule.name()) {
            return Err(RuleError::TriedToReRegisterRule(rule.name().to_owned()));
        }
        debug!(
            rule = rule.name(),
            rows = rule.row_count(),
            columns = rule.column_count(),
            mutable = rule.is_mutable(),
            "rule registered"
        );
        available.insert(rule);
        Ok(())
    }

    /// Copy a rule from Available into `InPlay`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::RuleNotFound`] if the rule is not available, or
    /// [`RuleError::RuleIsAlreadyInPlay`] if it is already in play.
    pub fn pull_into_play(&self, name: &str) -> Result<(), RuleError> {
        let available = read(&self.available)?;
        let mut in_play = write(&self.in_play)?;
        let rule = available
            .get(name)
            .ok_or_else(|| RuleError::RuleNotFound(name.to_owned()))?;
        if in_play.contains(name) {
            return Err(RuleError::RuleIsAlreadyInPlay(name.to_owned()));
        }
        in_play.insert(rule.clone());
        debug!(rule = name, in_play = in_play.len(), "rule pulled into play");
        Ok(())
    }

    /// Remove a rule from `InPlay`. The rule stays available.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::RuleIsNotInPlay`] if it is not in play.
    pub fn pull_out_of_play(&self, name: &str) -> Result<(), RuleError> {
        let mut in_play = write(&self.in_play)?;
        if in_play.remove(name).is_none() {
            return Err(RuleError::RuleIsNotInPlay(name.to_owned()));
        }
        debug!(rule = name, in_play = in_play.len(), "rule pulled out of play");
        Ok(())
    }

    /// Replace a mutable rule's coefficient matrix and operators.
    ///
    /// The new matrix must keep the stored column count and supply one
    /// operator per row. If the rule is in play, the in-play copy is
    /// refreshed as well.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::RuleNotFound`],
    /// [`RuleError::RuleRequestedForModificationWasImmutable`],
    /// [`RuleError::ModifiedRuleMatrixDimensionMismatch`], or
    /// [`RuleError::AuxVectorDimensionMismatch`]. Construction errors from
    /// the new system (for example two real-valued rows) are also returned.
    pub fn modify(
        &self,
        name: &str,
        coefficients: Vec<Vec<f64>>,
        operators: Vec<Operator>,
    ) -> Result<(), RuleError> {
        let mut available = write(&self.available)?;
        let mut in_play = write(&self.in_play)?;

        let current = available
            .get(name)
            .ok_or_else(|| RuleError::RuleNotFound(name.to_owned()))?;
        if !current.is_mutable() {
            return Err(RuleError::RuleRequestedForModificationWasImmutable(
                name.to_owned(),
            ));
        }

        let expected = current.column_count();
        let bad_row = if coefficients.is_empty() {
            Some(0)
        } else {
            coefficients.iter().map(Vec::len).find(|len| *len != expected)
        };
        if let Some(actual) = bad_row {
            return Err(RuleError::ModifiedRuleMatrixDimensionMismatch {
                rule: name.to_owned(),
                expected,
                actual,
            });
        }

        if operators.len() != coefficients.len() {
            return Err(RuleError::AuxVectorDimensionMismatch {
                rule: name.to_owned(),
                rows: coefficients.len(),
                operators: operators.len(),
            });
        }

        let updated = current.with_system(coefficients, operators)?;
        let refreshed = in_play.contains(name);
        if refreshed {
            in_play.insert(updated.clone());
        }
        available.insert(updated);
        debug!(rule = name, refreshed_in_play = refreshed, "rule modified");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries (readers)
    // -----------------------------------------------------------------------

    /// Copy of the Available catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StorePoisoned`] if the lock is poisoned.
    pub fn available(&self) -> Result<RuleCatalog, RuleError> {
        Ok(read(&self.available)?.clone())
    }

    /// Copy of the `InPlay` catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StorePoisoned`] if the lock is poisoned.
    pub fn in_play(&self) -> Result<RuleCatalog, RuleError> {
        Ok(read(&self.in_play)?.clone())
    }

    /// Copy of an available rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::RuleNotFound`] if absent.
    pub fn get_available(&self, name: &str) -> Result<RuleMatrix, RuleError> {
        read(&self.available)?
            .get(name)
            .cloned()
            .ok_or_else(|| RuleError::RuleNotFound(name.to_owned()))
    }

    /// Copy of an in-play rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::RuleIsNotInPlay`] if absent.
    pub fn get_in_play(&self, name: &str) -> Result<RuleMatrix, RuleError> {
        read(&self.in_play)?
            .get(name)
            .cloned()
            .ok_or_else(|| RuleError::RuleIsNotInPlay(name.to_owned()))
    }

    /// Whether a rule is in play.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StorePoisoned`] if the lock is poisoned.
    pub fn is_in_play(&self, name: &str) -> Result<bool, RuleError> {
        Ok(read(&self.in_play)?.contains(name))
    }

    /// Names of in-play rules that read `variable`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::StorePoisoned`] if the lock is poisoned.
    pub fn rules_by_variable(&self, variable: VariableName) -> Result<Vec<String>, RuleError> {
        Ok(read(&self.in_play)?.names_referencing(variable))
    }

    // -----------------------------------------------------------------------
    // Evaluation against a catalog
    // -----------------------------------------------------------------------

    /// Evaluate a rule (and its links) from the `InPlay` catalog.
    ///
    /// # Errors
    ///
    /// See [`evaluate`].
    pub fn evaluate_in_play(
        &self,
        name: &str,
        snapshot: &VariableSnapshot,
    ) -> Result<Evaluation, RuleError> {
        let in_play = read(&self.in_play)?;
        evaluate(name, &in_play, snapshot)
    }

    /// Evaluate a rule (and its links) from the Available catalog.
    ///
    /// # Errors
    ///
    /// See [`evaluate`].
    pub fn evaluate_available(
        &self,
        name: &str,
        snapshot: &VariableSnapshot,
    ) -> Result<Evaluation, RuleError> {
        let available = read(&self.available)?;
        evaluate(name, &available, snapshot)
    }

    /// Sanction amount computed by an in-play rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::RuleIsNotInPlay`] if the rule is not in play.
    pub fn sanction_in_play(
        &self,
        name: &str,
        snapshot: &VariableSnapshot,
    ) -> Result<f64, RuleError> {
        let in_play = read(&self.in_play)?;
        let rule = in_play
            .get(name)
            .ok_or_else(|| RuleError::RuleIsNotInPlay(name.to_owned()))?;
        Ok(evaluate_sanction(rule, snapshot))
    }

    /// Distance from `snapshot` to the space where every in-play rule
    /// passes.
    ///
    /// # Errors
    ///
    /// See [`distance_from_rule_space`].
    pub fn distance_from_rule_space<P>(
        &self,
        snapshot: &VariableSnapshot,
        policy: &P,
    ) -> Result<RuleSpaceDistance, RuleError>
    where
        P: ChangeablePolicy + ?Sized,
    {
        let in_play = read(&self.in_play)?;
        distance_from_rule_space(&in_play, snapshot, policy)
    }
}

fn read(lock: &RwLock<RuleCatalog>) -> Result<RwLockReadGuard<'_, RuleCatalog>, RuleError> {
    lock.read().map_err(|_poisoned| RuleError::StorePoisoned)
}

fn write(lock: &RwLock<RuleCatalog>) -> Result<RwLockWriteGuard<'_, RuleCatalog>, RuleError> {
    lock.write().map_err(|_poisoned| RuleError::StorePoisoned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::LinkType;
    use accord_types::ChangeableSet;

    fn tax_rule(mutable: bool) -> RuleMatrix {
        RuleMatrix::new(
            "pay_tax",
            vec![VariableName::IslandTaxContribution, VariableName::ExpectedTaxContribution],
            vec![vec![1.0, -1.0, 0.0]],
            vec![Operator::GreaterEqual],
            mutable,
        )
        .unwrap()
    }

    fn store_with(rule: RuleMatrix) -> RuleStore {
        let store = RuleStore::new();
        store.register(rule).unwrap();
        store
    }

    #[test]
    fn register_twice_rejected() {
        let store = store_with(tax_rule(true));
        assert_eq!(
            store.register(tax_rule(true)),
            Err(RuleError::TriedToReRegisterRule("pay_tax".to_owned())),
        );
    }

    #[test]
    fn pull_unregistered_rule_not_found() {
        let store = RuleStore::new();
        assert_eq!(
            store.pull_into_play("pay_tax"),
            Err(RuleError::RuleNotFound("pay_tax".to_owned())),
        );
    }

    #[test]
    fn pull_into_play_lifecycle() {
        let store = store_with(tax_rule(true));
        assert_eq!(store.is_in_play("pay_tax"), Ok(false));

        store.pull_into_play("pay_tax").unwrap();
        assert_eq!(store.is_in_play("pay_tax"), Ok(true));
        assert_eq!(
            store.pull_into_play("pay_tax"),
            Err(RuleError::RuleIsAlreadyInPlay("pay_tax".to_owned())),
        );

        store.pull_out_of_play("pay_tax").unwrap();
        assert_eq!(
            store.pull_out_of_play("pay_tax"),
            Err(RuleError::RuleIsNotInPlay("pay_tax".to_owned())),
        );
        store.get_available("pay_tax").unwrap();
    }

    #[test]
    fn modify_immutable_leaves_rule_unchanged() {
        let store = store_with(tax_rule(false));
        let before = store.get_available("pay_tax");

        let result = store.modify("pay_tax", vec![vec![2.0, -1.0, 0.0]], vec![Operator::Equal]);

        assert_eq!(
            result,
            Err(RuleError::RuleRequestedForModificationWasImmutable("pay_tax".to_owned())),
        );
        assert_eq!(store.get_available("pay_tax"), before);
    }

    #[test]
    fn modify_with_wrong_column_count_rejected() {
        let store = store_with(tax_rule(true));
        let before = store.get_available("pay_tax");

        let result = store.modify("pay_tax", vec![vec![1.0, -1.0]], vec![Operator::Equal]);

        assert_eq!(
            result,
            Err(RuleError::ModifiedRuleMatrixDimensionMismatch {
                rule: "pay_tax".to_owned(),
                expected: 3,
                actual: 2,
            }),
        );
        assert_eq!(store.get_available("pay_tax"), before);
    }

    #[test]
    fn modify_with_wrong_operator_count_rejected() {
        let store = store_with(tax_rule(true));
        let before = store.get_available("pay_tax");

        let result = store.modify(
            "pay_tax",
            vec![vec![1.0, -1.0, 0.0], vec![1.0, 0.0, 0.0]],
            vec![Operator::Equal],
        );

        assert_eq!(
            result,
            Err(RuleError::AuxVectorDimensionMismatch {
                rule: "pay_tax".to_owned(),
                rows: 2,
                operators: 1,
            }),
        );
        assert_eq!(store.get_available("pay_tax"), before);
    }

    #[test]
    fn modify_refreshes_in_play_copy() {
        let store = store_with(tax_rule(true));
        store.pull_into_play("pay_tax").unwrap();

        store
            .modify(
                "pay_tax",
                vec![vec![1.0, -1.0, 0.0], vec![1.0, 0.0, -5.0]],
                vec![Operator::Equal, Operator::GreaterEqual],
            )
            .unwrap();

        let in_play = store.get_in_play("pay_tax").unwrap();
        assert_eq!(in_play.row_count(), 2);
        assert_eq!(in_play, store.get_available("pay_tax").unwrap());
    }

    #[test]
    fn modify_unknown_rule_not_found() {
        let store = RuleStore::new();
        assert_eq!(
            store.modify("ghost", vec![vec![1.0]], vec![Operator::Equal]),
            Err(RuleError::RuleNotFound("ghost".to_owned())),
        );
    }

    #[test]
    fn rules_by_variable_only_lists_in_play() {
        let store = store_with(tax_rule(true));
        assert_eq!(
            store.rules_by_variable(VariableName::IslandTaxContribution),
            Ok(Vec::new()),
        );
        store.pull_into_play("pay_tax").unwrap();
        assert_eq!(
            store.rules_by_variable(VariableName::IslandTaxContribution),
            Ok(vec!["pay_tax".to_owned()]),
        );
        assert_eq!(store.rules_by_variable(VariableName::VoteCalled), Ok(Vec::new()));
    }

    #[test]
    fn evaluation_uses_requested_catalog() {
        let store = store_with(tax_rule(true));
        let snapshot = VariableSnapshot::new()
            .with(VariableName::IslandTaxContribution, vec![10.0])
            .with(VariableName::ExpectedTaxContribution, vec![8.0]);

        assert!(store.evaluate_available("pay_tax", &snapshot).unwrap().passes);
        assert_eq!(
            store.evaluate_in_play("pay_tax", &snapshot),
            Err(RuleError::RuleNotFound("pay_tax".to_owned())),
        );
    }

    #[test]
    fn linked_child_resolved_in_same_catalog() {
        let store = RuleStore::new();
        let parent = RuleMatrix::new(
            "taxed_when_alive",
            vec![VariableName::NumberOfIslandsAlive],
            vec![vec![1.0, 0.0]],
            vec![Operator::Greater],
            false,
        )
        .unwrap()
        .with_link("pay_tax", LinkType::ParentFailAutoPass);
        store.register(parent).unwrap();
        store.register(tax_rule(false)).unwrap();
        store.pull_into_play("taxed_when_alive").unwrap();

        let snapshot = VariableSnapshot::new()
            .with(VariableName::NumberOfIslandsAlive, vec![3.0])
            .with(VariableName::IslandTaxContribution, vec![1.0])
            .with(VariableName::ExpectedTaxContribution, vec![8.0]);

        assert_eq!(
            store.evaluate_in_play("taxed_when_alive", &snapshot),
            Err(RuleError::ChildRuleNotFound {
                rule: "taxed_when_alive".to_owned(),
                child: "pay_tax".to_owned(),
            }),
        );
        assert!(!store.evaluate_available("taxed_when_alive", &snapshot).unwrap().passes);
    }

    #[test]
    fn distance_measured_against_in_play_rules() {
        let store = store_with(tax_rule(true));
        let short = VariableSnapshot::new()
            .with(VariableName::IslandTaxContribution, vec![5.0])
            .with(VariableName::ExpectedTaxContribution, vec![8.0]);
        let policy = ChangeableSet::new().with(VariableName::IslandTaxContribution);

        assert_eq!(
            store.distance_from_rule_space(&short, &policy).unwrap(),
            RuleSpaceDistance::Compliant,
        );

        store.pull_into_play("pay_tax").unwrap();
        let distance = store.distance_from_rule_space(&short, &policy).unwrap();
        let expected = 3.0 / 2.0_f64.sqrt();
        assert!(matches!(distance, RuleSpaceDistance::Distance(d) if (d - expected).abs() < 1e-12));
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let store = Arc::new(store_with(tax_rule(true)));
        store.pull_into_play("pay_tax").unwrap();
        let snapshot = VariableSnapshot::new()
            .with(VariableName::IslandTaxContribution, vec![10.0])
            .with(VariableName::ExpectedTaxContribution, vec![8.0]);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let snapshot = snapshot.clone();
                thread::spawn(move || {
                    (0..100).all(|_| store.evaluate_in_play("pay_tax", &snapshot).is_ok())
                })
            })
            .collect();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..100).all(|i| {
                    let constant = if i % 2 == 0 { 0.0 } else { -1.0 };
                    let rows = vec![vec![1.0, -1.0, constant]];
                    store.modify("pay_tax", rows, vec![Operator::GreaterEqual]).is_ok()
                })
            })
        };

        for reader in readers {
            assert!(reader.join().unwrap());
        }
        assert!(writer.join().unwrap());
    }
}
