//! Variable values: the long-lived store and the per-call snapshot.
//!
//! The surrounding simulation owns variable lifetime. It registers every
//! variable once at setup, refreshes values each turn through
//! [`VariableStore::update`], and hands the engine a [`VariableSnapshot`]
//! copy. Engine calls only ever read a snapshot; adjusted results are new
//! snapshots.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{VariableError, VariableName};

// ---------------------------------------------------------------------------
// VariableSnapshot
// ---------------------------------------------------------------------------

/// An owned mapping from variable name to its current values.
///
/// Snapshots are cheap to build in tests via [`VariableSnapshot::with`] and
/// are the input type of every evaluator, recommender, and solver call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableSnapshot {
    values: BTreeMap<VariableName, Vec<f64>>,
}

impl VariableSnapshot {
    /// Create an empty snapshot.
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert, returning the updated snapshot.
    #[must_use]
    pub fn with(mut self, name: VariableName, values: Vec<f64>) -> Self {
        self.values.insert(name, values);
        self
    }

    /// Insert or overwrite the values of a variable.
    pub fn insert(&mut self, name: VariableName, values: Vec<f64>) {
        self.values.insert(name, values);
    }

    /// Return the values of a variable, if present.
    pub fn get(&self, name: VariableName) -> Option<&[f64]> {
        self.values.get(&name).map(Vec::as_slice)
    }

    /// Return whether a variable is present.
    pub fn contains(&self, name: VariableName) -> bool {
        self.values.contains_key(&name)
    }

    /// Return the number of variables in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return whether the snapshot holds no variables.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, values)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (VariableName, &[f64])> {
        self.values.iter().map(|(name, values)| (*name, values.as_slice()))
    }

    /// Return the names from `required` that this snapshot lacks, in the
    /// order given.
    pub fn missing(&self, required: &[VariableName]) -> Vec<VariableName> {
        required
            .iter()
            .copied()
            .filter(|name| !self.contains(*name))
            .collect()
    }
}

impl From<BTreeMap<VariableName, Vec<f64>>> for VariableSnapshot {
    fn from(values: BTreeMap<VariableName, Vec<f64>>) -> Self {
        Self { values }
    }
}

impl FromIterator<(VariableName, Vec<f64>)> for VariableSnapshot {
    fn from_iter<I: IntoIterator<Item = (VariableName, Vec<f64>)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// VariableStore
// ---------------------------------------------------------------------------

/// The registry of live variable values.
///
/// Enforces that a variable is registered exactly once and that its arity
/// (number of values) never changes afterwards. Rules are authored against
/// the arity at registration time.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    values: BTreeMap<VariableName, Vec<f64>>,
}

impl VariableStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Register a new variable with its initial values.
    ///
    /// # Errors
    ///
    /// Returns [`VariableError::AlreadyRegistered`] if the name is taken.
    pub fn register(&mut self, name: VariableName, values: Vec<f64>) -> Result<(), VariableError> {
        if self.values.contains_key(&name) {
            return Err(VariableError::AlreadyRegistered(name));
        }
        debug!(variable = %name, arity = values.len(), "variable registered");
        self.values.insert(name, values);
        Ok(())
    }

    /// Replace the values of a registered variable.
    ///
    /// # Errors
    ///
    /// Returns [`VariableError::NotRegistered`] if the variable is unknown
    /// to this store, or [`VariableError::ArityMismatch`] if the new values
    /// have a different length.
    pub fn update(&mut self, name: VariableName, values: Vec<f64>) -> Result<(), VariableError> {
        let slot = self
            .values
            .get_mut(&name)
            .ok_or(VariableError::NotRegistered(name))?;
        if slot.len() != values.len() {
            return Err(VariableError::ArityMismatch {
                name,
                expected: slot.len(),
                actual: values.len(),
            });
        }
        *slot = values;
        Ok(())
    }

    /// Return the values of a registered variable.
    pub fn get(&self, name: VariableName) -> Option<&[f64]> {
        self.values.get(&name).map(Vec::as_slice)
    }

    /// Return the registered arity of a variable.
    pub fn arity(&self, name: VariableName) -> Option<usize> {
        self.values.get(&name).map(Vec::len)
    }

    /// Return whether a variable is registered.
    pub fn contains(&self, name: VariableName) -> bool {
        self.values.contains_key(&name)
    }

    /// Return the number of registered variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Return whether no variables are registered.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy the current values into an owned snapshot.
    pub fn snapshot(&self) -> VariableSnapshot {
        VariableSnapshot::from(self.values.clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn register_then_get() {
        let mut store = VariableStore::new();
        store.register(VariableName::NumberOfIslandsAlive, vec![6.0]).unwrap();
        assert_eq!(store.get(VariableName::NumberOfIslandsAlive), Some(&[6.0][..]));
        assert_eq!(store.arity(VariableName::NumberOfIslandsAlive), Some(1));
    }

    #[test]
    fn double_registration_rejected() {
        let mut store = VariableStore::new();
        store.register(VariableName::VoteCalled, vec![0.0]).unwrap();
        let result = store.register(VariableName::VoteCalled, vec![1.0]);
        assert_eq!(result, Err(VariableError::AlreadyRegistered(VariableName::VoteCalled)));
        assert_eq!(store.get(VariableName::VoteCalled), Some(&[0.0][..]));
    }

    #[test]
    fn update_keeps_arity() {
        let mut store = VariableStore::new();
        store.register(VariableName::IslandsAlive, vec![1.0, 1.0, 0.0]).unwrap();

        store.update(VariableName::IslandsAlive, vec![1.0, 0.0, 0.0]).unwrap();
        let result = store.update(VariableName::IslandsAlive, vec![1.0]);
        assert_eq!(
            result,
            Err(VariableError::ArityMismatch {
                name: VariableName::IslandsAlive,
                expected: 3,
                actual: 1,
            }),
        );
        assert_eq!(store.get(VariableName::IslandsAlive), Some(&[1.0, 0.0, 0.0][..]));
    }

    #[test]
    fn update_unregistered_rejected() {
        let mut store = VariableStore::new();
        let result = store.update(VariableName::JudgeSalary, vec![5.0]);
        assert_eq!(result, Err(VariableError::NotRegistered(VariableName::JudgeSalary)));
    }

    #[test]
    fn snapshot_is_detached_copy() {
        let mut store = VariableStore::new();
        store.register(VariableName::SpeakerSalary, vec![10.0]).unwrap();
        let snapshot = store.snapshot();
        store.update(VariableName::SpeakerSalary, vec![20.0]).unwrap();

        assert_eq!(snapshot.get(VariableName::SpeakerSalary), Some(&[10.0][..]));
    }

    #[test]
    fn missing_reports_absent_names_in_order() {
        let snapshot = VariableSnapshot::new().with(VariableName::VoteCalled, vec![1.0]);
        let missing = snapshot.missing(&[
            VariableName::RuleSelected,
            VariableName::VoteCalled,
            VariableName::NumberOfBallotsCast,
        ]);
        assert_eq!(
            missing,
            vec![VariableName::RuleSelected, VariableName::NumberOfBallotsCast],
        );
    }

    #[test]
    fn snapshot_serializes_as_plain_map() {
        let snapshot = VariableSnapshot::new().with(VariableName::TestVariable, vec![1.5]);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, "{\"test_variable\":[1.5]}");
    }
}
