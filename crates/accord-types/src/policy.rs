//! Which variables the repair algorithms are allowed to adjust.
//!
//! Compliance repair proposes new variable values. Most variables describe
//! facts about the world (how many islands are alive, how many ballots were
//! cast) that no single agent can change, so repair treats them as fixed.
//! A [`ChangeablePolicy`] answers, per variable, whether it is free.
//!
//! The policy is injected into every repair call so that different
//! simulation setups and test harnesses can supply their own table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::VariableName;

/// Decides whether repair may change a variable's values.
pub trait ChangeablePolicy {
    /// Return `true` if repair may adjust `name`.
    fn is_changeable(&self, name: VariableName) -> bool;
}

impl<P: ChangeablePolicy + ?Sized> ChangeablePolicy for &P {
    fn is_changeable(&self, name: VariableName) -> bool {
        (**self).is_changeable(name)
    }
}

// ---------------------------------------------------------------------------
// DefaultChangeablePolicy
// ---------------------------------------------------------------------------

/// The stock policy: role salaries, role payments, and an island's own
/// declared contributions are free; everything else is fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultChangeablePolicy;

impl ChangeablePolicy for DefaultChangeablePolicy {
    fn is_changeable(&self, name: VariableName) -> bool {
        matches!(
            name,
            VariableName::SpeakerSalary
                | VariableName::JudgeSalary
                | VariableName::PresidentSalary
                | VariableName::SpeakerPayment
                | VariableName::JudgePayment
                | VariableName::PresidentPayment
                | VariableName::IslandTaxContribution
                | VariableName::IslandAllocation
                | VariableName::SanctionPaid
        )
    }
}

// ---------------------------------------------------------------------------
// ChangeableSet
// ---------------------------------------------------------------------------

/// An explicit set of changeable variables, typically loaded from
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeableSet {
    names: BTreeSet<VariableName>,
}

impl ChangeableSet {
    /// Create a set where nothing is changeable.
    pub const fn new() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Create a set where every known variable is changeable.
    pub fn all() -> Self {
        VariableName::ALL.iter().copied().collect()
    }

    /// Mark a variable as changeable.
    pub fn allow(&mut self, name: VariableName) {
        self.names.insert(name);
    }

    /// Builder-style [`allow`](Self::allow).
    #[must_use]
    pub fn with(mut self, name: VariableName) -> Self {
        self.names.insert(name);
        self
    }

    /// Return the number of changeable variables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Return whether no variable is changeable.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<VariableName> for ChangeableSet {
    fn from_iter<I: IntoIterator<Item = VariableName>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

impl ChangeablePolicy for ChangeableSet {
    fn is_changeable(&self, name: VariableName) -> bool {
        self.names.contains(&name)
    }
}
