//! A name-ordered collection of rules.
//!
//! The rule store keeps two of these (Available and `InPlay`). Evaluation
//! resolves a rule and any linked children within a single catalog.

use std::collections::BTreeMap;

use serde::Serialize;

use accord_types::VariableName;

use crate::RuleMatrix;

/// Rules keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuleCatalog {
    rules: BTreeMap<String, RuleMatrix>,
}

impl RuleCatalog {
    /// Create an empty catalog.
    pub const fn new() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Insert a rule, replacing and returning any rule with the same name.
    pub fn insert(&mut self, rule: RuleMatrix) -> Option<RuleMatrix> {
        self.rules.insert(rule.name().to_owned(), rule)
    }

    /// Remove a rule by name.
    pub fn remove(&mut self, name: &str) -> Option<RuleMatrix> {
        self.rules.remove(name)
    }

    /// Look up a rule by name.
    pub fn get(&self, name: &str) -> Option<&RuleMatrix> {
        self.rules.get(name)
    }

    /// Return whether a rule with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Return the number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Return whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over rules in name order.
    pub fn rules(&self) -> impl Iterator<Item = &RuleMatrix> {
        self.rules.values()
    }

    /// Iterate over rule names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Names of rules that read `variable`, in name order.
    pub fn names_referencing(&self, variable: VariableName) -> Vec<String> {
        self.rules
            .values()
            .filter(|rule| rule.references(variable))
            .map(|rule| rule.name().to_owned())
            .collect()
    }
}

impl FromIterator<RuleMatrix> for RuleCatalog {
    fn from_iter<I: IntoIterator<Item = RuleMatrix>>(iter: I) -> Self {
        Self {
            rules: iter
                .into_iter()
                .map(|rule| (rule.name().to_owned(), rule))
                .collect(),
        }
    }
}
