//! Populating stores from a rule table.
//!
//! [`Registry::from_config`] registers the table's variables, checks every
//! rule's column count against the registered arities, registers the
//! rules, and then pulls the `in_play` ones into play. Activation happens
//! after every rule is registered so a table may list a linked parent
//! before its child.

use tracing::debug;

use accord_rules::{RuleError, RuleSpaceDistance, RuleStore};
use accord_types::{ChangeableSet, VariableSnapshot, VariableStore};

use crate::{ConfigError, RulesConfig};

/// A rule store, the variables it reads, and the repair policy, built
/// together from one table.
#[derive(Debug, Default)]
pub struct Registry {
    /// Available and in-play rules.
    pub rules: RuleStore,
    /// Current variable values.
    pub variables: VariableStore,
    /// Variables repair may adjust.
    pub changeable: ChangeableSet,
}

impl Registry {
    /// Build a registry from a parsed rule table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Variable`] if a variable is declared twice,
    /// or [`ConfigError::Rule`] if a rule is malformed, names an
    /// undeclared variable, has the wrong column count, is registered
    /// twice, or cannot be pulled into play.
    pub fn from_config(config: &RulesConfig) -> Result<Self, ConfigError> {
        let mut variables = VariableStore::new();
        for (name, values) in &config.variables {
            variables.register(*name, values.clone())?;
        }

        let rules = RuleStore::new();
        for rule in config.build_rules()? {
            rule.check_arity(|name| variables.arity(name))?;
            rules.register(rule)?;
        }

        for entry in config.rules.iter().filter(|entry| entry.in_play) {
            rules.pull_into_play(&entry.name)?;
        }

        debug!(
            variables = variables.len(),
            rules = config.rules.len(),
            in_play = config.rules.iter().filter(|entry| entry.in_play).count(),
            "registry populated"
        );

        Ok(Self {
            rules,
            variables,
            changeable: config.changeable_set(),
        })
    }

    /// Build a registry from the built-in rule table.
    ///
    /// # Errors
    ///
    /// See [`Registry::from_config`].
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_config(&RulesConfig::builtin()?)
    }

    /// Copy of the current variable values.
    pub fn snapshot(&self) -> VariableSnapshot {
        self.variables.snapshot()
    }

    /// Distance from the current values to satisfying every in-play rule,
    /// adjusting only changeable variables.
    ///
    /// # Errors
    ///
    /// Propagates any evaluation error from the in-play rules.
    pub fn distance_from_rule_space(&self) -> Result<RuleSpaceDistance, RuleError> {
        self.rules
            .distance_from_rule_space(&self.variables.snapshot(), &self.changeable)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use accord_types::{ChangeablePolicy, VariableName};

    #[test]
    fn builtin_registry_is_compliant() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.distance_from_rule_space(), Ok(RuleSpaceDistance::Compliant));
        assert!(registry.rules.is_in_play("vote_called_rule").unwrap());
        assert!(!registry.rules.is_in_play("vote_result_rule").unwrap());
    }

    #[test]
    fn parent_may_precede_child_in_table() {
        let yaml = r"
variables:
  vote_called: [1]
  number_of_ballots_cast: [6]
rules:
  - name: parent
    variables: [vote_called]
    matrix:
      - [1, -1]
    operators: [0]
    link:
      child: child
    in_play: true
  - name: child
    variables: [number_of_ballots_cast]
    matrix:
      - [1, -6]
    operators: [0]
    in_play: true
";
        let registry = Registry::from_config(&RulesConfig::parse(yaml).unwrap()).unwrap();
        let evaluation = registry.rules.evaluate_in_play("parent", &registry.snapshot()).unwrap();
        assert!(evaluation.passes);
    }

    #[test]
    fn undeclared_variable_rejected() {
        let yaml = r"
rules:
  - name: orphan
    variables: [judge_salary]
    matrix:
      - [1, 0]
    operators: [2]
";
        let result = RulesConfig::parse(yaml).and_then(|c| Registry::from_config(&c));
        assert!(matches!(
            result,
            Err(ConfigError::Rule(RuleError::MissingVariables { .. }))
        ));
    }

    #[test]
    fn column_count_checked_against_arity() {
        let yaml = r"
variables:
  islands_alive: [1, 1, 1]
rules:
  - name: too_narrow
    variables: [islands_alive]
    matrix:
      - [1, 1, 0]
    operators: [2]
";
        let result = RulesConfig::parse(yaml).and_then(|c| Registry::from_config(&c));
        assert!(matches!(
            result,
            Err(ConfigError::Rule(RuleError::DimensionMismatch {
                expected: 3,
                actual: 4,
                ..
            }))
        ));
    }

    #[test]
    fn duplicate_rule_rejected() {
        let yaml = r"
variables:
  vote_called: [0]
rules:
  - name: twice
    variables: [vote_called]
    matrix:
      - [1, 0]
    operators: [2]
  - name: twice
    variables: [vote_called]
    matrix:
      - [1, 0]
    operators: [2]
";
        let result = RulesConfig::parse(yaml).and_then(|c| Registry::from_config(&c));
        assert!(matches!(
            result,
            Err(ConfigError::Rule(RuleError::TriedToReRegisterRule(name))) if name == "twice"
        ));
    }

    #[test]
    fn changeable_comes_from_table() {
        let registry = Registry::builtin().unwrap();
        assert!(registry.changeable.is_changeable(VariableName::SanctionPaid));
        assert!(!registry.changeable.is_changeable(VariableName::JudgeSalary));
    }
}
