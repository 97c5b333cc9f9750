//! Rule tables loaded from YAML.
//!
//! A rule table declares the variables a game starts with, which of them
//! repair may adjust, and the rules themselves:
//!
//! ```yaml
//! variables:
//!   number_of_ballots_cast: [5]
//! changeable:
//!   - number_of_ballots_cast
//! rules:
//!   - name: six_ballots
//!     variables: [number_of_ballots_cast]
//!     matrix:
//!       - [1, -6]
//!     operators: [0]
//!     in_play: true
//! ```
//!
//! Operator codes are validated when a [`RuleConfig`] is turned into a
//! [`RuleMatrix`], not at parse time, so a table with a bad code still
//! parses and the error names the offending code.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use accord_rules::{LinkType, Operator, RuleError, RuleMatrix};
use accord_types::{ChangeableSet, VariableError, VariableName};

/// Errors that can occur when loading or applying a rule table.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The rule table file could not be opened or read as UTF-8 text.
    #[error("cannot read rule table file: {source}")]
    Io {
        /// Error from reading the table file.
        #[from]
        source: std::io::Error,
    },

    /// The table text is not a rule table: malformed YAML, an unknown
    /// variable wire name, or a field of the wrong shape.
    #[error("rule table does not match the table schema: {source}")]
    Yaml {
        /// Deserializer error, carrying the offending line and column.
        source: serde_yml::Error,
    },

    /// A rule in the table is invalid or clashes with the store.
    #[error("invalid rule in table: {0}")]
    Rule(#[from] RuleError),

    /// A variable in the table clashes with the store.
    #[error("invalid variable in table: {0}")]
    Variable(#[from] VariableError),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// A complete rule table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RulesConfig {
    /// Initial values, keyed by variable wire name.
    #[serde(default)]
    pub variables: BTreeMap<VariableName, Vec<f64>>,

    /// Variables repair is allowed to adjust.
    #[serde(default)]
    pub changeable: Vec<VariableName>,

    /// Rule definitions, registered in order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RulesConfig {
    /// Load a rule table from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the contents are not a valid rule table.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yml::from_str(&contents)?;
        Ok(config)
    }

    /// Parse a rule table from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not a valid rule
    /// table.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// The `changeable` list as a repair policy.
    pub fn changeable_set(&self) -> ChangeableSet {
        self.changeable.iter().copied().collect()
    }

    /// Build every rule in the table, in order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RuleError`] from [`RuleConfig::to_rule`].
    pub fn build_rules(&self) -> Result<Vec<RuleMatrix>, RuleError> {
        self.rules.iter().map(RuleConfig::to_rule).collect()
    }
}

/// One rule as written in a table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleConfig {
    /// Unique rule name.
    pub name: String,

    /// Required variables, in formal-vector order.
    pub variables: Vec<VariableName>,

    /// Coefficient rows, each ending with the constant column.
    pub matrix: Vec<Vec<f64>>,

    /// Operator codes, one per row.
    pub operators: Vec<i64>,

    /// Whether the store may later replace the matrix.
    #[serde(default)]
    pub mutable: bool,

    /// Optional fallback link.
    #[serde(default)]
    pub link: Option<LinkConfig>,

    /// Whether the rule starts in play.
    #[serde(default)]
    pub in_play: bool,
}

impl RuleConfig {
    /// Validate operator codes and build the rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::AuxCodeOutOfRange`] for an unknown operator
    /// code, or any construction error from [`RuleMatrix::new`].
    pub fn to_rule(&self) -> Result<RuleMatrix, RuleError> {
        let operators = self
            .operators
            .iter()
            .map(|code| Operator::try_from(*code))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rule = RuleMatrix::new(
            self.name.clone(),
            self.variables.clone(),
            self.matrix.clone(),
            operators,
            self.mutable,
        )?;

        if let Some(link) = &self.link {
            rule = rule.with_link(link.child.clone(), link.link_type);
        }
        Ok(rule)
    }
}

/// A link as written in a table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkConfig {
    /// Name of the child rule.
    pub child: String,

    /// How parent and child combine.
    #[serde(default = "default_link_type")]
    pub link_type: LinkType,
}

const fn default_link_type() -> LinkType {
    LinkType::ParentFailAutoPass
}
