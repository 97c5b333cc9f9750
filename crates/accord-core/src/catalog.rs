//! The built-in rule catalog.
//!
//! A representative table covering the island roles: living-island
//! bookkeeping, votes, salaries, tax and allocation, and sanctions. Every
//! in-play rule holds against the table's own initial values.

use crate::{ConfigError, RulesConfig};

/// The built-in rule table as YAML.
pub const BUILTIN_RULES: &str = include_str!("../config/default-rules.yaml");

impl RulesConfig {
    /// Parse the built-in rule table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the embedded table is malformed.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::parse(BUILTIN_RULES)
    }
}
