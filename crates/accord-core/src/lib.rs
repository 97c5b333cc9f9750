//! Rule tables and store setup for the Accord rule engine.
//!
//! This crate turns YAML rule tables into populated stores. The engine
//! itself lives in `accord-rules`; nothing here evaluates or repairs rules
//! beyond delegating to it.
//!
//! # Modules
//!
//! - [`config`] -- Typed rule tables loaded from YAML.
//! - [`catalog`] -- The built-in rule table.
//! - [`setup`] -- [`Registry`]: a rule store, variable store, and repair
//!   policy built from one table.

pub mod catalog;
pub mod config;
pub mod setup;

pub use catalog::BUILTIN_RULES;
pub use config::{ConfigError, LinkConfig, RuleConfig, RulesConfig};
pub use setup::Registry;
