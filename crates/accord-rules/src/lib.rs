//! Rule store, evaluation, and compliance repair for the Accord engine.
//!
//! A rule is an affine constraint system over named variables. Each row of
//! its coefficient matrix is applied to the *formal vector* (the rule's
//! required variables concatenated in order, followed by a constant `1.0`)
//! and the resulting scalar is compared against zero by the row's
//! [`Operator`].
//!
//! # Modules
//!
//! - [`operator`] -- Per-row comparison semantics and wire codes.
//! - [`rule`] -- [`RuleMatrix`]: a validated rule definition with optional
//!   link to a fallback rule.
//! - [`catalog`] -- [`RuleCatalog`]: a name-ordered collection of rules.
//! - [`store`] -- [`RuleStore`]: the Available / `InPlay` catalogs behind
//!   read-write locks.
//! - [`evaluate`] -- Pass/fail (and real-valued) evaluation, including
//!   linked rules.
//! - [`recommend`] -- Greedy single-pass repair of violated rows.
//! - [`projection`] -- Nearest compliant point by hyperplane projection,
//!   for one rule or a whole rule set.
//! - [`sanction`] -- Extraction of a penalty amount from a real-valued rule.
//!
//! # Usage
//!
//! ```
//! use accord_rules::{Operator, RuleError, RuleMatrix, RuleStore};
//! use accord_types::{VariableName, VariableSnapshot};
//!
//! # fn main() -> Result<(), RuleError> {
//! let store = RuleStore::new();
//! let rule = RuleMatrix::new(
//!     "six_ballots",
//!     vec![VariableName::NumberOfBallotsCast],
//!     vec![vec![1.0, -6.0]],
//!     vec![Operator::Equal],
//!     false,
//! )?;
//! store.register(rule)?;
//! store.pull_into_play("six_ballots")?;
//!
//! let snapshot = VariableSnapshot::new().with(VariableName::NumberOfBallotsCast, vec![6.0]);
//! let evaluation = store.evaluate_in_play("six_ballots", &snapshot)?;
//! assert!(evaluation.passes);
//! # Ok(())
//! # }
//! ```
//!
//! No operation panics on ordinary misuse; every failure is a [`RuleError`].

pub mod catalog;
pub mod evaluate;
mod layout;
pub mod operator;
pub mod projection;
pub mod recommend;
pub mod rule;
pub mod sanction;
pub mod store;

// Re-export primary types at crate root.
pub use catalog::RuleCatalog;
pub use evaluate::{Evaluation, compliance_check, evaluate, evaluate_rule};
pub use operator::Operator;
pub use projection::{
    Approach, Hyperplane, RuleSpaceDistance, closest_approach, distance_from_rule_space,
    rule_distance,
};
pub use recommend::{Recommendation, recommend};
pub use rule::{LinkType, RuleLink, RuleMatrix};
pub use sanction::evaluate_sanction;
pub use store::RuleStore;

use accord_types::VariableName;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by rule construction, the rule store, and evaluation.
///
/// None of these abort the caller's turn: a failed evaluation or repair
/// means compliance could not be determined this turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The requested rule is absent from the catalog being queried.
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    /// One or more required variables are absent from the snapshot.
    #[error("rule {rule} is missing variables: {missing:?}")]
    MissingVariables {
        /// The rule being evaluated.
        rule: String,
        /// The required variables the snapshot lacks.
        missing: Vec<VariableName>,
    },

    /// The formal vector length disagrees with the matrix column count.
    #[error("rule {rule} expects {expected} columns but the formal vector has {actual}")]
    DimensionMismatch {
        /// The rule being evaluated.
        rule: String,
        /// The coefficient matrix column count.
        expected: usize,
        /// The formal vector length.
        actual: usize,
    },

    /// A raw operator code outside the defined set was supplied.
    #[error("operator code {code} is out of range (expected 0..=4)")]
    AuxCodeOutOfRange {
        /// The offending code.
        code: i64,
    },

    /// A linked rule's child is absent from the catalog.
    #[error("rule {rule} links to missing child rule {child}")]
    ChildRuleNotFound {
        /// The parent rule.
        rule: String,
        /// The missing child rule name.
        child: String,
    },

    /// A chain of links revisits a rule.
    #[error("link cycle detected at rule {0}")]
    LinkCycle(String),

    /// A rule with this name is already registered.
    #[error("rule already registered: {0}")]
    TriedToReRegisterRule(String),

    /// The rule is already in play.
    #[error("rule is already in play: {0}")]
    RuleIsAlreadyInPlay(String),

    /// The rule is not in play.
    #[error("rule is not in play: {0}")]
    RuleIsNotInPlay(String),

    /// A modification changed the coefficient matrix column count.
    #[error("modified matrix for {rule} has {actual} columns, expected {expected}")]
    ModifiedRuleMatrixDimensionMismatch {
        /// The rule being modified.
        rule: String,
        /// The column count of the stored rule.
        expected: usize,
        /// The column count of the offending row.
        actual: usize,
    },

    /// A modification's operator count does not match its row count.
    #[error("modified operators for {rule}: {operators} operators for {rows} rows")]
    AuxVectorDimensionMismatch {
        /// The rule being modified.
        rule: String,
        /// Number of matrix rows.
        rows: usize,
        /// Number of operators supplied.
        operators: usize,
    },

    /// The rule was registered as immutable.
    #[error("rule is immutable: {0}")]
    RuleRequestedForModificationWasImmutable(String),

    /// A rule definition has no rows.
    #[error("rule {0} has no rows")]
    EmptyRule(String),

    /// A rule definition's rows differ in length, or lack a constant column.
    #[error("rule {rule} row {row} has {actual} columns, expected {expected}")]
    RaggedMatrix {
        /// The rule being defined.
        rule: String,
        /// Index of the offending row.
        row: usize,
        /// The column count of the first row.
        expected: usize,
        /// The column count of the offending row.
        actual: usize,
    },

    /// A rule definition has more than one real-valued row.
    #[error("rule {0} has more than one real-valued row")]
    MultipleRealValuedRows(String),

    /// A rule store lock was poisoned by a panicking writer.
    #[error("rule store lock poisoned")]
    StorePoisoned,
}
