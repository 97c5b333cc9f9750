//! Shared type definitions for the Accord rule engine.
//!
//! Rules in Accord are affine systems over named numeric variables. This
//! crate owns the vocabulary those rules are written in and the containers
//! that carry variable values into every engine call.
//!
//! # Modules
//!
//! - [`variables`] -- The closed set of known [`VariableName`]s.
//! - [`store`] -- [`VariableStore`] (registered, arity-checked values) and
//!   [`VariableSnapshot`] (the per-call immutable input).
//! - [`policy`] -- [`ChangeablePolicy`]: which variables the repair
//!   algorithms may touch.

pub mod policy;
pub mod store;
pub mod variables;

// Re-export primary types at crate root.
pub use policy::{ChangeablePolicy, ChangeableSet, DefaultChangeablePolicy};
pub use store::{VariableSnapshot, VariableStore};
pub use variables::VariableName;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when registering or updating variables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariableError {
    /// The variable has already been registered in this store.
    #[error("variable already registered: {0}")]
    AlreadyRegistered(VariableName),

    /// The variable has not been registered in this store.
    #[error("variable not registered: {0}")]
    NotRegistered(VariableName),

    /// An update tried to change the number of values a variable holds.
    #[error("arity mismatch for {name}: registered with {expected} values, got {actual}")]
    ArityMismatch {
        /// The variable being updated.
        name: VariableName,
        /// The arity the variable was registered with.
        expected: usize,
        /// The arity of the rejected update.
        actual: usize,
    },

    /// A variable name string did not match any known variable.
    #[error("unknown variable name: {0}")]
    UnknownVariable(String),
}
