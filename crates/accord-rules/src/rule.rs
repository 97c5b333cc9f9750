//! Rule definitions.
//!
//! A [`RuleMatrix`] is a named affine constraint system. Its coefficient
//! matrix has one row per constraint and one column per slot of the formal
//! vector: every value of every required variable, in declared order,
//! followed by a constant column multiplied by `1.0`.
//!
//! ```text
//! required = [ballots_cast (1), islands_alive (3)]
//! formal   = [b, a0, a1, a2, 1]
//! row      = [c0, c1, c2, c3, k]   ->   c0*b + c1*a0 + c2*a1 + c3*a2 + k
//! ```
//!
//! Rules are validated on construction and never mutated in place; the
//! store's modify operation swaps in a rebuilt rule.

use serde::{Deserialize, Serialize};

use accord_types::{VariableName, VariableSnapshot};

use crate::{Operator, RuleError};

// ---------------------------------------------------------------------------
// Links
// ---------------------------------------------------------------------------

/// How a parent rule's result combines with its linked child rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// If the parent's own rows fail, the rule passes outright; otherwise
    /// the child's result is the rule's result.
    ParentFailAutoPass,
}

/// A link from a rule to a fallback child rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLink {
    /// Name of the child rule, resolved in the same catalog as the parent.
    pub child: String,
    /// How the parent and child results combine.
    pub link_type: LinkType,
}

// ---------------------------------------------------------------------------
// RuleMatrix
// ---------------------------------------------------------------------------

/// A validated rule: required variables, coefficient matrix, per-row
/// operators, mutability, and an optional link.
///
/// Invariants upheld by every constructor:
/// - at least one row;
/// - every row has the same number of columns, and at least one (the
///   constant column);
/// - one operator per row;
/// - at most one [`Operator::RealValued`] row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleMatrix {
    name: String,
    required_variables: Vec<VariableName>,
    coefficients: Vec<Vec<f64>>,
    operators: Vec<Operator>,
    mutable: bool,
    link: Option<RuleLink>,
}

impl RuleMatrix {
    /// Build and validate a rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::EmptyRule`], [`RuleError::RaggedMatrix`],
    /// [`RuleError::AuxVectorDimensionMismatch`], or
    /// [`RuleError::MultipleRealValuedRows`] if the system is malformed.
    pub fn new(
        name: impl Into<String>,
        required_variables: Vec<VariableName>,
        coefficients: Vec<Vec<f64>>,
        operators: Vec<Operator>,
        mutable: bool,
    ) -> Result<Self, RuleError> {
        let name = name.into();
        validate_system(&name, &coefficients, &operators)?;
        Ok(Self {
            name,
            required_variables,
            coefficients,
            operators,
            mutable,
            link: None,
        })
    }

    /// Attach a link to a child rule.
    #[must_use]
    pub fn with_link(mut self, child: impl Into<String>, link_type: LinkType) -> Self {
        self.link = Some(RuleLink {
            child: child.into(),
            link_type,
        });
        self
    }

    /// Return a copy of this rule with a replacement system, keeping name,
    /// variables, mutability, and link.
    pub(crate) fn with_system(
        &self,
        coefficients: Vec<Vec<f64>>,
        operators: Vec<Operator>,
    ) -> Result<Self, RuleError> {
        validate_system(&self.name, &coefficients, &operators)?;
        Ok(Self {
            name: self.name.clone(),
            required_variables: self.required_variables.clone(),
            coefficients,
            operators,
            mutable: self.mutable,
            link: self.link.clone(),
        })
    }

    /// The rule's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The variables this rule reads, in formal-vector order.
    pub fn required_variables(&self) -> &[VariableName] {
        &self.required_variables
    }

    /// The coefficient matrix, row-major.
    pub fn coefficients(&self) -> &[Vec<f64>] {
        &self.coefficients
    }

    /// The operator of each row.
    pub fn operators(&self) -> &[Operator] {
        &self.operators
    }

    /// Whether the store may later replace this rule's system.
    pub const fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// The link to a child rule, if any.
    pub const fn link(&self) -> Option<&RuleLink> {
        self.link.as_ref()
    }

    /// Number of constraint rows.
    pub fn row_count(&self) -> usize {
        self.coefficients.len()
    }

    /// Number of columns, including the constant column.
    pub fn column_count(&self) -> usize {
        self.coefficients.first().map_or(0, Vec::len)
    }

    /// Index of the real-valued row, if the rule has one.
    pub fn real_valued_row(&self) -> Option<usize> {
        self.operators.iter().position(|op| op.is_real_valued())
    }

    /// Whether evaluation of this rule yields a real value.
    pub fn is_real_valued(&self) -> bool {
        self.real_valued_row().is_some()
    }

    /// Whether the rule reads `name`.
    pub fn references(&self, name: VariableName) -> bool {
        self.required_variables.contains(&name)
    }

    /// Check the column count against the arity of each required variable
    /// as reported by `arity_of`.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MissingVariables`] if `arity_of` knows nothing
    /// about some required variable, or [`RuleError::DimensionMismatch`] if
    /// the summed arity plus the constant column differs from the column
    /// count.
    pub fn check_arity<F>(&self, arity_of: F) -> Result<(), RuleError>
    where
        F: Fn(VariableName) -> Option<usize>,
    {
        let missing: Vec<VariableName> = self
            .required_variables
            .iter()
            .copied()
            .filter(|name| arity_of(*name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(RuleError::MissingVariables {
                rule: self.name.clone(),
                missing,
            });
        }
        let slots = self
            .required_variables
            .iter()
            .filter_map(|name| arity_of(*name))
            .fold(0_usize, usize::saturating_add);
        self.check_columns(slots.saturating_add(1))
    }

    /// Build the formal vector for this rule from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError::MissingVariables`] if a required variable is
    /// absent, or [`RuleError::DimensionMismatch`] if the concatenated
    /// values plus the constant do not match the column count.
    pub fn formal_vector(&self, snapshot: &VariableSnapshot) -> Result<Vec<f64>, RuleError> {
        let missing = snapshot.missing(&self.required_variables);
        if !missing.is_empty() {
            return Err(RuleError::MissingVariables {
                rule: self.name.clone(),
                missing,
            });
        }

        let mut formal: Vec<f64> = self
            .required_variables
            .iter()
            .filter_map(|name| snapshot.get(*name))
            .flat_map(|values| values.iter().copied())
            .collect();
        formal.push(1.0);

        self.check_columns(formal.len())?;
        Ok(formal)
    }

    /// Apply every row to a formal vector, pairing each value with its
    /// scale (see [`scaled_dot`]).
    pub(crate) fn row_values(&self, formal: &[f64]) -> Vec<(f64, f64)> {
        self.coefficients.iter().map(|row| scaled_dot(row, formal)).collect()
    }

    fn check_columns(&self, actual: usize) -> Result<(), RuleError> {
        let expected = self.column_count();
        if expected == actual {
            Ok(())
        } else {
            Err(RuleError::DimensionMismatch {
                rule: self.name.clone(),
                expected,
                actual,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate the shape of a coefficient matrix and its operators.
fn validate_system(
    name: &str,
    coefficients: &[Vec<f64>],
    operators: &[Operator],
) -> Result<(), RuleError> {
    let Some(first) = coefficients.first() else {
        return Err(RuleError::EmptyRule(name.to_owned()));
    };

    let expected = first.len();
    for (row, values) in coefficients.iter().enumerate() {
        if values.is_empty() || values.len() != expected {
            return Err(RuleError::RaggedMatrix {
                rule: name.to_owned(),
                row,
                expected,
                actual: values.len(),
            });
        }
    }

    if operators.len() != coefficients.len() {
        return Err(RuleError::AuxVectorDimensionMismatch {
            rule: name.to_owned(),
            rows: coefficients.len(),
            operators: operators.len(),
        });
    }

    if operators.iter().filter(|op| op.is_real_valued()).count() > 1 {
        return Err(RuleError::MultipleRealValuedRows(name.to_owned()));
    }

    Ok(())
}

/// Dot product over the common prefix of two slices.
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Dot product together with `sum |a_i * b_i|`, the magnitude an
/// [`Operator`] judges the result against.
pub(crate) fn scaled_dot(a: &[f64], b: &[f64]) -> (f64, f64) {
    a.iter().zip(b).fold((0.0, 0.0), |(sum, scale), (x, y)| {
        let term = x * y;
        (sum + term, scale + term.abs())
    })
}

/// Evaluate one row against a point that excludes the constant slot:
/// `row[..n] . point + row[n]`, with its scale.
pub(crate) fn affine(row: &[f64], point: &[f64]) -> (f64, f64) {
    let constant = row.get(point.len()).copied().unwrap_or(0.0);
    let (value, scale) = scaled_dot(row, point);
    (value + constant, scale + constant.abs())
}
