//! Per-row comparison semantics.
//!
//! Every row of a rule matrix produces one scalar. The row's [`Operator`]
//! says how that scalar is judged against zero. Rule tables carry operators
//! as integer codes; [`Operator::try_from`] is the only place an
//! out-of-range code can surface.
//!
//! | Code | Operator | Holds when |
//! |------|----------|------------|
//! | 0 | [`Operator::Equal`] | `v == 0` |
//! | 1 | [`Operator::Greater`] | `v > 0` |
//! | 2 | [`Operator::GreaterEqual`] | `v >= 0` |
//! | 3 | [`Operator::NotEqual`] | `v != 0` |
//! | 4 | [`Operator::RealValued`] | always; the scalar is the rule's output |
//!
//! A row value is compared against zero with a band proportional to the
//! magnitude of the terms that produced it (see [`RELATIVE_TOLERANCE`]), so
//! rounding left by large coefficients or coordinates does not flip a
//! verdict while small but genuine non-zero values still count.

use serde::{Deserialize, Serialize};

use crate::RuleError;

/// Relative width of the band around zero inside which a row value counts
/// as exactly zero.
///
/// The band is this factor times the row's scale, `sum |w_i * x_i| + |b|`.
/// Points produced by hyperplane projection land on their target plane only
/// up to rounding of that order. A scale of zero makes every comparison
/// exact.
pub const RELATIVE_TOLERANCE: f64 = 64.0 * f64::EPSILON;

/// How a row's scalar is judged against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// The row value must be zero.
    Equal,
    /// The row value must be strictly positive.
    Greater,
    /// The row value must be non-negative.
    GreaterEqual,
    /// The row value must be non-zero.
    NotEqual,
    /// The row has no constraint; its value is the rule's real output.
    RealValued,
}

impl Operator {
    /// Return the wire code of this operator.
    pub const fn code(self) -> i64 {
        match self {
            Self::Equal => 0,
            Self::Greater => 1,
            Self::GreaterEqual => 2,
            Self::NotEqual => 3,
            Self::RealValued => 4,
        }
    }

    /// Return whether `value` satisfies this operator.
    ///
    /// `scale` is the magnitude of the terms summed into `value`; values
    /// within [`RELATIVE_TOLERANCE`]` * scale` of zero count as zero.
    pub const fn holds(self, value: f64, scale: f64) -> bool {
        let band = RELATIVE_TOLERANCE * scale.abs();
        match self {
            Self::Equal => value.abs() <= band,
            Self::Greater => value > band,
            Self::GreaterEqual => value >= -band,
            Self::NotEqual => value.abs() > band,
            Self::RealValued => true,
        }
    }

    /// Return whether this is the real-valued marker.
    pub const fn is_real_valued(self) -> bool {
        matches!(self, Self::RealValued)
    }
}

impl TryFrom<i64> for Operator {
    type Error = RuleError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Equal),
            1 => Ok(Self::Greater),
            2 => Ok(Self::GreaterEqual),
            3 => Ok(Self::NotEqual),
            4 => Ok(Self::RealValued),
            _ => Err(RuleError::AuxCodeOutOfRange { code }),
        }
    }
}

impl core::fmt::Display for Operator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let symbol = match self {
            Self::Equal => "== 0",
            Self::Greater => "> 0",
            Self::GreaterEqual => ">= 0",
            Self::NotEqual => "!= 0",
            Self::RealValued => "(real)",
        };
        f.write_str(symbol)
    }
}
