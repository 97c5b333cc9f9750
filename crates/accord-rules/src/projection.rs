//! Nearest compliant point by hyperplane projection.
//!
//! Each constraint row of a rule is a hyperplane `w . x + b` in the space of
//! the rule's flattened variables (see [`Hyperplane`]). When a point
//! violates the rule, the solver repeatedly projects it onto the nearest
//! still-violated hyperplane until the whole rule holds:
//!
//! 1. Candidates are the violated rows not yet projected onto.
//! 2. The nearest candidate, by `|w . x + b| / |w|`, is chosen (ties go to
//!    the earlier row).
//! 3. The point is projected onto it; if the rule now holds, that point is
//!    the answer. Otherwise the row is spent and the search continues from
//!    the projected point.
//! 4. If no candidates remain, the original point is returned unchanged.
//!
//! Every row is projected onto at most once, so the search ends after at
//! most `rows` steps.
//!
//! # Immutable coordinates
//!
//! Coordinates the [`ChangeablePolicy`] marks fixed are pinned by
//! hyperplanes `x_i - v_i = 0`. Projection happens inside the affine
//! subspace where every pin holds, which is the same as projecting with the
//! fixed weight components zeroed. A row whose weights all fall on fixed
//! coordinates cannot be repaired and is never a candidate.
//!
//! # Rule sets
//!
//! [`distance_from_rule_space`] repairs one rule at a time, nearest first,
//! and reports the distance of the first single-rule repair after which
//! every rule in the set passes.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::trace;

use accord_types::{ChangeablePolicy, VariableName, VariableSnapshot};

use crate::evaluate::rows_hold;
use crate::layout::FlatPoint;
use crate::operator::RELATIVE_TOLERANCE;
use crate::rule::{dot, scaled_dot};
use crate::{Operator, RuleCatalog, RuleError, RuleMatrix, evaluate};

/// How far past zero a projection onto a strict half-space lands.
///
/// `Greater` and `NotEqual` rows exclude their own boundary, so the
/// projected point is pushed at least this far to the positive side. At
/// large magnitudes the push grows to [`MARGIN_BANDS`] comparison bands.
pub const PROJECTION_MARGIN: f64 = 1e-6;

/// Minimum strict-side push, in multiples of the row's comparison band
/// ([`RELATIVE_TOLERANCE`] times its scale).
pub const MARGIN_BANDS: f64 = 16.0;

// ---------------------------------------------------------------------------
// Hyperplane
// ---------------------------------------------------------------------------

/// One constraint row viewed geometrically: `weights . x + offset (op) 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hyperplane {
    /// The row without its constant column.
    pub weights: Vec<f64>,
    /// The constant column.
    pub offset: f64,
    /// The row's operator.
    pub operator: Operator,
}

impl Hyperplane {
    /// Split a rule row into weights and offset.
    pub fn from_row(row: &[f64], operator: Operator) -> Self {
        let (offset, weights) = row.split_last().map_or((0.0, &[][..]), |(o, w)| (*o, w));
        Self {
            weights: weights.to_vec(),
            offset,
            operator,
        }
    }

    /// A pin holding coordinate `index` of a `dimension`-sized point at
    /// `value`.
    pub fn pin(dimension: usize, index: usize, value: f64) -> Self {
        let weights = (0..dimension)
            .map(|i| if i == index { 1.0 } else { 0.0 })
            .collect();
        Self {
            weights,
            offset: -value,
            operator: Operator::Equal,
        }
    }

    /// `weights . point + offset`.
    pub fn value_at(&self, point: &[f64]) -> f64 {
        self.scaled_value_at(point).0
    }

    /// Whether `point` satisfies this hyperplane's operator.
    pub fn is_satisfied(&self, point: &[f64]) -> bool {
        let (value, scale) = self.scaled_value_at(point);
        self.operator.holds(value, scale)
    }

    /// `value_at` together with `sum |w_i * x_i| + |offset|`.
    fn scaled_value_at(&self, point: &[f64]) -> (f64, f64) {
        let (value, scale) = scaled_dot(&self.weights, point);
        (value + self.offset, scale + self.offset.abs())
    }

    /// Euclidean distance from `point` to the plane `weights . x + offset = 0`.
    ///
    /// Returns `None` for a degenerate plane with all-zero weights.
    pub fn distance(&self, point: &[f64]) -> Option<f64> {
        let norm_sq = dot(&self.weights, &self.weights);
        (norm_sq > 0.0).then(|| self.value_at(point).abs() / norm_sq.sqrt())
    }

    /// Orthogonal projection of `point` onto the plane, shifted to the
    /// satisfying side for strict operators.
    ///
    /// Returns `None` for a degenerate plane.
    pub fn project(&self, point: &[f64]) -> Option<Vec<f64>> {
        let free = vec![true; point.len()];
        self.project_within(point, &free)
    }

    /// Distance measured inside the subspace where only `free` coordinates
    /// move. `None` if no free coordinate has a non-zero weight.
    fn distance_within(&self, point: &[f64], free: &[bool]) -> Option<f64> {
        let direction = self.free_direction(free);
        let norm_sq = dot(&direction, &direction);
        (norm_sq > 0.0).then(|| self.value_at(point).abs() / norm_sq.sqrt())
    }

    /// Projection that moves only `free` coordinates.
    ///
    /// The point is stepped onto the boundary twice: the second step cancels
    /// the rounding the first leaves when the point starts far from the
    /// plane. Strict operators then step off the boundary by
    /// [`margin`](Self::margin).
    fn project_within(&self, point: &[f64], free: &[bool]) -> Option<Vec<f64>> {
        let direction = self.free_direction(free);
        let norm_sq = dot(&direction, &direction);
        if norm_sq <= 0.0 {
            return None;
        }
        let onto_boundary =
            |from: &[f64]| step_along(from, &direction, self.value_at(from) / norm_sq);
        let boundary = onto_boundary(&onto_boundary(point));
        let margin = self.margin(&boundary);
        Some(step_along(&boundary, &direction, -margin / norm_sq))
    }

    /// The weights with fixed components zeroed.
    fn free_direction(&self, free: &[bool]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(free.iter().chain(std::iter::repeat(&false)))
            .map(|(w, is_free)| if *is_free { *w } else { 0.0 })
            .collect()
    }

    /// The row value a projection aims for past the boundary, judged at
    /// the boundary point. Zero for operators that include the boundary.
    fn margin(&self, boundary: &[f64]) -> f64 {
        match self.operator {
            Operator::Greater | Operator::NotEqual => {
                let (_, scale) = self.scaled_value_at(boundary);
                PROJECTION_MARGIN.max(MARGIN_BANDS * RELATIVE_TOLERANCE * scale)
            }
            Operator::Equal | Operator::GreaterEqual | Operator::RealValued => 0.0,
        }
    }
}

/// `point - step * direction`, leaving coordinates past the end of
/// `direction` in place.
fn step_along(point: &[f64], direction: &[f64], step: f64) -> Vec<f64> {
    point
        .iter()
        .zip(direction.iter().chain(std::iter::repeat(&0.0)))
        .map(|(x, w)| (-step).mul_add(*w, *x))
        .collect()
}

// ---------------------------------------------------------------------------
// Single rule
// ---------------------------------------------------------------------------

/// The result of a closest-approach search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Approach {
    /// The input snapshot with the rule's variables set to the found point.
    pub snapshot: VariableSnapshot,
    /// Required variables the policy kept fixed.
    pub fixed: BTreeSet<VariableName>,
    /// Whether the returned snapshot satisfies the rule.
    pub compliant: bool,
    /// Whether any variable was moved.
    pub moved: bool,
}

impl Approach {
    fn unchanged(
        snapshot: &VariableSnapshot,
        fixed: BTreeSet<VariableName>,
        compliant: bool,
    ) -> Self {
        Self {
            snapshot: snapshot.clone(),
            fixed,
            compliant,
            moved: false,
        }
    }
}

/// Find the nearest point to `snapshot` that satisfies `rule`'s own rows,
/// moving only variables `policy` marks changeable.
///
/// If the rule already holds, the snapshot is returned unchanged. If no
/// sequence of single-row projections reaches compliance, the snapshot is
/// also returned unchanged with [`Approach::compliant`] set to `false`.
///
/// # Errors
///
/// Returns [`RuleError::MissingVariables`] or
/// [`RuleError::DimensionMismatch`] if the rule cannot be applied.
pub fn closest_approach<P>(
    rule: &RuleMatrix,
    snapshot: &VariableSnapshot,
    policy: &P,
) -> Result<Approach, RuleError>
where
    P: ChangeablePolicy + ?Sized,
{
    let point = FlatPoint::gather(rule, snapshot)?;
    let fixed: BTreeSet<VariableName> = point.fixed_names(policy).into_iter().collect();

    if rows_hold(rule, &point.values) {
        return Ok(Approach::unchanged(snapshot, fixed, true));
    }

    let free: Vec<bool> = point.fixed_mask(policy).into_iter().map(|f| !f).collect();
    let pins = pin_fixed(&point.values, &free);
    let planes: Vec<Hyperplane> = rule
        .coefficients()
        .iter()
        .zip(rule.operators())
        .filter(|(_, operator)| !operator.is_real_valued())
        .map(|(row, operator)| Hyperplane::from_row(row, *operator))
        .collect();

    let mut spent = vec![false; planes.len()];
    let mut current = point.values.clone();

    while let Some((index, distance)) = nearest_violated(&planes, &spent, &current, &free) {
        if let Some(flag) = spent.get_mut(index) {
            *flag = true;
        }
        let Some(next) = planes
            .get(index)
            .and_then(|plane| plane.project_within(&current, &free))
        else {
            continue;
        };
        trace!(rule = rule.name(), plane = index, distance, "projected onto hyperplane");
        current = next;

        if rows_hold(rule, &current) && pins.iter().all(|pin| pin.is_satisfied(&current)) {
            return Ok(Approach {
                snapshot: point.scatter(&current, snapshot),
                fixed,
                compliant: true,
                moved: true,
            });
        }
    }

    trace!(rule = rule.name(), "no projection sequence reached compliance");
    Ok(Approach::unchanged(snapshot, fixed, false))
}

/// Distance from `snapshot` to compliance with `rule`: zero if the rule
/// holds, otherwise the smallest hyperplane distance over violated rows,
/// ignoring which variables may change.
///
/// Returns `f64::INFINITY` when every violated row is degenerate.
///
/// # Errors
///
/// Returns [`RuleError::MissingVariables`] or
/// [`RuleError::DimensionMismatch`] if the rule cannot be applied.
pub fn rule_distance(rule: &RuleMatrix, snapshot: &VariableSnapshot) -> Result<f64, RuleError> {
    let point = FlatPoint::gather(rule, snapshot)?;
    let all_free = vec![true; point.values.len()];
    let planes: Vec<Hyperplane> = rule
        .coefficients()
        .iter()
        .zip(rule.operators())
        .filter(|(_, operator)| !operator.is_real_valued())
        .map(|(row, operator)| Hyperplane::from_row(row, *operator))
        .collect();
    let spent = vec![false; planes.len()];

    if planes.iter().all(|plane| plane.is_satisfied(&point.values)) {
        return Ok(0.0);
    }
    Ok(nearest_violated(&planes, &spent, &point.values, &all_free)
        .map_or(f64::INFINITY, |(_, distance)| distance))
}

/// Index and distance of the nearest unspent, violated, reachable plane.
fn nearest_violated(
    planes: &[Hyperplane],
    spent: &[bool],
    point: &[f64],
    free: &[bool],
) -> Option<(usize, f64)> {
    planes
        .iter()
        .zip(spent)
        .enumerate()
        .filter(|(_, (plane, is_spent))| !**is_spent && !plane.is_satisfied(point))
        .filter_map(|(index, (plane, _))| plane.distance_within(point, free).map(|d| (index, d)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// One pin per fixed coordinate.
fn pin_fixed(point: &[f64], free: &[bool]) -> Vec<Hyperplane> {
    point
        .iter()
        .zip(free)
        .enumerate()
        .filter(|(_, (_, is_free))| !**is_free)
        .map(|(index, (value, _))| Hyperplane::pin(point.len(), index, *value))
        .collect()
}

// ---------------------------------------------------------------------------
// Rule sets
// ---------------------------------------------------------------------------

/// How far a snapshot is from satisfying a whole rule set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum RuleSpaceDistance {
    /// Every rule already passes.
    Compliant,
    /// Repairing one rule at this distance brings every rule into
    /// compliance.
    Distance(f64),
    /// No single-rule repair achieved global compliance.
    Unreachable,
}

impl RuleSpaceDistance {
    /// The distance as a number, with `-1.0` for both
    /// [`Compliant`](Self::Compliant) and [`Unreachable`](Self::Unreachable).
    pub const fn as_signed(self) -> f64 {
        match self {
            Self::Distance(distance) => distance,
            Self::Compliant | Self::Unreachable => -1.0,
        }
    }
}

/// Greedy search for a single-rule repair that satisfies every rule in
/// `rules`.
///
/// Failing rules are tried in ascending [`rule_distance`] order (ties keep
/// catalog order). Each is projected from the original snapshot, its
/// variables merged into a copy of the snapshot, and the whole set
/// re-evaluated (links included). The distance of the first repair after
/// which everything passes is returned.
///
/// # Errors
///
/// Propagates any evaluation error for a rule in the set.
pub fn distance_from_rule_space<P>(
    rules: &RuleCatalog,
    snapshot: &VariableSnapshot,
    policy: &P,
) -> Result<RuleSpaceDistance, RuleError>
where
    P: ChangeablePolicy + ?Sized,
{
    let mut failing = Vec::new();
    for rule in rules.rules() {
        if !evaluate(rule.name(), rules, snapshot)?.passes {
            failing.push((rule, rule_distance(rule, snapshot)?));
        }
    }
    if failing.is_empty() {
        return Ok(RuleSpaceDistance::Compliant);
    }
    failing.sort_by(|a, b| a.1.total_cmp(&b.1));

    for (rule, distance) in failing {
        let approach = closest_approach(rule, snapshot, policy)?;
        if !approach.moved {
            continue;
        }

        let mut merged = snapshot.clone();
        for name in rule.required_variables() {
            if let Some(values) = approach.snapshot.get(*name) {
                merged.insert(*name, values.to_vec());
            }
        }

        if all_pass(rules, &merged)? {
            trace!(rule = rule.name(), distance, "single-rule repair satisfies the rule set");
            return Ok(RuleSpaceDistance::Distance(distance));
        }
    }

    Ok(RuleSpaceDistance::Unreachable)
}

fn all_pass(rules: &RuleCatalog, snapshot: &VariableSnapshot) -> Result<bool, RuleError> {
    for name in rules.names() {
        if !evaluate(name, rules, snapshot)?.passes {
            return Ok(false);
        }
    }
    Ok(true)
}
