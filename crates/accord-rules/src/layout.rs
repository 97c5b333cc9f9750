//! Flattening named variables into a point and back.
//!
//! Repair works on the formal vector without its constant slot: a flat
//! `Vec<f64>` with one coordinate per value of each required variable. The
//! layout remembers which variable (and arity) each run of coordinates came
//! from so adjusted coordinates can be written back.

use accord_types::{ChangeablePolicy, VariableName, VariableSnapshot};

use crate::{RuleError, RuleMatrix};

/// A rule's required variables flattened into coordinates.
#[derive(Debug, Clone)]
pub(crate) struct FlatPoint {
    /// `(variable, arity)` in formal-vector order.
    layout: Vec<(VariableName, usize)>,
    /// One coordinate per variable value.
    pub(crate) values: Vec<f64>,
}

impl FlatPoint {
    /// Flatten the rule's required variables out of `snapshot`.
    pub(crate) fn gather(rule: &RuleMatrix, snapshot: &VariableSnapshot) -> Result<Self, RuleError> {
        let mut values = rule.formal_vector(snapshot)?;
        values.pop();

        let layout = rule
            .required_variables()
            .iter()
            .map(|name| (*name, snapshot.get(*name).map_or(0, <[f64]>::len)))
            .collect();

        Ok(Self { layout, values })
    }

    /// One flag per coordinate: `true` if the policy forbids changing it.
    pub(crate) fn fixed_mask<P>(&self, policy: &P) -> Vec<bool>
    where
        P: ChangeablePolicy + ?Sized,
    {
        self.layout
            .iter()
            .flat_map(|(name, arity)| {
                let fixed = !policy.is_changeable(*name);
                std::iter::repeat_n(fixed, *arity)
            })
            .collect()
    }

    /// Variables the policy forbids changing.
    pub(crate) fn fixed_names<P>(&self, policy: &P) -> Vec<VariableName>
    where
        P: ChangeablePolicy + ?Sized,
    {
        self.layout
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| !policy.is_changeable(*name))
            .collect()
    }

    /// Write `coordinates` back over a copy of `base`, preserving each
    /// variable's arity and slot order.
    pub(crate) fn scatter(&self, coordinates: &[f64], base: &VariableSnapshot) -> VariableSnapshot {
        let mut snapshot = base.clone();
        let mut rest = coordinates;
        for (name, arity) in &self.layout {
            let (head, tail) = rest.split_at(rest.len().min(*arity));
            snapshot.insert(*name, head.to_vec());
            rest = tail;
        }
        snapshot
    }
}
