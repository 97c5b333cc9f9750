//! The closed set of variable identifiers rules can reference.
//!
//! Every rule declares the variables it reads by [`VariableName`]. The set
//! is fixed at compile time so a typo in a rule table is caught when the
//! table is parsed rather than when the rule is first evaluated.
//!
//! Each variable carries a stable `snake_case` wire name used by serde and
//! by [`core::str::FromStr`].

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::VariableError;

/// Generates the [`VariableName`] enum together with its wire names and the
/// [`VariableName::ALL`] listing.
macro_rules! define_variables {
    (
        $(
            $(#[$meta:meta])*
            $variant:ident => $wire:literal,
        )*
    ) => {
        /// Identifier of a numeric variable tracked by the simulation.
        ///
        /// A variable's value is an ordered sequence of `f64`s. Most are
        /// scalars (length 1); a few, such as [`VariableName::IslandsAlive`],
        /// are vectors.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum VariableName {
            $(
                $(#[$meta])*
                #[serde(rename = $wire)]
                $variant,
            )*
        }

        impl VariableName {
            /// Every known variable, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            /// Return the stable wire name of this variable.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)*
                }
            }
        }

        impl FromStr for VariableName {
            type Err = VariableError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)*
                    other => Err(VariableError::UnknownVariable(other.to_owned())),
                }
            }
        }
    };
}

define_variables! {
    /// Number of islands that paid into the common pool this turn.
    NumberOfIslandsContributingToCommonPool => "number_of_islands_contributing_to_common_pool",
    /// Number of foraging expeditions that returned nothing.
    NumberOfFailedForages => "number_of_failed_forages",
    /// Number of agreements broken this turn.
    NumberOfBrokenAgreements => "number_of_broken_agreements",
    /// Highest sanction tier currently applied to any island.
    MaxSeverityOfSanctions => "max_severity_of_sanctions",
    /// Count of islands still alive.
    NumberOfIslandsAlive => "number_of_islands_alive",
    /// Number of ballots cast in the current vote.
    NumberOfBallotsCast => "number_of_ballots_cast",
    /// Number of allocations sent out of the common pool.
    NumberOfAllocationsSent => "number_of_allocations_sent",
    /// Whether allocation requests were made (1) or not (0).
    AllocationRequestsMade => "allocation_requests_made",
    /// Whether the allocation decision was made (1) or not (0).
    AllocationMade => "allocation_made",
    /// Per-island alive flags (one slot per island).
    IslandsAlive => "islands_alive",
    /// Salary paid to the speaker role.
    SpeakerSalary => "speaker_salary",
    /// Salary paid to the judge role.
    JudgeSalary => "judge_salary",
    /// Salary paid to the president role.
    PresidentSalary => "president_salary",
    /// Amount the speaker actually paid out.
    SpeakerPayment => "speaker_payment",
    /// Amount the judge actually paid out.
    JudgePayment => "judge_payment",
    /// Amount the president actually paid out.
    PresidentPayment => "president_payment",
    /// Whether a rule has been selected for a vote.
    RuleSelected => "rule_selected",
    /// Whether a vote has been called.
    VoteCalled => "vote_called",
    /// Whether the result of a vote has been announced.
    VoteResultAnnounced => "vote_result_announced",
    /// Per-island voting eligibility flags.
    IslandsAllowedToVote => "islands_allowed_to_vote",
    /// Tax the president expects from an island.
    ExpectedTaxContribution => "expected_tax_contribution",
    /// Allocation the president granted an island.
    ExpectedAllocation => "expected_allocation",
    /// Tax an island declares it paid.
    IslandTaxContribution => "island_tax_contribution",
    /// Allocation an island declares it took.
    IslandAllocation => "island_allocation",
    /// Resources an island reported to the judiciary.
    IslandReportedResources => "island_reported_resources",
    /// Constant term used by sanction rules.
    ConstSanctionAmount => "const_sanction_amount",
    /// Turns remaining on an island's current sanction.
    TurnsLeftOnSanction => "turns_left_on_sanction",
    /// Sanction amount an island paid.
    SanctionPaid => "sanction_paid",
    /// Sanction amount an island is expected to pay.
    SanctionExpected => "sanction_expected",
    /// Whether the judge performed an inspection this turn.
    JudgeInspectionPerformed => "judge_inspection_performed",
    /// Whether a role announced it is being monitored.
    MonitorRoleAnnounce => "monitor_role_announce",
    /// Whether an island decided to monitor a role.
    MonitorRoleDecideToMonitor => "monitor_role_decide_to_monitor",
    /// Outcome of a monitoring evaluation.
    MonitorRoleEvalResult => "monitor_role_eval_result",
    /// Whether the monitoring result was acted on.
    MonitorRoleEvalResultDecide => "monitor_role_eval_result_decide",
    /// Private resources an island reported.
    IslandReportedPrivateResources => "island_reported_private_resources",
    /// Private resources an island actually holds.
    IslandActualPrivateResources => "island_actual_private_resources",
    /// Free-form variable reserved for tests and experiments.
    TestVariable => "test_variable",
}

impl core::fmt::Display for VariableName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for name in VariableName::ALL {
            assert_eq!(name.as_str().parse::<VariableName>(), Ok(*name));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let result = "number_of_dragons".parse::<VariableName>();
        assert_eq!(
            result,
            Err(VariableError::UnknownVariable("number_of_dragons".to_owned())),
        );
    }

    #[test]
    fn serde_uses_wire_name() {
        let json = serde_json::to_string(&VariableName::TurnsLeftOnSanction).unwrap();
        assert_eq!(json, "\"turns_left_on_sanction\"");
    }

    #[test]
    fn wire_names_are_unique() {
        let mut seen = std::collections::BTreeSet::new();
        for name in VariableName::ALL {
            assert!(seen.insert(name.as_str()), "duplicate wire name {name}");
        }
    }
}
