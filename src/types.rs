use serde::{Deserialize, Serialize};

/// Tri-state of a `Succeeded` condition.
///
/// - `Unknown`: still running (or not reported yet).
/// - `True`: finished successfully.
/// - `False`: finished unsuccessfully (failed or cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl ConditionStatus {
    pub fn is_true(self) -> bool {
        self == ConditionStatus::True
    }

    pub fn is_false(self) -> bool {
        self == ConditionStatus::False
    }

    pub fn is_unknown(self) -> bool {
        self == ConditionStatus::Unknown
    }
}

/// Operator of a `when` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhenOperator {
    In,
    NotIn,
}

/// Observed status of an execution, as written in `[[observed]]` snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservedStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// Scripted outcome of one attempt in `[simulate.<task>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptedOutcome {
    #[default]
    Succeeded,
    Failed,
    Cancelled,
}
