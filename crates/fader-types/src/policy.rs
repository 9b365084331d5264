use serde::{Deserialize, Serialize};

/// How bulk imports (workspace, archive, change batches) react to a failing item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPolicy {
    /// Log the failure and continue with the next item.
    #[default]
    BestEffort,
    /// Abort on the first failure and return it.
    Strict,
}

impl ImportPolicy {
    pub fn is_strict(self) -> bool {
        matches!(self, Self::Strict)
    }
}
