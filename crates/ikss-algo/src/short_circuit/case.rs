use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which fault level to compute.
///
/// The case applies uniformly to every source, line and bus of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultCase {
    /// Highest expected fault level (equipment rating)
    #[default]
    Max,
    /// Lowest expected fault level (protection sensitivity)
    Min,
}

impl FaultCase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultCase::Max => "max",
            FaultCase::Min => "min",
        }
    }

    pub fn all() -> [FaultCase; 2] {
        [FaultCase::Max, FaultCase::Min]
    }
}

impl FromStr for FaultCase {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> anyhow::Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "max" | "maximum" => Ok(FaultCase::Max),
            "min" | "minimum" => Ok(FaultCase::Min),
            other => Err(anyhow::anyhow!(
                "unknown fault case '{}'; supported values: max, min",
                other
            )),
        }
    }
}

impl std::fmt::Display for FaultCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
