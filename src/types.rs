use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the two execution lanes a task can be assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Track {
    Human,
    Automated,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Human => f.write_str("human"),
            Track::Automated => f.write_str("automated"),
        }
    }
}

impl FromStr for Track {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "human" => Ok(Track::Human),
            "automated" | "robot" => Ok(Track::Automated),
            other => Err(format!(
                "invalid track: {other} (expected \"human\" or \"automated\")"
            )),
        }
    }
}

/// Which program variant the actuator should run.
///
/// Orthogonal to dependency logic; only the actuator looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeVariant {
    #[default]
    Primary,
    Alternate,
}

impl fmt::Display for ModeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeVariant::Primary => f.write_str("primary"),
            ModeVariant::Alternate => f.write_str("alternate"),
        }
    }
}

impl FromStr for ModeVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(ModeVariant::Primary),
            "alternate" => Ok(ModeVariant::Alternate),
            other => Err(format!(
                "invalid mode variant: {other} (expected \"primary\" or \"alternate\")"
            )),
        }
    }
}

/// Coarse run-state reported by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
    /// Anything the actuator could answer but we could not classify.
    Unknown,
}
