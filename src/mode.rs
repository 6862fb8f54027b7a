//! Operating mode selected per request.
//!
//! `Mode` appears on the wire (as the command `type` and in the `ready`
//! capability list), in the persisted `sessions`/`requests` rows, and as the
//! `--default-mode` CLI flag value.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::AppError;

/// Request operating mode. Defaults to [`Mode::Chat`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Single-turn LLM chat.
    #[default]
    Chat,
    /// Static research plan synthesized from the query text.
    Plan,
    /// Search-backed research with explicit phases.
    Research,
}

impl Mode {
    /// Every mode, in capability order.
    pub const ALL: [Mode; 3] = [Mode::Chat, Mode::Plan, Mode::Research];

    /// Wire and storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Plan => "plan",
            Self::Research => "research",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "plan" => Ok(Self::Plan),
            "research" => Ok(Self::Research),
            other => Err(AppError::Protocol(format!("invalid mode: {other}"))),
        }
    }
}
