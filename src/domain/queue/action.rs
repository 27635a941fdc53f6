//! Membership actions and their outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Why a driver is leaving a queue.
///
/// Always required: the server's reporting layer groups exits by reason.
/// `Other` carries reasons this client does not know about yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ExitReason {
    ServiceTaken,
    ShiftEnd,
    Emergency,
    ChangeStop,
    Other(String),
}

impl ExitReason {
    pub fn as_str(&self) -> &str {
        match self {
            ExitReason::ServiceTaken => "service_taken",
            ExitReason::ShiftEnd => "shift_end",
            ExitReason::Emergency => "emergency",
            ExitReason::ChangeStop => "change_stop",
            ExitReason::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExitReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s {
            "" => return Err(ValidationError::empty_field("reason")),
            "service_taken" => ExitReason::ServiceTaken,
            "shift_end" => ExitReason::ShiftEnd,
            "emergency" => ExitReason::Emergency,
            "change_stop" => ExitReason::ChangeStop,
            other => {
                if !other
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
                {
                    return Err(ValidationError::invalid_format(
                        "reason",
                        "expected a snake_case identifier",
                    ));
                }
                ExitReason::Other(other.to_string())
            }
        })
    }
}

impl From<ExitReason> for String {
    fn from(reason: ExitReason) -> Self {
        reason.as_str().to_string()
    }
}

impl TryFrom<String> for ExitReason {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The three mutating membership actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Enter,
    Exit,
    ChangeStop,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::Enter => "enter",
            ActionKind::Exit => "exit",
            ActionKind::ChangeStop => "change_stop",
        };
        f.write_str(s)
    }
}

/// Result of a membership action, as shown to the user.
///
/// Connectivity failures and timeouts are expressed as unsuccessful outcomes
/// too, never as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// Synthetic outcome when no channel is available.
    pub fn not_connected() -> Self {
        Self::failed("not connected")
    }

    /// Message to show the user, with a generic fallback for bare failures.
    pub fn display_message(&self) -> Option<String> {
        match (&self.message, self.success) {
            (Some(m), _) => Some(m.clone()),
            (None, false) => Some("the action could not be completed".to_string()),
            (None, true) => None,
        }
    }
}
