// relaycard/src/actions.rs
//
// Button actions. A button is a tagged value built at the boundary
// (`{action, label, targets, duration}`); turning it into queue requests only
// needs a copy of the current confirmed state.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::io::{channel_index, RelayFlags};
use crate::pipeline::PendingRequest;

/// Hold time of a pulse button without an explicit duration.
pub const DEFAULT_PULSE_DURATION_MS: u64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonAction {
    Activate,
    Deactivate,
    Toggle,
    Pulse,
}

/// One configured batch action. `targets` are 1-based channel numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonDefinition {
    pub action: ButtonAction,
    pub label: String,
    pub targets: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl ButtonDefinition {
    pub fn new(action: ButtonAction, label: impl Into<String>, targets: Vec<u8>) -> Self {
        Self {
            action,
            label: label.into(),
            targets,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// 0-based channel indices of the targets.
    pub fn target_indices(&self) -> Result<Vec<usize>> {
        self.targets.iter().map(|&t| channel_index(t)).collect()
    }

    /// Requests that carry out this action starting from `current`.
    ///
    /// Activate, deactivate and toggle produce one request. A pulse produces
    /// the on-state with the hold time as settle delay, then the off-state.
    pub fn requests(&self, current: RelayFlags) -> Result<Vec<PendingRequest>> {
        let indices = self.target_indices()?;
        let requests = match self.action {
            ButtonAction::Activate => {
                vec![PendingRequest::new(current.with_channels(&indices, true)?)]
            }
            ButtonAction::Deactivate => {
                vec![PendingRequest::new(current.with_channels(&indices, false)?)]
            }
            ButtonAction::Toggle => {
                let mut next = current;
                for &index in &indices {
                    next = next.toggled(index)?;
                }
                vec![PendingRequest::new(next)]
            }
            ButtonAction::Pulse => {
                let hold = self.duration.unwrap_or(DEFAULT_PULSE_DURATION_MS);
                vec![
                    PendingRequest::with_delay_ms(current.with_channels(&indices, true)?, hold),
                    PendingRequest::new(current.with_channels(&indices, false)?),
                ]
            }
        };
        Ok(requests)
    }
}

/// Buttons available when no settings file provides any.
pub fn default_buttons() -> Vec<ButtonDefinition> {
    vec![
        ButtonDefinition::new(ButtonAction::Activate, "All On", (1..=8).collect()),
        ButtonDefinition::new(ButtonAction::Deactivate, "All Off", (1..=8).collect()),
        ButtonDefinition::new(ButtonAction::Activate, "1-5 On", vec![1, 2, 3, 4, 5]),
        ButtonDefinition::new(ButtonAction::Pulse, "Pulse 6,7,8", vec![6, 7, 8])
            .with_duration(DEFAULT_PULSE_DURATION_MS),
    ]
}
