use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    Climate,
    Switch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Actuator {
    entity_id: String,
    kind: ActuatorKind,
}

impl Actuator {
    pub fn parse(entity_id: &str) -> Result<Self, ConfigError> {
        let trimmed = entity_id.trim();
        let Some((domain, object_id)) = trimmed.split_once('.') else {
            return Err(ConfigError::InvalidActuator(entity_id.to_string()));
        };
        if domain.is_empty() || object_id.is_empty() {
            return Err(ConfigError::InvalidActuator(entity_id.to_string()));
        }

        let kind = if domain == "climate" {
            ActuatorKind::Climate
        } else {
            ActuatorKind::Switch
        };
        Ok(Self {
            entity_id: trimmed.to_string(),
            kind,
        })
    }

    pub fn climate(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            kind: ActuatorKind::Climate,
        }
    }

    pub fn switch(entity_id: &str) -> Self {
        Self {
            entity_id: entity_id.to_string(),
            kind: ActuatorKind::Switch,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn kind(&self) -> ActuatorKind {
        self.kind
    }

    pub fn command(&self, on: bool) -> ActuatorCommand {
        match (self.kind, on) {
            (ActuatorKind::Climate, true) => ActuatorCommand::SetHvacMode(HvacMode::Heat),
            (ActuatorKind::Climate, false) => ActuatorCommand::SetHvacMode(HvacMode::Off),
            (ActuatorKind::Switch, true) => ActuatorCommand::TurnOn,
            (ActuatorKind::Switch, false) => ActuatorCommand::TurnOff,
        }
    }
}

impl TryFrom<String> for Actuator {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Actuator> for String {
    fn from(value: Actuator) -> Self {
        value.entity_id
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entity_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HvacMode {
    Heat,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCommand {
    TurnOn,
    TurnOff,
    SetHvacMode(HvacMode),
}

impl ActuatorCommand {
    pub fn service(self) -> &'static str {
        match self {
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::SetHvacMode(_) => "set_hvac_mode",
        }
    }

    pub fn payload(self) -> &'static str {
        match self {
            Self::TurnOn => "on",
            Self::TurnOff => "off",
            Self::SetHvacMode(HvacMode::Heat) => "heat",
            Self::SetHvacMode(HvacMode::Off) => "off",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to send {service} to {entity_id}: {reason}")]
pub struct ActuatorError {
    pub entity_id: String,
    pub service: &'static str,
    pub reason: String,
}

// `dispatch` must return once the command is queued.
pub trait ActuatorDriver: Send + Sync {
    fn dispatch(&self, actuator: &Actuator, command: ActuatorCommand) -> Result<(), ActuatorError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub dispatched: usize,
    pub failed: usize,
}

pub fn apply<D: ActuatorDriver + ?Sized>(
    driver: &D,
    actuators: &[Actuator],
    on: bool,
) -> FanoutReport {
    let mut report = FanoutReport::default();
    for actuator in actuators {
        let command = actuator.command(on);
        match driver.dispatch(actuator, command) {
            Ok(()) => {
                debug!(actuator = %actuator, service = command.service(), "actuator command sent");
                report.dispatched += 1;
            }
            Err(err) => {
                warn!("actuator command failed: {err}");
                report.failed += 1;
            }
        }
    }
    report
}
