use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::hysteresis::DecisionReason;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlMode {
    #[default]
    Auto,
    #[serde(alias = "HEAT")]
    Local,
    Off,
}

impl ControlMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::Local => "LOCAL",
            Self::Off => "OFF",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AUTO" => Some(Self::Auto),
            "LOCAL" | "HEAT" => Some(Self::Local),
            "OFF" => Some(Self::Off),
            _ => None,
        }
    }
}

const UNAVAILABLE_STATES: [&str; 3] = ["unknown", "unavailable", "none"];

pub fn parse_sensor_state(raw: &str) -> Option<f32> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || UNAVAILABLE_STATES
            .iter()
            .any(|state| trimmed.eq_ignore_ascii_case(state))
    {
        return None;
    }
    trimmed.parse::<f32>().ok().filter(|value| value.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f32,
    pub outdoor_temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThermostatAttributes {
    #[serde(rename = "controlMode")]
    pub control_mode: ControlMode,
    #[serde(rename = "remoteAvailable")]
    pub remote_available: bool,
    pub trajectory: Vec<Value>,
    pub strategy: Map<String, Value>,
    #[serde(rename = "predictionAge")]
    pub prediction_age: u64,
    #[serde(rename = "lowerThreshold")]
    pub lower_threshold: f32,
    #[serde(rename = "upperThreshold")]
    pub upper_threshold: f32,
    #[serde(rename = "secondsSinceSwitch")]
    pub seconds_since_switch: Option<u64>,
    #[serde(rename = "lastDecision")]
    pub last_decision: Option<DecisionReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThermostatStatus {
    #[serde(rename = "roomId")]
    pub room_id: String,
    #[serde(rename = "currentTemp")]
    pub current_temp: Option<f32>,
    #[serde(rename = "targetTemp")]
    pub target_temp: f32,
    #[serde(rename = "minTemp")]
    pub min_temp: f32,
    #[serde(rename = "maxTemp")]
    pub max_temp: f32,
    #[serde(rename = "coldTolerance")]
    pub cold_tolerance: f32,
    #[serde(rename = "hotTolerance")]
    pub hot_tolerance: f32,
    pub preset: Option<String>,
    #[serde(rename = "heaterOn")]
    pub heater_on: bool,
    #[serde(rename = "secondsSinceRemoteSuccess")]
    pub seconds_since_remote_success: Option<u64>,
    #[serde(flatten)]
    pub attributes: ThermostatAttributes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_states() {
        assert_eq!(parse_sensor_state("21.5"), Some(21.5));
        assert_eq!(parse_sensor_state(" -3 "), Some(-3.0));
    }

    #[test]
    fn unavailable_states_read_as_none() {
        for raw in ["unknown", "unavailable", "Unavailable", "", "  ", "warm", "NaN", "inf"] {
            assert_eq!(parse_sensor_state(raw), None, "state {raw:?}");
        }
    }

    #[test]
    fn mode_parse_accepts_heat_alias() {
        assert_eq!(ControlMode::parse("heat"), Some(ControlMode::Local));
        assert_eq!(ControlMode::parse("Local"), Some(ControlMode::Local));
        assert_eq!(ControlMode::parse("auto"), Some(ControlMode::Auto));
        assert_eq!(ControlMode::parse("cool"), None);

        let mode: ControlMode = serde_json::from_str("\"HEAT\"").unwrap();
        assert_eq!(mode, ControlMode::Local);
        assert_eq!(serde_json::to_string(&mode).unwrap(), "\"LOCAL\"");
    }
}
