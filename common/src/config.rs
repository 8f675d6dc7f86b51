use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{fanout::Actuator, types::ControlMode};

pub const DEFAULT_API_URL: &str = "http://localhost:5364";
pub const DEFAULT_TOLERANCE_C: f32 = 0.5;
pub const MIN_TOLERANCE_C: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("room id cannot be empty")]
    EmptyRoomId,
    #[error("sensor reference cannot be empty")]
    EmptySensor,
    #[error("at least one actuator is required")]
    NoActuators,
    #[error("invalid actuator reference {0:?}, expected <domain>.<object_id>")]
    InvalidActuator(String),
    #[error("{name} must be greater than 0.1 (got {value})")]
    InvalidTolerance { name: &'static str, value: f32 },
    #[error("invalid target range {min}..{max}")]
    InvalidTemperatureRange { min: f32, max: f32 },
    #[error("api url must start with http:// or https:// (got {0:?})")]
    InvalidApiUrl(String),
    #[error("{name} must be non-zero")]
    ZeroInterval { name: &'static str },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThermostatConfig {
    pub room_id: String,
    pub sensor: String,
    #[serde(default)]
    pub outdoor_sensor: Option<String>,
    pub actuators: Vec<Actuator>,
    pub cold_tolerance: f32,
    pub hot_tolerance: f32,
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub min_temp: f32,
    pub max_temp: f32,
    pub min_switch_interval_secs: u64,
    pub schedule_cache_secs: u64,
    pub request_timeout_secs: u64,
    pub scan_interval_secs: u64,
}

impl Default for ThermostatConfig {
    fn default() -> Self {
        Self {
            room_id: "living_room".to_string(),
            sensor: "sensor.living_room_temperature".to_string(),
            outdoor_sensor: None,
            actuators: vec![Actuator::switch("switch.living_room_heater")],
            cold_tolerance: DEFAULT_TOLERANCE_C,
            hot_tolerance: DEFAULT_TOLERANCE_C,
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            min_temp: 5.0,
            max_temp: 35.0,
            min_switch_interval_secs: 60,
            schedule_cache_secs: 600,
            request_timeout_secs: 10,
            scan_interval_secs: 60,
        }
    }
}

impl ThermostatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_id.trim().is_empty() {
            return Err(ConfigError::EmptyRoomId);
        }
        if self.sensor.trim().is_empty() {
            return Err(ConfigError::EmptySensor);
        }
        if self.actuators.is_empty() {
            return Err(ConfigError::NoActuators);
        }
        validate_tolerance("cold_tolerance", self.cold_tolerance)?;
        validate_tolerance("hot_tolerance", self.hot_tolerance)?;
        if !(self.min_temp.is_finite() && self.max_temp.is_finite())
            || self.min_temp >= self.max_temp
        {
            return Err(ConfigError::InvalidTemperatureRange {
                min: self.min_temp,
                max: self.max_temp,
            });
        }
        validate_api_url(&self.api_url)?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "request_timeout_secs",
            });
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                name: "scan_interval_secs",
            });
        }
        Ok(())
    }

    pub fn apply_options(&mut self, update: &OptionsUpdate) -> Result<bool, ConfigError> {
        let mut next = self.clone();
        if let Some(cold) = update.cold_tolerance {
            next.cold_tolerance = cold;
        }
        if let Some(hot) = update.hot_tolerance {
            next.hot_tolerance = hot;
        }
        if let Some(url) = &update.api_url {
            next.api_url = url.trim().trim_end_matches('/').to_string();
        }
        next.validate()?;

        let url_changed = next.api_url != self.api_url;
        *self = next;
        Ok(url_changed)
    }

    pub fn clamp_target(&self, temperature: f32) -> f32 {
        temperature.clamp(self.min_temp, self.max_temp)
    }
}

fn validate_tolerance(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > MIN_TOLERANCE_C {
        Ok(())
    } else {
        Err(ConfigError::InvalidTolerance { name, value })
    }
}

fn validate_api_url(url: &str) -> Result<(), ConfigError> {
    let trimmed = url.trim();
    let has_host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .is_some_and(|rest| !rest.is_empty());
    if has_host {
        Ok(())
    } else {
        Err(ConfigError::InvalidApiUrl(url.to_string()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptionsUpdate {
    #[serde(rename = "coldTolerance", default)]
    pub cold_tolerance: Option<f32>,
    #[serde(rename = "hotTolerance", default)]
    pub hot_tolerance: Option<f32>,
    #[serde(rename = "apiUrl", default)]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedSettings {
    pub mode: ControlMode,
    pub target_temperature: f32,
    #[serde(default)]
    pub preset: Option<String>,
}

impl Default for PersistedSettings {
    fn default() -> Self {
        Self {
            mode: ControlMode::Auto,
            target_temperature: 20.0,
            preset: None,
        }
    }
}

impl PersistedSettings {
    pub fn sanitize(&mut self, config: &ThermostatConfig) {
        if !self.target_temperature.is_finite() {
            self.target_temperature = Self::default().target_temperature;
        }
        self.target_temperature = config.clamp_target(self.target_temperature);

        if self
            .preset
            .as_deref()
            .is_some_and(|preset| preset.trim().is_empty())
        {
            self.preset = None;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_user: String,
    pub mqtt_pass: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "192.168.1.100".to_string(),
            mqtt_port: 1883,
            mqtt_user: String::new(),
            mqtt_pass: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub thermostat: ThermostatConfig,
    pub settings: PersistedSettings,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ThermostatConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_tolerance_at_or_below_minimum() {
        let config = ThermostatConfig {
            cold_tolerance: 0.1,
            ..ThermostatConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTolerance {
                name: "cold_tolerance",
                value: 0.1
            })
        );
    }

    #[test]
    fn rejects_empty_actuator_list() {
        let config = ThermostatConfig {
            actuators: Vec::new(),
            ..ThermostatConfig::default()
        };

        assert_eq!(config.validate(), Err(ConfigError::NoActuators));
    }

    #[test]
    fn rejects_url_without_scheme() {
        let config = ThermostatConfig {
            api_url: "localhost:5364".to_string(),
            ..ThermostatConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidApiUrl(_))
        ));
    }

    #[test]
    fn options_update_is_all_or_nothing() {
        let mut config = ThermostatConfig::default();
        let update = OptionsUpdate {
            cold_tolerance: Some(1.0),
            hot_tolerance: Some(0.05),
            api_url: None,
        };

        assert!(config.apply_options(&update).is_err());
        assert_eq!(config.cold_tolerance, DEFAULT_TOLERANCE_C);
    }

    #[test]
    fn options_update_reports_url_change() {
        let mut config = ThermostatConfig::default();
        let update = OptionsUpdate {
            cold_tolerance: Some(0.8),
            hot_tolerance: None,
            api_url: Some("https://heatly.example.com/".to_string()),
        };

        assert_eq!(config.apply_options(&update), Ok(true));
        assert_eq!(config.cold_tolerance, 0.8);
        assert_eq!(config.api_url, "https://heatly.example.com");

        let same = OptionsUpdate {
            api_url: Some("https://heatly.example.com".to_string()),
            ..OptionsUpdate::default()
        };
        assert_eq!(config.apply_options(&same), Ok(false));
    }

    #[test]
    fn sanitize_clamps_target_and_drops_blank_preset() {
        let config = ThermostatConfig::default();
        let mut settings = PersistedSettings {
            mode: ControlMode::Local,
            target_temperature: 60.0,
            preset: Some("  ".to_string()),
        };

        settings.sanitize(&config);

        assert_eq!(settings.target_temperature, 35.0);
        assert_eq!(settings.preset, None);
    }

    #[test]
    fn actuators_deserialize_from_entity_ids() {
        let raw = r#"{
            "room_id": "office",
            "sensor": "sensor.office",
            "actuators": ["climate.office_panel", "switch.office_heater"],
            "cold_tolerance": 0.5,
            "hot_tolerance": 0.5,
            "api_url": "http://localhost:5364",
            "min_temp": 5.0,
            "max_temp": 35.0,
            "min_switch_interval_secs": 60,
            "schedule_cache_secs": 600,
            "request_timeout_secs": 10,
            "scan_interval_secs": 60
        }"#;

        let config: ThermostatConfig = serde_json::from_str(raw).unwrap();

        assert_eq!(
            config.actuators,
            vec![
                Actuator::climate("climate.office_panel"),
                Actuator::switch("switch.office_heater"),
            ]
        );
        assert_eq!(config.outdoor_sensor, None);
    }

    #[test]
    fn malformed_actuator_fails_deserialization() {
        let raw = r#"{
            "room_id": "office",
            "sensor": "sensor.office",
            "actuators": ["heater"],
            "cold_tolerance": 0.5,
            "hot_tolerance": 0.5,
            "api_url": "http://localhost:5364",
            "min_temp": 5.0,
            "max_temp": 35.0,
            "min_switch_interval_secs": 60,
            "schedule_cache_secs": 600,
            "request_timeout_secs": 10,
            "scan_interval_secs": 60
        }"#;

        assert!(serde_json::from_str::<ThermostatConfig>(raw).is_err());
    }
}
