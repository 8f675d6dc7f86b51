use std::{collections::BTreeMap, future::Future};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::SensorReading;

pub const API_KEY_HEADER: &str = "X-Heatly-User-API-Key";

pub type ScheduleSet = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote rejected credentials (status {0})")]
    AuthFailure(u16),
    #[error("room not found on remote")]
    RoomNotFound,
    #[error("remote request timed out")]
    Timeout,
    #[error("remote returned status {0}")]
    Status(u16),
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error("remote returned no schedules")]
    EmptySchedules,
}

impl RemoteError {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthFailure(status),
            404 => Self::RoomNotFound,
            other => Self::Status(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("schedule name cannot be empty")]
    InvalidScheduleName,
    #[error("preset {0:?} is not one of the available schedules")]
    InvalidPreset(String),
    #[error("remote did not accept schedule {0:?}")]
    UpdateRejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleName(String);

impl ScheduleName {
    pub fn parse(raw: Option<&str>) -> Result<Self, PresetError> {
        match raw.map(str::trim) {
            Some(name) if !name.is_empty() => Ok(Self(name.to_string())),
            _ => Err(PresetError::InvalidScheduleName),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorPayload {
    pub temperature: f32,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outdoor_temp: Option<f32>,
}

fn default_heater_state() -> String {
    "off".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorResponse {
    #[serde(default = "default_heater_state", deserialize_with = "heater_state_or_off")]
    pub heater_state: String,
    #[serde(default, deserialize_with = "or_default")]
    pub trajectory: Vec<Value>,
    #[serde(default, deserialize_with = "or_default")]
    pub strategy: Map<String, Value>,
    #[serde(default, deserialize_with = "age_seconds")]
    pub prediction_age_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulesResponse {
    #[serde(default, deserialize_with = "or_default")]
    pub schedules: ScheduleSet,
}

// Null or mistyped optional fields fall back to their default instead of failing the body.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

fn heater_state_or_off<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(state) => Ok(state),
        _ => Ok(default_heater_state()),
    }
}

fn age_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let age = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|seconds| seconds.is_finite())
            .map(|seconds| seconds.max(0.0) as u64)
    });
    Ok(age.unwrap_or(0))
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleUpdate<'a> {
    pub active_schedule: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteCommand {
    pub heater_on: bool,
    pub trajectory: Vec<Value>,
    pub strategy: Map<String, Value>,
    pub prediction_age_seconds: u64,
}

impl From<SensorResponse> for RemoteCommand {
    fn from(response: SensorResponse) -> Self {
        Self {
            heater_on: response.heater_state == "on",
            trajectory: response.trajectory,
            strategy: response.strategy,
            prediction_age_seconds: response.prediction_age_seconds,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleCache {
    entry: Option<(ScheduleSet, u64)>,
}

impl ScheduleCache {
    pub fn fresh(&self, now_ms: u64, ttl_ms: u64) -> Option<&ScheduleSet> {
        self.entry
            .as_ref()
            .filter(|(_, fetched_at)| now_ms.saturating_sub(*fetched_at) < ttl_ms)
            .map(|(schedules, _)| schedules)
    }

    pub fn stale(&self) -> Option<&ScheduleSet> {
        self.entry.as_ref().map(|(schedules, _)| schedules)
    }

    // An empty set is refused and leaves the cache untouched.
    pub fn replace(&mut self, schedules: ScheduleSet, now_ms: u64) -> bool {
        if schedules.is_empty() {
            return false;
        }
        self.entry = Some((schedules, now_ms));
        true
    }
}

pub trait RemoteControl: Send + Sync {
    fn send_sensor_data(
        &self,
        reading: &SensorReading,
    ) -> impl Future<Output = Result<RemoteCommand, RemoteError>> + Send;

    fn available_schedules(&self)
        -> impl Future<Output = Result<ScheduleSet, RemoteError>> + Send;

    fn update_room_schedule(&self, name: &str) -> impl Future<Output = bool> + Send;
}
