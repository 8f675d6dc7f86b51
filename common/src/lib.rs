pub mod config;
pub mod fanout;
pub mod hysteresis;
pub mod remote;
pub mod thermostat;
pub mod topics;
pub mod types;

pub use config::{
    ConfigError, NetworkConfig, OptionsUpdate, PersistedSettings, RuntimeConfig, ThermostatConfig,
};
pub use fanout::{Actuator, ActuatorCommand, ActuatorDriver, ActuatorError, ActuatorKind, FanoutReport};
pub use hysteresis::{Decision, DecisionReason, HeaterAction, Hysteresis};
pub use remote::{PresetError, RemoteCommand, RemoteControl, RemoteError, ScheduleSet};
pub use thermostat::{CycleOutcome, SensorSource, Thermostat};
pub use topics::*;
pub use types::{
    parse_sensor_state, ControlMode, SensorReading, ThermostatAttributes, ThermostatStatus,
};
