use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::{ConfigError, OptionsUpdate, PersistedSettings, ThermostatConfig},
    fanout::{self, ActuatorDriver, FanoutReport},
    hysteresis::{Decision, DecisionReason, HeaterAction, Hysteresis},
    remote::{PresetError, RemoteControl, RemoteError, ScheduleName, ScheduleSet},
    types::{ControlMode, SensorReading, ThermostatAttributes, ThermostatStatus},
};

pub trait SensorSource: Send + Sync {
    fn read(&self, entity_id: &str) -> Option<f32>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    SensorUnavailable,
    Idle,
    Switched { on: bool, report: FanoutReport },
    Held(DecisionReason),
    RemoteApplied { heater_on: bool, report: FanoutReport },
    RemoteFailed(RemoteError),
}

#[derive(Debug, Clone)]
struct ControlState {
    mode: ControlMode,
    target_temperature: f32,
    preset: Option<String>,
    heater_on: bool,
    current_temperature: Option<f32>,
    last_switch_ms: Option<u64>,
    remote_available: bool,
    last_remote_success_ms: Option<u64>,
}

pub struct Thermostat<R, A, S> {
    config: ThermostatConfig,
    remote: Arc<R>,
    driver: A,
    sensors: S,
    state: ControlState,
    attributes: ThermostatAttributes,
    presets: ScheduleSet,
}

impl<R, A, S> Thermostat<R, A, S>
where
    R: RemoteControl,
    A: ActuatorDriver,
    S: SensorSource,
{
    pub fn new(
        config: ThermostatConfig,
        mut settings: PersistedSettings,
        remote: Arc<R>,
        driver: A,
        sensors: S,
    ) -> Self {
        settings.sanitize(&config);
        let hysteresis = hysteresis_for(&config);
        let (lower_threshold, upper_threshold) = hysteresis.thresholds(settings.target_temperature);

        Self {
            config,
            remote,
            driver,
            sensors,
            state: ControlState {
                mode: settings.mode,
                target_temperature: settings.target_temperature,
                preset: settings.preset,
                heater_on: false,
                current_temperature: None,
                last_switch_ms: None,
                remote_available: false,
                last_remote_success_ms: None,
            },
            attributes: ThermostatAttributes {
                control_mode: settings.mode,
                lower_threshold,
                upper_threshold,
                ..ThermostatAttributes::default()
            },
            presets: ScheduleSet::new(),
        }
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.config
    }

    pub fn mode(&self) -> ControlMode {
        self.state.mode
    }

    pub fn target_temperature(&self) -> f32 {
        self.state.target_temperature
    }

    pub fn preset(&self) -> Option<&str> {
        self.state.preset.as_deref()
    }

    pub fn is_heater_on(&self) -> bool {
        self.state.heater_on
    }

    pub fn is_remote_available(&self) -> bool {
        self.state.remote_available
    }

    pub fn attributes(&self) -> &ThermostatAttributes {
        &self.attributes
    }

    pub fn presets(&self) -> &ScheduleSet {
        &self.presets
    }

    pub fn persisted(&self) -> PersistedSettings {
        PersistedSettings {
            mode: self.state.mode,
            target_temperature: self.state.target_temperature,
            preset: self.state.preset.clone(),
        }
    }

    pub async fn update_cycle(&mut self, now_ms: u64) -> CycleOutcome {
        let Some(temperature) = self.sensors.read(&self.config.sensor) else {
            debug!(sensor = %self.config.sensor, "sensor unavailable, skipping cycle");
            return CycleOutcome::SensorUnavailable;
        };
        self.state.current_temperature = Some(temperature);

        match self.state.mode {
            ControlMode::Off => self.run_off_cycle(now_ms),
            ControlMode::Local => self.run_local_cycle(temperature, now_ms),
            ControlMode::Auto => self.run_remote_cycle(temperature, now_ms).await,
        }
    }

    pub fn set_target_temperature(&mut self, temperature: f32, now_ms: u64) -> bool {
        if !temperature.is_finite() {
            return false;
        }
        let clamped = self.config.clamp_target(temperature);
        if (self.state.target_temperature - clamped).abs() <= f32::EPSILON {
            return false;
        }
        self.state.target_temperature = clamped;
        self.refresh_thresholds();

        if self.state.mode == ControlMode::Local {
            self.reevaluate_local(now_ms);
        }
        true
    }

    pub fn set_mode(&mut self, mode: ControlMode, now_ms: u64) -> bool {
        let changed = self.state.mode != mode;
        self.state.mode = mode;
        self.attributes.control_mode = mode;
        if changed {
            info!(mode = mode.as_str(), "control mode changed");
        }

        match mode {
            ControlMode::Off => {
                fanout::apply(&self.driver, &self.config.actuators, false);
                if self.state.heater_on {
                    self.state.heater_on = false;
                    self.state.last_switch_ms = Some(now_ms);
                }
            }
            ControlMode::Local => self.reevaluate_local(now_ms),
            ControlMode::Auto => {}
        }

        changed
    }

    pub async fn set_preset(&mut self, name: Option<&str>) -> Result<(), PresetError> {
        let name = ScheduleName::parse(name)?;
        if !self.presets.contains_key(name.as_str()) {
            return Err(PresetError::InvalidPreset(name.as_str().to_string()));
        }

        if !self.remote.update_room_schedule(name.as_str()).await {
            warn!(preset = name.as_str(), "remote rejected preset change");
            return Err(PresetError::UpdateRejected(name.as_str().to_string()));
        }

        info!(preset = name.as_str(), "preset changed");
        self.state.preset = Some(name.as_str().to_string());
        Ok(())
    }

    pub async fn refresh_presets(&mut self) -> Result<&ScheduleSet, RemoteError> {
        self.presets = self.remote.available_schedules().await?;
        Ok(&self.presets)
    }

    pub fn update_options(&mut self, update: &OptionsUpdate) -> Result<bool, ConfigError> {
        let url_changed = self.config.apply_options(update)?;
        self.refresh_thresholds();
        Ok(url_changed)
    }

    pub fn status(&self, now_ms: u64) -> ThermostatStatus {
        let mut attributes = self.attributes.clone();
        attributes.seconds_since_switch = self.seconds_since_switch(now_ms);
        attributes.remote_available = self.state.remote_available;

        ThermostatStatus {
            room_id: self.config.room_id.clone(),
            current_temp: self.state.current_temperature,
            target_temp: self.state.target_temperature,
            min_temp: self.config.min_temp,
            max_temp: self.config.max_temp,
            cold_tolerance: self.config.cold_tolerance,
            hot_tolerance: self.config.hot_tolerance,
            preset: self.state.preset.clone(),
            heater_on: self.state.heater_on,
            seconds_since_remote_success: self
                .state
                .last_remote_success_ms
                .map(|at| now_ms.saturating_sub(at) / 1_000),
            attributes,
        }
    }

    fn reevaluate_local(&mut self, now_ms: u64) {
        match self.sensors.read(&self.config.sensor) {
            Some(temperature) => {
                self.state.current_temperature = Some(temperature);
                self.run_local_cycle(temperature, now_ms);
            }
            None => debug!("sensor unavailable, local re-evaluation skipped"),
        }
    }

    fn run_off_cycle(&mut self, now_ms: u64) -> CycleOutcome {
        if !self.state.heater_on {
            return CycleOutcome::Idle;
        }
        let report = self.switch_heater(false, now_ms);
        CycleOutcome::Switched { on: false, report }
    }

    fn run_local_cycle(&mut self, temperature: f32, now_ms: u64) -> CycleOutcome {
        let hysteresis = hysteresis_for(&self.config);
        let Decision { action, reason } = hysteresis.decide(
            temperature,
            self.state.target_temperature,
            self.state.heater_on,
            self.seconds_since_switch(now_ms),
        );

        let outcome = match action {
            HeaterAction::TurnOn | HeaterAction::TurnOff => {
                let on = action == HeaterAction::TurnOn;
                let report = self.switch_heater(on, now_ms);
                CycleOutcome::Switched { on, report }
            }
            HeaterAction::Hold => {
                if reason == DecisionReason::SwitchDeferred {
                    debug!(temperature, "heater switch deferred by minimum interval");
                }
                CycleOutcome::Held(reason)
            }
        };

        self.refresh_thresholds();
        self.attributes.control_mode = self.state.mode;
        self.attributes.seconds_since_switch = self.seconds_since_switch(now_ms);
        self.attributes.last_decision = Some(reason);
        outcome
    }

    async fn run_remote_cycle(&mut self, temperature: f32, now_ms: u64) -> CycleOutcome {
        let outdoor_temperature = self
            .config
            .outdoor_sensor
            .as_deref()
            .and_then(|sensor| self.sensors.read(sensor));
        let reading = SensorReading {
            temperature,
            outdoor_temperature,
        };

        match self.remote.send_sensor_data(&reading).await {
            Ok(command) => {
                self.state.remote_available = true;
                self.state.last_remote_success_ms = Some(now_ms);

                let report = fanout::apply(&self.driver, &self.config.actuators, command.heater_on);
                if self.state.heater_on != command.heater_on {
                    info!(heater_on = command.heater_on, "remote switched heater");
                    self.state.last_switch_ms = Some(now_ms);
                }
                self.state.heater_on = command.heater_on;

                self.attributes.remote_available = true;
                self.attributes.control_mode = self.state.mode;
                self.attributes.trajectory = command.trajectory;
                self.attributes.strategy = command.strategy;
                self.attributes.prediction_age = command.prediction_age_seconds;
                CycleOutcome::RemoteApplied {
                    heater_on: command.heater_on,
                    report,
                }
            }
            Err(err) => {
                warn!(room = %self.config.room_id, "remote control unavailable: {err}");
                self.state.remote_available = false;
                self.attributes.remote_available = false;
                CycleOutcome::RemoteFailed(err)
            }
        }
    }

    fn switch_heater(&mut self, on: bool, now_ms: u64) -> FanoutReport {
        let report = fanout::apply(&self.driver, &self.config.actuators, on);
        info!(
            heater_on = on,
            dispatched = report.dispatched,
            failed = report.failed,
            "heater switched"
        );
        self.state.heater_on = on;
        self.state.last_switch_ms = Some(now_ms);
        report
    }

    fn seconds_since_switch(&self, now_ms: u64) -> Option<u64> {
        self.state
            .last_switch_ms
            .map(|at| now_ms.saturating_sub(at) / 1_000)
    }

    fn refresh_thresholds(&mut self) {
        let (lower, upper) =
            hysteresis_for(&self.config).thresholds(self.state.target_temperature);
        self.attributes.lower_threshold = lower;
        self.attributes.upper_threshold = upper;
    }
}

fn hysteresis_for(config: &ThermostatConfig) -> Hysteresis {
    Hysteresis {
        cold_tolerance: config.cold_tolerance,
        hot_tolerance: config.hot_tolerance,
        min_switch_interval_secs: config.min_switch_interval_secs,
    }
}
