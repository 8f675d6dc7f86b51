use serde::Serialize;

pub const MIN_SWITCH_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterAction {
    TurnOn,
    TurnOff,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionReason {
    BelowThreshold,
    AboveThreshold,
    SwitchDeferred,
    Deadband,
    Heating,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: HeaterAction,
    pub reason: DecisionReason,
}

impl Decision {
    fn new(action: HeaterAction, reason: DecisionReason) -> Self {
        Self { action, reason }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    pub cold_tolerance: f32,
    pub hot_tolerance: f32,
    pub min_switch_interval_secs: u64,
}

impl Default for Hysteresis {
    fn default() -> Self {
        Self {
            cold_tolerance: 0.5,
            hot_tolerance: 0.5,
            min_switch_interval_secs: MIN_SWITCH_INTERVAL_SECS,
        }
    }
}

impl Hysteresis {
    pub fn thresholds(&self, target: f32) -> (f32, f32) {
        (target - self.cold_tolerance, target + self.hot_tolerance)
    }

    // `seconds_since_switch` is None when the heater has never been switched.
    pub fn decide(
        &self,
        current: f32,
        target: f32,
        currently_on: bool,
        seconds_since_switch: Option<u64>,
    ) -> Decision {
        let (lower, upper) = self.thresholds(target);
        let should_on = current <= lower;
        let should_off = current >= upper;
        let can_switch = seconds_since_switch
            .map(|elapsed| elapsed >= self.min_switch_interval_secs)
            .unwrap_or(true);

        if should_on && !currently_on {
            if can_switch {
                Decision::new(HeaterAction::TurnOn, DecisionReason::BelowThreshold)
            } else {
                Decision::new(HeaterAction::Hold, DecisionReason::SwitchDeferred)
            }
        } else if should_off && currently_on {
            if can_switch {
                Decision::new(HeaterAction::TurnOff, DecisionReason::AboveThreshold)
            } else {
                Decision::new(HeaterAction::Hold, DecisionReason::SwitchDeferred)
            }
        } else if should_on {
            Decision::new(HeaterAction::Hold, DecisionReason::Heating)
        } else if should_off {
            Decision::new(HeaterAction::Hold, DecisionReason::Idle)
        } else {
            Decision::new(HeaterAction::Hold, DecisionReason::Deadband)
        }
    }
}
