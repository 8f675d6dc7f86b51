use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use rumqttc::{AsyncClient, QoS};

use heatly_common::{
    command_topic, parse_sensor_state, Actuator, ActuatorCommand, ActuatorDriver, ActuatorError,
    SensorSource,
};

#[derive(Clone)]
pub struct MqttActuatorDriver {
    mqtt: AsyncClient,
}

impl MqttActuatorDriver {
    pub fn new(mqtt: AsyncClient) -> Self {
        Self { mqtt }
    }
}

impl ActuatorDriver for MqttActuatorDriver {
    fn dispatch(&self, actuator: &Actuator, command: ActuatorCommand) -> Result<(), ActuatorError> {
        self.mqtt
            .try_publish(
                command_topic(actuator.entity_id(), command.service()),
                QoS::AtLeastOnce,
                false,
                command.payload(),
            )
            .map_err(|err| ActuatorError {
                entity_id: actuator.entity_id().to_string(),
                service: command.service(),
                reason: err.to_string(),
            })
    }
}

#[derive(Clone, Default)]
pub struct SensorCache {
    states: Arc<RwLock<HashMap<String, String>>>,
}

impl SensorCache {
    pub fn update(&self, entity_id: &str, raw: &str) {
        let mut states = self
            .states
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        states.insert(entity_id.to_string(), raw.trim().to_string());
    }

    pub fn raw(&self, entity_id: &str) -> Option<String> {
        let states = self
            .states
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        states.get(entity_id).cloned()
    }
}

impl SensorSource for SensorCache {
    fn read(&self, entity_id: &str) -> Option<f32> {
        self.raw(entity_id)
            .as_deref()
            .and_then(parse_sensor_state)
    }
}
