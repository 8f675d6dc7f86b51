pub const TOPIC_STATE_PREFIX: &str = "heatly/state/";
pub const TOPIC_STATE_WILDCARD: &str = "heatly/state/#";
pub const TOPIC_CMND_PREFIX: &str = "heatly/cmnd/";

pub fn state_topic(entity_id: &str) -> String {
    format!("{TOPIC_STATE_PREFIX}{entity_id}")
}

pub fn entity_from_state_topic(topic: &str) -> Option<&str> {
    topic
        .strip_prefix(TOPIC_STATE_PREFIX)
        .filter(|entity_id| !entity_id.is_empty())
}

pub fn command_topic(entity_id: &str, service: &str) -> String {
    format!("{TOPIC_CMND_PREFIX}{entity_id}/{service}")
}

pub fn attributes_topic(room_id: &str) -> String {
    format!("heatly/{room_id}/attributes")
}
