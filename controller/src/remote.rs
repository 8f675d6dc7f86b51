use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use heatly_common::{
    remote::{
        ScheduleCache, ScheduleName, SchedulesResponse, ScheduleUpdate, SensorPayload,
        SensorResponse, API_KEY_HEADER,
    },
    RemoteCommand, RemoteControl, RemoteError, ScheduleSet, SensorReading, ThermostatConfig,
};

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub room_id: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub schedule_ttl: Duration,
}

impl ClientOptions {
    pub fn from_config(config: &ThermostatConfig) -> Self {
        Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            room_id: config.room_id.clone(),
            api_key: config
                .api_key
                .clone()
                .filter(|key| !key.trim().is_empty()),
            timeout: Duration::from_secs(config.request_timeout_secs),
            schedule_ttl: Duration::from_secs(config.schedule_cache_secs),
        }
    }
}

pub struct HeatlyClient {
    http: Client,
    options: ClientOptions,
    cache: Mutex<ScheduleCache>,
    started: Instant,
}

impl HeatlyClient {
    pub fn new(options: ClientOptions) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(options.timeout)
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            http,
            options,
            cache: Mutex::new(ScheduleCache::default()),
            started: Instant::now(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.options.base_url
    }

    #[cfg(test)]
    async fn cached_schedules(&self) -> Option<ScheduleSet> {
        self.cache.lock().await.stale().cloned()
    }

    fn room_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/room/{}/{suffix}",
            self.options.base_url, self.options.room_id
        )
    }

    fn with_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.options.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started
            .elapsed()
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    async fn fetch_schedules(&self) -> Result<ScheduleSet, RemoteError> {
        let url = format!("{}/api/schedules", self.options.base_url);
        let response = self
            .with_key(self.http.get(&url))
            .send()
            .await
            .map_err(classify)?;
        if response.status() != StatusCode::OK {
            return Err(RemoteError::from_status(response.status().as_u16()));
        }

        let body: SchedulesResponse = response.json().await.map_err(classify)?;
        Ok(body.schedules)
    }
}

impl RemoteControl for HeatlyClient {
    async fn send_sensor_data(&self, reading: &SensorReading) -> Result<RemoteCommand, RemoteError> {
        let payload = SensorPayload {
            temperature: reading.temperature,
            timestamp: Utc::now().timestamp(),
            outdoor_temp: reading.outdoor_temperature,
        };

        let response = self
            .with_key(self.http.post(self.room_url("sensor")))
            .json(&payload)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RemoteError::from_status(status.as_u16()));
        }

        let body: SensorResponse = response.json().await.map_err(classify)?;
        debug!(heater_state = %body.heater_state, "sensor data accepted");
        Ok(body.into())
    }

    async fn available_schedules(&self) -> Result<ScheduleSet, RemoteError> {
        let ttl_ms = self
            .options
            .schedule_ttl
            .as_millis()
            .try_into()
            .unwrap_or(u64::MAX);

        let mut cache = self.cache.lock().await;
        if let Some(schedules) = cache.fresh(self.elapsed_ms(), ttl_ms) {
            return Ok(schedules.clone());
        }

        let schedules = self.fetch_schedules().await?;
        if !cache.replace(schedules.clone(), self.elapsed_ms()) {
            return Err(RemoteError::EmptySchedules);
        }
        Ok(schedules)
    }

    async fn update_room_schedule(&self, name: &str) -> bool {
        let Ok(name) = ScheduleName::parse(Some(name)) else {
            return false;
        };

        let result = self
            .with_key(self.http.post(self.room_url("schedule")))
            .json(&ScheduleUpdate {
                active_schedule: name.as_str(),
            })
            .send()
            .await;

        match result {
            Ok(response) if response.status() == StatusCode::OK => true,
            Ok(response) => {
                warn!(
                    schedule = name.as_str(),
                    "schedule update rejected: {}",
                    RemoteError::from_status(response.status().as_u16())
                );
                false
            }
            Err(err) => {
                warn!(schedule = name.as_str(), "schedule update failed: {}", classify(err));
                false
            }
        }
    }
}

fn classify(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout
    } else {
        RemoteError::Transport(err.to_string())
    }
}
