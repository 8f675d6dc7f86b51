use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{Mutex, Notify},
    time::MissedTickBehavior,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use heatly_common::{
    attributes_topic, entity_from_state_topic, state_topic, ControlMode, CycleOutcome,
    OptionsUpdate, PresetError, RuntimeConfig, Thermostat, ThermostatConfig,
};

use crate::{
    bridge::{MqttActuatorDriver, SensorCache},
    remote::{ClientOptions, HeatlyClient},
};

type HeatlyThermostat = Thermostat<HeatlyClient, MqttActuatorDriver, SensorCache>;

#[derive(Clone)]
struct AppState {
    thermostat: Arc<Mutex<HeatlyThermostat>>,
    sensors: SensorCache,
    room_sensor: Arc<String>,
    cycle_trigger: Arc<Notify>,
    mqtt: AsyncClient,
    store: AppStore,
}

#[derive(Clone)]
struct AppStore {
    runtime_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct PresetsView {
    presets: Vec<String>,
    active: Option<String>,
}

#[derive(Debug, Serialize)]
struct OptionsView {
    #[serde(rename = "coldTolerance")]
    cold_tolerance: f32,
    #[serde(rename = "hotTolerance")]
    hot_tolerance: f32,
    #[serde(rename = "apiUrl")]
    api_url: String,
    #[serde(rename = "apiKeySet")]
    api_key_set: bool,
}

#[derive(Debug, Serialize)]
struct OptionsUpdateResponse {
    #[serde(rename = "restartRequired")]
    restart_required: bool,
    options: OptionsView,
}

const MAX_MQTT_PAYLOAD_BYTES: usize = 256;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    apply_env_overrides(&mut runtime, |name| std::env::var(name).ok());
    runtime
        .thermostat
        .validate()
        .context("invalid thermostat configuration")?;
    runtime.settings.sanitize(&runtime.thermostat);

    let client = HeatlyClient::new(ClientOptions::from_config(&runtime.thermostat))
        .context("failed to build remote control client")?;
    info!(
        room = %runtime.thermostat.room_id,
        api = client.base_url(),
        mode = runtime.settings.mode.as_str(),
        "starting heatly controller"
    );

    let mut mqtt_options = MqttOptions::new(
        "heatly-controller",
        runtime.network.mqtt_host.clone(),
        runtime.network.mqtt_port,
    );
    if !runtime.network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(
            runtime.network.mqtt_user.clone(),
            runtime.network.mqtt_pass.clone(),
        );
    }
    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let scan_interval = Duration::from_secs(runtime.thermostat.scan_interval_secs);
    let mut watched = vec![runtime.thermostat.sensor.clone()];
    watched.extend(runtime.thermostat.outdoor_sensor.clone());

    let app_state = build_state(runtime, Arc::new(client), mqtt, store);

    subscribe_topics(&app_state.mqtt, &watched).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_control_loop(app_state.clone(), scan_interval);

    let app = router(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_state(
    runtime: RuntimeConfig,
    client: Arc<HeatlyClient>,
    mqtt: AsyncClient,
    store: AppStore,
) -> AppState {
    let sensors = SensorCache::default();
    let room_sensor = Arc::new(runtime.thermostat.sensor.clone());
    let thermostat = Thermostat::new(
        runtime.thermostat,
        runtime.settings,
        client,
        MqttActuatorDriver::new(mqtt.clone()),
        sensors.clone(),
    );

    AppState {
        thermostat: Arc::new(Mutex::new(thermostat)),
        sensors,
        room_sensor,
        cycle_trigger: Arc::new(Notify::new()),
        mqtt,
        store,
    }
}

fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/target", post(handle_set_target))
        .route("/api/mode", post(handle_set_mode))
        .route("/api/presets", get(handle_get_presets))
        .route("/api/preset", post(handle_set_preset))
        .route(
            "/api/options",
            get(handle_get_options).put(handle_put_options),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

fn apply_env_overrides(runtime: &mut RuntimeConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(room_id) = var("HEATLY_ROOM_ID") {
        runtime.thermostat.room_id = room_id;
    }
    if let Some(api_url) = var("HEATLY_API_URL") {
        runtime.thermostat.api_url = api_url.trim().trim_end_matches('/').to_string();
    }
    if let Some(api_key) = var("HEATLY_API_KEY") {
        runtime.thermostat.api_key = Some(api_key).filter(|key| !key.trim().is_empty());
    }
    if let Some(host) = var("MQTT_HOST") {
        runtime.network.mqtt_host = host;
    }
    if let Some(port) = var("MQTT_PORT").and_then(|value| value.parse::<u16>().ok()) {
        runtime.network.mqtt_port = port;
    }
    if let Some(user) = var("MQTT_USER") {
        runtime.network.mqtt_user = user;
    }
    if let Some(pass) = var("MQTT_PASS") {
        runtime.network.mqtt_pass = pass;
    }
}

async fn subscribe_topics(mqtt: &AsyncClient, entities: &[String]) -> anyhow::Result<()> {
    for entity_id in entities {
        mqtt.subscribe(state_topic(entity_id), QoS::AtMostOnce)
            .await
            .with_context(|| format!("failed to subscribe to {entity_id}"))?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if let Err(err) = handle_mqtt_message(&app_state, &message.topic, &message.payload)
                    {
                        warn!("mqtt message handling error: {err:#}");
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("mqtt poll error: {err}");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    });
}

fn handle_mqtt_message(app_state: &AppState, topic: &str, payload: &[u8]) -> anyhow::Result<()> {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return Ok(());
    }
    let Some(entity_id) = entity_from_state_topic(topic) else {
        return Ok(());
    };

    let state = std::str::from_utf8(payload).context("non utf8 mqtt payload")?;
    app_state.sensors.update(entity_id, state);

    if entity_id == app_state.room_sensor.as_str() {
        app_state.cycle_trigger.notify_one();
    }
    Ok(())
}

fn spawn_control_loop(app_state: AppState, scan_interval: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(scan_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let periodic = tokio::select! {
                _ = interval.tick() => true,
                _ = app_state.cycle_trigger.notified() => false,
            };
            run_cycle(&app_state, periodic).await;
        }
    });
}

async fn run_cycle(app_state: &AppState, refresh_presets: bool) {
    let now_ms = monotonic_ms();
    let status = {
        let mut thermostat = app_state.thermostat.lock().await;
        let outcome = thermostat.update_cycle(now_ms).await;
        debug!(?outcome, "update cycle finished");

        if refresh_presets {
            if let Err(err) = thermostat.refresh_presets().await {
                debug!("preset refresh failed: {err}");
            }
        }

        if outcome == CycleOutcome::SensorUnavailable {
            return;
        }
        thermostat.status(now_ms)
    };

    match serde_json::to_vec(&status) {
        Ok(body) => {
            if let Err(err) = app_state
                .mqtt
                .publish(attributes_topic(&status.room_id), QoS::AtLeastOnce, true, body)
                .await
            {
                warn!("attribute publish failed: {err}");
            }
        }
        Err(err) => warn!("attribute serialization failed: {err}"),
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let now_ms = monotonic_ms();
    let status = state.thermostat.lock().await.status(now_ms);
    Json(status)
}

async fn handle_set_target(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(target) = value.parse::<f32>().ok().filter(|target| target.is_finite()) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };

    let changed = {
        let mut thermostat = state.thermostat.lock().await;
        thermostat.set_target_temperature(target, monotonic_ms())
    };

    if changed {
        if let Err(err) = persist_settings(&state).await {
            warn!("failed to persist target update: {err:#}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to persist runtime settings",
            );
        }
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_set_mode(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Some(mode) = ControlMode::parse(value) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid mode. Use 'AUTO', 'LOCAL', 'HEAT' or 'OFF'",
        );
    };

    let changed = {
        let mut thermostat = state.thermostat.lock().await;
        thermostat.set_mode(mode, monotonic_ms())
    };

    if changed {
        if mode == ControlMode::Auto {
            state.cycle_trigger.notify_one();
        }
        if let Err(err) = persist_settings(&state).await {
            warn!("failed to persist mode update: {err:#}");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to persist runtime settings",
            );
        }
    }

    handle_get_status(State(state)).await.into_response()
}

async fn handle_get_presets(State(state): State<AppState>) -> impl IntoResponse {
    let thermostat = state.thermostat.lock().await;
    Json(PresetsView {
        presets: thermostat.presets().keys().cloned().collect(),
        active: thermostat.preset().map(str::to_string),
    })
}

async fn handle_set_preset(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let result = {
        let mut thermostat = state.thermostat.lock().await;
        thermostat
            .set_preset(params.get("value").map(String::as_str))
            .await
    };

    match result {
        Ok(()) => {}
        Err(err @ PresetError::UpdateRejected(_)) => {
            return error_response(StatusCode::BAD_GATEWAY, &err.to_string());
        }
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }

    if let Err(err) = persist_settings(&state).await {
        warn!("failed to persist preset update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist runtime settings",
        );
    }

    handle_get_presets(State(state)).await.into_response()
}

async fn handle_get_options(State(state): State<AppState>) -> impl IntoResponse {
    let thermostat = state.thermostat.lock().await;
    Json(build_options_view(thermostat.config()))
}

async fn handle_put_options(
    State(state): State<AppState>,
    Json(update): Json<OptionsUpdate>,
) -> impl IntoResponse {
    let (restart_required, options) = {
        let mut thermostat = state.thermostat.lock().await;
        match thermostat.update_options(&update) {
            Ok(url_changed) => (url_changed, build_options_view(thermostat.config())),
            Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        }
    };
    if restart_required {
        info!(api = %options.api_url, "api url changed, restart required");
    }

    if let Err(err) = persist_options(&state).await {
        warn!("failed to persist options update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist options",
        );
    }

    Json(OptionsUpdateResponse {
        restart_required,
        options,
    })
    .into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("HEATLY_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.heatly"));
        Self::at(data_dir)
    }

    fn at(data_dir: PathBuf) -> Self {
        Self {
            runtime_path: Arc::new(data_dir.join("runtime.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_runtime_config(&self) -> anyhow::Result<RuntimeConfig> {
        let _guard = self.lock.lock().await;
        self.read_unlocked().await
    }

    async fn update_runtime_config(
        &self,
        apply: impl FnOnce(&mut RuntimeConfig),
    ) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let mut runtime = self.read_unlocked().await?;
        apply(&mut runtime);
        self.write_unlocked(&runtime).await
    }

    async fn read_unlocked(&self) -> anyhow::Result<RuntimeConfig> {
        match tokio::fs::read(self.runtime_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<RuntimeConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn write_unlocked(&self, runtime: &RuntimeConfig) -> anyhow::Result<()> {
        let path = self.runtime_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(runtime)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}

async fn persist_settings(state: &AppState) -> anyhow::Result<()> {
    let settings = state.thermostat.lock().await.persisted();

    state
        .store
        .update_runtime_config(|runtime| runtime.settings = settings)
        .await
}

async fn persist_options(state: &AppState) -> anyhow::Result<()> {
    let (cold_tolerance, hot_tolerance, api_url) = {
        let thermostat = state.thermostat.lock().await;
        let config = thermostat.config();
        (config.cold_tolerance, config.hot_tolerance, config.api_url.clone())
    };

    state
        .store
        .update_runtime_config(|runtime| {
            runtime.thermostat.cold_tolerance = cold_tolerance;
            runtime.thermostat.hot_tolerance = hot_tolerance;
            runtime.thermostat.api_url = api_url;
        })
        .await
}

fn build_options_view(config: &ThermostatConfig) -> OptionsView {
    OptionsView {
        cold_tolerance: config.cold_tolerance,
        hot_tolerance: config.hot_tolerance,
        api_url: config.api_url.clone(),
        api_key_set: config.api_key.is_some(),
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use heatly_common::{Actuator, ControlMode, PersistedSettings};
    use serde_json::{json, Value};

    use super::*;
    use pretty_assertions::assert_eq;

    struct TestApp {
        base_url: String,
        state: AppState,
        http: reqwest::Client,
        _eventloop: EventLoop,
    }

    fn data_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("heatly-host-{}-{name}", std::process::id()))
    }

    async fn spawn_app(name: &str) -> TestApp {
        let runtime = RuntimeConfig {
            thermostat: ThermostatConfig {
                room_id: "office".to_string(),
                sensor: "sensor.office".to_string(),
                actuators: vec![Actuator::switch("switch.office_heater")],
                api_url: "http://127.0.0.1:9".to_string(),
                request_timeout_secs: 1,
                ..ThermostatConfig::default()
            },
            settings: PersistedSettings::default(),
            ..RuntimeConfig::default()
        };
        let client = HeatlyClient::new(ClientOptions::from_config(&runtime.thermostat)).unwrap();
        let (mqtt, eventloop) =
            AsyncClient::new(MqttOptions::new("heatly-host-test", "127.0.0.1", 1883), 16);
        let store = AppStore::at(data_dir(name));
        let state = build_state(runtime, Arc::new(client), mqtt, store);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestApp {
            base_url: format!("http://{addr}"),
            state,
            http: reqwest::Client::new(),
            _eventloop: eventloop,
        }
    }

    impl TestApp {
        async fn post(&self, path: &str) -> (u16, Value) {
            let response = self
                .http
                .post(format!("{}{path}", self.base_url))
                .send()
                .await
                .unwrap();
            let status = response.status().as_u16();
            (status, response.json().await.unwrap())
        }
    }

    #[test]
    fn env_overrides_replace_stored_values() {
        let mut runtime = RuntimeConfig::default();
        let vars = HashMap::from([
            ("HEATLY_ROOM_ID", "bedroom"),
            ("HEATLY_API_URL", "https://heatly.example.com/"),
            ("HEATLY_API_KEY", "  "),
            ("MQTT_PORT", "not-a-port"),
            ("MQTT_HOST", "broker.local"),
        ]);

        apply_env_overrides(&mut runtime, |name| {
            vars.get(name).map(|value| value.to_string())
        });

        assert_eq!(runtime.thermostat.room_id, "bedroom");
        assert_eq!(runtime.thermostat.api_url, "https://heatly.example.com");
        assert_eq!(runtime.thermostat.api_key, None);
        assert_eq!(runtime.network.mqtt_host, "broker.local");
        assert_eq!(runtime.network.mqtt_port, 1883);
    }

    #[test]
    fn mqtt_states_land_in_sensor_cache() {
        let runtime = RuntimeConfig::default();
        let client = HeatlyClient::new(ClientOptions::from_config(&runtime.thermostat)).unwrap();
        let (mqtt, _eventloop) =
            AsyncClient::new(MqttOptions::new("heatly-host-test", "127.0.0.1", 1883), 4);
        let state = build_state(runtime, Arc::new(client), mqtt, AppStore::at(data_dir("mqtt")));

        handle_mqtt_message(&state, "heatly/state/sensor.outside", b"4.5").unwrap();
        handle_mqtt_message(&state, "heatly/state/sensor.living_room_temperature", b"19.0")
            .unwrap();
        handle_mqtt_message(&state, "heatly/other", b"1").unwrap();

        assert_eq!(state.sensors.raw("sensor.outside").as_deref(), Some("4.5"));
        assert_eq!(
            state.sensors.raw("sensor.living_room_temperature").as_deref(),
            Some("19.0")
        );
        assert!(handle_mqtt_message(&state, "heatly/state/sensor.x", &[0xff, 0xfe]).is_err());
    }

    #[tokio::test]
    async fn status_reports_restored_settings() {
        let app = spawn_app("status").await;

        let body: Value = app
            .http
            .get(format!("{}/api/status", app.base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["roomId"], json!("office"));
        assert_eq!(body["controlMode"], json!("AUTO"));
        assert_eq!(body["targetTemp"], json!(20.0));
        assert_eq!(body["remoteAvailable"], json!(false));
    }

    #[tokio::test]
    async fn concurrent_store_updates_keep_both_changes() {
        let dir = data_dir("concurrent-store");
        let _ = std::fs::remove_dir_all(&dir);
        let store = AppStore::at(dir);

        for round in 0..20 {
            let target = 18.0 + round as f32 * 0.1;
            let tolerance = 0.1 + round as f32 * 0.01;
            let (settings, options) = tokio::join!(
                store.update_runtime_config(|runtime| runtime.settings.target_temperature = target),
                store.update_runtime_config(|runtime| runtime.thermostat.cold_tolerance = tolerance),
            );
            settings.unwrap();
            options.unwrap();

            let stored = store.load_runtime_config().await.unwrap();
            assert_eq!(stored.settings.target_temperature, target);
            assert_eq!(stored.thermostat.cold_tolerance, tolerance);
        }
    }

    #[tokio::test]
    async fn heat_mode_maps_to_local_and_is_persisted() {
        let app = spawn_app("mode").await;

        let (status, body) = app.post("/api/mode?value=heat").await;

        assert_eq!(status, 200);
        assert_eq!(body["controlMode"], json!("LOCAL"));
        let stored = app.state.store.load_runtime_config().await.unwrap();
        assert_eq!(stored.settings.mode, ControlMode::Local);
    }

    #[tokio::test]
    async fn unknown_mode_is_rejected() {
        let app = spawn_app("bad-mode").await;

        let (status, body) = app.post("/api/mode?value=cool").await;

        assert_eq!(status, 400);
        assert!(body["error"].as_str().unwrap().contains("Invalid mode"));
    }

    #[tokio::test]
    async fn target_is_validated_and_clamped() {
        let app = spawn_app("target").await;

        let (status, _) = app.post("/api/target?value=warm").await;
        assert_eq!(status, 400);
        let (status, _) = app.post("/api/target").await;
        assert_eq!(status, 400);

        let (status, body) = app.post("/api/target?value=50").await;
        assert_eq!(status, 200);
        assert_eq!(body["targetTemp"], json!(35.0));
    }

    #[tokio::test]
    async fn preset_requests_are_validated_before_the_remote() {
        let app = spawn_app("preset").await;

        let (status, body) = app.post("/api/preset?value=%20%20").await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], json!("schedule name cannot be empty"));

        let (status, _) = app.post("/api/preset?value=away").await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn options_update_reports_restart_for_url_change() {
        let app = spawn_app("options").await;

        let response = app
            .http
            .put(format!("{}/api/options", app.base_url))
            .json(&json!({ "hotTolerance": 1.0, "apiUrl": "http://heatly.lan:5364" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let body: Value = response.json().await.unwrap();

        assert_eq!(body["restartRequired"], json!(true));
        assert_eq!(body["options"]["hotTolerance"], json!(1.0));
        let stored = app.state.store.load_runtime_config().await.unwrap();
        assert_eq!(stored.thermostat.api_url, "http://heatly.lan:5364");
    }

    #[tokio::test]
    async fn invalid_options_leave_config_untouched() {
        let app = spawn_app("bad-options").await;

        let response = app
            .http
            .put(format!("{}/api/options", app.base_url))
            .json(&json!({ "coldTolerance": 0.05 }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 400);
        let thermostat = app.state.thermostat.lock().await;
        assert_eq!(thermostat.config().cold_tolerance, 0.5);
    }
}
