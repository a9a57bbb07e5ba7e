use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rumqttc::{AsyncClient, Event, Incoming, LastWill, MqttOptions, QoS};
use serde::Serialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{debug, info, warn};

use hvac_common::{
    command::{parse_command, parse_telemetry},
    status_signal, AdminRequests, CommandUpdate, ControlEngine, ControlParams, Evaluation,
    NetworkConfig, StatusSignal, TelemetryUpdate, TOPIC_AMBIENT, TOPIC_AVAILABILITY, TOPIC_CMD,
    TOPIC_STATE,
};

use crate::relays::RelayBank;

const MAX_MQTT_PAYLOAD_BYTES: usize = 512;

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<ControlEngine>>,
    relays: Arc<Mutex<RelayBank>>,
    last_status: Arc<Mutex<StatusSignal>>,
    mqtt: AsyncClient,
}

#[derive(Debug, Serialize)]
struct StatusView {
    #[serde(flatten)]
    state: hvac_common::StatePayload,
    status: &'static str,
    blocked: bool,
    outputs: hvac_common::OutputSet,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let network = resolve_network_config();
    let engine = ControlEngine::new(ControlParams::default());

    let mut mqtt_options = MqttOptions::new("hvac-controller", network.mqtt_host, network.mqtt_port);
    mqtt_options.set_last_will(LastWill::new(
        TOPIC_AVAILABILITY,
        "offline",
        QoS::AtLeastOnce,
        true,
    ));
    if !network.mqtt_user.is_empty() {
        mqtt_options.set_credentials(network.mqtt_user, network.mqtt_pass);
    }

    let (mqtt, eventloop) = AsyncClient::new(mqtt_options, 64);

    let app_state = AppState {
        engine: Arc::new(Mutex::new(engine)),
        relays: Arc::new(Mutex::new(RelayBank::new())),
        last_status: Arc::new(Mutex::new(StatusSignal::Off)),
        mqtt,
    };

    subscribe_topics(&app_state.mqtt).await?;
    spawn_mqtt_loop(app_state.clone(), eventloop);
    spawn_control_loop(app_state.clone());
    spawn_state_publish_loop(app_state.clone());

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/command", post(handle_post_command))
        .route("/api/ambient", post(handle_post_ambient))
        .with_state(app_state);

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("0.0.0.0:{port}")
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn resolve_network_config() -> NetworkConfig {
    let defaults = NetworkConfig::default();
    NetworkConfig {
        mqtt_host: std::env::var("MQTT_HOST").unwrap_or(defaults.mqtt_host),
        mqtt_port: std::env::var("MQTT_PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(defaults.mqtt_port),
        mqtt_user: std::env::var("MQTT_USER").unwrap_or(defaults.mqtt_user),
        mqtt_pass: std::env::var("MQTT_PASS").unwrap_or(defaults.mqtt_pass),
    }
}

async fn subscribe_topics(mqtt: &AsyncClient) -> anyhow::Result<()> {
    for topic in [TOPIC_CMD, TOPIC_AMBIENT] {
        mqtt.subscribe(topic, QoS::AtMostOnce).await?;
    }
    Ok(())
}

fn spawn_mqtt_loop(app_state: AppState, mut eventloop: rumqttc::EventLoop) {
    tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    handle_mqtt_message(&app_state, &message.topic, &message.payload).await;
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    if let Err(err) = app_state
                        .mqtt
                        .publish(TOPIC_AVAILABILITY, QoS::AtLeastOnce, true, "online")
                        .await
                    {
                        warn!("availability publish failed: {err}");
                    }
                    publish_state(&app_state).await;
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

// Timers are sampled, not scheduled: this tick makes time-gated transitions
// (stage-2 delay, dwell expiry) visible at most one period after their
// deadline, even with no inbound traffic.
fn spawn_control_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            run_cycle(&app_state).await;
        }
    });
}

fn spawn_state_publish_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            publish_state(&app_state).await;
        }
    });
}

/// One dispatch step: the inbound payload mutates state, then exactly one
/// evaluation, one actuator apply, and one state publication follow, in order.
async fn handle_mqtt_message(app_state: &AppState, topic: &str, payload: &[u8]) {
    if payload.len() > MAX_MQTT_PAYLOAD_BYTES {
        warn!(
            "dropping oversized MQTT payload on topic {} ({} bytes)",
            topic,
            payload.len()
        );
        return;
    }

    match topic {
        TOPIC_CMD => {
            let update = match parse_command(payload) {
                Ok(update) => update,
                Err(err) => {
                    debug!("dropping malformed command payload: {err}");
                    return;
                }
            };
            apply_command(app_state, &update).await;
        }
        TOPIC_AMBIENT => {
            let update = match parse_telemetry(payload) {
                Ok(update) => update,
                Err(err) => {
                    debug!("dropping malformed ambient payload: {err}");
                    return;
                }
            };
            apply_telemetry(app_state, &update).await;
        }
        _ => return,
    }

    run_cycle(app_state).await;
    publish_state(app_state).await;
}

async fn apply_command(app_state: &AppState, update: &CommandUpdate) {
    let admin = {
        let mut engine = app_state.engine.lock().await;
        engine.apply_command(update)
    };
    note_admin_requests(admin);
}

async fn apply_telemetry(app_state: &AppState, update: &TelemetryUpdate) {
    let mut engine = app_state.engine.lock().await;
    engine.apply_telemetry(update);
}

// Provisioning and factory reset live outside the control core; the host
// build has no captive portal to open.
fn note_admin_requests(admin: AdminRequests) {
    if admin.open_portal {
        warn!("portal request received; provisioning is not available on host builds");
    }
    if admin.wifi_reset {
        warn!("wifi reset request received; provisioning is not available on host builds");
    }
}

async fn run_cycle(app_state: &AppState) -> Evaluation {
    let (eval, mode) = {
        let mut engine = app_state.engine.lock().await;
        let eval = engine.evaluate(monotonic_s());
        (eval, engine.mode())
    };

    {
        let mut relays = app_state.relays.lock().await;
        relays.apply(eval.outputs);
    }

    let status = status_signal(mode, &eval);
    {
        let mut last = app_state.last_status.lock().await;
        if *last != status {
            info!(status = status.as_str(), "status signal changed");
            *last = status;
        }
    }

    eval
}

async fn publish_state(app_state: &AppState) {
    let payload = {
        let engine = app_state.engine.lock().await;
        serde_json::to_vec(&engine.state_payload())
    };

    match payload {
        Ok(body) => {
            if let Err(err) = app_state
                .mqtt
                .publish(TOPIC_STATE, QoS::AtLeastOnce, true, body)
                .await
            {
                warn!("state publish failed: {err}");
            }
        }
        Err(err) => warn!("state serialization failed: {err}"),
    }
}

async fn build_status_view(app_state: &AppState, eval: Evaluation) -> StatusView {
    let (state, mode) = {
        let engine = app_state.engine.lock().await;
        (engine.state_payload(), engine.mode())
    };

    StatusView {
        state,
        status: status_signal(mode, &eval).as_str(),
        blocked: eval.blocked,
        outputs: eval.outputs,
    }
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let eval = run_cycle(&state).await;
    Json(build_status_view(&state, eval).await)
}

async fn handle_post_command(
    State(state): State<AppState>,
    Json(update): Json<CommandUpdate>,
) -> impl IntoResponse {
    apply_command(&state, &update).await;
    let eval = run_cycle(&state).await;
    publish_state(&state).await;
    Json(build_status_view(&state, eval).await)
}

async fn handle_post_ambient(
    State(state): State<AppState>,
    Json(update): Json<TelemetryUpdate>,
) -> impl IntoResponse {
    apply_telemetry(&state, &update).await;
    let eval = run_cycle(&state).await;
    publish_state(&state).await;
    Json(build_status_view(&state, eval).await)
}

fn monotonic_s() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs()
}
