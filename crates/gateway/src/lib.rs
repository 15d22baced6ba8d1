#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use common::{HealthAlerts, HealthSnapshot, HealthThresholds, Hotkey, evaluate_health};
use miner::{
    AdmissionConfig, AdmissionVerdict, FulfillmentConfig, FulfillmentMetrics, FulfillmentService,
    admit, priority_of,
};
use parking_lot::RwLock;
use pricing::{MockPricingSource, PricingSource, SkyApiClient, SkyApiConfig};
use protocol::{Offer, QueryBatch, SearchIntent};
use refdata::ReferenceData;
use registry::StaticMetagraph;
use scoring::{ScoreStore, ScoreTable};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use transport::HttpBatchTransport;
use validator::{CycleReport, SynthesizerConfig, ValidatorConfig, ValidatorNode};

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub bind_addr: String,
    pub hotkey: Hotkey,
    pub markets_file: String,
    pub airports_file: String,
    pub peers_file: Option<String>,
    pub scores_file: String,
    pub batch_size: usize,
    pub sample_size: usize,
    pub dispatch_timeout_ms: u64,
    pub propagate_intent_fields: bool,
    pub allow_non_registered: bool,
    pub force_validator_permit: bool,
    pub offers_per_query: usize,
    pub sky_api_key: Option<String>,
    pub sky_api_url: Option<String>,
    pub sky_api_host: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_owned(),
            hotkey: "farepulse-node".to_owned(),
            markets_file: "data/markets.csv".to_owned(),
            airports_file: "data/total_airports.csv".to_owned(),
            peers_file: None,
            scores_file: "data/scores.json".to_owned(),
            batch_size: 10,
            sample_size: 10,
            dispatch_timeout_ms: 12_000,
            propagate_intent_fields: false,
            allow_non_registered: false,
            force_validator_permit: false,
            offers_per_query: 1,
            sky_api_key: None,
            sky_api_url: None,
            sky_api_host: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_string("FAREPULSE_BIND", &defaults.bind_addr),
            hotkey: env_string("FAREPULSE_HOTKEY", &defaults.hotkey),
            markets_file: env_string("FAREPULSE_MARKETS_FILE", &defaults.markets_file),
            airports_file: env_string("FAREPULSE_AIRPORTS_FILE", &defaults.airports_file),
            peers_file: env_optional("FAREPULSE_PEERS_FILE"),
            scores_file: env_string("FAREPULSE_SCORES_FILE", &defaults.scores_file),
            batch_size: env_parse("FAREPULSE_BATCH_SIZE", defaults.batch_size),
            sample_size: env_parse("FAREPULSE_SAMPLE_SIZE", defaults.sample_size),
            dispatch_timeout_ms: env_parse("FAREPULSE_DISPATCH_TIMEOUT_MS", defaults.dispatch_timeout_ms),
            propagate_intent_fields: env_bool("FAREPULSE_PROPAGATE_INTENT_FIELDS", false),
            allow_non_registered: env_bool("FAREPULSE_ALLOW_NON_REGISTERED", false),
            force_validator_permit: env_bool("FAREPULSE_FORCE_VALIDATOR_PERMIT", false),
            offers_per_query: env_parse("FAREPULSE_OFFERS_PER_QUERY", defaults.offers_per_query),
            sky_api_key: env_optional("SKY_API_KEY"),
            sky_api_url: env_optional("SKY_API_URL"),
            sky_api_host: env_optional("SKY_API_HOST"),
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    match std::env::var(name).ok().map(|value| value.trim().to_owned()) {
        Some(value) if !value.is_empty() => value,
        _ => default.to_owned(),
    }
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| parse_env_bool(value.trim()))
        .unwrap_or(default)
}

fn parse_env_bool(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[derive(Default)]
struct ValidatorHealth {
    last_report: CycleReport,
    empty_cycle_streak: u32,
}

#[derive(Clone)]
pub struct ValidatorState {
    node: Arc<ValidatorNode<HttpBatchTransport, StaticMetagraph>>,
    store: Arc<ScoreStore>,
    // Serializes whole cycles: one cycle's reward application must finish
    // before the next cycle touches the score table.
    cycle_gate: Arc<tokio::sync::Mutex<()>>,
    health: Arc<RwLock<ValidatorHealth>>,
    thresholds: HealthThresholds,
}

impl ValidatorState {
    pub fn new(
        node: ValidatorNode<HttpBatchTransport, StaticMetagraph>,
        store: ScoreStore,
        thresholds: HealthThresholds,
    ) -> Self {
        Self {
            node: Arc::new(node),
            store: Arc::new(store),
            cycle_gate: Arc::new(tokio::sync::Mutex::new(())),
            health: Arc::new(RwLock::new(ValidatorHealth::default())),
            thresholds,
        }
    }
}

#[derive(Clone)]
pub struct MinerState {
    service: Arc<FulfillmentService<Box<dyn PricingSource>>>,
    metagraph: Arc<StaticMetagraph>,
    admission: AdmissionConfig,
}

impl MinerState {
    pub fn new(
        service: FulfillmentService<Box<dyn PricingSource>>,
        metagraph: StaticMetagraph,
        admission: AdmissionConfig,
    ) -> Self {
        Self {
            service: Arc::new(service),
            metagraph: Arc::new(metagraph),
            admission,
        }
    }
}

pub fn validator_state(config: &GatewayConfig) -> Result<ValidatorState> {
    let refdata = ReferenceData::load(&config.markets_file, &config.airports_file)
        .context("load reference data")?;
    let metagraph = load_metagraph(config)?;
    let transport = HttpBatchTransport::new(config.hotkey.clone(), metagraph.endpoints())
        .context("build batch transport")?;
    let node = ValidatorNode::new(
        config.hotkey.clone(),
        ValidatorConfig {
            synthesizer: SynthesizerConfig {
                max_batch_size: config.batch_size,
                propagate_intent_fields: config.propagate_intent_fields,
                ..SynthesizerConfig::default()
            },
            sample_size: config.sample_size,
            dispatch_timeout: Duration::from_millis(config.dispatch_timeout_ms.max(1)),
        },
        refdata,
        metagraph,
        transport,
    );
    let store = ScoreStore::new(&config.scores_file).context("open score store")?;
    Ok(ValidatorState::new(node, store, HealthThresholds::default()))
}

pub fn miner_state(config: &GatewayConfig) -> Result<MinerState> {
    let metagraph = load_metagraph(config)?;
    let pricing = select_pricing_source(config)?;
    let service = FulfillmentService::new(
        pricing,
        FulfillmentConfig {
            offers_per_query: config.offers_per_query,
        },
    );
    Ok(MinerState::new(
        service,
        metagraph,
        AdmissionConfig {
            allow_non_registered: config.allow_non_registered,
            force_validator_permit: config.force_validator_permit,
        },
    ))
}

fn load_metagraph(config: &GatewayConfig) -> Result<StaticMetagraph> {
    match &config.peers_file {
        Some(path) => StaticMetagraph::from_json_file(path).context("load peers file"),
        None => {
            tracing::warn!("no peers file configured, starting with an empty metagraph");
            Ok(StaticMetagraph::default())
        }
    }
}

pub fn select_pricing_source(config: &GatewayConfig) -> Result<Box<dyn PricingSource>> {
    match &config.sky_api_key {
        Some(key) if !key.is_empty() => {
            let mut api_config = SkyApiConfig::default();
            api_config.api_key = key.clone();
            if let Some(url) = &config.sky_api_url {
                api_config.endpoint = url.clone();
            }
            if let Some(host) = &config.sky_api_host {
                api_config.api_host = host.clone();
            }
            let client = SkyApiClient::new(api_config).context("build pricing client")?;
            Ok(Box::new(client))
        }
        _ => {
            tracing::warn!("no pricing API key configured, serving synthetic offers");
            Ok(Box::new(MockPricingSource))
        }
    }
}

pub fn build_validator_router(state: ValidatorState) -> Router {
    Router::new()
        .route("/v1/search", post(search))
        .route("/metrics/cycle", get(cycle_metrics))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn build_miner_router(state: MinerState) -> Router {
    Router::new()
        .route("/v1/batch", post(fulfill))
        .route("/metrics/fulfillment", get(fulfillment_metrics))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn search(
    State(state): State<ValidatorState>,
    Json(intent): Json<SearchIntent>,
) -> Json<Vec<Offer>> {
    let _cycle = state.cycle_gate.lock().await;
    let mut scores = match state.store.load() {
        Ok(table) => table,
        Err(err) => {
            tracing::warn!(error = %err, "failed to load scores, starting from an empty table");
            ScoreTable::default()
        }
    };

    let report = state.node.run_cycle(&intent, &mut scores).await;

    if let Err(err) = state.store.save(&scores) {
        tracing::warn!(error = %err, "failed to persist scores");
    }

    let offers = report.offers.clone();
    {
        let mut health = state.health.write();
        if report.offers.is_empty() {
            health.empty_cycle_streak = health.empty_cycle_streak.saturating_add(1);
        } else {
            health.empty_cycle_streak = 0;
        }
        health.last_report = report;
    }
    Json(offers)
}

#[derive(Serialize)]
struct CycleMetricsView {
    report: CycleReport,
    snapshot: HealthSnapshot,
    alerts: HealthAlerts,
}

async fn cycle_metrics(State(state): State<ValidatorState>) -> Json<CycleMetricsView> {
    let health = state.health.read();
    let snapshot = health.last_report.health_snapshot(health.empty_cycle_streak);
    let alerts = evaluate_health(&snapshot, &state.thresholds);
    Json(CycleMetricsView {
        report: health.last_report.clone(),
        snapshot,
        alerts,
    })
}

async fn fulfill(
    State(state): State<MinerState>,
    headers: HeaderMap,
    Json(batch): Json<QueryBatch>,
) -> Response {
    let caller = headers
        .get("x-caller-hotkey")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match admit(caller, state.metagraph.as_ref(), state.admission) {
        AdmissionVerdict::Rejected(reason) => (StatusCode::FORBIDDEN, reason).into_response(),
        AdmissionVerdict::Granted => {
            let priority = priority_of(caller, state.metagraph.as_ref());
            tracing::debug!(
                caller = caller.unwrap_or("anonymous"),
                priority,
                queries = batch.len(),
                "fulfilling batch"
            );
            let response = state.service.fulfill_batch(&batch).await;
            Json(response).into_response()
        }
    }
}

async fn fulfillment_metrics(State(state): State<MinerState>) -> Json<FulfillmentMetrics> {
    Json(state.service.metrics())
}
