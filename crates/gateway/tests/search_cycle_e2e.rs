use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use common::HealthThresholds;
use gateway::{MinerState, ValidatorState, build_miner_router, build_validator_router};
use miner::{AdmissionConfig, FulfillmentConfig, FulfillmentService};
use pricing::{PricingError, PricingSource};
use protocol::{Offer, SearchIntent, SubQuery};
use refdata::{AirportRecord, ReferenceData};
use registry::{PeerEntry, StaticMetagraph};
use scoring::ScoreStore;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tower::ServiceExt;
use transport::HttpBatchTransport;
use validator::{SynthesizerConfig, ValidatorConfig, ValidatorNode};

struct FixedPricing {
    price: f64,
}

#[async_trait]
impl PricingSource for FixedPricing {
    async fn search(&self, query: &SubQuery) -> Result<Vec<Offer>, PricingError> {
        Ok(vec![Offer {
            market: query.market.clone(),
            price: self.price,
            currency: query.currency.clone(),
            departs_at: Utc.with_ymd_and_hms(2026, 9, 14, 8, 0, 0).unwrap(),
            arrives_at: Utc.with_ymd_and_hms(2026, 9, 14, 14, 0, 0).unwrap(),
            origin: query.origin.code.clone(),
            destination: query.destination.code.clone(),
            stops: 0,
            carrier: "E2E Air".to_owned(),
            duration_minutes: 360,
        }])
    }
}

async fn spawn_miner(price: f64) -> SocketAddr {
    let metagraph = StaticMetagraph::new(vec![PeerEntry {
        hotkey: "validator-self".to_owned(),
        endpoint: "http://validator-self.test:3000".to_owned(),
        stake: 100.0,
        validator_permit: true,
    }]);
    let service = FulfillmentService::new(
        Box::new(FixedPricing { price }) as Box<dyn PricingSource>,
        FulfillmentConfig::default(),
    );
    let app = build_miner_router(MinerState::new(
        service,
        metagraph,
        AdmissionConfig::default(),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind miner");
    let addr = listener.local_addr().expect("miner addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve miner");
    });
    addr
}

fn validator_state(miners: &[(&str, SocketAddr)], scores_path: &std::path::Path) -> ValidatorState {
    let metagraph = StaticMetagraph::new(
        miners
            .iter()
            .map(|(hotkey, addr)| PeerEntry {
                hotkey: (*hotkey).to_owned(),
                endpoint: format!("http://{addr}"),
                stake: 1.0,
                validator_permit: false,
            })
            .collect(),
    );
    let transport = HttpBatchTransport::new("validator-self", metagraph.endpoints())
        .expect("build transport");
    let refdata = ReferenceData::from_parts(
        vec!["US".to_owned(), "DE".to_owned(), "GB".to_owned()],
        (0..6)
            .map(|idx| AirportRecord {
                code: format!("AP{idx}"),
                entity_id: format!("{idx}"),
            })
            .collect(),
    );
    let node = ValidatorNode::new(
        "validator-self",
        ValidatorConfig {
            synthesizer: SynthesizerConfig::default(),
            sample_size: 8,
            dispatch_timeout: Duration::from_secs(2),
        },
        refdata,
        metagraph,
        transport,
    );
    let store = ScoreStore::new(scores_path).expect("create score store");
    ValidatorState::new(node, store, HealthThresholds::default())
}

fn temp_scores_path() -> std::path::PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("farepulse-e2e-scores-{now}.json"))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("decode json body")
}

#[tokio::test]
async fn search_fans_out_ranks_and_persists_scores() {
    let cheap = spawn_miner(120.0).await;
    let dear = spawn_miner(480.0).await;

    let scores_path = temp_scores_path();
    let app = build_validator_router(validator_state(
        &[("miner-cheap", cheap), ("miner-dear", dear)],
        &scores_path,
    ));

    let intent = SearchIntent::default();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/search")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&intent).expect("encode intent")))
                .expect("build search request"),
        )
        .await
        .expect("route search");
    assert_eq!(response.status(), StatusCode::OK);

    let offers: Vec<Offer> =
        serde_json::from_value(body_json(response).await).expect("decode offers");
    assert!(!offers.is_empty());
    assert!(offers.len() <= intent.limit);
    assert_eq!(offers[0].price, 120.0);
    assert!(offers.windows(2).all(|pair| pair[0].price <= pair[1].price));

    // Both miners earned a score entry; under the exact profit formula the
    // amounts are zero on both sides of the best-price line.
    let persisted = ScoreStore::new(&scores_path)
        .expect("reopen store")
        .load()
        .expect("load persisted scores");
    assert_eq!(persisted.score_of("miner-cheap"), Some(0.0));
    assert_eq!(persisted.score_of("miner-dear"), Some(0.0));

    let metrics_response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics/cycle")
                .body(Body::empty())
                .expect("build metrics request"),
        )
        .await
        .expect("route metrics");
    assert_eq!(metrics_response.status(), StatusCode::OK);

    let metrics = body_json(metrics_response).await;
    assert_eq!(metrics["report"]["peers_responded"], 2);
    assert_eq!(metrics["report"]["best_price"], 120.0);
    assert_eq!(metrics["snapshot"]["empty_cycle_streak"], 0);
    assert_eq!(metrics["alerts"]["peer_silence"], false);

    let _ = std::fs::remove_file(scores_path);
}

#[tokio::test]
async fn search_with_no_reachable_miners_returns_empty_list() {
    let scores_path = temp_scores_path();
    let app = build_validator_router(validator_state(
        &[(
            "miner-gone",
            "127.0.0.1:9".parse().expect("parse sink addr"),
        )],
        &scores_path,
    ));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/search")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .expect("build search request"),
        )
        .await
        .expect("route search");
    assert_eq!(response.status(), StatusCode::OK);

    let offers: Vec<Offer> =
        serde_json::from_value(body_json(response).await).expect("decode offers");
    assert!(offers.is_empty());

    let _ = std::fs::remove_file(scores_path);
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let scores_path = temp_scores_path();
    let app = build_validator_router(validator_state(&[], &scores_path));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .expect("build health request"),
        )
        .await
        .expect("route health");

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert_eq!(&bytes[..], b"ok");

    let _ = std::fs::remove_file(scores_path);
}
