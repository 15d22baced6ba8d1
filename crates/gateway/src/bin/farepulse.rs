use anyhow::Result;
use gateway::{
    GatewayConfig, build_miner_router, build_validator_router, miner_state, validator_state,
};
use node_runtime::{NodeRole, NodeRuntimeBuilder};
use std::env;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(env::var("RUST_LOG").ok().as_deref());

    let runtime = NodeRuntimeBuilder::from_env()?.build()?;
    let config = GatewayConfig::from_env();
    let app = match runtime.role() {
        NodeRole::Validator => build_validator_router(validator_state(&config)?),
        NodeRole::Miner => build_miner_router(miner_state(&config)?),
    };

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        role = runtime.role().as_str(),
        bind_addr = %config.bind_addr,
        "farepulse node listening"
    );
    axum::serve(listener, app).await?;
    runtime.shutdown().await
}

fn init_tracing(log_override: Option<&str>) {
    let filter = resolve_log_filter(log_override);
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

fn resolve_log_filter(env_override: Option<&str>) -> String {
    match env_override.map(str::trim) {
        Some(value) if !value.is_empty() => {
            let has_gateway_directive = value
                .split(',')
                .map(str::trim)
                .any(|directive| directive == "gateway" || directive.starts_with("gateway="));
            if has_gateway_directive {
                value.to_owned()
            } else {
                format!("{value},gateway=info")
            }
        }
        _ => "info,gateway=info".to_owned(),
    }
}
