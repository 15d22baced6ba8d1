#![forbid(unsafe_code)]

use ahash::RandomState;
use anyhow::Result;
use async_trait::async_trait;
use common::Hotkey;
use futures::future::join_all;
use hashbrown::HashMap;
use protocol::{BatchResponse, QueryBatch};
use std::time::Duration;

type FastMap<K, V> = HashMap<K, V, RandomState>;

/// One reliable call/response channel to a peer. `None` covers every failure
/// mode (unreachable, timed out, bad status, undecodable body) so partial
/// non-response is visible in the signature instead of hidden in a handler.
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send_batch(
        &self,
        peer: &str,
        batch: &QueryBatch,
        timeout: Duration,
    ) -> Option<BatchResponse>;
}

/// A peer's complete answer to one dispatched batch.
#[derive(Clone, Debug, PartialEq)]
pub struct PeerBatch {
    pub peer: Hotkey,
    pub response: BatchResponse,
}

/// Fans the batch out to every target peer concurrently and collects the
/// responses that arrived before the deadline. Responders keep dispatch
/// order; non-responders are omitted. An empty result is success.
pub async fn dispatch_batch<T>(
    transport: &T,
    peers: &[Hotkey],
    batch: &QueryBatch,
    timeout: Duration,
) -> Vec<PeerBatch>
where
    T: BatchTransport + ?Sized,
{
    let calls = peers.iter().map(|peer| async move {
        let response = tokio::time::timeout(timeout, transport.send_batch(peer, batch, timeout))
            .await
            .ok()
            .flatten();
        if response.is_none() {
            tracing::warn!(peer = %peer, "peer did not answer batch before deadline");
        }
        response.map(|response| PeerBatch {
            peer: peer.clone(),
            response,
        })
    });

    join_all(calls).await.into_iter().flatten().collect()
}

/// HTTP implementation: POSTs the batch as JSON to each peer's fulfillment
/// endpoint, identifying the caller via the `x-caller-hotkey` header.
#[derive(Clone)]
pub struct HttpBatchTransport {
    http: reqwest::Client,
    routes: FastMap<Hotkey, String>,
    caller_hotkey: Hotkey,
}

impl HttpBatchTransport {
    pub fn new(
        caller_hotkey: impl Into<Hotkey>,
        routes: impl IntoIterator<Item = (Hotkey, String)>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            routes: routes.into_iter().collect(),
            caller_hotkey: caller_hotkey.into(),
        })
    }

    pub fn knows_peer(&self, peer: &str) -> bool {
        self.routes.contains_key(peer)
    }
}

#[async_trait]
impl BatchTransport for HttpBatchTransport {
    async fn send_batch(
        &self,
        peer: &str,
        batch: &QueryBatch,
        timeout: Duration,
    ) -> Option<BatchResponse> {
        let Some(base) = self.routes.get(peer) else {
            tracing::warn!(peer = %peer, "no route for peer, skipping dispatch");
            return None;
        };
        let url = format!("{}/v1/batch", base.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .header("x-caller-hotkey", &self.caller_hotkey)
            .timeout(timeout)
            .json(batch)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<BatchResponse>().await {
                    Ok(decoded) => Some(decoded),
                    Err(err) => {
                        tracing::warn!(peer = %peer, error = %err, "undecodable batch response");
                        None
                    }
                }
            }
            Ok(response) => {
                tracing::warn!(peer = %peer, status = %response.status(), "peer refused batch");
                None
            }
            Err(err) => {
                tracing::warn!(peer = %peer, error = %err, "batch dispatch failed");
                None
            }
        }
    }
}
