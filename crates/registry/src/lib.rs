use ahash::RandomState;
use anyhow::{Context, Result};
use common::Hotkey;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

type FastMap<K, V> = HashMap<K, V, RandomState>;

/// Read-only view of the identity/stake registry. Business logic depends on
/// this interface instead of any live network singleton so it can run
/// against a fake registry in tests.
pub trait MetagraphView: Send + Sync {
    fn list_known_peers(&self) -> Vec<Hotkey>;
    fn stake_of(&self, hotkey: &str) -> f64;
    fn has_validator_permit(&self, hotkey: &str) -> bool;
    fn is_registered(&self, hotkey: &str) -> bool;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub hotkey: Hotkey,
    pub endpoint: String,
    #[serde(default)]
    pub stake: f64,
    #[serde(default)]
    pub validator_permit: bool,
}

/// In-memory registry seeded from configuration. Peer order is insertion
/// order so sampling sees a stable universe.
#[derive(Clone, Debug, Default)]
pub struct StaticMetagraph {
    entries: FastMap<Hotkey, PeerEntry>,
    order: Vec<Hotkey>,
}

impl StaticMetagraph {
    pub fn new(peers: Vec<PeerEntry>) -> Self {
        let mut metagraph = Self::default();
        for entry in peers {
            metagraph.insert(entry);
        }
        metagraph
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read peers file {}", path.display()))?;
        let peers: Vec<PeerEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("decode peers file {}", path.display()))?;
        Ok(Self::new(peers))
    }

    pub fn insert(&mut self, entry: PeerEntry) {
        if !self.entries.contains_key(&entry.hotkey) {
            self.order.push(entry.hotkey.clone());
        }
        self.entries.insert(entry.hotkey.clone(), entry);
    }

    pub fn endpoint_of(&self, hotkey: &str) -> Option<&str> {
        self.entries.get(hotkey).map(|entry| entry.endpoint.as_str())
    }

    /// Peer→endpoint pairs for the transport's routing table.
    pub fn endpoints(&self) -> Vec<(Hotkey, String)> {
        self.order
            .iter()
            .filter_map(|hotkey| {
                self.entries
                    .get(hotkey)
                    .map(|entry| (hotkey.clone(), entry.endpoint.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl MetagraphView for StaticMetagraph {
    fn list_known_peers(&self) -> Vec<Hotkey> {
        self.order.clone()
    }

    fn stake_of(&self, hotkey: &str) -> f64 {
        self.entries.get(hotkey).map(|entry| entry.stake).unwrap_or(0.0)
    }

    fn has_validator_permit(&self, hotkey: &str) -> bool {
        self.entries
            .get(hotkey)
            .map(|entry| entry.validator_permit)
            .unwrap_or(false)
    }

    fn is_registered(&self, hotkey: &str) -> bool {
        self.entries.contains_key(hotkey)
    }
}
