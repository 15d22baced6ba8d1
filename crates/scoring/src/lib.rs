use ahash::RandomState;
use anyhow::{Context, Result};
use common::Hotkey;
use hashbrown::HashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

type FastMap<K, V> = HashMap<K, V, RandomState>;

/// Cumulative per-hotkey reward. Entries are created on first credit,
/// mutated additively, and never deleted within a cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreTable {
    scores: FastMap<Hotkey, f64>,
}

impl ScoreTable {
    pub fn credit(&mut self, hotkey: &str, amount: f64) {
        *self.scores.entry(hotkey.to_owned()).or_insert(0.0) += amount;
    }

    pub fn score_of(&self, hotkey: &str) -> Option<f64> {
        self.scores.get(hotkey).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Sorted view for stable serialization and display.
    pub fn snapshot(&self) -> BTreeMap<Hotkey, f64> {
        self.scores
            .iter()
            .map(|(hotkey, score)| (hotkey.clone(), *score))
            .collect()
    }

    pub fn from_snapshot(snapshot: BTreeMap<Hotkey, f64>) -> Self {
        Self {
            scores: snapshot.into_iter().collect(),
        }
    }
}

/// JSON-file-backed score persistence. The cycle discipline is load at the
/// start of a request cycle, save once after reward application.
#[derive(Clone, Debug)]
pub struct ScoreStore {
    path: PathBuf,
}

impl ScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create score store directory {}", parent.display()))?;
        }
        Ok(Self { path })
    }

    pub fn load(&self) -> Result<ScoreTable> {
        if !self.path.exists() {
            return Ok(ScoreTable::default());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("read score file {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(ScoreTable::default());
        }
        let snapshot: BTreeMap<Hotkey, f64> = serde_json::from_str(&raw)
            .with_context(|| format!("decode score file {}", self.path.display()))?;
        Ok(ScoreTable::from_snapshot(snapshot))
    }

    pub fn save(&self, table: &ScoreTable) -> Result<()> {
        let encoded =
            serde_json::to_string_pretty(&table.snapshot()).context("serialize score table")?;
        fs::write(&self.path, encoded)
            .with_context(|| format!("write score file {}", self.path.display()))?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
