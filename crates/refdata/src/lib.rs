use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AirportRecord {
    pub code: String,
    pub entity_id: String,
}

/// The sampling universe for query synthesis: market codes and airport
/// records, consumed read-only.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReferenceData {
    pub markets: Vec<String>,
    pub airports: Vec<AirportRecord>,
}

impl ReferenceData {
    pub fn load(markets_path: impl AsRef<Path>, airports_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            markets: load_markets(markets_path)?,
            airports: load_airports(airports_path)?,
        })
    }

    pub fn from_parts(markets: Vec<String>, airports: Vec<AirportRecord>) -> Self {
        Self { markets, airports }
    }
}

pub fn load_markets(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read markets file {}", path.display()))?;
    let table = CsvTable::parse(&raw);
    let code_col = table
        .column("MarketCode")
        .with_context(|| format!("markets file {} is missing a MarketCode column", path.display()))?;

    let mut markets = Vec::new();
    let mut skipped = 0_usize;
    for row in &table.rows {
        match row.get(code_col).map(|value| value.as_str()) {
            Some(code) if !code.is_empty() => markets.push(code.to_owned()),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped malformed market rows");
    }
    Ok(markets)
}

pub fn load_airports(path: impl AsRef<Path>) -> Result<Vec<AirportRecord>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read airports file {}", path.display()))?;
    let table = CsvTable::parse(&raw);
    let code_col = table
        .column("skyId")
        .with_context(|| format!("airports file {} is missing a skyId column", path.display()))?;
    let id_col = table
        .column("entityId")
        .with_context(|| format!("airports file {} is missing an entityId column", path.display()))?;
    let type_col = table.column("entityType").with_context(|| {
        format!("airports file {} is missing an entityType column", path.display())
    })?;

    let mut airports = Vec::new();
    let mut skipped = 0_usize;
    for row in &table.rows {
        let code = row.get(code_col).map(|value| value.as_str()).unwrap_or("");
        let entity_id = row.get(id_col).map(|value| value.as_str()).unwrap_or("");
        let entity_type = row.get(type_col).map(|value| value.as_str()).unwrap_or("");
        if entity_type != "AIRPORT" {
            continue;
        }
        if code.is_empty() || entity_id.is_empty() {
            skipped += 1;
            continue;
        }
        airports.push(AirportRecord {
            code: code.to_owned(),
            entity_id: entity_id.to_owned(),
        });
    }
    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, "skipped malformed airport rows");
    }
    Ok(airports)
}

struct CsvTable {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvTable {
    fn parse(raw: &str) -> Self {
        let mut lines = raw.lines().filter(|line| !line.trim().is_empty());
        let header = lines.next().map(parse_csv_line).unwrap_or_default();
        let rows = lines.map(parse_csv_line).collect();
        Self { header, rows }
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }
}

fn parse_csv_line(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').to_owned())
        .collect()
}
