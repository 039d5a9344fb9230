//! Bar loading from CSV.
//!
//! Expected header: `symbol,timestamp,open,high,low,close,volume`. Timestamps
//! are either dates (`2024-01-02`) or date-times (`2024-01-02 15:30:00`,
//! `2024-01-02T15:30:00`). Rows may arrive in any order; the engine sorts.
//!
//! Rows with a missing or non-positive close are kept: the engine treats them
//! as void bars that cannot fill orders. Rows that fail OHLC sanity are kept
//! too but counted as warnings.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};

use barsim_core::domain::{Bar, Timestamp};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unparseable timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}: empty symbol")]
    EmptySymbol { row: usize },

    #[error("duplicate bar for {symbol} at {timestamp}")]
    Duplicate { symbol: String, timestamp: Timestamp },

    #[error("no bars for requested symbol '{0}'")]
    MissingSymbol(String),

    #[error("no bars loaded")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    symbol: String,
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    #[serde(default)]
    volume: Option<u64>,
}

/// Bars plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    /// BLAKE3 over every loaded bar, in `(timestamp, symbol)` order.
    pub dataset_hash: String,
    /// Bars per symbol.
    pub counts: BTreeMap<String, usize>,
    /// Rows that failed OHLC sanity but were kept.
    pub warnings: Vec<String>,
}

impl LoadedData {
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }
}

/// Load bars from a CSV file, keeping only `symbols` (all when empty).
pub fn load_bars(path: &Path, symbols: &[String]) -> Result<LoadedData, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let loaded = load_bars_from_reader(file, symbols)?;
    let short_hash = &loaded.dataset_hash[..12];
    info!(
        path = %path.display(),
        bars = loaded.bars.len(),
        symbols = loaded.counts.len(),
        dataset_hash = short_hash,
        "bars loaded"
    );
    Ok(loaded)
}

/// Load bars from any CSV reader.
pub fn load_bars_from_reader<R: Read>(reader: R, symbols: &[String]) -> Result<LoadedData, LoadError> {
    let wanted: BTreeSet<&str> = symbols.iter().map(String::as_str).collect();
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut bars = Vec::new();
    let mut warnings = Vec::new();
    let mut seen = BTreeSet::new();

    for (i, record) in rdr.deserialize::<CsvBar>().enumerate() {
        // Header is row 1.
        let row = i + 2;
        let raw = record?;
        if raw.symbol.is_empty() {
            return Err(LoadError::EmptySymbol { row });
        }
        if !wanted.is_empty() && !wanted.contains(raw.symbol.as_str()) {
            continue;
        }
        let timestamp = parse_timestamp(&raw.timestamp).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: raw.timestamp.clone(),
        })?;
        if !seen.insert((raw.symbol.clone(), timestamp)) {
            return Err(LoadError::Duplicate {
                symbol: raw.symbol,
                timestamp,
            });
        }

        let bar = Bar {
            symbol: raw.symbol,
            timestamp,
            open: raw.open.unwrap_or(f64::NAN),
            high: raw.high.unwrap_or(f64::NAN),
            low: raw.low.unwrap_or(f64::NAN),
            close: raw.close.unwrap_or(f64::NAN),
            volume: raw.volume.unwrap_or(0),
        };
        if !bar.is_void() && !bar.is_sane() {
            warn!(row, symbol = %bar.symbol, %timestamp, "OHLC sanity check failed");
            warnings.push(format!("row {row}: {} {timestamp} fails OHLC sanity", bar.symbol));
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::Empty);
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for bar in &bars {
        *counts.entry(bar.symbol.clone()).or_default() += 1;
    }
    if let Some(missing) = wanted.iter().find(|s| !counts.contains_key(**s)) {
        return Err(LoadError::MissingSymbol(missing.to_string()));
    }

    bars.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    let dataset_hash = dataset_hash(&bars);

    Ok(LoadedData {
        bars,
        dataset_hash,
        counts,
        warnings,
    })
}

/// BLAKE3 over the bars' canonical byte form.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.symbol.as_bytes());
        hasher.update(&[0]);
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
