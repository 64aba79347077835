//! Persistence of trade parameters in a flat key-value store.
//!
//! Every field lives under its own stable key as a string. Loading is forgiving: a
//! missing or unparsable entry leaves the in-memory value alone.

use crate::types::{MarginMode, TradeParameters};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// String key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// In-memory store, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: DashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<String> {
        self.data.get(key).map(|v| v.clone())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a JSON object file, rewritten on every `set`.
pub struct FileKvStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl FileKvStore {
    /// Open `path`, starting empty if it does not exist or cannot be parsed.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Ignoring unreadable parameter file {}: {}", path.display(), e);
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileKvStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.data.lock().get(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut data = self.data.lock();
        data.insert(key.to_string(), Value::String(value));
        let content = serde_json::to_string_pretty(&*data)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

const KEY_PREFIX: &str = "tc_";

fn key(field: &str) -> String {
    format!("{}{}", KEY_PREFIX, field)
}

fn load_f64(store: &dyn KeyValueStore, field: &str, target: &mut f64) {
    if let Some(value) = store.get(&key(field)).and_then(|v| v.trim().parse::<f64>().ok()) {
        if !value.is_nan() {
            *target = value;
        }
    }
}

fn load_count(store: &dyn KeyValueStore, field: &str, target: &mut u64) {
    let parsed = store
        .get(&key(field))
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0);
    if let Some(value) = parsed {
        *target = value.trunc() as u64;
    }
}

/// Trade parameters persisted through a [`KeyValueStore`].
pub struct ParameterStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> ParameterStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Write every field.
    pub fn save(&self, params: &TradeParameters) -> Result<(), StoreError> {
        let entries = [
            ("shares", params.shares.to_string()),
            ("purchasePrice", params.entry_price.to_string()),
            ("fees", params.fees.to_string()),
            ("slippage", params.slippage_pct.to_string()),
            ("stopRate", params.stop_rate.to_string()),
            ("tpRate", params.tp_rate.to_string()),
            ("equity", params.equity.to_string()),
            ("riskPct", params.risk_pct.to_string()),
            ("margin", params.margin_mode.to_string()),
            ("buyingPower", params.buying_power.to_string()),
            ("dailyLoss", params.daily_loss_rate_pct.to_string()),
            ("pdtTrades", params.pdt_trade_count.to_string()),
        ];

        for (field, value) in entries {
            self.store.set(&key(field), value)?;
        }
        debug!("Saved trade parameters");
        Ok(())
    }

    /// Overwrite fields of `params` that have a usable stored value.
    pub fn load_into(&self, params: &mut TradeParameters) {
        let store: &dyn KeyValueStore = &self.store;

        load_count(store, "shares", &mut params.shares);
        load_f64(store, "purchasePrice", &mut params.entry_price);
        load_f64(store, "fees", &mut params.fees);
        load_f64(store, "slippage", &mut params.slippage_pct);
        load_f64(store, "stopRate", &mut params.stop_rate);
        load_f64(store, "tpRate", &mut params.tp_rate);
        load_f64(store, "equity", &mut params.equity);
        load_f64(store, "riskPct", &mut params.risk_pct);
        load_f64(store, "buyingPower", &mut params.buying_power);
        load_f64(store, "dailyLoss", &mut params.daily_loss_rate_pct);
        load_count(store, "pdtTrades", &mut params.pdt_trade_count);

        if let Some(mode) = store
            .get(&key("margin"))
            .and_then(|v| v.parse::<MarginMode>().ok())
        {
            params.margin_mode = mode;
        }
    }

    /// Defaults overlaid with whatever is stored.
    pub fn load(&self) -> TradeParameters {
        let mut params = TradeParameters::default();
        self.load_into(&mut params);
        params
    }

    pub fn inner(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_memory() {
        let store = ParameterStore::new(MemoryKvStore::new());
        let params = TradeParameters {
            shares: 42,
            entry_price: 12.5,
            margin_mode: MarginMode::Portfolio,
            pdt_trade_count: 3,
            ..TradeParameters::default()
        };

        store.save(&params).unwrap();
        assert_eq!(store.load(), params);
        assert_eq!(store.inner().get("tc_purchasePrice").as_deref(), Some("12.5"));
    }

    #[test]
    fn test_bad_entries_leave_defaults() {
        let kv = MemoryKvStore::new();
        kv.set("tc_shares", "lots".to_string()).unwrap();
        kv.set("tc_equity", "NaN".to_string()).unwrap();
        kv.set("tc_margin", "cash".to_string()).unwrap();
        kv.set("tc_fees", " 3.5 ".to_string()).unwrap();
        kv.set("tc_pdtTrades", "-2".to_string()).unwrap();

        let params = ParameterStore::new(kv).load();
        let defaults = TradeParameters::default();
        assert_eq!(params.shares, defaults.shares);
        assert_eq!(params.equity, defaults.equity);
        assert_eq!(params.margin_mode, defaults.margin_mode);
        assert_eq!(params.pdt_trade_count, defaults.pdt_trade_count);
        assert_eq!(params.fees, 3.5);
    }

    #[test]
    fn test_fractional_counts_truncate() {
        let kv = MemoryKvStore::new();
        kv.set("tc_shares", "10.9".to_string()).unwrap();
        assert_eq!(ParameterStore::new(kv).load().shares, 10);
    }

    #[test]
    fn test_file_store_persists() {
        let path = std::env::temp_dir().join(format!(
            "tradecalc-params-{}-{}.json",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));

        let params = TradeParameters {
            equity: 5_000.0,
            margin_mode: MarginMode::RegT,
            ..TradeParameters::default()
        };
        ParameterStore::new(FileKvStore::open(&path)).save(&params).unwrap();

        let reopened = ParameterStore::new(FileKvStore::open(&path));
        assert_eq!(reopened.load(), params);
        assert_eq!(reopened.inner().path(), path.as_path());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let store = FileKvStore::open("/nonexistent/dir/params.json");
        assert!(store.get("tc_shares").is_none());
    }
}
