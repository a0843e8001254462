//! Environment-driven configuration with sensible defaults.

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    /// Display symbol for the tracked asset.
    pub symbol: String,
    /// Trailing prices per feature window (W).
    pub window: usize,
    /// Rolling price buffer capacity.
    pub history_capacity: usize,
    /// Minimum history length before a retrain may trigger.
    pub min_train_history: usize,
    /// Minimum dataset rows for a training pass to proceed.
    pub min_train_rows: usize,
    pub train_epochs: usize,
    pub batch_size: usize,
    /// Trailing dataset rows used for post-train evaluation.
    pub eval_window: usize,
    /// Periodic refresh/retrain check interval.
    pub refresh_secs: u64,
    /// Directory for the file-backed model store.
    pub data_dir: PathBuf,
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source. `from_env` delegates here; tests
    /// inject their own lookup instead of touching the process environment.
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("SOLSIGHT_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = lookup("HOME").context("could not resolve HOME directory")?;
                PathBuf::from(home).join(".solsight")
            }
        };

        Ok(Self {
            symbol: lookup("SOLSIGHT_SYMBOL").unwrap_or_else(|| "SOL/USD".to_string()),
            window: parse_or(lookup("SOLSIGHT_WINDOW"), "SOLSIGHT_WINDOW", 24)?,
            history_capacity: parse_or(
                lookup("SOLSIGHT_HISTORY_CAPACITY"),
                "SOLSIGHT_HISTORY_CAPACITY",
                168,
            )?,
            min_train_history: parse_or(
                lookup("SOLSIGHT_MIN_TRAIN_HISTORY"),
                "SOLSIGHT_MIN_TRAIN_HISTORY",
                100,
            )?,
            min_train_rows: parse_or(
                lookup("SOLSIGHT_MIN_TRAIN_ROWS"),
                "SOLSIGHT_MIN_TRAIN_ROWS",
                64,
            )?,
            train_epochs: parse_or(lookup("SOLSIGHT_TRAIN_EPOCHS"), "SOLSIGHT_TRAIN_EPOCHS", 8)?,
            batch_size: parse_or(lookup("SOLSIGHT_BATCH_SIZE"), "SOLSIGHT_BATCH_SIZE", 32)?,
            eval_window: parse_or(lookup("SOLSIGHT_EVAL_WINDOW"), "SOLSIGHT_EVAL_WINDOW", 100)?,
            refresh_secs: parse_or(lookup("SOLSIGHT_REFRESH_SECS"), "SOLSIGHT_REFRESH_SECS", 30)?,
            data_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_match_the_engine_contract() {
        let config = Config::from_lookup(lookup_from(&[("HOME", "/home/test")])).unwrap();
        assert_eq!(config.window, 24);
        assert_eq!(config.history_capacity, 168);
        assert_eq!(config.min_train_history, 100);
        assert_eq!(config.min_train_rows, 64);
        assert_eq!(config.eval_window, 100);
        assert_eq!(config.refresh_secs, 30);
        assert_eq!(config.data_dir, PathBuf::from("/home/test/.solsight"));
    }

    #[test]
    fn overrides_take_precedence_over_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("SOLSIGHT_WINDOW", "12"),
            ("SOLSIGHT_REFRESH_SECS", "5"),
            ("SOLSIGHT_DATA_DIR", "/var/lib/solsight"),
        ]))
        .unwrap();
        assert_eq!(config.window, 12);
        assert_eq!(config.refresh_secs, 5);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/solsight"));
    }

    #[test]
    fn unparseable_value_is_rejected_with_the_offending_key() {
        let err = Config::from_lookup(lookup_from(&[("SOLSIGHT_WINDOW", "soon")]))
            .unwrap_err()
            .to_string();
        assert!(err.contains("SOLSIGHT_WINDOW"), "{}", err);
    }
}
