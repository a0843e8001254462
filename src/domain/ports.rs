use crate::domain::types::PricePoint;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

/// Fixed storage key for serialized model parameters.
pub const MODEL_KEY: &str = "model_v1";
/// Fixed storage key for model metadata JSON.
pub const META_KEY: &str = "meta_v1";

/// Events delivered by a price feed collaborator.
///
/// The feed either delivers a well-formed sequence or nothing; gaps and
/// outages surface as an absence of events, never as a malformed one.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Initial (or refreshed) hourly history, oldest first.
    Backfill(Vec<PricePoint>),
    /// A completed hourly candle.
    Candle(PricePoint),
    /// A live intra-hour price update.
    Tick { price: f64, timestamp: i64 },
}

#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn subscribe(&self) -> Result<Receiver<FeedEvent>>;
}

/// Durable key-value store for model parameters and metadata.
///
/// `get` returns `Ok(None)` for an absent key; only genuine I/O faults are
/// errors, and callers treat those as "no prior model".
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}
