//! Random-walk price feed for demos and integration tests.
//!
//! Stands in for the external market-data providers: backfills a full hourly
//! history, then emits trade-like ticks on an interval. The engine cannot
//! tell it apart from a live source.

use crate::domain::ports::{FeedEvent, PriceFeed};
use crate::domain::types::PricePoint;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver};
use tracing::info;

const MS_PER_HOUR: i64 = 3_600_000;

pub struct SimulatedFeed {
    base_price: f64,
    backfill_points: usize,
    tick_interval: Duration,
}

impl SimulatedFeed {
    pub fn new(backfill_points: usize, tick_interval: Duration) -> Self {
        Self {
            base_price: 145.0,
            backfill_points,
            tick_interval,
        }
    }

    /// Hourly random-walk candles ending at the current hour.
    fn generate_backfill(&self) -> Vec<PricePoint> {
        let mut rng = rand::thread_rng();
        let now = Utc::now().timestamp_millis();
        let mut price = self.base_price;
        let n = self.backfill_points as i64;

        (0..n)
            .map(|i| {
                // Slight upward drift, same as the walk used for demo data.
                price += (rng.gen::<f64>() - 0.48) * 3.0;
                price = price.max(1.0);
                PricePoint {
                    timestamp: now - (n - i) * MS_PER_HOUR,
                    price: (price * 100.0).round() / 100.0,
                }
            })
            .collect()
    }
}

#[async_trait]
impl PriceFeed for SimulatedFeed {
    async fn subscribe(&self) -> Result<Receiver<FeedEvent>> {
        let (tx, rx) = mpsc::channel(64);
        let backfill = self.generate_backfill();
        let mut price = backfill.last().map(|p| p.price).unwrap_or(self.base_price);
        let tick_interval = self.tick_interval;

        tokio::spawn(async move {
            info!(points = backfill.len(), "simulated feed: sending backfill");
            if tx.send(FeedEvent::Backfill(backfill)).await.is_err() {
                return;
            }

            let mut timer = tokio::time::interval(tick_interval);
            loop {
                timer.tick().await;
                let jitter = {
                    let mut rng = rand::thread_rng();
                    (rng.gen::<f64>() - 0.5) * 0.8
                };
                price = (price + jitter).max(1.0);
                let event = FeedEvent::Tick {
                    price: (price * 100.0).round() / 100.0,
                    timestamp: Utc::now().timestamp_millis(),
                };
                if tx.send(event).await.is_err() {
                    // Subscriber went away; tear the simulation down.
                    return;
                }
            }
        });

        Ok(rx)
    }
}
