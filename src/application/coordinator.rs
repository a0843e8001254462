//! Orchestration of the indicator, signal, dataset and model components.
//!
//! The coordinator is a single cooperative task: feed events, the periodic
//! refresh timer and training all interleave on one loop, so the
//! `training_in_flight` flag is the only coordination primitive needed. A
//! sufficiency trigger arriving while a pass is running is dropped, not
//! queued; the model reference is only swapped between passes.

use crate::application::model::ModelLifecycle;
use crate::application::{dataset, indicators, signal};
use crate::config::Config;
use crate::domain::history::PriceHistory;
use crate::domain::ports::{FeedEvent, ModelStore, PriceFeed};
use crate::domain::types::{
    Direction, EngineSnapshot, EngineState, EvaluationMetrics, PricePoint, Signal,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct PredictionCoordinator {
    config: Config,
    history: PriceHistory,
    lifecycle: ModelLifecycle,
    state: EngineState,
    status: String,
    signal: Signal,
    probability_up: Option<f64>,
    metrics: Option<EvaluationMetrics>,
    training_in_flight: bool,
    trainings_started: u64,
    snapshot_tx: watch::Sender<EngineSnapshot>,
}

impl PredictionCoordinator {
    pub fn new(
        config: Config,
        store: Arc<dyn ModelStore>,
    ) -> (Self, watch::Receiver<EngineSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(EngineSnapshot::initial());
        let coordinator = Self {
            history: PriceHistory::new(config.history_capacity),
            lifecycle: ModelLifecycle::new(store),
            state: EngineState::Idle,
            status: "starting".to_string(),
            signal: Signal::neutral(),
            probability_up: None,
            metrics: None,
            training_in_flight: false,
            trainings_started: 0,
            snapshot_tx,
            config,
        };
        (coordinator, snapshot_rx)
    }

    /// Attempt to rehydrate a previously persisted model. A model persisted
    /// under a different feature window has an incompatible input width and
    /// is discarded rather than served; the next training pass rebuilds it.
    pub async fn startup(&mut self) {
        self.set_state(EngineState::Loading, "loading stored model");
        if self.lifecycle.restore().await {
            let expected = dataset::Dataset::input_dim(self.config.window);
            if self.lifecycle.input_dim() == Some(expected) {
                self.set_state(EngineState::Ready, "model loaded from store");
            } else {
                warn!(
                    stored = ?self.lifecycle.input_dim(),
                    expected,
                    "stored model does not fit the configured window, discarding"
                );
                self.lifecycle.discard();
                self.set_state(EngineState::NoModel, "stored model incompatible, waiting for data");
            }
        } else {
            self.set_state(EngineState::NoModel, "no stored model, waiting for data");
        }
    }

    /// Drive the coordinator from a price feed until shutdown.
    ///
    /// Teardown drops the feed subscription and the refresh timer; training
    /// has no cancellation path, so a pass in progress when shutdown fires
    /// finishes (or fails) before this returns.
    pub async fn run(
        mut self,
        feed: Arc<dyn PriceFeed>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.startup().await;

        let mut events = feed
            .subscribe()
            .await
            .context("failed to subscribe to price feed")?;
        let mut refresh = tokio::time::interval(Duration::from_secs(self.config.refresh_secs));

        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            warn!("price feed closed; stopping engine loop");
                            break;
                        }
                    }
                }
                _ = refresh.tick() => {
                    self.maybe_train().await;
                }
                _ = shutdown.changed() => {
                    info!("shutdown requested, tearing down");
                    break;
                }
            }
        }
        Ok(())
    }

    pub async fn handle_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Backfill(points) => {
                info!(points = points.len(), "received history backfill");
                self.history.replace_all(points);
                self.refresh_signal();
                self.maybe_train().await;
                self.update_live_prediction();
            }
            FeedEvent::Candle(point) => {
                self.history.push(point);
                self.refresh_signal();
                self.maybe_train().await;
                self.update_live_prediction();
            }
            FeedEvent::Tick { price, timestamp } => {
                self.history.push(PricePoint { timestamp, price });
                self.refresh_signal();
                self.update_live_prediction();
            }
        }
        self.publish();
    }

    fn refresh_signal(&mut self) {
        let prices = self.history.prices();
        let Some(&price) = prices.last() else {
            return;
        };
        let snapshot = indicators::snapshot(&prices);
        self.signal = signal::generate(
            snapshot.rsi,
            snapshot.ma20,
            snapshot.ma50,
            price,
            snapshot.macd,
        );
    }

    /// Retrain when enough history has accumulated and no pass is running.
    /// Re-entrant triggers are dropped so two fits never overlap on the same
    /// parameter set.
    pub async fn maybe_train(&mut self) {
        if self.history.len() < self.config.min_train_history {
            return;
        }
        if self.training_in_flight {
            debug!("training already in flight, dropping trigger");
            return;
        }

        self.training_in_flight = true;
        let previous_state = self.state.clone();
        self.set_state(EngineState::Training, "training classifier");

        let outcome = self.train_and_evaluate().await;
        match outcome {
            Ok(true) => {
                self.set_state(EngineState::Ready, "classifier ready");
            }
            Ok(false) => {
                // Not enough dataset rows yet: a normal outcome, back to
                // where we were.
                self.state = previous_state;
                self.status = "not enough data for training".to_string();
                self.publish();
            }
            Err(e) => {
                warn!("training pass failed: {}", e);
                self.set_state(EngineState::Error(e.to_string()), "training failed");
            }
        }
        self.training_in_flight = false;
    }

    /// One full pass: dataset build, incremental fit, persist, rolling
    /// evaluation. `Ok(false)` means the dataset was too small.
    async fn train_and_evaluate(&mut self) -> Result<bool> {
        let prices = self.history.prices();
        let snapshots = indicators::snapshot_series(&prices);

        let Some(ds) = dataset::build(&prices, &snapshots, self.config.window) else {
            return Ok(false);
        };
        if ds.len() < self.config.min_train_rows {
            debug!(rows = ds.len(), "dataset below training threshold");
            return Ok(false);
        }

        self.trainings_started += 1;
        self.lifecycle
            .ensure_model(dataset::Dataset::input_dim(self.config.window));
        let history = self.lifecycle.train_or_update(
            &ds.x,
            &ds.y,
            self.config.train_epochs,
            self.config.batch_size,
        )?;
        if let Some(last) = history.last() {
            info!(
                pass = self.trainings_started,
                epochs = history.len(),
                loss = last.loss,
                accuracy = last.accuracy,
                "training pass complete"
            );
        }

        // Persistence failure is non-fatal; the in-memory model stays live.
        let _ = self.lifecycle.persist(ds.len()).await;

        self.metrics = Some(self.evaluate(&ds)?);
        Ok(true)
    }

    /// Accuracy and Brier score over the trailing evaluation window.
    fn evaluate(&self, ds: &dataset::Dataset) -> Result<EvaluationMetrics> {
        let n_eval = ds.len().min(self.config.eval_window);
        let start = ds.len() - n_eval;

        let mut correct = 0usize;
        let mut brier = 0.0;
        for i in start..ds.len() {
            let proba = self.lifecycle.predict_proba(&ds.x[i])?;
            let predicted_up = proba >= 0.5;
            let truth_up = ds.y[i] >= 0.5;
            if predicted_up == truth_up {
                correct += 1;
            }
            brier += (proba - ds.y[i]).powi(2);
        }

        Ok(EvaluationMetrics {
            sample_count: ds.len(),
            accuracy: correct as f64 / n_eval as f64,
            brier_score: brier / n_eval as f64,
        })
    }

    /// Build exactly one live feature vector from the newest window and
    /// publish probability plus thresholded direction.
    fn update_live_prediction(&mut self) {
        if !self.lifecycle.has_model() || !matches!(self.state, EngineState::Ready) {
            return;
        }
        let prices = self.history.prices();
        let snapshot = indicators::snapshot(&prices);
        let Some(features) = dataset::live_features(&prices, &snapshot, self.config.window) else {
            return;
        };

        match self.lifecycle.predict_proba(&features) {
            Ok(proba) => {
                self.probability_up = Some(proba);
            }
            Err(e) => {
                warn!("live prediction failed: {}", e);
                self.set_state(EngineState::Error(e.to_string()), "prediction failed");
            }
        }
    }

    fn set_state(&mut self, state: EngineState, status: &str) {
        debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
        self.status = status.to_string();
        self.publish();
    }

    fn publish(&self) {
        let direction = self
            .probability_up
            .map(|p| if p >= 0.5 { Direction::Up } else { Direction::Down });
        self.snapshot_tx.send_replace(EngineSnapshot {
            signal: self.signal.clone(),
            probability_up: self.probability_up,
            direction,
            metrics: self.metrics,
            state: self.state.clone(),
            status: self.status.clone(),
        });
    }

    #[cfg(test)]
    fn trainings_started(&self) -> u64 {
        self.trainings_started
    }
}
