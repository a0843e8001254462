//! Classifier ownership: build, incremental fit, inference and durable
//! save/load of parameters plus metadata.

mod network;

pub use network::{Classifier, EpochStats};

use crate::domain::errors::EngineError;
use crate::domain::ports::{ModelStore, META_KEY, MODEL_KEY};
use crate::domain::types::ModelMetadata;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Exclusive owner of the live classifier instance.
///
/// The model is created once per input dimension and then updated in place;
/// on restore it is replaced wholesale, never mutated field by field.
pub struct ModelLifecycle {
    model: Option<Classifier>,
    metadata: ModelMetadata,
    store: Arc<dyn ModelStore>,
}

impl ModelLifecycle {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self {
            model: None,
            metadata: ModelMetadata::default(),
            store,
        }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn metadata(&self) -> ModelMetadata {
        self.metadata
    }

    /// Width of the live model's feature vector, if one exists.
    pub fn input_dim(&self) -> Option<usize> {
        self.model.as_ref().map(Classifier::input_dim)
    }

    /// Drop the live model and its metadata.
    pub fn discard(&mut self) {
        self.model = None;
        self.metadata = ModelMetadata::default();
    }

    /// Build the classifier if none exists yet. A model whose input width
    /// matches is kept as-is so that repeated retrains fine-tune the same
    /// parameters; a mismatched one (e.g. restored under a different feature
    /// window) cannot be fine-tuned and is replaced wholesale.
    pub fn ensure_model(&mut self, input_dim: usize) {
        match &self.model {
            Some(model) if model.input_dim() == input_dim => {}
            Some(model) => {
                warn!(
                    stored = model.input_dim(),
                    requested = input_dim,
                    "model input width mismatch, rebuilding classifier"
                );
                self.model = Some(Classifier::new(input_dim));
                self.metadata = ModelMetadata::default();
            }
            None => {
                info!(input_dim, "building classifier");
                self.model = Some(Classifier::new(input_dim));
            }
        }
    }

    /// Continue training the existing model on the given dataset.
    pub fn train_or_update(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        epochs: usize,
        batch_size: usize,
    ) -> Result<Vec<EpochStats>, EngineError> {
        let model = self.model.as_mut().ok_or_else(|| EngineError::Training {
            reason: "no model has been built".to_string(),
        })?;
        model.train(x, y, epochs, batch_size)
    }

    pub fn predict_proba(&self, features: &[f64]) -> Result<f64, EngineError> {
        let model = self.model.as_ref().ok_or_else(|| EngineError::Prediction {
            reason: "no model available".to_string(),
        })?;
        model.predict_proba(features)
    }

    /// Persist parameters and `{trained_at, sample_count}` metadata under the
    /// fixed store keys. Storage failures are reported as `false` and logged,
    /// never propagated: the engine keeps running with its in-memory model.
    pub async fn persist(&mut self, sample_count: usize) -> bool {
        let Some(model) = &self.model else {
            return false;
        };

        self.metadata = ModelMetadata {
            trained_at: Utc::now().timestamp_millis(),
            sample_count,
        };

        let result: Result<(), EngineError> = async {
            let bytes = model.to_bytes()?;
            self.store
                .put(MODEL_KEY, &bytes)
                .await
                .map_err(|e| EngineError::Persistence {
                    reason: e.to_string(),
                })?;
            let meta = serde_json::to_vec(&self.metadata).map_err(|e| {
                EngineError::Persistence {
                    reason: e.to_string(),
                }
            })?;
            self.store
                .put(META_KEY, &meta)
                .await
                .map_err(|e| EngineError::Persistence {
                    reason: e.to_string(),
                })
        }
        .await;

        match result {
            Ok(()) => {
                info!(sample_count, "model persisted");
                true
            }
            Err(e) => {
                warn!("failed to persist model: {}", e);
                false
            }
        }
    }

    /// Rehydrate the model from storage. Absence or corruption is not an
    /// error — it is "no prior model" and leaves the lifecycle empty.
    pub async fn restore(&mut self) -> bool {
        let bytes = match self.store.get(MODEL_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return false,
            Err(e) => {
                warn!("failed to read model store: {}", e);
                return false;
            }
        };

        let model = match Classifier::from_bytes(&bytes) {
            Ok(model) => model,
            Err(e) => {
                warn!("stored model is not deserializable: {}", e);
                return false;
            }
        };

        let metadata = match self.store.get(META_KEY).await {
            Ok(Some(raw)) => serde_json::from_slice(&raw).unwrap_or_default(),
            _ => ModelMetadata::default(),
        };

        info!(
            trained_at = metadata.trained_at,
            sample_count = metadata.sample_count,
            "model restored from store"
        );
        self.model = Some(model);
        self.metadata = metadata;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::file_store::FileModelStore;
    use tempfile::TempDir;

    fn toy_dataset(n: usize, dim: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let row: Vec<f64> = (0..dim).map(|j| ((i + j) % 7) as f64 / 7.0).collect();
            y.push(if row[0] > row[1] { 1.0 } else { 0.0 });
            x.push(row);
        }
        (x, y)
    }

    #[tokio::test]
    async fn restore_on_empty_store_reports_no_prior_model() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileModelStore::new(dir.path().to_path_buf()));
        let mut lifecycle = ModelLifecycle::new(store);
        assert!(!lifecycle.restore().await);
        assert!(!lifecycle.has_model());
    }

    #[tokio::test]
    async fn persist_then_restore_round_trips_predictions() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileModelStore::new(dir.path().to_path_buf()));
        let (x, y) = toy_dataset(64, 4);

        let mut lifecycle = ModelLifecycle::new(store.clone());
        lifecycle.ensure_model(4);
        lifecycle.train_or_update(&x, &y, 5, 16).unwrap();

        let features = [0.9, 0.1, 0.4, 0.4];
        let before = lifecycle.predict_proba(&features).unwrap();
        assert!(lifecycle.persist(y.len()).await);

        let mut reloaded = ModelLifecycle::new(store);
        assert!(reloaded.restore().await);
        let after = reloaded.predict_proba(&features).unwrap();
        assert!((before - after).abs() < 1e-6);
        assert_eq!(reloaded.metadata().sample_count, y.len());
        assert!(reloaded.metadata().trained_at > 0);
    }

    #[tokio::test]
    async fn corrupt_store_contents_degrade_to_no_model() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileModelStore::new(dir.path().to_path_buf()));
        store.put(MODEL_KEY, b"{garbage").await.unwrap();

        let mut lifecycle = ModelLifecycle::new(store);
        assert!(!lifecycle.restore().await);
        assert!(!lifecycle.has_model());
    }

    #[tokio::test]
    async fn ensure_model_never_rebuilds_an_existing_model() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileModelStore::new(dir.path().to_path_buf()));
        let (x, y) = toy_dataset(64, 4);

        let mut lifecycle = ModelLifecycle::new(store);
        lifecycle.ensure_model(4);
        lifecycle.train_or_update(&x, &y, 10, 16).unwrap();
        let trained = lifecycle.predict_proba(&[0.9, 0.1, 0.4, 0.4]).unwrap();

        lifecycle.ensure_model(4);
        let after_ensure = lifecycle.predict_proba(&[0.9, 0.1, 0.4, 0.4]).unwrap();
        assert_eq!(trained, after_ensure);
    }

    #[tokio::test]
    async fn ensure_model_rebuilds_on_input_width_change() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileModelStore::new(dir.path().to_path_buf()));
        let (x, y) = toy_dataset(64, 4);

        let mut lifecycle = ModelLifecycle::new(store);
        lifecycle.ensure_model(4);
        lifecycle.train_or_update(&x, &y, 5, 16).unwrap();
        assert_eq!(lifecycle.input_dim(), Some(4));

        lifecycle.ensure_model(6);
        assert_eq!(lifecycle.input_dim(), Some(6));
        assert_eq!(lifecycle.metadata().sample_count, 0);
        assert!(lifecycle.predict_proba(&[0.1; 6]).is_ok());
        assert!(lifecycle.predict_proba(&[0.1; 4]).is_err());
    }
}
