use serde::{Deserialize, Serialize};
use std::fmt;

/// A single observed price: epoch milliseconds + last price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: i64,
    pub price: f64,
}

/// Indicator values computed over a price history prefix.
///
/// `ma20`/`ma50` carry `0.0` and `macd` carries `0.0` as "not enough data"
/// sentinels; `rsi` defaults to the neutral `50.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub ma20: f64,
    pub ma50: f64,
    pub macd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalType {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::Hold => write!(f, "HOLD"),
        }
    }
}

/// Rule-based directional signal with the reasons that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub signal_type: SignalType,
    pub confidence: u8,
    pub reasons: Vec<String>,
    pub score: String,
}

impl Signal {
    /// Neutral placeholder used before any indicator has been computed.
    pub fn neutral() -> Self {
        Self {
            signal_type: SignalType::Hold,
            confidence: 50,
            reasons: vec!["Neutral market conditions, waiting".to_string()],
            score: "Neutral".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// Rolling evaluation of the classifier on the trailing dataset rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Total dataset rows at the time of the last retrain.
    pub sample_count: usize,
    /// Fraction of correct thresholded predictions over the eval window.
    pub accuracy: f64,
    /// Mean squared error between probability and realized label.
    pub brier_score: f64,
}

/// Metadata persisted alongside the model parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: i64,
    pub sample_count: usize,
}

/// Coordinator state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Loading,
    Ready,
    NoModel,
    Training,
    Error(String),
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Loading => write!(f, "loading"),
            EngineState::Ready => write!(f, "ready"),
            EngineState::NoModel => write!(f, "no model"),
            EngineState::Training => write!(f, "training"),
            EngineState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Read-only view of the engine published to consumers on every change.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub signal: Signal,
    pub probability_up: Option<f64>,
    pub direction: Option<Direction>,
    pub metrics: Option<EvaluationMetrics>,
    pub state: EngineState,
    pub status: String,
}

impl EngineSnapshot {
    pub fn initial() -> Self {
        Self {
            signal: Signal::neutral(),
            probability_up: None,
            direction: None,
            metrics: None,
            state: EngineState::Idle,
            status: "starting".to_string(),
        }
    }
}
