//! Rule-based BUY/SELL/HOLD signal from current indicator values.

use crate::domain::types::{Signal, SignalType};

/// Combine the current indicator values into a discrete signal.
///
/// Pure and deterministic: the same inputs always yield the same signal,
/// confidence, reasons and score.
pub fn generate(rsi: f64, ma20: f64, ma50: f64, price: f64, macd: f64) -> Signal {
    let mut reasons = Vec::new();
    let mut bullish = 0u32;
    let mut bearish = 0u32;

    if rsi < 30.0 {
        reasons.push("RSI oversold".to_string());
        bullish += 2;
    } else if rsi > 70.0 {
        reasons.push("RSI overbought".to_string());
        bearish += 2;
    } else if (40.0..=60.0).contains(&rsi) {
        reasons.push("RSI neutral".to_string());
    }

    if ma20 > ma50 {
        reasons.push("MA20 above MA50 (uptrend)".to_string());
        bullish += 2;
    } else if ma20 < ma50 {
        reasons.push("MA20 below MA50 (downtrend)".to_string());
        bearish += 2;
    }

    if price > ma20 {
        reasons.push("Price above MA20".to_string());
        bullish += 1;
    } else {
        reasons.push("Price below MA20".to_string());
        bearish += 1;
    }

    if macd > 0.0 {
        reasons.push("MACD positive".to_string());
        bullish += 1;
    } else {
        reasons.push("MACD negative".to_string());
        bearish += 1;
    }

    let total = (bullish + bearish).max(1);
    let confidence_for = |majority: u32| {
        let pct = (majority as f64 / total as f64 * 100.0).round() as u8;
        pct.min(85)
    };

    if bullish > bearish {
        Signal {
            signal_type: SignalType::Buy,
            confidence: confidence_for(bullish),
            reasons,
            score: format!("{}/{} bullish", bullish, total),
        }
    } else if bearish > bullish {
        Signal {
            signal_type: SignalType::Sell,
            confidence: confidence_for(bearish),
            reasons,
            score: format!("{}/{} bearish", bearish, total),
        }
    } else {
        Signal::neutral()
    }
}
