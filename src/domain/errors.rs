use thiserror::Error;

/// Faults surfaced by the core engine.
///
/// "Not enough data" situations are deliberately absent here: indicator and
/// dataset calls resolve them with sentinels or `None`, never an error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("training failed: {reason}")]
    Training { reason: String },

    #[error("prediction failed: {reason}")]
    Prediction { reason: String },

    #[error("model store failure: {reason}")]
    Persistence { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_reason() {
        let err = EngineError::Training {
            reason: "dimension mismatch".to_string(),
        };
        assert!(err.to_string().contains("dimension mismatch"));

        let err = EngineError::Persistence {
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));
    }
}
