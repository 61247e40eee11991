//! Session configuration.
//!
//! Settings are plain serde structs so embedders can load them from any
//! format; every field has a default.

use serde::{Deserialize, Serialize};

/// Which pull protocol the driver uses to run an operator tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Row at a time: `next()` + `current_tuple()`.
    #[default]
    Tuple,
    /// Batches of up to `Chunk::MAX_ROWS` rows: `next_chunk()`.
    Chunk,
}

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    /// Pull protocol for query execution.
    pub execution_mode: ExecutionMode,
    /// When true, statements join an explicit multi-statement transaction
    /// instead of committing on their own.
    pub multi_operation_mode: bool,
}

impl SessionConfig {
    /// Configuration running queries in chunk mode.
    pub fn chunked() -> Self {
        Self {
            execution_mode: ExecutionMode::Chunk,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.execution_mode, ExecutionMode::Tuple);
        assert!(!config.multi_operation_mode);
        assert_eq!(SessionConfig::chunked().execution_mode, ExecutionMode::Chunk);
    }

    #[test]
    fn test_serde() {
        let config: SessionConfig = serde_json::from_str(r#"{"execution_mode": "chunk"}"#).unwrap();
        assert_eq!(config, SessionConfig::chunked());

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"execution_mode":"chunk","multi_operation_mode":false}"#);
        assert_eq!(serde_json::from_str::<SessionConfig>("{}").unwrap(), SessionConfig::default());
    }
}
