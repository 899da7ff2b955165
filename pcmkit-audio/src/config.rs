use crate::format::IntToFloat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub worker: WorkerConfig,
    pub formatter: FormatterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of rounds allowed to run on worker threads at the same time, across all sessions
    /// sharing a [`crate::WorkerPool`].
    pub max_in_flight_rounds: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_in_flight_rounds: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub int_to_float: IntToFloat,
}
