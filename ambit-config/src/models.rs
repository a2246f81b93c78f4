use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use ambit_model::ScopePolicy;

/// Global knobs that tune pipeline behaviour.
///
/// Every field carries a default so deployments can adopt new settings
/// without supplying a full configuration payload.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Event bus channel sizing.
    pub bus: BusConfig,
    /// Emission-time scope filtering defaults.
    pub scope: ScopeConfig,
    /// Batch thresholds applied when a tool has no override.
    pub batch: BatchConfig,
    /// Node concurrency defaults applied by the factory.
    pub node: NodeDefaults,
    /// Per-tool batch overrides, keyed by tool name (e.g. `"gau"`).
    pub tools: HashMap<String, BatchOverrides>,
}

impl PipelineConfig {
    /// Batch thresholds for a tool: its override merged onto the defaults.
    pub fn batch_for(&self, tool: &str) -> BatchConfig {
        match self.tools.get(tool) {
            Some(overrides) => self.batch.merged(overrides),
            None => self.batch,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Capacity of each per-queue broadcast channel. Slow subscribers past
    /// this depth observe lag, not backpressure on publishers.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    /// Policy applied to nodes that don't choose their own.
    pub default_policy: ScopePolicy,
    /// Minimum confidence for the `confidence` policy to let an emission
    /// with no in-scope targets through unfiltered.
    pub confidence_threshold: f64,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            default_policy: ScopePolicy::None,
            confidence_threshold: 0.6,
        }
    }
}

/// Dual-threshold batching parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Soft floor: don't flush below this size until `timeout_ms` elapses.
    pub min_size: usize,
    /// Hard ceiling: flush immediately at this size.
    pub max_size: usize,
    /// Wall-clock floor gate in milliseconds.
    pub timeout_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_size: 10,
            max_size: 100,
            timeout_ms: 5_000,
        }
    }
}

impl BatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn merged(&self, overrides: &BatchOverrides) -> BatchConfig {
        BatchConfig {
            min_size: overrides.min_size.unwrap_or(self.min_size),
            max_size: overrides.max_size.unwrap_or(self.max_size),
            timeout_ms: overrides.timeout_ms.unwrap_or(self.timeout_ms),
        }
    }
}

/// Optional-field variant of [`BatchConfig`] for per-tool overrides.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOverrides {
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeDefaults {
    /// Concurrent executions admitted per node.
    pub max_parallelism: usize,
    /// Seconds to wait before starting each execution; staggers dependent
    /// scans.
    pub execution_delay_secs: u64,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            max_parallelism: 1,
            execution_delay_secs: 0,
        }
    }
}

impl NodeDefaults {
    pub fn execution_delay(&self) -> Duration {
        Duration::from_secs(self.execution_delay_secs)
    }
}
