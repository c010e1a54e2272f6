use std::time::Duration;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_SIZE: usize = 100;
const DEFAULT_MAX_CONCURRENCY: usize = 1;

/// Batching settings of a [DataLoader](crate::DataLoader).
#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Debug, Setters)]
#[serde(rename_all = "camelCase", default)]
pub struct Batch {
    /// Milliseconds a batch stays open after its first key. `0` dispatches
    /// on the next scheduler turn.
    pub delay: u64,

    /// Number of distinct keys that closes a batch immediately. `0` means
    /// unbounded.
    pub max_size: usize,

    /// Number of fetch calls a single loader may have in flight.
    pub max_concurrency: usize,
}

impl Default for Batch {
    fn default() -> Self {
        Batch {
            delay: 0,
            max_size: DEFAULT_MAX_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl Batch {
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.delay)
    }
}
