pub mod cache;
pub mod http;
pub mod municipalities;
pub mod openmeteo;
pub mod openweather;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

/// Cache values an orchestrator already fetched in a batch, keyed by the
/// full cache key. Providers consult it before their own cache read.
pub type Prefetched = HashMap<String, Value>;

/// Staging area for deferred cache writes: providers park raw payloads
/// here so the orchestrator can commit one batch write per cache class.
pub type StagedWrites = Arc<Mutex<HashMap<String, Value>>>;

#[must_use]
pub fn staged_writes() -> StagedWrites {
    Arc::new(Mutex::new(HashMap::new()))
}

/// Drain a staging map, leaving it empty.
#[must_use]
pub fn drain_staged(writes: &StagedWrites) -> HashMap<String, Value> {
    writes
        .lock()
        .map(|mut map| std::mem::take(&mut *map))
        .unwrap_or_default()
}
