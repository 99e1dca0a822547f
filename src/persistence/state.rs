use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::persistence::store::{StateStore, StoreError};

pub const MAP_STATE_KEY: &str = "map_state";
pub const RESOURCES_KEY: &str = "resources";
pub const CLOCK_KEY: &str = "clock";
pub const EVENTS_KEY: &str = "events";
pub const NOTICES_KEY: &str = "notices";

pub const ALL_KEYS: [&str; 5] = [
    MAP_STATE_KEY,
    RESOURCES_KEY,
    CLOCK_KEY,
    EVENTS_KEY,
    NOTICES_KEY,
];

/// Read and decode a blob. Missing, unreadable or malformed blobs all come
/// back as `None` so callers keep their defaults.
pub fn load_json<T: DeserializeOwned>(store: &impl StateStore, key: &str) -> Option<T> {
    let raw = match store.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Could not read saved state, using defaults");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Saved state is malformed, using defaults");
            None
        }
    }
}

pub fn save_json<T: Serialize>(
    store: &mut impl StateStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let encoded = serde_json::to_string(value).map_err(|e| StoreError::Serialize(e.to_string()))?;
    store.save(key, &encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::store::MemoryStore;
    use crate::simulation::ledger::ResourceLedger;

    #[test]
    fn round_trip_through_store() {
        let mut store = MemoryStore::new();
        let ledger = ResourceLedger::with_carbon(750);
        save_json(&mut store, RESOURCES_KEY, &ledger).unwrap();
        let restored: ResourceLedger = load_json(&store, RESOURCES_KEY).unwrap();
        assert_eq!(restored, ledger);
    }

    #[test]
    fn missing_key_is_none() {
        let store = MemoryStore::new();
        assert!(load_json::<ResourceLedger>(&store, RESOURCES_KEY).is_none());
    }

    #[test]
    fn malformed_blob_is_none() {
        let mut store = MemoryStore::new();
        store.save(RESOURCES_KEY, "{not json").unwrap();
        assert!(load_json::<ResourceLedger>(&store, RESOURCES_KEY).is_none());
    }
}
