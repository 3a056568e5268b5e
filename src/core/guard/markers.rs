

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::MarkerStore;

pub const INTERRUPTED_MARKER_KEY: &str = "processing_interrupted";

pub const CONFIRMED_MARKER_KEY: &str = "confirmed_reload";

pub const CONFIRMED_MARKER_VALUE: &str = "true";


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterruptedMarker {
    pub timestamp: DateTime<Utc>,
}

impl InterruptedMarker {
    pub fn now() -> Self {
        Self { timestamp: Utc::now() }
    }

    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now - self.timestamp > max_age,
            Err(_) => false,
        }
    }
}


/// Reads and clears the marker left by a run that was forced to stop.
/// Markers older than `max_age` are discarded.
pub fn take_interrupted(store: &dyn MarkerStore, max_age: Duration) -> Option<InterruptedMarker> {
    let raw = match store.get(INTERRUPTED_MARKER_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to read interruption marker: {}", e);
            return None;
        }
    };

    if let Err(e) = store.remove(INTERRUPTED_MARKER_KEY) {
        warn!("Failed to clear interruption marker: {}", e);
    }

    let marker: InterruptedMarker = match serde_json::from_str(&raw) {
        Ok(marker) => marker,
        Err(e) => {
            warn!("Discarding malformed interruption marker: {}", e);
            return None;
        }
    };

    if marker.is_expired(max_age, Utc::now()) {
        debug!("Discarding stale interruption marker from {}", marker.timestamp);
        return None;
    }

    Some(marker)
}
