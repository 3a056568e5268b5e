

mod markers;
mod reload;
mod store;

pub use markers::{
    take_interrupted, InterruptedMarker, CONFIRMED_MARKER_KEY, CONFIRMED_MARKER_VALUE,
    INTERRUPTED_MARKER_KEY,
};
pub use reload::{
    bind, detach, InterceptHandler, Key, KeyDecision, KeyEvent, ReloadGuard, UnloadDecision,
};
pub use store::{FileMarkerStore, MarkerStore, MemoryMarkerStore};
