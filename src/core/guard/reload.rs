

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::markers::{
    InterruptedMarker, CONFIRMED_MARKER_KEY, CONFIRMED_MARKER_VALUE, INTERRUPTED_MARKER_KEY,
};
use super::store::MarkerStore;
use crate::core::batch::ProgressState;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    F5,
    Char(char),
    Other,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

impl KeyEvent {
    pub fn plain(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self {
            ctrl: true,
            ..Self::plain(Key::Char(c))
        }
    }

    pub fn meta(c: char) -> Self {
        Self {
            meta: true,
            ..Self::plain(Key::Char(c))
        }
    }

    #[must_use]
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// F5, Ctrl/Cmd+R and Ctrl/Cmd+Shift+R.
    pub fn is_reload_shortcut(&self) -> bool {
        match self.key {
            Key::F5 => true,
            Key::Char(c) => (self.ctrl || self.meta) && c.eq_ignore_ascii_case(&'r'),
            Key::Other => false,
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
    Allow,
    /// Ask the platform to show its own leave-page confirmation.
    Prompt,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDecision {
    PassThrough,
    /// Default action suppressed; the caller should present its confirmation.
    Intercepted,
}


pub type InterceptHandler = Arc<dyn Fn() + Send + Sync>;


#[derive(Debug, Default)]
struct GuardState {
    busy: bool,
    show_modal: bool,
    confirmed: bool,
}


/// Protects in-flight work from accidental reloads and closes.
///
/// While busy, unload signals are turned into prompts and reload shortcuts
/// are intercepted. A forced unload leaves an interruption marker in the
/// store so the next run can report it; see [`super::take_interrupted`].
pub struct ReloadGuard {
    store: Arc<dyn MarkerStore>,
    on_intercept: Option<InterceptHandler>,
    state: Mutex<GuardState>,
}

impl ReloadGuard {
    pub fn new(store: Arc<dyn MarkerStore>) -> Self {
        Self {
            store,
            on_intercept: None,
            state: Mutex::new(GuardState::default()),
        }
    }

    #[must_use]
    pub fn with_intercept(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_intercept = Some(Arc::new(f));
        self
    }

    pub fn is_armed(&self) -> bool {
        self.state.lock().busy
    }

    pub fn show_modal(&self) -> bool {
        self.state.lock().show_modal
    }

    pub fn dismiss_modal(&self) {
        self.state.lock().show_modal = false;
    }

    pub fn set_busy(&self, busy: bool) {
        {
            let mut state = self.state.lock();
            if state.busy == busy {
                return;
            }
            state.busy = busy;
            if !busy {
                state.show_modal = false;
                state.confirmed = false;
            }
        }

        if busy {
            info!("Reload guard armed");
            return;
        }

        // Work finished normally, so nothing was interrupted.
        self.remove_marker(INTERRUPTED_MARKER_KEY);
        self.remove_marker(CONFIRMED_MARKER_KEY);
        info!("Reload guard disarmed");
    }

    pub fn handle_before_unload(&self) -> UnloadDecision {
        let confirmed = {
            let state = self.state.lock();
            if !state.busy {
                return UnloadDecision::Allow;
            }
            state.confirmed
        };

        if confirmed || self.confirmed_marker_present() {
            debug!("Unload allowed after explicit confirmation");
            self.remove_marker(CONFIRMED_MARKER_KEY);
            return UnloadDecision::Allow;
        }

        match serde_json::to_string(&InterruptedMarker::now()) {
            Ok(raw) => {
                if let Err(e) = self.store.set(INTERRUPTED_MARKER_KEY, &raw) {
                    error!("Failed to persist interruption marker: {}", e);
                }
            }
            Err(e) => error!("Failed to encode interruption marker: {}", e),
        }

        info!("Unload intercepted while work is in progress");
        UnloadDecision::Prompt
    }

    pub fn handle_key(&self, event: &KeyEvent) -> KeyDecision {
        if !event.is_reload_shortcut() || !self.is_armed() {
            return KeyDecision::PassThrough;
        }

        match &self.on_intercept {
            Some(on_intercept) => on_intercept(),
            None => self.state.lock().show_modal = true,
        }

        debug!("Reload shortcut intercepted: {:?}", event);
        KeyDecision::Intercepted
    }

    /// Records that the user chose to reload through the caller's own
    /// confirmation, so the next unload goes through without a prompt.
    pub fn confirm_reload(&self) {
        self.state.lock().confirmed = true;
        if let Err(e) = self.store.set(CONFIRMED_MARKER_KEY, CONFIRMED_MARKER_VALUE) {
            error!("Failed to persist reload confirmation: {}", e);
        }
    }

    fn confirmed_marker_present(&self) -> bool {
        match self.store.get(CONFIRMED_MARKER_KEY) {
            Ok(value) => value.as_deref() == Some(CONFIRMED_MARKER_VALUE),
            Err(e) => {
                warn!("Failed to read reload confirmation: {}", e);
                false
            }
        }
    }

    fn remove_marker(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!("Failed to clear marker {}: {}", key, e);
        }
    }
}


/// Keeps the guard armed exactly while the scheduler reports work in
/// progress. The task ends when the scheduler is dropped.
pub fn bind<I, O>(
    guard: Arc<ReloadGuard>,
    mut progress: watch::Receiver<ProgressState<I, O>>,
) -> JoinHandle<()>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let busy = progress.borrow_and_update().is_processing;
            guard.set_busy(busy);

            if progress.changed().await.is_err() {
                break;
            }
        }
        guard.set_busy(false);
    })
}


/// Stops a [`bind`] task and waits until it can no longer touch the guard.
/// The guard keeps its last state, so an interruption marker written by a
/// forced stop survives a later cancel.
pub async fn detach(binding: JoinHandle<()>) {
    binding.abort();
    if let Err(e) = binding.await {
        if !e.is_cancelled() {
            warn!("Reload guard binding ended abnormally: {}", e);
        }
    }
}
