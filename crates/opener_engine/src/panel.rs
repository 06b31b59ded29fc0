use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use opener_core::{
    flag_from_stored, update, Effect, Msg, PanelState, PanelTab, PanelViewModel,
    FLAG_KEY,
};
use opener_logging::{opener_debug, opener_info, opener_warn, ExecutionContext};
use serde_json::Value;

use crate::{PanelPort, SettingsChange, SettingsStore};

const CTX: ExecutionContext = ExecutionContext::Panel;

/// Drives the control panel state machine against the settings store and the
/// connection to the controller.
///
/// Messages are processed from a queue, so effects that produce follow-up
/// messages (a reconnect producing `Connected`) never recurse.
pub struct ControlPanel {
    state: PanelState,
    settings: Arc<dyn SettingsStore>,
    port: Arc<dyn PanelPort>,
    reconnect_backoff: Duration,
}

impl ControlPanel {
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        port: Arc<dyn PanelPort>,
        reconnect_backoff: Duration,
    ) -> Self {
        Self {
            state: PanelState::new(),
            settings,
            port,
            reconnect_backoff,
        }
    }

    pub fn with_initial_tab(mut self, tab: PanelTab) -> Self {
        self.state = PanelState::with_initial_tab(tab);
        self
    }

    pub fn view(&self) -> PanelViewModel {
        self.state.view()
    }

    pub fn consume_dirty(&mut self) -> bool {
        self.state.consume_dirty()
    }

    /// Loads the stored flag and opens the connection.
    pub async fn open(&mut self) {
        let stored = match self.settings.get(FLAG_KEY).await {
            Ok(value) => flag_from_stored(value.as_ref()),
            Err(err) => {
                opener_warn!("[{}] Reading {} failed: {}", CTX.tag(), FLAG_KEY, err);
                None
            }
        };
        self.dispatch(Msg::StoredFlagLoaded(stored)).await;

        let connected = match self.port.connect().await {
            Ok(()) => Msg::Connected,
            Err(err) => {
                opener_warn!("[{}] Connecting to controller failed: {}", CTX.tag(), err);
                Msg::ConnectionLost
            }
        };
        self.dispatch(connected).await;
    }

    pub async fn toggle(&mut self, enabled: bool) {
        self.dispatch(Msg::ToggleChanged(enabled)).await;
    }

    pub async fn select_tab(&mut self, tab: PanelTab) {
        self.dispatch(Msg::TabSelected(tab)).await;
    }

    /// The host reported that the connection dropped.
    pub async fn on_disconnect(&mut self) {
        opener_info!("[{}] Connection to controller lost", CTX.tag());
        self.dispatch(Msg::ConnectionLost).await;
    }

    pub async fn on_settings_changed(&mut self, change: SettingsChange) {
        if change.key != FLAG_KEY {
            return;
        }
        if let Some(enabled) = flag_from_stored(Some(&change.value)) {
            self.dispatch(Msg::FlagChangedElsewhere(enabled)).await;
        }
    }

    pub async fn dispatch(&mut self, msg: Msg) {
        let mut inbox = VecDeque::from([msg]);
        while let Some(msg) = inbox.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                if let Some(follow_up) = self.run_effect(effect).await {
                    inbox.push_back(follow_up);
                }
            }
        }
    }

    async fn run_effect(&self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::PersistFlag { enabled } => {
                if let Err(err) = self.settings.set(FLAG_KEY, Value::Bool(enabled)).await {
                    opener_warn!("[{}] Persisting flag failed: {}", CTX.tag(), err);
                }
                None
            }
            Effect::SendToController(message) => match self.port.send(message).await {
                Ok(()) => {
                    opener_debug!("[{}] Sent {:?}", CTX.tag(), message);
                    None
                }
                Err(err) => {
                    opener_warn!("[{}] Sending {:?} failed: {}", CTX.tag(), message, err);
                    Some(Msg::ConnectionLost)
                }
            },
            Effect::ScheduleReconnect => {
                self.reconnect().await;
                Some(Msg::Connected)
            }
        }
    }

    // Retries until the controller accepts the connection.
    async fn reconnect(&self) {
        let mut attempt = 0u32;
        loop {
            tokio::time::sleep(self.reconnect_backoff).await;
            attempt += 1;
            match self.port.connect().await {
                Ok(()) => {
                    opener_info!("[{}] Reconnected after {} attempt(s)", CTX.tag(), attempt);
                    return;
                }
                Err(err) => {
                    opener_debug!("[{}] Reconnect attempt {} failed: {}", CTX.tag(), attempt, err);
                }
            }
        }
    }
}

