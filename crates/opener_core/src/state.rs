use crate::view_model::{PanelViewModel, StatusTone};
use crate::DEFAULT_ENABLED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelTab {
    #[default]
    Settings,
    About,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    /// Waiting out the reconnect backoff.
    Reconnecting,
}

/// Control panel state. Changed only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelState {
    enabled: bool,
    loaded: bool,
    connection: ConnectionState,
    active_tab: PanelTab,
    dirty: bool,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_ENABLED,
            loaded: false,
            connection: ConnectionState::default(),
            active_tab: PanelTab::default(),
            dirty: false,
        }
    }
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts on `tab` instead of the settings tab.
    pub fn with_initial_tab(tab: PanelTab) -> Self {
        Self {
            active_tab: tab,
            ..Self::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn view(&self) -> PanelViewModel {
        PanelViewModel {
            toggle_checked: self.enabled,
            status_text: if self.enabled { "Enabled" } else { "Disabled" },
            status_tone: if self.enabled {
                StatusTone::Success
            } else {
                StatusTone::Danger
            },
            loaded: self.loaded,
            active_tab: self.active_tab,
            settings_visible: self.active_tab == PanelTab::Settings,
            about_visible: self.active_tab == PanelTab::About,
            connected: self.connection == ConnectionState::Connected,
            dirty: self.dirty,
        }
    }

    /// Returns whether the view changed since the last call, and clears it.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            self.enabled = enabled;
            self.dirty = true;
        }
    }

    pub(crate) fn mark_loaded(&mut self) {
        if !self.loaded {
            self.loaded = true;
            self.dirty = true;
        }
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) {
        if self.connection != connection {
            self.connection = connection;
            self.dirty = true;
        }
    }

    pub(crate) fn select_tab(&mut self, tab: PanelTab) {
        if self.active_tab != tab {
            self.active_tab = tab;
            self.dirty = true;
        }
    }
}
