use crate::PanelTab;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The stored flag was read when the panel opened (`None` when absent).
    StoredFlagLoaded(Option<bool>),
    /// User flipped the toggle.
    ToggleChanged(bool),
    /// Another context changed the stored flag.
    FlagChangedElsewhere(bool),
    /// User clicked a tab button.
    TabSelected(PanelTab),
    /// The connection to the controller is (re)established.
    Connected,
    /// The connection dropped or could not be opened.
    ConnectionLost,
}
