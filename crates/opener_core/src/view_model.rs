use crate::PanelTab;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Success,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelViewModel {
    pub toggle_checked: bool,
    pub status_text: &'static str,
    pub status_tone: StatusTone,
    /// False until the stored flag has been read.
    pub loaded: bool,
    pub active_tab: PanelTab,
    pub settings_visible: bool,
    pub about_visible: bool,
    pub connected: bool,
    pub dirty: bool,
}
