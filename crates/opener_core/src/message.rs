//! Wire formats exchanged between the controller, page bridges, the control
//! panel and the in-page script. Everything travels as JSON tagged by `action`.
use serde::{Deserialize, Serialize};

/// Page event carrying [`StateChangeDetail`] from the bridge into the page.
pub const STATE_CHANGE_EVENT: &str = "pdfOpenerStateChange";
/// Page event carrying [`OpenPdfDetail`] from the page to the bridge.
pub const OPEN_PDF_EVENT: &str = "pdfOpenerOpenPdf";

/// Flag state pushed by the control panel to the controller, and by the
/// controller to page bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    /// Sent on (re)connect to announce the panel's current state.
    InitState { enabled: bool },
    UpdateState { enabled: bool },
}

impl ControlMessage {
    pub fn enabled(&self) -> bool {
        match self {
            ControlMessage::InitState { enabled } | ControlMessage::UpdateState { enabled } => {
                *enabled
            }
        }
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// One-shot requests sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BridgeRequest {
    /// Open a resource the page cannot open from its own context.
    OpenPdfInNewTab { url: String },
    /// Liveness check; the controller only has to answer.
    WakeUp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeDetail {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPdfDetail {
    pub resource_url: String,
}
