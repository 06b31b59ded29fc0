//! PDF opener core: pure state machines shared by the controller, the page
//! bridge and the control panel.
mod buttons;
mod dedupe;
mod destination;
mod download;
mod effect;
mod flag;
mod host_pattern;
mod intercept;
mod message;
mod msg;
mod retry;
mod state;
mod transition;
mod update;
mod view_model;

pub use buttons::{ButtonRewriter, PageButton, DOWNLOAD_MARKUP, VIEW_PDF_MARKUP};
pub use dedupe::HandledUrlSet;
pub use destination::{choose_destination, Destination, PageId};
pub use download::{is_pdf_mime, DownloadEvent, DownloadId, DownloadState, PDF_MIME};
pub use effect::Effect;
pub use flag::{enabled_or_default, flag_from_stored, DEFAULT_ENABLED, FLAG_KEY};
pub use host_pattern::HostPattern;
pub use intercept::{InterceptionState, ListenerChange, Screening};
pub use message::{
    BridgeReply, BridgeRequest, ControlMessage, OpenPdfDetail, StateChangeDetail,
    OPEN_PDF_EVENT, STATE_CHANGE_EVENT,
};
pub use msg::Msg;
pub use retry::{RetryDecision, RetryLedger, RetryRecord, DEFAULT_MAX_ATTEMPTS};
pub use state::{ConnectionState, PanelState, PanelTab};
pub use transition::TransitionTracker;
pub use update::update;
pub use view_model::{PanelViewModel, StatusTone};
