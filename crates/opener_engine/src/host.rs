//! Async seams over the host platform. The controller, bridge and panel only
//! talk to the outside world through these traits.
use std::sync::Arc;

use async_trait::async_trait;
use opener_core::{
    BridgeReply, BridgeRequest, ControlMessage, DownloadId, DownloadState, PageId,
};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::HostError;

/// A change delivered to settings subscribers. Some hosts do not notify the
/// writer of its own change, so callers never rely on seeing it.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsChange {
    pub key: String,
    pub value: Value,
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, HostError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), HostError>;
    fn subscribe(&self) -> broadcast::Receiver<SettingsChange>;
}

#[async_trait]
pub trait DownloadHost: Send + Sync {
    async fn status(&self, id: DownloadId) -> Result<DownloadState, HostError>;
    async fn cancel(&self, id: DownloadId) -> Result<(), HostError>;
    /// Attaches or detaches the download-start listener.
    fn set_listening(&self, listening: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    pub id: PageId,
    pub url: String,
    pub complete: bool,
}

#[async_trait]
pub trait TabHost: Send + Sync {
    async fn query_pages(&self) -> Result<Vec<PageInfo>, HostError>;
    async fn page(&self, id: PageId) -> Result<Option<PageInfo>, HostError>;
    /// Active page of the current window.
    async fn active_page(&self) -> Result<Option<PageInfo>, HostError>;
    async fn has_window(&self) -> Result<bool, HostError>;
    async fn navigate(&self, id: PageId, url: &str) -> Result<(), HostError>;
    async fn open_tab(&self, url: &str) -> Result<PageId, HostError>;
    async fn open_window(&self, url: &str) -> Result<PageId, HostError>;
    async fn reload(&self, id: PageId) -> Result<(), HostError>;
}

/// Controller → page bridge messages.
#[async_trait]
pub trait PageMessenger: Send + Sync {
    async fn send(&self, page: PageId, message: ControlMessage) -> Result<BridgeReply, HostError>;
}

#[async_trait]
pub trait ScriptInjector: Send + Sync {
    async fn inject(&self, page: PageId, resource: &str) -> Result<(), HostError>;
}

/// The page as seen from its bridge.
#[async_trait]
pub trait PageChannel: Send + Sync {
    async fn dispatch_state(&self, enabled: bool) -> Result<(), HostError>;
    async fn navigate_in_place(&self, url: &str) -> Result<(), HostError>;
    async fn inject_page_script(&self, resource: &str) -> Result<(), HostError>;
}

/// Bridge → controller one-shot requests.
#[async_trait]
pub trait ControllerLink: Send + Sync {
    async fn request(&self, request: BridgeRequest) -> Result<BridgeReply, HostError>;
}

/// The control panel's persistent connection to the controller.
#[async_trait]
pub trait PanelPort: Send + Sync {
    async fn connect(&self) -> Result<(), HostError>;
    async fn send(&self, message: ControlMessage) -> Result<(), HostError>;
}

/// Host services the background controller runs against.
#[derive(Clone)]
pub struct HostServices {
    pub settings: Arc<dyn SettingsStore>,
    pub downloads: Arc<dyn DownloadHost>,
    pub tabs: Arc<dyn TabHost>,
    pub messenger: Arc<dyn PageMessenger>,
    pub scripts: Arc<dyn ScriptInjector>,
}
