//! In-memory host used by the simulator and by tests. Every host call that
//! changes something is recorded as a [`HostAction`].
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use opener_core::{BridgeReply, ControlMessage, DownloadId, DownloadState, PageId};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{
    DownloadHost, HostError, PageChannel, PageInfo, PageMessenger, PanelPort, ScriptInjector,
    SettingsChange, SettingsStore, TabHost,
};

const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    ListenerAttached,
    ListenerDetached,
    Cancelled(DownloadId),
    Navigated { page: PageId, url: String },
    OpenedTab { page: PageId, url: String },
    OpenedWindow { page: PageId, url: String },
    Reloaded(PageId),
    Injected { page: PageId, resource: String },
    Delivered { page: PageId, message: ControlMessage },
}

/// Whether a page has a bridge listening for controller messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    Present,
    Absent,
    /// Absent until the bridge script is injected.
    AfterInjection,
}

#[derive(Debug, Clone)]
struct MemoryPage {
    url: String,
    bridge: BridgeMode,
    injected: bool,
    loading: bool,
}

impl MemoryPage {
    fn bridge_listening(&self) -> bool {
        match self.bridge {
            BridgeMode::Present => true,
            BridgeMode::Absent => false,
            BridgeMode::AfterInjection => self.injected,
        }
    }
}

#[derive(Debug)]
struct HostState {
    pages: BTreeMap<PageId, MemoryPage>,
    active: Option<PageId>,
    windows: u32,
    downloads: HashMap<DownloadId, DownloadState>,
    failing_cancels: HashSet<DownloadId>,
    failing_navigation: bool,
    listening: bool,
    next_page_id: PageId,
    actions: Vec<HostAction>,
}

/// Browser stand-in: pages, windows, downloads and bridges.
#[derive(Debug)]
pub struct MemoryHost {
    state: Mutex<HostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    /// One empty window, no pages.
    pub fn new() -> Self {
        Self::with_windows(1)
    }

    pub fn without_window() -> Self {
        Self::with_windows(0)
    }

    fn with_windows(windows: u32) -> Self {
        Self {
            state: Mutex::new(HostState {
                pages: BTreeMap::new(),
                active: None,
                windows,
                downloads: HashMap::new(),
                failing_cancels: HashSet::new(),
                failing_navigation: false,
                listening: false,
                next_page_id: 1,
                actions: Vec::new(),
            }),
        }
    }

    /// Adds a page in the current window without activating it.
    pub fn add_page(&self, url: impl Into<String>, bridge: BridgeMode) -> PageId {
        let mut state = self.lock();
        if state.windows == 0 {
            state.windows = 1;
        }
        insert_page(&mut state, url.into(), bridge)
    }

    pub fn set_active(&self, page: Option<PageId>) {
        self.lock().active = page;
    }

    pub fn close_page(&self, page: PageId) -> bool {
        let mut state = self.lock();
        if state.active == Some(page) {
            state.active = None;
        }
        state.pages.remove(&page).is_some()
    }

    pub fn set_page_url(&self, page: PageId, url: impl Into<String>) {
        if let Some(entry) = self.lock().pages.get_mut(&page) {
            entry.url = url.into();
        }
    }

    /// Marks a page as still loading (or finished).
    pub fn set_loading(&self, page: PageId, loading: bool) {
        if let Some(entry) = self.lock().pages.get_mut(&page) {
            entry.loading = loading;
        }
    }

    pub fn page_url(&self, page: PageId) -> Option<String> {
        self.lock().pages.get(&page).map(|entry| entry.url.clone())
    }

    pub fn page_count(&self) -> usize {
        self.lock().pages.len()
    }

    pub fn window_count(&self) -> u32 {
        self.lock().windows
    }

    /// Registers an in-progress download.
    pub fn start_download(&self, id: DownloadId) {
        self.set_download_state(id, DownloadState::InProgress);
    }

    pub fn set_download_state(&self, id: DownloadId, download_state: DownloadState) {
        self.lock().downloads.insert(id, download_state);
    }

    pub fn download_state(&self, id: DownloadId) -> Option<DownloadState> {
        self.lock().downloads.get(&id).copied()
    }

    pub fn fail_cancel(&self, id: DownloadId) {
        self.lock().failing_cancels.insert(id);
    }

    pub fn fail_navigation(&self, failing: bool) {
        self.lock().failing_navigation = failing;
    }

    pub fn is_listening(&self) -> bool {
        self.lock().listening
    }

    pub fn actions(&self) -> Vec<HostAction> {
        self.lock().actions.clone()
    }

    pub fn take_actions(&self) -> Vec<HostAction> {
        std::mem::take(&mut self.lock().actions)
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn insert_page(state: &mut HostState, url: String, bridge: BridgeMode) -> PageId {
    let id = state.next_page_id;
    state.next_page_id += 1;
    state.pages.insert(
        id,
        MemoryPage {
            url,
            bridge,
            injected: false,
            loading: false,
        },
    );
    id
}

fn page_info(id: PageId, page: &MemoryPage) -> PageInfo {
    PageInfo {
        id,
        url: page.url.clone(),
        complete: !page.loading,
    }
}

#[async_trait]
impl DownloadHost for MemoryHost {
    async fn status(&self, id: DownloadId) -> Result<DownloadState, HostError> {
        self.lock()
            .downloads
            .get(&id)
            .copied()
            .ok_or_else(|| HostError::NotFound(format!("download {id}")))
    }

    async fn cancel(&self, id: DownloadId) -> Result<(), HostError> {
        let mut state = self.lock();
        if state.failing_cancels.contains(&id) {
            return Err(HostError::Rejected(format!("download {id} cannot be cancelled")));
        }
        match state.downloads.get(&id).copied() {
            Some(DownloadState::InProgress) => {
                state.downloads.insert(id, DownloadState::Interrupted);
                state.actions.push(HostAction::Cancelled(id));
                Ok(())
            }
            Some(_) => Err(HostError::Rejected(format!("download {id} is not in progress"))),
            None => Err(HostError::NotFound(format!("download {id}"))),
        }
    }

    fn set_listening(&self, listening: bool) {
        let mut state = self.lock();
        state.listening = listening;
        state.actions.push(if listening {
            HostAction::ListenerAttached
        } else {
            HostAction::ListenerDetached
        });
    }
}

#[async_trait]
impl TabHost for MemoryHost {
    async fn query_pages(&self) -> Result<Vec<PageInfo>, HostError> {
        Ok(self
            .lock()
            .pages
            .iter()
            .map(|(id, page)| page_info(*id, page))
            .collect())
    }

    async fn page(&self, id: PageId) -> Result<Option<PageInfo>, HostError> {
        Ok(self.lock().pages.get(&id).map(|page| page_info(id, page)))
    }

    async fn active_page(&self) -> Result<Option<PageInfo>, HostError> {
        let state = self.lock();
        Ok(state
            .active
            .and_then(|id| state.pages.get(&id).map(|page| page_info(id, page))))
    }

    async fn has_window(&self) -> Result<bool, HostError> {
        Ok(self.lock().windows > 0)
    }

    async fn navigate(&self, id: PageId, url: &str) -> Result<(), HostError> {
        let mut state = self.lock();
        if state.failing_navigation {
            return Err(HostError::Rejected(format!("navigation of page {id} refused")));
        }
        let page = state
            .pages
            .get_mut(&id)
            .ok_or_else(|| HostError::NotFound(format!("page {id}")))?;
        page.url = url.to_owned();
        page.injected = false;
        state.actions.push(HostAction::Navigated {
            page: id,
            url: url.to_owned(),
        });
        Ok(())
    }

    async fn open_tab(&self, url: &str) -> Result<PageId, HostError> {
        let mut state = self.lock();
        if state.windows == 0 {
            return Err(HostError::Unavailable("no window to open a tab in".into()));
        }
        let id = insert_page(&mut state, url.to_owned(), BridgeMode::Absent);
        state.active = Some(id);
        state.actions.push(HostAction::OpenedTab {
            page: id,
            url: url.to_owned(),
        });
        Ok(id)
    }

    async fn open_window(&self, url: &str) -> Result<PageId, HostError> {
        let mut state = self.lock();
        state.windows += 1;
        let id = insert_page(&mut state, url.to_owned(), BridgeMode::Absent);
        state.active = Some(id);
        state.actions.push(HostAction::OpenedWindow {
            page: id,
            url: url.to_owned(),
        });
        Ok(id)
    }

    async fn reload(&self, id: PageId) -> Result<(), HostError> {
        let mut state = self.lock();
        if !state.pages.contains_key(&id) {
            return Err(HostError::NotFound(format!("page {id}")));
        }
        state.actions.push(HostAction::Reloaded(id));
        Ok(())
    }
}

#[async_trait]
impl PageMessenger for MemoryHost {
    async fn send(&self, page: PageId, message: ControlMessage) -> Result<BridgeReply, HostError> {
        let mut state = self.lock();
        let listening = state
            .pages
            .get(&page)
            .ok_or_else(|| HostError::NotFound(format!("page {page}")))?
            .bridge_listening();
        if !listening {
            return Err(HostError::Unavailable(NO_RECEIVER.into()));
        }
        state.actions.push(HostAction::Delivered { page, message });
        Ok(BridgeReply::ok())
    }
}

#[async_trait]
impl ScriptInjector for MemoryHost {
    async fn inject(&self, page: PageId, resource: &str) -> Result<(), HostError> {
        let mut state = self.lock();
        let entry = state
            .pages
            .get_mut(&page)
            .ok_or_else(|| HostError::NotFound(format!("page {page}")))?;
        entry.injected = true;
        state.actions.push(HostAction::Injected {
            page,
            resource: resource.to_owned(),
        });
        Ok(())
    }
}

/// Settings kept in memory. Notifies every subscriber, the writer included.
#[derive(Debug)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<SettingsChange>,
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(32);
        Self {
            values: Mutex::new(HashMap::new()),
            changes,
        }
    }

    pub fn with_value(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.lock().insert(key.to_owned(), value);
        store
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, HostError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), HostError> {
        self.lock().insert(key.to_owned(), value.clone());
        let _ = self.changes.send(SettingsChange {
            key: key.to_owned(),
            value,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.changes.subscribe()
    }
}

#[derive(Debug, Default)]
struct PageRecord {
    states: Vec<bool>,
    navigations: Vec<String>,
    scripts: Vec<String>,
}

/// A page as seen by its bridge, recording what the bridge did to it.
#[derive(Debug, Default)]
pub struct MemoryPageChannel {
    record: Mutex<PageRecord>,
}

impl MemoryPageChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched_states(&self) -> Vec<bool> {
        self.lock().states.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn injected_scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PageRecord> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PageChannel for MemoryPageChannel {
    async fn dispatch_state(&self, enabled: bool) -> Result<(), HostError> {
        self.lock().states.push(enabled);
        Ok(())
    }

    async fn navigate_in_place(&self, url: &str) -> Result<(), HostError> {
        self.lock().navigations.push(url.to_owned());
        Ok(())
    }

    async fn inject_page_script(&self, resource: &str) -> Result<(), HostError> {
        self.lock().scripts.push(resource.to_owned());
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PortState {
    connected: bool,
    failing_connects: u32,
    connects: u32,
    sent: Vec<ControlMessage>,
}

/// Panel connection that can be told to drop or refuse connections.
#[derive(Debug, Default)]
pub struct MemoryPanelPort {
    state: Mutex<PortState>,
}

impl MemoryPanelPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` connection attempts fail.
    pub fn refuse_connects(&self, count: u32) {
        self.lock().failing_connects = count;
    }

    pub fn drop_connection(&self) {
        self.lock().connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn connect_count(&self) -> u32 {
        self.lock().connects
    }

    pub fn sent(&self) -> Vec<ControlMessage> {
        self.lock().sent.clone()
    }

    fn lock(&self) -> MutexGuard<'_, PortState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PanelPort for MemoryPanelPort {
    async fn connect(&self) -> Result<(), HostError> {
        let mut state = self.lock();
        state.connects += 1;
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(HostError::Unavailable("controller not running".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn send(&self, message: ControlMessage) -> Result<(), HostError> {
        let mut state = self.lock();
        if !state.connected {
            return Err(HostError::Unavailable("port disconnected".into()));
        }
        state.sent.push(message);
        Ok(())
    }
}
