//! PDF opener engine: host seams, the background controller, the page bridge
//! and the control panel runner.
mod bridge;
mod controller;
mod engine;
mod error;
mod host;
mod interceptor;
mod memory;
mod navigate;
mod panel;
mod persist;
mod settings;
mod synchronizer;

pub use bridge::{OpenRoute, PageBridge};
pub use controller::BackgroundController;
pub use engine::{ControllerEvent, ControllerHandle};
pub use error::{ConfigError, HostError};
pub use host::{
    ControllerLink, DownloadHost, HostServices, PageChannel, PageInfo, PageMessenger, PanelPort,
    ScriptInjector, SettingsChange, SettingsStore, TabHost,
};
pub use interceptor::{DownloadInterceptor, InterceptOutcome};
pub use memory::{
    BridgeMode, HostAction, MemoryHost, MemoryPageChannel, MemoryPanelPort, MemorySettingsStore,
};
pub use navigate::{open_resource, OpenedIn};
pub use panel::ControlPanel;
pub use persist::{ensure_settings_dir, FileSettingsStore, PersistError};
pub use settings::OpenerSettings;
pub use synchronizer::{
    PageOutcome, RetryOutcome, SyncPass, SyncReport, TabStateSynchronizer,
};
