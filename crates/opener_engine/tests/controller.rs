use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use opener_core::{
    BridgeReply, BridgeRequest, ControlMessage, DownloadEvent, PageId, Screening, FLAG_KEY,
};
use opener_engine::{
    BackgroundController, BridgeMode, ControllerEvent, ControllerHandle, HostAction, HostError,
    HostServices, InterceptOutcome, MemoryHost, MemorySettingsStore, OpenedIn, OpenerSettings,
    PageMessenger, PageOutcome, SettingsChange, SettingsStore,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const SITE: &str = "https://connect.bracu.ac.bd/course/7";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(opener_logging::initialize_for_tests);
}

fn services(host: &Arc<MemoryHost>, store: &Arc<MemorySettingsStore>) -> HostServices {
    HostServices {
        settings: store.clone(),
        downloads: host.clone(),
        tabs: host.clone(),
        messenger: host.clone(),
        scripts: host.clone(),
    }
}

fn controller(host: &Arc<MemoryHost>, store: &Arc<MemorySettingsStore>) -> BackgroundController {
    BackgroundController::new(services(host, store), &OpenerSettings::default())
}

fn flag_change(enabled: bool) -> SettingsChange {
    SettingsChange {
        key: FLAG_KEY.to_string(),
        value: json!(enabled),
    }
}

#[tokio::test]
async fn start_persists_default_and_attaches_listener() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let store = Arc::new(MemorySettingsStore::new());
    let controller = controller(&host, &store);

    assert!(controller.start().await);

    assert_eq!(store.value(FLAG_KEY), Some(json!(true)));
    assert!(host.is_listening());
    assert_eq!(controller.synchronizer().previous(), Some(true));
}

#[tokio::test]
async fn start_respects_stored_false() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(false)));
    let controller = controller(&host, &store);

    assert!(!controller.start().await);

    assert_eq!(store.value(FLAG_KEY), Some(json!(false)));
    assert!(!host.is_listening());
    assert!(host.actions().is_empty());
}

#[tokio::test]
async fn settings_change_converges_mirrors_and_synchronizes() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let page = host.add_page(SITE, BridgeMode::Present);
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(true)));
    let controller = controller(&host, &store);
    controller.start().await;

    let pass = controller
        .on_settings_changed(flag_change(false))
        .await
        .expect("flag change runs a pass");
    let (report, _) = pass.settle().await;

    assert!(!controller.enabled());
    assert!(!controller.synchronizer().mirror());
    assert!(!host.is_listening());
    assert_eq!(report.outcomes, vec![(page, PageOutcome::Delivered { reloaded: true })]);

    host.start_download(1);
    let outcome = controller
        .on_download_created(DownloadEvent::new(1, "https://x/a.pdf", "application/pdf"))
        .await;
    assert_eq!(outcome, InterceptOutcome::Ignored(Screening::Disabled));
}

#[tokio::test]
async fn unrelated_or_malformed_settings_are_ignored() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(true)));
    let controller = controller(&host, &store);
    controller.start().await;

    let unrelated = SettingsChange {
        key: "theme".to_string(),
        value: json!("dark"),
    };
    let malformed = SettingsChange {
        key: FLAG_KEY.to_string(),
        value: json!("off"),
    };

    assert!(controller.on_settings_changed(unrelated).await.is_none());
    assert!(controller.on_settings_changed(malformed).await.is_none());
    assert!(controller.enabled());
}

#[tokio::test]
async fn panel_init_refreshes_mirrors_without_a_pass() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    host.add_page(SITE, BridgeMode::Present);
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(true)));
    let controller = controller(&host, &store);
    controller.start().await;
    host.take_actions();

    let pass = controller
        .on_port_message(ControlMessage::InitState { enabled: false })
        .await;

    assert!(pass.is_none());
    assert!(!controller.enabled());
    assert_eq!(host.actions(), vec![HostAction::ListenerDetached]);
}

#[tokio::test]
async fn panel_update_and_settings_notification_reload_once() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let page = host.add_page(SITE, BridgeMode::Present);
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(true)));
    let controller = controller(&host, &store);
    controller.start().await;

    // One toggle arrives twice: as a port push and as a settings notification.
    let pushed = controller
        .on_port_message(ControlMessage::UpdateState { enabled: false })
        .await
        .expect("update runs a pass");
    let notified = controller
        .on_settings_changed(flag_change(false))
        .await
        .expect("flag change runs a pass");

    assert_eq!(pushed.report.reloaded(), vec![page]);
    assert!(notified.report.reloaded().is_empty());
}

#[tokio::test]
async fn open_request_uses_the_active_page() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let page = host.add_page(SITE, BridgeMode::Present);
    host.set_active(Some(page));
    let store = Arc::new(MemorySettingsStore::new());
    let controller = controller(&host, &store);

    let reply = controller
        .on_runtime_message(BridgeRequest::OpenPdfInNewTab {
            url: "blob:https://connect.bracu.ac.bd/1".to_string(),
        })
        .await;

    assert_eq!(reply, BridgeReply::ok());
    assert_eq!(
        host.page_url(page).as_deref(),
        Some("blob:https://connect.bracu.ac.bd/1")
    );
    assert_eq!(
        controller.on_runtime_message(BridgeRequest::WakeUp).await,
        BridgeReply::ok()
    );
}

#[tokio::test(start_paused = true)]
async fn closed_page_loses_its_retry_record() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let page = host.add_page(SITE, BridgeMode::Absent);
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(true)));
    let controller = controller(&host, &store);
    controller.start().await;

    controller
        .on_settings_changed(flag_change(false))
        .await
        .expect("flag change runs a pass")
        .settle()
        .await;
    assert_eq!(controller.synchronizer().attempts(page), 2);

    host.close_page(page);
    controller.on_page_closed(page);
    assert_eq!(controller.synchronizer().attempts(page), 0);
}

#[test]
fn handle_runs_the_controller_in_the_background() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let page = host.add_page(SITE, BridgeMode::Present);
    host.set_active(Some(page));
    host.start_download(9);
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(true)));
    let handle = ControllerHandle::spawn(services(&host, &store), OpenerSettings::default())
        .expect("runtime");

    assert_eq!(
        handle.recv_timeout(Duration::from_secs(5)),
        Some(ControllerEvent::Started { enabled: true })
    );

    handle.download_created(DownloadEvent::new(9, "https://x/a.pdf", "application/pdf"));
    let event = handle.recv_timeout(Duration::from_secs(5));

    assert_eq!(
        event,
        Some(ControllerEvent::Intercepted {
            download: 9,
            outcome: InterceptOutcome::Opened(OpenedIn::ActivePage(page)),
        })
    );

    let reply = handle
        .runtime_message(BridgeRequest::WakeUp)
        .blocking_recv()
        .expect("reply");
    assert!(reply.success);
}

/// Delivers to one page only after a delay.
struct SlowMessenger {
    inner: Arc<MemoryHost>,
    slow: PageId,
    delay: Duration,
}

#[async_trait]
impl PageMessenger for SlowMessenger {
    async fn send(&self, page: PageId, message: ControlMessage) -> Result<BridgeReply, HostError> {
        if page == self.slow {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.send(page, message).await
    }
}

#[test]
fn handle_reloads_each_page_once_when_port_and_store_both_report_a_toggle() {
    init_logging();
    let host = Arc::new(MemoryHost::new());
    let fast = host.add_page(SITE, BridgeMode::Present);
    let slow = host.add_page("https://connect.bracu.ac.bd/grades", BridgeMode::Present);
    let store = Arc::new(MemorySettingsStore::with_value(FLAG_KEY, json!(true)));
    let services = HostServices {
        messenger: Arc::new(SlowMessenger {
            inner: host.clone(),
            slow,
            delay: Duration::from_millis(300),
        }),
        ..services(&host, &store)
    };
    let handle = ControllerHandle::spawn(services, OpenerSettings::default()).expect("runtime");
    assert_eq!(
        handle.recv_timeout(Duration::from_secs(5)),
        Some(ControllerEvent::Started { enabled: true })
    );

    // The panel pushes the toggle and writes the store; both reach the controller.
    handle.port_message(ControlMessage::UpdateState { enabled: false });
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(store.set(FLAG_KEY, json!(false)))
        .unwrap();

    let mut passes = 0;
    while passes < 2 {
        match handle.recv_timeout(Duration::from_secs(5)) {
            Some(ControllerEvent::Synchronized(report)) => {
                assert!(!report.enabled);
                passes += 1;
            }
            Some(_) => {}
            None => panic!("only {passes} synchronization pass(es) reported"),
        }
    }

    let actions = host.actions();
    let reloads_of = |page| {
        actions
            .iter()
            .filter(|action| **action == HostAction::Reloaded(page))
            .count()
    };
    assert_eq!(reloads_of(fast), 1);
    assert_eq!(reloads_of(slow), 1);
}
