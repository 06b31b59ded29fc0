use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use opener_core::{
    ButtonRewriter, ControlMessage, DownloadEvent, DownloadId, OpenPdfDetail, PageButton, PageId,
    StateChangeDetail,
};
use opener_engine::{
    BackgroundController, ControlPanel, HostAction, HostError, HostServices, MemoryHost,
    MemoryPageChannel, OpenerSettings, PageBridge, PanelPort, SettingsChange, SettingsStore,
    SyncPass,
};
use opener_logging::{opener_info, opener_warn};
use tokio::sync::broadcast;

use super::scenario::{ButtonSpec, Scenario, Step};

/// Panel port wired straight into the controller.
struct LoopbackPort {
    controller: Arc<BackgroundController>,
    connected: AtomicBool,
    passes: Arc<Mutex<Vec<SyncPass>>>,
}

#[async_trait]
impl PanelPort for LoopbackPort {
    async fn connect(&self) -> Result<(), HostError> {
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, message: ControlMessage) -> Result<(), HostError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("port disconnected".into()));
        }
        if let Some(pass) = self.controller.on_port_message(message).await {
            self.passes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(pass);
        }
        Ok(())
    }
}

/// What a replay produced: one transcript line per notable event plus every
/// recorded host action.
#[derive(Debug, Default)]
pub struct Report {
    pub transcript: Vec<String>,
    pub actions: Vec<HostAction>,
}

/// Replays scenario steps against an in-memory host.
pub struct Simulator {
    settings: OpenerSettings,
    host: Arc<MemoryHost>,
    changes: broadcast::Receiver<SettingsChange>,
    controller: Arc<BackgroundController>,
    panel: ControlPanel,
    passes: Arc<Mutex<Vec<SyncPass>>>,
    bridges: HashMap<PageId, PageBridge>,
    next_download: DownloadId,
    transcript: Vec<String>,
}

impl Simulator {
    /// Starts the controller and opens the panel against `store`.
    pub async fn start(settings: OpenerSettings, store: Arc<dyn SettingsStore>) -> Self {
        let host = Arc::new(MemoryHost::new());
        let services = HostServices {
            settings: store.clone(),
            downloads: host.clone(),
            tabs: host.clone(),
            messenger: host.clone(),
            scripts: host.clone(),
        };
        let controller = Arc::new(BackgroundController::new(services, &settings));
        let changes = store.subscribe();
        let passes = Arc::new(Mutex::new(Vec::new()));
        let port = Arc::new(LoopbackPort {
            controller: controller.clone(),
            connected: AtomicBool::new(false),
            passes: passes.clone(),
        });
        let panel = ControlPanel::new(store.clone(), port, settings.reconnect_backoff());

        let mut sim = Self {
            settings,
            host,
            changes,
            controller,
            panel,
            passes,
            bridges: HashMap::new(),
            next_download: 1,
            transcript: Vec::new(),
        };
        let enabled = sim.controller.start().await;
        sim.note(format!("controller started, enabled={enabled}"));
        sim.panel.open().await;
        sim.forward_settings_changes().await;
        sim
    }

    pub async fn run(mut self, scenario: &Scenario) -> Report {
        for step in &scenario.steps {
            self.step(step).await;
        }
        self.settle_passes().await;
        Report {
            transcript: self.transcript,
            actions: self.host.take_actions(),
        }
    }

    async fn step(&mut self, step: &Step) {
        match step {
            Step::OpenPage {
                url,
                bridge,
                active,
            } => {
                let page = self.host.add_page(url.as_str(), (*bridge).into());
                if *active {
                    self.host.set_active(Some(page));
                }
                self.note(format!("page {page} opened at {url}"));
            }
            Step::ClosePage(page) => {
                if self.host.close_page(*page) {
                    self.controller.on_page_closed(*page);
                    self.bridges.remove(page);
                    self.note(format!("page {page} closed"));
                } else {
                    opener_warn!("Scenario closes unknown page {}", page);
                }
            }
            Step::Download { url, mime } => {
                let id = self.next_download;
                self.next_download += 1;
                self.host.start_download(id);
                let outcome = self
                    .controller
                    .on_download_created(DownloadEvent::new(id, url.as_str(), mime.as_str()))
                    .await;
                self.note(format!("download {id} ({url}): {outcome:?}"));
            }
            Step::Toggle(enabled) => {
                self.panel.toggle(*enabled).await;
                self.note(format!("panel toggled to {enabled}"));
                self.forward_settings_changes().await;
            }
            Step::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                self.settle_passes().await;
            }
            Step::OpenRequest { page, url } => self.open_request(*page, url).await,
            Step::Buttons { url, buttons } => self.render_buttons(url, buttons),
        }
    }

    async fn open_request(&mut self, page: PageId, url: &str) {
        if !self.bridges.contains_key(&page) {
            let bridge = PageBridge::new(
                Arc::new(MemoryPageChannel::new()),
                self.controller.clone(),
                self.settings.page_script.as_str(),
            );
            if let Err(err) = bridge.attach().await {
                opener_warn!("Attaching bridge to page {} failed: {}", page, err);
            }
            self.bridges.insert(page, bridge);
        }
        let Some(bridge) = self.bridges.get(&page) else {
            return;
        };
        let detail = OpenPdfDetail {
            resource_url: url.to_owned(),
        };
        let line = match bridge.on_open_request(detail).await {
            Ok(route) => format!("page {page} open request for {url}: {route:?}"),
            Err(err) => format!("page {page} open request for {url} failed: {err}"),
        };
        self.note(line);
    }

    fn render_buttons(&mut self, url: &str, specs: &[ButtonSpec]) {
        let Some(mut rewriter) = ButtonRewriter::for_page(url, &self.settings.host_pattern())
        else {
            self.note(format!("buttons on {url} left alone"));
            return;
        };
        let mut buttons: Vec<PageButton> = specs
            .iter()
            .map(|spec| PageButton::new(&spec.classes, spec.text.as_str(), spec.text.as_str()))
            .collect();
        let detail = StateChangeDetail {
            enabled: self.controller.enabled(),
        };
        let changed = rewriter.on_state_change(detail, &mut buttons);
        let labels: Vec<&str> = buttons.iter().map(|button| button.text.as_str()).collect();
        self.note(format!("buttons on {url}: {changed} rewritten {labels:?}"));
    }

    // Stands in for the host's change notification reaching the controller.
    async fn forward_settings_changes(&mut self) {
        while let Ok(change) = self.changes.try_recv() {
            if let Some(pass) = self.controller.on_settings_changed(change).await {
                self.push_pass(pass);
            }
        }
    }

    fn push_pass(&self, pass: SyncPass) {
        self.passes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(pass);
    }

    async fn settle_passes(&mut self) {
        let passes = std::mem::take(
            &mut *self
                .passes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for pass in passes {
            let (report, retries) = pass.settle().await;
            self.note(format!(
                "sync enabled={} outcomes={:?} reloaded={:?} unmatched={:?} loading={:?} exhausted={:?}",
                report.enabled,
                report.outcomes,
                report.reloaded(),
                report.skipped_unmatched,
                report.skipped_loading,
                report.skipped_exhausted
            ));
            for retry in retries {
                self.note(format!("retry {retry:?}"));
            }
        }
    }

    fn note(&mut self, line: String) {
        opener_info!("{}", line);
        self.transcript.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opener_core::FLAG_KEY;
    use opener_engine::{MemorySettingsStore, OpenedIn};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::platform::scenario::BridgeSpec;

    const SITE: &str = "https://connect.bracu.ac.bd/course/1";

    async fn simulator() -> Simulator {
        simulator_with(Arc::new(MemorySettingsStore::new())).await
    }

    async fn simulator_with(store: Arc<MemorySettingsStore>) -> Simulator {
        Simulator::start(OpenerSettings::default(), store).await
    }

    fn open(url: &str, active: bool) -> Step {
        Step::OpenPage {
            url: url.to_string(),
            bridge: BridgeSpec::Present,
            active,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn download_is_opened_in_the_active_page() {
        let sim = simulator().await;
        let scenario = Scenario {
            steps: vec![
                open(SITE, true),
                Step::Download {
                    url: "https://connect.bracu.ac.bd/a.pdf".to_string(),
                    mime: "application/pdf".to_string(),
                },
            ],
        };

        let report = sim.run(&scenario).await;

        assert!(report.actions.contains(&HostAction::Cancelled(1)));
        assert!(report.actions.contains(&HostAction::Navigated {
            page: 1,
            url: "https://connect.bracu.ac.bd/a.pdf".to_string(),
        }));
        let expected = format!("{:?}", OpenedIn::ActivePage(1));
        assert!(report.transcript.iter().any(|line| line.contains(&expected)));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_persists_and_reloads_matching_pages_once() {
        let store = Arc::new(MemorySettingsStore::new());
        let sim = simulator_with(store.clone()).await;
        let scenario = Scenario {
            steps: vec![
                open(SITE, false),
                open("https://example.com/", false),
                Step::Toggle(false),
            ],
        };

        let report = sim.run(&scenario).await;

        assert_eq!(store.value(FLAG_KEY), Some(json!(false)));
        let reloads: Vec<_> = report
            .actions
            .iter()
            .filter(|action| matches!(action, HostAction::Reloaded(_)))
            .collect();
        assert_eq!(reloads, vec![&HostAction::Reloaded(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn buttons_follow_the_flag() {
        let sim = simulator().await;
        let scenario = Scenario {
            steps: vec![
                Step::Buttons {
                    url: SITE.to_string(),
                    buttons: vec![ButtonSpec {
                        classes: "btn btn-info".to_string(),
                        text: "Download".to_string(),
                    }],
                },
                Step::Buttons {
                    url: "https://example.com/".to_string(),
                    buttons: Vec::new(),
                },
            ],
        };

        let report = sim.run(&scenario).await;

        assert!(report.transcript.iter().any(|line| line.contains("1 rewritten")));
        assert!(report
            .transcript
            .iter()
            .any(|line| line == "buttons on https://example.com/ left alone"));
    }

    #[tokio::test(start_paused = true)]
    async fn open_request_is_served_by_the_controller() {
        let sim = simulator().await;
        let scenario = Scenario {
            steps: vec![
                open(SITE, true),
                Step::OpenRequest {
                    page: 1,
                    url: "blob:https://connect.bracu.ac.bd/x".to_string(),
                },
            ],
        };

        let report = sim.run(&scenario).await;

        assert!(report.actions.contains(&HostAction::Navigated {
            page: 1,
            url: "blob:https://connect.bracu.ac.bd/x".to_string(),
        }));
        assert!(report.transcript.iter().any(|line| line.ends_with("Controller")));
    }

    #[tokio::test(start_paused = true)]
    async fn demo_scenario_replays() {
        let sim = simulator().await;
        let report = sim.run(&Scenario::demo().unwrap()).await;

        let cancelled = report
            .actions
            .iter()
            .filter(|action| matches!(action, HostAction::Cancelled(_)))
            .count();
        // The repeated URL is deduplicated; the zip and the disabled-time PDF pass.
        assert_eq!(cancelled, 1);
    }
}
