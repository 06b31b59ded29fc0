use std::sync::{mpsc, Arc};
use std::thread;

use opener_core::{
    BridgeReply, BridgeRequest, ControlMessage, DownloadEvent, DownloadId, PageId,
};
use opener_logging::{opener_debug, opener_warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;

use crate::synchronizer::{RetryOutcome, SyncPass, SyncReport};
use crate::{BackgroundController, HostServices, InterceptOutcome, OpenerSettings};

enum ControllerCommand {
    DownloadCreated(DownloadEvent),
    PortMessage(ControlMessage),
    RuntimeMessage {
        request: BridgeRequest,
        reply: oneshot::Sender<BridgeReply>,
    },
    PageClosed(PageId),
}

/// Everything the controller reports back to whoever drives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerEvent {
    Started { enabled: bool },
    Intercepted {
        download: DownloadId,
        outcome: InterceptOutcome,
    },
    Synchronized(SyncReport),
    RetriesSettled(Vec<RetryOutcome>),
}

/// Runs a [`BackgroundController`] on its own tokio runtime.
///
/// Host events go in through the command channel; the controller also
/// follows the settings store's change notifications on its own.
pub struct ControllerHandle {
    cmd_tx: mpsc::Sender<ControllerCommand>,
    event_rx: mpsc::Receiver<ControllerEvent>,
}

impl ControllerHandle {
    pub fn spawn(host: HostServices, settings: OpenerSettings) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .build()?;
        let controller = Arc::new(BackgroundController::new(host.clone(), &settings));

        thread::spawn(move || {
            // Subscribe before starting so the default-flag write is observed.
            let mut changes = host.settings.subscribe();
            let enabled = runtime.block_on(controller.start());
            let _ = event_tx.send(ControllerEvent::Started { enabled });

            let watcher = controller.clone();
            let watcher_tx = event_tx.clone();
            runtime.spawn(async move {
                loop {
                    match changes.recv().await {
                        Ok(change) => {
                            if let Some(pass) = watcher.on_settings_changed(change).await {
                                report_pass(pass, &watcher_tx).await;
                            }
                        }
                        Err(RecvError::Lagged(missed)) => {
                            opener_warn!("Missed {} settings notification(s)", missed);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            while let Ok(command) = cmd_rx.recv() {
                let controller = controller.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(controller.as_ref(), command, event_tx).await;
                });
            }
            opener_debug!("Controller command channel closed");
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn download_created(&self, event: DownloadEvent) {
        let _ = self.cmd_tx.send(ControllerCommand::DownloadCreated(event));
    }

    pub fn port_message(&self, message: ControlMessage) {
        let _ = self.cmd_tx.send(ControllerCommand::PortMessage(message));
    }

    pub fn page_closed(&self, page: PageId) {
        let _ = self.cmd_tx.send(ControllerCommand::PageClosed(page));
    }

    /// Sends a one-shot request; the reply arrives on the returned receiver.
    pub fn runtime_message(&self, request: BridgeRequest) -> oneshot::Receiver<BridgeReply> {
        let (reply, rx) = oneshot::channel();
        let _ = self
            .cmd_tx
            .send(ControllerCommand::RuntimeMessage { request, reply });
        rx
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<ControllerEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn handle_command(
    controller: &BackgroundController,
    command: ControllerCommand,
    event_tx: mpsc::Sender<ControllerEvent>,
) {
    match command {
        ControllerCommand::DownloadCreated(event) => {
            let download = event.id;
            let outcome = controller.on_download_created(event).await;
            let _ = event_tx.send(ControllerEvent::Intercepted { download, outcome });
        }
        ControllerCommand::PortMessage(message) => {
            if let Some(pass) = controller.on_port_message(message).await {
                report_pass(pass, &event_tx).await;
            }
        }
        ControllerCommand::RuntimeMessage { request, reply } => {
            let answer = controller.on_runtime_message(request).await;
            let _ = reply.send(answer);
        }
        ControllerCommand::PageClosed(page) => controller.on_page_closed(page),
    }
}

async fn report_pass(pass: SyncPass, event_tx: &mpsc::Sender<ControllerEvent>) {
    let _ = event_tx.send(ControllerEvent::Synchronized(pass.report.clone()));
    if pass.pending_retries() > 0 {
        let (_, outcomes) = pass.settle().await;
        let _ = event_tx.send(ControllerEvent::RetriesSettled(outcomes));
    }
}
