use std::sync::Arc;

use opener_core::{BridgeReply, BridgeRequest, ControlMessage, OpenPdfDetail};
use opener_logging::{opener_debug, opener_info, opener_warn, ExecutionContext};

use crate::{ControllerLink, HostError, PageChannel};

const CTX: ExecutionContext = ExecutionContext::Bridge;

/// How a page's open request was finally served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenRoute {
    /// The controller opened the resource.
    Controller,
    /// The controller could not; the page navigated itself.
    InPlace { reason: String },
}

/// Content-script relay between one page and the controller.
pub struct PageBridge {
    page: Arc<dyn PageChannel>,
    controller: Arc<dyn ControllerLink>,
    page_script: String,
}

impl PageBridge {
    pub fn new(
        page: Arc<dyn PageChannel>,
        controller: Arc<dyn ControllerLink>,
        page_script: impl Into<String>,
    ) -> Self {
        Self {
            page,
            controller,
            page_script: page_script.into(),
        }
    }

    /// Injects the page script; called once when the bridge loads.
    pub async fn attach(&self) -> Result<(), HostError> {
        self.page.inject_page_script(&self.page_script).await?;
        opener_info!("[{}] Injected {} into the page", CTX.tag(), self.page_script);
        Ok(())
    }

    /// Handles a controller message and produces the reply sent back.
    pub async fn on_controller_message(&self, message: ControlMessage) -> BridgeReply {
        let enabled = match message {
            ControlMessage::UpdateState { enabled } => enabled,
            ControlMessage::InitState { .. } => {
                return BridgeReply::failed("unsupported action initState");
            }
        };
        opener_debug!("[{}] Received state update: {}", CTX.tag(), enabled);
        match self.page.dispatch_state(enabled).await {
            Ok(()) => BridgeReply::ok(),
            Err(err) => {
                opener_warn!("[{}] Dispatching state into page failed: {}", CTX.tag(), err);
                BridgeReply::failed(err.to_string())
            }
        }
    }

    /// Parses a raw JSON controller message; unparseable payloads are refused.
    pub async fn on_raw_message(&self, raw: &str) -> BridgeReply {
        match ControlMessage::from_json(raw) {
            Ok(message) => self.on_controller_message(message).await,
            Err(err) => {
                opener_debug!("[{}] Ignoring malformed message: {}", CTX.tag(), err);
                BridgeReply::failed(format!("malformed message: {err}"))
            }
        }
    }

    /// Asks the controller to open the resource, navigating the page itself
    /// when that fails.
    pub async fn on_open_request(&self, detail: OpenPdfDetail) -> Result<OpenRoute, HostError> {
        let url = detail.resource_url;
        opener_debug!("[{}] Received open request for {}", CTX.tag(), url);
        let request = BridgeRequest::OpenPdfInNewTab { url: url.clone() };
        let reason = match self.controller.request(request).await {
            Ok(reply) if reply.success => return Ok(OpenRoute::Controller),
            Ok(reply) => reply
                .error
                .unwrap_or_else(|| "controller refused request".to_string()),
            Err(err) => err.to_string(),
        };
        opener_warn!(
            "[{}] Open request failed ({}), navigating in place to {}",
            CTX.tag(),
            reason,
            url
        );
        self.page.navigate_in_place(&url).await?;
        Ok(OpenRoute::InPlace { reason })
    }
}
