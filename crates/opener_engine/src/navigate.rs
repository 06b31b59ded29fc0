use opener_core::{choose_destination, Destination, PageId};
use opener_logging::{opener_debug, opener_warn};

use crate::{HostError, TabHost};

/// Where a resource actually ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenedIn {
    ActivePage(PageId),
    NewTab(PageId),
    NewWindow(PageId),
}

/// Opens `url` in the active page, a new tab or a new window.
///
/// A failed lookup of the active page, or a failed navigation of it, falls
/// back to a new tab.
pub async fn open_resource(tabs: &dyn TabHost, url: &str) -> Result<OpenedIn, HostError> {
    let has_window = tabs.has_window().await.unwrap_or_else(|err| {
        opener_warn!("Window lookup failed, assuming one exists: {}", err);
        true
    });
    let active = if has_window {
        match tabs.active_page().await {
            Ok(page) => page.map(|page| page.id),
            Err(err) => {
                opener_warn!("Active page lookup failed: {}", err);
                None
            }
        }
    } else {
        None
    };

    match choose_destination(active, has_window) {
        Destination::ReplaceActive(page_id) => match tabs.navigate(page_id, url).await {
            Ok(()) => {
                opener_debug!("Navigated page {} to {}", page_id, url);
                Ok(OpenedIn::ActivePage(page_id))
            }
            Err(err) => {
                opener_warn!(
                    "Navigating page {} failed ({}), opening a new tab",
                    page_id,
                    err
                );
                tabs.open_tab(url).await.map(OpenedIn::NewTab)
            }
        },
        Destination::NewTab => tabs.open_tab(url).await.map(OpenedIn::NewTab),
        Destination::NewWindow => tabs.open_window(url).await.map(OpenedIn::NewWindow),
    }
}
