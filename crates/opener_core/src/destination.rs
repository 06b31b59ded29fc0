pub type PageId = u32;

/// Where an intercepted resource is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Navigate the active page of the current window, replacing its content.
    ReplaceActive(PageId),
    NewTab,
    NewWindow,
}

/// Picks the destination for a resource.
///
/// With no window at all a new window is required; otherwise the active page
/// is reused when there is one.
pub fn choose_destination(active_page: Option<PageId>, has_window: bool) -> Destination {
    if !has_window {
        return Destination::NewWindow;
    }
    match active_page {
        Some(page_id) => Destination::ReplaceActive(page_id),
        None => Destination::NewTab,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_prefers_active_page_then_tab_then_window() {
        assert_eq!(choose_destination(Some(4), true), Destination::ReplaceActive(4));
        assert_eq!(choose_destination(None, true), Destination::NewTab);
        assert_eq!(choose_destination(None, false), Destination::NewWindow);
        assert_eq!(choose_destination(Some(4), false), Destination::NewWindow);
    }
}
