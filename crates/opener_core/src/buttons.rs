use crate::{HostPattern, StateChangeDetail};

pub const VIEW_PDF_MARKUP: &str = r#"<i class="fas fa-eye fs-4 me-2"></i>View PDF"#;
pub const DOWNLOAD_MARKUP: &str = r#"<i class="fa fa-cloud-arrow-down fs-4 me-2"></i>Download"#;

const VIEW_PDF_LABEL: &str = "View PDF";
const DOWNLOAD_LABEL: &str = "Download";
const REQUIRED_CLASSES: [&str; 2] = ["btn", "btn-info"];

/// Snapshot of a `<button>` element as the in-page script sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageButton {
    pub classes: Vec<String>,
    pub text: String,
    pub inner_html: String,
    pub onclick: Option<String>,
}

impl PageButton {
    pub fn new(classes: &str, inner_html: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            classes: classes.split_whitespace().map(ToOwned::to_owned).collect(),
            text: text.into(),
            inner_html: inner_html.into(),
            onclick: None,
        }
    }

    pub fn with_onclick(mut self, handler: impl Into<String>) -> Self {
        self.onclick = Some(handler.into());
        self
    }

    fn is_target(&self) -> bool {
        REQUIRED_CLASSES
            .iter()
            .all(|required| self.classes.iter().any(|class| class == required))
    }

    // Replacing the markup must not drop the click handler.
    fn replace_markup(&mut self, markup: &str, label: &str) {
        let onclick = self.onclick.take();
        self.inner_html = markup.to_owned();
        self.text = label.to_owned();
        self.onclick = onclick;
    }
}

/// Keeps the site's download buttons consistent with the feature flag.
///
/// Driven by two callbacks: every DOM mutation and every state-change event.
#[derive(Debug, Clone)]
pub struct ButtonRewriter {
    enabled: bool,
}

impl ButtonRewriter {
    /// Returns a rewriter only for pages on the allow-listed host.
    pub fn for_page(page_url: &str, pattern: &HostPattern) -> Option<Self> {
        pattern.matches(page_url).then_some(Self { enabled: true })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn on_state_change(&mut self, detail: StateChangeDetail, buttons: &mut [PageButton]) -> usize {
        self.enabled = detail.enabled;
        self.apply(buttons)
    }

    pub fn on_mutation(&self, buttons: &mut [PageButton]) -> usize {
        self.apply(buttons)
    }

    /// Rewrites buttons for the current state and returns how many changed.
    pub fn apply(&self, buttons: &mut [PageButton]) -> usize {
        let mut changed = 0;
        for button in buttons.iter_mut().filter(|button| button.is_target()) {
            if self.enabled {
                let label = button.text.trim().to_lowercase();
                if label.contains("download") && !button.inner_html.contains(VIEW_PDF_LABEL) {
                    button.replace_markup(VIEW_PDF_MARKUP, VIEW_PDF_LABEL);
                    changed += 1;
                }
            } else if button.inner_html.contains(VIEW_PDF_LABEL)
                || button.inner_html.contains("fa-eye")
            {
                button.replace_markup(DOWNLOAD_MARKUP, DOWNLOAD_LABEL);
                changed += 1;
            }
        }
        changed
    }
}
