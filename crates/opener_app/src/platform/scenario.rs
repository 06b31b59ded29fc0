use std::fs;
use std::path::Path;

use anyhow::Context;
use opener_core::PageId;
use opener_engine::BridgeMode;
use serde::{Deserialize, Serialize};

/// Replayed when no scenario file is given.
pub const DEMO_SCENARIO: &str = r#"(
    steps: [
        OpenPage(url: "https://connect.bracu.ac.bd/course/42", bridge: Present, active: true),
        OpenPage(url: "https://connect.bracu.ac.bd/grades", bridge: AfterInjection),
        OpenPage(url: "https://example.com/", bridge: Present),
        Buttons(
            url: "https://connect.bracu.ac.bd/course/42",
            buttons: [(classes: "btn btn-info", text: "Download"), (classes: "btn", text: "Back")],
        ),
        Download(url: "https://connect.bracu.ac.bd/files/week1.pdf"),
        Download(url: "https://connect.bracu.ac.bd/files/week1.pdf"),
        Download(url: "https://connect.bracu.ac.bd/files/data.zip", mime: "application/zip"),
        Toggle(false),
        Wait(ms: 1500),
        Download(url: "https://connect.bracu.ac.bd/files/week2.pdf"),
        OpenRequest(page: 1, url: "blob:https://connect.bracu.ac.bd/5f2c"),
        ClosePage(2),
        Toggle(true),
    ],
)"#;

/// Serializable stand-in for [`BridgeMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BridgeSpec {
    #[default]
    Present,
    Absent,
    AfterInjection,
}

impl From<BridgeSpec> for BridgeMode {
    fn from(spec: BridgeSpec) -> Self {
        match spec {
            BridgeSpec::Present => BridgeMode::Present,
            BridgeSpec::Absent => BridgeMode::Absent,
            BridgeSpec::AfterInjection => BridgeMode::AfterInjection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub classes: String,
    pub text: String,
}

fn pdf_mime() -> String {
    opener_core::PDF_MIME.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    OpenPage {
        url: String,
        #[serde(default)]
        bridge: BridgeSpec,
        #[serde(default)]
        active: bool,
    },
    ClosePage(PageId),
    Download {
        url: String,
        #[serde(default = "pdf_mime")]
        mime: String,
    },
    /// The user flips the panel toggle.
    Toggle(bool),
    Wait { ms: u64 },
    /// A page asks its bridge to open a resource it generated.
    OpenRequest { page: PageId, url: String },
    /// Renders a page's buttons through the rewriter with the current flag.
    Buttons { url: String, buttons: Vec<ButtonSpec> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Scenario {
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_ron_str(text: &str) -> anyhow::Result<Self> {
        ron::from_str(text).context("parsing scenario")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        Self::from_ron_str(&text)
    }

    pub fn demo() -> anyhow::Result<Self> {
        Self::from_ron_str(DEMO_SCENARIO)
    }
}
