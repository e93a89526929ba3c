//! Core domain types for extension discovery and staged loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Paths and identifiers
// ---------------------------------------------------------------------------

/// Join two relative path fragments with a single `/`.
pub fn join_path(base: &str, child: &str) -> String {
    let base = base.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}/{child}"),
    }
}

/// Derive the module identifier a script registers itself under:
/// its final path segment without the `.js` extension.
///
/// `plugins/geo/src/ripple/emulator/geo.js` → `geo`
pub fn module_id(path: &str) -> String {
    let file = path.rsplit('/').next().unwrap_or(path);
    file.strip_suffix(".js").unwrap_or(file).to_string()
}

// ---------------------------------------------------------------------------
// HtmlDestination
// ---------------------------------------------------------------------------

/// The host-document container a UI markup asset is inserted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HtmlDestination {
    Panel,
    Overlay,
    Dialog,
}

impl HtmlDestination {
    /// All destinations, in document order.
    pub const ALL: [HtmlDestination; 3] = [Self::Panel, Self::Overlay, Self::Dialog];

    /// Classify a markup asset by its filename suffix.
    ///
    /// Returns `None` for anything other than `panel.html`, `overlay.html`,
    /// or `dialog.html`.
    pub fn classify(path: &str) -> Option<Self> {
        if path.ends_with("panel.html") {
            Some(Self::Panel)
        } else if path.ends_with("overlay.html") {
            Some(Self::Overlay)
        } else if path.ends_with("dialog.html") {
            Some(Self::Dialog)
        } else {
            None
        }
    }

    /// Element id of the container in the host document.
    pub fn container_id(self) -> &'static str {
        match self {
            Self::Panel => "panel-views",
            Self::Overlay => "overlay-views",
            Self::Dialog => "dialog-views",
        }
    }
}

impl std::fmt::Display for HtmlDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Panel => "panel",
            Self::Overlay => "overlay",
            Self::Dialog => "dialog",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Stage reports
// ---------------------------------------------------------------------------

/// What extension discovery found and loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionReport {
    /// Enumerated plugin ids, duplicates preserved.
    pub plugins: Vec<String>,
    /// `<plugin extension dir>/ui` for every plugin that contributes UI.
    pub ui_directories: Vec<String>,
    /// Plain extension scripts, relative to the project root.
    pub scripts: Vec<String>,
    /// Derived module identifiers, parallel to `scripts`.
    pub modules: Vec<String>,
    /// Modules found in the registry and initialized without error.
    pub initialized: usize,
    /// Modules whose resolution or initialization failed.
    pub init_failures: usize,
}

/// One discoverable UI component: a script and/or a like-named asset directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiUnit {
    /// Component name (`geoView` for `geoView.js` / `geoView/`).
    pub name: String,
    /// UI directory the component was found in.
    pub ui_directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_directory: Option<String>,
}

/// A markup asset inserted into the host document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupAsset {
    pub path: String,
    pub destination: HtmlDestination,
}

/// What the UI asset stage discovered and loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiReport {
    /// Derived module identifiers of the injected UI scripts.
    pub modules: Vec<String>,
    /// Components assembled from the level-1 listings.
    pub units: Vec<UiUnit>,
    /// Stylesheets injected.
    pub stylesheets: Vec<String>,
    /// Markup assets inserted into a container.
    pub markup: Vec<MarkupAsset>,
    /// Markup assets that were dropped (unknown destination, fetch or insert failure).
    pub dropped: Vec<String>,
    /// Script slots released by the load timeout rather than a load event.
    pub timed_out: usize,
}

/// What a stage hands on together with the baton.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "report", rename_all = "snake_case")]
pub enum StageOutput {
    #[default]
    Empty,
    Extensions(ExtensionReport),
    UiAssets(UiReport),
}

impl StageOutput {
    /// UI directories discovered by an upstream extension stage, if any.
    pub fn ui_directories(&self) -> &[String] {
        match self {
            Self::Extensions(report) => &report.ui_directories,
            _ => &[],
        }
    }
}

/// Outcome of one stage, in pipeline order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub output: StageOutput,
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageRecord>,
}

impl RunReport {
    /// The extension stage's report, if that stage ran.
    pub fn extensions(&self) -> Option<&ExtensionReport> {
        self.stages.iter().find_map(|r| match &r.output {
            StageOutput::Extensions(report) => Some(report),
            _ => None,
        })
    }

    /// The UI asset stage's report, if that stage ran.
    pub fn ui_assets(&self) -> Option<&UiReport> {
        self.stages.iter().find_map(|r| match &r.output {
            StageOutput::UiAssets(report) => Some(report),
            _ => None,
        })
    }
}
