//! Conferencing platforms and their on-page sharing indicators.

use serde::Serialize;

/// The conferencing platform a surface belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Google Meet.
    GoogleMeet,

    /// Zoom web client.
    Zoom,

    /// Slack huddles.
    Slack,

    /// Any other surface.
    #[default]
    Other,
}

impl Platform {
    /// Derive the platform from a hostname.
    #[must_use]
    pub fn from_host(hostname: &str) -> Self {
        let hostname = hostname.to_ascii_lowercase();
        if hostname.contains("meet.google.com") {
            Self::GoogleMeet
        } else if hostname.contains("zoom.us") {
            Self::Zoom
        } else if hostname.contains("slack.com") {
            Self::Slack
        } else {
            Self::Other
        }
    }

    /// Selectors whose presence means this platform is sharing the screen.
    ///
    /// Unknown platforms have no specific indicators.
    #[must_use]
    pub fn indicators(self) -> &'static [&'static str] {
        match self {
            Self::GoogleMeet => &["[data-is-presenting=\"true\"]"],
            Self::Zoom => &[".sharing-indicator-container", "[aria-label*=\"Stop Share\"]"],
            Self::Slack => &[
                "[data-qa=\"huddle_screenshare_controls\"]",
                "[aria-label*=\"stop sharing\" i]",
                ".p-huddle_screenshare_container",
            ],
            Self::Other => &[],
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GoogleMeet => write!(f, "meet"),
            Self::Zoom => write!(f, "zoom"),
            Self::Slack => write!(f, "slack"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Indicators checked on every surface regardless of platform.
pub const GENERIC_INDICATORS: &[&str] = &[
    "[data-is-presenting=\"true\"]",
    "[aria-label*=\"presenting\"]",
    ".sharing-indicator",
    ".sharing-indicator-container",
    "[aria-label*=\"Stop Share\"]",
    "[aria-label*=\"stop sharing\" i]",
    "[data-qa=\"huddle_screenshare_controls\"]",
    ".p-huddle_screenshare_container",
];
