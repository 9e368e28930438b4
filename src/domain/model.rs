use crate::utils::{default_filename, sanitize_filename};

/// Video-hosting service a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Facebook,
    Unknown,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::YouTube => "YouTube",
            Platform::TikTok => "TikTok",
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
            Platform::Unknown => "Unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Platform::Unknown)
    }
}

/// Result of classifying a source URL. Derived purely from the URL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub platform: Platform,
    pub video_id: Option<String>,
}

/// How to treat URLs that match a platform but not a video-shaped path,
/// and URLs matching no platform at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassificationPolicy {
    /// Reject unknown platforms and non-video paths up front.
    Strict,
    /// Forward everything to the backend and let it decide.
    #[default]
    Permissive,
}

/// Normalized outcome of a backend download attempt. The raw response shape
/// varies across backend versions; this is the strict type the rest of the
/// app consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub media_url: Option<String>,
    pub redirect: bool,
    pub platform: Option<String>,
}

/// What to actually do with a successful outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadAction {
    /// Stream the media to a file on disk.
    SaveFile {
        url: String,
        suggested_filename: String,
    },
    /// Open an external download page in the browser.
    OpenPage { url: String },
    /// Success, but the backend gave us nothing actionable.
    Nothing,
}

impl DownloadAction {
    pub fn from_outcome(outcome: &DownloadOutcome) -> Self {
        if outcome.redirect {
            if let Some(url) = &outcome.media_url {
                return DownloadAction::OpenPage { url: url.clone() };
            }
        }

        match &outcome.media_url {
            Some(url) => DownloadAction::SaveFile {
                url: url.clone(),
                suggested_filename: suggested_filename(outcome),
            },
            None => DownloadAction::Nothing,
        }
    }
}

fn suggested_filename(outcome: &DownloadOutcome) -> String {
    if let Some(name) = &outcome.filename {
        let name = sanitize_filename(name);
        if !name.is_empty() {
            return name;
        }
    }
    if let Some(title) = &outcome.title {
        let stem = sanitize_filename(title);
        let stem = stem.trim_matches(|c| c == '.' || c == ' ');
        if !stem.is_empty() {
            return format!("{}.mp4", stem);
        }
    }
    default_filename()
}

/// Phase of the single download session the widget drives. At most one
/// request is in flight; any phase other than `Idle` refuses new submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPhase {
    Idle,
    Validating,
    Requesting,
    Saving,
    Success,
    Failed,
}
