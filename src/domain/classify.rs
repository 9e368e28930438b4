use regex::Regex;
use url::Url;

use super::{AppError, Classification, ClassificationPolicy, Platform};

/// Classify a URL by its hosting platform and, where the path shape allows,
/// extract the platform-specific video ID. Never fails; URLs matching no
/// known platform come back as `Unknown`.
pub fn classify(url: &Url) -> Classification {
    // Host matching is case-insensitive, but video IDs are case-sensitive,
    // so extraction runs on the original text.
    let text = url.as_str();
    let lower = text.to_lowercase();

    if lower.contains("youtube.com") || lower.contains("youtu.be") {
        return Classification {
            platform: Platform::YouTube,
            video_id: extract_youtube_id(text),
        };
    }
    if lower.contains("tiktok.com") {
        return Classification {
            platform: Platform::TikTok,
            video_id: extract_tiktok_id(text),
        };
    }
    if lower.contains("instagram.com") {
        return Classification {
            platform: Platform::Instagram,
            video_id: extract_instagram_id(text),
        };
    }
    if lower.contains("facebook.com") || lower.contains("fb.watch") {
        return Classification {
            platform: Platform::Facebook,
            video_id: None,
        };
    }

    Classification {
        platform: Platform::Unknown,
        video_id: None,
    }
}

/// Apply the configured policy to a classification. `Strict` refuses unknown
/// platforms and platform links without a video-shaped path; `Permissive`
/// forwards everything and only logs the mismatch.
pub fn check_policy(
    classification: &Classification,
    policy: ClassificationPolicy,
) -> Result<(), AppError> {
    match policy {
        ClassificationPolicy::Permissive => {
            if classification.platform.is_known() && expects_video_id(classification.platform)
                && classification.video_id.is_none()
            {
                log::warn!(
                    "{} link without a video-shaped path, forwarding anyway",
                    classification.platform.as_str()
                );
            }
            Ok(())
        }
        ClassificationPolicy::Strict => {
            if !classification.platform.is_known() {
                return Err(AppError::UnsupportedPlatform(
                    "this site is not supported".to_string(),
                ));
            }
            if expects_video_id(classification.platform) && classification.video_id.is_none() {
                return Err(AppError::UnsupportedPlatform(format!(
                    "this {} link does not point at a video",
                    classification.platform.as_str()
                )));
            }
            Ok(())
        }
    }
}

// Facebook share URLs carry no extractable ID, so only these three
// platforms can fail the strict video-path check.
fn expects_video_id(platform: Platform) -> bool {
    matches!(
        platform,
        Platform::YouTube | Platform::TikTok | Platform::Instagram
    )
}

fn extract_youtube_id(text: &str) -> Option<String> {
    // youtu.be/{id}, watch?v={id}, embed/{id}, shorts/{id}
    let re = Regex::new(r"(?i)(?:youtu\.be/|[?&]v=|embed/|shorts/)([^&?/#\s]+)").ok()?;
    re.captures(text).map(|caps| caps[1].to_string())
}

fn extract_tiktok_id(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)tiktok\.com/@[^/]+/video/(\d+)").ok()?;
    re.captures(text).map(|caps| caps[1].to_string())
}

fn extract_instagram_id(text: &str) -> Option<String> {
    let re = Regex::new(r"(?i)instagram\.com/(?:p|reel|tv)/([^/?#&\s]+)").ok()?;
    re.captures(text).map(|caps| caps[1].to_string())
}
