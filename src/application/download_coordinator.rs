use std::path::PathBuf;

use futures::{stream::BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::{
    api::{ApiError, BackendClient},
    domain::{
        check_policy, classify, validate, AppError, Classification, ClassificationPolicy,
        DownloadAction, DownloadOutcome, Platform,
    },
};

/// One submission, validated and classified, ready to hand to the backend.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: Url,
    pub classification: Classification,
}

#[derive(Debug, Clone)]
pub enum SaveEvent {
    Progress(f32),
    Completed(PathBuf),
    Failed(AppError),
}

#[derive(Clone)]
pub struct DownloadCoordinator {
    client: BackendClient,
    policy: ClassificationPolicy,
}

impl DownloadCoordinator {
    pub fn new(client: BackendClient, policy: ClassificationPolicy) -> Self {
        Self { client, policy }
    }

    /// Synchronous front half of a submission: validate the input, classify
    /// the platform, and apply the classification policy. No network I/O.
    pub fn prepare(&self, input: &str) -> Result<DownloadRequest, AppError> {
        let url = validate(input)?;
        let classification = classify(&url);
        check_policy(&classification, self.policy)?;
        Ok(DownloadRequest {
            url,
            classification,
        })
    }

    pub async fn probe_backend(&self) -> bool {
        self.client.ping().await
    }

    /// Async back half: one backend round trip (plus the bounded relay
    /// walk inside the client), normalized into a strict outcome.
    pub async fn request_download(&self, request: &DownloadRequest) -> Result<DownloadOutcome, AppError> {
        self.client
            .request_download(request.url.as_str())
            .await
            .map_err(map_api_error)
    }

    /// Decide what to do with a successful outcome. A response carrying only
    /// a prepared filename means the file sits on the backend, reachable
    /// through `/get_file/{filename}`.
    pub fn resolve_action(&self, outcome: &DownloadOutcome) -> DownloadAction {
        match DownloadAction::from_outcome(outcome) {
            DownloadAction::Nothing => match &outcome.filename {
                Some(filename) => match self.client.file_url(filename) {
                    Ok(url) => DownloadAction::SaveFile {
                        url,
                        suggested_filename: crate::utils::sanitize_filename(filename),
                    },
                    Err(e) => {
                        log::error!("could not build file URL: {}", e);
                        DownloadAction::Nothing
                    }
                },
                None => DownloadAction::Nothing,
            },
            action => action,
        }
    }

    /// Third-party downloader portal for when the backend and every relay
    /// are unreachable. Always produces something to open.
    pub fn fallback_portal_url(&self, platform: Platform, source_url: &str) -> String {
        let encoded: String =
            url::form_urlencoded::byte_serialize(source_url.as_bytes()).collect();
        match platform {
            Platform::YouTube => format!("https://ssyoutube.com/en105DL/{}", encoded),
            Platform::TikTok => format!("https://snaptik.app/{}", encoded),
            Platform::Instagram => format!("https://snapinsta.app/{}", encoded),
            Platform::Facebook => format!("https://getfbot.com/{}", encoded),
            Platform::Unknown => format!("https://savetube.io/{}", encoded),
        }
    }

    pub async fn choose_save_path(&self, suggested_filename: String) -> Option<PathBuf> {
        rfd::AsyncFileDialog::new()
            .set_file_name(&suggested_filename)
            .save_file()
            .await
            .map(|handle| handle.path().to_path_buf())
    }

    /// Stream the resolved media URL to disk, yielding progress as it goes.
    pub fn save_stream(&self, url: String, path: PathBuf) -> BoxStream<'static, SaveEvent> {
        futures::stream::unfold(
            SaveRuntimeState::Start {
                client: self.client.clone(),
                url,
                path,
            },
            |state| async move {
                match state {
                    SaveRuntimeState::Start { client, url, path } => {
                        let file = match tokio::fs::File::create(&path).await {
                            Ok(file) => file,
                            Err(e) => {
                                return Some((
                                    SaveEvent::Failed(AppError::Io(format!(
                                        "Failed to create file: {}",
                                        e
                                    ))),
                                    SaveRuntimeState::Finished,
                                ));
                            }
                        };

                        match client.fetch_file_stream(&url).await {
                            Ok((total_size, stream)) => Some((
                                SaveEvent::Progress(0.0),
                                SaveRuntimeState::Writing {
                                    file,
                                    stream: stream.boxed(),
                                    written: 0,
                                    total: total_size,
                                    path,
                                },
                            )),
                            Err(e) => Some((
                                SaveEvent::Failed(map_api_error(e)),
                                SaveRuntimeState::Finished,
                            )),
                        }
                    }
                    SaveRuntimeState::Writing {
                        mut file,
                        mut stream,
                        mut written,
                        total,
                        path,
                    } => match stream.next().await {
                        Some(Ok(chunk)) => {
                            if let Err(e) = file.write_all(&chunk).await {
                                return Some((
                                    SaveEvent::Failed(AppError::Io(format!(
                                        "Write error: {}",
                                        e
                                    ))),
                                    SaveRuntimeState::Finished,
                                ));
                            }

                            written += chunk.len() as u64;

                            let progress = match total {
                                Some(total_size) if total_size > 0 => {
                                    written as f32 / total_size as f32
                                }
                                _ => 0.0,
                            };

                            Some((
                                SaveEvent::Progress(progress),
                                SaveRuntimeState::Writing {
                                    file,
                                    stream,
                                    written,
                                    total,
                                    path,
                                },
                            ))
                        }
                        Some(Err(e)) => Some((
                            SaveEvent::Failed(map_api_error(e)),
                            SaveRuntimeState::Finished,
                        )),
                        None => {
                            if let Err(e) = file.sync_all().await {
                                return Some((
                                    SaveEvent::Failed(AppError::Io(format!(
                                        "Failed to sync file: {}",
                                        e
                                    ))),
                                    SaveRuntimeState::Finished,
                                ));
                            }

                            Some((SaveEvent::Completed(path), SaveRuntimeState::Finished))
                        }
                    },
                    SaveRuntimeState::Finished => None,
                }
            },
        )
        .boxed()
    }
}

fn map_api_error(e: ApiError) -> AppError {
    match e {
        ApiError::Request(e) if e.is_timeout() || e.is_connect() => {
            AppError::Connectivity(e.to_string())
        }
        ApiError::Request(e) => AppError::Backend(e.to_string()),
        ApiError::Connectivity(msg) => AppError::Connectivity(msg),
        ApiError::UnexpectedFormat(msg) => AppError::UnexpectedResponseFormat(msg),
        ApiError::Backend(msg) => AppError::Backend(msg),
        ApiError::InvalidUrl(msg) => AppError::Connectivity(msg),
    }
}

enum SaveRuntimeState {
    Start {
        client: BackendClient,
        url: String,
        path: PathBuf,
    },
    Writing {
        file: tokio::fs::File,
        stream: BoxStream<'static, crate::api::Result<bytes::Bytes>>,
        written: u64,
        total: Option<u64>,
        path: PathBuf,
    },
    Finished,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BackendConfig;

    fn coordinator(policy: ClassificationPolicy) -> DownloadCoordinator {
        DownloadCoordinator::new(BackendClient::new(BackendConfig::default()), policy)
    }

    #[test]
    fn prepare_classifies_before_any_network_call() {
        let request = coordinator(ClassificationPolicy::Permissive)
            .prepare("https://youtu.be/dQw4w9WgXcQ")
            .unwrap();
        assert_eq!(request.classification.platform, Platform::YouTube);
        assert_eq!(
            request.classification.video_id.as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn prepare_surfaces_validation_errors() {
        let c = coordinator(ClassificationPolicy::Permissive);
        assert!(matches!(c.prepare("  "), Err(AppError::EmptyInput)));
        assert!(matches!(
            c.prepare("ftp://example.com/x"),
            Err(AppError::MalformedUrl)
        ));
    }

    #[test]
    fn strict_policy_blocks_unknown_platforms() {
        let c = coordinator(ClassificationPolicy::Strict);
        assert!(matches!(
            c.prepare("https://example.com/cat.mp4"),
            Err(AppError::UnsupportedPlatform(_))
        ));
        // Same URL sails through under the permissive default.
        assert!(coordinator(ClassificationPolicy::default())
            .prepare("https://example.com/cat.mp4")
            .is_ok());
    }

    #[test]
    fn filename_only_response_resolves_to_get_file() {
        let c = coordinator(ClassificationPolicy::Permissive);
        let outcome = DownloadOutcome {
            title: Some("A".to_string()),
            filename: Some("a.mp4".to_string()),
            ..Default::default()
        };
        match c.resolve_action(&outcome) {
            DownloadAction::SaveFile {
                url,
                suggested_filename,
            } => {
                assert!(url.ends_with("/get_file/a.mp4"));
                assert_eq!(suggested_filename, "a.mp4");
            }
            other => panic!("expected SaveFile, got {:?}", other),
        }
    }

    #[test]
    fn empty_handed_success_resolves_to_nothing() {
        let c = coordinator(ClassificationPolicy::Permissive);
        assert_eq!(
            c.resolve_action(&DownloadOutcome::default()),
            DownloadAction::Nothing
        );
    }

    #[test]
    fn fallback_portal_matches_the_platform() {
        let c = coordinator(ClassificationPolicy::Permissive);
        let url = c.fallback_portal_url(Platform::TikTok, "https://www.tiktok.com/@u/video/1");
        assert!(url.starts_with("https://snaptik.app/"));
        assert!(url.contains("https%3A%2F%2Fwww.tiktok.com"));

        let url = c.fallback_portal_url(Platform::Unknown, "https://example.com/x");
        assert!(url.starts_with("https://savetube.io/"));
    }
}
