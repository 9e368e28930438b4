use std::path::PathBuf;
use std::time::Duration;

use iced::task;
use iced::Task;

use crate::api::{BackendClient, BackendConfig};
use crate::application::{DownloadCoordinator, DownloadRequest, SaveEvent};
use crate::domain::{
    AppError, ClassificationPolicy, DownloadAction, DownloadOutcome, DownloadPhase,
};
use crate::ui::{DownloadMessage, DownloadView, ToastKind};

const TOAST_DURATION: Duration = Duration::from_secs(3);
const RESET_AFTER_SUCCESS: Duration = Duration::from_secs(3);
const RESET_AFTER_ERROR: Duration = Duration::from_secs(5);

pub struct DownloadApp {
    view: DownloadView,
    coordinator: DownloadCoordinator,
    phase: DownloadPhase,
    /// The submission currently in flight, kept for the portal fallback.
    current: Option<DownloadRequest>,
    /// Abort handle for the in-flight backend request or save stream.
    work_handle: Option<task::Handle>,
    /// Abort handle for the pending auto-reset, so a stale timer can never
    /// fire in the middle of a newer request.
    reset_handle: Option<task::Handle>,
    /// Generation counter so a stale expiry never clears a newer toast.
    toast_serial: u64,
}

pub fn boot() -> (DownloadApp, Task<Message>) {
    let coordinator = DownloadCoordinator::new(
        BackendClient::new(BackendConfig::default()),
        ClassificationPolicy::default(),
    );

    let probe = {
        let coordinator = coordinator.clone();
        Task::perform(
            async move { coordinator.probe_backend().await },
            Message::BackendProbed,
        )
    };

    let app = DownloadApp {
        view: DownloadView::default(),
        coordinator,
        phase: DownloadPhase::Idle,
        current: None,
        work_handle: None,
        reset_handle: None,
        toast_serial: 0,
    };

    (app, probe)
}

#[derive(Debug, Clone)]
pub enum Message {
    Ui(DownloadMessage),
    BackendProbed(bool),
    RequestFinished(Result<DownloadOutcome, AppError>),
    /// (Selected path, media URL)
    SavePathChosen(Option<PathBuf>, String),
    Save(SaveEvent),
    ToastElapsed(u64),
    ResetElapsed,
}

pub fn update(app: &mut DownloadApp, message: Message) -> Task<Message> {
    match message {
        Message::Ui(ui_msg) => {
            app.view.update(ui_msg.clone());
            match ui_msg {
                DownloadMessage::SubmitPressed => submit(app),
                DownloadMessage::CancelPressed => cancel(app),
                DownloadMessage::SourceUrlChanged(_) => Task::none(),
            }
        }

        Message::BackendProbed(online) => {
            app.view.status_message = if online {
                "Server online. Paste a video URL to begin.".to_string()
            } else {
                "Server unreachable. Downloads will open an external page.".to_string()
            };
            Task::none()
        }

        Message::RequestFinished(result) => {
            app.work_handle = None;
            match result {
                Ok(outcome) => dispatch_outcome(app, outcome),
                Err(AppError::Connectivity(reason)) => open_fallback_portal(app, reason),
                Err(e) => fail(app, e),
            }
        }

        Message::SavePathChosen(path, media_url) if app.phase != DownloadPhase::Saving => {
            // The dialog outlived the session (Cancel or reset happened
            // while it was open); starting a save now would put a second
            // operation in flight.
            log::debug!(
                "dropping stale save dialog result for {} ({:?})",
                media_url,
                path
            );
            Task::none()
        }

        Message::SavePathChosen(Some(path), media_url) => {
            app.view.show_progress = true;
            app.view.status_message = format!("Downloading to: {}", path.display());

            let stream = app.coordinator.save_stream(media_url, path);
            let (task, handle) =
                Task::stream(futures::StreamExt::map(stream, Message::Save)).abortable();
            app.work_handle = Some(handle);
            task
        }

        Message::SavePathChosen(None, _) => {
            // User dismissed the dialog; back to idle right away.
            app.phase = DownloadPhase::Idle;
            app.view.is_busy = false;
            app.view.status_message = "Download cancelled".to_string();
            show_toast(app, "Download cancelled", ToastKind::Info)
        }

        Message::Save(SaveEvent::Progress(progress)) => {
            app.view.progress = progress;
            if progress > 0.0 {
                app.view.status_message = format!("Downloading: {:.1}%", progress * 100.0);
            }
            Task::none()
        }

        Message::Save(SaveEvent::Completed(path)) => {
            app.phase = DownloadPhase::Success;
            app.work_handle = None;
            app.view.is_busy = false;
            app.view.show_progress = false;
            app.view.status_message = format!("Saved: {}", path.display());
            Task::batch([
                show_toast(app, "Download complete!", ToastKind::Success),
                schedule_reset(app, RESET_AFTER_SUCCESS),
            ])
        }

        Message::Save(SaveEvent::Failed(e)) => {
            app.work_handle = None;
            app.view.show_progress = false;
            fail(app, e)
        }

        Message::ToastElapsed(serial) => {
            if serial == app.toast_serial {
                app.view.toast = None;
            }
            Task::none()
        }

        Message::ResetElapsed => {
            app.phase = DownloadPhase::Idle;
            app.current = None;
            app.reset_handle = None;
            app.view.reset();
            app.view.status_message = "Ready.".to_string();
            Task::none()
        }
    }
}

pub fn view(app: &DownloadApp) -> iced::Element<'_, Message> {
    app.view.view().map(Message::Ui)
}

fn submit(app: &mut DownloadApp) -> Task<Message> {
    // Re-entrancy guard: Enter on the input still submits while the
    // button is disabled.
    if app.phase != DownloadPhase::Idle {
        return show_toast(
            app,
            "Please wait for the current download to finish",
            ToastKind::Info,
        );
    }

    app.phase = DownloadPhase::Validating;
    let request = match app.coordinator.prepare(&app.view.source_url) {
        Ok(request) => request,
        Err(e) => return fail(app, e),
    };

    // Stale timers must not flip the phase mid-request.
    if let Some(handle) = app.reset_handle.take() {
        handle.abort();
    }

    app.phase = DownloadPhase::Requesting;
    app.view.is_busy = true;
    app.view.status_message = format!(
        "Requesting {} download...",
        request.classification.platform.as_str()
    );
    app.current = Some(request.clone());

    let coordinator = app.coordinator.clone();
    let (task, handle) = Task::perform(
        async move { coordinator.request_download(&request).await },
        Message::RequestFinished,
    )
    .abortable();
    app.work_handle = Some(handle);
    task
}

fn cancel(app: &mut DownloadApp) -> Task<Message> {
    if let Some(handle) = app.work_handle.take() {
        handle.abort();
    }
    app.phase = DownloadPhase::Idle;
    app.current = None;
    app.view.is_busy = false;
    app.view.show_progress = false;
    app.view.status_message = "Cancelled".to_string();
    show_toast(app, "Download cancelled", ToastKind::Info)
}

fn dispatch_outcome(app: &mut DownloadApp, outcome: DownloadOutcome) -> Task<Message> {
    match app.coordinator.resolve_action(&outcome) {
        DownloadAction::OpenPage { url } => {
            app.phase = DownloadPhase::Success;
            app.view.is_busy = false;
            open_in_browser(&url);
            Task::batch([
                show_toast(app, "Opening download page...", ToastKind::Success),
                schedule_reset(app, RESET_AFTER_SUCCESS),
            ])
        }
        DownloadAction::SaveFile {
            url,
            suggested_filename,
        } => {
            app.phase = DownloadPhase::Saving;
            app.view.status_message = "Choose where to save...".to_string();

            let coordinator = app.coordinator.clone();
            let toast = show_toast(app, "Download started!", ToastKind::Success);
            let pick = Task::perform(
                async move {
                    let path = coordinator.choose_save_path(suggested_filename).await;
                    (path, url)
                },
                |(path, url)| Message::SavePathChosen(path, url),
            );
            Task::batch([toast, pick])
        }
        DownloadAction::Nothing => {
            // A valid terminal outcome, not an error.
            app.phase = DownloadPhase::Success;
            app.view.is_busy = false;
            Task::batch([
                show_toast(
                    app,
                    "The server found nothing to download for this link",
                    ToastKind::Info,
                ),
                schedule_reset(app, RESET_AFTER_SUCCESS),
            ])
        }
    }
}

/// Backend and every relay unreachable: hand the URL to a third-party
/// downloader portal in the browser, as the original widget does.
fn open_fallback_portal(app: &mut DownloadApp, reason: String) -> Task<Message> {
    log::warn!("backend unreachable ({}), using portal fallback", reason);
    app.phase = DownloadPhase::Failed;
    app.view.is_busy = false;

    let toast = match app.current.clone() {
        Some(request) => {
            let platform = request.classification.platform;
            let portal = app
                .coordinator
                .fallback_portal_url(platform, request.url.as_str());
            open_in_browser(&portal);
            app.view.status_message =
                "Server unreachable, opened an external downloader".to_string();
            show_toast(
                app,
                format!("Using {} downloader...", platform.as_str()),
                ToastKind::Info,
            )
        }
        None => show_toast(
            app,
            AppError::Connectivity(reason).to_string(),
            ToastKind::Error,
        ),
    };

    Task::batch([toast, schedule_reset(app, RESET_AFTER_ERROR)])
}

fn fail(app: &mut DownloadApp, error: AppError) -> Task<Message> {
    app.phase = DownloadPhase::Failed;
    app.view.is_busy = false;
    if matches!(
        error,
        AppError::EmptyInput | AppError::MalformedUrl | AppError::UnsupportedPlatform(_)
    ) {
        app.view.input_error = true;
    }
    app.view.status_message = error.to_string();
    Task::batch([
        show_toast(app, error.to_string(), ToastKind::Error),
        schedule_reset(app, RESET_AFTER_ERROR),
    ])
}

fn show_toast(app: &mut DownloadApp, message: impl Into<String>, kind: ToastKind) -> Task<Message> {
    app.toast_serial += 1;
    let serial = app.toast_serial;
    app.view.show_toast(message, kind);
    Task::perform(
        async move {
            tokio::time::sleep(TOAST_DURATION).await;
            serial
        },
        Message::ToastElapsed,
    )
}

fn schedule_reset(app: &mut DownloadApp, delay: Duration) -> Task<Message> {
    if let Some(handle) = app.reset_handle.take() {
        handle.abort();
    }
    let (task, handle) = Task::perform(
        async move {
            tokio::time::sleep(delay).await;
        },
        |_| Message::ResetElapsed,
    )
    .abortable();
    app.reset_handle = Some(handle);
    task
}

fn open_in_browser(url: &str) {
    if let Err(e) = open::that_detached(url) {
        log::error!("failed to open browser for {}: {}", url, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Platform;

    fn submitted_app(url: &str) -> DownloadApp {
        let (mut app, _boot_task) = boot();
        app.view.source_url = url.to_string();
        let _ = update(&mut app, Message::Ui(DownloadMessage::SubmitPressed));
        app
    }

    #[test]
    fn valid_submission_enters_requesting() {
        let app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        assert_eq!(app.phase, DownloadPhase::Requesting);
        assert!(app.view.is_busy);
        assert!(app.work_handle.is_some());
        assert_eq!(
            app.current.as_ref().unwrap().classification.platform,
            Platform::YouTube
        );
    }

    #[test]
    fn invalid_submission_fails_synchronously() {
        let app = submitted_app("definitely not a url");
        assert_eq!(app.phase, DownloadPhase::Failed);
        assert!(app.view.input_error);
        assert!(app.view.toast.is_some());
        assert!(app.work_handle.is_none());
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() {
        let mut app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        let first_serial = app.toast_serial;

        let _ = update(&mut app, Message::Ui(DownloadMessage::SubmitPressed));

        // Still exactly one request: phase unchanged, only a notice toast.
        assert_eq!(app.phase, DownloadPhase::Requesting);
        assert_eq!(app.toast_serial, first_serial + 1);
        let toast = app.view.toast.as_ref().unwrap();
        assert!(toast.message.contains("wait"));
    }

    #[test]
    fn cancel_aborts_and_returns_to_idle() {
        let mut app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        let _ = update(&mut app, Message::Ui(DownloadMessage::CancelPressed));

        assert_eq!(app.phase, DownloadPhase::Idle);
        assert!(!app.view.is_busy);
        assert!(app.work_handle.is_none());
    }

    #[test]
    fn successful_outcome_with_nothing_actionable_is_not_an_error() {
        let mut app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        let _ = update(
            &mut app,
            Message::RequestFinished(Ok(DownloadOutcome::default())),
        );

        assert_eq!(app.phase, DownloadPhase::Success);
        assert_eq!(app.view.toast.as_ref().unwrap().kind, ToastKind::Info);
    }

    #[test]
    fn backend_error_moves_to_failed_with_its_message() {
        let mut app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        let _ = update(
            &mut app,
            Message::RequestFinished(Err(AppError::Backend("age restricted".to_string()))),
        );

        assert_eq!(app.phase, DownloadPhase::Failed);
        let toast = app.view.toast.as_ref().unwrap();
        assert_eq!(toast.kind, ToastKind::Error);
        assert!(toast.message.contains("age restricted"));
        // The status line carries the specific message too, not a
        // generic one.
        assert!(app.view.status_message.contains("age restricted"));
    }

    #[test]
    fn save_completion_reports_the_path() {
        let mut app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        let _ = update(
            &mut app,
            Message::Save(SaveEvent::Completed(PathBuf::from("/tmp/a.mp4"))),
        );

        assert_eq!(app.phase, DownloadPhase::Success);
        assert!(app.view.status_message.contains("/tmp/a.mp4"));
    }

    #[test]
    fn reset_returns_to_idle_and_clears_the_input() {
        let mut app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        let _ = update(&mut app, Message::ResetElapsed);

        assert_eq!(app.phase, DownloadPhase::Idle);
        assert!(app.view.source_url.is_empty());
        assert_eq!(app.view.placeholder, "Paste another URL");
        assert!(app.current.is_none());
    }

    #[test]
    fn stale_toast_expiry_does_not_clear_a_newer_toast() {
        let mut app = submitted_app("definitely not a url");
        let stale = app.toast_serial;

        // A newer toast replaces the old one before the first expiry fires.
        let _ = update(&mut app, Message::ResetElapsed);
        app.view.source_url = "also not a url".to_string();
        let _ = update(&mut app, Message::Ui(DownloadMessage::SubmitPressed));

        let _ = update(&mut app, Message::ToastElapsed(stale));
        assert!(app.view.toast.is_some());

        let current = app.toast_serial;
        let _ = update(&mut app, Message::ToastElapsed(current));
        assert!(app.view.toast.is_none());
    }

    #[test]
    fn dialog_dismissal_goes_straight_back_to_idle() {
        let mut app = saving_app();
        let _ = update(
            &mut app,
            Message::SavePathChosen(None, "https://cdn/a.mp4".to_string()),
        );

        assert_eq!(app.phase, DownloadPhase::Idle);
        assert!(!app.view.is_busy);
    }

    /// Drive a submission up to the save dialog being open.
    fn saving_app() -> DownloadApp {
        let mut app = submitted_app("https://youtu.be/dQw4w9WgXcQ");
        let outcome = DownloadOutcome {
            media_url: Some("https://cdn/a.mp4".to_string()),
            ..Default::default()
        };
        let _ = update(&mut app, Message::RequestFinished(Ok(outcome)));
        assert_eq!(app.phase, DownloadPhase::Saving);
        app
    }

    #[test]
    fn cancelling_while_the_dialog_is_open_drops_its_result() {
        let mut app = saving_app();
        let _ = update(&mut app, Message::Ui(DownloadMessage::CancelPressed));
        assert_eq!(app.phase, DownloadPhase::Idle);

        // The dialog resolves after the cancel; nothing may start.
        let _ = update(
            &mut app,
            Message::SavePathChosen(
                Some(PathBuf::from("/tmp/a.mp4")),
                "https://cdn/a.mp4".to_string(),
            ),
        );
        assert_eq!(app.phase, DownloadPhase::Idle);
        assert!(app.work_handle.is_none());
        assert!(!app.view.show_progress);

        // A fresh submission still finds a clean machine.
        app.view.source_url = "https://youtu.be/dQw4w9WgXcQ".to_string();
        let _ = update(&mut app, Message::Ui(DownloadMessage::SubmitPressed));
        assert_eq!(app.phase, DownloadPhase::Requesting);
    }

    #[test]
    fn dialog_dismissal_after_cancel_changes_nothing() {
        let mut app = saving_app();
        let _ = update(&mut app, Message::Ui(DownloadMessage::CancelPressed));
        let serial = app.toast_serial;

        let _ = update(
            &mut app,
            Message::SavePathChosen(None, "https://cdn/a.mp4".to_string()),
        );
        assert_eq!(app.phase, DownloadPhase::Idle);
        assert_eq!(app.toast_serial, serial);
    }
}
