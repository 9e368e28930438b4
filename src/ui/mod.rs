use iced::{
    widget::{button, column, progress_bar, row, text, text_input, Space},
    Color, Element, Length, Theme,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

impl ToastKind {
    fn color(self) -> Color {
        match self {
            ToastKind::Success => Color::from_rgb(0.2, 0.65, 0.3),
            ToastKind::Error => Color::from_rgb(0.8, 0.2, 0.2),
            ToastKind::Info => Color::from_rgb(0.25, 0.45, 0.8),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
}

/// Main view state
pub struct DownloadView {
    pub source_url: String,
    pub placeholder: String,
    pub status_message: String,
    pub toast: Option<Toast>,
    pub is_busy: bool,
    pub input_error: bool,
    pub show_progress: bool,
    pub progress: f32,
}

impl Default for DownloadView {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            placeholder: "Paste a video URL...".to_string(),
            status_message: "Checking download server...".to_string(),
            toast: None,
            is_busy: false,
            input_error: false,
            show_progress: false,
            progress: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub enum DownloadMessage {
    SourceUrlChanged(String),
    SubmitPressed,
    CancelPressed,
}

impl DownloadView {
    pub fn update(&mut self, message: DownloadMessage) {
        match message {
            DownloadMessage::SourceUrlChanged(url) => {
                self.source_url = url;
                self.input_error = false;
            }
            DownloadMessage::SubmitPressed | DownloadMessage::CancelPressed => {
                // Handled by the app
            }
        }
    }

    /// Clear per-request state after the auto-reset timer fires.
    pub fn reset(&mut self) {
        self.source_url.clear();
        self.placeholder = "Paste another URL".to_string();
        self.is_busy = false;
        self.input_error = false;
        self.show_progress = false;
        self.progress = 0.0;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.toast = Some(Toast {
            message: message.into(),
            kind,
        });
    }

    pub fn view(&self) -> Element<'_, DownloadMessage> {
        let input_error = self.input_error;
        let input = text_input(&self.placeholder, &self.source_url)
            .on_input(DownloadMessage::SourceUrlChanged)
            .on_submit(DownloadMessage::SubmitPressed)
            .padding(10)
            .style(move |theme: &Theme, status| {
                let mut style = text_input::default(theme, status);
                if input_error {
                    style.border.color = Color::from_rgb(0.8, 0.2, 0.2);
                    style.border.width = 1.5;
                }
                style
            });

        let download_button = button("Download Video")
            .on_press_maybe((!self.is_busy).then_some(DownloadMessage::SubmitPressed))
            .padding([10, 20]);

        let mut actions = row![download_button].spacing(10);
        if self.is_busy {
            actions = actions.push(
                button("Cancel")
                    .on_press(DownloadMessage::CancelPressed)
                    .padding([10, 20]),
            );
        }

        let mut content = column![
            text("Video Downloader").size(32),
            Space::new().height(Length::Fixed(20.0)),
            input,
            Space::new().height(Length::Fixed(10.0)),
            text(&self.status_message).size(14),
        ]
        .padding(20)
        .spacing(10);

        if self.show_progress {
            content = content.push(progress_bar(0.0..=1.0, self.progress).girth(8));
        }

        if let Some(toast) = &self.toast {
            content = content.push(text(&toast.message).size(14).color(toast.kind.color()));
        }

        content = content
            .push(Space::new().height(Length::Fixed(20.0)))
            .push(actions);

        content.into()
    }
}
