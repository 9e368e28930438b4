mod api;
mod app;
mod application;
mod domain;
mod ui;
mod utils;

fn main() -> iced::Result {
    pretty_env_logger::init();

    iced::application(app::boot, app::update, app::view)
        .title("Video Downloader")
        .run()
}
