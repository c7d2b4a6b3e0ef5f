mod commands;
mod database;
mod filter;
mod gui;
mod images;
mod paginator;
mod session;

use eframe::NativeOptions;
use gui::PaperBrowserApp;

fn main() -> Result<(), eframe::Error> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();

    let options = NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([960.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Paper Browser",
        options,
        Box::new(|cc| Ok(Box::new(PaperBrowserApp::new(cc)))),
    )
}
