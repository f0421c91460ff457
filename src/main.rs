use eframe::egui;
use gridscope::app::{boot_from, BoardApp};
use gridscope::settings::Settings;

fn main() -> anyhow::Result<()> {
    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path)?;
    gridscope::logging::init(settings.debug_logging, settings.log_file.as_deref());
    tracing::info!(path = %settings_path.display(), "starting");

    let boot = boot_from(&settings_path)?;
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([640.0, 400.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Gridscope",
        native_options,
        Box::new(move |_cc| Box::new(BoardApp::new(boot))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start window: {e}"))
}
