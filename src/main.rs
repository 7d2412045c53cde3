// Import from the library instead of declaring modules
use power_automaton::{config::SimulationConfig, debug, ui::AutomatonApp};

#[cfg(not(target_arch = "wasm32"))]
fn main() -> Result<(), eframe::Error> {
    debug::init();

    // Optional first argument: path to a TOML configuration
    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::from_file_or_default(path),
        None => SimulationConfig::default(),
    };
    tracing::info!(
        "starting {}x{} grid, variance {}",
        config.size.width,
        config.size.height,
        config.variance
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1600.0, 900.0])
            .with_title("Power Automaton"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Power Automaton",
        options,
        Box::new(|cc| Ok(Box::new(AutomatonApp::new(cc, config)?))),
    );

    tracing::info!("shutting down");
    debug::print_stats();

    result
}

#[cfg(target_arch = "wasm32")]
fn main() {
    use wasm_bindgen::JsCast;

    // Set up panic hook for better error messages in the browser
    console_error_panic_hook::set_once();

    debug::init();

    let web_options = eframe::WebOptions::default();

    wasm_bindgen_futures::spawn_local(async {
        let document = web_sys::window()
            .expect("No window")
            .document()
            .expect("No document");

        let canvas = document
            .get_element_by_id("grid")
            .expect("Failed to find grid canvas")
            .dyn_into::<web_sys::HtmlCanvasElement>()
            .expect("grid was not a HtmlCanvasElement");

        let start_result = eframe::WebRunner::new()
            .start(
                canvas,
                web_options,
                Box::new(|cc| Ok(Box::new(AutomatonApp::new(cc, SimulationConfig::default())?))),
            )
            .await;

        if let Err(e) = start_result {
            panic!("Failed to start eframe: {e:?}");
        }
    });
}
