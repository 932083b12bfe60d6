mod app;
mod assets;
mod binder;
mod color;
mod config;
mod errors;
mod gpu;
mod overlay;
mod registry;
mod render_engine;
mod renderer;
mod schema;
mod settings;
mod webgl;

use app::StageApp;
use assets::{DirAssets, load_index};
use clap::Parser;
use config::Config;

pub const DEFAULT_ASSET_DIR: &str = "assets/shaders";
pub const INDEX_FILE_NAME: &str = "index.json";
pub const WEBGL_DIR: &str = "webgl";
pub const RELOAD_DEBOUNCE_MS: u64 = 100;
pub const WINDOW_TITLE: &str = "Shader Stage";

fn main() {
    env_logger::init();
    let config = Config::parse();

    let index = match load_index(&DirAssets::new(&config.assets), INDEX_FILE_NAME) {
        Ok(index) => index,
        Err(e) => {
            log::error!("cannot read {}: {e}", config.index_path().display());
            std::process::exit(1);
        }
    };

    let native_options = eframe::NativeOptions {
        renderer: eframe::Renderer::Glow,
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        native_options,
        Box::new(move |cc| Box::new(StageApp::new(cc, config, index).expect("Failed to create StageApp"))),
    )
    .expect("Failed to run eframe");
}
