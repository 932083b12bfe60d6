pub mod data;
mod ui;
mod watch;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use data::{AppState, Followup, Layer, LayerState, Messenger, StateChange, drain_one};
use watch::AssetWatcher;

use crate::RELOAD_DEBOUNCE_MS;
use crate::assets::DirAssets;
use crate::config::Config;
use crate::errors::StartupError;
use crate::overlay::image::{ImageDecoder, ImageLayer};
use crate::overlay::text::TextStyle;
use crate::overlay::{self, OverlayRenderer};
use crate::renderer::{Canvas, RendererSet};
use crate::schema::ShaderIndex;
use crate::webgl::{self, WebGlRenderer};

pub struct StageApp {
    layers: BTreeMap<Layer, RendererSet>,
    state: AppState,
    events: Messenger,
    watcher: Option<AssetWatcher>,
}

impl StageApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: Config, index: ShaderIndex) -> Result<Self, StartupError> {
        let gl = cc.gl.as_ref().ok_or(StartupError::NoGlContext)?.clone();
        let events = Messenger::default();

        let assets = Arc::new(DirAssets::new(config.webgl_dir()));
        let background = WebGlRenderer::new(gl, assets, &index, config.scene)?;
        let initial = background.initial_scene();

        let layers = BTreeMap::from([
            (Layer::Background, RendererSet::new(vec![Box::new(background)])),
            (
                Layer::Image,
                RendererSet::new(vec![Box::new(OverlayRenderer::<ImageLayer>::new(
                    events.clone(),
                    ImageDecoder::new(),
                ))]),
            ),
            (
                Layer::Text,
                RendererSet::new(vec![Box::new(OverlayRenderer::<TextStyle>::new(events.clone(), ()))]),
            ),
        ]);
        let states = BTreeMap::from([
            (Layer::Background, LayerState::new(webgl::RENDERER_NAME, initial)),
            (Layer::Image, LayerState::new(overlay::RENDERER_NAME, Some(0))),
            (Layer::Text, LayerState::new(overlay::RENDERER_NAME, Some(0))),
        ]);

        let watcher = if config.watch {
            AssetWatcher::new(&config.webgl_dir(), Duration::from_millis(RELOAD_DEBOUNCE_MS))
        } else {
            None
        };

        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        log::info!("stage ready, {} background scenes indexed", index.webgl.len());

        Ok(Self {
            layers,
            state: AppState::new(states, config.debug),
            events,
            watcher,
        })
    }

    /// Folds background work and at most one queued message into the state.
    fn step(&mut self, ctx: &egui::Context) {
        for set in self.layers.values_mut() {
            for renderer in set.iter_mut() {
                if renderer.poll(ctx) {
                    self.events.push(StateChange::SceneAdded);
                }
            }
        }

        if let Some(watcher) = &mut self.watcher {
            for file_name in watcher.settled() {
                for set in self.layers.values_mut() {
                    for renderer in set.iter_mut() {
                        renderer.reload(&file_name);
                    }
                }
            }
        }

        if let Some(Followup::LoadScene { layer, renderer, scene }) = drain_one(&mut self.state, &self.events) {
            if let Some(renderer) = self.layers.get_mut(&layer).and_then(|set| set.get_mut(&renderer)) {
                renderer.request_scene(scene);
            }
        }

        for (layer, layer_state) in &mut self.state.layers {
            let Some(set) = self.layers.get(layer) else {
                continue;
            };
            for (name, slot) in &mut layer_state.renderers {
                let Some(renderer) = set.get(name) else {
                    continue;
                };
                slot.settle_pending(|id| renderer.scene(id).is_some(), |id| renderer.is_loading(id));
                if slot.active_scene.is_none() {
                    slot.active_scene = renderer.scenes().into_iter().find(|s| s.ready).map(|s| s.id);
                }
            }
        }
    }

    /// Composites the active scene of every layer into the stage rectangle.
    fn custom_painting(&mut self, ui: &mut egui::Ui) {
        let (rect, _response) = ui.allocate_exact_size(ui.available_size(), egui::Sense::hover());

        if self.state.auto_time {
            self.state.time += f64::from(ui.input(|i| i.stable_dt));
        }
        let seconds = self.state.time;
        let pixels_per_point = ui.ctx().pixels_per_point();
        let painter = ui.painter_at(rect);
        let canvas = Canvas {
            painter: &painter,
            rect,
        };

        for layer in Layer::ALL {
            let Some(layer_state) = self.state.layers.get(&layer) else {
                continue;
            };
            let Some(renderer) = self
                .layers
                .get_mut(&layer)
                .and_then(|set| set.get_mut(&layer_state.active_renderer))
            else {
                continue;
            };
            renderer.resize(rect.width() * pixels_per_point, rect.height() * pixels_per_point);
            let scene = layer_state
                .renderer()
                .and_then(|slot| slot.active_scene)
                .and_then(|id| renderer.scene(id));
            if let Some(scene) = scene {
                scene.draw(&canvas, seconds);
            }
        }
    }

    fn release(&mut self) {
        for set in self.layers.values_mut() {
            for renderer in set.iter_mut() {
                renderer.release();
            }
        }
    }
}
