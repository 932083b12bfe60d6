//! Background layer: one full-screen fragment shader per scene.

use std::sync::Arc;

use egui_glow::glow;

use crate::assets::{AssetSource, FetchedShader, ShaderFetcher};
use crate::binder::ProgramBinding;
use crate::errors::{SceneLoadError, ShaderError};
use crate::gpu::{GlMesh, ShaderContext};
use crate::registry::{Completion, SceneRegistry, SceneSlot};
use crate::render_engine::{FullscreenQuad, QuadDraw, build_program, vertex_shader_source};
use crate::renderer::{Canvas, Release, Renderer, Scene, SceneObject, SceneSummary};
use crate::schema::{SceneId, ShaderIndex, ShaderInfo};

pub const RENDERER_NAME: &str = "WebGL";

/// How a context gets a scene's quad onto the stage.
pub trait StagePaint: ShaderContext + Sized {
    fn paint(
        gl: &Arc<Self>,
        canvas: &Canvas<'_>,
        draw: QuadDraw<Self::Program, Self::Location, Self::Mesh>,
        seconds: f32,
    );
}

impl StagePaint for glow::Context {
    fn paint(
        _gl: &Arc<Self>,
        canvas: &Canvas<'_>,
        draw: QuadDraw<glow::Program, glow::UniformLocation, GlMesh>,
        seconds: f32,
    ) {
        let cb = egui_glow::CallbackFn::new(move |info, painter| {
            let viewport = info.viewport_in_pixels();
            let origin = [viewport.left_px as f32, viewport.from_bottom_px as f32];
            draw.execute(painter.gl().as_ref(), seconds, origin);
        });
        canvas.painter.add(egui::PaintCallback {
            rect: canvas.rect,
            callback: Arc::new(cb),
        });
    }
}

pub struct WebGlScene<G: ShaderContext> {
    info: ShaderInfo,
    binding: ProgramBinding<G>,
    quad: FullscreenQuad<G::Mesh>,
    time: Option<G::Location>,
    resolution: Option<G::Location>,
    origin: Option<G::Location>,
    released: bool,
}

impl<G: ShaderContext + 'static> WebGlScene<G> {
    /// Compiles the shader, seeds every uniform with its `init` value and
    /// resolves the time, resolution and origin accessors. Any failure deletes the
    /// program again; nothing is half-built.
    pub fn build(gl: &Arc<G>, quad: FullscreenQuad<G::Mesh>, fetched: FetchedShader) -> Result<Self, SceneLoadError> {
        let FetchedShader { info, source } = fetched;
        let vertex = vertex_shader_source(gl.as_ref());
        let program = build_program(gl.as_ref(), &vertex, &source)?;
        let binding = ProgramBinding {
            gl: gl.clone(),
            program,
            source: source.into(),
        };

        let located = info
            .uniforms
            .iter()
            .try_for_each(|u| binding.seed(u))
            .and_then(|()| {
                let time = info.time.as_deref().map(|a| binding.locate(a)).transpose()?;
                let resolution = info.resolution.as_deref().map(|a| binding.locate(a)).transpose()?;
                let origin = info.origin.as_deref().map(|a| binding.locate(a)).transpose()?;
                Ok((time, resolution, origin))
            });
        let (time, resolution, origin) = match located {
            Ok(found) => found,
            Err(err) => {
                gl.delete_program(program);
                return Err(err.into());
            }
        };

        Ok(Self {
            info,
            binding,
            quad,
            time,
            resolution,
            origin,
            released: false,
        })
    }

    #[cfg(test)]
    pub fn program(&self) -> G::Program {
        self.binding.program
    }

    pub fn set_resolution(&self, width: f32, height: f32) {
        if let Some(location) = &self.resolution {
            let gl = &self.binding.gl;
            gl.use_program(self.binding.program);
            gl.uniform_2_f32(location, [width, height]);
        }
    }

    pub fn draw_call(&self) -> QuadDraw<G::Program, G::Location, G::Mesh> {
        QuadDraw {
            program: self.binding.program,
            time: self.time.clone(),
            origin: self.origin.clone(),
            quad: self.quad,
        }
    }
}

impl<G: ShaderContext> Release for WebGlScene<G> {
    fn release(&mut self) {
        if !self.released {
            self.binding.gl.delete_program(self.binding.program);
            self.released = true;
        }
    }
}

impl<G: StagePaint + 'static> Scene for WebGlScene<G> {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn debug_only(&self) -> bool {
        self.info.debug_only
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.set_resolution(width, height);
    }

    /// A shader scene has exactly one object: the shader itself.
    fn objects(&self) -> Vec<SceneObject> {
        let settings = match self.binding.bind_all(&self.info.uniforms) {
            Ok(settings) => settings,
            Err(err) => {
                log::error!("scene `{}`: {err}", self.info.name);
                Vec::new()
            }
        };
        vec![SceneObject {
            name: self.info.name.clone(),
            id: 0,
            settings,
        }]
    }

    fn draw(&self, canvas: &Canvas<'_>, seconds: f64) {
        G::paint(&self.binding.gl, canvas, self.draw_call(), seconds as f32);
    }
}

pub struct WebGlRenderer<G: ShaderContext> {
    gl: Arc<G>,
    quad: FullscreenQuad<G::Mesh>,
    registry: SceneRegistry<WebGlScene<G>>,
    fetcher: ShaderFetcher,
    size: [f32; 2],
    initial: Option<SceneId>,
}

impl<G: ShaderContext + 'static> WebGlRenderer<G> {
    /// Loads the initial scene before returning and starts background loads
    /// for every other index entry. An unknown `initial` id falls back to the
    /// first entry of the index. If that load fails there is no initial scene.
    pub fn new(
        gl: Arc<G>,
        assets: Arc<dyn AssetSource>,
        index: &ShaderIndex,
        initial: Option<SceneId>,
    ) -> Result<Self, ShaderError> {
        let quad = FullscreenQuad::new(gl.as_ref())?;
        let initial = initial
            .filter(|id| index.webgl.contains_key(id))
            .or_else(|| index.webgl.keys().next().copied());
        let mut renderer = Self {
            gl,
            quad,
            registry: SceneRegistry::new(index.webgl.clone()),
            fetcher: ShaderFetcher::new(assets),
            size: [1.0, 1.0],
            initial,
        };

        if let Some(id) = initial {
            renderer.load_now(id);
        }
        renderer.initial = initial.filter(|&id| renderer.registry.get(id).is_some());
        let rest: Vec<_> = renderer.registry.ids().filter(|&id| Some(id) != initial).collect();
        for id in rest {
            renderer.start_load(id);
        }
        Ok(renderer)
    }

    pub fn initial_scene(&self) -> Option<SceneId> {
        self.initial
    }

    fn load_now(&mut self, id: SceneId) {
        let Some(file) = self.registry.file(id).map(str::to_string) else {
            return;
        };
        if self.registry.begin_load(id) {
            let result = self.fetcher.fetch_now(&file);
            self.finish(id, result);
        }
    }

    fn start_load(&mut self, id: SceneId) {
        let Some(file) = self.registry.file(id).map(str::to_string) else {
            return;
        };
        if self.registry.begin_load(id) {
            self.fetcher.spawn(id, &file);
        }
    }

    fn finish(&mut self, id: SceneId, fetched: Result<FetchedShader, SceneLoadError>) -> Completion {
        let built = fetched.and_then(|f| WebGlScene::build(&self.gl, self.quad, f));
        let built = built.inspect(|scene| scene.set_resolution(self.size[0], self.size[1]));
        self.registry.complete(id, built)
    }

    /// Re-fetches every scene whose description or GLSL file is `file_name`.
    pub fn reload_file(&mut self, file_name: &str) {
        let ids: Vec<_> = self
            .registry
            .ids()
            .filter(|&id| {
                self.registry.file(id) == Some(file_name)
                    || self.registry.get(id).is_some_and(|s| s.info.file_name == file_name)
            })
            .collect();
        for id in ids {
            let Some(file) = self.registry.file(id).map(str::to_string) else {
                continue;
            };
            if self.registry.begin_reload(id) {
                log::info!("`{file_name}` changed, reloading scene {id}");
                self.fetcher.spawn(id, &file);
            }
        }
    }

    /// Drains finished fetches. Returns true when a new scene became ready.
    pub fn drain(&mut self) -> bool {
        let mut added = false;
        while let Some(done) = self.fetcher.try_next() {
            added |= self.finish(done.id, done.result) == Completion::Added;
        }
        added
    }
}

impl<G: StagePaint + 'static> Renderer for WebGlRenderer<G> {
    fn name(&self) -> &'static str {
        RENDERER_NAME
    }

    fn poll(&mut self, _ctx: &egui::Context) -> bool {
        self.drain()
    }

    fn scenes(&self) -> Vec<SceneSummary> {
        self.registry
            .ids()
            .map(|id| match self.scene(id) {
                Some(scene) => SceneSummary {
                    id,
                    name: scene.name().to_string(),
                    debug_only: scene.debug_only(),
                    ready: true,
                },
                None => SceneSummary {
                    id,
                    name: self.registry.file(id).unwrap_or_default().to_string(),
                    debug_only: false,
                    ready: false,
                },
            })
            .collect()
    }

    fn request_scene(&mut self, id: SceneId) {
        self.start_load(id);
    }

    fn scene(&self, id: SceneId) -> Option<&dyn Scene> {
        self.registry.get(id).map(|s| s as &dyn Scene)
    }

    fn is_loading(&self, id: SceneId) -> bool {
        matches!(self.registry.slot(id), Some(SceneSlot::Loading))
    }

    fn resize(&mut self, width: f32, height: f32) {
        if self.size != [width, height] {
            self.size = [width, height];
            for (_, scene) in self.registry.ready_mut() {
                scene.set_resolution(width, height);
            }
        }
    }

    fn reload(&mut self, file_name: &str) {
        self.reload_file(file_name);
    }

    fn release(&mut self) {
        self.registry.release_all();
        self.quad.release(self.gl.as_ref());
    }
}

#[cfg(test)]
impl StagePaint for crate::gpu::mock::MockGl {
    fn paint(gl: &Arc<Self>, canvas: &Canvas<'_>, draw: QuadDraw<u32, crate::gpu::mock::MockLocation, u32>, seconds: f32) {
        draw.execute(gl.as_ref(), seconds, [canvas.rect.left(), canvas.rect.top()]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MemoryAssets;
    use crate::gpu::mock::MockGl;
    use crate::settings::SettingNode;
    use std::time::Duration;

    const SCENE_A: &str = r#"{
        "name": "A", "fileName": "a.glsl", "debugOnly": false,
        "uniforms": [{"type": "float", "name": "Speed", "accessor": "uSpeed", "init": 1.0}]
    }"#;
    const SOURCE_A: &str = "uniform float uSpeed;\nout vec4 color;\nvoid main() { color = vec4(uSpeed); }\n";

    const SCENE_B: &str = r#"{
        "name": "B", "fileName": "b.glsl", "time": "uTime", "resolution": "uRes", "debugOnly": true,
        "uniforms": []
    }"#;
    const SOURCE_B: &str = "uniform float uTime;\nuniform vec2 uRes;\nvoid main() {}\n";

    fn assets() -> MemoryAssets {
        MemoryAssets::default()
            .with("a.json", SCENE_A)
            .with("a.glsl", SOURCE_A)
            .with("b.json", SCENE_B)
            .with("b.glsl", SOURCE_B)
    }

    fn index() -> ShaderIndex {
        ShaderIndex::parse(r#"{"webgl": [{"id": 1, "file": "a.json"}, {"id": 2, "file": "b.json"}]}"#).unwrap()
    }

    fn wait_for(renderer: &mut WebGlRenderer<MockGl>, id: SceneId) {
        for _ in 0..500 {
            renderer.drain();
            if !matches!(renderer.registry.slot(id), Some(SceneSlot::Loading)) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("scene {id} never finished loading");
    }

    #[test]
    fn float_uniform_round_trips_into_the_next_draw() {
        let gl = Arc::new(MockGl::new());
        let renderer = WebGlRenderer::new(gl.clone(), Arc::new(assets()), &index(), Some(1)).unwrap();

        let scene = renderer.scene(1).expect("initial scene is loaded eagerly");
        let objects = scene.objects();
        assert_eq!(objects.len(), 1);
        let SettingNode::Float(speed) = &objects[0].settings[0] else {
            panic!("expected a float node, got {:?}", objects[0].settings);
        };
        assert_eq!(speed.value, 1.0);
        assert_eq!(speed.set(2.5), 2.5);

        let ctx = egui::Context::default();
        let painter = egui::Painter::new(ctx, egui::LayerId::background(), egui::Rect::EVERYTHING);
        scene.draw(
            &Canvas {
                painter: &painter,
                rect: egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(10.0, 10.0)),
            },
            0.0,
        );
        let program = renderer.registry.get(1).unwrap().program();
        assert_eq!(gl.draws().last().map(|d| d.0), Some(program));
        assert_eq!(gl.float_uniform(program, "uSpeed"), Some(vec![2.5]));
    }

    #[test]
    fn other_scenes_arrive_in_the_background() {
        let gl = Arc::new(MockGl::new());
        let mut renderer = WebGlRenderer::new(gl.clone(), Arc::new(assets()), &index(), Some(1)).unwrap();
        wait_for(&mut renderer, 2);

        let scenes = renderer.scenes();
        assert_eq!(scenes.len(), 2);
        assert!(scenes.iter().all(|s| s.ready));
        assert_eq!((scenes[1].name.as_str(), scenes[1].debug_only), ("B", true));

        renderer.resize(640.0, 480.0);
        let program = renderer.registry.get(2).unwrap().program();
        assert_eq!(gl.float_uniform(program, "uRes"), Some(vec![640.0, 480.0]));

        renderer.registry.get(2).unwrap().draw_call().execute(gl.as_ref(), 1.5, [0.0, 0.0]);
        assert_eq!(gl.float_uniform(program, "uTime"), Some(vec![1.5]));
    }

    #[test]
    fn origin_uniform_follows_the_stage_corner() {
        let described = r#"{
            "name": "C", "fileName": "c.glsl", "resolution": "uRes", "origin": "uOrigin", "debugOnly": false,
            "uniforms": []
        }"#;
        let source = "uniform vec2 uRes;\nuniform vec2 uOrigin;\nvoid main() {}\n";
        let assets = MemoryAssets::default().with("c.json", described).with("c.glsl", source);
        let index = ShaderIndex::parse(r#"{"webgl": [{"id": 3, "file": "c.json"}]}"#).unwrap();
        let gl = Arc::new(MockGl::new());
        let renderer = WebGlRenderer::new(gl.clone(), Arc::new(assets), &index, None).unwrap();

        let ctx = egui::Context::default();
        let painter = egui::Painter::new(ctx, egui::LayerId::background(), egui::Rect::EVERYTHING);
        let stage = egui::Rect::from_min_size(egui::pos2(220.0, 16.0), egui::vec2(100.0, 50.0));
        renderer.scene(3).expect("loaded").draw(&Canvas { painter: &painter, rect: stage }, 0.0);

        let program = renderer.registry.get(3).unwrap().program();
        assert_eq!(gl.float_uniform(program, "uOrigin"), Some(vec![220.0, 16.0]));
    }

    #[test]
    fn missing_origin_accessor_fails_the_scene() {
        let described = r#"{"name": "C", "fileName": "c.glsl", "origin": "uOrigin", "debugOnly": false, "uniforms": []}"#;
        let assets = MemoryAssets::default().with("c.json", described).with("c.glsl", "void main() {}\n");
        let index = ShaderIndex::parse(r#"{"webgl": [{"id": 3, "file": "c.json"}]}"#).unwrap();
        let gl = Arc::new(MockGl::new());
        let renderer = WebGlRenderer::new(gl.clone(), Arc::new(assets), &index, None).unwrap();
        assert!(renderer.scene(3).is_none());
        assert_eq!(gl.live_program_count(), 0);
    }

    #[test]
    fn unknown_initial_id_falls_back_to_first_entry() {
        let gl = Arc::new(MockGl::new());
        let renderer = WebGlRenderer::new(gl, Arc::new(assets()), &index(), Some(42)).unwrap();
        assert_eq!(renderer.initial_scene(), Some(1));
        assert!(renderer.scene(1).is_some());
    }

    #[test]
    fn failed_scene_stays_unloaded_and_others_survive() {
        let broken = assets().with("a.glsl", "uniform float uOther;\nvoid main() {}\n");
        let gl = Arc::new(MockGl::new());
        let mut renderer = WebGlRenderer::new(gl.clone(), Arc::new(broken), &index(), Some(1)).unwrap();
        assert!(renderer.scene(1).is_none());
        assert!(matches!(renderer.registry.slot(1), Some(SceneSlot::Unloaded)));
        // The program built before the lookup failed is gone again.
        wait_for(&mut renderer, 2);
        assert_eq!(gl.live_program_count(), 1);
        assert!(renderer.scene(2).is_some());
    }

    #[test]
    fn failed_initial_load_leaves_no_initial_scene_and_can_be_retried() {
        let missing_source = MemoryAssets::default()
            .with("a.json", SCENE_A)
            .with("b.json", SCENE_B)
            .with("b.glsl", SOURCE_B);
        let gl = Arc::new(MockGl::new());
        let mut renderer = WebGlRenderer::new(gl, Arc::new(missing_source), &index(), Some(1)).unwrap();
        assert_eq!(renderer.initial_scene(), None);
        assert!(renderer.scene(1).is_none());
        assert!(!renderer.is_loading(1));

        renderer.request_scene(1);
        assert!(renderer.is_loading(1));
        wait_for(&mut renderer, 1);
        assert!(matches!(renderer.registry.slot(1), Some(SceneSlot::Unloaded)));
        assert!(!renderer.is_loading(1));
    }

    #[test]
    fn repeated_requests_start_one_fetch() {
        let gl = Arc::new(MockGl::new());
        let mut renderer = WebGlRenderer::new(gl.clone(), Arc::new(assets()), &index(), Some(1)).unwrap();
        renderer.request_scene(2);
        renderer.request_scene(2);
        wait_for(&mut renderer, 2);
        std::thread::sleep(Duration::from_millis(20));
        renderer.drain();
        assert_eq!(gl.live_program_count(), 2);
    }

    #[test]
    fn reload_swaps_program_and_release_frees_everything() {
        let gl = Arc::new(MockGl::new());
        let mut renderer = WebGlRenderer::new(gl.clone(), Arc::new(assets()), &index(), Some(1)).unwrap();
        wait_for(&mut renderer, 2);
        let before = renderer.registry.get(1).unwrap().program();

        renderer.reload_file("a.glsl");
        assert!(matches!(renderer.registry.slot(1), Some(SceneSlot::Reloading(_))));
        for _ in 0..500 {
            renderer.drain();
            if matches!(renderer.registry.slot(1), Some(SceneSlot::Ready(_))) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        let after = renderer.registry.get(1).unwrap().program();
        assert_ne!(before, after);
        assert_eq!(gl.live_program_count(), 2);

        Renderer::release(&mut renderer);
        assert_eq!(gl.live_program_count(), 0);
        assert_eq!(gl.live_mesh_count(), 0);
    }
}
