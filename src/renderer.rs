//! The contract shared by the background shader renderer and the two overlay
//! renderers, plus the name-keyed set the app switches between.

use crate::schema::SceneId;
use crate::settings::SettingNode;

pub type ObjectId = u32;

/// Frees GPU or texture resources owned by a value. Must be safe to call twice.
pub trait Release {
    fn release(&mut self);
}

/// The stage area a layer draws into.
pub struct Canvas<'a> {
    pub painter: &'a egui::Painter,
    pub rect: egui::Rect,
}

impl Canvas<'_> {
    pub fn size(&self) -> egui::Vec2 {
        self.rect.size()
    }

    pub fn center(&self) -> egui::Pos2 {
        self.rect.center()
    }
}

/// One selectable entry of a scene, as listed in the side panel.
pub struct SceneObject {
    pub name: String,
    pub id: ObjectId,
    pub settings: Vec<SettingNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSummary {
    pub id: SceneId,
    pub name: String,
    pub debug_only: bool,
    pub ready: bool,
}

pub trait Scene: Release {
    fn name(&self) -> &str;
    fn debug_only(&self) -> bool;
    /// Stage size in physical pixels.
    fn resize(&mut self, width: f32, height: f32);
    fn objects(&self) -> Vec<SceneObject>;
    fn draw(&self, canvas: &Canvas<'_>, seconds: f64);
}

pub trait Renderer {
    fn name(&self) -> &'static str;

    /// Folds finished background work into the renderer. Returns true when
    /// a scene became ready.
    fn poll(&mut self, ctx: &egui::Context) -> bool;

    fn scenes(&self) -> Vec<SceneSummary>;

    /// Starts loading `id` unless it is loaded or already loading.
    fn request_scene(&mut self, id: SceneId);

    fn scene(&self, id: SceneId) -> Option<&dyn Scene>;

    /// True while a first load of `id` is in flight.
    fn is_loading(&self, _id: SceneId) -> bool {
        false
    }

    fn resize(&mut self, width: f32, height: f32);

    /// Called when an asset file changed on disk.
    fn reload(&mut self, _file_name: &str) {}

    fn release(&mut self);
}

/// Renderers available to one layer, looked up by name.
pub struct RendererSet {
    renderers: Vec<Box<dyn Renderer>>,
}

impl RendererSet {
    pub fn new(renderers: Vec<Box<dyn Renderer>>) -> Self {
        Self { renderers }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.renderers.iter().map(|r| r.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Renderer> {
        self.renderers.iter().find(|r| r.name() == name).map(|r| r.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Renderer + 'static)> {
        self.renderers.iter_mut().find(|r| r.name() == name).map(|r| r.as_mut())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Renderer>> {
        self.renderers.iter_mut()
    }
}
