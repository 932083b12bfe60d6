use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use crate::renderer::{ObjectId, SceneObject};
use crate::schema::SceneId;

/// Stage layers, in compositing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Background,
    Image,
    Text,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Background, Layer::Image, Layer::Text];

    pub fn label(self) -> &'static str {
        match self {
            Layer::Background => "Background",
            Layer::Image => "Image",
            Layer::Text => "Text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    SwitchRenderer(String),
    SwitchScene(SceneId),
    SwitchObject(ObjectId),
    SwitchLayer(Layer),
    /// A renderer's set of ready scenes grew.
    SceneAdded,
    /// Something the panel lists changed; selection stays as it is.
    ObjectUpdated,
}

/// The queue UI callbacks post to. Only the frame loop consumes it.
#[derive(Debug, Clone, Default)]
pub struct Messenger {
    queue: Rc<RefCell<VecDeque<StateChange>>>,
}

impl Messenger {
    pub fn push(&self, change: StateChange) {
        self.queue.borrow_mut().push_back(change);
    }

    pub fn next(&self) -> Option<StateChange> {
        self.queue.borrow_mut().pop_front()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneState {
    pub active_object: Option<ObjectId>,
}

#[derive(Debug, Clone, Default)]
pub struct RendererState {
    /// Scene being drawn.
    pub active_scene: Option<SceneId>,
    /// Scene the user picked that is not ready yet.
    pub pending_scene: Option<SceneId>,
    pub scenes: BTreeMap<SceneId, SceneState>,
}

impl RendererState {
    pub fn starting_at(scene: Option<SceneId>) -> Self {
        Self {
            active_scene: scene,
            ..Self::default()
        }
    }

    /// Makes the pending scene active once `is_ready` says it can be drawn.
    /// A pending scene that is neither ready nor loading failed to load and
    /// is dropped. Returns true when the active scene changed.
    pub fn settle_pending(
        &mut self,
        is_ready: impl Fn(SceneId) -> bool,
        is_loading: impl Fn(SceneId) -> bool,
    ) -> bool {
        let Some(id) = self.pending_scene else {
            return false;
        };
        if is_ready(id) {
            self.active_scene = Some(id);
            self.pending_scene = None;
            return true;
        }
        if !is_loading(id) {
            log::warn!("scene {id} failed to load, keeping {:?}", self.active_scene);
            self.pending_scene = None;
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct LayerState {
    pub active_renderer: String,
    pub renderers: BTreeMap<String, RendererState>,
}

impl LayerState {
    pub fn new(renderer: &str, scene: Option<SceneId>) -> Self {
        Self {
            active_renderer: renderer.to_string(),
            renderers: BTreeMap::from([(renderer.to_string(), RendererState::starting_at(scene))]),
        }
    }

    pub fn renderer(&self) -> Option<&RendererState> {
        self.renderers.get(&self.active_renderer)
    }

    pub fn renderer_mut(&mut self) -> &mut RendererState {
        self.renderers.entry(self.active_renderer.clone()).or_default()
    }
}

/// Everything the frame loop and the side panel agree on.
#[derive(Debug, Clone)]
pub struct AppState {
    pub layer: Layer,
    pub layers: BTreeMap<Layer, LayerState>,
    pub debug: bool,
    pub time: f64,
    pub auto_time: bool,
    /// Bumped whenever the panel should rebuild from fresh renderer state.
    pub revision: u64,
}

impl AppState {
    pub fn new(layers: BTreeMap<Layer, LayerState>, debug: bool) -> Self {
        Self {
            layer: Layer::Background,
            layers,
            debug,
            time: 0.0,
            auto_time: true,
            revision: 0,
        }
    }

    pub fn current(&self) -> Option<&LayerState> {
        self.layers.get(&self.layer)
    }

    pub fn current_mut(&mut self) -> Option<&mut LayerState> {
        self.layers.get_mut(&self.layer)
    }

    /// Selected object of the current layer's active scene.
    pub fn selected_object(&self) -> Option<ObjectId> {
        let renderer = self.current()?.renderer()?;
        renderer.scenes.get(&renderer.active_scene?)?.active_object
    }
}

/// Work a message leaves for the caller, which owns the renderers.
#[derive(Debug, Clone, PartialEq)]
pub enum Followup {
    LoadScene { layer: Layer, renderer: String, scene: SceneId },
}

pub fn handle_message(state: &mut AppState, change: StateChange) -> Option<Followup> {
    let layer = state.layer;
    match change {
        StateChange::SwitchLayer(next) => {
            state.layer = next;
            None
        }
        StateChange::SwitchRenderer(name) => {
            let current = state.current_mut()?;
            current.renderers.entry(name.clone()).or_default();
            current.active_renderer = name;
            None
        }
        StateChange::SwitchScene(scene) => {
            let current = state.current_mut()?;
            let renderer = current.active_renderer.clone();
            let slot = current.renderer_mut();
            // Loaded scenes ignore the request; failed ones retry.
            slot.pending_scene = (slot.active_scene != Some(scene)).then_some(scene);
            Some(Followup::LoadScene { layer, renderer, scene })
        }
        StateChange::SwitchObject(object) => {
            let slot = state.current_mut()?.renderer_mut();
            let scene = slot.active_scene?;
            slot.scenes.entry(scene).or_default().active_object = Some(object);
            None
        }
        StateChange::SceneAdded | StateChange::ObjectUpdated => {
            state.revision += 1;
            None
        }
    }
}

/// Handles at most one queued message.
pub fn drain_one(state: &mut AppState, events: &Messenger) -> Option<Followup> {
    let change = events.next()?;
    handle_message(state, change)
}

/// Index into `objects` of the selected id, or of the first object when the
/// id is gone.
pub fn resolve_object(selected: Option<ObjectId>, objects: &[SceneObject]) -> Option<usize> {
    selected
        .and_then(|id| objects.iter().position(|o| o.id == id))
        .or(if objects.is_empty() { None } else { Some(0) })
}
