//! Shared object model for the text and image layers.
//!
//! A layer holds one scene whose objects are [`Timed`] payloads. The list
//! always ends in exactly one blank object, which is how the user adds new
//! ones: populate the blank and a fresh one is appended on the next render.

pub mod image;
pub mod text;

use std::cell::RefCell;
use std::rc::Rc;

use crate::app::data::{Messenger, StateChange};
use crate::color::Color;
use crate::renderer::{Canvas, ObjectId, Release, Renderer, Scene, SceneObject, SceneSummary};
use crate::schema::SceneId;
use crate::settings::{
    ButtonSetting, ColorSetting, DropdownSetting, GroupSetting, NumberSetting, SettingNode, TextSetting,
};

pub const RENDERER_NAME: &str = "Canvas2D";
const SCENE_ID: SceneId = 0;
const SCENE_NAME: &str = "default";

/// A payload shown for `active` seconds, hidden for `inactive` seconds,
/// repeating, with the cycle shifted by `time_offset`.
#[derive(Debug, Clone, PartialEq)]
pub struct Timed<P> {
    pub payload: P,
    pub active: f64,
    pub inactive: f64,
    pub time_offset: f64,
}

impl<P: Default> Timed<P> {
    pub fn blank() -> Self {
        Self {
            payload: P::default(),
            active: 1.0,
            inactive: 0.0,
            time_offset: 0.0,
        }
    }
}

impl<P> Timed<P> {
    pub fn is_visible(&self, seconds: f64) -> bool {
        let period = self.active + self.inactive;
        if period <= 0.0 || !period.is_finite() {
            return false;
        }
        (seconds + self.time_offset).rem_euclid(period) <= self.active
    }

    /// Negative input is clamped to zero. A value that would leave the cycle
    /// with no length is refused.
    pub fn set_active(&mut self, seconds: f64) -> f64 {
        let seconds = seconds.max(0.0);
        if seconds + self.inactive > 0.0 {
            self.active = seconds;
        }
        self.active
    }

    pub fn set_inactive(&mut self, seconds: f64) -> f64 {
        let seconds = seconds.max(0.0);
        if self.active + seconds > 0.0 {
            self.inactive = seconds;
        }
        self.inactive
    }
}

/// Scale, rotation (degrees) and offset, where an offset of 1 moves the
/// object by half the stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub scale: [f64; 2],
    pub rotation: f64,
    pub offset: [f64; 2],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0],
            rotation: 0.0,
            offset: [0.0, 0.0],
        }
    }
}

/// What a timed object carries.
pub trait Payload: Default + 'static {
    /// Extra state the settings need, shared by all objects of a scene.
    type Context: Clone + 'static;

    /// The timing leaves go this many entries before the end of the
    /// payload's own settings.
    const TIMING_FROM_END: usize;

    fn is_blank(&self) -> bool;
    fn label(&self) -> &str;
    fn transform_mut(&mut self) -> &mut Transform;
    fn settings(&self, handle: &ObjectHandle<Self>, cx: &Self::Context) -> Vec<SettingNode>;
    fn draw(&self, canvas: &Canvas<'_>);
    fn release(&mut self) {}
}

#[derive(Debug)]
pub struct ObjectStore<P> {
    next_id: ObjectId,
    entries: Vec<(ObjectId, Timed<P>)>,
}

impl<P: Payload> ObjectStore<P> {
    pub fn new() -> Self {
        let mut store = Self {
            next_id: 0,
            entries: Vec::new(),
        };
        store.push_blank();
        store
    }

    fn push_blank(&mut self) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push((id, Timed::blank()));
        id
    }

    /// Appends a blank object unless the list already ends in one.
    pub fn append_blank_if_needed(&mut self) -> bool {
        match self.entries.last() {
            Some((_, last)) if last.payload.is_blank() => false,
            _ => {
                self.push_blank();
                true
            }
        }
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut Timed<P>> {
        self.entries.iter_mut().find(|(i, _)| *i == id).map(|(_, o)| o)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<Timed<P>> {
        let at = self.entries.iter().position(|(i, _)| *i == id)?;
        Some(self.entries.remove(at).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ObjectId, Timed<P>)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (ObjectId, Timed<P>)> {
        self.entries.iter_mut()
    }
}

impl<P: Payload> Default for ObjectStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

pub type ObjectList<P> = Rc<RefCell<ObjectStore<P>>>;

/// Lets a setter find its object again by id. Writes to an object that has
/// since been removed are dropped.
pub struct ObjectHandle<P> {
    list: ObjectList<P>,
    id: ObjectId,
    events: Messenger,
}

impl<P> Clone for ObjectHandle<P> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            id: self.id,
            events: self.events.clone(),
        }
    }
}

impl<P: Payload> ObjectHandle<P> {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Timed<P>) -> R) -> Option<R> {
        let result = self.list.borrow_mut().get_mut(self.id).map(f);
        if result.is_none() {
            log::warn!("object {} no longer exists", self.id);
        }
        result
    }

    /// Tells the app that something it lists (a name, the object count) changed.
    pub fn notify(&self) {
        self.events.push(StateChange::ObjectUpdated);
    }

    pub fn number(
        &self,
        name: &str,
        value: f64,
        write: impl Fn(&mut Timed<P>, f64) -> f64 + 'static,
    ) -> NumberSetting<f64> {
        let handle = self.clone();
        NumberSetting::new(name, value, move |input| handle.update(|o| write(o, input)).unwrap_or(input))
    }

    pub fn text(
        &self,
        name: &str,
        value: &str,
        lists: bool,
        write: impl Fn(&mut Timed<P>, String) -> String + 'static,
    ) -> TextSetting {
        let handle = self.clone();
        TextSetting::new(name, value, move |input: String| {
            let actual = handle.update(|o| write(o, input.clone())).unwrap_or(input);
            if lists {
                handle.notify();
            }
            actual
        })
    }

    pub fn color(&self, name: &str, value: Color, write: impl Fn(&mut Timed<P>, Color) -> Color + 'static) -> ColorSetting {
        let handle = self.clone();
        ColorSetting::new(name, value, move |input| handle.update(|o| write(o, input)).unwrap_or(input))
    }

    pub fn dropdown(
        &self,
        name: &str,
        options: &[&str],
        active: &str,
        write: impl Fn(&mut Timed<P>, String) -> String + 'static,
    ) -> DropdownSetting {
        let handle = self.clone();
        DropdownSetting::new(name, options, active, move |input: String| {
            handle.update(|o| write(o, input.clone())).unwrap_or(input)
        })
    }

    /// Scale group, rotation and offset group, in that order.
    pub fn transform_settings(&self, t: &Transform) -> [SettingNode; 3] {
        [
            SettingNode::Group(GroupSetting::new(
                "Scale",
                vec![
                    SettingNode::Float(self.number("Horizontal scale", t.scale[0], |o, v| {
                        o.payload.transform_mut().scale[0] = v;
                        v
                    })),
                    SettingNode::Float(self.number("Vertical scale", t.scale[1], |o, v| {
                        o.payload.transform_mut().scale[1] = v;
                        v
                    })),
                ],
            )),
            SettingNode::Float(self.number("Rotation", t.rotation, |o, v| {
                o.payload.transform_mut().rotation = v;
                v
            })),
            SettingNode::Group(GroupSetting::new(
                "Offset",
                vec![
                    SettingNode::Float(self.number("Horizontal offset", t.offset[0], |o, v| {
                        o.payload.transform_mut().offset[0] = v;
                        v
                    })),
                    SettingNode::Float(self.number("Vertical offset", t.offset[1], |o, v| {
                        o.payload.transform_mut().offset[1] = v;
                        v
                    })),
                ],
            )),
        ]
    }

    fn timing_settings(&self, object: &Timed<P>) -> Vec<SettingNode> {
        vec![
            SettingNode::Float(self.number("Active time", object.active, |o, v| o.set_active(v))),
            SettingNode::Float(self.number("Inactive time", object.inactive, |o, v| o.set_inactive(v))),
            SettingNode::Float(self.number("Time offset", object.time_offset, |o, v| {
                o.time_offset = v;
                o.time_offset
            })),
        ]
    }

    fn remove_button(&self) -> SettingNode {
        let handle = self.clone();
        SettingNode::Button(ButtonSetting::new("Remove", move || {
            let removed = handle.list.borrow_mut().remove(handle.id);
            if let Some(mut object) = removed {
                object.payload.release();
                handle.notify();
            }
        }))
    }
}

/// Stores alpha as given, clamped to the drawable range.
pub fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_nan() { 1.0 } else { alpha.clamp(0.0, 1.0) }
}

pub struct ObjectScene<P: Payload> {
    list: ObjectList<P>,
    events: Messenger,
    cx: P::Context,
}

impl<P: Payload> ObjectScene<P> {
    pub fn new(events: Messenger, cx: P::Context) -> Self {
        Self {
            list: Rc::new(RefCell::new(ObjectStore::new())),
            events,
            cx,
        }
    }

    pub fn list(&self) -> &ObjectList<P> {
        &self.list
    }

    pub fn context(&self) -> &P::Context {
        &self.cx
    }

    fn handle(&self, id: ObjectId) -> ObjectHandle<P> {
        ObjectHandle {
            list: self.list.clone(),
            id,
            events: self.events.clone(),
        }
    }

    /// Only the trailing blank, the slot for the next object, has no Remove.
    fn object_settings(&self, id: ObjectId, object: &Timed<P>, trailing: bool) -> Vec<SettingNode> {
        let handle = self.handle(id);
        let mut settings = object.payload.settings(&handle, &self.cx);
        let at = settings.len().saturating_sub(P::TIMING_FROM_END);
        settings.splice(at..at, handle.timing_settings(object));
        if !(trailing && object.payload.is_blank()) {
            settings.push(handle.remove_button());
        }
        settings
    }
}

impl<P: Payload> Release for ObjectScene<P> {
    fn release(&mut self) {
        for (_, object) in self.list.borrow_mut().iter_mut() {
            object.payload.release();
        }
    }
}

impl<P: Payload> Scene for ObjectScene<P> {
    fn name(&self) -> &str {
        SCENE_NAME
    }

    fn debug_only(&self) -> bool {
        false
    }

    fn resize(&mut self, _width: f32, _height: f32) {}

    fn objects(&self) -> Vec<SceneObject> {
        self.list.borrow_mut().append_blank_if_needed();
        let store = self.list.borrow();
        let last = store.iter().last().map(|(id, _)| *id);
        store
            .iter()
            .map(|(id, object)| SceneObject {
                name: object.payload.label().to_string(),
                id: *id,
                settings: self.object_settings(*id, object, Some(*id) == last),
            })
            .collect()
    }

    fn draw(&self, canvas: &Canvas<'_>, seconds: f64) {
        for (_, object) in self.list.borrow().iter() {
            if !object.payload.is_blank() && object.is_visible(seconds) {
                object.payload.draw(canvas);
            }
        }
    }
}

/// Hooks a payload kind can use to react to frame-level events.
pub trait OverlayPoll: Payload {
    fn poll(_ctx: &egui::Context, _scene: &ObjectScene<Self>) -> bool {
        false
    }
}

/// A renderer with a single, always-ready scene of timed objects.
pub struct OverlayRenderer<P: Payload> {
    scene: ObjectScene<P>,
}

impl<P: Payload> OverlayRenderer<P> {
    pub fn new(events: Messenger, cx: P::Context) -> Self {
        Self {
            scene: ObjectScene::new(events, cx),
        }
    }
}

impl<P: OverlayPoll> Renderer for OverlayRenderer<P> {
    fn name(&self) -> &'static str {
        RENDERER_NAME
    }

    fn poll(&mut self, ctx: &egui::Context) -> bool {
        if P::poll(ctx, &self.scene) {
            self.scene.events.push(StateChange::ObjectUpdated);
        }
        false
    }

    fn scenes(&self) -> Vec<SceneSummary> {
        vec![SceneSummary {
            id: SCENE_ID,
            name: self.scene.name().to_string(),
            debug_only: self.scene.debug_only(),
            ready: true,
        }]
    }

    fn request_scene(&mut self, _id: SceneId) {}

    fn scene(&self, id: SceneId) -> Option<&dyn Scene> {
        (id == SCENE_ID).then_some(&self.scene as &dyn Scene)
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.scene.resize(width, height);
    }

    fn release(&mut self) {
        self.scene.release();
    }
}

/// Corners of a `size` rectangle centred on `center`, scaled and rotated
/// about that centre. Order: top-left, top-right, bottom-right, bottom-left.
pub fn placed_quad(center: egui::Pos2, size: egui::Vec2, transform: &Transform) -> [egui::Pos2; 4] {
    let half = egui::vec2(size.x * transform.scale[0] as f32, size.y * transform.scale[1] as f32) * 0.5;
    let rot = egui::emath::Rot2::from_angle((transform.rotation as f32).to_radians());
    [
        egui::vec2(-half.x, -half.y),
        egui::vec2(half.x, -half.y),
        egui::vec2(half.x, half.y),
        egui::vec2(-half.x, half.y),
    ]
    .map(|corner| center + rot * corner)
}

/// Stage position an object is centred on.
pub fn anchor(canvas: &Canvas<'_>, transform: &Transform) -> egui::Pos2 {
    let half = canvas.size() * 0.5;
    canvas.center() + egui::vec2(transform.offset[0] as f32 * half.x, transform.offset[1] as f32 * half.y)
}
