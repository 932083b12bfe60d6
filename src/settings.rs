//! The settings-descriptor tree handed to the side panel.
//!
//! A tree is a snapshot: every leaf carries the value read from the renderer
//! when the tree was built, plus a setter that writes through to the live
//! state and returns what the renderer actually holds afterwards. Trees are
//! rebuilt for every panel render and are never edited in place.

use std::path::PathBuf;
use std::rc::Rc;

use crate::color::Color;
use crate::errors::UiInvariantError;

/// Largest difference between a requested and a returned number that is not
/// reported as a mismatch.
pub const MISMATCH_TOLERANCE: f64 = 0.01;

pub type Setter<T> = Rc<dyn Fn(T) -> T>;

#[derive(Clone)]
pub enum SettingNode {
    Float(NumberSetting<f64>),
    Int(NumberSetting<i32>),
    Color(ColorSetting),
    Text(TextSetting),
    Dropdown(DropdownSetting),
    Button(ButtonSetting),
    File(FileSetting),
    ImagePreview(ImagePreview),
    Group(GroupSetting),
}

impl SettingNode {
    pub fn name(&self) -> &str {
        match self {
            SettingNode::Float(s) => &s.name,
            SettingNode::Int(s) => &s.name,
            SettingNode::Color(s) => &s.name,
            SettingNode::Text(s) => &s.name,
            SettingNode::Dropdown(s) => &s.name,
            SettingNode::Button(s) => &s.name,
            SettingNode::File(s) => &s.name,
            SettingNode::ImagePreview(s) => &s.name,
            SettingNode::Group(s) => &s.name,
        }
    }

    /// Depth-first search by name, descending into groups.
    #[cfg(test)]
    pub fn find<'a>(nodes: &'a [SettingNode], name: &str) -> Option<&'a SettingNode> {
        nodes.iter().find_map(|node| {
            if node.name() == name {
                Some(node)
            } else if let SettingNode::Group(group) = node {
                SettingNode::find(&group.children, name)
            } else {
                None
            }
        })
    }
}

impl std::fmt::Debug for SettingNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingNode::Float(s) => write!(f, "Float({:?} = {})", s.name, s.value),
            SettingNode::Int(s) => write!(f, "Int({:?} = {})", s.name, s.value),
            SettingNode::Color(s) => write!(f, "Color({:?} = {})", s.name, s.value),
            SettingNode::Text(s) => write!(f, "Text({:?} = {:?})", s.name, s.value),
            SettingNode::Dropdown(s) => write!(f, "Dropdown({:?} = {:?})", s.name, s.active),
            SettingNode::Button(s) => write!(f, "Button({:?})", s.name),
            SettingNode::File(s) => write!(f, "File({:?} = {:?})", s.name, s.path),
            SettingNode::ImagePreview(s) => write!(f, "ImagePreview({:?})", s.name),
            SettingNode::Group(s) => f.debug_tuple("Group").field(&s.name).field(&s.children).finish(),
        }
    }
}

#[derive(Clone)]
pub struct NumberSetting<T> {
    pub name: String,
    pub value: T,
    /// Advisory bounds for the widget; the setter does not enforce them.
    pub min: Option<f64>,
    pub max: Option<f64>,
    setter: Setter<T>,
}

impl<T: Copy + Into<f64>> NumberSetting<T> {
    pub fn new(name: impl Into<String>, value: T, setter: impl Fn(T) -> T + 'static) -> Self {
        Self {
            name: name.into(),
            value,
            min: None,
            max: None,
            setter: Rc::new(setter),
        }
    }

    pub fn with_bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn set(&self, input: T) -> T {
        (self.setter)(input)
    }

    /// Writes `input` and logs a warning when the renderer disagrees.
    pub fn submit(&self, input: T) -> T {
        let actual = self.set(input);
        if let Err(err) = check_number(&self.name, input.into(), actual.into()) {
            log::warn!("{err}");
        }
        actual
    }
}

#[derive(Clone)]
pub struct ColorSetting {
    pub name: String,
    pub value: Color,
    setter: Setter<Color>,
}

impl ColorSetting {
    pub fn new(name: impl Into<String>, value: Color, setter: impl Fn(Color) -> Color + 'static) -> Self {
        Self {
            name: name.into(),
            value,
            setter: Rc::new(setter),
        }
    }

    pub fn set(&self, input: Color) -> Color {
        (self.setter)(input)
    }

    pub fn submit(&self, input: Color) -> Color {
        let actual = self.set(input);
        if actual != input {
            log::warn!(
                "{}",
                UiInvariantError::ColorMismatch {
                    name: self.name.clone(),
                    requested: input,
                    actual,
                }
            );
        }
        actual
    }
}

#[derive(Clone)]
pub struct TextSetting {
    pub name: String,
    pub value: String,
    setter: Setter<String>,
}

impl TextSetting {
    pub fn new(name: impl Into<String>, value: impl Into<String>, setter: impl Fn(String) -> String + 'static) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            setter: Rc::new(setter),
        }
    }

    pub fn set(&self, input: String) -> String {
        (self.setter)(input)
    }

    pub fn submit(&self, input: String) -> String {
        let actual = self.set(input.clone());
        if actual != input {
            log::warn!(
                "{}",
                UiInvariantError::TextMismatch {
                    name: self.name.clone(),
                    requested: input,
                    actual: actual.clone(),
                }
            );
        }
        actual
    }
}

#[derive(Clone)]
pub struct DropdownSetting {
    pub name: String,
    pub options: Vec<String>,
    pub active: String,
    setter: Setter<String>,
}

impl DropdownSetting {
    pub fn new(
        name: impl Into<String>,
        options: &[&str],
        active: impl Into<String>,
        setter: impl Fn(String) -> String + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            options: options.iter().map(|o| o.to_string()).collect(),
            active: active.into(),
            setter: Rc::new(setter),
        }
    }

    pub fn set(&self, input: String) -> String {
        (self.setter)(input)
    }

    pub fn submit(&self, input: String) -> String {
        let actual = self.set(input);
        if let Err(err) = check_option(&self.name, &actual, &self.options) {
            log::warn!("{err}");
        }
        actual
    }
}

#[derive(Clone)]
pub struct ButtonSetting {
    pub name: String,
    push: Rc<dyn Fn()>,
}

impl ButtonSetting {
    pub fn new(name: impl Into<String>, push: impl Fn() + 'static) -> Self {
        Self {
            name: name.into(),
            push: Rc::new(push),
        }
    }

    pub fn push(&self) {
        (self.push)()
    }
}

#[derive(Clone)]
pub struct FileSetting {
    pub name: String,
    /// Path of the currently attached file, empty when nothing is attached.
    pub path: String,
    /// Extensions offered by the file picker.
    pub accept: Vec<String>,
    set: Rc<dyn Fn(Vec<PathBuf>)>,
}

impl FileSetting {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        accept: &[&str],
        set: impl Fn(Vec<PathBuf>) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            accept: accept.iter().map(|a| a.to_string()).collect(),
            set: Rc::new(set),
        }
    }

    pub fn set(&self, files: Vec<PathBuf>) {
        (self.set)(files)
    }
}

#[derive(Clone)]
pub struct ImagePreview {
    pub name: String,
    pub image: Option<(egui::TextureId, egui::Vec2)>,
}

#[derive(Clone)]
pub struct GroupSetting {
    pub name: String,
    pub children: Vec<SettingNode>,
}

impl GroupSetting {
    pub fn new(name: impl Into<String>, children: Vec<SettingNode>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }
}

pub fn check_number(name: &str, requested: f64, actual: f64) -> Result<(), UiInvariantError> {
    if (requested - actual).abs() > MISMATCH_TOLERANCE || requested.is_nan() != actual.is_nan() {
        Err(UiInvariantError::NumberMismatch {
            name: name.to_string(),
            requested,
            actual,
        })
    } else {
        Ok(())
    }
}

pub fn check_option(name: &str, value: &str, options: &[String]) -> Result<(), UiInvariantError> {
    if options.iter().any(|o| o == value) {
        Ok(())
    } else {
        Err(UiInvariantError::NotAnOption {
            name: name.to_string(),
            value: value.to_string(),
            options: options.to_vec(),
        })
    }
}
