//! Shader descriptions: the uniform schema, its validator, and the index
//! that maps scene ids to description files.
//!
//! Descriptions come from disk and are untrusted, so they are checked by a
//! recursive-descent walk over `serde_json::Value` rather than derived
//! deserialization; every failure carries the path of the offending element.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::color::Color;
use crate::errors::SchemaError;

pub type SceneId = u32;

#[derive(Debug, Clone, PartialEq)]
pub enum UniformDescriptor {
    Color {
        name: String,
        accessor: String,
        initial: Color,
    },
    Int {
        name: String,
        accessor: String,
        initial: i32,
        min: Option<f64>,
        max: Option<f64>,
    },
    Float {
        name: String,
        accessor: String,
        initial: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    Group {
        name: String,
        children: Vec<UniformDescriptor>,
    },
}

impl UniformDescriptor {
    /// Shader-side identifier; groups have none.
    #[cfg(test)]
    pub fn accessor(&self) -> Option<&str> {
        match self {
            UniformDescriptor::Color { accessor, .. }
            | UniformDescriptor::Int { accessor, .. }
            | UniformDescriptor::Float { accessor, .. } => Some(accessor),
            UniformDescriptor::Group { .. } => None,
        }
    }

    pub fn from_json(value: &Value, path: &str) -> Result<Self, SchemaError> {
        let obj = as_object(value, path)?;
        let kind = required_str(obj, path, "type")?;
        match kind {
            "color" => {
                let init = initial_field(obj, path)?;
                let init = init.as_str().ok_or_else(|| wrong_type(path, "init", "a string"))?;
                let initial = Color::from_hex(init).map_err(|_| SchemaError::BadColor {
                    path: path.to_string(),
                    value: init.to_string(),
                })?;
                Ok(UniformDescriptor::Color {
                    name: required_str(obj, path, "name")?.to_string(),
                    accessor: required_str(obj, path, "accessor")?.to_string(),
                    initial,
                })
            }
            "int" | "float" => {
                let name = required_str(obj, path, "name")?.to_string();
                let accessor = required_str(obj, path, "accessor")?.to_string();
                let initial = initial_field(obj, path)?
                    .as_f64()
                    .ok_or_else(|| wrong_type(path, "init", "a number"))?;
                let min = optional_number(obj, path, "min")?;
                let max = optional_number(obj, path, "max")?;
                if kind == "int" {
                    Ok(UniformDescriptor::Int {
                        name,
                        accessor,
                        initial: initial.trunc() as i32,
                        min,
                        max,
                    })
                } else {
                    Ok(UniformDescriptor::Float {
                        name,
                        accessor,
                        initial,
                        min,
                        max,
                    })
                }
            }
            "multi" => {
                let name = required_str(obj, path, "name")?.to_string();
                let settings = required_array(obj, path, "settings")?;
                let children = parse_list(settings, &format!("{path}.settings"))?;
                Ok(UniformDescriptor::Group { name, children })
            }
            other => Err(SchemaError::UnknownType {
                path: path.to_string(),
                found: other.to_string(),
            }),
        }
    }
}

/// True iff `value` is a well-formed uniform descriptor. Never panics.
#[cfg(test)]
pub fn is_uniform(value: &Value) -> bool {
    UniformDescriptor::from_json(value, "$").is_ok()
}

/// Parses every element, stopping at the first one that fails.
fn parse_list(items: &[Value], path: &str) -> Result<Vec<UniformDescriptor>, SchemaError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| UniformDescriptor::from_json(item, &format!("{path}[{i}]")))
        .collect()
}

/// The per-scene description file.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderInfo {
    pub name: String,
    pub file_name: String,
    pub time: Option<String>,
    pub resolution: Option<String>,
    /// Receives the stage's lower-left corner in framebuffer pixels, so
    /// `gl_FragCoord.xy - origin` is stage-relative.
    pub origin: Option<String>,
    pub debug_only: bool,
    pub uniforms: Vec<UniformDescriptor>,
}

impl ShaderInfo {
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value)
    }

    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        let path = "$";
        let obj = as_object(value, path)?;
        let debug_only = match obj.get("debugOnly") {
            None => return Err(missing(path, "debugOnly")),
            Some(v) => v.as_bool().ok_or_else(|| wrong_type(path, "debugOnly", "a boolean"))?,
        };
        Ok(Self {
            name: required_str(obj, path, "name")?.to_string(),
            file_name: required_str(obj, path, "fileName")?.to_string(),
            time: optional_str(obj, path, "time")?,
            resolution: optional_str(obj, path, "resolution")?,
            origin: optional_str(obj, path, "origin")?,
            debug_only,
            uniforms: parse_list(required_array(obj, path, "uniforms")?, &format!("{path}.uniforms"))?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawIndex {
    webgl: Vec<RawIndexEntry>,
}

#[derive(Debug, Deserialize)]
struct RawIndexEntry {
    id: SceneId,
    file: String,
}

/// Scene id → description file name. Ids are authoritative, list order is not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShaderIndex {
    pub webgl: BTreeMap<SceneId, String>,
}

impl ShaderIndex {
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let raw: RawIndex = serde_json::from_str(text)?;
        let mut webgl = BTreeMap::new();
        for entry in raw.webgl {
            if webgl.insert(entry.id, entry.file).is_some() {
                return Err(SchemaError::DuplicateSceneId(entry.id));
            }
        }
        Ok(Self { webgl })
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Map<String, Value>, SchemaError> {
    value.as_object().ok_or_else(|| SchemaError::NotAnObject {
        path: path.to_string(),
    })
}

fn missing(path: &str, field: &'static str) -> SchemaError {
    SchemaError::MissingField {
        path: path.to_string(),
        field,
    }
}

fn wrong_type(path: &str, field: &'static str, expected: &'static str) -> SchemaError {
    SchemaError::WrongType {
        path: path.to_string(),
        field,
        expected,
    }
}

fn required_str<'a>(
    obj: &'a Map<String, Value>,
    path: &str,
    field: &'static str,
) -> Result<&'a str, SchemaError> {
    obj.get(field)
        .ok_or_else(|| missing(path, field))?
        .as_str()
        .ok_or_else(|| wrong_type(path, field, "a string"))
}

fn optional_str(
    obj: &Map<String, Value>,
    path: &str,
    field: &'static str,
) -> Result<Option<String>, SchemaError> {
    match obj.get(field) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| wrong_type(path, field, "a string")),
    }
}

fn optional_number(
    obj: &Map<String, Value>,
    path: &str,
    field: &'static str,
) -> Result<Option<f64>, SchemaError> {
    match obj.get(field) {
        None => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| wrong_type(path, field, "a number")),
    }
}

fn required_array<'a>(
    obj: &'a Map<String, Value>,
    path: &str,
    field: &'static str,
) -> Result<&'a [Value], SchemaError> {
    obj.get(field)
        .ok_or_else(|| missing(path, field))?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| wrong_type(path, field, "a list"))
}

fn initial_field<'a>(obj: &'a Map<String, Value>, path: &str) -> Result<&'a Value, SchemaError> {
    obj.get("init")
        .or_else(|| obj.get("initial"))
        .ok_or_else(|| missing(path, "init"))
}
