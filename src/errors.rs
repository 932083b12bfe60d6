use std::path::PathBuf;

use thiserror::Error;

use crate::color::Color;

/// A shader description (or index) that does not match the expected shape.
/// `path` points at the offending JSON element, e.g. `uniforms[2].settings[0]`.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: expected an object")]
    NotAnObject { path: String },
    #[error("{path}: missing field `{field}`")]
    MissingField { path: String, field: &'static str },
    #[error("{path}: field `{field}` must be {expected}")]
    WrongType {
        path: String,
        field: &'static str,
        expected: &'static str,
    },
    #[error("{path}: unknown uniform type `{found}`")]
    UnknownType { path: String, found: String },
    #[error("{path}: `{value}` is not a hex color")]
    BadColor { path: String, value: String },
    #[error("shader index lists scene id {0} more than once")]
    DuplicateSceneId(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage} shader failed to compile:\n{log}")]
    Compile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    Link { log: String },
    #[error("GPU resource allocation failed: {0}")]
    Resource(String),
}

/// Reading an asset failed before any parsing happened.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The description names a uniform the linked program does not expose.
#[derive(Debug, Error)]
#[error("uniform `{accessor}` not found in program (shader declares: {})", declared_list(.declared))]
pub struct LookupError {
    pub accessor: String,
    pub declared: Vec<String>,
}

fn declared_list(declared: &[String]) -> String {
    if declared.is_empty() {
        "nothing".to_string()
    } else {
        declared.join(", ")
    }
}

#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// A setter reported a value other than the one requested. Never fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UiInvariantError {
    #[error("`{name}`: requested {requested} but the renderer holds {actual}")]
    NumberMismatch {
        name: String,
        requested: f64,
        actual: f64,
    },
    #[error("`{name}`: requested {requested} but the renderer holds {actual}")]
    ColorMismatch {
        name: String,
        requested: Color,
        actual: Color,
    },
    #[error("`{name}`: requested {requested:?} but the renderer holds {actual:?}")]
    TextMismatch {
        name: String,
        requested: String,
        actual: String,
    },
    #[error("`{name}`: `{value}` is not one of {options:?}")]
    NotAnOption {
        name: String,
        value: String,
        options: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no file selected")]
    NoFile,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no glow context available; the stage needs the glow renderer")]
    NoGlContext,
    #[error(transparent)]
    Shader(#[from] ShaderError),
}
