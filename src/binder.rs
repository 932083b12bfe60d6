//! Turns validated uniform descriptors into live settings nodes.
//!
//! Every value shown comes from the GPU, never from the description; every
//! setter rebinds its program, uploads, and reads the value back so the
//! caller sees what the driver actually stored.

use std::sync::Arc;

use crate::color::Color;
use crate::errors::LookupError;
use crate::gpu::ShaderContext;
use crate::render_engine::declared_uniforms;
use crate::schema::UniformDescriptor;
use crate::settings::{ColorSetting, GroupSetting, NumberSetting, SettingNode};

/// The program a description's accessors are resolved against.
pub struct ProgramBinding<G: ShaderContext> {
    pub gl: Arc<G>,
    pub program: G::Program,
    /// Fragment source, kept to explain lookup failures.
    pub source: Arc<str>,
}

impl<G: ShaderContext> Clone for ProgramBinding<G> {
    fn clone(&self) -> Self {
        Self {
            gl: self.gl.clone(),
            program: self.program,
            source: self.source.clone(),
        }
    }
}

impl<G: ShaderContext + 'static> ProgramBinding<G> {
    pub fn locate(&self, accessor: &str) -> Result<G::Location, LookupError> {
        self.gl
            .uniform_location(self.program, accessor)
            .ok_or_else(|| LookupError {
                accessor: accessor.to_string(),
                declared: declared_uniforms(&self.source).into_iter().map(|u| u.name).collect(),
            })
    }

    /// Writes each descriptor's `init` value. Used once, when the scene is built.
    pub fn seed(&self, descriptor: &UniformDescriptor) -> Result<(), LookupError> {
        let gl = &self.gl;
        gl.use_program(self.program);
        match descriptor {
            UniformDescriptor::Color { accessor, initial, .. } => {
                gl.uniform_3_f32(&self.locate(accessor)?, initial.to_floats());
            }
            UniformDescriptor::Int { accessor, initial, .. } => {
                gl.uniform_1_i32(&self.locate(accessor)?, *initial);
            }
            UniformDescriptor::Float { accessor, initial, .. } => {
                gl.uniform_1_f32(&self.locate(accessor)?, *initial as f32);
            }
            UniformDescriptor::Group { children, .. } => {
                for child in children {
                    self.seed(child)?;
                }
            }
        }
        Ok(())
    }

    /// Builds the settings node mirroring `descriptor`.
    pub fn bind(&self, descriptor: &UniformDescriptor) -> Result<SettingNode, LookupError> {
        match descriptor {
            UniformDescriptor::Color { name, accessor, .. } => {
                let location = self.locate(accessor)?;
                let value = self.read_color(&location);
                let this = self.clone();
                Ok(SettingNode::Color(ColorSetting::new(name.clone(), value, move |input: Color| {
                    this.gl.use_program(this.program);
                    this.gl.uniform_3_f32(&location, input.to_floats());
                    this.read_color(&location)
                })))
            }
            UniformDescriptor::Int { name, accessor, min, max, .. } => {
                let location = self.locate(accessor)?;
                let value = self.read_int(&location);
                let this = self.clone();
                let node = NumberSetting::new(name.clone(), value, move |input: i32| {
                    this.gl.use_program(this.program);
                    this.gl.uniform_1_i32(&location, input);
                    this.read_int(&location)
                });
                Ok(SettingNode::Int(node.with_bounds(*min, *max)))
            }
            UniformDescriptor::Float { name, accessor, min, max, .. } => {
                let location = self.locate(accessor)?;
                let value = self.read_float(&location);
                let this = self.clone();
                let node = NumberSetting::new(name.clone(), value, move |input: f64| {
                    this.gl.use_program(this.program);
                    this.gl.uniform_1_f32(&location, input as f32);
                    this.read_float(&location)
                });
                Ok(SettingNode::Float(node.with_bounds(*min, *max)))
            }
            UniformDescriptor::Group { name, children } => {
                let children = children
                    .iter()
                    .map(|child| self.bind(child))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SettingNode::Group(GroupSetting::new(name.clone(), children)))
            }
        }
    }

    pub fn bind_all(&self, descriptors: &[UniformDescriptor]) -> Result<Vec<SettingNode>, LookupError> {
        descriptors.iter().map(|d| self.bind(d)).collect()
    }

    fn read_color(&self, location: &G::Location) -> Color {
        let mut out = [0.0f32; 3];
        self.gl.use_program(self.program);
        self.gl.read_uniform_f32(self.program, location, &mut out);
        Color::from_floats(out)
    }

    fn read_int(&self, location: &G::Location) -> i32 {
        let mut out = [0i32; 1];
        self.gl.use_program(self.program);
        self.gl.read_uniform_i32(self.program, location, &mut out);
        out[0]
    }

    fn read_float(&self, location: &G::Location) -> f64 {
        let mut out = [0.0f32; 1];
        self.gl.use_program(self.program);
        self.gl.read_uniform_f32(self.program, location, &mut out);
        out[0] as f64
    }
}
