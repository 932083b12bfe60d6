//! The slice of the GL API the shader pipeline touches.
//!
//! Implemented for `glow::Context` (desktop GL, GLES, and WebGL2 alike) and,
//! under `cfg(test)`, by an in-memory mock so the binder and registry can be
//! exercised without a driver.

#[cfg(test)]
pub mod mock;

use std::fmt::Debug;

use glow::HasContext as _;

use crate::errors::ShaderStage;

pub trait ShaderContext {
    type Shader: Copy + Debug;
    type Program: Copy + Debug + PartialEq;
    type Location: Clone + Debug;
    type Mesh: Copy + Debug;

    /// `#version` line for sources that do not carry one.
    fn version_header(&self) -> String;
    /// Whether the context expects `in`/`out` rather than `attribute`/`varying`.
    fn modern_interface(&self) -> bool;

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn compile_shader(&self, shader: Self::Shader, source: &str) -> bool;
    fn shader_info_log(&self, shader: Self::Shader) -> String;
    fn delete_shader(&self, shader: Self::Shader);

    fn create_program(&self) -> Result<Self::Program, String>;
    fn attach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn detach_shader(&self, program: Self::Program, shader: Self::Shader);
    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str);
    fn link_program(&self, program: Self::Program) -> bool;
    fn program_info_log(&self, program: Self::Program) -> String;
    fn delete_program(&self, program: Self::Program);
    fn use_program(&self, program: Self::Program);

    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::Location>;
    fn uniform_1_f32(&self, location: &Self::Location, value: f32);
    fn uniform_1_i32(&self, location: &Self::Location, value: i32);
    fn uniform_2_f32(&self, location: &Self::Location, value: [f32; 2]);
    fn uniform_3_f32(&self, location: &Self::Location, value: [f32; 3]);
    fn read_uniform_f32(&self, program: Self::Program, location: &Self::Location, out: &mut [f32]);
    fn read_uniform_i32(&self, program: Self::Program, location: &Self::Location, out: &mut [i32]);

    /// Uploads an indexed mesh whose vertices feed attribute 0 as `vec2`.
    fn create_mesh(&self, vertices: &[f32], indices: &[u8]) -> Result<Self::Mesh, String>;
    fn draw_mesh(&self, mesh: Self::Mesh, index_count: i32);
    fn delete_mesh(&self, mesh: Self::Mesh);
}

/// Vertex array plus the two buffers it references.
#[derive(Debug, Clone, Copy)]
pub struct GlMesh {
    pub vertex_array: glow::VertexArray,
    pub vertex_buffer: glow::Buffer,
    pub index_buffer: glow::Buffer,
}

impl ShaderContext for glow::Context {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Location = glow::UniformLocation;
    type Mesh = GlMesh;

    fn version_header(&self) -> String {
        egui_glow::ShaderVersion::get(self).version_declaration().to_string()
    }

    fn modern_interface(&self) -> bool {
        matches!(
            egui_glow::ShaderVersion::get(self),
            egui_glow::ShaderVersion::Gl140 | egui_glow::ShaderVersion::Es300
        )
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        // SAFETY: the context is current on the render thread for the app's lifetime.
        unsafe { glow::HasContext::create_shader(self, kind) }
    }

    fn compile_shader(&self, shader: Self::Shader, source: &str) -> bool {
        unsafe {
            self.shader_source(shader, source);
            glow::HasContext::compile_shader(self, shader);
            self.get_shader_compile_status(shader)
        }
    }

    fn shader_info_log(&self, shader: Self::Shader) -> String {
        unsafe { self.get_shader_info_log(shader) }
    }

    fn delete_shader(&self, shader: Self::Shader) {
        unsafe { glow::HasContext::delete_shader(self, shader) }
    }

    fn create_program(&self) -> Result<Self::Program, String> {
        unsafe { glow::HasContext::create_program(self) }
    }

    fn attach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { glow::HasContext::attach_shader(self, program, shader) }
    }

    fn detach_shader(&self, program: Self::Program, shader: Self::Shader) {
        unsafe { glow::HasContext::detach_shader(self, program, shader) }
    }

    fn bind_attrib_location(&self, program: Self::Program, index: u32, name: &str) {
        unsafe { glow::HasContext::bind_attrib_location(self, program, index, name) }
    }

    fn link_program(&self, program: Self::Program) -> bool {
        unsafe {
            glow::HasContext::link_program(self, program);
            self.get_program_link_status(program)
        }
    }

    fn program_info_log(&self, program: Self::Program) -> String {
        unsafe { self.get_program_info_log(program) }
    }

    fn delete_program(&self, program: Self::Program) {
        unsafe { glow::HasContext::delete_program(self, program) }
    }

    fn use_program(&self, program: Self::Program) {
        unsafe { glow::HasContext::use_program(self, Some(program)) }
    }

    fn uniform_location(&self, program: Self::Program, name: &str) -> Option<Self::Location> {
        unsafe { self.get_uniform_location(program, name) }
    }

    fn uniform_1_f32(&self, location: &Self::Location, value: f32) {
        unsafe { glow::HasContext::uniform_1_f32(self, Some(location), value) }
    }

    fn uniform_1_i32(&self, location: &Self::Location, value: i32) {
        unsafe { glow::HasContext::uniform_1_i32(self, Some(location), value) }
    }

    fn uniform_2_f32(&self, location: &Self::Location, value: [f32; 2]) {
        unsafe { glow::HasContext::uniform_2_f32(self, Some(location), value[0], value[1]) }
    }

    fn uniform_3_f32(&self, location: &Self::Location, value: [f32; 3]) {
        unsafe { glow::HasContext::uniform_3_f32(self, Some(location), value[0], value[1], value[2]) }
    }

    fn read_uniform_f32(&self, program: Self::Program, location: &Self::Location, out: &mut [f32]) {
        unsafe { self.get_uniform_f32(program, location, out) }
    }

    fn read_uniform_i32(&self, program: Self::Program, location: &Self::Location, out: &mut [i32]) {
        unsafe { self.get_uniform_i32(program, location, out) }
    }

    fn create_mesh(&self, vertices: &[f32], indices: &[u8]) -> Result<Self::Mesh, String> {
        unsafe {
            let vertex_array = self.create_vertex_array()?;
            self.bind_vertex_array(Some(vertex_array));

            let vertex_buffer = self.create_buffer()?;
            self.bind_buffer(glow::ARRAY_BUFFER, Some(vertex_buffer));
            self.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(vertices), glow::STATIC_DRAW);

            // Element buffer binding is captured by the bound vertex array.
            let index_buffer = self.create_buffer()?;
            self.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(index_buffer));
            self.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, indices, glow::STATIC_DRAW);

            self.enable_vertex_attrib_array(0);
            self.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 0, 0);

            self.bind_vertex_array(None);
            self.bind_buffer(glow::ARRAY_BUFFER, None);

            Ok(GlMesh {
                vertex_array,
                vertex_buffer,
                index_buffer,
            })
        }
    }

    fn draw_mesh(&self, mesh: Self::Mesh, index_count: i32) {
        unsafe {
            self.bind_vertex_array(Some(mesh.vertex_array));
            self.draw_elements(glow::TRIANGLE_STRIP, index_count, glow::UNSIGNED_BYTE, 0);
            self.bind_vertex_array(None);
        }
    }

    fn delete_mesh(&self, mesh: Self::Mesh) {
        unsafe {
            self.delete_vertex_array(mesh.vertex_array);
            self.delete_buffer(mesh.vertex_buffer);
            self.delete_buffer(mesh.index_buffer);
        }
    }
}
