use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{ShaderError, ShaderStage};
use crate::gpu::ShaderContext;

/// Attribute slot the shared quad feeds; bound before linking so one vertex
/// array serves every program.
pub const POSITION_ATTRIBUTE: (u32, &str) = (0, "vertPos");

/// Full-screen quad in clip space, two triangles via a strip.
const QUAD_VERTICES: [f32; 8] = [1.0, 1.0, -1.0, 1.0, -1.0, -1.0, 1.0, -1.0];
const QUAD_INDICES: [u8; 4] = [3, 0, 2, 1];

/// Shared vertex stage: forwards the 2D position as clip-space coordinates.
pub fn vertex_shader_source<G: ShaderContext>(gl: &G) -> String {
    let input = if gl.modern_interface() { "in" } else { "attribute" };
    format!(
        "{}\n{input} vec2 {};\nvoid main() {{\n    gl_Position = vec4({}, 0.0, 1.0);\n}}\n",
        gl.version_header(),
        POSITION_ATTRIBUTE.1,
        POSITION_ATTRIBUTE.1,
    )
}

/// Prepends the context's `#version` line unless the source declares its own.
pub fn with_version_header<G: ShaderContext>(gl: &G, source: &str) -> String {
    if source.trim_start().starts_with("#version") {
        source.to_string()
    } else {
        format!("{}\n{}", gl.version_header(), source)
    }
}

/// Compiles both stages and links them. The link status is always checked;
/// on any failure every object created so far is deleted again.
pub fn build_program<G: ShaderContext>(
    gl: &G,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<G::Program, ShaderError> {
    let program = gl.create_program().map_err(ShaderError::Resource)?;

    let stages = [
        (ShaderStage::Vertex, vertex_source.to_string()),
        (ShaderStage::Fragment, with_version_header(gl, fragment_source)),
    ];
    let mut shaders = Vec::with_capacity(stages.len());

    for (stage, source) in stages {
        let shader = match gl.create_shader(stage) {
            Ok(shader) => shader,
            Err(e) => {
                discard(gl, program, &shaders);
                return Err(ShaderError::Resource(e));
            }
        };
        if !gl.compile_shader(shader, &source) {
            let log = gl.shader_info_log(shader);
            gl.delete_shader(shader);
            discard(gl, program, &shaders);
            return Err(ShaderError::Compile { stage, log });
        }
        gl.attach_shader(program, shader);
        shaders.push(shader);
    }

    gl.bind_attrib_location(program, POSITION_ATTRIBUTE.0, POSITION_ATTRIBUTE.1);
    if !gl.link_program(program) {
        let log = gl.program_info_log(program);
        discard(gl, program, &shaders);
        return Err(ShaderError::Link { log });
    }

    for shader in shaders {
        gl.detach_shader(program, shader);
        gl.delete_shader(shader);
    }
    Ok(program)
}

fn discard<G: ShaderContext>(gl: &G, program: G::Program, shaders: &[G::Shader]) {
    for &shader in shaders {
        gl.detach_shader(program, shader);
        gl.delete_shader(shader);
    }
    gl.delete_program(program);
}

/// The one quad mesh every scene of a renderer draws with. Immutable after
/// creation.
#[derive(Debug, Clone, Copy)]
pub struct FullscreenQuad<M> {
    pub mesh: M,
    pub index_count: i32,
}

impl<M: Copy> FullscreenQuad<M> {
    pub fn new<G: ShaderContext<Mesh = M>>(gl: &G) -> Result<Self, ShaderError> {
        let mesh = gl
            .create_mesh(&QUAD_VERTICES, &QUAD_INDICES)
            .map_err(ShaderError::Resource)?;
        Ok(Self {
            mesh,
            index_count: QUAD_INDICES.len() as i32,
        })
    }

    pub fn release<G: ShaderContext<Mesh = M>>(&self, gl: &G) {
        gl.delete_mesh(self.mesh);
    }
}

/// Everything needed to draw one scene's frame, detached from the scene so
/// it can be moved into a paint callback.
#[derive(Debug, Clone)]
pub struct QuadDraw<P, L, M> {
    pub program: P,
    pub time: Option<L>,
    pub origin: Option<L>,
    pub quad: FullscreenQuad<M>,
}

impl<P: Copy, L, M: Copy> QuadDraw<P, L, M> {
    /// `origin` is the lower-left corner of the target rectangle in
    /// framebuffer pixels, the frame `gl_FragCoord` is measured in.
    pub fn execute<G>(&self, gl: &G, seconds: f32, origin: [f32; 2])
    where
        G: ShaderContext<Program = P, Location = L, Mesh = M>,
    {
        gl.use_program(self.program);
        if let Some(time) = &self.time {
            gl.uniform_1_f32(time, seconds);
        }
        if let Some(location) = &self.origin {
            gl.uniform_2_f32(location, origin);
        }
        gl.draw_mesh(self.quad.mesh, self.quad.index_count);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredUniform {
    pub glsl_type: String,
    pub name: String,
}

/// Lists `uniform <type> <name>;` declarations found in GLSL source.
pub fn declared_uniforms(shader_source: &str) -> Vec<DeclaredUniform> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(
            r"uniform\s+(?:(?:lowp|mediump|highp)\s+)?(float|int|bool|vec2|vec3|vec4|ivec2|ivec3|ivec4|sampler2D)\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*;",
        )
        .expect("Invalid regex pattern")
    });

    re.captures_iter(shader_source)
        .map(|cap| DeclaredUniform {
            glsl_type: cap[1].to_string(),
            name: cap[2].to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::mock::MockGl;

    const FRAGMENT: &str = "precision mediump float;\nuniform float uSpeed;\nvoid main() {}\n";

    #[test]
    fn builds_and_links_a_program() {
        let gl = MockGl::new();
        let vertex = vertex_shader_source(&gl);
        assert!(vertex.contains("in vec2 vertPos"));
        let program = build_program(&gl, &vertex, FRAGMENT).unwrap();
        assert!(gl.is_linked(program));
        assert_eq!(gl.attrib_binding(program, "vertPos"), Some(0));
        assert_eq!(gl.live_shader_count(), 0);
    }

    #[test]
    fn compile_failure_reports_stage_and_cleans_up() {
        let gl = MockGl::new();
        let vertex = vertex_shader_source(&gl);
        let err = build_program(&gl, &vertex, "#error nope\nvoid main() {}").unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(log.contains("#error"));
            }
            other => panic!("unexpected {other}"),
        }
        assert_eq!(gl.live_program_count(), 0);
        assert_eq!(gl.live_shader_count(), 0);
    }

    #[test]
    fn link_failure_carries_info_log() {
        let gl = MockGl::new();
        let vertex = vertex_shader_source(&gl);
        let err = build_program(&gl, &vertex, "// LINK_FAIL\nvoid main() {}").unwrap_err();
        assert!(matches!(err, ShaderError::Link { ref log } if log.contains("link")));
        assert_eq!(gl.live_program_count(), 0);
    }

    #[test]
    fn version_header_added_only_when_missing() {
        let gl = MockGl::new();
        assert!(with_version_header(&gl, "void main() {}").starts_with("#version 140"));
        let own = "#version 100\nvoid main() {}";
        assert_eq!(with_version_header(&gl, own), own);
    }

    #[test]
    fn quad_is_four_strip_indices() {
        let gl = MockGl::new();
        let quad = FullscreenQuad::new(&gl).unwrap();
        assert_eq!(quad.index_count, 4);
        assert_eq!(gl.live_mesh_count(), 1);
        quad.release(&gl);
        assert_eq!(gl.live_mesh_count(), 0);
    }

    #[test]
    fn finds_declared_uniforms() {
        let found = declared_uniforms(
            "uniform highp float uTime;\nuniform vec3 uTint ;\nuniform int uArms;\n// uniform mat4 ignored;\n",
        );
        let names: Vec<_> = found.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["uTime", "uTint", "uArms"]);
        assert_eq!(found[1].glsl_type, "vec3");
    }
}
