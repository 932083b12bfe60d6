//! A GL stand-in that keeps uniform state in memory.
//!
//! Follows GL's rules closely enough to catch binding mistakes: uniform
//! writes land in the *currently bound* program and are dropped (and
//! recorded as errors) when the location belongs to another program.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use super::ShaderContext;
use crate::errors::ShaderStage;
use crate::render_engine::declared_uniforms;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Float(Vec<f32>),
    Int(i32),
}

#[derive(Debug, Default)]
struct Program {
    shaders: Vec<u32>,
    attribs: HashMap<String, u32>,
    linked: bool,
    uniforms: BTreeMap<String, Value>,
    info_log: String,
}

#[derive(Debug)]
struct Shader {
    stage: ShaderStage,
    source: String,
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    shaders: HashMap<u32, Shader>,
    programs: HashMap<u32, Program>,
    meshes: Vec<u32>,
    current: Option<u32>,
    errors: Vec<String>,
    draws: Vec<(u32, u32)>,
    float_ceiling: Option<f32>,
}

impl State {
    fn id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockLocation {
    program: u32,
    name: String,
}

#[derive(Debug, Default)]
pub struct MockGl {
    state: RefCell<State>,
}

impl MockGl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a driver that clamps every float uniform write.
    pub fn clamp_floats_to(&self, ceiling: f32) {
        self.state.borrow_mut().float_ceiling = Some(ceiling);
    }

    pub fn is_linked(&self, program: u32) -> bool {
        self.state.borrow().programs.get(&program).is_some_and(|p| p.linked)
    }

    pub fn attrib_binding(&self, program: u32, name: &str) -> Option<u32> {
        self.state.borrow().programs.get(&program)?.attribs.get(name).copied()
    }

    pub fn live_program_count(&self) -> usize {
        self.state.borrow().programs.len()
    }

    pub fn live_shader_count(&self) -> usize {
        self.state.borrow().shaders.len()
    }

    pub fn live_mesh_count(&self) -> usize {
        self.state.borrow().meshes.len()
    }

    pub fn errors(&self) -> Vec<String> {
        self.state.borrow().errors.clone()
    }

    /// Programs drawn so far, in order, with the mesh each used.
    pub fn draws(&self) -> Vec<(u32, u32)> {
        self.state.borrow().draws.clone()
    }

    pub fn float_uniform(&self, program: u32, name: &str) -> Option<Vec<f32>> {
        match self.state.borrow().programs.get(&program)?.uniforms.get(name)? {
            Value::Float(v) => Some(v.clone()),
            Value::Int(_) => None,
        }
    }

    pub fn int_uniform(&self, program: u32, name: &str) -> Option<i32> {
        match self.state.borrow().programs.get(&program)?.uniforms.get(name)? {
            Value::Int(v) => Some(*v),
            Value::Float(_) => None,
        }
    }

    fn write(&self, location: &MockLocation, value: Value) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.current != Some(location.program) {
            state.errors.push(format!(
                "uniform `{}` written while program {:?} bound",
                location.name, state.current
            ));
            return;
        }
        let ceiling = state.float_ceiling;
        let Some(slot) = state
            .programs
            .get_mut(&location.program)
            .and_then(|p| p.uniforms.get_mut(&location.name))
        else {
            return;
        };
        match (slot, value) {
            (Value::Float(slot), Value::Float(v)) if slot.len() == v.len() => {
                *slot = v.into_iter().map(|x| ceiling.map_or(x, |c| x.min(c))).collect();
            }
            (Value::Int(slot), Value::Int(v)) => *slot = v,
            (_, value) => state
                .errors
                .push(format!("type mismatch writing {value:?} to `{}`", location.name)),
        }
    }

    fn read(&self, program: u32, location: &MockLocation) -> Option<Value> {
        self.state.borrow().programs.get(&program)?.uniforms.get(&location.name).cloned()
    }
}

impl ShaderContext for MockGl {
    type Shader = u32;
    type Program = u32;
    type Location = MockLocation;
    type Mesh = u32;

    fn version_header(&self) -> String {
        "#version 140".to_string()
    }

    fn modern_interface(&self) -> bool {
        true
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.id();
        state.shaders.insert(
            id,
            Shader {
                stage,
                source: String::new(),
            },
        );
        Ok(id)
    }

    fn compile_shader(&self, shader: u32, source: &str) -> bool {
        if let Some(s) = self.state.borrow_mut().shaders.get_mut(&shader) {
            s.source = source.to_string();
        }
        !source.contains("#error")
    }

    fn shader_info_log(&self, shader: u32) -> String {
        let state = self.state.borrow();
        match state.shaders.get(&shader) {
            Some(s) if s.source.contains("#error") => "ERROR: 0:1: '#error' : nope".to_string(),
            _ => String::new(),
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.state.borrow_mut().shaders.remove(&shader);
    }

    fn create_program(&self) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.id();
        state.programs.insert(id, Program::default());
        Ok(id)
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.shaders.push(shader);
        }
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.shaders.retain(|&s| s != shader);
        }
    }

    fn bind_attrib_location(&self, program: u32, index: u32, name: &str) {
        if let Some(p) = self.state.borrow_mut().programs.get_mut(&program) {
            p.attribs.insert(name.to_string(), index);
        }
    }

    fn link_program(&self, program: u32) -> bool {
        let mut state = self.state.borrow_mut();
        let fragment = state.programs.get(&program).and_then(|p| {
            p.shaders
                .iter()
                .filter_map(|id| state.shaders.get(id))
                .find(|s| s.stage == ShaderStage::Fragment)
                .map(|s| s.source.clone())
        });
        let Some(fragment) = fragment else {
            return false;
        };
        let Some(p) = state.programs.get_mut(&program) else {
            return false;
        };
        if fragment.contains("LINK_FAIL") {
            p.info_log = "error: failed to link fragment shader".to_string();
            return false;
        }
        p.uniforms = declared_uniforms(&fragment)
            .into_iter()
            .map(|u| {
                let value = match u.glsl_type.as_str() {
                    "int" | "bool" | "sampler2D" => Value::Int(0),
                    "vec2" => Value::Float(vec![0.0; 2]),
                    "vec3" => Value::Float(vec![0.0; 3]),
                    "vec4" => Value::Float(vec![0.0; 4]),
                    _ => Value::Float(vec![0.0]),
                };
                (u.name, value)
            })
            .collect();
        p.linked = true;
        true
    }

    fn program_info_log(&self, program: u32) -> String {
        self.state
            .borrow()
            .programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&self, program: u32) {
        let mut state = self.state.borrow_mut();
        state.programs.remove(&program);
        if state.current == Some(program) {
            state.current = None;
        }
    }

    fn use_program(&self, program: u32) {
        self.state.borrow_mut().current = Some(program);
    }

    fn uniform_location(&self, program: u32, name: &str) -> Option<MockLocation> {
        let state = self.state.borrow();
        let p = state.programs.get(&program)?;
        (p.linked && p.uniforms.contains_key(name)).then(|| MockLocation {
            program,
            name: name.to_string(),
        })
    }

    fn uniform_1_f32(&self, location: &MockLocation, value: f32) {
        self.write(location, Value::Float(vec![value]));
    }

    fn uniform_1_i32(&self, location: &MockLocation, value: i32) {
        self.write(location, Value::Int(value));
    }

    fn uniform_2_f32(&self, location: &MockLocation, value: [f32; 2]) {
        self.write(location, Value::Float(value.to_vec()));
    }

    fn uniform_3_f32(&self, location: &MockLocation, value: [f32; 3]) {
        self.write(location, Value::Float(value.to_vec()));
    }

    fn read_uniform_f32(&self, program: u32, location: &MockLocation, out: &mut [f32]) {
        match self.read(program, location) {
            Some(Value::Float(v)) => {
                for (o, x) in out.iter_mut().zip(v) {
                    *o = x;
                }
            }
            Some(Value::Int(v)) => out.fill(v as f32),
            None => {}
        }
    }

    fn read_uniform_i32(&self, program: u32, location: &MockLocation, out: &mut [i32]) {
        match self.read(program, location) {
            Some(Value::Int(v)) => out.fill(v),
            Some(Value::Float(v)) => {
                for (o, x) in out.iter_mut().zip(v) {
                    *o = x as i32;
                }
            }
            None => {}
        }
    }

    fn create_mesh(&self, _vertices: &[f32], _indices: &[u8]) -> Result<u32, String> {
        let mut state = self.state.borrow_mut();
        let id = state.id();
        state.meshes.push(id);
        Ok(id)
    }

    fn draw_mesh(&self, mesh: u32, _index_count: i32) {
        let mut state = self.state.borrow_mut();
        if let Some(program) = state.current {
            state.draws.push((program, mesh));
        }
    }

    fn delete_mesh(&self, mesh: u32) {
        self.state.borrow_mut().meshes.retain(|&m| m != mesh);
    }
}
