//! Shader program selection and uniform binding.
//!
//! Programs are identified by a (vertex source, fragment source, [ProgramType]) triple
//! and interned into a [ProgramHandle] that is stored in the render state key. Compilation
//! is deferred to the first activation and performed by a [ShaderBackend].

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use bytemuck::{Pod, Zeroable};

use crate::{
    bits::SHADER_BITS,
    config::StateConfig,
    error::StateError,
    index::Indexer,
    state::RenderState,
    texture::AtlasInfo,
};

/// Maximum number of programs addressable by a render state.
pub const MAX_PROGRAMS: usize = 1 << SHADER_BITS;

/// Maximum number of distinct vertex or fragment sources.
pub const MAX_SOURCES: usize = 0xFFFF;

/// How material parameters reach a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramType {
    /// One material for the whole draw call, passed as uniforms. Used for opaque batches.
    MaterialUniformLogic,
    /// Material encoded per vertex. Used for translucent primitives, which are sorted
    /// individually and so cannot share a per-batch material.
    MaterialVertexLogic,
}

/// Index of an interned program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProgramHandle(pub(crate) u32);

impl ProgramHandle {
    #[allow(missing_docs)]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// The sources and logic variant of an interned program.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialShader {
    pub handle: ProgramHandle,
    pub vertex_index: u32,
    pub fragment_index: u32,
    pub vertex_source: Arc<str>,
    pub fragment_source: Arc<str>,
    pub program_type: ProgramType,
}

/// Uniform block pushed to a program when it is bound.
#[allow(missing_docs)]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct ProgramUniforms {
    /// Vertex and fragment source indices.
    pub program: [u32; 2],
    /// [crate::MaterialFlags] bits for uniform-logic programs, zero otherwise.
    pub material_flags: u32,
    pub condition: u32,
    pub atlas: AtlasInfo,
    pub tick: u32,
    pub frame: u32,
}

impl ProgramUniforms {
    #[allow(missing_docs)]
    pub fn new(
        state: &RenderState,
        shader: &MaterialShader,
        atlas: Option<AtlasInfo>,
        tick: u32,
        frame: u32,
    ) -> Self {
        let material_flags = match shader.program_type {
            ProgramType::MaterialUniformLogic => state.material_flags().bits(),
            ProgramType::MaterialVertexLogic => 0,
        };
        Self {
            program: [shader.vertex_index, shader.fragment_index],
            material_flags,
            condition: state.condition,
            atlas: atlas.unwrap_or_default(),
            tick,
            frame,
        }
    }
}

/// Compiles and binds programs for a graphics context.
///
/// The backend owns the compiled programs, keyed by [ProgramHandle]. When a recompile
/// fails it should keep the previously compiled program for that handle.
pub trait ShaderBackend {
    /// Compiles (or recompiles) the program for `shader.handle`.
    fn compile(&mut self, shader: &MaterialShader) -> Result<(), StateError>;
    #[allow(missing_docs)]
    fn bind(&mut self, program: ProgramHandle);
    #[allow(missing_docs)]
    fn upload_uniforms(&mut self, program: ProgramHandle, uniforms: &ProgramUniforms);
    /// Deactivates any bound program.
    fn unbind(&mut self);
}

#[derive(Debug)]
struct ProgramSlot {
    shader: Arc<MaterialShader>,
    compiled: AtomicBool,
    failure: Mutex<Option<StateError>>,
    uploaded: Mutex<Option<ProgramUniforms>>,
}

impl ProgramSlot {
    fn new(shader: MaterialShader) -> Self {
        Self {
            shader: Arc::new(shader),
            compiled: AtomicBool::new(false),
            failure: Mutex::new(None),
            uploaded: Mutex::new(None),
        }
    }
}

#[derive(Debug, Default)]
struct ProgramTable {
    lookup: HashMap<(u32, u32, ProgramType), u32>,
    slots: Vec<Arc<ProgramSlot>>,
}

/// Owns the program table and the tick/frame counters used by time-varying uniforms.
#[derive(Debug)]
pub struct ShaderManager {
    vertex_sources: Indexer<Arc<str>>,
    fragment_sources: Indexer<Arc<str>>,
    programs: Mutex<ProgramTable>,
    default_shader: Arc<MaterialShader>,
    tick_index: AtomicU32,
    frame_index: AtomicU32,
}

impl ShaderManager {
    /// Creates the manager with the default program (handle 0) already registered.
    pub fn new(config: &StateConfig) -> Self {
        if config.enable_lifecycle_debug {
            tracing::info!("Lifecycle Event: ShaderManager init");
        }

        let vertex_sources = Indexer::new(MAX_SOURCES);
        let fragment_sources = Indexer::new(MAX_SOURCES);
        let vertex_source: Arc<str> = Arc::from(config.default_vertex_source.as_str());
        let fragment_source: Arc<str> = Arc::from(config.default_fragment_source.as_str());
        vertex_sources.to_index(&vertex_source);
        fragment_sources.to_index(&fragment_source);

        let default_shader = MaterialShader {
            handle: ProgramHandle(0),
            vertex_index: 0,
            fragment_index: 0,
            vertex_source,
            fragment_source,
            program_type: ProgramType::MaterialUniformLogic,
        };
        let slot = Arc::new(ProgramSlot::new(default_shader));
        let default_shader = Arc::clone(&slot.shader);

        let mut programs = ProgramTable::default();
        programs
            .lookup
            .insert((0, 0, ProgramType::MaterialUniformLogic), 0);
        programs.slots.push(slot);

        Self {
            vertex_sources,
            fragment_sources,
            programs: Mutex::new(programs),
            default_shader,
            tick_index: AtomicU32::new(0),
            frame_index: AtomicU32::new(0),
        }
    }

    /// Index of a vertex source, assigned on first use.
    pub fn vertex_index(&self, source: &str) -> Result<u32, StateError> {
        self.vertex_sources
            .to_index(&Arc::from(source))
            .map(|(index, _)| index)
            .ok_or(StateError::ShaderCapacityExceeded {
                capacity: MAX_SOURCES,
            })
    }

    /// Index of a fragment source, assigned on first use.
    pub fn fragment_index(&self, source: &str) -> Result<u32, StateError> {
        self.fragment_sources
            .to_index(&Arc::from(source))
            .map(|(index, _)| index)
            .ok_or(StateError::ShaderCapacityExceeded {
                capacity: MAX_SOURCES,
            })
    }

    #[allow(missing_docs)]
    pub fn default_vertex_index(&self) -> u32 {
        self.default_shader.vertex_index
    }

    #[allow(missing_docs)]
    pub fn default_fragment_index(&self) -> u32 {
        self.default_shader.fragment_index
    }

    /// The program built from the default sources with uniform logic.
    pub fn default_shader(&self) -> Arc<MaterialShader> {
        Arc::clone(&self.default_shader)
    }

    /// Returns the handle for a source index pair and program type, creating it if needed.
    ///
    /// # Panics
    /// Panics if either index was not issued by this manager.
    #[track_caller]
    pub fn find(
        &self,
        vertex_index: u32,
        fragment_index: u32,
        program_type: ProgramType,
    ) -> Result<ProgramHandle, StateError> {
        let mut programs = self.programs.lock().unwrap();
        let key = (vertex_index, fragment_index, program_type);
        if let Some(&index) = programs.lookup.get(&key) {
            return Ok(ProgramHandle(index));
        }

        let index = programs.slots.len();
        if index >= MAX_PROGRAMS {
            return Err(StateError::ShaderCapacityExceeded {
                capacity: MAX_PROGRAMS,
            });
        }

        let (vertex_source, fragment_source) = match (
            self.vertex_sources.key(vertex_index),
            self.fragment_sources.key(fragment_index),
        ) {
            (Some(vertex), Some(fragment)) => (vertex, fragment),
            _ => panic!(
                "invalid shader source indices ({}, {})",
                vertex_index, fragment_index
            ),
        };

        let handle = ProgramHandle(index as u32);
        tracing::debug!(
            "program {} created for ({}, {}, {:?})",
            index,
            vertex_source,
            fragment_source,
            program_type
        );
        programs.slots.push(Arc::new(ProgramSlot::new(MaterialShader {
            handle,
            vertex_index,
            fragment_index,
            vertex_source,
            fragment_source,
            program_type,
        })));
        programs.lookup.insert(key, handle.0);
        Ok(handle)
    }

    /// Returns the program for a pair of sources, creating it if needed.
    ///
    /// Absent sources fall back to the defaults.
    pub fn get_or_create(
        &self,
        vertex_source: Option<&str>,
        fragment_source: Option<&str>,
        program_type: ProgramType,
    ) -> Result<Arc<MaterialShader>, StateError> {
        let vertex_index = match vertex_source {
            Some(source) => self.vertex_index(source)?,
            None => self.default_vertex_index(),
        };
        let fragment_index = match fragment_source {
            Some(source) => self.fragment_index(source)?,
            None => self.default_fragment_index(),
        };
        let handle = self.find(vertex_index, fragment_index, program_type)?;
        self.get(handle)
            .ok_or(StateError::UnknownProgram(handle.0 as usize))
    }

    #[allow(missing_docs)]
    pub fn get(&self, handle: ProgramHandle) -> Option<Arc<MaterialShader>> {
        self.slot(handle).map(|slot| Arc::clone(&slot.shader))
    }

    fn slot(&self, handle: ProgramHandle) -> Option<Arc<ProgramSlot>> {
        let programs = self.programs.lock().unwrap();
        programs.slots.get(handle.0 as usize).cloned()
    }

    /// The number of programs currently registered.
    pub fn shader_count(&self) -> usize {
        self.programs.lock().unwrap().slots.len()
    }

    /// Count of game ticks observed since startup.
    pub fn tick_index(&self) -> u32 {
        self.tick_index.load(Ordering::Relaxed)
    }

    /// Count of rendered frames observed since startup.
    pub fn frame_index(&self) -> u32 {
        self.frame_index.load(Ordering::Relaxed)
    }

    #[allow(missing_docs)]
    pub fn on_game_tick(&self) {
        self.tick_index.fetch_add(1, Ordering::Relaxed);
    }

    #[allow(missing_docs)]
    pub fn on_render_frame(&self) {
        self.frame_index.fetch_add(1, Ordering::Relaxed);
    }

    /// Binds a program, compiling it first if needed, and uploads `uniforms` unless the
    /// program already holds exactly these values.
    ///
    /// A program whose compilation failed is not retried until [Self::reload].
    pub fn activate(
        &self,
        backend: &mut dyn ShaderBackend,
        handle: ProgramHandle,
        uniforms: &ProgramUniforms,
    ) -> Result<(), StateError> {
        let slot = self
            .slot(handle)
            .ok_or(StateError::UnknownProgram(handle.0 as usize))?;

        if !slot.compiled.load(Ordering::Acquire) {
            let mut failure = slot.failure.lock().unwrap();
            if let Some(error) = failure.as_ref() {
                return Err(error.clone());
            }
            if let Err(error) = backend.compile(&slot.shader) {
                tracing::warn!("{}", error);
                *failure = Some(error.clone());
                return Err(error);
            }
            slot.compiled.store(true, Ordering::Release);
        }

        backend.bind(handle);

        let mut uploaded = slot.uploaded.lock().unwrap();
        if uploaded.as_ref() != Some(uniforms) {
            backend.upload_uniforms(handle, uniforms);
            *uploaded = Some(*uniforms);
        }
        Ok(())
    }

    /// Recompiles every program that has been compiled or has failed to compile.
    ///
    /// Handles are unchanged. Failures are logged and returned; a program that compiled
    /// before keeps its previous build. Must not run while draw calls are in flight.
    pub fn reload(&self, backend: &mut dyn ShaderBackend) -> Vec<StateError> {
        let slots = self.programs.lock().unwrap().slots.clone();
        tracing::info!("reloading {} shader programs", slots.len());

        let mut errors = Vec::new();
        for slot in slots {
            let mut failure = slot.failure.lock().unwrap();
            let compiled = slot.compiled.load(Ordering::Acquire);
            if !compiled && failure.is_none() {
                continue;
            }

            match backend.compile(&slot.shader) {
                Ok(()) => {
                    slot.compiled.store(true, Ordering::Release);
                    *failure = None;
                    *slot.uploaded.lock().unwrap() = None;
                }
                Err(error) => {
                    if compiled {
                        tracing::warn!("{}; keeping previous program", error);
                    } else {
                        tracing::warn!("{}", error);
                        *failure = Some(error.clone());
                    }
                    errors.push(error);
                }
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingShaders, ShaderCall};

    fn manager() -> ShaderManager {
        ShaderManager::new(&StateConfig::default())
    }

    #[test]
    fn default_program_has_handle_zero() {
        let shaders = manager();
        let default = shaders.default_shader();
        assert_eq!(default.handle, ProgramHandle(0));
        assert_eq!(
            &*default.vertex_source,
            StateConfig::default().default_vertex_source
        );
        assert_eq!(
            shaders
                .get_or_create(None, None, ProgramType::MaterialUniformLogic)
                .unwrap()
                .handle,
            default.handle
        );
        assert_eq!(shaders.shader_count(), 1);
    }

    #[test]
    fn programs_are_memoized_per_source_pair_and_type() {
        let shaders = manager();
        let a = shaders
            .get_or_create(Some("a.vert"), None, ProgramType::MaterialUniformLogic)
            .unwrap();
        let b = shaders
            .get_or_create(Some("a.vert"), None, ProgramType::MaterialVertexLogic)
            .unwrap();
        let c = shaders
            .get_or_create(Some("a.vert"), None, ProgramType::MaterialUniformLogic)
            .unwrap();
        assert_ne!(a.handle, b.handle);
        assert_eq!(a.handle, c.handle);
        assert_eq!(a.fragment_index, shaders.default_fragment_index());
        assert_eq!(shaders.get(b.handle).unwrap().program_type, ProgramType::MaterialVertexLogic);
    }

    #[test]
    fn activation_compiles_once_and_skips_unchanged_uniforms() {
        let shaders = manager();
        let mut backend = RecordingShaders::default();
        let uniforms = ProgramUniforms::default();

        shaders.activate(&mut backend, ProgramHandle(0), &uniforms).unwrap();
        shaders.activate(&mut backend, ProgramHandle(0), &uniforms).unwrap();
        assert_eq!(
            backend.calls,
            [
                ShaderCall::Compile(ProgramHandle(0)),
                ShaderCall::Bind(ProgramHandle(0)),
                ShaderCall::Upload(ProgramHandle(0), uniforms),
                ShaderCall::Bind(ProgramHandle(0)),
            ]
        );

        shaders.on_render_frame();
        let next = ProgramUniforms {
            frame: shaders.frame_index(),
            ..uniforms
        };
        shaders.activate(&mut backend, ProgramHandle(0), &next).unwrap();
        assert_eq!(backend.calls.last(), Some(&ShaderCall::Upload(ProgramHandle(0), next)));
    }

    #[test]
    fn failed_compile_is_reported_once_and_retried_on_reload() {
        let shaders = manager();
        let mut backend = RecordingShaders::failing();
        let uniforms = ProgramUniforms::default();

        assert!(shaders.activate(&mut backend, ProgramHandle(0), &uniforms).is_err());
        assert!(shaders.activate(&mut backend, ProgramHandle(0), &uniforms).is_err());
        assert_eq!(backend.compile_count(), 1);

        backend.fail = false;
        assert!(shaders.reload(&mut backend).is_empty());
        assert_eq!(backend.compile_count(), 2);
        assert!(shaders.activate(&mut backend, ProgramHandle(0), &uniforms).is_ok());
    }

    #[test]
    fn reload_keeps_handles_and_previous_program_on_failure() {
        let shaders = manager();
        let mut backend = RecordingShaders::default();
        let shader = shaders
            .get_or_create(Some("x.vert"), Some("x.frag"), ProgramType::MaterialVertexLogic)
            .unwrap();
        let unused = shaders
            .get_or_create(Some("y.vert"), None, ProgramType::MaterialVertexLogic)
            .unwrap();
        let uniforms = ProgramUniforms::default();
        shaders.activate(&mut backend, shader.handle, &uniforms).unwrap();

        backend.fail = true;
        let errors = shaders.reload(&mut backend);
        assert_eq!(errors.len(), 1);
        assert!(!backend.compiled(unused.handle));

        backend.fail = false;
        backend.calls.clear();
        shaders.activate(&mut backend, shader.handle, &uniforms).unwrap();
        assert_eq!(backend.calls, [ShaderCall::Bind(shader.handle)]);
        assert_eq!(shaders.get(shader.handle).unwrap(), shader);
    }

    #[test]
    fn counters_advance_independently() {
        let shaders = manager();
        shaders.on_game_tick();
        shaders.on_render_frame();
        shaders.on_render_frame();
        assert_eq!(shaders.tick_index(), 1);
        assert_eq!(shaders.frame_index(), 2);
    }
}
