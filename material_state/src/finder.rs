use std::cell::RefCell;

use crate::{
    bits::StateKey,
    context::RenderStates,
    error::StateError,
    property::{BlendMode, Decal, DepthTest, Fog, Target, Transparency, WriteMask},
    shader::MaterialShader,
    state::{program_type_for, RenderState},
};

/// Builds a [StateKey] through chained setters and resolves it to an interned state.
///
/// A finder is confined to one thread. Setters that intern a texture or shader source
/// cannot fail in place; the first such error is kept and returned by [StateFinder::find].
#[derive(Debug)]
pub struct StateFinder<'s> {
    states: &'s RenderStates,
    key: StateKey,
    vertex_index: u32,
    fragment_index: u32,
    error: Option<StateError>,
}

macro_rules! flag_setters {
    ($($(#[$attr:meta])* $name:ident => $with:ident;)*) => {
        $(
            $(#[$attr])*
            pub fn $name(&mut self, value: bool) -> &mut Self {
                self.key = self.key.$with(value);
                self
            }
        )*
    };
}

impl<'s> StateFinder<'s> {
    /// Creates a finder in the reset state.
    pub fn new(states: &'s RenderStates) -> Self {
        let shaders = states.shaders();
        Self {
            states,
            key: StateKey::DEFAULT,
            vertex_index: shaders.default_vertex_index(),
            fragment_index: shaders.default_fragment_index(),
            error: None,
        }
    }

    /// Restores every field to its default and clears any pending error.
    pub fn reset(&mut self) -> &mut Self {
        let shaders = self.states.shaders();
        self.key = StateKey::DEFAULT;
        self.vertex_index = shaders.default_vertex_index();
        self.fragment_index = shaders.default_fragment_index();
        self.error = None;
        self
    }

    /// The key accumulated so far. The shader field is only resolved by [Self::find].
    pub fn key(&self) -> StateKey {
        self.key
    }

    fn record(&mut self, error: StateError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Sets the primitive topology (see [crate::primitive]).
    ///
    /// # Panics
    /// Panics if `primitive > 7`.
    #[track_caller]
    pub fn primitive(&mut self, primitive: u8) -> &mut Self {
        self.key = self.key.with_primitive(primitive);
        self
    }

    /// Sets the texture. `None` selects "no texture".
    pub fn texture(&mut self, id: Option<&str>) -> &mut Self {
        match self.states.textures().intern(id) {
            Ok(handle) => self.key = self.key.with_texture(handle.index()),
            Err(error) => self.record(error),
        }
        self
    }

    #[allow(missing_docs)]
    pub fn transparency(&mut self, transparency: Transparency) -> &mut Self {
        self.key = self.key.with_transparency(transparency);
        self
    }

    #[allow(missing_docs)]
    pub fn depth_test(&mut self, depth_test: DepthTest) -> &mut Self {
        self.key = self.key.with_depth_test(depth_test);
        self
    }

    #[allow(missing_docs)]
    pub fn write_mask(&mut self, write_mask: WriteMask) -> &mut Self {
        self.key = self.key.with_write_mask(write_mask);
        self
    }

    /// Sets the decal mode.
    ///
    /// [Decal::Translucent] is stored as [Decal::None] with the decal translucency flag;
    /// every other mode clears that flag.
    pub fn decal(&mut self, decal: Decal) -> &mut Self {
        self.key = match decal {
            Decal::Translucent => self.key.with_decal(decal),
            _ => self.key.with_decal(decal).with_decal_translucency(false),
        };
        self
    }

    #[allow(missing_docs)]
    pub fn target(&mut self, target: Target) -> &mut Self {
        self.key = self.key.with_target(target);
        self
    }

    #[allow(missing_docs)]
    pub fn fog(&mut self, fog: Fog) -> &mut Self {
        self.key = self.key.with_fog(fog);
        self
    }

    /// Sets the condition index (see [crate::ConditionTable]).
    ///
    /// # Panics
    /// Panics if the index does not fit in the condition field.
    #[track_caller]
    pub fn condition(&mut self, condition: u32) -> &mut Self {
        self.key = self.key.with_condition(condition);
        self
    }

    flag_setters! {
        /// Enables linear texture filtering.
        bilinear => with_bilinear;
        #[allow(missing_docs)]
        cull => with_cull;
        #[allow(missing_docs)]
        enable_lightmap => with_enable_lightmap;
        /// Marks the state as drawing wide lines.
        lines => with_lines;
        #[allow(missing_docs)]
        emissive => with_emissive;
        #[allow(missing_docs)]
        disable_diffuse => with_disable_diffuse;
        #[allow(missing_docs)]
        disable_ao => with_disable_ao;
        #[allow(missing_docs)]
        cutout => with_cutout;
        #[allow(missing_docs)]
        unmipped => with_unmipped;
        #[allow(missing_docs)]
        translucent_cutout => with_translucent_cutout;
        #[allow(missing_docs)]
        hurt_overlay => with_hurt_overlay;
        #[allow(missing_docs)]
        flash_overlay => with_flash_overlay;
        #[allow(missing_docs)]
        disable_color_index => with_disable_color_index;
    }

    /// Sets the vertex source. `None` selects the default source.
    pub fn vertex_shader(&mut self, source: Option<&str>) -> &mut Self {
        let shaders = self.states.shaders();
        match source.map_or(Ok(shaders.default_vertex_index()), |source| {
            shaders.vertex_index(source)
        }) {
            Ok(index) => self.vertex_index = index,
            Err(error) => self.record(error),
        }
        self
    }

    /// Sets the fragment source. `None` selects the default source.
    pub fn fragment_shader(&mut self, source: Option<&str>) -> &mut Self {
        let shaders = self.states.shaders();
        match source.map_or(Ok(shaders.default_fragment_index()), |source| {
            shaders.fragment_index(source)
        }) {
            Ok(index) => self.fragment_index = index,
            Err(error) => self.record(error),
        }
        self
    }

    /// Uses the sources of an existing program. The program type is still chosen by
    /// [Self::find] from the transparency.
    pub fn shader(&mut self, shader: &MaterialShader) -> &mut Self {
        self.vertex_index = shader.vertex_index;
        self.fragment_index = shader.fragment_index;
        self
    }

    /// Sets the fields controlled by a legacy blend mode.
    pub fn blend_mode(&mut self, mode: BlendMode) -> &mut Self {
        let (transparency, cutout, unmipped, translucent_cutout, default_blend_mode) = match mode
        {
            BlendMode::Cutout => (Transparency::None, true, true, false, false),
            BlendMode::CutoutMipped => (Transparency::None, true, false, false, false),
            BlendMode::Translucent => (Transparency::Translucent, true, false, true, false),
            BlendMode::Default => (Transparency::None, false, false, false, true),
            BlendMode::Solid => (Transparency::None, false, false, false, false),
        };
        self.key = self
            .key
            .with_transparency(transparency)
            .with_cutout(cutout)
            .with_unmipped(unmipped)
            .with_translucent_cutout(translucent_cutout)
            .with_default_blend_mode(default_blend_mode);
        self
    }

    /// Replaces every field with those of `state`, including its shader sources.
    pub fn copy_from(&mut self, state: &RenderState) -> &mut Self {
        self.key = state.key;
        match self.states.shaders().get(state.shader) {
            Some(shader) => {
                self.vertex_index = shader.vertex_index;
                self.fragment_index = shader.fragment_index;
            }
            None => self.record(StateError::UnknownProgram(state.shader.index() as usize)),
        }
        self
    }

    /// Resolves the shader program and returns the interned state for the current fields.
    ///
    /// Translucent states use vertex-logic programs, all others uniform-logic programs.
    /// If a setter failed, returns its error and resets the finder, so the partially
    /// built key is never interned.
    pub fn find(&mut self) -> Result<&'s RenderState, StateError> {
        if let Some(error) = self.error.take() {
            self.reset();
            return Err(error);
        }
        let program_type = program_type_for(self.key.transparency());
        let program =
            self.states
                .shaders()
                .find(self.vertex_index, self.fragment_index, program_type)?;
        self.states
            .registry()
            .intern(self.key.with_shader(program.index()))
    }

    /// Interns a literal key, bypassing shader resolution.
    pub fn from_bits(&self, key: StateKey) -> Result<&'s RenderState, StateError> {
        self.states.registry().intern(key)
    }
}

thread_local! {
    static FINDER: RefCell<StateFinder<'static>> =
        RefCell::new(StateFinder::new(RenderStates::global()));
}

/// Runs `f` with this thread's finder for [RenderStates::global], reset beforehand.
///
/// # Panics
/// Panics if called reentrantly from within `f`.
pub fn with_finder<R>(f: impl FnOnce(&mut StateFinder<'static>) -> R) -> R {
    FINDER.with(|finder| {
        let mut finder = finder.borrow_mut();
        finder.reset();
        f(&mut finder)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::StateConfig,
        device::primitive,
        shader::{ProgramHandle, ProgramType},
        texture::TextureHandle,
    };

    fn states() -> RenderStates {
        RenderStates::new(StateConfig::default())
    }

    #[test]
    fn reset_finder_resolves_to_defaults() {
        let states = states();
        let state = states.finder().find().unwrap();
        assert_eq!(state.index, 1);
        assert_eq!(state.primitive, primitive::QUADS);
        assert_eq!(state.transparency, Transparency::None);
        assert_eq!(state.depth_test, DepthTest::LEqual);
        assert_eq!(state.write_mask, WriteMask::ColorDepth);
        assert_eq!(state.fog, Fog::Fog);
        assert_eq!(state.target, Target::Main);
        assert_eq!(state.texture, TextureHandle::NONE);
        assert!(state.cull && state.enable_lightmap);
        assert_eq!(state.shader, states.shaders().default_shader().handle);
        assert_eq!(state.program_type(), ProgramType::MaterialUniformLogic);
    }

    #[test]
    fn blend_mode_table() {
        let states = states();
        let mut finder = states.finder();

        let translucent = finder.blend_mode(BlendMode::Translucent).find().unwrap();
        assert_eq!(translucent.transparency, Transparency::Translucent);
        assert!(translucent.cutout);
        assert!(!translucent.unmipped);
        assert!(translucent.translucent_cutout);
        assert!(!translucent.default_blend_mode);

        let cutout = finder.blend_mode(BlendMode::Cutout).find().unwrap();
        assert_eq!(cutout.transparency, Transparency::None);
        assert!(cutout.cutout && cutout.unmipped);
        assert!(!cutout.translucent_cutout && !cutout.default_blend_mode);

        let mipped = finder.blend_mode(BlendMode::CutoutMipped).find().unwrap();
        assert!(mipped.cutout && !mipped.unmipped);

        let default = finder.blend_mode(BlendMode::Default).find().unwrap();
        assert!(default.default_blend_mode && !default.cutout);

        let solid = finder.blend_mode(BlendMode::Solid).find().unwrap();
        assert_eq!(solid.key, states.finder().find().unwrap().key);
    }

    #[test]
    fn translucent_decal_is_an_alias() {
        let states = states();
        let mut finder = states.finder();
        let state = finder.decal(Decal::Translucent).find().unwrap();
        assert_eq!(state.decal, Decal::None);
        assert!(state.decal_translucency);

        let state = finder.decal(Decal::PolygonOffset).find().unwrap();
        assert_eq!(state.decal, Decal::PolygonOffset);
        assert!(!state.decal_translucency);
    }

    #[test]
    fn translucent_states_use_vertex_logic_programs() {
        let states = states();
        let mut finder = states.finder();
        let opaque = finder.vertex_shader(Some("water.vert")).find().unwrap();
        let translucent = finder.transparency(Transparency::Translucent).find().unwrap();
        assert_ne!(opaque.shader, translucent.shader);
        let program = states.shaders().get(translucent.shader).unwrap();
        assert_eq!(program.program_type, ProgramType::MaterialVertexLogic);
        assert_eq!(&*program.vertex_source, "water.vert");
    }

    #[test]
    fn copy_from_then_tweak_one_field() {
        let states = states();
        let base = states
            .finder()
            .texture(Some("stone.png"))
            .fragment_shader(Some("stone.frag"))
            .depth_test(DepthTest::Equal)
            .find()
            .unwrap();

        let mut finder = states.finder();
        assert_eq!(finder.copy_from(base).find().unwrap(), base);

        let tweaked = finder.copy_from(base).emissive(true).find().unwrap();
        assert_ne!(tweaked.index, base.index);
        assert!(tweaked.emissive);
        assert_eq!(tweaked.texture, base.texture);
        assert_eq!(tweaked.depth_test, DepthTest::Equal);
        assert_eq!(tweaked.shader, base.shader);
    }

    #[test]
    fn absent_texture_is_no_texture() {
        let states = states();
        let state = states
            .finder()
            .texture(Some("a.png"))
            .texture(None)
            .find()
            .unwrap();
        assert_eq!(state.texture, TextureHandle::NONE);
    }

    #[test]
    fn failed_setter_discards_the_partial_key() {
        let states = states();
        let mut finder = states.finder();
        finder.emissive(true).depth_test(DepthTest::Always);
        finder.record(StateError::TextureCapacityExceeded { capacity: 4096 });
        assert_eq!(
            finder.find(),
            Err(StateError::TextureCapacityExceeded { capacity: 4096 })
        );
        assert_eq!(finder.key(), StateKey::DEFAULT);

        let next = finder.find().unwrap();
        assert!(!next.emissive);
        assert_eq!(next.depth_test, DepthTest::LEqual);
        assert_eq!(states.registry().len(), 2);
    }

    #[test]
    #[should_panic(expected = "invalid primitive")]
    fn primitive_out_of_range_fails_fast() {
        let states = states();
        states.finder().primitive(8);
    }

    #[test]
    fn from_bits_interns_literal_keys() {
        let states = states();
        let finder = states.finder();
        let key = StateKey::DEFAULT.with_shader(0).with_lines(true);
        let state = finder.from_bits(key).unwrap();
        assert_eq!(state.key, key);
        assert_eq!(state.shader, ProgramHandle(0));
    }

    #[test]
    fn thread_local_finder_is_reset_on_entry() {
        let emissive = with_finder(|finder| finder.emissive(true).find().unwrap().index);
        let plain = with_finder(|finder| finder.find().unwrap());
        assert!(!plain.emissive);
        assert_ne!(plain.index, emissive);
    }
}
