use crate::{
    context::RenderStates,
    device::{GraphicsDevice, ShadeModel},
    error::StateError,
    property::{Decal, DepthTest, Fog, Target, Transparency, WriteMask},
    shader::{ProgramUniforms, ShaderBackend},
    state::RenderState,
    texture::TextureHandle,
};

/// The variant last applied for each property category, or `None` after teardown.
#[derive(Debug, Default, Clone, PartialEq)]
struct ActiveProperties {
    target: Option<Target>,
    texture: Option<(TextureHandle, bool)>,
    transparency: Option<Transparency>,
    depth_test: Option<DepthTest>,
    write_mask: Option<WriteMask>,
    fog: Option<Fog>,
    decal: Option<Decal>,
}

/// Applies render states to a graphics context.
///
/// The activator is either inactive or has exactly one active state. Enabling the active
/// state again does nothing; enabling a different one reapplies every category, each of
/// which skips its device commands when its variant is unchanged.
#[derive(Debug)]
pub struct StateActivator<D, S> {
    device: D,
    shaders: S,
    active: Option<usize>,
    properties: ActiveProperties,
}

impl<D: GraphicsDevice, S: ShaderBackend> StateActivator<D, S> {
    /// Creates an inactive activator.
    pub fn new(device: D, shaders: S) -> Self {
        Self {
            device,
            shaders,
            active: None,
            properties: ActiveProperties::default(),
        }
    }

    #[allow(missing_docs)]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[allow(missing_docs)]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[allow(missing_docs)]
    pub fn shader_backend(&self) -> &S {
        &self.shaders
    }

    #[allow(missing_docs)]
    pub fn shader_backend_mut(&mut self) -> &mut S {
        &mut self.shaders
    }

    #[allow(missing_docs)]
    pub fn into_inner(self) -> (D, S) {
        (self.device, self.shaders)
    }

    /// Index of the active state, if any.
    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Makes `state` the active state.
    pub fn enable(&mut self, states: &RenderStates, state: &RenderState) {
        if self.active == Some(state.index) {
            return;
        }
        if self.active.is_none() {
            self.device.set_shade_model(ShadeModel::Smooth);
        }
        self.active = Some(state.index);

        let config = states.config();
        let device: &mut dyn GraphicsDevice = &mut self.device;
        let properties = &mut self.properties;

        state.target.enable(&mut properties.target, device);
        if config.enable_bloom {
            device.begin_emissive_capture();
        }

        let texture = (state.texture, state.bilinear);
        if properties.texture != Some(texture) {
            if state.texture == TextureHandle::NONE {
                device.bind_texture(None, false);
            } else {
                let texture = states.textures().get(state.texture);
                device.bind_texture(texture.as_ref(), state.bilinear);
            }
            properties.texture = Some(texture);
        }

        state
            .transparency
            .enable(&mut properties.transparency, device);
        state.depth_test.enable(&mut properties.depth_test, device);
        state.write_mask.enable(&mut properties.write_mask, device);
        state.fog.enable(&mut properties.fog, device);
        state.decal.enable(&mut properties.decal, device);

        device.set_cull(state.cull);
        device.set_lightmap(state.enable_lightmap);
        let line_width = config.line_width(state.lines, device.framebuffer_width());
        device.set_line_width(line_width);

        if let Err(error) = self.activate_program(states, state) {
            tracing::debug!("state {}: {}", state.index, error);
            // the previous state's program must not draw this state's batch
            self.shaders.unbind();
        }
    }

    fn activate_program(
        &mut self,
        states: &RenderStates,
        state: &RenderState,
    ) -> Result<(), StateError> {
        let shaders = states.shaders();
        let shader = shaders
            .get(state.shader)
            .ok_or(StateError::UnknownProgram(state.shader.index() as usize))?;
        let uniforms = ProgramUniforms::new(
            state,
            &shader,
            states.textures().atlas_info(state.texture),
            shaders.tick_index(),
            shaders.frame_index(),
        );
        shaders.activate(&mut self.shaders, state.shader, &uniforms)
    }

    /// Returns the device to its neutral state and becomes inactive.
    pub fn disable_all(&mut self, states: &RenderStates) {
        if self.active.take().is_none() {
            return;
        }

        let device: &mut dyn GraphicsDevice = &mut self.device;
        let properties = &mut self.properties;

        if states.config().enable_bloom {
            device.end_emissive_capture();
        }
        self.shaders.unbind();
        device.set_shade_model(ShadeModel::Flat);

        Decal::disable(&mut properties.decal, device);
        Target::disable(&mut properties.target, device);
        if properties.texture.take().is_some() {
            device.bind_texture(None, false);
        }
        Transparency::disable(&mut properties.transparency, device);
        DepthTest::disable(&mut properties.depth_test, device);
        WriteMask::disable(&mut properties.write_mask, device);
        Fog::disable(&mut properties.fog, device);
    }

    /// Tears down the active state and recompiles every program. Returns the programs
    /// that failed to compile.
    pub fn reload_shaders(&mut self, states: &RenderStates) -> Vec<StateError> {
        self.disable_all(states);
        states.shaders().reload(&mut self.shaders)
    }
}
