//! Recording implementations of the host capabilities.

use std::collections::HashSet;

use crate::{
    device::{BlendFunc, CompareFunc, FogMode, GraphicsDevice, PolygonOffset, ShadeModel},
    error::StateError,
    property::Target,
    shader::{MaterialShader, ProgramHandle, ProgramUniforms, ShaderBackend},
    texture::{AtlasInfo, TextureBackend, TextureHandle, TextureState},
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeviceCall {
    DepthTest(bool),
    DepthFunc(CompareFunc),
    DepthMask(bool),
    ColorMask(bool),
    Blend(Option<BlendFunc>),
    Cull(bool),
    LineWidth(f32),
    BindTexture(Option<TextureHandle>, bool),
    Fog(FogMode),
    PolygonOffset(Option<PolygonOffset>),
    ViewOffset(bool),
    Target(Target),
    Lightmap(bool),
    ShadeModel(ShadeModel),
    BeginEmissiveCapture,
    EndEmissiveCapture,
}

#[derive(Debug)]
pub(crate) struct RecordingDevice {
    pub(crate) calls: Vec<DeviceCall>,
    pub(crate) framebuffer_width: u32,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            framebuffer_width: 1920,
        }
    }
}

impl GraphicsDevice for RecordingDevice {
    fn set_depth_test(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::DepthTest(enabled));
    }

    fn set_depth_func(&mut self, func: CompareFunc) {
        self.calls.push(DeviceCall::DepthFunc(func));
    }

    fn set_depth_mask(&mut self, write: bool) {
        self.calls.push(DeviceCall::DepthMask(write));
    }

    fn set_color_mask(&mut self, write: bool) {
        self.calls.push(DeviceCall::ColorMask(write));
    }

    fn set_blend(&mut self, func: Option<BlendFunc>) {
        self.calls.push(DeviceCall::Blend(func));
    }

    fn set_cull(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::Cull(enabled));
    }

    fn set_line_width(&mut self, width: f32) {
        self.calls.push(DeviceCall::LineWidth(width));
    }

    fn bind_texture(&mut self, texture: Option<&TextureState>, bilinear: bool) {
        self.calls.push(DeviceCall::BindTexture(
            texture.map(|texture| texture.handle),
            bilinear,
        ));
    }

    fn set_fog(&mut self, fog: FogMode) {
        self.calls.push(DeviceCall::Fog(fog));
    }

    fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>) {
        self.calls.push(DeviceCall::PolygonOffset(offset));
    }

    fn set_view_offset(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::ViewOffset(enabled));
    }

    fn bind_target(&mut self, target: Target) {
        self.calls.push(DeviceCall::Target(target));
    }

    fn set_lightmap(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::Lightmap(enabled));
    }

    fn set_shade_model(&mut self, model: ShadeModel) {
        self.calls.push(DeviceCall::ShadeModel(model));
    }

    fn framebuffer_width(&self) -> u32 {
        self.framebuffer_width
    }

    fn begin_emissive_capture(&mut self) {
        self.calls.push(DeviceCall::BeginEmissiveCapture);
    }

    fn end_emissive_capture(&mut self) {
        self.calls.push(DeviceCall::EndEmissiveCapture);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ShaderCall {
    Compile(ProgramHandle),
    Bind(ProgramHandle),
    Upload(ProgramHandle, ProgramUniforms),
    Unbind,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingShaders {
    pub(crate) calls: Vec<ShaderCall>,
    pub(crate) fail: bool,
    compiled: HashSet<ProgramHandle>,
}

impl RecordingShaders {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Compile attempts, including failed ones.
    pub(crate) fn compile_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, ShaderCall::Compile(_)))
            .count()
    }

    /// Whether `program` has compiled successfully at least once.
    pub(crate) fn compiled(&self, program: ProgramHandle) -> bool {
        self.compiled.contains(&program)
    }
}

impl ShaderBackend for RecordingShaders {
    fn compile(&mut self, shader: &MaterialShader) -> Result<(), StateError> {
        self.calls.push(ShaderCall::Compile(shader.handle));
        if self.fail {
            return Err(StateError::ShaderCompile {
                vertex: shader.vertex_source.to_string(),
                fragment: shader.fragment_source.to_string(),
                message: "syntax error".to_string(),
            });
        }
        self.compiled.insert(shader.handle);
        Ok(())
    }

    fn bind(&mut self, program: ProgramHandle) {
        self.calls.push(ShaderCall::Bind(program));
    }

    fn upload_uniforms(&mut self, program: ProgramHandle, uniforms: &ProgramUniforms) {
        self.calls.push(ShaderCall::Upload(program, *uniforms));
    }

    fn unbind(&mut self) {
        self.calls.push(ShaderCall::Unbind);
    }
}

/// A single mipmapped sprite atlas; every other texture is plain.
#[derive(Debug)]
pub(crate) struct AtlasTextures {
    atlas: String,
}

impl AtlasTextures {
    pub(crate) const INFO: AtlasInfo = AtlasInfo {
        width: 1024,
        height: 512,
        sprite_count: 96,
    };

    pub(crate) fn new(atlas: &str) -> Self {
        Self {
            atlas: atlas.to_string(),
        }
    }
}

impl TextureBackend for AtlasTextures {
    fn supports_mipmap(&self, id: &str) -> bool {
        id == self.atlas
    }

    fn atlas_info(&self, id: &str) -> Option<AtlasInfo> {
        (id == self.atlas).then_some(Self::INFO)
    }
}
