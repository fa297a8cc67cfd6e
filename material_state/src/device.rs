//! The graphics device capability that state activation drives.
//!
//! Implementations wrap the host's graphics context. Every method sets absolute state, so
//! repeating a call with the same arguments must be harmless.

use crate::{property::Target, texture::TextureState};

/// Primitive topology values stored in a [crate::StateKey].
///
/// These match the legacy GL enumerants, which all fit in three bits.
pub mod primitive {
    #![allow(missing_docs)]

    pub const POINTS: u8 = 0;
    pub const LINES: u8 = 1;
    pub const LINE_LOOP: u8 = 2;
    pub const LINE_STRIP: u8 = 3;
    pub const TRIANGLES: u8 = 4;
    pub const TRIANGLE_STRIP: u8 = 5;
    pub const TRIANGLE_FAN: u8 = 6;
    pub const QUADS: u8 = 7;
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunc {
    Never,
    Always,
    Equal,
    LessEqual,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    DstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// Separate color and alpha blend factors. The blend equation is always addition.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendFunc {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    /// A blend function using the same factors for color and alpha.
    pub const fn uniform(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_color: src,
            dst_color: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FogMode {
    Off,
    Standard,
    Black,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadeModel {
    Flat,
    Smooth,
}

/// Depth offset applied to polygon-offset decals.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

/// Commands issued by [crate::StateActivator].
#[allow(missing_docs)]
pub trait GraphicsDevice {
    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_func(&mut self, func: CompareFunc);
    fn set_depth_mask(&mut self, write: bool);
    fn set_color_mask(&mut self, write: bool);
    /// `None` disables blending.
    fn set_blend(&mut self, func: Option<BlendFunc>);
    fn set_cull(&mut self, enabled: bool);
    fn set_line_width(&mut self, width: f32);
    /// `None` unbinds the current texture.
    fn bind_texture(&mut self, texture: Option<&TextureState>, bilinear: bool);
    fn set_fog(&mut self, fog: FogMode);
    fn set_polygon_offset(&mut self, offset: Option<PolygonOffset>);
    /// Scales view-space depth slightly toward the camera.
    fn set_view_offset(&mut self, enabled: bool);
    fn bind_target(&mut self, target: Target);
    fn set_lightmap(&mut self, enabled: bool);
    fn set_shade_model(&mut self, model: ShadeModel);
    fn framebuffer_width(&self) -> u32;

    /// Called after the target switch when bloom is enabled.
    fn begin_emissive_capture(&mut self) {}
    /// Called before teardown when bloom is enabled.
    fn end_emissive_capture(&mut self) {}
}
