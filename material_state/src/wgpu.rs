//! Pipeline state for drawing a [RenderState] with wgpu.
//!
//! wgpu bakes most device state into the render pipeline, so instead of issuing device
//! commands these functions describe the pipeline a state needs.

use crate::{
    device::{primitive, BlendFactor, BlendFunc},
    property::{Decal, DepthTest},
    state::RenderState,
};

/// Topology and culling. Quads and fans are expected to be triangulated by the caller.
pub fn primitive_state(state: &RenderState) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: match state.primitive {
            primitive::POINTS => wgpu::PrimitiveTopology::PointList,
            primitive::LINES | primitive::LINE_LOOP => wgpu::PrimitiveTopology::LineList,
            primitive::LINE_STRIP => wgpu::PrimitiveTopology::LineStrip,
            primitive::TRIANGLE_STRIP => wgpu::PrimitiveTopology::TriangleStrip,
            _ => wgpu::PrimitiveTopology::TriangleList,
        },
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: if state.cull {
            Some(wgpu::Face::Back)
        } else {
            None
        },
        ..Default::default()
    }
}

/// Depth test, depth writes and polygon offset for a depth attachment of `format`.
pub fn depth_stencil_state(
    state: &RenderState,
    format: wgpu::TextureFormat,
) -> wgpu::DepthStencilState {
    // A disabled depth test also disables depth writes.
    let depth_write_enabled =
        state.depth_test != DepthTest::Disable && state.write_mask.writes_depth();
    let bias = if state.decal == Decal::PolygonOffset {
        wgpu::DepthBiasState {
            constant: Decal::POLYGON_OFFSET.units as i32,
            slope_scale: Decal::POLYGON_OFFSET.factor,
            clamp: 0.0,
        }
    } else {
        wgpu::DepthBiasState::default()
    };
    wgpu::DepthStencilState {
        format,
        depth_write_enabled,
        depth_compare: match state.depth_test {
            DepthTest::Disable | DepthTest::Always => wgpu::CompareFunction::Always,
            DepthTest::Equal => wgpu::CompareFunction::Equal,
            DepthTest::LEqual => wgpu::CompareFunction::LessEqual,
        },
        stencil: wgpu::StencilState::default(),
        bias,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
    }
}

fn blend_component(src: BlendFactor, dst: BlendFactor) -> wgpu::BlendComponent {
    wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation: wgpu::BlendOperation::Add,
    }
}

/// The blend state, or `None` for opaque states.
pub fn blend_state(state: &RenderState) -> Option<wgpu::BlendState> {
    state.transparency.blend_func().map(|func: BlendFunc| wgpu::BlendState {
        color: blend_component(func.src_color, func.dst_color),
        alpha: blend_component(func.src_alpha, func.dst_alpha),
    })
}

#[allow(missing_docs)]
pub fn color_writes(state: &RenderState) -> wgpu::ColorWrites {
    if state.write_mask.writes_color() {
        wgpu::ColorWrites::ALL
    } else {
        wgpu::ColorWrites::empty()
    }
}

/// The color target for an attachment of `format`.
pub fn color_target_state(
    state: &RenderState,
    format: wgpu::TextureFormat,
) -> wgpu::ColorTargetState {
    wgpu::ColorTargetState {
        format,
        blend: blend_state(state),
        write_mask: color_writes(state),
    }
}
