//! Interning, encoding and activation of material render states.
//!
//! A [RenderState] is an immutable, deduplicated description of everything the graphics
//! device needs to draw a batch of primitives: texture, blending, depth test, write mask,
//! fog, decal handling, render target, material flags and the shader program. States are
//! packed into a single 64 bit [StateKey] and interned by [StateRegistry] so that they can
//! be addressed by a small index.
//!
//! States are built with a [StateFinder], either directly or through the legacy layer
//! adapter in [layer], and applied to a [GraphicsDevice] by a [StateActivator] which only
//! issues the device commands that differ from the previously active state.
//!
//! Everything is owned by a [RenderStates] context. A process-wide instance is available
//! through [RenderStates::global].

#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![allow(clippy::new_without_default)]

pub use activate::*;
pub use bits::StateKey;
pub use condition::*;
pub use config::*;
pub use context::*;
pub use device::*;
pub use error::*;
pub use finder::*;
pub use property::*;
pub use shader::*;
pub use state::*;
pub use texture::*;

mod activate;
pub mod bits;
mod condition;
mod config;
mod context;
mod device;
mod error;
mod finder;
mod index;
pub mod layer;
mod property;
mod shader;
mod state;
#[cfg(test)]
mod testing;
mod texture;
#[cfg(feature = "wgpu")]
pub mod wgpu;
