use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use derivative::Derivative;

use crate::{bits::TEXTURE_BITS, error::StateError, index::Indexer};

/// Maximum number of texture handles, including [TextureHandle::NONE].
pub const MAX_TEXTURES: usize = 1 << TEXTURE_BITS;

/// A small stable handle for a texture identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(pub(crate) u32);

impl TextureHandle {
    /// The "no texture" handle.
    pub const NONE: TextureHandle = TextureHandle(0);

    #[allow(missing_docs)]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A texture known to the state system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureState {
    #[allow(missing_docs)]
    pub handle: TextureHandle,
    /// The external identifier, or `None` for [TextureHandle::NONE].
    pub id: Option<Arc<str>>,
}

/// Sprite atlas metadata forwarded to shader programs.
#[allow(missing_docs)]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct AtlasInfo {
    pub width: u32,
    pub height: u32,
    pub sprite_count: u32,
}

/// Host-side texture metadata.
pub trait TextureBackend: Send + Sync {
    /// Whether the texture has mip levels.
    fn supports_mipmap(&self, id: &str) -> bool;

    /// Atlas layout, if the texture is a sprite atlas.
    fn atlas_info(&self, id: &str) -> Option<AtlasInfo>;
}

/// Backend used when the host provides none: no atlases, mipmaps everywhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTextureBackend;

impl TextureBackend for DefaultTextureBackend {
    fn supports_mipmap(&self, _id: &str) -> bool {
        true
    }

    fn atlas_info(&self, _id: &str) -> Option<AtlasInfo> {
        None
    }
}

/// Interning table for texture identifiers.
///
/// Handle 0 is reserved for "no texture"; identifiers get handles from 1 upward in order
/// of first use.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TextureTable {
    ids: Indexer<Arc<str>>,
    #[derivative(Debug = "ignore")]
    backend: Box<dyn TextureBackend>,
}

impl TextureTable {
    #[allow(missing_docs)]
    pub fn new(backend: Box<dyn TextureBackend>) -> Self {
        Self {
            ids: Indexer::new(MAX_TEXTURES - 1),
            backend,
        }
    }

    /// Returns the handle for `id`, creating it on first sight.
    ///
    /// `None` maps to [TextureHandle::NONE].
    pub fn intern(&self, id: Option<&str>) -> Result<TextureHandle, StateError> {
        let id = match id {
            Some(id) => id,
            None => return Ok(TextureHandle::NONE),
        };
        match self.ids.to_index(&Arc::from(id)) {
            Some((index, created)) => {
                let handle = TextureHandle(index + 1);
                if created {
                    tracing::debug!("texture state {} created for {}", handle.0, id);
                }
                Ok(handle)
            }
            None => Err(StateError::TextureCapacityExceeded {
                capacity: MAX_TEXTURES,
            }),
        }
    }

    /// Returns the existing handle for `id` without creating one.
    pub fn find(&self, id: &str) -> Option<TextureHandle> {
        self.ids.get(&Arc::from(id)).map(|index| TextureHandle(index + 1))
    }

    #[allow(missing_docs)]
    pub fn get(&self, handle: TextureHandle) -> Option<TextureState> {
        if handle == TextureHandle::NONE {
            return Some(TextureState { handle, id: None });
        }
        self.ids.key(handle.0 - 1).map(|id| TextureState {
            handle,
            id: Some(id),
        })
    }

    /// Whether the texture has mip levels. "No texture" reports false.
    pub fn supports_mipmap(&self, handle: TextureHandle) -> bool {
        self.get(handle)
            .and_then(|texture| texture.id)
            .map_or(false, |id| self.backend.supports_mipmap(&id))
    }

    #[allow(missing_docs)]
    pub fn atlas_info(&self, handle: TextureHandle) -> Option<AtlasInfo> {
        let id = self.get(handle)?.id?;
        self.backend.atlas_info(&id)
    }

    /// Number of handles issued, including [TextureHandle::NONE].
    pub fn len(&self) -> usize {
        self.ids.len() + 1
    }

    /// Always false; the "no texture" handle always exists.
    pub fn is_empty(&self) -> bool {
        false
    }
}
