/// Texture and buffer resource traits and descriptors

use std::any::Any;
use std::sync::Arc;

use crate::ra::format::Format;
use crate::ra::ra::Rect;

/// Descriptor for creating a texture
#[derive(Debug, Clone)]
pub struct TexParams {
    /// Dimensionality (1..3)
    pub dimensions: usize,
    /// Width in pixels
    pub w: usize,
    /// Height in pixels (1 for 1D textures)
    pub h: usize,
    /// Depth in pixels (1 for 1D/2D textures)
    pub d: usize,
    /// Native format; must be renderable if `render_dst` is set
    pub format: Arc<Format>,
    /// Texture can be read from by a render pass
    pub render_src: bool,
    /// Texture can be rendered to (attaches a render target binding)
    pub render_dst: bool,
    /// Sample with linear filtering (requires a filterable format)
    pub src_linear: bool,
    /// Wrap coordinates instead of clamping to the edge
    pub src_repeat: bool,
    /// Use non-normalized (pixel) texture coordinates (2D only)
    pub non_normalized: bool,
    /// Sampled through an external-image sampler (wrapped textures only)
    pub external_oes: bool,
    /// Pixel data uploaded at creation time; dropped after creation
    pub initial_data: Option<Vec<u8>>,
}

impl TexParams {
    /// Plain 2D texture descriptor with all capability flags off
    pub fn new_2d(w: usize, h: usize, format: Arc<Format>) -> Self {
        Self {
            dimensions: 2,
            w,
            h,
            d: 1,
            format,
            render_src: false,
            render_dst: false,
            src_linear: false,
            src_repeat: false,
            non_normalized: false,
            external_oes: false,
            initial_data: None,
        }
    }
}

/// Texture resource trait
///
/// Implemented by backend-specific texture types (e.g. `GlTex`). Owned
/// textures release their native objects when dropped; wrapped textures
/// reference a caller-supplied native handle and release nothing.
pub trait Tex: Send + Sync {
    /// The parameters this texture was created with (`initial_data` cleared)
    fn params(&self) -> &TexParams;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// A CPU-visible, persistently mapped GPU buffer for zero-copy uploads
///
/// The buffer must not be written again while a previous upload from it is
/// still in flight on the GPU; [`MappedBuf::poll`] reports when it is safe
/// to reuse. The layer does not enforce this — poll-before-reuse is caller
/// discipline.
pub trait MappedBuf: Send + Sync {
    /// Buffer size in bytes
    fn size(&self) -> usize;

    /// Copy `data` into the mapping at `offset`
    ///
    /// The range must lie inside the buffer; violating that is a caller bug
    /// and asserts.
    fn write(&self, offset: usize, data: &[u8]);

    /// Non-blocking readiness check
    ///
    /// Resolves and clears an outstanding fence if the GPU has signaled it.
    /// Returns true when no upload from this buffer is in flight; once true,
    /// subsequent polls stay true until the next upload.
    fn poll(&self) -> bool;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// Shader storage buffer resource trait
pub trait Buf: Send + Sync {
    /// Buffer size in bytes
    fn size(&self) -> usize;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// Pixel source of a texture upload
pub enum UploadSource<'a> {
    /// Plain CPU memory; the backend may stage it through an internal
    /// streaming buffer to avoid pipeline stalls
    Bytes(&'a [u8]),
    /// A region of a persistently mapped buffer, starting at `offset`.
    /// The backend installs a fence on the buffer after issuing the copy.
    Mapped {
        buf: &'a Arc<dyn MappedBuf>,
        offset: usize,
    },
}

/// Parameters of a texture upload
pub struct TexUploadParams<'a> {
    /// Destination texture
    pub tex: &'a Arc<dyn Tex>,
    /// Pixel source
    pub src: UploadSource<'a>,
    /// Bytes per source row
    pub stride: usize,
    /// Destination sub-rectangle; None replaces the whole image.
    /// Must be None for 1D and 3D textures.
    pub rect: Option<Rect>,
}
