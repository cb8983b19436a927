/// Ra trait - the backend interface every GPU implementation provides

use std::sync::Arc;

use crate::error::Result;
use crate::ra::format::Format;
use crate::ra::renderpass::{RenderPass, RenderPassParams, RenderPassRunParams};
use crate::ra::tex::{Buf, MappedBuf, Tex, TexParams, TexUploadParams};

use bitflags::bitflags;

bitflags! {
    /// Optional backend capabilities
    ///
    /// Queried once after backend initialization; callers must check the
    /// relevant bit before using 1D/3D textures, blits, compute passes or
    /// persistently mapped buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RaCaps: u32 {
        /// 1D textures are supported
        const TEX_1D = 1 << 0;
        /// 3D textures are supported
        const TEX_3D = 1 << 1;
        /// [`Ra::blit`] is supported
        const BLIT = 1 << 2;
        /// Compute passes are supported
        const COMPUTE = 1 << 3;
        /// Persistently mapped buffers are supported
        const MAPPED_BUF = 1 << 4;
    }
}

/// Integer pixel rectangle, endpoint-exclusive ({x0,y0} inclusive, {x1,y1}
/// exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Rect {
    /// Create a rectangle from its two corners
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle covering `{0, 0, w, h}`
    pub fn spanning(w: i32, h: i32) -> Self {
        Self { x0: 0, y0: 0, x1: w, y1: h }
    }

    /// Width in pixels
    pub fn width(&self) -> i32 {
        self.x1 - self.x0
    }

    /// Height in pixels
    pub fn height(&self) -> i32 {
        self.y1 - self.y0
    }
}

/// Main backend trait
///
/// This is the central interface the render layer dispatches through. It
/// covers the format registry, the resource layer (textures, mapped buffers,
/// storage buffers) and the render pass engine. Implemented by
/// backend-specific contexts (e.g. `GlRa`).
///
/// All resources returned by the factory methods are destroyed when their
/// last reference is dropped.
pub trait Ra: Send + Sync {
    /// Capability bits of this backend
    fn caps(&self) -> RaCaps;

    /// GLSL version the shader assembler should target (e.g. 130, 300, 430)
    fn glsl_version(&self) -> u32;

    /// Whether the shading language target is an embedded (ES) profile
    fn glsl_es(&self) -> bool;

    /// Maximum width/height of a texture
    fn max_texture_wh(&self) -> usize;

    /// Native texture formats, enumerated once at initialization
    fn formats(&self) -> &[Arc<Format>];

    /// Create a texture
    ///
    /// # Arguments
    ///
    /// * `params` - Texture descriptor (dimensionality, extents, format,
    ///   capability flags)
    ///
    /// # Errors
    ///
    /// Fails if `render_dst` is requested on a non-renderable format, or if
    /// render-target validation fails after attachment. Both are non-fatal;
    /// the caller decides whether to degrade or abort.
    fn tex_create(&self, params: &TexParams) -> Result<Arc<dyn Tex>>;

    /// Upload pixel data into a texture
    ///
    /// 2D uploads may be restricted to a sub-rectangle; 1D/3D uploads always
    /// replace the whole image. When the source is a mapped buffer, the
    /// backend installs a fence on the buffer so it is not reused while the
    /// GPU still reads from it.
    fn tex_upload(&self, params: &TexUploadParams<'_>) -> Result<()>;

    /// Create a persistently mapped, CPU-visible buffer of `size` bytes
    ///
    /// # Errors
    ///
    /// Fails with [`crate::lumen::Error::Unsupported`] if the backend lacks
    /// persistent mapping support (see [`RaCaps::MAPPED_BUF`]).
    fn mapped_buffer_create(&self, size: usize) -> Result<Arc<dyn MappedBuf>>;

    /// Create a shader storage buffer of `size` bytes
    fn buf_create(&self, size: usize) -> Result<Arc<dyn Buf>>;

    /// Clear a region of a render target to a constant color
    ///
    /// `dst` must have been created with `render_dst`.
    fn clear(&self, dst: &Arc<dyn Tex>, color: [f32; 4], scissor: Rect) -> Result<()>;

    /// Copy a rectangle from `src` into `dst` at `(dst_x, dst_y)`
    ///
    /// Both textures must have been created with `render_dst` — the source
    /// too, because the copy path multiplexes source and destination
    /// framebuffer bindings.
    fn blit(
        &self,
        dst: &Arc<dyn Tex>,
        src: &Arc<dyn Tex>,
        dst_x: i32,
        dst_y: i32,
        src_rc: Rect,
    ) -> Result<()>;

    /// Compile a render pass from the given parameters
    ///
    /// The pass owns a deep copy of the declared input schema and source
    /// text. If `params.cached_program` holds a previously serialized
    /// binary, the backend tries to load it first and silently falls back to
    /// full compilation.
    ///
    /// # Errors
    ///
    /// Fails if compilation and linking both fail; shader source and
    /// compiler logs are reported through the logging layer, not the error.
    fn renderpass_create(&self, params: &RenderPassParams) -> Result<Arc<dyn RenderPass>>;

    /// Execute a render pass (draw or compute dispatch)
    ///
    /// Bindings established from `params.values` are visible to this
    /// invocation and unbound again before the call returns. A compute
    /// dispatch is followed by a full memory barrier, so later passes that
    /// sample textures written by the dispatch observe up-to-date data.
    fn renderpass_run(&self, params: &RenderPassRunParams<'_>) -> Result<()>;
}
