/// GlRa - OpenGL implementation of the Ra backend trait

use std::sync::Arc;

use glow::HasContext;
use lumen_render::lumen::ra::{
    Buf, CompType, Format, MappedBuf, PixelFormat, Ra, RaCaps, Rect, RenderPass,
    RenderPassParams, RenderPassRunParams, SpecialImgFmt, Tex, TexParams, TexUploadParams,
};
use lumen_render::lumen::{Error, Result};
use lumen_render::{ra_debug, ra_error, ra_info};

use crate::gl_buf::{GlBuf, GlMappedBuf};
use crate::gl_format::{GlFormat, GlFormatFlags, GL_FORMATS};
use crate::gl_renderpass::GlRenderPass;
use crate::gl_tex::GlTex;

/// Shared GL context handle for all resources
///
/// GL contexts are thread-confined and the render layer is single-threaded
/// by contract; the Send/Sync impls below encode that the handles are never
/// actually used from another thread.
pub(crate) struct GlCtx {
    pub(crate) gl: Arc<glow::Context>,
}

unsafe impl Send for GlCtx {}
unsafe impl Sync for GlCtx {}

/// Version and profile information of the active context
#[derive(Debug, Clone, Copy)]
pub struct GlVersionInfo {
    /// Desktop GL version as major*100 + minor*10 (e.g. 210, 440); 0 on ES
    pub version: u32,
    /// GLES version in the same encoding (e.g. 200, 310); 0 on desktop
    pub es: u32,
}

impl GlVersionInfo {
    /// Derive from the glow context
    pub fn query(gl: &glow::Context) -> Self {
        let v = unsafe { gl.version() };
        let encoded = v.major * 100 + v.minor * 10;
        if v.is_embedded {
            Self { version: 0, es: encoded }
        } else {
            Self { version: encoded, es: 0 }
        }
    }

    /// GLSL version this context targets
    pub fn glsl_version(&self) -> u32 {
        if self.es > 0 {
            return match self.es {
                0..=299 => 100,
                300 => 300,
                310 => 310,
                _ => 320,
            };
        }
        match self.version {
            0..=219 => 120,
            220..=309 => 130,
            310..=319 => 140,
            320..=329 => 150,
            v => v,
        }
    }
}

/// Tunables for backend creation
#[derive(Debug, Clone, Copy)]
pub struct GlRaParams {
    /// Effective bit depth the driver stores 16 bit unorm components at.
    /// Drivers without true 16 bit storage round down; 16 assumes full
    /// precision.
    pub tex_depth16: u8,
    /// Stage plain-memory uploads through a streaming pixel buffer
    pub use_pbo: bool,
}

impl Default for GlRaParams {
    fn default() -> Self {
        Self {
            tex_depth16: 16,
            use_pbo: false,
        }
    }
}

/// OpenGL backend context
///
/// Central object implementing the Ra resource and render pass contracts.
/// The context must be current on the calling thread for every method.
pub struct GlRa {
    pub(crate) ctx: Arc<GlCtx>,
    pub(crate) version: GlVersionInfo,
    caps: RaCaps,
    glsl_version: u32,
    glsl_es: bool,
    max_texture_wh: usize,
    formats: Vec<Arc<Format>>,
    /// Table entries parallel to `formats` (index = `Format::native`)
    pub(crate) gl_formats: Vec<GlFormat>,
    pub(crate) use_pbo: bool,
}

impl GlRa {
    /// Initialize the backend over an already current context with default
    /// parameters.
    pub fn new(gl: Arc<glow::Context>) -> Result<Self> {
        Self::with_params(gl, GlRaParams::default())
    }

    /// Initialize the backend over an already current context.
    ///
    /// # Errors
    ///
    /// Fails below the minimum supported version (OpenGL 2.1 / OpenGL ES
    /// 2.0).
    pub fn with_params(gl: Arc<glow::Context>, params: GlRaParams) -> Result<Self> {
        let version = GlVersionInfo::query(&gl);
        if version.version < 210 && version.es < 200 {
            ra_error!("lumen::gl", "At least OpenGL 2.1 or OpenGL ES 2.0 required.");
            return Err(Error::Unsupported(
                "OpenGL 2.1 / OpenGL ES 2.0 required".to_string(),
            ));
        }

        let mut caps = RaCaps::empty();
        if version.version >= 210 || version.es >= 300 {
            caps |= RaCaps::TEX_3D;
        }
        if version.version >= 300 || version.es >= 300 {
            caps |= RaCaps::BLIT;
        }
        if version.version >= 430 || version.es >= 310 {
            caps |= RaCaps::COMPUTE;
        }
        if version.version >= 440 {
            caps |= RaCaps::MAPPED_BUF;
        }

        let extensions: Vec<String> =
            unsafe { gl.supported_extensions() }.iter().cloned().collect();
        let features = Self::feature_flags(version, &extensions);

        ra_info!("lumen::gl", "16 bit texture depth: {}.", params.tex_depth16);

        let mut formats = Vec::new();
        let mut gl_formats = Vec::new();
        for gl_fmt in GL_FORMATS {
            if (gl_fmt.flags & features).is_empty() {
                continue;
            }

            let num_components = gl_fmt.components();
            let mut csize = (gl_fmt.component_bytes() * 8) as u8;
            let mut depth = csize;
            let ctype = gl_fmt.ctype();
            if ctype == CompType::Unorm {
                depth = depth.min(params.tex_depth16); // naive/approximate
            }
            if gl_fmt.flags.contains(GlFormatFlags::F16) {
                depth = 16;
                csize = 32; // always upload as float32 (simpler for us)
            }

            let mut component_size = [0u8; 4];
            let mut component_depth = [0u8; 4];
            for i in 0..num_components {
                component_size[i] = csize;
                component_depth[i] = depth;
            }

            // Special formats for which OpenGL happens to have direct
            // support.
            let special_imgfmt = match gl_fmt.name {
                "rgb565" => Some(SpecialImgFmt {
                    imgfmt: PixelFormat::Rgb565,
                    components: [1, 2, 3, 0],
                    chroma_w: 1,
                    chroma_h: 1,
                    component_bits: 16,
                    component_pad: 0,
                }),
                "appleyp" => Some(SpecialImgFmt {
                    imgfmt: PixelFormat::Uyvy,
                    components: [3, 1, 2, 0],
                    chroma_w: 1,
                    chroma_h: 1,
                    component_bits: 16,
                    component_pad: 0,
                }),
                _ => None,
            };

            formats.push(Arc::new(Format {
                name: gl_fmt.name.to_string(),
                ctype,
                num_components,
                pixel_size: gl_fmt.pixel_bytes(),
                component_size,
                component_depth,
                luminance_alpha: gl_fmt.is_luminance_alpha(),
                linear_filter: gl_fmt.flags.contains(GlFormatFlags::TF),
                renderable: gl_fmt.flags.contains(GlFormatFlags::CR),
                native: Some(gl_formats.len() as u64),
                special_imgfmt,
            }));
            gl_formats.push(*gl_fmt);
        }

        let max_texture_wh = unsafe { gl.get_parameter_i32(glow::MAX_TEXTURE_SIZE) } as usize;

        unsafe { gl.disable(glow::DITHER) };

        ra_debug!("lumen::gl", "initialized with {} texture formats", formats.len());

        Ok(Self {
            ctx: Arc::new(GlCtx { gl }),
            version,
            caps,
            glsl_version: version.glsl_version(),
            glsl_es: version.es > 0,
            max_texture_wh,
            formats,
            gl_formats,
            use_pbo: params.use_pbo,
        })
    }

    /// Feature set the active context satisfies, for format gating
    fn feature_flags(version: GlVersionInfo, extensions: &[String]) -> GlFormatFlags {
        let mut features = GlFormatFlags::empty();
        if version.version >= 210 {
            features |= GlFormatFlags::GL2;
        }
        if version.version >= 300 {
            features |= GlFormatFlags::GL3;
        }
        if version.es >= 200 {
            features |= GlFormatFlags::ES2;
        }
        if version.es >= 300 {
            features |= GlFormatFlags::ES3;
        }
        if extensions.iter().any(|e| e == "GL_APPLE_rgb_422") {
            features |= GlFormatFlags::EXT_APPLE_422;
        }
        features
    }

    pub(crate) fn gl_format(&self, format: &Format) -> Option<&GlFormat> {
        let idx = format.native? as usize;
        self.gl_formats.get(idx)
    }

    /// Wrap an existing, caller-owned GL texture as a render layer texture.
    ///
    /// `gl_format` and `gl_type` may be 0, in which case possibly
    /// nonsensical fallbacks are chosen. 2D textures only; destruction of
    /// the returned object does not delete the GL texture.
    pub fn wrap_texture(
        &self,
        gl_texture: glow::Texture,
        gl_target: u32,
        gl_iformat: u32,
        gl_format: u32,
        gl_type: u32,
        w: usize,
        h: usize,
    ) -> Arc<dyn Tex> {
        GlTex::wrap(
            self,
            Some(gl_texture),
            None,
            gl_target,
            gl_iformat,
            gl_format,
            gl_type,
            w,
            h,
        )
    }

    /// Wrap an existing framebuffer (None = the default framebuffer) as a
    /// render-destination texture. Destruction does not delete the
    /// framebuffer.
    pub fn wrap_framebuffer(
        &self,
        gl_fbo: Option<glow::Framebuffer>,
        w: usize,
        h: usize,
    ) -> Arc<dyn Tex> {
        GlTex::wrap(self, None, gl_fbo, 0, glow::RGBA, 0, 0, w, h)
    }
}

impl Ra for GlRa {
    fn caps(&self) -> RaCaps {
        self.caps
    }

    fn glsl_version(&self) -> u32 {
        self.glsl_version
    }

    fn glsl_es(&self) -> bool {
        self.glsl_es
    }

    fn max_texture_wh(&self) -> usize {
        self.max_texture_wh
    }

    fn formats(&self) -> &[Arc<Format>] {
        &self.formats
    }

    fn tex_create(&self, params: &TexParams) -> Result<Arc<dyn Tex>> {
        GlTex::create(self, params)
    }

    fn tex_upload(&self, params: &TexUploadParams<'_>) -> Result<()> {
        GlTex::upload(self, params)
    }

    fn mapped_buffer_create(&self, size: usize) -> Result<Arc<dyn MappedBuf>> {
        if self.version.version < 440 {
            return Err(Error::Unsupported(
                "persistently mapped buffers need OpenGL 4.4".to_string(),
            ));
        }
        GlMappedBuf::create(self.ctx.clone(), size)
    }

    fn buf_create(&self, size: usize) -> Result<Arc<dyn Buf>> {
        GlBuf::create(self.ctx.clone(), size)
    }

    fn clear(&self, dst: &Arc<dyn Tex>, color: [f32; 4], scissor: Rect) -> Result<()> {
        let gl = &self.ctx.gl;
        let dst_gl = GlTex::concrete(dst)?;
        assert!(dst_gl.params().render_dst);

        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, dst_gl.fbo);

            gl.scissor(scissor.x0, scissor.y0, scissor.width(), scissor.height());

            gl.enable(glow::SCISSOR_TEST);
            gl.clear_color(color[0], color[1], color[2], color[3]);
            gl.clear(glow::COLOR_BUFFER_BIT);
            gl.disable(glow::SCISSOR_TEST);

            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }
        Ok(())
    }

    fn blit(
        &self,
        dst: &Arc<dyn Tex>,
        src: &Arc<dyn Tex>,
        dst_x: i32,
        dst_y: i32,
        src_rc: Rect,
    ) -> Result<()> {
        let gl = &self.ctx.gl;
        let dst_gl = GlTex::concrete(dst)?;
        let src_gl = GlTex::concrete(src)?;

        assert!(dst_gl.params().render_dst);
        assert!(src_gl.params().render_dst); // even src must have a FBO

        let w = src_rc.width();
        let h = src_rc.height();

        unsafe {
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, src_gl.fbo);
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, dst_gl.fbo);
            gl.blit_framebuffer(
                src_rc.x0,
                src_rc.y0,
                src_rc.x1,
                src_rc.y1,
                dst_x,
                dst_y,
                dst_x + w,
                dst_y + h,
                glow::COLOR_BUFFER_BIT,
                glow::NEAREST,
            );
            gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, None);
        }
        Ok(())
    }

    fn renderpass_create(&self, params: &RenderPassParams) -> Result<Arc<dyn RenderPass>> {
        GlRenderPass::create(self, params)
    }

    fn renderpass_run(&self, params: &RenderPassRunParams<'_>) -> Result<()> {
        GlRenderPass::run(self, params)
    }
}

#[cfg(test)]
#[path = "gl_ra_tests.rs"]
mod tests;
