/// GlTex - OpenGL implementation of the Tex trait

use std::sync::{Arc, Mutex};

use glow::HasContext;
use lumen_render::lumen::ra::{
    CompType, Format, Ra, Tex, TexParams, TexUploadParams, UploadSource,
};
use lumen_render::lumen::{Error, Result};
use lumen_render::{ra_bail, ra_error};

use crate::gl_buf::{GlMappedBuf, PboUploader};
use crate::gl_format::{TEXTURE_EXTERNAL_OES, TEXTURE_RECTANGLE};
use crate::gl_ra::{GlCtx, GlRa};

/// OpenGL texture (optionally with an attached framebuffer)
pub struct GlTex {
    ctx: Arc<GlCtx>,
    params: TexParams,
    pub(crate) target: u32,
    pub(crate) texture: Option<glow::Texture>,
    pub(crate) fbo: Option<glow::Framebuffer>,
    pub(crate) internal_format: u32,
    pub(crate) format: u32,
    pub(crate) type_: u32,
    /// Wrapped textures reference caller-owned objects and delete nothing
    own_objects: bool,
    /// Streaming upload state for plain-memory sources
    pbo: Mutex<PboUploader>,
}

impl GlTex {
    /// Downcast a trait object created by this backend
    pub(crate) fn concrete(tex: &Arc<dyn Tex>) -> Result<&GlTex> {
        tex.as_any()
            .downcast_ref::<GlTex>()
            .ok_or_else(|| Error::InvalidResource("texture from another backend".to_string()))
    }

    pub(crate) fn create(ra: &GlRa, params: &TexParams) -> Result<Arc<dyn Tex>> {
        let gl = &ra.ctx.gl;

        let gl_fmt = *ra
            .gl_format(&params.format)
            .ok_or_else(|| Error::InvalidResource("format not from this backend".to_string()))?;

        if params.dimensions == 1 {
            // glow has no 1D texture entry points; the capability bit is
            // never advertised by this backend.
            ra_bail!("lumen::gl", "1D textures not supported by this backend");
        }
        let target = match params.dimensions {
            2 => glow::TEXTURE_2D,
            3 => glow::TEXTURE_3D,
            other => panic!("invalid texture dimensionality {}", other),
        };
        let target = if params.non_normalized {
            assert!(params.dimensions == 2);
            TEXTURE_RECTANGLE
        } else {
            target
        };

        let initial = params.initial_data.as_deref();

        let texture;
        unsafe {
            texture = gl
                .create_texture()
                .map_err(|e| Error::BackendError(format!("glGenTextures: {}", e)))?;
            gl.bind_texture(target, Some(texture));

            let filter = if params.src_linear {
                glow::LINEAR
            } else {
                glow::NEAREST
            };
            let wrap = if params.src_repeat {
                glow::REPEAT
            } else {
                glow::CLAMP_TO_EDGE
            };
            gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, filter as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, filter as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, wrap as i32);
            if params.dimensions > 1 {
                gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, wrap as i32);
            }
            if params.dimensions > 2 {
                gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, wrap as i32);
            }

            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            match params.dimensions {
                3 => gl.tex_image_3d(
                    target,
                    0,
                    gl_fmt.internal_format as i32,
                    params.w as i32,
                    params.h as i32,
                    params.d as i32,
                    0,
                    gl_fmt.format,
                    gl_fmt.type_,
                    initial,
                ),
                _ => gl.tex_image_2d(
                    target,
                    0,
                    gl_fmt.internal_format as i32,
                    params.w as i32,
                    params.h as i32,
                    0,
                    gl_fmt.format,
                    gl_fmt.type_,
                    initial,
                ),
            }
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);

            gl.bind_texture(target, None);
        }

        let mut params = params.clone();
        params.initial_data = None;

        let mut tex = GlTex {
            ctx: ra.ctx.clone(),
            params,
            target,
            texture: Some(texture),
            fbo: None,
            internal_format: gl_fmt.internal_format,
            format: gl_fmt.format,
            type_: gl_fmt.type_,
            own_objects: true,
            pbo: Mutex::new(PboUploader::new()),
        };

        if tex.params.render_dst {
            if !tex.params.format.renderable {
                ra_error!(
                    "lumen::gl",
                    "Trying to create renderable texture with unsupported format."
                );
                return Err(Error::InvalidResource(
                    "format is not renderable".to_string(),
                ));
            }

            unsafe {
                let fbo = gl
                    .create_framebuffer()
                    .map_err(|e| Error::BackendError(format!("glGenFramebuffers: {}", e)))?;
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0,
                    glow::TEXTURE_2D,
                    Some(texture),
                    0,
                );
                let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
                gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                tex.fbo = Some(fbo);

                if status != glow::FRAMEBUFFER_COMPLETE {
                    ra_error!(
                        "lumen::gl",
                        "Error: framebuffer completeness check failed (error={}).",
                        status
                    );
                    return Err(Error::InvalidResource(
                        "framebuffer incomplete".to_string(),
                    ));
                }
            }
        }

        Ok(Arc::new(tex))
    }

    /// Wrap a caller-owned texture and/or framebuffer. Picks a registered
    /// format matching the GL enums, or a placeholder dummy format so the
    /// wrapper stays usable as a blit/clear target.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn wrap(
        ra: &GlRa,
        gl_texture: Option<glow::Texture>,
        gl_fbo: Option<glow::Framebuffer>,
        gl_target: u32,
        gl_iformat: u32,
        gl_format: u32,
        gl_type: u32,
        w: usize,
        h: usize,
    ) -> Arc<dyn Tex> {
        let is_fbo = gl_texture.is_none();
        let format = find_similar_format(ra, gl_iformat, gl_format, gl_type)
            .unwrap_or_else(|| dummy_format(is_fbo));

        let params = TexParams {
            dimensions: 2,
            w,
            h,
            d: 1,
            format,
            render_dst: is_fbo,
            render_src: !is_fbo,
            src_linear: false,
            src_repeat: false,
            non_normalized: gl_target == TEXTURE_RECTANGLE,
            external_oes: gl_target == TEXTURE_EXTERNAL_OES,
            initial_data: None,
        };

        Arc::new(GlTex {
            ctx: ra.ctx.clone(),
            params,
            target: gl_target,
            texture: gl_texture,
            fbo: gl_fbo,
            internal_format: gl_iformat,
            format: gl_format,
            type_: gl_type,
            own_objects: false,
            pbo: Mutex::new(PboUploader::new()),
        })
    }

    pub(crate) fn upload(ra: &GlRa, params: &TexUploadParams<'_>) -> Result<()> {
        let gl = &ra.ctx.gl;
        let tex = Self::concrete(params.tex)?;
        let tex_params = &tex.params;

        let (mapped_buf, buffer_offset, plain): (Option<&GlMappedBuf>, usize, Option<&[u8]>) =
            match &params.src {
                UploadSource::Bytes(data) => (None, 0, Some(data)),
                UploadSource::Mapped { buf, offset } => {
                    (Some(GlMappedBuf::concrete(buf)?), *offset, None)
                }
            };

        unsafe {
            if let Some(buf) = mapped_buf {
                gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(buf.pbo));
            }

            gl.bind_texture(tex.target, tex.texture);

            match tex_params.dimensions {
                3 => {
                    assert!(params.rect.is_none());
                    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
                    let pixels = match plain {
                        Some(data) => glow::PixelUnpackData::Slice(data),
                        None => glow::PixelUnpackData::BufferOffset(buffer_offset as u32),
                    };
                    gl.tex_sub_image_3d(
                        glow::TEXTURE_3D,
                        0,
                        0,
                        0,
                        0,
                        tex_params.w as i32,
                        tex_params.h as i32,
                        tex_params.d as i32,
                        tex.format,
                        tex.type_,
                        pixels,
                    );
                    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
                }
                _ => {
                    let rc = params.rect.unwrap_or(lumen_render::lumen::ra::Rect::spanning(
                        tex_params.w as i32,
                        tex_params.h as i32,
                    ));
                    let pixel_bytes = tex_params.format.pixel_size;
                    let mut pbo = tex.pbo.lock().unwrap();
                    pbo.upload_tex(
                        &ra.ctx,
                        ra.use_pbo && mapped_buf.is_none(),
                        tex.target,
                        tex.format,
                        tex.type_,
                        pixel_bytes,
                        plain,
                        buffer_offset,
                        params.stride,
                        rc,
                    );
                }
            }

            gl.bind_texture(tex.target, None);

            if let Some(buf) = mapped_buf {
                gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
                // The buffer must not be reused until GL is done with it. If
                // a previous operation is pending, "update" it by creating a
                // new fence that covers the previous operation as well.
                buf.install_fence(gl);
            }
        }
        Ok(())
    }
}

impl Tex for GlTex {
    fn params(&self) -> &TexParams {
        &self.params
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlTex {
    fn drop(&mut self) {
        let gl = &self.ctx.gl;
        unsafe {
            if self.own_objects {
                if let Some(fbo) = self.fbo {
                    gl.delete_framebuffer(fbo);
                }
                if let Some(texture) = self.texture {
                    gl.delete_texture(texture);
                }
            }
            self.pbo.lock().unwrap().uninit(gl);
        }
    }
}

/// Placeholder formats for wrapped objects whose GL enums match nothing
/// registered. Tagged renderable so the wrapper works as a blit/clear
/// target.
fn dummy_format(is_fbo: bool) -> Arc<Format> {
    Arc::new(Format {
        name: if is_fbo { "unknown_fbo" } else { "unknown_tex" }.to_string(),
        ctype: CompType::Unorm,
        num_components: 0,
        pixel_size: 0,
        component_size: [0; 4],
        component_depth: [0; 4],
        luminance_alpha: false,
        linear_filter: !is_fbo,
        renderable: true,
        native: None,
        special_imgfmt: None,
    })
}

fn find_similar_format(
    ra: &GlRa,
    gl_iformat: u32,
    gl_format: u32,
    gl_type: u32,
) -> Option<Arc<Format>> {
    if gl_iformat == 0 && gl_format == 0 && gl_type == 0 {
        return None;
    }
    for fmt in ra.formats() {
        if let Some(gl_fmt) = ra.gl_format(fmt) {
            if (gl_fmt.internal_format == gl_iformat || gl_iformat == 0)
                && (gl_fmt.format == gl_format || gl_format == 0)
                && (gl_fmt.type_ == gl_type || gl_type == 0)
            {
                return Some(fmt.clone());
            }
        }
    }
    None
}
