/// Vertex array/buffer helper for the raster draw path

use std::sync::Arc;

use glow::HasContext;
use lumen_render::lumen::ra::{RenderPassInput, VarType};
use lumen_render::lumen::{Error, Result};

use crate::gl_ra::GlCtx;

/// Vertex layout state: a stream VBO plus, when available, a VAO capturing
/// the attribute pointers
pub(crate) struct GlVao {
    ctx: Arc<GlCtx>,
    vao: Option<glow::VertexArray>,
    vbo: glow::Buffer,
    stride: usize,
    attribs: Vec<RenderPassInput>,
}

impl GlVao {
    pub(crate) fn new(
        ctx: Arc<GlCtx>,
        has_vao: bool,
        stride: usize,
        attribs: &[RenderPassInput],
    ) -> Result<Self> {
        let gl = &ctx.gl;
        let vbo;
        let mut vao = None;
        unsafe {
            vbo = gl
                .create_buffer()
                .map_err(|e| Error::BackendError(format!("glGenBuffers: {}", e)))?;

            if has_vao {
                let va = gl
                    .create_vertex_array()
                    .map_err(|e| Error::BackendError(format!("glGenVertexArrays: {}", e)))?;
                gl.bind_vertex_array(Some(va));
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
                Self::setup_pointers(gl, stride, attribs, true);
                gl.bind_buffer(glow::ARRAY_BUFFER, None);
                gl.bind_vertex_array(None);
                vao = Some(va);
            }
        }
        Ok(Self {
            ctx,
            vao,
            vbo,
            stride,
            attribs: attribs.to_vec(),
        })
    }

    unsafe fn setup_pointers(
        gl: &glow::Context,
        stride: usize,
        attribs: &[RenderPassInput],
        enable: bool,
    ) {
        for (n, attrib) in attribs.iter().enumerate() {
            let (gl_type, normalized) = match attrib.var_type {
                VarType::Float => (glow::FLOAT, false),
                VarType::ByteUnorm => (glow::UNSIGNED_BYTE, true),
                other => panic!("invalid vertex attribute type {:?}", other),
            };
            if enable {
                gl.enable_vertex_attrib_array(n as u32);
                gl.vertex_attrib_pointer_f32(
                    n as u32,
                    attrib.dim_v as i32,
                    gl_type,
                    normalized,
                    stride as i32,
                    attrib.binding as i32,
                );
            } else {
                gl.disable_vertex_attrib_array(n as u32);
            }
        }
    }

    /// Upload vertex data into the stream VBO and draw.
    pub(crate) fn draw_data(&self, mode: u32, vertex_data: &[u8], vertex_count: usize) {
        let gl = &self.ctx.gl;
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, vertex_data, glow::STREAM_DRAW);

            match self.vao {
                Some(vao) => {
                    gl.bind_vertex_array(Some(vao));
                    gl.draw_arrays(mode, 0, vertex_count as i32);
                    gl.bind_vertex_array(None);
                }
                None => {
                    Self::setup_pointers(gl, self.stride, &self.attribs, true);
                    gl.draw_arrays(mode, 0, vertex_count as i32);
                    Self::setup_pointers(gl, self.stride, &self.attribs, false);
                }
            }

            gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }
}

impl Drop for GlVao {
    fn drop(&mut self) {
        let gl = &self.ctx.gl;
        unsafe {
            if let Some(vao) = self.vao {
                gl.delete_vertex_array(vao);
            }
            gl.delete_buffer(self.vbo);
        }
    }
}
