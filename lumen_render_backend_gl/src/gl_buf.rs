/// GlMappedBuf / GlBuf - OpenGL buffer resources, and the streaming PBO
/// upload helper

use std::sync::{Arc, Mutex};

use glow::HasContext;
use lumen_render::lumen::ra::{Buf, MappedBuf, Rect};
use lumen_render::lumen::{Error, Result};
use lumen_render::ra_warn;

use crate::gl_ra::GlCtx;

/// Persistently mapped pixel unpack buffer with an upload fence
pub struct GlMappedBuf {
    ctx: Arc<GlCtx>,
    size: usize,
    pub(crate) pbo: glow::Buffer,
    data: *mut u8,
    fence: Mutex<Option<glow::Fence>>,
}

// The mapping pointer is only dereferenced on the context thread; see GlCtx.
unsafe impl Send for GlMappedBuf {}
unsafe impl Sync for GlMappedBuf {}

impl GlMappedBuf {
    pub(crate) fn concrete<'a>(buf: &'a Arc<dyn MappedBuf>) -> Result<&'a GlMappedBuf> {
        buf.as_any()
            .downcast_ref::<GlMappedBuf>()
            .ok_or_else(|| Error::InvalidResource("mapped buffer from another backend".to_string()))
    }

    pub(crate) fn create(ctx: Arc<GlCtx>, size: usize) -> Result<Arc<dyn MappedBuf>> {
        let gl = &ctx.gl;

        let flags = glow::MAP_READ_BIT
            | glow::MAP_WRITE_BIT
            | glow::MAP_PERSISTENT_BIT
            | glow::MAP_COHERENT_BIT;

        let data;
        let pbo;
        unsafe {
            pbo = gl
                .create_buffer()
                .map_err(|e| Error::BackendError(format!("glGenBuffers: {}", e)))?;
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(pbo));
            gl.buffer_storage(
                glow::PIXEL_UNPACK_BUFFER,
                size as i32,
                None,
                flags | glow::CLIENT_STORAGE_BIT,
            );
            data = gl.map_buffer_range(glow::PIXEL_UNPACK_BUFFER, 0, size as i32, flags);
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
            if data.is_null() {
                gl.delete_buffer(pbo);
                return Err(Error::BackendError("mapping buffer failed".to_string()));
            }
        }

        Ok(Arc::new(GlMappedBuf {
            ctx,
            size,
            pbo,
            data,
            fence: Mutex::new(None),
        }))
    }

    /// Arm (or re-arm) the consumption fence after an upload was issued.
    pub(crate) fn install_fence(&self, gl: &glow::Context) {
        let mut fence = self.fence.lock().unwrap();
        unsafe {
            if let Some(old) = fence.take() {
                gl.delete_sync(old);
            }
            *fence = gl.fence_sync(glow::SYNC_GPU_COMMANDS_COMPLETE, 0).ok();
        }
    }
}

impl MappedBuf for GlMappedBuf {
    fn size(&self) -> usize {
        self.size
    }

    fn write(&self, offset: usize, data: &[u8]) {
        assert!(offset + data.len() <= self.size, "write outside the mapping");
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.data.add(offset), data.len());
        }
    }

    fn poll(&self) -> bool {
        let gl = &self.ctx.gl;
        let mut fence = self.fence.lock().unwrap();

        if let Some(sync) = fence.take() {
            let res = unsafe { gl.client_wait_sync(sync, 0, 0) }; // non-blocking
            if res == glow::ALREADY_SIGNALED {
                unsafe { gl.delete_sync(sync) };
            } else {
                *fence = Some(sync);
            }
        }

        fence.is_none()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlMappedBuf {
    fn drop(&mut self) {
        let gl = &self.ctx.gl;
        unsafe {
            // Unmapping while the GPU still reads the buffer is a
            // use-after-unmap; wait for the outstanding fence first.
            if let Some(sync) = self.fence.lock().unwrap().take() {
                gl.client_wait_sync(sync, glow::SYNC_FLUSH_COMMANDS_BIT, 1_000_000_000);
                gl.delete_sync(sync);
            }
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(self.pbo));
            gl.unmap_buffer(glow::PIXEL_UNPACK_BUFFER);
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
            gl.delete_buffer(self.pbo);
        }
    }
}

// ============================================================================
// Shader storage buffer
// ============================================================================

/// Shader storage buffer object
pub struct GlBuf {
    ctx: Arc<GlCtx>,
    size: usize,
    pub(crate) buffer: glow::Buffer,
}

impl GlBuf {
    pub(crate) fn concrete<'a>(buf: &'a Arc<dyn Buf>) -> Result<&'a GlBuf> {
        buf.as_any()
            .downcast_ref::<GlBuf>()
            .ok_or_else(|| Error::InvalidResource("buffer from another backend".to_string()))
    }

    pub(crate) fn create(ctx: Arc<GlCtx>, size: usize) -> Result<Arc<dyn Buf>> {
        let gl = &ctx.gl;
        let buffer;
        unsafe {
            buffer = gl
                .create_buffer()
                .map_err(|e| Error::BackendError(format!("glGenBuffers: {}", e)))?;
            gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, Some(buffer));
            gl.buffer_data_size(glow::SHADER_STORAGE_BUFFER, size as i32, glow::DYNAMIC_COPY);
            gl.bind_buffer(glow::SHADER_STORAGE_BUFFER, None);
        }
        Ok(Arc::new(GlBuf { ctx, size, buffer }))
    }
}

impl Buf for GlBuf {
    fn size(&self) -> usize {
        self.size
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlBuf {
    fn drop(&mut self) {
        unsafe { self.ctx.gl.delete_buffer(self.buffer) };
    }
}

// ============================================================================
// Streaming PBO uploader
// ============================================================================

const NUM_PBO_BUFFERS: usize = 3;

/// Ring of stream-draw pixel buffers for stall-free plain-memory uploads
///
/// Per-texture state; only 2D uploads go through here. When disabled, rows
/// are submitted directly from client memory.
pub(crate) struct PboUploader {
    buffers: [Option<glow::Buffer>; NUM_PBO_BUFFERS],
    index: usize,
    buffer_size: usize,
}

impl PboUploader {
    pub(crate) fn new() -> Self {
        Self {
            buffers: [None; NUM_PBO_BUFFERS],
            index: 0,
            buffer_size: 0,
        }
    }

    /// Upload a sub-rectangle into the currently bound 2D texture.
    ///
    /// `src` is client memory, or None when the pixel source is the bound
    /// PIXEL_UNPACK_BUFFER at `buffer_offset` (mapped-buffer uploads).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn upload_tex(
        &mut self,
        ctx: &GlCtx,
        use_pbo: bool,
        target: u32,
        format: u32,
        type_: u32,
        pixel_bytes: usize,
        src: Option<&[u8]>,
        buffer_offset: usize,
        stride: usize,
        rc: Rect,
    ) {
        let gl = &ctx.gl;
        let w = rc.width() as usize;
        let h = rc.height() as usize;
        let row_bytes = w * pixel_bytes;
        if w == 0 || h == 0 {
            return;
        }

        unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);

            let src = match src {
                None => {
                    // Source is the bound unpack buffer; rows are tightly
                    // packed unless the stride says otherwise.
                    self.set_row_length(gl, stride, pixel_bytes, w);
                    gl.tex_sub_image_2d(
                        target,
                        0,
                        rc.x0,
                        rc.y0,
                        w as i32,
                        h as i32,
                        format,
                        type_,
                        glow::PixelUnpackData::BufferOffset(buffer_offset as u32),
                    );
                    self.reset_row_length(gl);
                    gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
                    return;
                }
                Some(src) => src,
            };

            if !use_pbo {
                self.set_row_length(gl, stride, pixel_bytes, w);
                if stride == row_bytes || stride % pixel_bytes == 0 {
                    gl.tex_sub_image_2d(
                        target,
                        0,
                        rc.x0,
                        rc.y0,
                        w as i32,
                        h as i32,
                        format,
                        type_,
                        glow::PixelUnpackData::Slice(&src[..stride * (h - 1) + row_bytes]),
                    );
                } else {
                    // Odd stride: submit row by row
                    for row in 0..h {
                        let line = &src[row * stride..row * stride + row_bytes];
                        gl.tex_sub_image_2d(
                            target,
                            0,
                            rc.x0,
                            rc.y0 + row as i32,
                            w as i32,
                            1,
                            format,
                            type_,
                            glow::PixelUnpackData::Slice(line),
                        );
                    }
                }
                self.reset_row_length(gl);
                gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
                return;
            }

            // PBO path: pack the rows tightly into the next ring buffer,
            // orphaning its previous storage to avoid a sync point.
            let needed = row_bytes * h;
            if self.buffer_size < needed {
                self.uninit(gl);
                self.buffer_size = needed;
            }
            let pbo = match self.buffers[self.index] {
                Some(pbo) => pbo,
                None => match gl.create_buffer() {
                    Ok(pbo) => {
                        self.buffers[self.index] = Some(pbo);
                        pbo
                    }
                    Err(e) => {
                        ra_warn!("lumen::gl", "PBO allocation failed ({}), uploading directly", e);
                        gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
                        self.upload_tex(
                            ctx, false, target, format, type_, pixel_bytes, Some(src),
                            0, stride, rc,
                        );
                        return;
                    }
                },
            };
            self.index = (self.index + 1) % NUM_PBO_BUFFERS;

            let packed: Vec<u8> = if stride == row_bytes {
                src[..needed].to_vec()
            } else {
                let mut packed = Vec::with_capacity(needed);
                for row in 0..h {
                    packed.extend_from_slice(&src[row * stride..row * stride + row_bytes]);
                }
                packed
            };

            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, Some(pbo));
            gl.buffer_data_size(glow::PIXEL_UNPACK_BUFFER, self.buffer_size as i32, glow::STREAM_DRAW);
            gl.buffer_sub_data_u8_slice(glow::PIXEL_UNPACK_BUFFER, 0, &packed);
            gl.tex_sub_image_2d(
                target,
                0,
                rc.x0,
                rc.y0,
                w as i32,
                h as i32,
                format,
                type_,
                glow::PixelUnpackData::BufferOffset(0),
            );
            gl.bind_buffer(glow::PIXEL_UNPACK_BUFFER, None);
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 4);
        }
    }

    unsafe fn set_row_length(&self, gl: &glow::Context, stride: usize, pixel_bytes: usize, w: usize) {
        if stride != w * pixel_bytes && stride % pixel_bytes == 0 {
            gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, (stride / pixel_bytes) as i32);
        }
    }

    unsafe fn reset_row_length(&self, gl: &glow::Context) {
        gl.pixel_store_i32(glow::UNPACK_ROW_LENGTH, 0);
    }

    pub(crate) fn uninit(&mut self, gl: &glow::Context) {
        for pbo in self.buffers.iter_mut() {
            if let Some(pbo) = pbo.take() {
                unsafe { gl.delete_buffer(pbo) };
            }
        }
        self.buffer_size = 0;
        self.index = 0;
    }
}
