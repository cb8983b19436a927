/// Mock backend for unit tests (no GPU required)
///
/// This mock implements the full `Ra` contract against plain memory, so the
/// format registry, shader cache and resource layer can be tested without a
/// real GPU or graphics context.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::ra::{
    Buf, CompType, Format, InputVal, MappedBuf, PixelFormat, Ra, RaCaps, Rect, RenderPass,
    RenderPassParams, RenderPassRunParams, RenderPassType, SpecialImgFmt, Tex, TexParams,
    TexUploadParams, UploadSource,
};

// ============================================================================
// Format helpers
// ============================================================================

/// Regular unorm format: `bytes` per component, `n` components, filterable
/// and renderable.
pub fn unorm_fmt(name: &str, bytes: usize, n: usize) -> Arc<Format> {
    Arc::new(Format {
        name: name.to_string(),
        ctype: CompType::Unorm,
        num_components: n,
        pixel_size: bytes * n,
        component_size: sized([bytes as u8 * 8; 4], n),
        component_depth: sized([bytes as u8 * 8; 4], n),
        luminance_alpha: false,
        linear_filter: true,
        renderable: true,
        native: None,
        special_imgfmt: None,
    })
}

/// Regular uint format (not filterable).
pub fn uint_fmt(name: &str, bytes: usize, n: usize) -> Arc<Format> {
    Arc::new(Format {
        name: name.to_string(),
        ctype: CompType::Uint,
        num_components: n,
        pixel_size: bytes * n,
        component_size: sized([bytes as u8 * 8; 4], n),
        component_depth: sized([bytes as u8 * 8; 4], n),
        luminance_alpha: false,
        linear_filter: false,
        renderable: false,
        native: None,
        special_imgfmt: None,
    })
}

/// Float16-internal format with 32 bit transfer.
pub fn float16_fmt(name: &str, n: usize) -> Arc<Format> {
    Arc::new(Format {
        name: name.to_string(),
        ctype: CompType::Float,
        num_components: n,
        pixel_size: 4 * n,
        component_size: sized([32; 4], n),
        component_depth: sized([16; 4], n),
        luminance_alpha: false,
        linear_filter: true,
        renderable: true,
        native: None,
        special_imgfmt: None,
    })
}

/// Packed RGB565 format with the backend-declared special descriptor.
pub fn rgb565_fmt() -> Arc<Format> {
    Arc::new(Format {
        name: "rgb565".to_string(),
        ctype: CompType::Unorm,
        num_components: 3,
        pixel_size: 2,
        component_size: [5, 6, 5, 0],
        component_depth: [5, 6, 5, 0],
        luminance_alpha: false,
        linear_filter: true,
        renderable: true,
        native: None,
        special_imgfmt: Some(SpecialImgFmt {
            imgfmt: PixelFormat::Rgb565,
            components: [1, 2, 3, 0],
            chroma_w: 1,
            chroma_h: 1,
            component_bits: 16,
            component_pad: 0,
        }),
    })
}

fn sized(mut sizes: [u8; 4], n: usize) -> [u8; 4] {
    for s in sizes.iter_mut().skip(n) {
        *s = 0;
    }
    sizes
}

// ============================================================================
// Mock Tex
// ============================================================================

#[derive(Debug)]
pub struct MockTex {
    pub params: TexParams,
    pub name: String,
}

impl Tex for MockTex {
    fn params(&self) -> &TexParams {
        &self.params
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock MappedBuf
// ============================================================================

/// GPU-consumption fence states of the mock mapped buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FenceState {
    /// No upload outstanding
    Idle,
    /// Upload issued, GPU "still reading"
    Pending,
    /// GPU signaled completion; next poll resolves it
    Signaled,
}

#[derive(Debug)]
pub struct MockMappedBuf {
    size: usize,
    pub data: Mutex<Vec<u8>>,
    fence: Mutex<FenceState>,
    /// Number of Signaled -> Idle transitions observed by poll()
    pub resolves: AtomicUsize,
}

impl MockMappedBuf {
    /// Test hook: simulate the GPU signaling the outstanding fence.
    pub fn gpu_signal(&self) {
        let mut fence = self.fence.lock().unwrap();
        if *fence == FenceState::Pending {
            *fence = FenceState::Signaled;
        }
    }

    fn install_fence(&self) {
        *self.fence.lock().unwrap() = FenceState::Pending;
    }
}

impl MappedBuf for MockMappedBuf {
    fn size(&self) -> usize {
        self.size
    }

    fn write(&self, offset: usize, data: &[u8]) {
        let mut mapping = self.data.lock().unwrap();
        assert!(offset + data.len() <= mapping.len(), "write outside the mapping");
        mapping[offset..offset + data.len()].copy_from_slice(data);
    }

    fn poll(&self) -> bool {
        let mut fence = self.fence.lock().unwrap();
        match *fence {
            FenceState::Idle => true,
            FenceState::Pending => false,
            FenceState::Signaled => {
                *fence = FenceState::Idle;
                self.resolves.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock Buf
// ============================================================================

#[derive(Debug)]
pub struct MockBuf {
    pub size: usize,
}

impl Buf for MockBuf {
    fn size(&self) -> usize {
        self.size
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// Mock RenderPass
// ============================================================================

pub struct MockRenderPass {
    pub params: RenderPassParams,
    alive: Arc<AtomicUsize>,
}

impl RenderPass for MockRenderPass {
    fn params(&self) -> &RenderPassParams {
        &self.params
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for MockRenderPass {
    fn drop(&mut self) {
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Call records
// ============================================================================

#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub tex_name: String,
    pub mapped: bool,
    pub rect: Option<Rect>,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    /// Identity of the executed pass (pointer value)
    pub pass_id: usize,
    /// Input slot indices that received a value this run
    pub value_indices: Vec<usize>,
    /// The values themselves, in slot order
    pub values: Vec<InputVal>,
    pub compute: bool,
    pub compute_groups: [u32; 3],
    pub had_target: bool,
}

// ============================================================================
// Mock Ra
// ============================================================================

/// Mock backend that tracks every call without a GPU
pub struct MockRa {
    pub caps: RaCaps,
    pub glsl_version: u32,
    pub glsl_es: bool,
    formats: Vec<Arc<Format>>,

    /// Names of created textures
    pub created_texs: Mutex<Vec<String>>,
    /// Recorded uploads
    pub uploads: Mutex<Vec<UploadRecord>>,
    /// Number of clear calls
    pub clears: AtomicUsize,
    /// Number of blit calls
    pub blits: AtomicUsize,
    /// Number of renderpass_create calls
    pub passes_created: AtomicUsize,
    /// Live (not yet dropped) passes, for eviction tests
    pub passes_alive: Arc<AtomicUsize>,
    /// Recorded pass executions
    pub runs: Mutex<Vec<RunRecord>>,
    /// Make renderpass_create fail (compile failure simulation)
    pub fail_compile: AtomicBool,
    /// Program binary the backend "produces" on a fresh compile, if any
    pub binary: Mutex<Option<Vec<u8>>>,
    /// Parameters received by renderpass_create, in call order
    pub create_params: Mutex<Vec<RenderPassParams>>,
}

impl MockRa {
    /// Mock with a representative default format table.
    pub fn new() -> Self {
        Self::with_formats(vec![
            unorm_fmt("r8", 1, 1),
            unorm_fmt("rg8", 1, 2),
            unorm_fmt("rgba8", 1, 4),
            unorm_fmt("r16", 2, 1),
            unorm_fmt("rg16", 2, 2),
            unorm_fmt("rgba16", 2, 4),
            float16_fmt("rgba16f", 4),
            rgb565_fmt(),
        ])
    }

    /// Mock with an explicit format table.
    pub fn with_formats(formats: Vec<Arc<Format>>) -> Self {
        Self {
            caps: RaCaps::all(),
            glsl_version: 130,
            glsl_es: false,
            formats,
            created_texs: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
            clears: AtomicUsize::new(0),
            blits: AtomicUsize::new(0),
            passes_created: AtomicUsize::new(0),
            passes_alive: Arc::new(AtomicUsize::new(0)),
            runs: Mutex::new(Vec::new()),
            fail_compile: AtomicBool::new(false),
            binary: Mutex::new(None),
            create_params: Mutex::new(Vec::new()),
        }
    }

    /// Convenience 2D texture with the first registered format.
    pub fn make_tex(self: &Arc<Self>, w: usize, h: usize, render_dst: bool) -> Arc<dyn Tex> {
        let mut params = TexParams::new_2d(w, h, self.formats[0].clone());
        params.render_src = true;
        params.render_dst = render_dst;
        let ra: Arc<dyn Ra> = self.clone();
        ra.tex_create(&params).unwrap()
    }
}

impl Ra for MockRa {
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
        16384
    }

    fn formats(&self) -> &[Arc<Format>] {
        &self.formats
    }

    fn tex_create(&self, params: &TexParams) -> Result<Arc<dyn Tex>> {
        if params.render_dst && !params.format.renderable {
            return Err(Error::InvalidResource(
                "renderable texture with unsupported format".to_string(),
            ));
        }
        let name = format!("tex_{}x{}", params.w, params.h);
        self.created_texs.lock().unwrap().push(name.clone());
        let mut params = params.clone();
        params.initial_data = None;
        Ok(Arc::new(MockTex { params, name }))
    }

    fn tex_upload(&self, params: &TexUploadParams<'_>) -> Result<()> {
        let tex = params
            .tex
            .as_any()
            .downcast_ref::<MockTex>()
            .expect("foreign texture");
        if tex.params.dimensions != 2 {
            assert!(params.rect.is_none(), "sub-rect upload is 2D only");
        }
        let mapped = match &params.src {
            UploadSource::Bytes(_) => false,
            UploadSource::Mapped { buf, .. } => {
                // The buffer must not be reused until the GPU is done with
                // it; a new fence covers any previous pending operation too.
                buf.as_any()
                    .downcast_ref::<MockMappedBuf>()
                    .expect("foreign mapped buffer")
                    .install_fence();
                true
            }
        };
        self.uploads.lock().unwrap().push(UploadRecord {
            tex_name: tex.name.clone(),
            mapped,
            rect: params.rect,
        });
        Ok(())
    }

    fn mapped_buffer_create(&self, size: usize) -> Result<Arc<dyn MappedBuf>> {
        if !self.caps.contains(RaCaps::MAPPED_BUF) {
            return Err(Error::Unsupported("persistent mapping not supported".to_string()));
        }
        Ok(Arc::new(MockMappedBuf {
            size,
            data: Mutex::new(vec![0; size]),
            fence: Mutex::new(FenceState::Idle),
            resolves: AtomicUsize::new(0),
        }))
    }

    fn buf_create(&self, size: usize) -> Result<Arc<dyn Buf>> {
        Ok(Arc::new(MockBuf { size }))
    }

    fn clear(&self, dst: &Arc<dyn Tex>, _color: [f32; 4], _scissor: Rect) -> Result<()> {
        assert!(dst.params().render_dst);
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn blit(
        &self,
        dst: &Arc<dyn Tex>,
        src: &Arc<dyn Tex>,
        _dst_x: i32,
        _dst_y: i32,
        _src_rc: Rect,
    ) -> Result<()> {
        assert!(dst.params().render_dst);
        assert!(src.params().render_dst); // even src must be a render target
        self.blits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn renderpass_create(&self, params: &RenderPassParams) -> Result<Arc<dyn RenderPass>> {
        self.passes_created.fetch_add(1, Ordering::SeqCst);
        self.create_params.lock().unwrap().push(params.clone());
        if self.fail_compile.load(Ordering::SeqCst) {
            return Err(Error::ShaderFailed("mock compile failure".to_string()));
        }

        // Deep copy; simulate the binary-program path: a supplied binary
        // that matches what this backend would produce "loads" (no new
        // binary), anything else "compiles" and produces the binary.
        let mut params = params.clone();
        let produced = self.binary.lock().unwrap().clone();
        params.cached_program = match produced {
            Some(binary) if params.cached_program == binary => Vec::new(),
            Some(binary) => binary,
            None => Vec::new(),
        };

        self.passes_alive.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockRenderPass {
            params,
            alive: self.passes_alive.clone(),
        }))
    }

    fn renderpass_run(&self, params: &RenderPassRunParams<'_>) -> Result<()> {
        let pass = params
            .pass
            .as_any()
            .downcast_ref::<MockRenderPass>()
            .expect("foreign render pass");
        let compute = pass.params.pass_type == RenderPassType::Compute;
        if !compute {
            let target = params.target.expect("raster run without target");
            assert!(target.params().render_dst);
        }
        self.runs.lock().unwrap().push(RunRecord {
            pass_id: Arc::as_ptr(params.pass) as *const () as usize,
            value_indices: params.values.iter().map(|v| v.index).collect(),
            values: params.values.to_vec(),
            compute,
            compute_groups: params.compute_groups,
            had_target: params.target.is_some(),
        });
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "mock_ra_tests.rs"]
mod tests;
