/// GlRenderPass - program compilation, binary caching and execution

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glow::HasContext;
use lumen_render::lumen::log::LogSeverity;
use lumen_render::lumen::ra::{
    BlendFactor, InputVal, RenderPass, RenderPassParams, RenderPassRunParams, RenderPassType,
    Tex, UniformValue, VarType,
};
use lumen_render::lumen::{Error, Result};
use lumen_render::{ra_debug, ra_error};

use crate::gl_buf::GlBuf;
use crate::gl_ra::GlRa;
use crate::gl_tex::GlTex;
use crate::gl_vao::GlVao;

/// Compiled OpenGL program with its resolved uniform locations and vertex
/// layout
pub struct GlRenderPass {
    ctx: Arc<crate::gl_ra::GlCtx>,
    params: RenderPassParams,
    program: glow::Program,
    uniform_locs: Vec<Option<glow::UniformLocation>>,
    vao: Option<GlVao>,
    first_run: AtomicBool,
}

impl GlRenderPass {
    fn concrete<'a>(pass: &'a Arc<dyn RenderPass>) -> Result<&'a GlRenderPass> {
        pass.as_any()
            .downcast_ref::<GlRenderPass>()
            .ok_or_else(|| Error::InvalidResource("render pass from another backend".to_string()))
    }

    pub(crate) fn create(ra: &GlRa, params: &RenderPassParams) -> Result<Arc<dyn RenderPass>> {
        let gl = &ra.ctx.gl;

        // Deep copy; the caller's buffers stay untouched.
        let mut own_params = params.clone();
        own_params.cached_program = Vec::new();

        let (program, cached) = load_program(ra, params)?;
        own_params.cached_program = cached;

        let mut uniform_locs = Vec::with_capacity(params.inputs.len());
        unsafe {
            for input in &params.inputs {
                uniform_locs.push(gl.get_uniform_location(program, &input.name));
            }
        }

        let vao = if params.pass_type == RenderPassType::Raster {
            let has_vao = ra.version.version >= 300 || ra.version.es >= 300;
            Some(GlVao::new(
                ra.ctx.clone(),
                has_vao,
                params.vertex_stride,
                &params.vertex_attribs,
            )?)
        } else {
            None
        };

        Ok(Arc::new(GlRenderPass {
            ctx: ra.ctx.clone(),
            params: own_params,
            program,
            uniform_locs,
            vao,
            first_run: AtomicBool::new(true),
        }))
    }

    pub(crate) fn run(ra: &GlRa, params: &RenderPassRunParams<'_>) -> Result<()> {
        let gl = &ra.ctx.gl;
        let pass = Self::concrete(params.pass)?;

        unsafe {
            gl.use_program(Some(pass.program));
        }

        let first_run = pass.first_run.load(Ordering::Relaxed);
        for val in params.values {
            pass.update_uniform(gl, val, first_run)?;
        }
        unsafe { gl.active_texture(glow::TEXTURE0) };

        match pass.params.pass_type {
            RenderPassType::Raster => {
                let target = params
                    .target
                    .ok_or_else(|| Error::InvalidResource("raster run without target".to_string()))?;
                let target_gl = GlTex::concrete(target)?;
                assert!(target_gl.params().render_dst);

                unsafe {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, target_gl.fbo);
                    gl.viewport(
                        params.viewport.x0,
                        params.viewport.y0,
                        params.viewport.width(),
                        params.viewport.height(),
                    );
                    gl.scissor(
                        params.scissors.x0,
                        params.scissors.y0,
                        params.scissors.width(),
                        params.scissors.height(),
                    );
                    gl.enable(glow::SCISSOR_TEST);
                    if pass.params.enable_blend {
                        gl.blend_func_separate(
                            map_blend(pass.params.blend_src_rgb),
                            map_blend(pass.params.blend_dst_rgb),
                            map_blend(pass.params.blend_src_alpha),
                            map_blend(pass.params.blend_dst_alpha),
                        );
                        gl.enable(glow::BLEND);
                    }
                }

                pass.vao
                    .as_ref()
                    .expect("raster pass without vertex layout")
                    .draw_data(glow::TRIANGLES, params.vertex_data, params.vertex_count);

                unsafe {
                    gl.disable(glow::SCISSOR_TEST);
                    gl.disable(glow::BLEND);
                    gl.bind_framebuffer(glow::FRAMEBUFFER, None);
                }
            }
            RenderPassType::Compute => unsafe {
                gl.dispatch_compute(
                    params.compute_groups[0],
                    params.compute_groups[1],
                    params.compute_groups[2],
                );
                // Writes must be visible to whoever samples the written
                // textures next.
                gl.memory_barrier(glow::TEXTURE_FETCH_BARRIER_BIT);
            },
        }

        for val in params.values {
            pass.disable_binding(gl, val)?;
        }
        unsafe {
            gl.active_texture(glow::TEXTURE0);
            gl.use_program(None);
        }

        pass.first_run.store(false, Ordering::Relaxed);
        Ok(())
    }

    /// Apply one input value. Assumes the program is current.
    fn update_uniform(&self, gl: &glow::Context, val: &InputVal, first_run: bool) -> Result<()> {
        let input = &self.params.inputs[val.index];
        let loc = self.uniform_locs[val.index].as_ref();

        unsafe {
            match &val.value {
                UniformValue::Int(i) => {
                    if loc.is_some() {
                        gl.uniform_1_i32(loc, *i);
                    }
                }
                UniformValue::Float(f) => {
                    if loc.is_some() {
                        gl.uniform_1_f32(loc, *f);
                    }
                }
                UniformValue::Vec2(v) => {
                    if loc.is_some() {
                        gl.uniform_2_f32(loc, v[0], v[1]);
                    }
                }
                UniformValue::Vec3(v) => {
                    if loc.is_some() {
                        gl.uniform_3_f32(loc, v[0], v[1], v[2]);
                    }
                }
                UniformValue::Vec4(v) => {
                    if loc.is_some() {
                        gl.uniform_4_f32(loc, v[0], v[1], v[2], v[3]);
                    }
                }
                UniformValue::Mat2(m) => {
                    if loc.is_some() {
                        gl.uniform_matrix_2_f32_slice(loc, false, m);
                    }
                }
                UniformValue::Mat3(m) => {
                    if loc.is_some() {
                        gl.uniform_matrix_3_f32_slice(loc, false, m);
                    }
                }
                UniformValue::Tex(tex) => {
                    let tex_gl = GlTex::concrete(tex)?;
                    assert!(tex_gl.params().render_src);
                    if first_run {
                        gl.uniform_1_i32(loc, input.binding as i32);
                    }
                    match input.var_type {
                        VarType::ImgW => {
                            let texture = tex_gl
                                .texture
                                .ok_or_else(|| Error::InvalidResource("image without texture".to_string()))?;
                            gl.bind_image_texture(
                                input.binding as u32,
                                texture,
                                0,
                                false,
                                0,
                                glow::WRITE_ONLY,
                                tex_gl.internal_format,
                            );
                        }
                        _ => {
                            gl.active_texture(glow::TEXTURE0 + input.binding as u32);
                            gl.bind_texture(tex_gl.target, tex_gl.texture);
                        }
                    }
                }
                UniformValue::Buf(buf) => {
                    let buf_gl = GlBuf::concrete(buf)?;
                    gl.bind_buffer_base(
                        glow::SHADER_STORAGE_BUFFER,
                        input.binding as u32,
                        Some(buf_gl.buffer),
                    );
                }
            }
        }
        Ok(())
    }

    /// Unbind every input that referenced a GPU resource, so bindings do not
    /// leak into unrelated draws.
    fn disable_binding(&self, gl: &glow::Context, val: &InputVal) -> Result<()> {
        let input = &self.params.inputs[val.index];

        unsafe {
            match &val.value {
                UniformValue::Tex(tex) => {
                    let tex_gl = GlTex::concrete(tex)?;
                    match input.var_type {
                        VarType::ImgW => {
                            // glow cannot bind image unit zero-handles; the
                            // unit keeps its texture until the next dispatch
                            // rebinds it.
                        }
                        _ => {
                            gl.active_texture(glow::TEXTURE0 + input.binding as u32);
                            gl.bind_texture(tex_gl.target, None);
                        }
                    }
                }
                UniformValue::Buf(_) => {
                    gl.bind_buffer_base(glow::SHADER_STORAGE_BUFFER, input.binding as u32, None);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl RenderPass for GlRenderPass {
    fn params(&self) -> &RenderPassParams {
        &self.params
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Drop for GlRenderPass {
    fn drop(&mut self) {
        unsafe { self.ctx.gl.delete_program(self.program) };
    }
}

fn map_blend(blend: BlendFactor) -> u32 {
    match blend {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
    }
}

fn shader_typestr(type_: u32) -> &'static str {
    match type_ {
        glow::VERTEX_SHADER => "vertex",
        glow::FRAGMENT_SHADER => "fragment",
        glow::COMPUTE_SHADER => "compute",
        _ => unreachable!("unknown shader type"),
    }
}

/// Compile one stage and attach it, reporting source and compiler log at a
/// severity tied to the outcome.
fn compile_attach_shader(
    ra: &GlRa,
    program: glow::Program,
    type_: u32,
    source: &str,
    ok: &mut bool,
) {
    let gl = &ra.ctx.gl;
    let typestr = shader_typestr(type_);

    unsafe {
        let shader = match gl.create_shader(type_) {
            Ok(shader) => shader,
            Err(e) => {
                ra_error!("lumen::gl", "glCreateShader failed: {}", e);
                *ok = false;
                return;
            }
        };
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        let status = gl.get_shader_compile_status(shader);
        let log = gl.get_shader_info_log(shader);

        let severity = if status {
            LogSeverity::Debug
        } else {
            LogSeverity::Error
        };
        lumen_render::log::log(
            severity,
            "lumen::gl",
            format!("{} shader source:", typestr),
        );
        lumen_render::log::log_source(severity, "lumen::gl", source);
        if !log.trim().is_empty() {
            lumen_render::log::log(
                severity,
                "lumen::gl",
                format!("{} shader compile log (status={}):\n{}", typestr, status as i32, log),
            );
        }

        gl.attach_shader(program, shader);
        gl.delete_shader(shader);

        *ok &= status;
    }
}

fn link_shader(ra: &GlRa, program: glow::Program, ok: &mut bool) {
    let gl = &ra.ctx.gl;
    unsafe {
        gl.link_program(program);
        let status = gl.get_program_link_status(program);
        let log = gl.get_program_info_log(program);

        let severity = if status {
            LogSeverity::Debug
        } else {
            LogSeverity::Error
        };
        if !log.trim().is_empty() || !status {
            lumen_render::log::log(
                severity,
                "lumen::gl",
                format!("shader link log (status={}): {}", status as i32, log),
            );
        }

        *ok &= status;
    }
}

/// Compile and link from source. Either 'compute' or both 'vertex' and
/// 'frag' are needed.
fn compile_program(ra: &GlRa, params: &RenderPassParams) -> Result<glow::Program> {
    let gl = &ra.ctx.gl;
    unsafe {
        let program = gl
            .create_program()
            .map_err(|e| Error::BackendError(format!("glCreateProgram: {}", e)))?;
        let mut ok = true;
        if params.pass_type == RenderPassType::Compute {
            compile_attach_shader(ra, program, glow::COMPUTE_SHADER, &params.compute_shader, &mut ok);
        }
        if params.pass_type == RenderPassType::Raster {
            compile_attach_shader(ra, program, glow::VERTEX_SHADER, &params.vertex_shader, &mut ok);
            compile_attach_shader(ra, program, glow::FRAGMENT_SHADER, &params.frag_shader, &mut ok);
            for (n, attrib) in params.vertex_attribs.iter().enumerate() {
                gl.bind_attrib_location(program, n as u32, &attrib.name);
            }
        }
        link_shader(ra, program, &mut ok);
        if !ok {
            gl.delete_program(program);
            return Err(Error::ShaderFailed(
                "shader compilation or linking failed".to_string(),
            ));
        }
        Ok(program)
    }
}

/// Whether the driver can serialize/deserialize program binaries
fn supports_program_binary(ra: &GlRa) -> bool {
    if ra.version.version < 410 && ra.version.es < 300 {
        return false;
    }
    unsafe { ra.ctx.gl.get_parameter_i32(glow::NUM_PROGRAM_BINARY_FORMATS) > 0 }
}

/// Load the cached binary if present and valid, else compile from source.
/// Returns the program plus the serialized binary to persist (empty when
/// the supplied binary was loaded as-is, or serialization is unsupported).
fn load_program(ra: &GlRa, params: &RenderPassParams) -> Result<(glow::Program, Vec<u8>)> {
    let gl = &ra.ctx.gl;
    let binary_support = supports_program_binary(ra);

    // The persisted blob is the binary format tag (LE) followed by the
    // driver blob.
    if binary_support && params.cached_program.len() > 4 {
        let format = u32::from_le_bytes(params.cached_program[..4].try_into().unwrap());
        unsafe {
            if let Ok(program) = gl.create_program() {
                gl.program_binary(
                    program,
                    &glow::ProgramBinary {
                        buffer: params.cached_program[4..].to_vec(),
                        format,
                    },
                );
                gl.get_error(); // discard potential useless error
                if gl.get_program_link_status(program) {
                    ra_debug!("lumen::gl", "Loading binary program succeeded.");
                    return Ok((program, Vec::new()));
                }
                gl.delete_program(program);
            }
        }
    }

    let program = compile_program(ra, params)?;

    let mut cached = Vec::new();
    if binary_support {
        unsafe {
            if let Some(binary) = gl.get_program_binary(program) {
                if !binary.buffer.is_empty() {
                    cached.extend_from_slice(&binary.format.to_le_bytes());
                    cached.extend_from_slice(&binary.buffer);
                }
            }
        }
    }

    Ok((program, cached))
}
