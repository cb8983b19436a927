//! Shader assembly and program caching
//!
//! Callers build a shader by incremental text concatenation (prelude,
//! header, body) plus a structured list of named uniforms, then dispatch.
//! The generated program is cached on the full shader text, so actual
//! compilation happens only the first time; compiled binaries are
//! additionally persisted to disk when a cache directory is configured.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::log::LogSeverity;
use crate::ra::{
    BlendFactor, Buf, InputVal, Ra, Rect, RenderPass, RenderPassInput, RenderPassParams,
    RenderPassRunParams, RenderPassType, Tex, UniformValue, VarType,
};
use crate::timer::{PassPerf, PassTimer};

/// Force a full cache flush if more than this number of shaders is created.
///
/// Deliberately a whole-pool flush rather than per-entry LRU: the worst case
/// recompiles every active shader at once, in exchange for trivially simple
/// cache management.
const MAX_ENTRIES: usize = 48;

/// Version-tagged first line of every on-disk cache file
const CACHE_HEADER: &str = "lumen shader cache v1\n";

/// A pending uniform declaration
struct Uniform {
    input: RenderPassInput,
    glsl_type: &'static str,
    value: UniformValue,
    /// SSBO block body, verbatim
    buffer_format: Option<String>,
}

impl Uniform {
    fn blank(name: String) -> Self {
        Self {
            input: RenderPassInput {
                name,
                var_type: VarType::Int,
                dim_v: 1,
                dim_m: 1,
                binding: 0,
            },
            glsl_type: "",
            value: UniformValue::Int(0),
            buffer_format: None,
        }
    }
}

/// One cached program: the pass plus the last-seen value of every uniform
/// (for change detection) and its performance timer
struct Entry {
    pass: Option<Arc<dyn RenderPass>>,
    cached_values: Vec<Option<UniformValue>>,
    /// The full cache key this entry was created from
    total: String,
    timer: PassTimer,
}

/// Shader assembler and render pass cache
///
/// Owns the single in-flight assembly state (pending text regions and
/// uniform list, reset after each dispatch) and the bounded entry pool.
///
/// The call protocol is strict: append text/uniforms for exactly one
/// pending shader, declare the vertex layout, then call
/// [`dispatch_draw`]/[`dispatch_compute`]. Protocol violations are caller
/// bugs and assert.
///
/// [`dispatch_draw`]: ShaderCache::dispatch_draw
/// [`dispatch_compute`]: ShaderCache::dispatch_compute
pub struct ShaderCache {
    ra: Arc<dyn Ra>,

    // permanent
    exts: Vec<String>,
    cache_dir: Option<PathBuf>,

    // modified during use (add() etc.) and reset for each shader
    prelude_text: String,
    header_text: String,
    text: String,
    next_texture_unit: usize,
    next_image_unit: usize,
    next_buffer_binding: usize,
    params: RenderPassParams,
    uniforms: Vec<Uniform>,
    values: Vec<InputVal>,
    current_entry: Option<usize>,

    entries: Vec<Entry>,

    // For checking that the caller runs the reset protocol properly.
    needs_reset: bool,

    error_state: bool,

    // instrumentation: number of renderpass_create calls issued
    passes_created: usize,
}

impl ShaderCache {
    /// Create an empty cache bound to a backend. No disk persistence until
    /// [`ShaderCache::set_cache_dir`] is called.
    pub fn new(ra: Arc<dyn Ra>) -> Self {
        let mut sc = Self {
            ra,
            exts: Vec::new(),
            cache_dir: None,
            prelude_text: String::new(),
            header_text: String::new(),
            text: String::new(),
            next_texture_unit: 1,
            next_image_unit: 1,
            next_buffer_binding: 1,
            params: RenderPassParams::default(),
            uniforms: Vec::new(),
            values: Vec::new(),
            current_entry: None,
            entries: Vec::new(),
            needs_reset: false,
            error_state: false,
            passes_created: 0,
        };
        sc.reset();
        sc
    }

    /// Configure the directory compiled program binaries are persisted to.
    /// Persistence is best-effort; I/O failures are ignored.
    pub fn set_cache_dir(&mut self, dir: impl Into<PathBuf>) {
        self.cache_dir = Some(dir.into());
    }

    /// True after a pass failed to compile. Latched until
    /// [`ShaderCache::reset_error`].
    pub fn error_state(&self) -> bool {
        self.error_state
    }

    /// Clear the error latch.
    pub fn reset_error(&mut self) {
        self.error_state = false;
    }

    /// Number of pass compilations issued so far (instrumentation; cache
    /// hits do not increase this).
    pub fn passes_created(&self) -> usize {
        self.passes_created
    }

    /// Request a GLSL extension for the pending and all later shaders.
    /// Duplicates are ignored.
    pub fn enable_extension(&mut self, name: &str) {
        if !self.exts.iter().any(|e| e == name) {
            self.exts.push(name.to_string());
        }
    }

    /// Append text to the shader body.
    pub fn add(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Append text to the shader header (before the body's main function).
    pub fn add_header(&mut self, text: &str) {
        self.header_text.push_str(text);
    }

    /// Append text to the prelude (before the header).
    pub fn add_prelude(&mut self, text: &str) {
        self.prelude_text.push_str(text);
    }

    /// Find or create the pending uniform with this name. Re-declaring a
    /// name replaces the previous pending declaration.
    fn find_uniform(&mut self, name: &str) -> &mut Uniform {
        if let Some(idx) = self.uniforms.iter().position(|u| u.input.name == name) {
            let owned = std::mem::take(&mut self.uniforms[idx].input.name);
            self.uniforms[idx] = Uniform::blank(owned);
            return &mut self.uniforms[idx];
        }
        self.uniforms.push(Uniform::blank(name.to_string()));
        self.uniforms.last_mut().unwrap()
    }

    /// Declare a sampled-texture uniform. The sampler type is derived from
    /// the texture's dimensionality and format.
    pub fn uniform_texture(&mut self, name: &str, tex: &Arc<dyn Tex>) {
        let params = tex.params();
        let glsl_type = if params.dimensions == 1 {
            "sampler1D"
        } else if params.dimensions == 3 {
            "sampler3D"
        } else if params.non_normalized {
            "sampler2DRect"
        } else if params.external_oes {
            "samplerExternalOES"
        } else if params.format.ctype == crate::ra::CompType::Uint {
            if self.ra.glsl_es() {
                "highp usampler2D"
            } else {
                "usampler2D"
            }
        } else {
            "sampler2D"
        };

        let binding = self.next_texture_unit;
        self.next_texture_unit += 1;
        let u = self.find_uniform(name);
        u.input.var_type = VarType::Tex;
        u.input.binding = binding;
        u.glsl_type = glsl_type;
        u.value = UniformValue::Tex(tex.clone());
    }

    /// Declare a write-only storage image uniform.
    pub fn uniform_image2d_wo(&mut self, name: &str, tex: &Arc<dyn Tex>) {
        self.enable_extension("GL_ARB_shader_image_load_store");

        let binding = self.next_image_unit;
        self.next_image_unit += 1;
        let u = self.find_uniform(name);
        u.input.var_type = VarType::ImgW;
        u.input.binding = binding;
        u.glsl_type = "writeonly image2D";
        u.value = UniformValue::Tex(tex.clone());
    }

    /// Declare a read/write shader storage buffer. `format` is the GLSL
    /// block body, verbatim.
    pub fn ssbo(&mut self, name: &str, buf: &Arc<dyn Buf>, format: &str) {
        self.enable_extension("GL_ARB_shader_storage_buffer_object");

        let binding = self.next_buffer_binding;
        self.next_buffer_binding += 1;
        let u = self.find_uniform(name);
        u.input.var_type = VarType::BufRw;
        u.input.binding = binding;
        u.glsl_type = "";
        u.buffer_format = Some(format.to_string());
        u.value = UniformValue::Buf(buf.clone());
    }

    /// Declare a float uniform.
    pub fn uniform_f(&mut self, name: &str, f: f32) {
        let u = self.find_uniform(name);
        u.input.var_type = VarType::Float;
        u.glsl_type = "float";
        u.value = UniformValue::Float(f);
    }

    /// Declare an int uniform.
    pub fn uniform_i(&mut self, name: &str, i: i32) {
        let u = self.find_uniform(name);
        u.input.var_type = VarType::Int;
        u.glsl_type = "int";
        u.value = UniformValue::Int(i);
    }

    /// Declare a vec2 uniform.
    pub fn uniform_vec2(&mut self, name: &str, f: [f32; 2]) {
        let u = self.find_uniform(name);
        u.input.var_type = VarType::Float;
        u.input.dim_v = 2;
        u.glsl_type = "vec2";
        u.value = UniformValue::Vec2(f);
    }

    /// Declare a vec3 uniform.
    pub fn uniform_vec3(&mut self, name: &str, f: [f32; 3]) {
        let u = self.find_uniform(name);
        u.input.var_type = VarType::Float;
        u.input.dim_v = 3;
        u.glsl_type = "vec3";
        u.value = UniformValue::Vec3(f);
    }

    /// Declare a mat2 uniform, optionally transposing the given values.
    pub fn uniform_mat2(&mut self, name: &str, transpose: bool, v: [f32; 4]) {
        let mut m = v;
        if transpose {
            m.swap(1, 2);
        }
        let u = self.find_uniform(name);
        u.input.var_type = VarType::Float;
        u.input.dim_v = 2;
        u.input.dim_m = 2;
        u.glsl_type = "mat2";
        u.value = UniformValue::Mat2(m);
    }

    /// Declare a mat3 uniform, optionally transposing the given values.
    pub fn uniform_mat3(&mut self, name: &str, transpose: bool, v: [f32; 9]) {
        let mut m = v;
        if transpose {
            m.swap(1, 3);
            m.swap(2, 6);
            m.swap(5, 7);
        }
        let u = self.find_uniform(name);
        u.input.var_type = VarType::Float;
        u.input.dim_v = 3;
        u.input.dim_m = 3;
        u.glsl_type = "mat3";
        u.value = UniformValue::Mat3(m);
    }

    /// Tell the shader generator (and the draw path) about the vertex data
    /// layout and attribute names. Must be called exactly once per pending
    /// shader; `binding` of each attribute is its byte offset.
    pub fn set_vertex_format(&mut self, attribs: &[RenderPassInput], vertex_stride: usize) {
        self.params.vertex_attribs = attribs.to_vec();
        self.params.vertex_stride = vertex_stride;
    }

    /// Enable blending for the pending shader's draw.
    pub fn blend(
        &mut self,
        blend_src_rgb: BlendFactor,
        blend_dst_rgb: BlendFactor,
        blend_src_alpha: BlendFactor,
        blend_dst_alpha: BlendFactor,
    ) {
        self.params.enable_blend = true;
        self.params.blend_src_rgb = blend_src_rgb;
        self.params.blend_dst_rgb = blend_dst_rgb;
        self.params.blend_src_alpha = blend_src_alpha;
        self.params.blend_dst_alpha = blend_dst_alpha;
    }

    /// Reset the previous pass. Called after every generate, before
    /// starting a new shader.
    fn reset(&mut self) {
        self.prelude_text.clear();
        self.header_text.clear();
        self.text.clear();
        self.uniforms.clear();
        self.values.clear();
        self.next_texture_unit = 1; // not 0, as 0 is "free for use"
        self.next_image_unit = 1;
        self.next_buffer_binding = 1;
        self.current_entry = None;
        self.params = RenderPassParams::default();
        self.needs_reset = false;
    }

    /// Destroy every cached pass.
    fn flush_cache(&mut self) {
        crate::ra_debug!("lumen::ShaderCache", "flushing shader cache");
        self.entries.clear();
    }

    fn glsl_type_of_attrib(e: &RenderPassInput) -> &'static str {
        match e.dim_v {
            1 => "float",
            2 => "vec2",
            3 => "vec3",
            4 => "vec4",
            other => panic!("invalid vertex attribute dimension {}", other),
        }
    }

    fn add_uniform_decls(&self, dst: &mut String) {
        for u in &self.uniforms {
            match u.input.var_type {
                VarType::Int | VarType::Float | VarType::Tex | VarType::ImgW => {
                    dst.push_str(&format!("uniform {} {};\n", u.glsl_type, u.input.name));
                }
                VarType::BufRw => {
                    dst.push_str(&format!(
                        "layout(std430, binding={}) buffer {} {{ {} }};\n",
                        u.input.binding,
                        u.input.name,
                        u.buffer_format.as_deref().unwrap_or("")
                    ));
                }
                VarType::ByteUnorm => panic!("byte-unorm is a vertex attribute type"),
            }
        }
    }

    fn blend_id(b: BlendFactor) -> u32 {
        match b {
            BlendFactor::Zero => 0,
            BlendFactor::One => 1,
            BlendFactor::SrcAlpha => 2,
            BlendFactor::OneMinusSrcAlpha => 3,
        }
    }

    /// Assemble the full shader source for the pending state, look up or
    /// create the cached pass, and collect the changed uniform values.
    ///
    /// On success `self.current_entry` points at an entry with a live pass;
    /// on compile failure it is None and the error latch is set.
    fn generate(&mut self, pass_type: RenderPassType) {
        let glsl_version = self.ra.glsl_version();
        let glsl_es = if self.ra.glsl_es() { glsl_version } else { 0 };

        self.params.pass_type = pass_type;

        // reset() runs after ending the previous render process and before
        // starting a new one.
        assert!(!self.needs_reset, "dispatch without reset between shaders");
        self.needs_reset = true;

        // set_vertex_format() must always be called
        assert!(
            !self.params.vertex_attribs.is_empty(),
            "vertex format not declared"
        );

        // set up shader text (header + uniforms + body)
        let mut header = format!(
            "#version {}{}\n",
            glsl_version,
            if glsl_es >= 300 { " es" } else { "" }
        );
        if pass_type == RenderPassType::Compute {
            // This extension cannot be enabled in fragment shader. Enable it
            // as an exception for compute shader.
            header.push_str("#extension GL_ARB_compute_shader : enable\n");
        }
        for ext in &self.exts {
            header.push_str(&format!("#extension {} : enable\n", ext));
        }
        if glsl_es > 0 {
            header.push_str("precision mediump float;\n");
            header.push_str("precision mediump sampler2D;\n");
            if self.ra.caps().contains(crate::ra::RaCaps::TEX_3D) {
                header.push_str("precision mediump sampler3D;\n");
            }
        }

        if glsl_version >= 130 {
            header.push_str("#define texture1D texture\n");
            header.push_str("#define texture3D texture\n");
        } else {
            header.push_str("#define texture texture2D\n");
        }

        // Additional helpers.
        header.push_str(
            "#define LUT_POS(x, lut_size) \
             mix(0.5 / (lut_size), 1.0 - 0.5 / (lut_size), (x))\n",
        );

        let vert_in = if glsl_version >= 130 { "in" } else { "attribute" };
        let vert_out = if glsl_version >= 130 { "out" } else { "varying" };
        let frag_in = if glsl_version >= 130 { "in" } else { "varying" };

        let mut vert = String::new();
        let mut frag = String::new();
        let mut comp = String::new();

        if pass_type == RenderPassType::Raster {
            // vertex shader: we don't use the vertex shader, so just setup a
            // dummy, which passes through the vertex array attributes.
            let mut vert_head = header.clone();
            let mut vert_body = String::from("void main() {\n");
            let mut frag_vaos = String::new();
            for e in &self.params.vertex_attribs {
                let glsl_type = Self::glsl_type_of_attrib(e);
                if e.name == "position" {
                    // setting raster pos. requires setting the gl_Position
                    // magic variable
                    assert!(
                        e.dim_v == 2 && e.var_type == VarType::Float,
                        "position attribute must be a float vec2"
                    );
                    vert_head.push_str(&format!("{} vec2 vertex_position;\n", vert_in));
                    vert_body.push_str("gl_Position = vec4(vertex_position, 1.0, 1.0);\n");
                } else {
                    vert_head.push_str(&format!("{} {} vertex_{};\n", vert_in, glsl_type, e.name));
                    vert_head.push_str(&format!("{} {} {};\n", vert_out, glsl_type, e.name));
                    vert_body.push_str(&format!("{} = vertex_{};\n", e.name, e.name));
                    frag_vaos.push_str(&format!("{} {} {};\n", frag_in, glsl_type, e.name));
                }
            }
            vert_body.push_str("}\n");
            vert = vert_head;
            vert.push_str(&vert_body);

            // fragment shader; still requires adding used uniforms and VAO
            // elements
            frag.push_str(&header);
            if glsl_version >= 130 {
                frag.push_str("out vec4 out_color;\n");
            }
            frag.push_str(&frag_vaos);
            self.add_uniform_decls(&mut frag);

            frag.push_str(&self.prelude_text);
            frag.push_str(&self.header_text);

            frag.push_str("void main() {\n");
            // we require _all_ frag shaders to write to a "vec4 color"
            frag.push_str("vec4 color = vec4(0.0, 0.0, 0.0, 1.0);\n");
            frag.push_str(&self.text);
            if glsl_version >= 130 {
                frag.push_str("out_color = color;\n");
            } else {
                frag.push_str("gl_FragColor = color;\n");
            }
            frag.push_str("}\n");
        }

        if pass_type == RenderPassType::Compute {
            comp.push_str(&header);

            self.add_uniform_decls(&mut comp);

            comp.push_str(&self.prelude_text);
            comp.push_str(&self.header_text);

            comp.push_str("void main() {\n");
            comp.push_str("vec4 color = vec4(0.0, 0.0, 0.0, 1.0);\n"); // convenience
            comp.push_str(&self.text);
            comp.push_str("}\n");
        }

        let mut hash_total = format!(
            "type {}\n",
            match pass_type {
                RenderPassType::Raster => 0,
                RenderPassType::Compute => 1,
            }
        );
        if !frag.is_empty() {
            hash_total.push_str(&frag);
            self.params.frag_shader = frag;
        }
        hash_total.push('\n');
        if !vert.is_empty() {
            hash_total.push_str(&vert);
            self.params.vertex_shader = vert;
        }
        hash_total.push('\n');
        if !comp.is_empty() {
            hash_total.push_str(&comp);
            self.params.compute_shader = comp;
        }
        hash_total.push('\n');

        if self.params.enable_blend {
            hash_total.push_str(&format!(
                "blend {} {} {} {}\n",
                Self::blend_id(self.params.blend_src_rgb),
                Self::blend_id(self.params.blend_dst_rgb),
                Self::blend_id(self.params.blend_src_alpha),
                Self::blend_id(self.params.blend_dst_alpha)
            ));
        }

        // Exact byte-equality lookup; no fuzzy matching.
        let mut entry_idx = self.entries.iter().position(|e| e.total == hash_total);
        if entry_idx.is_none() {
            if self.entries.len() == MAX_ENTRIES {
                self.flush_cache();
            }
            self.params.inputs = self.uniforms.iter().map(|u| u.input.clone()).collect();
            let mut entry = Entry {
                pass: None,
                cached_values: vec![None; self.uniforms.len()],
                total: hash_total.clone(),
                timer: PassTimer::new(),
            };
            self.create_pass(&mut entry);
            self.entries.push(entry);
            entry_idx = Some(self.entries.len() - 1);
        }
        let entry_idx = entry_idx.unwrap();

        if self.entries[entry_idx].pass.is_none() {
            return;
        }

        {
            let entry = &self.entries[entry_idx];
            assert!(self.uniforms.len() == entry.cached_values.len());
            assert!(
                self.uniforms.len() == entry.pass.as_ref().unwrap().params().inputs.len()
            );
        }

        // Collect changed uniform values; unchanged ones are omitted from
        // the run entirely.
        self.values.clear();
        for n in 0..self.uniforms.len() {
            let value = &self.uniforms[n].value;
            let cached = &mut self.entries[entry_idx].cached_values[n];
            let changed = match cached {
                Some(prev) => !prev.same_bytes(value),
                None => true,
            };
            if changed {
                *cached = Some(value.clone());
                self.values.push(InputVal {
                    index: n,
                    value: value.clone(),
                });
            }
        }

        self.current_entry = Some(entry_idx);
    }

    /// Create the entry's pass from the pending parameters, consulting and
    /// updating the on-disk binary cache.
    fn create_pass(&mut self, entry: &mut Entry) {
        let mut params = self.params.clone();

        crate::ra_debug!("lumen::ShaderCache", "new shader program:");
        if !self.header_text.is_empty() {
            crate::ra_debug!("lumen::ShaderCache", "header:");
            crate::log::log_source(LogSeverity::Debug, "lumen::ShaderCache", &self.header_text);
            crate::ra_debug!("lumen::ShaderCache", "body:");
        }
        if !self.text.is_empty() {
            crate::log::log_source(LogSeverity::Debug, "lumen::ShaderCache", &self.text);
        }

        // The vertex shader uses mangled names for the vertex attributes, so
        // that the fragment shader can use the "real" names. But the backend
        // binds the vertex attribute names (at least with older GLSL targets
        // for GL).
        for attrib in &mut params.vertex_attribs {
            attrib.name = format!("vertex_{}", attrib.name);
        }

        let cache_filename = self.cache_dir.as_ref().map(|dir| {
            let mut hashstr = String::with_capacity(64);
            for byte in blake3::hash(entry.total.as_bytes()).as_bytes() {
                hashstr.push_str(&format!("{:02X}", byte));
            }
            dir.join(hashstr)
        });

        if let Some(filename) = &cache_filename {
            // Try to load it from the disk cache.
            if let Some(cached) = load_cached_program(filename) {
                crate::ra_debug!("lumen::ShaderCache", "Trying to load shader from disk...");
                params.cached_program = cached;
            }
        }

        let loaded = params.cached_program.clone();
        self.passes_created += 1;
        entry.pass = match self.ra.renderpass_create(&params) {
            Ok(pass) => Some(pass),
            Err(err) => {
                crate::ra_error!("lumen::ShaderCache", "shader program creation failed: {}", err);
                None
            }
        };

        if entry.pass.is_none() {
            self.error_state = true;
        }

        if let (Some(pass), Some(filename)) = (&entry.pass, &cache_filename) {
            let nc = &pass.params().cached_program;
            if !nc.is_empty() && *nc != loaded {
                // Best-effort; filesystem errors are not fatal.
                if let Some(dir) = self.cache_dir.as_deref() {
                    let _ = std::fs::create_dir_all(dir);
                }
                crate::ra_debug!(
                    "lumen::ShaderCache",
                    "Writing shader cache file: {}",
                    filename.display()
                );
                let mut data = CACHE_HEADER.as_bytes().to_vec();
                data.extend_from_slice(nc);
                let _ = std::fs::write(filename, data);
            }
        }
    }

    /// Generate (or fetch) the pending raster shader and draw `vertex_count`
    /// vertices from `vertex_data` over the whole target.
    ///
    /// Resets the assembly state afterwards, whether or not the pass could
    /// be created. Returns the pass's timing aggregate.
    pub fn dispatch_draw(
        &mut self,
        target: &Arc<dyn Tex>,
        vertex_data: &[u8],
        vertex_count: usize,
    ) -> PassPerf {
        self.generate(RenderPassType::Raster);

        let mut perf = PassPerf::default();
        if let Some(idx) = self.current_entry {
            let pass = self.entries[idx].pass.clone().unwrap();
            let values = std::mem::take(&mut self.values);
            let full_rc = Rect::spanning(target.params().w as i32, target.params().h as i32);

            let run = RenderPassRunParams {
                pass: &pass,
                values: &values,
                target: Some(target),
                vertex_data,
                vertex_count,
                viewport: full_rc,
                scissors: full_rc,
                compute_groups: [0; 3],
            };

            self.run_timed(idx, &run);
            perf = self.entries[idx].timer.measure();
        }

        self.reset();
        perf
    }

    /// Generate (or fetch) the pending compute shader and dispatch
    /// `w` x `h` x `d` work groups.
    ///
    /// Resets the assembly state afterwards. Returns the pass's timing
    /// aggregate.
    pub fn dispatch_compute(&mut self, w: u32, h: u32, d: u32) -> PassPerf {
        self.generate(RenderPassType::Compute);

        let mut perf = PassPerf::default();
        if let Some(idx) = self.current_entry {
            let pass = self.entries[idx].pass.clone().unwrap();
            let values = std::mem::take(&mut self.values);

            let run = RenderPassRunParams {
                pass: &pass,
                values: &values,
                target: None,
                vertex_data: &[],
                vertex_count: 0,
                viewport: Rect::default(),
                scissors: Rect::default(),
                compute_groups: [w, h, d],
            };

            self.run_timed(idx, &run);
            perf = self.entries[idx].timer.measure();
        }

        self.reset();
        perf
    }

    fn run_timed(&mut self, idx: usize, run: &RenderPassRunParams<'_>) {
        self.entries[idx].timer.start();
        let result = self.ra.renderpass_run(run);
        self.entries[idx].timer.stop();
        if let Err(err) = result {
            crate::ra_error!("lumen::ShaderCache", "render pass execution failed: {}", err);
            self.error_state = true;
        }
    }
}

/// Read a persisted program binary, stripping the versioned header. Returns
/// None on any mismatch or I/O error.
fn load_cached_program(path: &Path) -> Option<Vec<u8>> {
    let data = std::fs::read(path).ok()?;
    let rest = data.strip_prefix(CACHE_HEADER.as_bytes())?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_vec())
}

#[cfg(test)]
#[path = "shader_cache_tests.rs"]
mod tests;

/// Number of entries the pool holds before a full flush; exposed for the
/// eviction tests.
#[cfg(test)]
pub(crate) const MAX_ENTRIES_FOR_TESTS: usize = MAX_ENTRIES;
