//! Unit tests for shader assembly and program caching
//!
//! All tests run against the mock backend; "compiling" is creating a mock
//! pass, which keeps the cache-hit/compile-count observations exact.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::ra::mock_ra::MockRa;
use crate::ra::{BlendFactor, Ra, RenderPassInput, Tex, VarType};
use crate::shader_cache::{ShaderCache, MAX_ENTRIES_FOR_TESTS};

/// Standard vertex layout: a single "position" vec2 at offset 0
fn position_layout() -> Vec<RenderPassInput> {
    vec![RenderPassInput {
        name: "position".to_string(),
        var_type: VarType::Float,
        dim_v: 2,
        dim_m: 1,
        binding: 0,
    }]
}

fn setup() -> (Arc<MockRa>, ShaderCache, Arc<dyn Tex>) {
    let mock = Arc::new(MockRa::new());
    let sc = ShaderCache::new(mock.clone());
    let target = mock.make_tex(64, 64, true);
    (mock, sc, target)
}

/// One full quad's worth of fake vertex data (6 vertices, 8 bytes each)
const VERTS: [u8; 48] = [0; 48];

// ============================================================================
// CACHE HIT / IDEMPOTENCE
// ============================================================================

#[test]
fn test_identical_shader_hits_cache() {
    let (mock, mut sc, target) = setup();

    for _ in 0..2 {
        sc.set_vertex_format(&position_layout(), 8);
        sc.add("color = vec4(1.0);\n");
        sc.dispatch_draw(&target, &VERTS, 6);
    }

    // Byte-identical accumulated text: the second dispatch reuses the pass,
    // no second compile occurs.
    assert_eq!(sc.passes_created(), 1);
    assert_eq!(mock.passes_created.load(Ordering::SeqCst), 1);

    let runs = mock.runs.lock().unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].pass_id, runs[1].pass_id);
}

#[test]
fn test_changed_body_compiles_new_pass() {
    let (mock, mut sc, target) = setup();

    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(1.0);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(0.5);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    assert_eq!(mock.passes_created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_blend_state_is_part_of_the_key() {
    let (mock, mut sc, target) = setup();

    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(1.0);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    // Same text, different blend tuple: distinct entry
    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(1.0);\n");
    sc.blend(
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        BlendFactor::One,
        BlendFactor::OneMinusSrcAlpha,
    );
    sc.dispatch_draw(&target, &VERTS, 6);

    assert_eq!(mock.passes_created.load(Ordering::SeqCst), 2);
}

// ============================================================================
// CHANGED-UNIFORM COLLECTION
// ============================================================================

#[test]
fn test_only_changed_uniforms_are_resent() {
    let (mock, mut sc, target) = setup();
    let tex = mock.make_tex(16, 16, false);

    // First dispatch: everything is new
    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_f("exposure", 1.0);
    sc.uniform_vec2("scale", [1.0, 1.0]);
    sc.uniform_texture("plane0", &tex);
    sc.add("color = texture(plane0, position) * exposure;\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    // Second dispatch: identical source, only "exposure" changes value
    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_f("exposure", 2.0);
    sc.uniform_vec2("scale", [1.0, 1.0]);
    sc.uniform_texture("plane0", &tex);
    sc.add("color = texture(plane0, position) * exposure;\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    assert_eq!(mock.passes_created.load(Ordering::SeqCst), 1);

    let runs = mock.runs.lock().unwrap();
    assert_eq!(runs.len(), 2);
    // First run sends all three declared inputs
    assert_eq!(runs[0].value_indices, [0, 1, 2]);
    // Second run: the unchanged vec2 is omitted; the texture is a resource
    // input and is always rebound
    assert_eq!(runs[1].value_indices, [0, 2]);
}

#[test]
fn test_unchanged_values_resent_after_flush() {
    let (mock, mut sc, target) = setup();

    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_f("gamma", 2.2);
    sc.add("color.rgb = pow(color.rgb, vec3(gamma));\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    // Fill the pool with distinct shaders to force a flush
    for n in 0..MAX_ENTRIES_FOR_TESTS {
        sc.set_vertex_format(&position_layout(), 8);
        sc.add(&format!("color = vec4({}.0);\n", n));
        sc.dispatch_draw(&target, &VERTS, 6);
    }

    // The original shader was evicted: same value is sent again on the
    // fresh entry
    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_f("gamma", 2.2);
    sc.add("color.rgb = pow(color.rgb, vec3(gamma));\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let runs = mock.runs.lock().unwrap();
    assert_eq!(runs.last().unwrap().value_indices, [0]);
}

// ============================================================================
// EVICTION
// ============================================================================

#[test]
fn test_pool_overflow_flushes_everything() {
    let (mock, mut sc, target) = setup();

    // Fill the pool exactly to capacity
    for n in 0..MAX_ENTRIES_FOR_TESTS {
        sc.set_vertex_format(&position_layout(), 8);
        sc.add(&format!("color = vec4({}.0);\n", n));
        sc.dispatch_draw(&target, &VERTS, 6);
    }
    assert_eq!(mock.passes_alive.load(Ordering::SeqCst), MAX_ENTRIES_FOR_TESTS);

    // The capacity+1-th distinct shader triggers a FULL flush, not a
    // single-entry eviction: afterwards only the new pass is alive.
    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(0.123);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    assert_eq!(mock.passes_alive.load(Ordering::SeqCst), 1);
    assert_eq!(
        mock.passes_created.load(Ordering::SeqCst),
        MAX_ENTRIES_FOR_TESTS + 1
    );
}

// ============================================================================
// GENERATED SOURCE
// ============================================================================

#[test]
fn test_generated_raster_source_structure() {
    let (mock, mut sc, target) = setup();
    let tex = mock.make_tex(16, 16, false);

    sc.set_vertex_format(
        &[
            RenderPassInput {
                name: "position".to_string(),
                var_type: VarType::Float,
                dim_v: 2,
                dim_m: 1,
                binding: 0,
            },
            RenderPassInput {
                name: "texcoord".to_string(),
                var_type: VarType::Float,
                dim_v: 2,
                dim_m: 1,
                binding: 8,
            },
        ],
        16,
    );
    sc.uniform_f("exposure", 1.0);
    sc.uniform_texture("plane0", &tex);
    sc.add_header("vec4 sample_plane(vec2 p) { return texture(plane0, p); }\n");
    sc.add("color = sample_plane(texcoord) * exposure;\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let created = mock.create_params.lock().unwrap();
    assert_eq!(created.len(), 1);
    let params = &created[0];

    let frag = &params.frag_shader;
    assert!(frag.starts_with("#version 130\n"));
    assert!(frag.contains("out vec4 out_color;\n"));
    // Pass-through varying from the synthesized vertex shader
    assert!(frag.contains("in vec2 texcoord;\n"));
    // Uniforms in declaration order
    assert!(frag.contains("uniform float exposure;\nuniform sampler2D plane0;\n"));
    // Header before the body, mandatory color default, write-out epilogue
    assert!(frag.contains("vec4 sample_plane"));
    assert!(frag.contains("void main() {\nvec4 color = vec4(0.0, 0.0, 0.0, 1.0);\n"));
    assert!(frag.ends_with("out_color = color;\n}\n"));

    let vert = &params.vertex_shader;
    // The reserved "position" attribute drives clip space; everything else
    // passes through under its mangled input name
    assert!(vert.contains("in vec2 vertex_position;\n"));
    assert!(vert.contains("gl_Position = vec4(vertex_position, 1.0, 1.0);\n"));
    assert!(vert.contains("in vec2 vertex_texcoord;\n"));
    assert!(vert.contains("texcoord = vertex_texcoord;\n"));
    assert!(!vert.contains("position = vertex_position"));

    // The backend receives mangled attribute names for binding
    assert_eq!(params.vertex_attribs[0].name, "vertex_position");
    assert_eq!(params.vertex_attribs[1].name, "vertex_texcoord");
    assert_eq!(params.vertex_stride, 16);
}

#[test]
fn test_generated_legacy_glsl_uses_varying() {
    // Pre-130 GLSL target
    let mut mock = MockRa::new();
    mock.glsl_version = 120;
    let mock = Arc::new(mock);
    let mut sc = ShaderCache::new(mock.clone());
    let target = mock.make_tex(8, 8, true);

    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(1.0);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let created = mock.create_params.lock().unwrap();
    let frag = &created[0].frag_shader;
    assert!(frag.starts_with("#version 120\n"));
    assert!(frag.contains("#define texture texture2D\n"));
    assert!(frag.contains("gl_FragColor = color;\n"));
    assert!(!frag.contains("out_color"));
    let vert = &created[0].vertex_shader;
    assert!(vert.contains("attribute vec2 vertex_position;\n"));
}

#[test]
fn test_generated_compute_source() {
    let (mock, mut sc, _target) = setup();
    let img = mock.make_tex(8, 8, true);

    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_image2d_wo("out_image", &img);
    sc.add("imageStore(out_image, ivec2(0), color);\n");
    sc.dispatch_compute(4, 4, 1);

    let created = mock.create_params.lock().unwrap();
    let comp = &created[0].compute_shader;
    assert!(comp.contains("#extension GL_ARB_compute_shader : enable\n"));
    assert!(comp.contains("#extension GL_ARB_shader_image_load_store : enable\n"));
    assert!(comp.contains("uniform writeonly image2D out_image;\n"));
    assert!(created[0].frag_shader.is_empty());
    assert!(created[0].vertex_shader.is_empty());
}

#[test]
fn test_matrix_uniform_transpose() {
    use crate::ra::UniformValue;

    let (mock, mut sc, target) = setup();

    sc.set_vertex_format(&position_layout(), 8);
    // Row-major input, transposed into column-major on declaration
    sc.uniform_mat2("cms", true, [0.0, 1.0, 2.0, 3.0]);
    sc.uniform_mat3(
        "yuv2rgb",
        true,
        [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
    );
    sc.add("color.rgb = yuv2rgb * color.rgb;\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let runs = mock.runs.lock().unwrap();
    match &runs[0].values[0].value {
        UniformValue::Mat2(m) => assert_eq!(*m, [0.0, 2.0, 1.0, 3.0]),
        other => panic!("expected Mat2, got {:?}", other),
    }
    match &runs[0].values[1].value {
        UniformValue::Mat3(m) => {
            assert_eq!(*m, [0.0, 3.0, 6.0, 1.0, 4.0, 7.0, 2.0, 5.0, 8.0]);
        }
        other => panic!("expected Mat3, got {:?}", other),
    }
}

#[test]
fn test_prelude_precedes_header_text() {
    let (mock, mut sc, target) = setup();

    sc.set_vertex_format(&position_layout(), 8);
    sc.add_prelude("#define PI 3.1415926\n");
    sc.add_header("float wrap(float x) { return mod(x, PI); }\n");
    sc.add("color.r = wrap(color.r);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let created = mock.create_params.lock().unwrap();
    let frag = &created[0].frag_shader;
    let prelude_pos = frag.find("#define PI").unwrap();
    let header_pos = frag.find("float wrap").unwrap();
    let body_pos = frag.find("color.r = wrap").unwrap();
    assert!(prelude_pos < header_pos);
    assert!(header_pos < body_pos);
}

// ============================================================================
// PROTOCOL VIOLATIONS
// ============================================================================

#[test]
#[should_panic(expected = "vertex format not declared")]
fn test_missing_vertex_format_asserts() {
    let (_mock, mut sc, target) = setup();
    sc.add("color = vec4(1.0);\n");
    sc.dispatch_draw(&target, &VERTS, 6);
}

#[test]
fn test_uniform_redeclaration_replaces() {
    let (mock, mut sc, target) = setup();

    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_i("mode", 1);
    // Re-declaring the same name replaces the pending declaration instead
    // of adding a second input slot
    sc.uniform_f("mode", 0.5);
    sc.add("color = vec4(mode);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let runs = mock.runs.lock().unwrap();
    assert_eq!(runs[0].value_indices, [0]);
}

// ============================================================================
// ERROR STATE
// ============================================================================

#[test]
fn test_compile_failure_latches_error_state() {
    let (mock, mut sc, target) = setup();
    mock.fail_compile.store(true, Ordering::SeqCst);

    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = bogus;\n");
    let perf = sc.dispatch_draw(&target, &VERTS, 6);

    // Nothing ran, no timing
    assert_eq!(mock.runs.lock().unwrap().len(), 0);
    assert_eq!(perf, crate::timer::PassPerf::default());
    assert!(sc.error_state());

    sc.reset_error();
    assert!(!sc.error_state());
}

#[test]
fn test_failed_entry_does_not_retry_compile() {
    // A failed entry stays in the pool; repeating the same shader does not
    // recompile every frame.
    let (mock, mut sc, target) = setup();
    mock.fail_compile.store(true, Ordering::SeqCst);

    for _ in 0..3 {
        sc.set_vertex_format(&position_layout(), 8);
        sc.add("color = bogus;\n");
        sc.dispatch_draw(&target, &VERTS, 6);
    }

    assert_eq!(mock.passes_created.load(Ordering::SeqCst), 1);
}

// ============================================================================
// COMPUTE DISPATCH
// ============================================================================

#[test]
fn test_compute_dispatch_groups() {
    let (mock, mut sc, target) = setup();
    let _ = target;
    let img = mock.make_tex(64, 64, true);
    let ssbo = {
        let ra: Arc<dyn Ra> = mock.clone();
        ra.buf_create(256).unwrap()
    };

    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_image2d_wo("out_image", &img);
    sc.ssbo("stats", &ssbo, "uint histogram[256];");
    sc.add("imageStore(out_image, ivec2(gl_GlobalInvocationID.xy), color);\n");
    sc.dispatch_compute(8, 8, 1);

    let runs = mock.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].compute);
    assert!(!runs[0].had_target);
    assert_eq!(runs[0].compute_groups, [8, 8, 1]);
}

// ============================================================================
// BINDING COUNTERS
// ============================================================================

#[test]
fn test_binding_indices_start_at_one() {
    // Unit 0 is reserved for incidental backend use; declared resources
    // start at 1 and count independently per kind.
    let (mock, mut sc, target) = setup();
    let tex_a = mock.make_tex(4, 4, false);
    let tex_b = mock.make_tex(4, 4, false);
    let img = mock.make_tex(4, 4, true);
    let ssbo = {
        let ra: Arc<dyn Ra> = mock.clone();
        ra.buf_create(64).unwrap()
    };

    sc.set_vertex_format(&position_layout(), 8);
    sc.uniform_texture("a", &tex_a);
    sc.uniform_texture("b", &tex_b);
    sc.uniform_image2d_wo("img", &img);
    sc.ssbo("buf", &ssbo, "float data[];");
    sc.add("color = vec4(1.0);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let runs = mock.runs.lock().unwrap();
    assert_eq!(runs[0].value_indices.len(), 4);
    drop(runs);

    // Each kind counts independently: units 1, 2 for the textures, unit 1
    // for the image, binding 1 for the buffer
    let created = mock.create_params.lock().unwrap();
    let inputs = &created[0].inputs;
    assert_eq!(inputs[0].binding, 1);
    assert_eq!(inputs[1].binding, 2);
    assert_eq!(inputs[2].binding, 1);
    assert_eq!(inputs[3].binding, 1);
    assert_eq!(inputs[0].var_type, VarType::Tex);
    assert_eq!(inputs[2].var_type, VarType::ImgW);
    assert_eq!(inputs[3].var_type, VarType::BufRw);
    // The SSBO declaration lands in the generated source with its binding
    assert!(created[0]
        .frag_shader
        .contains("layout(std430, binding=1) buffer buf { float data[]; };\n"));
}

// ============================================================================
// DISK PERSISTENCE
// ============================================================================

#[test]
fn test_disk_cache_write_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRa::new());
    *mock.binary.lock().unwrap() = Some(b"MOCKBINARY".to_vec());
    let target = mock.make_tex(64, 64, true);

    // First cache: compiles and persists the produced binary
    let mut sc = ShaderCache::new(mock.clone());
    sc.set_cache_dir(dir.path());
    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(1.0);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    let content = std::fs::read(files[0].as_ref().unwrap().path()).unwrap();
    assert!(content.starts_with(b"lumen shader cache v1\n"));
    assert!(content.ends_with(b"MOCKBINARY"));
    // Filename is the hex digest of the keyed text
    let name = files[0].as_ref().unwrap().file_name();
    let name = name.to_str().unwrap();
    assert_eq!(name.len(), 64);
    assert!(name.chars().all(|c| c.is_ascii_hexdigit()));

    // Second cache over the same directory: the persisted binary reaches
    // the backend as the precompiled candidate, and no rewrite happens.
    let mut sc2 = ShaderCache::new(mock.clone());
    sc2.set_cache_dir(dir.path());
    sc2.set_vertex_format(&position_layout(), 8);
    sc2.add("color = vec4(1.0);\n");
    sc2.dispatch_draw(&target, &VERTS, 6);

    let created = mock.create_params.lock().unwrap();
    assert_eq!(created.len(), 2);
    assert!(created[0].cached_program.is_empty());
    assert_eq!(created[1].cached_program, b"MOCKBINARY");
}

#[test]
fn test_disk_cache_errors_are_nonfatal() {
    let mock = Arc::new(MockRa::new());
    *mock.binary.lock().unwrap() = Some(b"MOCKBINARY".to_vec());
    let target = mock.make_tex(64, 64, true);

    // A cache directory that cannot be created: dispatch still succeeds.
    let mut sc = ShaderCache::new(mock.clone());
    sc.set_cache_dir("/proc/lumen-nonexistent/cache");
    sc.set_vertex_format(&position_layout(), 8);
    sc.add("color = vec4(1.0);\n");
    sc.dispatch_draw(&target, &VERTS, 6);

    assert_eq!(mock.runs.lock().unwrap().len(), 1);
    assert!(!sc.error_state());
}
