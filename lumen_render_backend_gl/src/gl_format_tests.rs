//! Unit tests for the GL format table (pure classification, no context)

use lumen_render::lumen::ra::CompType;

use crate::gl_format::{GlFormatFlags, GL_FORMATS, LUMINANCE_ALPHA};

fn entry(name: &str) -> &'static crate::gl_format::GlFormat {
    GL_FORMATS
        .iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("format {} missing from the table", name))
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

#[test]
fn test_unorm_classification() {
    for name in ["r8", "rg8", "rgb8", "rgba8", "r16", "rg16", "rgba16"] {
        assert_eq!(entry(name).ctype(), CompType::Unorm, "{}", name);
    }
}

#[test]
fn test_uint_classification() {
    for name in ["r16ui", "rg16ui", "rgba16ui"] {
        assert_eq!(entry(name).ctype(), CompType::Uint, "{}", name);
    }
}

#[test]
fn test_float_classification() {
    for name in ["r16f", "rg16f", "rgba16f", "r32f", "rgba32f"] {
        assert_eq!(entry(name).ctype(), CompType::Float, "{}", name);
    }
}

#[test]
fn test_component_counts() {
    assert_eq!(entry("r8").components(), 1);
    assert_eq!(entry("rg8").components(), 2);
    assert_eq!(entry("rgb8").components(), 3);
    assert_eq!(entry("rgba8").components(), 4);
    assert_eq!(entry("la").components(), 2);
    assert_eq!(entry("appleyp").components(), 3);
}

#[test]
fn test_pixel_sizes() {
    assert_eq!(entry("r8").pixel_bytes(), 1);
    assert_eq!(entry("rgba8").pixel_bytes(), 4);
    assert_eq!(entry("rgba16").pixel_bytes(), 8);
    // float16 formats upload as float32
    assert_eq!(entry("rgba16f").pixel_bytes(), 16);
    // packed formats are two bytes regardless of component count
    assert_eq!(entry("rgb565").pixel_bytes(), 2);
    assert_eq!(entry("appleyp").pixel_bytes(), 2);
}

#[test]
fn test_luminance_alpha_flagging() {
    assert!(entry("la").is_luminance_alpha());
    assert_eq!(entry("la").format, LUMINANCE_ALPHA);
    assert!(!entry("rg8").is_luminance_alpha());
}

// ============================================================================
// GATING FLAGS
// ============================================================================

#[test]
fn test_every_entry_has_a_feature_gate() {
    let gates = GlFormatFlags::GL2
        | GlFormatFlags::GL3
        | GlFormatFlags::ES2
        | GlFormatFlags::ES3
        | GlFormatFlags::EXT_APPLE_422;
    for fmt in GL_FORMATS {
        assert!(
            !(fmt.flags & gates).is_empty(),
            "{} would never be enumerated",
            fmt.name
        );
    }
}

#[test]
fn test_16bit_unorm_is_desktop_only() {
    for name in ["r16", "rg16", "rgba16"] {
        let flags = entry(name).flags;
        assert!(flags.contains(GlFormatFlags::GL3));
        assert!(!flags.contains(GlFormatFlags::ES2));
        assert!(!flags.contains(GlFormatFlags::ES3));
    }
}

#[test]
fn test_f16_formats_marked() {
    assert!(entry("rgba16f").flags.contains(GlFormatFlags::F16));
    assert!(!entry("rgba32f").flags.contains(GlFormatFlags::F16));
}

#[test]
fn test_renderable_and_filterable_properties() {
    assert!(entry("rgba8").flags.contains(GlFormatFlags::CR));
    assert!(entry("rgba8").flags.contains(GlFormatFlags::TF));
    // integer formats are not filterable
    assert!(!entry("r16ui").flags.contains(GlFormatFlags::TF));
    // legacy la is not color-renderable
    assert!(!entry("la").flags.contains(GlFormatFlags::CR));
}

#[test]
fn test_table_names_are_unique() {
    for (n, fmt) in GL_FORMATS.iter().enumerate() {
        for other in &GL_FORMATS[n + 1..] {
            assert_ne!(fmt.name, other.name);
        }
    }
}
