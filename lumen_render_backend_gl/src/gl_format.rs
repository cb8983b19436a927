/// Static OpenGL format table and its classification helpers

use lumen_render::lumen::ra::CompType;

// Legacy and extension enums glow does not re-export
pub(crate) const LUMINANCE_ALPHA: u32 = 0x190A;
pub(crate) const RGB_422_APPLE: u32 = 0x8A1F;
pub(crate) const UNSIGNED_SHORT_8_8_APPLE: u32 = 0x85BA;
pub(crate) const TEXTURE_RECTANGLE: u32 = 0x84F5;
pub(crate) const TEXTURE_EXTERNAL_OES: u32 = 0x8D65;

bitflags::bitflags! {
    /// Property and feature-gate bits of a table entry
    ///
    /// Feature bits describe which context generations provide the entry;
    /// a format is enumerated when its feature bits intersect the set the
    /// active context satisfies. Property bits (CR/TF/F16) describe the
    /// format itself.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GlFormatFlags: u32 {
        /// Usable as a render target (color-renderable)
        const CR = 1 << 0;
        /// Linear filtering supported (texture-filterable)
        const TF = 1 << 1;
        /// Stored as float16, uploaded as float32
        const F16 = 1 << 2;

        /// Available on legacy desktop GL 2.1
        const GL2 = 1 << 8;
        /// Available on desktop core GL 3.0+
        const GL3 = 1 << 9;
        /// Available on GLES 2.0
        const ES2 = 1 << 10;
        /// Available on GLES 3.0+
        const ES3 = 1 << 11;
        /// Requires GL_APPLE_rgb_422
        const EXT_APPLE_422 = 1 << 12;
    }
}

/// One native format entry: name, GL enums and gating flags
#[derive(Debug, Clone, Copy)]
pub struct GlFormat {
    pub name: &'static str,
    pub internal_format: u32,
    pub format: u32,
    pub type_: u32,
    pub flags: GlFormatFlags,
}

const CR: GlFormatFlags = GlFormatFlags::CR;
const TF: GlFormatFlags = GlFormatFlags::TF;

/// All formats this backend can enumerate, gated by context features
pub(crate) const GL_FORMATS: &[GlFormat] = &[
    // 8 bit unorm
    fmt("r8", glow::R8, glow::RED, glow::UNSIGNED_BYTE, gl3es3(CR.union(TF))),
    fmt("rg8", glow::RG8, glow::RG, glow::UNSIGNED_BYTE, gl3es3(CR.union(TF))),
    fmt("rgb8", glow::RGB8, glow::RGB, glow::UNSIGNED_BYTE, gl3es3(CR.union(TF))),
    fmt("rgba8", glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE, gl3es3(CR.union(TF))),
    // 16 bit unorm (desktop only)
    fmt("r16", glow::R16, glow::RED, glow::UNSIGNED_SHORT, gl3(CR.union(TF))),
    fmt("rg16", glow::RG16, glow::RG, glow::UNSIGNED_SHORT, gl3(CR.union(TF))),
    fmt("rgba16", glow::RGBA16, glow::RGBA, glow::UNSIGNED_SHORT, gl3(CR.union(TF))),
    // float16 storage with float32 transfer
    fmt("r16f", glow::R16F, glow::RED, glow::FLOAT, gl3(CR.union(TF).union(GlFormatFlags::F16))),
    fmt("rg16f", glow::RG16F, glow::RG, glow::FLOAT, gl3(CR.union(TF).union(GlFormatFlags::F16))),
    fmt(
        "rgba16f",
        glow::RGBA16F,
        glow::RGBA,
        glow::FLOAT,
        gl3(CR.union(TF).union(GlFormatFlags::F16)),
    ),
    // float32
    fmt("r32f", glow::R32F, glow::RED, glow::FLOAT, gl3(CR.union(TF))),
    fmt("rgba32f", glow::RGBA32F, glow::RGBA, glow::FLOAT, gl3(CR.union(TF))),
    // unsigned integer (negotiation fallback when unorm16 is unavailable)
    fmt("r16ui", glow::R16UI, glow::RED_INTEGER, glow::UNSIGNED_SHORT, gl3es3(CR)),
    fmt("rg16ui", glow::RG16UI, glow::RG_INTEGER, glow::UNSIGNED_SHORT, gl3es3(CR)),
    fmt(
        "rgba16ui",
        glow::RGBA16UI,
        glow::RGBA_INTEGER,
        glow::UNSIGNED_SHORT,
        gl3es3(CR),
    ),
    // legacy luminance-alpha (two components mapped to L and A)
    fmt(
        "la",
        LUMINANCE_ALPHA,
        LUMINANCE_ALPHA,
        glow::UNSIGNED_BYTE,
        TF.union(GlFormatFlags::GL2).union(GlFormatFlags::ES2),
    ),
    // packed special formats
    fmt(
        "rgb565",
        glow::RGB8,
        glow::RGB,
        glow::UNSIGNED_SHORT_5_6_5,
        CR.union(TF)
            .union(GlFormatFlags::GL2)
            .union(GlFormatFlags::GL3)
            .union(GlFormatFlags::ES2)
            .union(GlFormatFlags::ES3),
    ),
    fmt(
        "appleyp",
        glow::RGB,
        RGB_422_APPLE,
        UNSIGNED_SHORT_8_8_APPLE,
        CR.union(TF).union(GlFormatFlags::EXT_APPLE_422),
    ),
];

const fn fmt(
    name: &'static str,
    internal_format: u32,
    format: u32,
    type_: u32,
    flags: GlFormatFlags,
) -> GlFormat {
    GlFormat {
        name,
        internal_format,
        format,
        type_,
        flags,
    }
}

const fn gl3(props: GlFormatFlags) -> GlFormatFlags {
    props.union(GlFormatFlags::GL3)
}

const fn gl3es3(props: GlFormatFlags) -> GlFormatFlags {
    props.union(GlFormatFlags::GL3).union(GlFormatFlags::ES3)
}

impl GlFormat {
    /// Component interpretation when sampled
    pub fn ctype(&self) -> CompType {
        if self.type_ == glow::FLOAT {
            return CompType::Float;
        }
        match self.format {
            glow::RED_INTEGER | glow::RG_INTEGER | glow::RGB_INTEGER | glow::RGBA_INTEGER => {
                CompType::Uint
            }
            _ => CompType::Unorm,
        }
    }

    /// Number of components of the transfer format
    pub fn components(&self) -> usize {
        match self.format {
            glow::RED | glow::RED_INTEGER => 1,
            glow::RG | glow::RG_INTEGER => 2,
            glow::RGB | glow::RGB_INTEGER | RGB_422_APPLE => 3,
            glow::RGBA | glow::RGBA_INTEGER => 4,
            LUMINANCE_ALPHA => 2,
            other => panic!("unclassified GL transfer format 0x{:X}", other),
        }
    }

    /// Bytes per component of the transfer type (packed short types count
    /// as the whole 16 bit word)
    pub fn component_bytes(&self) -> usize {
        match self.type_ {
            glow::UNSIGNED_BYTE => 1,
            glow::UNSIGNED_SHORT | glow::UNSIGNED_SHORT_5_6_5 | UNSIGNED_SHORT_8_8_APPLE => 2,
            glow::FLOAT => 4,
            other => panic!("unclassified GL transfer type 0x{:X}", other),
        }
    }

    /// Bytes of one whole pixel, including packed layouts
    pub fn pixel_bytes(&self) -> usize {
        match self.type_ {
            glow::UNSIGNED_SHORT_5_6_5 | UNSIGNED_SHORT_8_8_APPLE => 2,
            _ => self.component_bytes() * self.components(),
        }
    }

    /// Whether this entry uses the legacy luminance-alpha order
    pub fn is_luminance_alpha(&self) -> bool {
        self.format == LUMINANCE_ALPHA
    }
}

#[cfg(test)]
#[path = "gl_format_tests.rs"]
mod tests;
