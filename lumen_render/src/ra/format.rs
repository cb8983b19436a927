/// Native texture format descriptors and registry lookups

use std::sync::Arc;

use crate::ra::imgfmt::PixelFormat;
use crate::ra::ra::Ra;

/// Component interpretation of a native format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompType {
    /// Normalized fixed point (unsigned)
    Unorm,
    /// Unsigned integer (sampled as integers in the shader)
    Uint,
    /// Floating point
    Float,
}

/// Fixed image-format descriptor a backend attaches to a native format it
/// special-cases outright (e.g. packed RGB565)
///
/// The format resolution path returns this descriptor directly, bypassing
/// plane decomposition. The plane is always the carrying format itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialImgFmt {
    /// The player pixel format this native format represents 1:1
    pub imgfmt: PixelFormat,
    /// RGBA component sources for the single plane (0 = unused, 1..4 = image
    /// component index)
    pub components: [u8; 4],
    /// Chroma subsampling factors
    pub chroma_w: u8,
    pub chroma_h: u8,
    /// Effective bits per component
    pub component_bits: u8,
    /// Component padding (sign convention as in [`ImgFmtDesc`])
    pub component_pad: i8,
}

/// Immutable descriptor for one native texture format
///
/// Created once at backend initialization by enumerating backend
/// capabilities; owned by the backend context and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Format {
    /// Format name for lookups and diagnostics (e.g. "rgba8", "r16")
    pub name: String,
    /// Component interpretation
    pub ctype: CompType,
    /// Number of components (1..4)
    pub num_components: usize,
    /// Size of one pixel in bytes (including padding)
    pub pixel_size: usize,
    /// Bits occupied by each component in memory
    pub component_size: [u8; 4],
    /// Effective bits of each component (<= component_size)
    pub component_depth: [u8; 4],
    /// Uses the legacy luminance-alpha component order
    pub luminance_alpha: bool,
    /// Can be sampled with linear filtering
    pub linear_filter: bool,
    /// Can be used as a render target
    pub renderable: bool,
    /// Backend-defined handle for this format, if any
    pub native: Option<u64>,
    /// Set when the backend special-cases a player pixel format with this
    /// native format
    pub special_imgfmt: Option<SpecialImgFmt>,
}

impl Format {
    /// Return whether this is a tightly packed format with no external
    /// padding and with the same bit size/depth in all components.
    pub fn is_regular(&self) -> bool {
        if self.pixel_size == 0 || self.num_components == 0 {
            return false;
        }
        for n in 1..self.num_components {
            if self.component_size[n] != self.component_size[0]
                || self.component_depth[n] != self.component_depth[0]
            {
                return false;
            }
        }
        self.component_size[0] as usize * self.num_components == self.pixel_size * 8
    }
}

/// Return a regular filterable format using [`CompType::Unorm`].
pub fn find_unorm_format(
    ra: &dyn Ra,
    bytes_per_component: usize,
    n_components: usize,
) -> Option<Arc<Format>> {
    ra.formats()
        .iter()
        .find(|fmt| {
            fmt.ctype == CompType::Unorm
                && fmt.num_components == n_components
                && fmt.pixel_size == bytes_per_component * n_components
                && fmt.component_depth[0] as usize == bytes_per_component * 8
                && fmt.linear_filter
                && fmt.is_regular()
        })
        .cloned()
}

/// Return a regular format using [`CompType::Uint`].
pub fn find_uint_format(
    ra: &dyn Ra,
    bytes_per_component: usize,
    n_components: usize,
) -> Option<Arc<Format>> {
    ra.formats()
        .iter()
        .find(|fmt| {
            fmt.ctype == CompType::Uint
                && fmt.num_components == n_components
                && fmt.pixel_size == bytes_per_component * n_components
                && fmt.component_depth[0] as usize == bytes_per_component * 8
                && fmt.is_regular()
        })
        .cloned()
}

/// Return a filterable regular format that uses float16 internally, but does
/// 32 bit transfer. (This is just so we don't need 32->16 bit conversion on
/// the CPU, which would be ok but messy.)
pub fn find_float16_format(ra: &dyn Ra, n_components: usize) -> Option<Arc<Format>> {
    ra.formats()
        .iter()
        .find(|fmt| {
            fmt.ctype == CompType::Float
                && fmt.num_components == n_components
                && fmt.pixel_size == 4 * n_components
                && fmt.component_depth[0] == 16
                && fmt.linear_filter
                && fmt.is_regular()
        })
        .cloned()
}

/// Exact name lookup in the backend's format table.
pub fn find_named_format(ra: &dyn Ra, name: &str) -> Option<Arc<Format>> {
    ra.formats().iter().find(|fmt| fmt.name == name).cloned()
}

/// Dump the backend's texture format table as a human-readable listing at
/// debug severity. For log-gated introspection only.
pub fn dump_tex_formats(ra: &dyn Ra) {
    crate::ra_debug!("lumen::ra", "Texture formats:");
    crate::ra_debug!("lumen::ra", "  NAME       COMP*TYPE SIZE        DEPTH PER COMP.");
    for fmt in ra.formats() {
        let ctype = match fmt.ctype {
            CompType::Unorm => "unorm",
            CompType::Uint => "uint ",
            CompType::Float => "float",
        };
        let mut cl = String::new();
        for i in 0..fmt.num_components {
            if i > 0 {
                cl.push(' ');
            }
            cl.push_str(&fmt.component_size[i].to_string());
            if fmt.component_size[i] != fmt.component_depth[i] {
                cl.push_str(&format!("/{}", fmt.component_depth[i]));
            }
        }
        crate::ra_debug!(
            "lumen::ra",
            "  {:<10} {}*{} {:>3}B {} {} {} {{{}}}",
            fmt.name,
            fmt.num_components,
            ctype,
            fmt.pixel_size,
            if fmt.luminance_alpha { "LA" } else { "  " },
            if fmt.linear_filter { "LF" } else { "  " },
            if fmt.renderable { "CR" } else { "  " },
            cl
        );
    }
    crate::ra_debug!("lumen::ra", " LA = LUMINANCE_ALPHA hack format");
    crate::ra_debug!("lumen::ra", " LF = linear filterable");
    crate::ra_debug!("lumen::ra", " CR = can be used for render targets");
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
