/// Player pixel formats and their mapping onto native texture formats

use std::sync::Arc;

use crate::ra::format::{find_uint_format, find_unorm_format, CompType, Format};
use crate::ra::ra::Ra;

/// Player-level pixel formats this layer can negotiate
///
/// These are the CPU-side frame layouts handed to the video output; the
/// registry decomposes each into one native texture per plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8 bit luma only
    Y8,
    /// 16 bit luma only
    Y16,
    /// Packed 8 bit luma + alpha
    Ya8,
    /// Planar YUV 4:2:0, 8 bit
    Yuv420p,
    /// Planar YUV 4:2:2, 8 bit
    Yuv422p,
    /// Planar YUV 4:4:4, 8 bit
    Yuv444p,
    /// Planar YUV 4:2:0, 10 bit in 16 bit words (value in the LSBs)
    Yuv420p10,
    /// Biplanar YUV 4:2:0, 8 bit (interleaved chroma)
    Nv12,
    /// Biplanar YUV 4:2:0, 10 bit in 16 bit words (value in the MSBs)
    P010,
    /// Packed RGB, 8 bit per component
    Rgb24,
    /// Packed RGBA, 8 bit per component
    Rgba,
    /// Packed BGRA, 8 bit per component
    Bgra,
    /// Packed RGBA, 16 bit per component
    Rgba64,
    /// Packed 5-6-5 RGB in 16 bit words (backend special format)
    Rgb565,
    /// Packed 4:2:2 YUV (backend special format)
    Uyvy,
}

/// One plane of a regular pixel format layout
#[derive(Debug, Clone)]
pub struct PlaneLayout {
    /// Image components stored in this plane, in memory order
    /// (1..4 = R/G/B/A for RGB formats, Y/U/V/A for YUV formats)
    pub components: Vec<u8>,
}

/// CPU-side layout of a "regular" pixel format: tightly packed planes of
/// equally sized components
#[derive(Debug, Clone)]
pub struct RegularLayout {
    /// Bytes per component
    pub component_size: usize,
    /// Bits of padding per component; 0 = none, negative = padding in the
    /// MSBs (value aligned to the LSBs), positive = padding in the LSBs
    pub component_pad: i8,
    /// Chroma subsampling factors (2 = half resolution)
    pub chroma_w: u8,
    pub chroma_h: u8,
    /// Plane layouts, in plane order
    pub planes: Vec<PlaneLayout>,
}

impl PixelFormat {
    /// All negotiable pixel formats, for diagnostics and capability probing
    pub const ALL: &'static [PixelFormat] = &[
        PixelFormat::Y8,
        PixelFormat::Y16,
        PixelFormat::Ya8,
        PixelFormat::Yuv420p,
        PixelFormat::Yuv422p,
        PixelFormat::Yuv444p,
        PixelFormat::Yuv420p10,
        PixelFormat::Nv12,
        PixelFormat::P010,
        PixelFormat::Rgb24,
        PixelFormat::Rgba,
        PixelFormat::Bgra,
        PixelFormat::Rgba64,
        PixelFormat::Rgb565,
        PixelFormat::Uyvy,
    ];

    /// Format name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Y8 => "y8",
            PixelFormat::Y16 => "y16",
            PixelFormat::Ya8 => "ya8",
            PixelFormat::Yuv420p => "yuv420p",
            PixelFormat::Yuv422p => "yuv422p",
            PixelFormat::Yuv444p => "yuv444p",
            PixelFormat::Yuv420p10 => "yuv420p10",
            PixelFormat::Nv12 => "nv12",
            PixelFormat::P010 => "p010",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Bgra => "bgra",
            PixelFormat::Rgba64 => "rgba64",
            PixelFormat::Rgb565 => "rgb565",
            PixelFormat::Uyvy => "uyvy",
        }
    }

    /// Regular plane/component layout of this format, or None for packed
    /// formats only representable by a backend special format
    pub fn regular_layout(&self) -> Option<RegularLayout> {
        let layout = |size: usize, pad: i8, cw: u8, ch: u8, planes: &[&[u8]]| RegularLayout {
            component_size: size,
            component_pad: pad,
            chroma_w: cw,
            chroma_h: ch,
            planes: planes
                .iter()
                .map(|p| PlaneLayout { components: p.to_vec() })
                .collect(),
        };

        match self {
            PixelFormat::Y8 => Some(layout(1, 0, 1, 1, &[&[1]])),
            PixelFormat::Y16 => Some(layout(2, 0, 1, 1, &[&[1]])),
            PixelFormat::Ya8 => Some(layout(1, 0, 1, 1, &[&[1, 4]])),
            PixelFormat::Yuv420p => Some(layout(1, 0, 2, 2, &[&[1], &[2], &[3]])),
            PixelFormat::Yuv422p => Some(layout(1, 0, 2, 1, &[&[1], &[2], &[3]])),
            PixelFormat::Yuv444p => Some(layout(1, 0, 1, 1, &[&[1], &[2], &[3]])),
            PixelFormat::Yuv420p10 => Some(layout(2, -6, 2, 2, &[&[1], &[2], &[3]])),
            PixelFormat::Nv12 => Some(layout(1, 0, 2, 2, &[&[1], &[2, 3]])),
            PixelFormat::P010 => Some(layout(2, 6, 2, 2, &[&[1], &[2, 3]])),
            PixelFormat::Rgb24 => Some(layout(1, 0, 1, 1, &[&[1, 2, 3]])),
            PixelFormat::Rgba => Some(layout(1, 0, 1, 1, &[&[1, 2, 3, 4]])),
            PixelFormat::Bgra => Some(layout(1, 0, 1, 1, &[&[3, 2, 1, 4]])),
            PixelFormat::Rgba64 => Some(layout(2, 0, 1, 1, &[&[1, 2, 3, 4]])),
            PixelFormat::Rgb565 => None,
            PixelFormat::Uyvy => None,
        }
    }
}

/// Mapping of one player pixel format onto native texture formats
///
/// Each plane is represented by a texture, and each texture has an RGBA
/// component order; `components` describes the meaning of the texture
/// channels. Derived on demand and never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImgFmtDesc {
    /// Native format of each plane
    pub planes: Vec<Arc<Format>>,
    /// `components[plane][texture_channel]` = image component carried there
    /// (0 = unused, 1..4 = image component index)
    pub components: [[u8; 4]; 4],
    /// Chroma subsampling factors
    pub chroma_w: u8,
    pub chroma_h: u8,
    /// Bits per component as stored on the CPU side
    pub component_bits: u8,
    /// Component padding (see [`RegularLayout::component_pad`])
    pub component_pad: i8,
}

/// Like [`find_unorm_format`], but if no fixed point format is available,
/// return an unsigned integer format.
fn find_plane_format(ra: &dyn Ra, bytes: usize, n_channels: usize) -> Option<Arc<Format>> {
    find_unorm_format(ra, bytes, n_channels).or_else(|| find_uint_format(ra, bytes, n_channels))
}

/// Compute the mapping of `imgfmt` to texture formats. Selects the texture
/// formats needed to represent the pixel format in a shader, with textures
/// using the same memory organization as on the CPU.
///
/// May return integer formats for >8 bit formats, if the backend has no
/// normalized 16 bit formats. Returns None if:
/// - a plane cannot be represented by any registered format,
/// - the chosen component depth would truncate LSB-aligned values, or
/// - different planes resolve to incompatible component types.
pub fn get_imgfmt_desc(ra: &dyn Ra, imgfmt: PixelFormat) -> Option<ImgFmtDesc> {
    if let Some(layout) = imgfmt.regular_layout() {
        let component_bits = (layout.component_size * 8) as u8;
        let mut planes = Vec::with_capacity(layout.planes.len());
        let mut components = [[0u8; 4]; 4];
        let mut ctype: Option<CompType> = None;

        for (n, plane) in layout.planes.iter().enumerate() {
            let fmt = find_plane_format(ra, layout.component_size, plane.components.len())?;
            for (i, &c) in plane.components.iter().enumerate() {
                components[n][i] = c;
            }
            // Dropping LSBs when shifting will lead to dropped MSBs.
            if component_bits > fmt.component_depth[0] && layout.component_pad < 0 {
                return None;
            }
            // Renderer restriction, but actually an unwanted corner case.
            if ctype.is_some_and(|t| t != fmt.ctype) {
                return None;
            }
            ctype = Some(fmt.ctype);
            planes.push(fmt);
        }

        return Some(ImgFmtDesc {
            planes,
            components,
            chroma_w: layout.chroma_w,
            chroma_h: layout.chroma_h,
            component_bits,
            component_pad: layout.component_pad,
        });
    }

    // Formats the backend special-cases outright.
    for fmt in ra.formats() {
        if let Some(special) = &fmt.special_imgfmt {
            if special.imgfmt == imgfmt {
                let mut components = [[0u8; 4]; 4];
                components[0] = special.components;
                return Some(ImgFmtDesc {
                    planes: vec![fmt.clone()],
                    components,
                    chroma_w: special.chroma_w,
                    chroma_h: special.chroma_h,
                    component_bits: special.component_bits,
                    component_pad: special.component_pad,
                });
            }
        }
    }

    // Unsupported format
    None
}

/// Dump one plane-mapping descriptor at debug severity.
pub fn dump_imgfmt_desc(desc: &ImgFmtDesc) {
    let mut pl = String::new();
    let mut pf = String::new();
    for (n, plane) in desc.planes.iter().enumerate() {
        if n > 0 {
            pl.push('/');
            pf.push('/');
        }
        let mut t = String::new();
        for i in 0..4 {
            t.push(b"_rgba"[desc.components[n][i] as usize] as char);
        }
        while t.ends_with('_') && t.len() > 1 {
            t.pop();
        }
        pl.push_str(&t);
        pf.push_str(&plane.name);
    }
    crate::ra_debug!(
        "lumen::ra",
        "{} planes {}x{} {}/{} [{}] ({})",
        desc.planes.len(),
        desc.chroma_w,
        desc.chroma_h,
        desc.component_bits,
        desc.component_pad,
        pf,
        pl
    );
}

/// Dump the negotiation result for every pixel format at debug severity.
pub fn dump_img_formats(ra: &dyn Ra) {
    crate::ra_debug!("lumen::ra", "Image formats:");
    for &imgfmt in PixelFormat::ALL {
        match get_imgfmt_desc(ra, imgfmt) {
            Some(desc) => {
                crate::ra_debug!("lumen::ra", "  {} =>", imgfmt.name());
                dump_imgfmt_desc(&desc);
            }
            None => {
                crate::ra_debug!("lumen::ra", "  {}", imgfmt.name());
            }
        }
    }
}

#[cfg(test)]
#[path = "imgfmt_tests.rs"]
mod tests;
