//! Render-target and coordinate helpers shared by callers of the render
//! layer

use std::sync::Arc;

use bitflags::bitflags;
use glam::{Mat2, Vec2};

use crate::error::Result;
use crate::ra::{Format, Ra, Tex, TexParams};

/// A 2x2 matrix transform, with the translation part separate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub m: Mat2,
    pub t: Vec2,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        m: Mat2::IDENTITY,
        t: Vec2::ZERO,
    };

    /// Orthographic projection mapping `[x0, x1] x [y0, y1]` to the
    /// `[-1, 1]` clip-space square.
    pub fn ortho(x0: f32, x1: f32, y0: f32, y1: f32) -> Self {
        Self {
            m: Mat2::from_diagonal(Vec2::new(2.0 / (x1 - x0), 2.0 / (y1 - y0))),
            t: Vec2::new(-(x1 + x0) / (x1 - x0), -(y1 + y0) / (y1 - y0)),
        }
    }

    /// Apply as an affine transformation (the translation part is added).
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.m * v + self.t
    }

    /// Transform both corners of a rectangle.
    pub fn apply_rect(&self, r: &mut RectF) {
        let p0 = self.apply(Vec2::new(r.x0, r.y0));
        let p1 = self.apply(Vec2::new(r.x1, r.y1));
        *r = RectF {
            x0: p0.x,
            y0: p0.y,
            x1: p1.x,
            y1: p1.y,
        };
    }

    /// Combine transforms: the result applies `other` first, then `self`.
    pub fn compose(&self, other: &Transform) -> Transform {
        Transform {
            m: self.m * other.m,
            t: self.apply(other.t),
        }
    }
}

/// Floating point rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectF {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl RectF {
    /// Semantic equality (fuzzy comparison)
    pub fn seq(&self, other: &RectF) -> bool {
        (self.x0 - other.x0).abs() < 1e-6
            && (self.x1 - other.x1).abs() < 1e-6
            && (self.y0 - other.y0).abs() < 1e-6
            && (self.y1 - other.y1).abs() < 1e-6
    }
}

bitflags! {
    /// Resize policy flags for [`FboTex::change`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FboTexFlags: u32 {
        /// Allow the real width to exceed the logical width
        const FUZZY_W = 1 << 0;
        /// Allow the real height to exceed the logical height
        const FUZZY_H = 1 << 1;
        /// Both dimensions fuzzy
        const FUZZY = Self::FUZZY_W.bits() | Self::FUZZY_H.bits();
    }
}

/// Fuzzy dimensions are rounded up to this granularity to dampen
/// reallocation churn.
const FUZZY_ALIGN: usize = 256;

fn align_up(v: usize, align: usize) -> usize {
    v.div_ceil(align) * align
}

/// A render-target texture with separate real (allocated) and logical
/// (configured) sizes
///
/// Reallocates lazily on size or format changes; with fuzzy flags, a
/// shrinking logical size reuses the existing allocation.
pub struct FboTex {
    ra: Arc<dyn Ra>,
    /// The texture, created with render_dst + render_src + linear sampling
    pub tex: Option<Arc<dyn Tex>>,
    /// Real (texture) size
    pub rw: usize,
    pub rh: usize,
    /// Logical (configured) size, <= the texture size
    pub lw: usize,
    pub lh: usize,
}

impl FboTex {
    /// Create an empty helper; no texture is allocated until
    /// [`FboTex::change`] is called.
    pub fn new(ra: Arc<dyn Ra>) -> Self {
        Self {
            ra,
            tex: None,
            rw: 0,
            rh: 0,
            lw: 0,
            lh: 0,
        }
    }

    /// Ensure a render target of logical size `w` x `h` with the given
    /// format exists, reallocating only when required.
    ///
    /// # Errors
    ///
    /// Fails when texture creation fails; the helper is left empty in that
    /// case.
    pub fn change(
        &mut self,
        w: usize,
        h: usize,
        format: &Arc<Format>,
        flags: FboTexFlags,
    ) -> Result<()> {
        if let Some(tex) = &self.tex {
            let same_format = tex.params().format.as_ref() == format.as_ref();
            let w_ok = self.rw == w || (flags.contains(FboTexFlags::FUZZY_W) && w <= self.rw);
            let h_ok = self.rh == h || (flags.contains(FboTexFlags::FUZZY_H) && h <= self.rh);
            if same_format && w_ok && h_ok {
                self.lw = w;
                self.lh = h;
                return Ok(());
            }
        }

        self.uninit();

        let mut rw = w;
        let mut rh = h;
        if flags.contains(FboTexFlags::FUZZY_W) {
            rw = align_up(rw, FUZZY_ALIGN);
        }
        if flags.contains(FboTexFlags::FUZZY_H) {
            rh = align_up(rh, FUZZY_ALIGN);
        }

        crate::ra_debug!("lumen::FboTex", "Create FBO: {}x{} ({}x{} logical)", rw, rh, w, h);

        let params = TexParams {
            render_src: true,
            render_dst: true,
            src_linear: true,
            ..TexParams::new_2d(rw, rh, format.clone())
        };
        self.tex = Some(self.ra.tex_create(&params)?);
        self.rw = rw;
        self.rh = rh;
        self.lw = w;
        self.lh = h;
        Ok(())
    }

    /// Release the texture and reset all sizes.
    pub fn uninit(&mut self) {
        self.tex = None;
        self.rw = 0;
        self.rh = 0;
        self.lw = 0;
        self.lh = 0;
    }
}

#[cfg(test)]
#[path = "utils_tests.rs"]
mod tests;
