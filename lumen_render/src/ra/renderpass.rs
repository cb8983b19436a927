/// Render pass types: input schema, uniform values, creation and run
/// parameters

use std::any::Any;
use std::sync::Arc;

use crate::ra::ra::Rect;
use crate::ra::tex::{Buf, Tex};

/// Kind of program a render pass executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPassType {
    /// Vertex + fragment program, executed as a triangle-list draw
    Raster,
    /// Compute program, executed as a 3D group dispatch
    Compute,
}

/// Type of a declared render pass input or vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    /// 32 bit signed integer (uniforms only; always scalar)
    Int,
    /// 32 bit float scalar, vector or matrix
    Float,
    /// Normalized 8 bit unsigned integer (vertex attributes only)
    ByteUnorm,
    /// Sampled texture
    Tex,
    /// Write-only storage image
    ImgW,
    /// Read/write shader storage buffer
    BufRw,
}

/// One declared input slot (uniform) or vertex attribute of a render pass
///
/// Once the pass is created, slot ordering and types are fixed; values are
/// supplied per invocation by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderPassInput {
    /// Identifier in the shader source
    pub name: String,
    /// Value type
    pub var_type: VarType,
    /// Vector dimension (1..4); 2 or 3 for matrices
    pub dim_v: usize,
    /// Matrix row count (1 for non-matrices)
    pub dim_m: usize,
    /// Fixed texture unit / image unit / buffer binding index.
    /// For vertex attributes: byte offset into the vertex.
    pub binding: usize,
}

/// Return the byte size of the primitive data a value for this input
/// carries. Returns 0 for resource types (textures, buffers).
pub fn input_data_size(input: &RenderPassInput) -> usize {
    let el_size = match input.var_type {
        VarType::Int => std::mem::size_of::<i32>(),
        VarType::Float => std::mem::size_of::<f32>(),
        VarType::ByteUnorm => 1,
        VarType::Tex | VarType::ImgW | VarType::BufRw => 0,
    };
    el_size * input.dim_v * input.dim_m
}

/// Blend factors supported by the raster path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

/// A uniform value supplied at pass execution time
///
/// Arities are fixed by construction: vectors are 1-4 components, matrices
/// 2x2 or 3x3. Matrix values are column-major as transmitted; callers
/// needing the transpose apply it before constructing the value.
#[derive(Clone)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat2([f32; 4]),
    Mat3([f32; 9]),
    Tex(Arc<dyn Tex>),
    Buf(Arc<dyn Buf>),
}

impl std::fmt::Debug for UniformValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UniformValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
            UniformValue::Float(v) => f.debug_tuple("Float").field(v).finish(),
            UniformValue::Vec2(v) => f.debug_tuple("Vec2").field(v).finish(),
            UniformValue::Vec3(v) => f.debug_tuple("Vec3").field(v).finish(),
            UniformValue::Vec4(v) => f.debug_tuple("Vec4").field(v).finish(),
            UniformValue::Mat2(v) => f.debug_tuple("Mat2").field(v).finish(),
            UniformValue::Mat3(v) => f.debug_tuple("Mat3").field(v).finish(),
            UniformValue::Tex(tex) => {
                let p = tex.params();
                write!(f, "Tex({}x{}x{})", p.w, p.h, p.d)
            }
            UniformValue::Buf(buf) => write!(f, "Buf({} bytes)", buf.size()),
        }
    }
}

impl UniformValue {
    /// Byte-wise equality for change detection
    ///
    /// Primitive values compare their bit representation (so two NaNs with
    /// the same bits are "unchanged"); resource values always count as
    /// changed, since rebinding is required regardless.
    pub fn same_bytes(&self, other: &UniformValue) -> bool {
        fn bits_eq(a: &[f32], b: &[f32]) -> bool {
            bytemuck::cast_slice::<f32, u8>(a) == bytemuck::cast_slice::<f32, u8>(b)
        }
        match (self, other) {
            (UniformValue::Int(a), UniformValue::Int(b)) => a == b,
            (UniformValue::Float(a), UniformValue::Float(b)) => a.to_bits() == b.to_bits(),
            (UniformValue::Vec2(a), UniformValue::Vec2(b)) => bits_eq(a, b),
            (UniformValue::Vec3(a), UniformValue::Vec3(b)) => bits_eq(a, b),
            (UniformValue::Vec4(a), UniformValue::Vec4(b)) => bits_eq(a, b),
            (UniformValue::Mat2(a), UniformValue::Mat2(b)) => bits_eq(a, b),
            (UniformValue::Mat3(a), UniformValue::Mat3(b)) => bits_eq(a, b),
            _ => false,
        }
    }
}

/// A value bound to a declared input slot for one invocation
#[derive(Debug, Clone)]
pub struct InputVal {
    /// Index into [`RenderPassParams::inputs`]
    pub index: usize,
    /// The value to apply
    pub value: UniformValue,
}

/// Parameters for creating a render pass
///
/// The created pass stores its own deep copy (all fields are owned), so the
/// caller's buffers can be reused immediately.
#[derive(Debug, Clone)]
pub struct RenderPassParams {
    /// Raster or compute
    pub pass_type: RenderPassType,
    /// Declared input slots, in binding-index order of declaration
    pub inputs: Vec<RenderPassInput>,
    /// Vertex attributes (raster only); `binding` is the byte offset
    pub vertex_attribs: Vec<RenderPassInput>,
    /// Bytes between consecutive vertices
    pub vertex_stride: usize,
    /// Vertex shader source (raster only)
    pub vertex_shader: String,
    /// Fragment shader source (raster only)
    pub frag_shader: String,
    /// Compute shader source (compute only)
    pub compute_shader: String,
    /// Enable blending with the factors below
    pub enable_blend: bool,
    pub blend_src_rgb: BlendFactor,
    pub blend_dst_rgb: BlendFactor,
    pub blend_src_alpha: BlendFactor,
    pub blend_dst_alpha: BlendFactor,
    /// Serialized program binary from an earlier run, as a compile fast
    /// path. Validated by the backend and silently discarded if stale.
    pub cached_program: Vec<u8>,
}

impl Default for RenderPassParams {
    fn default() -> Self {
        Self {
            pass_type: RenderPassType::Raster,
            inputs: Vec::new(),
            vertex_attribs: Vec::new(),
            vertex_stride: 0,
            vertex_shader: String::new(),
            frag_shader: String::new(),
            compute_shader: String::new(),
            enable_blend: false,
            blend_src_rgb: BlendFactor::Zero,
            blend_dst_rgb: BlendFactor::Zero,
            blend_src_alpha: BlendFactor::Zero,
            blend_dst_alpha: BlendFactor::Zero,
            cached_program: Vec::new(),
        }
    }
}

/// Compiled render pass trait
///
/// Implemented by backend-specific pass types (e.g. `GlRenderPass`). The
/// native program is released when the pass is dropped.
pub trait RenderPass: Send + Sync {
    /// The immutable parameters of this pass. `cached_program` holds the
    /// serialized binary the backend produced at creation (empty if the
    /// backend cannot serialize programs, or if the supplied binary was
    /// loaded as-is).
    fn params(&self) -> &RenderPassParams;

    /// Backend downcast hook
    fn as_any(&self) -> &dyn Any;
}

/// Parameters for executing a render pass
pub struct RenderPassRunParams<'a> {
    /// The pass to execute
    pub pass: &'a Arc<dyn RenderPass>,
    /// Values for the declared inputs, addressed by slot index. Unchanged
    /// values may be omitted; re-sending a current value is redundant but
    /// safe.
    pub values: &'a [InputVal],
    /// Raster: target texture (must have `render_dst`)
    pub target: Option<&'a Arc<dyn Tex>>,
    /// Raster: packed vertex data (`vertex_count * vertex_stride` bytes)
    pub vertex_data: &'a [u8],
    /// Raster: number of vertices (a multiple of 3; triangle list)
    pub vertex_count: usize,
    /// Raster: viewport rectangle
    pub viewport: Rect,
    /// Raster: scissor rectangle
    pub scissors: Rect,
    /// Compute: group counts per dimension
    pub compute_groups: [u32; 3],
}

#[cfg(test)]
#[path = "renderpass_tests.rs"]
mod tests;
