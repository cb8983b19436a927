/*!
# Lumen Render - OpenGL Backend

OpenGL implementation of the Lumen render layer.

This crate implements the `lumen_render` backend traits on top of the glow
bindings: format enumeration, textures and framebuffers, persistently
mapped pixel buffers with fences, and render pass compilation/execution,
including the program-binary fast path the shader cache persists to disk.

The caller owns window and context creation; `GlRa::new` takes an already
current `glow::Context`.
*/

// OpenGL implementation modules
mod gl_buf;
mod gl_format;
mod gl_ra;
mod gl_renderpass;
mod gl_tex;
mod gl_vao;

pub use gl_format::{GlFormat, GlFormatFlags};
pub use gl_ra::{GlRa, GlRaParams, GlVersionInfo};
pub use gl_tex::GlTex;
