//! Software rasterizer core.
//!
//! This crate is the one shipped implementation of the `Rasterizer`
//! contract that `hatchling_core::scene` renders through; it owns no
//! window, no GPU context, and no asset decoding — just per-pixel blend
//! state, the tile-scanline renderer, the polygon rasterizer, and 3D face
//! batching. A hardware backend could implement the same contract without
//! touching this crate; the core does not mandate a specific rendering
//! backend.

pub mod batch;
pub mod blend;
pub mod pixel;
pub mod polygon;
pub mod scanline;
pub mod stencil;

pub use blend::{BlendMode, TintMode};
pub use pixel::{Color, PixelState};
pub use stencil::{StencilOp, StencilState, StencilTest};

#[derive(thiserror::Error, Debug)]
pub enum RasterError {
    #[error("framebuffer index {0} out of bounds (size {1})")]
    OutOfBounds(usize, usize),
    #[error("polygon must have at least 3 vertices, got {0}")]
    DegeneratePolygon(usize),
}

pub type Result<T> = std::result::Result<T, RasterError>;
