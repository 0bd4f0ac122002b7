//! Polygon rasterizer: perspective- or affine-correct texture mapping,
//! Gouraud colour blending, optional depth buffer, optional fog, and
//! material diffuse colour modulation. Polygons are fan-decomposed to
//! triangles before rasterization.

use crate::pixel::Color;
use crate::{RasterError, Result};

#[derive(Debug, Clone, Copy)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    /// Reciprocal depth (`1/w`); used for perspective-correct interpolation.
    pub inv_w: f32,
    pub u: f32,
    pub v: f32,
    pub color: Color,
    /// View-space depth, for the optional depth buffer and for fog.
    pub depth: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Affine,
    PerspectiveCorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FogMode {
    None,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy)]
pub struct FogState {
    pub mode: FogMode,
    pub near: f32,
    pub far: f32,
    pub density: f32,
    pub color: Color,
}

/// A 256-entry smoothness table the fog factor is evaluated through,
/// instead of computing `exp`/division per pixel.
pub struct FogTable(pub [f32; 256]);

impl FogTable {
    pub fn build(fog: &FogState) -> Self {
        let mut table = [0.0f32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let t = i as f32 / 255.0;
            *slot = match fog.mode {
                FogMode::None => 0.0,
                FogMode::Linear => {
                    let depth = fog.near + t * (fog.far - fog.near);
                    ((depth - fog.near) / (fog.far - fog.near).max(f32::EPSILON)).clamp(0.0, 1.0)
                }
                FogMode::Exponential => {
                    let depth = fog.near + t * (fog.far - fog.near);
                    1.0 - (-fog.density * depth).exp()
                }
            };
        }
        FogTable(table)
    }

    pub fn factor_at(&self, depth: f32, near: f32, far: f32) -> f32 {
        let t = ((depth - near) / (far - near).max(f32::EPSILON)).clamp(0.0, 1.0);
        let idx = (t * 255.0) as usize;
        self.0[idx.min(255)]
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Material {
    pub diffuse: Color,
}

/// Fan-decomposes a convex polygon (`v0, v1, v2, v3, ... -> (v0,v1,v2),
/// (v0,v2,v3), ...`), the way the backend triangulates polygon draw calls.
pub fn fan_triangulate(vertices: &[Vertex]) -> Result<Vec<[Vertex; 3]>> {
    if vertices.len() < 3 {
        return Err(RasterError::DegeneratePolygon(vertices.len()));
    }
    Ok((1..vertices.len() - 1)
        .map(|i| [vertices[0], vertices[i], vertices[i + 1]])
        .collect())
}

fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

/// Rasterizes one triangle with perspective- or affine-correct UV
/// interpolation, Gouraud vertex-colour blending, material diffuse
/// modulation, and an optional depth test + fog lookup.
#[allow(clippy::too_many_arguments)]
pub fn rasterize_triangle(
    tri: &[Vertex; 3],
    projection: ProjectionMode,
    material: &Material,
    fog: Option<(&FogTable, &FogState)>,
    sample: &impl Fn(f32, f32) -> Color,
    framebuffer: &mut [Color],
    depth_buffer: Option<&mut [f32]>,
    width: u32,
    height: u32,
) {
    let [a, b, c] = *tri;
    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as i32;
    let max_x = a.x.max(b.x).max(c.x).ceil().min(width as f32) as i32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as i32;
    let max_y = a.y.max(b.y).max(c.y).ceil().min(height as f32) as i32;

    let area = edge((a.x, a.y), (b.x, b.y), (c.x, c.y));
    if area.abs() < f32::EPSILON {
        return; // degenerate triangle
    }

    let mut depth_buffer = depth_buffer;

    for y in min_y..max_y {
        for x in min_x..max_x {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge((b.x, b.y), (c.x, c.y), p) / area;
            let w1 = edge((c.x, c.y), (a.x, a.y), p) / area;
            let w2 = edge((a.x, a.y), (b.x, b.y), p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let idx = (y as u32 * width + x as u32) as usize;

            let depth = w0 * a.depth + w1 * b.depth + w2 * c.depth;
            if let Some(db) = depth_buffer.as_deref_mut() {
                if let Some(existing) = db.get(idx) {
                    if depth >= *existing {
                        continue;
                    }
                    db[idx] = depth;
                }
            }

            let (u, v) = match projection {
                ProjectionMode::Affine => (
                    w0 * a.u + w1 * b.u + w2 * c.u,
                    w0 * a.v + w1 * b.v + w2 * c.v,
                ),
                ProjectionMode::PerspectiveCorrect => {
                    let inv_w = w0 * a.inv_w + w1 * b.inv_w + w2 * c.inv_w;
                    let u = (w0 * a.u * a.inv_w + w1 * b.u * b.inv_w + w2 * c.u * c.inv_w) / inv_w;
                    let v = (w0 * a.v * a.inv_w + w1 * b.v * b.inv_w + w2 * c.v * c.inv_w) / inv_w;
                    (u, v)
                }
            };

            let texel = sample(u, v);
            let gouraud = lerp_color(w0, w1, w2, a.color, b.color, c.color);
            let mut out = modulate(texel, gouraud);
            out = modulate(out, material.diffuse);

            if let Some((table, state)) = fog {
                let factor = table.factor_at(depth, state.near, state.far);
                out = lerp(out, state.color, factor);
            }

            if let Some(slot) = framebuffer.get_mut(idx) {
                *slot = out;
            }
        }
    }
}

fn lerp_color(w0: f32, w1: f32, w2: f32, a: Color, b: Color, c: Color) -> Color {
    Color::rgba(
        (w0 * a.r as f32 + w1 * b.r as f32 + w2 * c.r as f32) as u8,
        (w0 * a.g as f32 + w1 * b.g as f32 + w2 * c.g as f32) as u8,
        (w0 * a.b as f32 + w1 * b.b as f32 + w2 * c.b as f32) as u8,
        (w0 * a.a as f32 + w1 * b.a as f32 + w2 * c.a as f32) as u8,
    )
}

fn modulate(a: Color, b: Color) -> Color {
    Color::rgba(
        ((a.r as u16 * b.r as u16) / 255) as u8,
        ((a.g as u16 * b.g as u16) / 255) as u8,
        ((a.b as u16 * b.b as u16) / 255) as u8,
        ((a.a as u16 * b.a as u16) / 255) as u8,
    )
}

fn lerp(a: Color, b: Color, t: f32) -> Color {
    let t = t.clamp(0.0, 1.0);
    Color::rgba(
        (a.r as f32 * (1.0 - t) + b.r as f32 * t) as u8,
        (a.g as f32 * (1.0 - t) + b.g as f32 * t) as u8,
        (a.b as f32 * (1.0 - t) + b.b as f32 * t) as u8,
        (a.a as f32 * (1.0 - t) + b.a as f32 * t) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vert(x: f32, y: f32) -> Vertex {
        Vertex {
            x,
            y,
            inv_w: 1.0,
            u: 0.0,
            v: 0.0,
            color: Color::rgba(255, 255, 255, 255),
            depth: 0.0,
        }
    }

    #[test]
    fn fan_triangulate_quad_yields_two_triangles() {
        let quad = [vert(0.0, 0.0), vert(1.0, 0.0), vert(1.0, 1.0), vert(0.0, 1.0)];
        let tris = fan_triangulate(&quad).unwrap();
        assert_eq!(tris.len(), 2);
    }

    #[test]
    fn fan_triangulate_rejects_too_few_vertices() {
        let line = [vert(0.0, 0.0), vert(1.0, 0.0)];
        assert!(fan_triangulate(&line).is_err());
    }

    #[test]
    fn rasterize_fills_triangle_interior() {
        let tri = [vert(1.0, 1.0), vert(5.0, 1.0), vert(1.0, 5.0)];
        let mut fb = vec![Color::default(); 64];
        rasterize_triangle(
            &tri,
            ProjectionMode::Affine,
            &Material { diffuse: Color::rgba(255, 255, 255, 255) },
            None,
            &|_, _| Color::rgba(10, 20, 30, 255),
            &mut fb,
            None,
            8,
            8,
        );
        assert_eq!(fb[2 * 8 + 2], Color::rgba(10, 20, 30, 255));
    }
}
