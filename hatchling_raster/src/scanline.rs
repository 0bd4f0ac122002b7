//! Tile scanline renderer.
//!
//! For every on-screen scanline a [`TileScanLine`] is precomputed according
//! to the owning layer's draw behaviour, then consumed by [`draw_scanline`],
//! which draws one leading partial tile, full 16-pixel-wide runs across the
//! visible width, then one trailing partial tile.

use crate::pixel::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawBehaviour {
    /// Plain background layer, no parallax.
    Pgz1Bg,
    HorizontalParallax,
    VerticalParallax,
    CustomTileScanLines,
}

/// A precomputed source-space walk for one destination scanline.
#[derive(Debug, Clone, Copy)]
pub struct TileScanLine {
    pub src_x: f32,
    pub src_y: f32,
    pub delta_x: f32,
    pub delta_y: f32,
    pub max_horz: u32,
    pub max_vert: u32,
    pub opacity: f32,
}

/// One scroll row's worth of parallax/deform data, used by
/// `HorizontalParallax` layers' per-scanline parallax/deform tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScrollInfo {
    pub parallax_factor: f32,
    pub deform_offset: f32,
}

pub const TILE_SIZE: u32 = 16;

/// Builds the per-scanline walk table for one layer, for the destination
/// rows `dest_y_start..dest_y_start + height`.
pub fn build_scanlines(
    behaviour: DrawBehaviour,
    scroll_x: f32,
    scroll_y: f32,
    height: u32,
    max_horz: u32,
    max_vert: u32,
    rows: &[ScrollInfo],
    opacity: f32,
) -> Vec<TileScanLine> {
    (0..height)
        .map(|row| match behaviour {
            DrawBehaviour::Pgz1Bg | DrawBehaviour::CustomTileScanLines => TileScanLine {
                src_x: scroll_x,
                src_y: scroll_y + row as f32,
                delta_x: 1.0,
                delta_y: 0.0,
                max_horz,
                max_vert,
                opacity,
            },
            DrawBehaviour::HorizontalParallax => {
                let info = rows.get(row as usize % rows.len().max(1)).copied().unwrap_or_default();
                TileScanLine {
                    src_x: scroll_x * info.parallax_factor + info.deform_offset,
                    src_y: scroll_y + row as f32,
                    delta_x: 1.0,
                    delta_y: 0.0,
                    max_horz,
                    max_vert,
                    opacity,
                }
            }
            DrawBehaviour::VerticalParallax => {
                let info = rows.get(row as usize % rows.len().max(1)).copied().unwrap_or_default();
                TileScanLine {
                    src_x: scroll_x + row as f32,
                    src_y: scroll_y * info.parallax_factor + info.deform_offset,
                    delta_x: 0.0,
                    delta_y: 1.0,
                    max_horz,
                    max_vert,
                    opacity,
                }
            }
        })
        .collect()
}

/// A source of paletted or true-colour tile pixels, indexed by wrapped
/// source coordinate. Implemented by whatever owns the decoded sprite
/// sheet; this crate only consumes it.
pub trait TileSource {
    fn sample(&self, src_x: i32, src_y: i32) -> Color;
    fn repeat_x(&self) -> bool;
    fn repeat_y(&self) -> bool;
}

/// Draws one destination scanline: a leading partial tile, fully-unrolled
/// 16-pixel runs, then a trailing partial tile, wrapping source coordinates
/// when the source supports repeat-x/repeat-y.
pub fn draw_scanline(
    line: &TileScanLine,
    source: &impl TileSource,
    dest: &mut [Color],
    dest_y: u32,
    dest_width: u32,
) {
    let row_start = (dest_y * dest_width) as usize;
    let mut src_x = line.src_x;
    let mut src_y = line.src_y;

    let leading = TILE_SIZE - (line.src_x as i64).rem_euclid(TILE_SIZE as i64) as u32;
    let leading = leading.min(dest_width);

    let mut x = 0u32;
    while x < dest_width {
        let run_len = if x == 0 {
            leading
        } else if dest_width - x >= TILE_SIZE {
            TILE_SIZE
        } else {
            dest_width - x
        };

        for _ in 0..run_len {
            if x >= dest_width {
                break;
            }
            let sx = wrap(src_x as i32, line.max_horz as i32, source.repeat_x());
            let sy = wrap(src_y as i32, line.max_vert as i32, source.repeat_y());
            let mut color = source.sample(sx, sy);
            color.a = ((color.a as f32) * line.opacity) as u8;
            dest[row_start + x as usize] = color;
            src_x += line.delta_x;
            src_y += line.delta_y;
            x += 1;
        }
    }
}

fn wrap(value: i32, max: i32, repeat: bool) -> i32 {
    if max <= 0 {
        return 0;
    }
    if repeat {
        value.rem_euclid(max)
    } else {
        value.clamp(0, max - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Solid(Color);
    impl TileSource for Solid {
        fn sample(&self, _: i32, _: i32) -> Color {
            self.0
        }
        fn repeat_x(&self) -> bool {
            true
        }
        fn repeat_y(&self) -> bool {
            true
        }
    }

    #[test]
    fn draws_full_row_without_panicking() {
        let line = TileScanLine {
            src_x: 0.0,
            src_y: 0.0,
            delta_x: 1.0,
            delta_y: 0.0,
            max_horz: 256,
            max_vert: 256,
            opacity: 1.0,
        };
        let mut dest = vec![Color::default(); 40];
        draw_scanline(&line, &Solid(Color::rgba(1, 2, 3, 255)), &mut dest, 0, 40);
        assert_eq!(dest[39], Color::rgba(1, 2, 3, 255));
    }

    #[test]
    fn wrap_clamps_when_not_repeating() {
        assert_eq!(wrap(500, 256, false), 255);
        assert_eq!(wrap(500, 256, true), 244);
    }
}
