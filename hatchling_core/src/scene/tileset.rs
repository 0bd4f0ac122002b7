//! Tileset image references and per-tile animation playback.

/// A tileset binds a source image to a tile grid (size in source
/// pixels) and the first tile id it contributes, so a layer's packed
/// tile ids can be resolved back to a source rectangle without the
/// layer itself knowing which image a tile id came from.
#[derive(Debug, Clone)]
pub struct Tileset {
    pub name: String,
    pub image_path: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub first_tile_id: u16,
    pub tile_count: u16,
}

impl Tileset {
    /// Source-pixel rect for `tile_id`, or `None` if it's not one of
    /// this tileset's tiles.
    pub fn source_rect(&self, tile_id: u16) -> Option<(u32, u32, u32, u32)> {
        if tile_id < self.first_tile_id || tile_id >= self.first_tile_id + self.tile_count {
            return None;
        }
        let local = (tile_id - self.first_tile_id) as u32;
        let col = local % self.columns;
        let row = local / self.columns;
        Some((col * self.tile_width, row * self.tile_height, self.tile_width, self.tile_height))
    }
}

/// Advances a sequence of tile ids at a fixed frame duration, the way
/// the scene driver's `RunTileAnimations` pass ticks every layer's
/// animators once per `FixedUpdate`.
#[derive(Debug, Clone)]
pub struct TileAnimator {
    pub base_tile_id: u16,
    pub frames: Vec<u16>,
    pub frame_duration_ticks: u32,
    pub paused: bool,
    current_frame: usize,
    ticks_since_frame: u32,
}

impl TileAnimator {
    pub fn new(base_tile_id: u16, frames: Vec<u16>, frame_duration_ticks: u32) -> Self {
        TileAnimator {
            base_tile_id,
            frames,
            frame_duration_ticks: frame_duration_ticks.max(1),
            paused: false,
            current_frame: 0,
            ticks_since_frame: 0,
        }
    }

    /// Advances one fixed tick; returns `Some(tile_id)` when the
    /// animator lands on a new frame this tick, `None` otherwise.
    pub fn tick(&mut self) -> Option<u16> {
        if self.frames.is_empty() {
            return None;
        }
        self.ticks_since_frame += 1;
        if self.ticks_since_frame < self.frame_duration_ticks {
            return None;
        }
        self.ticks_since_frame = 0;
        self.current_frame = (self.current_frame + 1) % self.frames.len();
        Some(self.frames[self.current_frame])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tileset_resolves_source_rect_by_local_index() {
        let ts = Tileset {
            name: "main".into(),
            image_path: "tiles.png".into(),
            tile_width: 16,
            tile_height: 16,
            columns: 8,
            first_tile_id: 100,
            tile_count: 64,
        };
        assert_eq!(ts.source_rect(109), Some((16 * 1, 16 * 1, 16, 16)));
        assert_eq!(ts.source_rect(50), None);
    }

    #[test]
    fn animator_advances_after_duration_and_wraps() {
        let mut anim = TileAnimator::new(5, vec![5, 6, 7], 2);
        assert_eq!(anim.tick(), None);
        assert_eq!(anim.tick(), Some(6));
        assert_eq!(anim.tick(), None);
        assert_eq!(anim.tick(), Some(7));
        assert_eq!(anim.tick(), None);
        assert_eq!(anim.tick(), Some(5));
    }
}
