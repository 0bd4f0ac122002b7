//! Tile layers: the grid a scene's tile-scanline renderer draws from,
//! plus the per-tile animation advance and the load-time backup that
//! lets a scene restart revert every placed tile.

use super::tileset::TileAnimator;

/// How a layer's scanlines are generated; matches
/// `hatchling_raster::scanline::DrawBehaviour` one-to-one, since the
/// scene driver picks the scanline layout from the layer's own kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawBehaviour {
    Pgz1Bg,
    HorizontalParallax,
    VerticalParallax,
    CustomTileScanLines,
}

/// One packed tile cell: a 14-bit tile id, an X-flip bit, a Y-flip bit,
/// and the two collision-plane indices (`coll_a`/`coll_b`) the physics
/// module looks up against the active `TileConfigSet`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TileCell {
    pub id: u16,
    pub flip_x: bool,
    pub flip_y: bool,
    pub coll_a: u8,
    pub coll_b: u8,
}

pub const EMPTY_TILE: u16 = 0xFFFF;

#[derive(Debug, Clone)]
pub struct SceneLayer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<TileCell>,
    /// Snapshot taken right after load; `restore` reverts `tiles` to
    /// this so `Scene::DoRestart`-style reloads don't need to re-read
    /// the scene file from disk.
    backup: Vec<TileCell>,
    pub draw_behaviour: DrawBehaviour,
    pub visible: bool,
    pub opacity: f32,
    pub animators: Vec<TileAnimator>,
}

impl SceneLayer {
    pub fn new(name: impl Into<String>, width: u32, height: u32, draw_behaviour: DrawBehaviour) -> Self {
        let tiles = vec![TileCell { id: EMPTY_TILE, ..TileCell::default() }; (width * height) as usize];
        SceneLayer {
            name: name.into(),
            width,
            height,
            backup: tiles.clone(),
            tiles,
            draw_behaviour,
            visible: true,
            opacity: 1.0,
            animators: Vec::new(),
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    pub fn get_tile(&self, x: u32, y: u32) -> Option<TileCell> {
        self.index(x, y).map(|i| self.tiles[i])
    }

    /// Packs `(id, flipX, flipY, collA, collB)` into the cell at `(x, y)`.
    pub fn set_tile(&mut self, x: u32, y: u32, id: u16, flip_x: bool, flip_y: bool, coll_a: u8, coll_b: u8) {
        if let Some(i) = self.index(x, y) {
            self.tiles[i] = TileCell { id, flip_x, flip_y, coll_a, coll_b };
        }
    }

    /// Takes the load-time backup; called once right after a scene file
    /// populates `tiles`, before any script has a chance to call
    /// `set_tile`.
    pub fn snapshot(&mut self) {
        self.backup = self.tiles.clone();
    }

    /// Restores every tile to its load-time snapshot, the way a scene
    /// restart undoes in-game tile destruction without a full reload.
    pub fn restore(&mut self) {
        self.tiles.clone_from(&self.backup);
    }

    /// Advances every unpaused `TileAnimator` by one fixed tick and
    /// writes the resulting frame's tile id back into every cell that
    /// references the animator's base tile id.
    pub fn run_tile_animations(&mut self, tile_animation_enabled: bool) {
        if !tile_animation_enabled {
            return;
        }
        for animator in &mut self.animators {
            if animator.paused {
                continue;
            }
            if let Some(new_id) = animator.tick() {
                for cell in &mut self.tiles {
                    if cell.id == animator.base_tile_id {
                        cell.id = new_id;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_tile_then_get_tile_round_trips() {
        let mut layer = SceneLayer::new("fg", 4, 4, DrawBehaviour::Pgz1Bg);
        layer.set_tile(1, 2, 7, true, false, 0, 1);
        let cell = layer.get_tile(1, 2).unwrap();
        assert_eq!(cell.id, 7);
        assert!(cell.flip_x);
        assert!(!cell.flip_y);
    }

    #[test]
    fn restore_reverts_to_snapshot() {
        let mut layer = SceneLayer::new("fg", 2, 2, DrawBehaviour::Pgz1Bg);
        layer.snapshot();
        layer.set_tile(0, 0, 99, false, false, 0, 0);
        layer.restore();
        assert_eq!(layer.get_tile(0, 0).unwrap().id, EMPTY_TILE);
    }

    #[test]
    fn out_of_range_tile_access_is_none() {
        let layer = SceneLayer::new("fg", 2, 2, DrawBehaviour::Pgz1Bg);
        assert!(layer.get_tile(5, 5).is_none());
    }
}
