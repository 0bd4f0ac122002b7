//! The frame lifecycle: `FrameUpdate` → `Update` → (on a fixed tick)
//! `FixedUpdate` → `Render` per active view → `AfterScene`. Owns the
//! entity list, the draw-priority lists, the tile layers, and the
//! active views; schedules updates over A-D and renders through F/G.

use tracing::debug;

use super::entity::{Activity, Entity, Rect};
use super::layer::{SceneLayer, EMPTY_TILE};
use super::priority::PriorityListSet;
use super::view::{active_views_in_render_order, View};
use crate::physics::TileLayerSource;

/// What to do after the current frame finishes, set by script during
/// `Update`/`FixedUpdate` and acted on in `after_scene`.
#[derive(Debug, Clone, Default)]
pub enum SceneTransition {
    #[default]
    None,
    NextScene(String),
    Restart,
}

pub struct SceneDriver {
    entities: Vec<Entity>,
    need_entity_sort: bool,
    pub priority_lists: PriorityListSet,
    pub layers: Vec<SceneLayer>,
    pub views: Vec<View>,
    pub tile_animation_enabled: bool,
    pub fixed_tick_accumulator: f32,
    pub fixed_tick_rate: f32,
    pub transition: SceneTransition,
}

impl SceneDriver {
    pub fn new(priority_per_layer: u16, fixed_tick_rate: f32) -> Self {
        SceneDriver {
            entities: Vec::new(),
            need_entity_sort: false,
            priority_lists: PriorityListSet::new(priority_per_layer),
            layers: Vec::new(),
            views: Vec::new(),
            tile_animation_enabled: true,
            fixed_tick_accumulator: 0.0,
            fixed_tick_rate,
            transition: SceneTransition::None,
        }
    }

    /// Appends at the tail (scene-list insertion never sorts eagerly)
    /// and marks the list dirty so the next `FrameUpdate` restores the
    /// `UpdatePriority`-descending invariant.
    pub fn add_entity(&mut self, entity: Entity) -> u32 {
        let index = self.entities.len() as u32;
        let priority = entity.priority;
        self.entities.push(entity);
        self.priority_lists.insert(index, priority);
        self.need_entity_sort = true;
        index
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn mark_needs_sort(&mut self) {
        self.need_entity_sort = true;
    }

    /// `FrameUpdate`: restores the `UpdatePriority`-descending
    /// invariant with a stable sort, so entities inserted with equal
    /// priority keep their relative insertion order.
    pub fn frame_update(&mut self) {
        if self.need_entity_sort {
            self.entities.sort_by(|a, b| b.update_priority.cmp(&a.update_priority));
            self.need_entity_sort = false;
        }
    }

    fn view_rects(&self) -> Vec<Rect> {
        self.views
            .iter()
            .filter(|v| v.active)
            .map(|v| Rect { x: 0.0, y: 0.0, width: v.draw_target_width as f32, height: v.draw_target_height as f32 })
            .collect()
    }

    /// `Update`: early/mid/late passes over the scene-ordered list,
    /// skipping entities that are off-screen or whose `Activity`
    /// excludes them this frame. `callback` receives the pass index
    /// (0=early, 1=mid, 2=late) and the entity; actual script dispatch
    /// happens through it so this module stays VM-agnostic.
    pub fn update(&mut self, mut callback: impl FnMut(u8, &mut Entity)) {
        let views = self.view_rects();
        for pass in 0..3u8 {
            for entity in &mut self.entities {
                if matches!(entity.activity, Activity::Disabled | Activity::Never | Activity::Paused) {
                    continue;
                }
                if !entity.is_on_screen(&views) {
                    continue;
                }
                callback(pass, entity);
            }
        }
    }

    /// `FixedUpdate`: animates tiles, then early/mid/late passes over
    /// entities, gated by the accumulator crossing one fixed-tick
    /// boundary per call (the caller advances the accumulator by the
    /// frame's delta time before calling this).
    pub fn fixed_update(&mut self, delta_time: f32, mut callback: impl FnMut(u8, &mut Entity)) -> bool {
        self.fixed_tick_accumulator += delta_time;
        if self.fixed_tick_accumulator < self.fixed_tick_rate {
            return false;
        }
        self.fixed_tick_accumulator -= self.fixed_tick_rate;

        for layer in &mut self.layers {
            layer.run_tile_animations(self.tile_animation_enabled);
        }

        let views = self.view_rects();
        for pass in 0..3u8 {
            for entity in &mut self.entities {
                if matches!(entity.activity, Activity::Disabled | Activity::Never | Activity::Paused) {
                    continue;
                }
                if !entity.is_on_screen(&views) {
                    continue;
                }
                callback(pass, entity);
            }
        }
        true
    }

    /// `Render`: sorts dirty draw groups, then calls `draw_view` once
    /// per active view in ascending `Priority` order.
    pub fn render(&mut self, mut draw_view: impl FnMut(&View)) {
        self.priority_lists.sort_all(&self.entities);
        for view in active_views_in_render_order(&self.views) {
            draw_view(view);
        }
    }

    /// `AfterScene`: applies any scene transition queued during
    /// `Update`/`FixedUpdate`. Non-persistent entities are dropped on a
    /// scene switch; a restart instead reverts every layer to its
    /// load-time tile snapshot.
    pub fn after_scene(&mut self) -> SceneTransition {
        let transition = std::mem::take(&mut self.transition);
        match &transition {
            SceneTransition::NextScene(name) => {
                debug!(scene = %name, "scene transition: switching, dropping non-persistent entities");
                self.entities.retain(|e| e.persistent);
                self.need_entity_sort = true;
            }
            SceneTransition::Restart => {
                debug!("scene transition: restarting, reverting tile layers");
                for layer in &mut self.layers {
                    layer.restore();
                }
            }
            SceneTransition::None => {}
        }
        transition
    }
}

/// Every tile layer participates in collision; `SceneLayer` carries no
/// per-layer collideable flag, so this always reports `true` -- a
/// collision-plane/layer-mask check on the entity side is what actually
/// excludes a layer from a given probe.
impl TileLayerSource for SceneDriver {
    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn is_collideable(&self, _layer: usize) -> bool {
        true
    }

    fn dims(&self, layer: usize) -> (i32, i32) {
        let l = &self.layers[layer];
        (l.width as i32, l.height as i32)
    }

    fn tile_at(&self, layer: usize, tx: i32, ty: i32) -> Option<(u16, bool, bool, u8, u8)> {
        if tx < 0 || ty < 0 {
            return None;
        }
        let cell = self.layers.get(layer)?.get_tile(tx as u32, ty as u32)?;
        if cell.id == EMPTY_TILE {
            return None;
        }
        Some((cell.id, cell.flip_x, cell.flip_y, cell.coll_a, cell.coll_b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_update_sorts_descending_and_stably() {
        let mut driver = SceneDriver::new(8, 1.0 / 60.0);
        driver.add_entity({
            let mut e = Entity::new(0, 0.0, 0.0);
            e.update_priority = 1;
            e
        });
        driver.add_entity({
            let mut e = Entity::new(1, 0.0, 0.0);
            e.update_priority = 5;
            e
        });
        driver.add_entity({
            let mut e = Entity::new(2, 0.0, 0.0);
            e.update_priority = 5;
            e
        });
        driver.frame_update();
        let refs: Vec<u32> = driver.entities().iter().map(|e| e.heap_ref).collect();
        assert_eq!(refs, vec![1, 2, 0]);
    }

    #[test]
    fn restart_reverts_layer_tiles() {
        let mut driver = SceneDriver::new(1, 1.0 / 60.0);
        let mut layer = SceneLayer::new("fg", 2, 2, super::super::layer::DrawBehaviour::Pgz1Bg);
        layer.snapshot();
        layer.set_tile(0, 0, 42, false, false, 0, 0);
        driver.layers.push(layer);
        driver.transition = SceneTransition::Restart;
        driver.after_scene();
        assert_eq!(driver.layers[0].get_tile(0, 0).unwrap().id, super::super::layer::EMPTY_TILE);
    }

    #[test]
    fn next_scene_drops_non_persistent_entities() {
        let mut driver = SceneDriver::new(1, 1.0 / 60.0);
        driver.add_entity(Entity::new(0, 0.0, 0.0));
        let mut persistent = Entity::new(1, 0.0, 0.0);
        persistent.persistent = true;
        driver.add_entity(persistent);
        driver.transition = SceneTransition::NextScene("next".into());
        driver.after_scene();
        assert_eq!(driver.entities().len(), 1);
        assert!(driver.entities()[0].persistent);
    }
}
