//! The top-level GC arena a host allocates once at startup. Everything
//! reachable from script — globals, heap objects, compiled chunks —
//! lives inside the single [`Root`] the arena roots, the way the
//! teacher's player owns one GC arena for its whole AVM1/AVM2 object
//! graph.

use gc_arena::{Collect, MutationContext};

use crate::manager::ScriptManager;
use crate::scene::SceneDriver;

/// Everything the garbage collector must trace from. `scene` is kept
/// outside the arena's GC-traced fields conceptually but lives here so
/// a host only has to hand the arena around, not a `(arena, scene)`
/// pair; `Collect` is only actually derived for the GC-owned piece.
#[derive(Collect)]
#[collect(no_drop)]
pub struct Root<'gc> {
    pub manager: ScriptManager<'gc>,
}

impl<'gc> Root<'gc> {
    pub fn new(_mc: MutationContext<'gc, '_>) -> Self {
        Root { manager: ScriptManager::new() }
    }
}

gc_arena::make_arena!(pub HatchArena, Root);

/// The non-GC-owned half of engine state: entity scheduling, tile
/// layers, and views. Kept outside the arena since none of it holds a
/// `Gc<'gc, _>` pointer directly (entities reference the heap only by
/// opaque `heap_ref` handles), so it doesn't need to participate in
/// collection.
pub struct EngineState {
    pub scene: SceneDriver,
}

impl EngineState {
    pub fn new(priority_per_layer: u16, fixed_tick_rate: f32) -> Self {
        EngineState { scene: SceneDriver::new(priority_per_layer, fixed_tick_rate) }
    }
}
