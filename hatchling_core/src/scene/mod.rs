//! The scene driver: frame lifecycle, entity scheduling, tile layers,
//! and multi-view rendering orchestration. Owns and schedules the VM/
//! compiler/manager and calls into the rasterizer through `render`.

pub mod driver;
pub mod entity;
pub mod layer;
pub mod priority;
pub mod tileset;
pub mod view;

pub use driver::{SceneDriver, SceneTransition};
pub use entity::{Activity, Entity, Rect};
pub use layer::{DrawBehaviour, SceneLayer, TileCell, EMPTY_TILE};
pub use priority::{PriorityList, PriorityListSet};
pub use tileset::{TileAnimator, Tileset};
pub use view::{View, View2DSetup, View3DSetup};
